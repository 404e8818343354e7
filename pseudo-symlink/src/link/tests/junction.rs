use super::{memory_session, replacing_session};
use crate::config::Conflict;
use crate::link::junction::Junction;
use crate::link::{CloseOutcome, LinkState, OpenOutcome};
use crate::platform::{CallKind, NativeCall};
use crate::reparse::{self, MAX_SUBSTITUTE_NAME_BYTES};
use crate::LinkError;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const BASE: &str = r"C:\a\b";

fn mount_point(target: &str) -> Vec<u8> {
    reparse::encode_mount_point(target)
        .unwrap()
        .as_bytes()
        .to_vec()
}

fn kinds(calls: &[NativeCall]) -> Vec<CallKind> {
    calls.iter().map(NativeCall::kind).collect()
}

#[test]
fn open_creates_directory_and_mount_point() {
    let (platform, session) = memory_session();
    let mut junction = session.staging_junction(BASE);

    assert_eq!(junction.open().unwrap(), OpenOutcome::Created);
    assert_eq!(junction.state(), LinkState::OwnedOpen);
    assert!(junction.owns_directory());
    assert_eq!(
        Junction::get_target(platform.as_ref(), Path::new(BASE))
            .unwrap()
            .as_deref(),
        Some(r"\RPC Control")
    );
    let calls = kinds(&platform.mutations());
    assert_eq!(calls, vec![CallKind::CreateDir, CallKind::SetReparsePoint]);
}

#[test]
fn second_open_is_idempotent_and_keeps_ownership() {
    let (platform, session) = memory_session();
    let mut junction = session.staging_junction(BASE);
    junction.open().unwrap();
    platform.clear_calls();

    assert_eq!(junction.open().unwrap(), OpenOutcome::AlreadyPresent);
    assert_eq!(junction.state(), LinkState::OwnedOpen);
    assert!(platform.mutations().is_empty());
}

#[test]
fn existing_correct_junction_is_observed_not_owned() {
    let (platform, session) = memory_session();
    platform.add_reparse_dir(BASE, mount_point(r"\RPC Control"));
    let mut junction = session.staging_junction(BASE);

    assert_eq!(junction.open().unwrap(), OpenOutcome::AlreadyPresent);
    assert_eq!(junction.state(), LinkState::ObservedExisting);

    platform.clear_calls();
    assert_eq!(junction.close().unwrap(), CloseOutcome::NotOwned);
    assert!(platform.calls().is_empty());
    assert!(junction.current_target().unwrap().is_some());
}

#[test]
fn close_without_open_issues_no_native_call() {
    let (platform, session) = memory_session();
    platform.add_reparse_dir(BASE, mount_point(r"\RPC Control"));
    let mut junction = session.staging_junction(BASE);

    assert_eq!(junction.close().unwrap(), CloseOutcome::NotOwned);
    assert!(platform.calls().is_empty());
}

#[test]
fn close_then_get_target_returns_none() {
    let (platform, session) = memory_session();
    platform.add_dir(BASE, 0);
    let mut junction = session.staging_junction(BASE);
    junction.open().unwrap();
    assert!(!junction.owns_directory());

    assert_eq!(junction.close().unwrap(), CloseOutcome::Removed);
    assert_eq!(junction.state(), LinkState::Closed);
    assert_eq!(
        Junction::get_target(platform.as_ref(), Path::new(BASE)).unwrap(),
        None
    );
    // The directory existed before `open`, so it survives.
    assert_eq!(platform.dir_entries(BASE), Some(0));
}

#[test]
fn close_removes_directory_created_by_open() {
    let (platform, session) = memory_session();
    let mut junction = session.staging_junction(BASE);
    junction.open().unwrap();

    assert_eq!(junction.close().unwrap(), CloseOutcome::Removed);
    assert_eq!(platform.dir_entries(BASE), None);
    assert!(!junction.owns_directory());
}

#[test]
fn close_leaves_retargeted_junction_in_place() {
    let (platform, session) = memory_session();
    platform.add_dir(BASE, 0);
    let mut junction = session.staging_junction(BASE);
    junction.open().unwrap();

    platform.add_reparse_dir(BASE, mount_point(r"\??\C:\elsewhere"));
    let outcome = junction.close().unwrap();

    assert_eq!(
        outcome,
        CloseOutcome::TargetMismatch {
            actual: Some(r"\??\C:\elsewhere".into())
        }
    );
    assert_eq!(junction.state(), LinkState::Closed);
    assert_eq!(
        junction.current_target().unwrap().as_deref(),
        Some(r"\??\C:\elsewhere")
    );
    assert!(!platform
        .calls()
        .iter()
        .any(|call| call.kind() == CallKind::DeleteReparsePoint));
}

#[test]
fn close_reports_vanished_junction() {
    let (platform, session) = memory_session();
    platform.add_dir(BASE, 0);
    let mut junction = session.staging_junction(BASE);
    junction.open().unwrap();

    platform.add_dir(BASE, 0);
    assert_eq!(junction.close().unwrap(), CloseOutcome::Vanished);
    assert_eq!(junction.state(), LinkState::Closed);
}

#[test]
fn force_close_removes_foreign_junction() {
    let (platform, session) = memory_session();
    platform.add_reparse_dir(BASE, mount_point(r"\??\D:\other"));
    let mut junction = session.staging_junction(BASE);

    assert_eq!(junction.force_close().unwrap(), CloseOutcome::Removed);
    assert_eq!(junction.current_target().unwrap(), None);
    assert_eq!(platform.dir_entries(BASE), Some(0));
}

#[test]
fn non_empty_directory_is_refused_by_default() {
    let (platform, session) = memory_session();
    platform.add_dir(BASE, 3);
    let mut junction = session.staging_junction(BASE);

    let err = junction.open().unwrap_err();
    assert!(matches!(err, LinkError::DirectoryNotEmpty { .. }));
    assert!(err.is_conflict());
    assert_eq!(junction.state(), LinkState::NotOpened);
    assert_eq!(platform.dir_entries(BASE), Some(3));
    assert!(platform.mutations().is_empty());
}

#[test]
fn non_empty_directory_is_cleared_under_replace_policy() {
    let (platform, session) = replacing_session();
    platform.add_dir(BASE, 3);
    let mut junction = session.staging_junction(BASE);

    assert_eq!(junction.open().unwrap(), OpenOutcome::Created);
    assert_eq!(
        kinds(&platform.mutations()),
        vec![CallKind::ClearDir, CallKind::SetReparsePoint]
    );
}

#[test]
fn prompt_overrides_policy_and_sees_the_conflict() {
    let (platform, session) = memory_session();
    platform.add_dir(BASE, 2);
    let asked = Arc::new(AtomicUsize::new(0));
    let counter = asked.clone();
    let session = session.with_prompt(move |conflict: &Conflict| {
        counter.fetch_add(1, Ordering::SeqCst);
        matches!(conflict, Conflict::NonEmptyDirectory { path } if path == Path::new(BASE))
    });
    let mut junction = session.staging_junction(BASE);

    assert!(junction.open().unwrap().created());
    assert_eq!(asked.load(Ordering::SeqCst), 1);
}

#[test]
fn denying_prompt_refuses_even_with_replace_policy() {
    let (platform, session) = replacing_session();
    platform.add_dir(BASE, 2);
    let session = session.with_prompt(|_: &Conflict| false);
    let mut junction = session.staging_junction(BASE);

    assert!(matches!(
        junction.open(),
        Err(LinkError::DirectoryNotEmpty { .. })
    ));
}

#[test]
fn foreign_junction_is_refused_by_default() {
    let (platform, session) = memory_session();
    platform.add_reparse_dir(BASE, mount_point(r"\??\D:\other"));
    let mut junction = session.staging_junction(BASE);

    match junction.open() {
        Err(LinkError::JunctionConflict { path, existing }) => {
            assert_eq!(path, PathBuf::from(BASE));
            assert_eq!(existing, r"\??\D:\other");
        }
        other => panic!("expected JunctionConflict, got {other:?}"),
    }
    assert!(platform.mutations().is_empty());
}

#[test]
fn foreign_junction_is_replaced_under_replace_policy() {
    let (platform, session) = replacing_session();
    platform.add_reparse_dir(BASE, mount_point(r"\??\D:\other"));
    let mut junction = session.staging_junction(BASE);

    assert_eq!(junction.open().unwrap(), OpenOutcome::Created);
    assert_eq!(
        kinds(&platform.mutations()),
        vec![CallKind::DeleteReparsePoint, CallKind::SetReparsePoint]
    );
    assert_eq!(
        junction.current_target().unwrap().as_deref(),
        Some(r"\RPC Control")
    );
}

#[test]
fn oversized_target_fails_before_any_native_call() {
    let (platform, session) = memory_session();
    let target = format!(r"\{}", "x".repeat(MAX_SUBSTITUTE_NAME_BYTES / 2));
    let mut junction = session.junction(BASE, target);

    assert!(matches!(
        junction.open(),
        Err(LinkError::BufferTooLarge { .. })
    ));
    assert!(platform.calls().is_empty());
}

#[test]
fn failed_set_rolls_back_created_directory() {
    let (platform, session) = memory_session();
    platform.fail_with(CallKind::SetReparsePoint, 5);
    let mut junction = session.staging_junction(BASE);

    let err = junction.open().unwrap_err();
    assert!(matches!(err, LinkError::ReparseSetFailed { .. }));
    assert_eq!(err.raw_os_error(), Some(5));
    assert_eq!(junction.state(), LinkState::NotOpened);
    assert_eq!(platform.dir_entries(BASE), None);
}

#[test]
fn query_failure_is_reported() {
    let (platform, session) = memory_session();
    platform.add_dir(BASE, 0);
    platform.fail_with(CallKind::GetReparsePoint, 1117);
    let mut junction = session.staging_junction(BASE);

    let err = junction.open().unwrap_err();
    assert!(matches!(err, LinkError::ReparseQueryFailed { .. }));
    assert_eq!(err.raw_os_error(), Some(1117));
}

#[test]
fn other_reparse_tags_are_not_junctions() {
    let (platform, _session) = memory_session();
    let mut symlink_header = vec![0u8; 8];
    symlink_header[..4].copy_from_slice(&0xA000_000Cu32.to_le_bytes());
    platform.add_reparse_dir(BASE, symlink_header);

    assert_eq!(
        Junction::get_target(platform.as_ref(), Path::new(BASE)).unwrap(),
        None
    );
    assert_eq!(
        Junction::get_target(platform.as_ref(), Path::new(r"C:\missing")).unwrap(),
        None
    );
}

#[test]
fn win32_targets_are_stored_in_native_form() {
    let (_platform, session) = memory_session();
    assert_eq!(
        session.junction(BASE, r"D:\target").target_dir(),
        r"\??\D:\target"
    );
    assert_eq!(session.staging_junction(BASE).target_dir(), r"\RPC Control");
}

#[test]
fn equality_and_hash_ignore_case_and_trailing_separator() {
    let (_platform, session) = memory_session();
    let a = session.staging_junction(r"C:\A\B");
    let b = session.staging_junction(r"c:\a\b\");
    let c = session.staging_junction(r"C:\a\c");

    assert_eq!(a, b);
    assert_ne!(a, c);
    let hash = |j: &Junction| {
        let mut hasher = DefaultHasher::new();
        j.hash(&mut hasher);
        hasher.finish()
    };
    assert_eq!(hash(&a), hash(&b));
}

#[test]
fn status_reports_paths_and_state() {
    let (_platform, session) = memory_session();
    let mut junction = session.staging_junction(BASE);
    junction.open().unwrap();
    let status = junction.status();

    assert_eq!(status.link_path, BASE);
    assert_eq!(status.target_path, r"\RPC Control");
    assert!(status.owned());
}
