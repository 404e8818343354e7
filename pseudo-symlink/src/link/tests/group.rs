use super::memory_session;
use crate::link::group::GroupMember;
use crate::link::report::ResourceId;
use crate::link::{CloseOutcome, LinkKind};
use crate::platform::{CallKind, NativeCall};
use crate::LinkError;

const KEY: &str = r"\Registry\Machine\Software\Alias";

#[test]
fn members_are_driven_in_insertion_order() {
    let (platform, session) = memory_session();
    let mut file = session.symlink();
    file.add_link(r"C:\a\link").unwrap();
    file.set_target(r"C:\t.txt");

    let mut group = session.group();
    group.add(session.registry_link(KEY, r"HKLM\Software\Real").unwrap());
    group.add(file);
    assert_eq!(group.len(), 2);
    assert!(matches!(group.members()[0], GroupMember::Registry(_)));

    let opened = group.open();
    assert!(opened.is_success());
    assert_eq!(opened.created_count(), 3);
    let resources: Vec<_> = opened.entries().iter().map(|entry| &entry.resource).collect();
    assert!(matches!(resources[0], ResourceId::Registry { .. }));
    assert!(matches!(resources[1], ResourceId::Junction { .. }));
    assert!(matches!(resources[2], ResourceId::DosDevice { .. }));

    platform.clear_calls();
    let closed = group.close();
    assert_eq!(closed.removed_count(), 3);
    assert_eq!(
        platform.mutations().first(),
        Some(&NativeCall::DeleteKey(KEY.into()))
    );
    assert!(platform.devices().is_empty());
    assert!(!platform.key_exists(KEY));
}

#[test]
fn status_flattens_every_primitive() {
    let (_platform, session) = memory_session();
    let mut file = session.symlink();
    file.add_link(r"C:\a\one").unwrap();
    file.add_link(r"C:\b\two").unwrap();
    file.set_target(r"C:\t.txt");

    let mut group = session.group();
    group.add(file);
    group.add(session.registry_link(KEY, r"HKLM\Software\Real").unwrap());

    let kinds: Vec<_> = group.status().iter().map(|status| status.kind).collect();
    assert_eq!(
        kinds,
        vec![
            LinkKind::Junction,
            LinkKind::Junction,
            LinkKind::DosDevice,
            LinkKind::DosDevice,
            LinkKind::Registry,
        ]
    );
    assert!(group.status().iter().all(|status| !status.owned()));
}

#[test]
fn failing_member_does_not_stop_the_others() {
    let (platform, session) = memory_session();
    platform.fail_with(CallKind::CreateLinkKey, 5);
    let mut missing_target = session.symlink();
    missing_target.add_link(r"C:\a\orphan").unwrap();
    let mut file = session.symlink();
    file.add_link(r"C:\b\link").unwrap();
    file.set_target(r"C:\t.txt");

    let mut group = session.group();
    group.add(session.registry_link(KEY, r"HKLM\Software\Real").unwrap());
    group.add(missing_target);
    group.add(file);

    let opened = group.open();
    let failures: Vec<_> = opened.failures().map(|(_, e)| e).collect();
    assert_eq!(failures.len(), 2);
    assert!(matches!(failures[0], LinkError::RegistryLinkFailed { .. }));
    assert!(matches!(failures[1], LinkError::MissingTarget));
    assert_eq!(opened.created_count(), 2);
    assert!(opened.into_result().is_err());

    let closed = group.close();
    let outcomes: Vec<_> = closed
        .into_iter()
        .map(|entry| entry.result.unwrap())
        .collect();
    assert_eq!(
        outcomes,
        vec![
            CloseOutcome::NotOwned,
            CloseOutcome::NotOwned,
            CloseOutcome::NotOwned,
            CloseOutcome::Removed,
            CloseOutcome::Removed,
        ]
    );
}

#[test]
fn force_close_reaches_every_member() {
    let (platform, session) = memory_session();
    platform.add_link_key(KEY, r"\Registry\Machine\Software\Elsewhere");
    let mut file = session.symlink();
    file.add_link(r"C:\a\link").unwrap();
    file.set_target(r"C:\t.txt");
    let mut seeded = session.symlink();
    seeded.add_link(r"C:\a\link").unwrap();
    seeded.set_target(r"C:\t.txt");
    seeded.open();

    let mut group = session.group();
    group.add(file);
    group.add(session.registry_link(KEY, r"HKLM\Software\Real").unwrap());

    assert_eq!(group.close().removed_count(), 0);
    assert_eq!(group.force_close().removed_count(), 3);
    assert!(!platform.key_exists(KEY));
}

#[test]
fn empty_group_reports_nothing() {
    let (platform, session) = memory_session();
    let mut group = session.group();
    assert!(group.is_empty());
    assert!(group.open().is_empty());
    assert!(group.close().is_success());
    assert!(platform.calls().is_empty());
}
