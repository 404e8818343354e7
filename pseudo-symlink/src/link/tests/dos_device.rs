use super::{memory_session, session_with};
use crate::link::dos_device::ObjectNamespaceLink;
use crate::link::{CloseOutcome, LinkState, OpenOutcome};
use crate::platform::{CallKind, NativeCall, Platform};
use crate::{LinkConfig, LinkError};

const DEVICE: &str = r"Global\GLOBALROOT\RPC Control\link";

fn defines(calls: &[NativeCall]) -> usize {
    calls
        .iter()
        .filter(|call| call.kind() == CallKind::DefineDosDevice)
        .count()
}

fn removes(calls: &[NativeCall]) -> usize {
    calls
        .iter()
        .filter(|call| call.kind() == CallKind::RemoveDosDevice)
        .count()
}

#[test]
fn open_defines_raw_target_twice() {
    let (platform, session) = memory_session();
    let mut device = session.dos_device("link", r"C:\t.txt");

    assert_eq!(device.open().unwrap(), OpenOutcome::Created);
    assert_eq!(device.state(), LinkState::OwnedOpen);
    let calls = platform.calls();
    assert_eq!(defines(&calls), 2);
    assert!(calls.contains(&NativeCall::DefineDosDevice {
        name: DEVICE.into(),
        target: r"\??\C:\t.txt".into(),
    }));
    assert_eq!(
        platform.query_dos_device(DEVICE).unwrap().as_deref(),
        Some(r"\??\C:\t.txt")
    );
    assert_eq!(device.current_target().unwrap().as_deref(), Some(r"C:\t.txt"));
}

#[test]
fn workaround_can_be_disabled() {
    let (platform, session) = session_with(LinkConfig {
        redefine_workaround: false,
        ..LinkConfig::default()
    });
    let mut device = session.dos_device("link", r"C:\t.txt");
    device.open().unwrap();
    assert_eq!(defines(&platform.calls()), 1);

    device.close().unwrap();
    assert_eq!(removes(&platform.calls()), 1);
    assert!(platform.devices().is_empty());
}

#[test]
fn close_removes_both_definitions() {
    let (platform, session) = memory_session();
    let mut device = session.dos_device("link", r"C:\t.txt");
    device.open().unwrap();

    assert_eq!(device.close().unwrap(), CloseOutcome::Removed);
    assert_eq!(removes(&platform.calls()), 2);
    assert!(platform.devices().is_empty());
    assert_eq!(device.current_target().unwrap(), None);
}

#[test]
fn second_removal_failure_is_tolerated() {
    let (platform, session) = session_with(LinkConfig {
        redefine_workaround: false,
        ..LinkConfig::default()
    });
    let mut device = session.dos_device("link", r"C:\t.txt");
    device.open().unwrap();

    // A session with the workaround on removes twice; only one definition exists.
    let mut doubled = crate::Session::new(platform.clone()).dos_device("link", r"C:\t.txt");
    assert_eq!(doubled.force_close().unwrap(), CloseOutcome::Removed);
    assert_eq!(removes(&platform.calls()), 2);
    assert!(platform.devices().is_empty());
}

#[test]
fn existing_identical_definition_is_observed() {
    let (platform, session) = memory_session();
    platform.define_dos_device(DEVICE, r"\??\C:\t.txt").unwrap();
    let mut device = session.dos_device("link", r"c:\T.txt");

    platform.clear_calls();
    assert_eq!(device.open().unwrap(), OpenOutcome::AlreadyPresent);
    assert_eq!(device.state(), LinkState::ObservedExisting);
    assert!(platform.mutations().is_empty());

    assert_eq!(device.close().unwrap(), CloseOutcome::NotOwned);
    assert_eq!(platform.devices().len(), 1);
}

#[test]
fn conflicting_definition_is_left_untouched() {
    let (platform, session) = memory_session();
    platform.define_dos_device(DEVICE, r"\??\C:\other.txt").unwrap();
    let mut device = session.dos_device("link", r"C:\t.txt");

    platform.clear_calls();
    assert_eq!(
        device.open().unwrap(),
        OpenOutcome::Conflict {
            actual: r"C:\other.txt".into()
        }
    );
    assert!(platform.mutations().is_empty());
    assert_eq!(
        platform.query_dos_device(DEVICE).unwrap().as_deref(),
        Some(r"\??\C:\other.txt")
    );
}

#[test]
fn close_leaves_redefined_device() {
    let (platform, session) = memory_session();
    let mut device = session.dos_device("link", r"C:\t.txt");
    device.open().unwrap();

    platform.define_dos_device(DEVICE, r"\??\C:\other.txt").unwrap();
    platform.clear_calls();

    assert_eq!(
        device.close().unwrap(),
        CloseOutcome::TargetMismatch {
            actual: Some(r"C:\other.txt".into())
        }
    );
    assert_eq!(removes(&platform.calls()), 0);
    assert_eq!(device.state(), LinkState::Closed);
}

#[test]
fn close_reports_vanished_device() {
    let (platform, session) = memory_session();
    let mut device = session.dos_device("link", r"C:\t.txt");
    device.open().unwrap();

    platform
        .remove_dos_device(DEVICE, r"\??\C:\t.txt")
        .unwrap();
    platform
        .remove_dos_device(DEVICE, r"\??\C:\t.txt")
        .unwrap();
    assert_eq!(device.close().unwrap(), CloseOutcome::Vanished);
}

#[test]
fn retargeted_link_still_verifies_against_defined_target() {
    let (platform, session) = memory_session();
    let mut device = session.dos_device("link", r"C:\t.txt");
    device.open().unwrap();

    device.set_target(r"C:\new.txt");
    assert_eq!(device.target(), r"C:\new.txt");
    assert_eq!(device.close().unwrap(), CloseOutcome::Removed);
    assert!(platform.devices().is_empty());
}

#[test]
fn reopening_after_retarget_replaces_the_owned_definition() {
    let (platform, session) = memory_session();
    let mut device = session.dos_device("link", r"C:\old.txt");
    device.open().unwrap();
    device.set_target(r"C:\new.txt");
    platform.clear_calls();

    assert_eq!(device.open().unwrap(), OpenOutcome::Created);
    assert_eq!(device.state(), LinkState::OwnedOpen);
    let calls = platform.calls();
    assert_eq!(removes(&calls), 2);
    assert_eq!(defines(&calls), 2);
    assert_eq!(
        platform.devices(),
        vec![(
            DEVICE.to_ascii_lowercase(),
            vec![r"\??\C:\new.txt".to_owned(), r"\??\C:\new.txt".to_owned()]
        )]
    );
    assert_eq!(device.current_target().unwrap().as_deref(), Some(r"C:\new.txt"));

    assert_eq!(device.close().unwrap(), CloseOutcome::Removed);
    assert!(platform.devices().is_empty());
}

#[test]
fn retarget_leaves_observed_definition_alone() {
    let (platform, session) = memory_session();
    platform.define_dos_device(DEVICE, r"\??\C:\old.txt").unwrap();
    let mut device = session.dos_device("link", r"C:\old.txt");
    device.open().unwrap();
    device.set_target(r"C:\new.txt");

    assert_eq!(
        device.open().unwrap(),
        OpenOutcome::Conflict {
            actual: r"C:\old.txt".into()
        }
    );
    assert_eq!(device.state(), LinkState::ObservedExisting);
    assert_eq!(
        platform.query_dos_device(DEVICE).unwrap().as_deref(),
        Some(r"\??\C:\old.txt")
    );
}

#[test]
fn force_close_removes_foreign_definition() {
    let (platform, session) = memory_session();
    platform.define_dos_device(DEVICE, r"\??\C:\other.txt").unwrap();
    let mut device = session.dos_device("link", r"C:\t.txt");

    assert_eq!(device.force_close().unwrap(), CloseOutcome::Removed);
    assert!(platform.devices().is_empty());
}

#[test]
fn failed_second_define_rolls_back_the_first() {
    let (platform, session) = memory_session();
    let mut device = session.dos_device("link", r"C:\t.txt");
    platform.fail_after(CallKind::DefineDosDevice, 1, 5);

    let err = device.open().unwrap_err();
    assert!(matches!(err, LinkError::DeviceDefineFailed { .. }));
    assert_eq!(err.raw_os_error(), Some(5));
    assert_eq!(device.state(), LinkState::NotOpened);
    assert!(platform.devices().is_empty());
}

#[test]
fn query_failure_is_reported() {
    let (platform, session) = memory_session();
    platform.fail_with(CallKind::QueryDosDevice, 6);
    let mut device = session.dos_device("link", r"C:\t.txt");

    assert!(matches!(
        device.open(),
        Err(LinkError::DeviceQueryFailed { .. })
    ));
}

#[test]
fn device_names_follow_the_configured_staging_root() {
    let (platform, session) = session_with(LinkConfig {
        staging_root: r"\Sessions\Test".into(),
        ..LinkConfig::default()
    });
    let mut device = session.dos_device("link", r"\\server\share\t.txt");
    device.open().unwrap();

    assert_eq!(device.device_name(), r"Global\GLOBALROOT\Sessions\Test\link");
    assert_eq!(device.raw_target(), r"\??\UNC\server\share\t.txt");
    assert_eq!(
        ObjectNamespaceLink::get_target(&session, "link")
            .unwrap()
            .as_deref(),
        Some(r"\\server\share\t.txt")
    );
    assert_eq!(platform.devices().len(), 1);
    assert_eq!(device.status().link_path, r"\Sessions\Test\link");
}

#[test]
fn equality_uses_name_and_target() {
    let (_platform, session) = memory_session();
    assert_eq!(
        session.dos_device("Link", r"C:\T.txt"),
        session.dos_device("link", r"c:\t.txt")
    );
    assert_ne!(
        session.dos_device("link", r"C:\t.txt"),
        session.dos_device("link", r"C:\u.txt")
    );
}
