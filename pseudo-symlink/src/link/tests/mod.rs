mod dos_device;
mod group;
mod junction;

use super::{same_native_path, CloseOutcome, LinkState, OpenOutcome};
use crate::platform::MemoryPlatform;
use crate::{ConflictPolicy, LinkConfig, Session};
use std::sync::Arc;

pub(super) fn memory_session() -> (Arc<MemoryPlatform>, Session) {
    let platform = Arc::new(MemoryPlatform::new());
    let session = Session::new(platform.clone());
    (platform, session)
}

pub(super) fn session_with(config: LinkConfig) -> (Arc<MemoryPlatform>, Session) {
    let platform = Arc::new(MemoryPlatform::new());
    let session = Session::with_config(platform.clone(), config);
    (platform, session)
}

pub(super) fn replacing_session() -> (Arc<MemoryPlatform>, Session) {
    session_with(LinkConfig {
        on_conflict: ConflictPolicy::Replace,
        ..LinkConfig::default()
    })
}

#[test]
fn native_paths_compare_case_insensitively() {
    assert!(same_native_path(r"\RPC Control", r"\rpc control"));
    assert!(same_native_path(r"\??\C:\T.txt", r"\??\c:\t.TXT"));
    assert!(same_native_path(r"C:\a\b\", r"C:\a\b"));
    assert!(!same_native_path(r"C:\a\b", r"C:\a\bc"));
}

#[test]
fn only_owned_open_counts_as_owned() {
    assert!(LinkState::OwnedOpen.is_owned());
    assert!(!LinkState::NotOpened.is_owned());
    assert!(!LinkState::ObservedExisting.is_owned());
    assert!(!LinkState::Closed.is_owned());
    assert_eq!(LinkState::default(), LinkState::NotOpened);
}

#[test]
fn outcome_helpers() {
    assert!(OpenOutcome::Created.created());
    assert!(!OpenOutcome::AlreadyPresent.created());
    assert!(!OpenOutcome::Conflict {
        actual: "x".into()
    }
    .created());
    assert!(CloseOutcome::Removed.removed());
    assert!(!CloseOutcome::NotOwned.removed());
    assert!(!CloseOutcome::Vanished.removed());
}

#[cfg(feature = "serde")]
#[test]
fn status_serializes_with_snake_case_enums() {
    use super::{LinkKind, LinkStatus};
    let status = LinkStatus {
        kind: LinkKind::DosDevice,
        link_path: r"\RPC Control\link".into(),
        target_path: r"C:\t.txt".into(),
        state: LinkState::ObservedExisting,
    };
    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["kind"], "dos_device");
    assert_eq!(json["state"], "observed_existing");
    let back: LinkStatus = serde_json::from_value(json).unwrap();
    assert_eq!(back, status);
}
