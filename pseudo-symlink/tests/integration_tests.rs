use pseudo_symlink::platform::{CallKind, MemoryPlatform, Platform};
use pseudo_symlink::{
    CloseOutcome, Conflict, ConflictPolicy, LinkConfig, LinkError, LinkGuard, LinkKind, LinkState,
    OpenOutcome, Session,
};
use std::path::Path;
use std::sync::Arc;

const SID: &str = "S-1-5-21-11-22-33-1001";

fn session() -> (Arc<MemoryPlatform>, Session) {
    let platform = Arc::new(MemoryPlatform::with_sid(SID));
    let session = Session::new(platform.clone());
    (platform, session)
}

#[test]
fn file_link_lifecycle() {
    let (platform, session) = session();
    let mut link = session.symlink();
    link.add_link(r"C:\app\config\settings.json").unwrap();
    link.add_link(r"C:\app\config\defaults.json").unwrap();
    link.add_link(r"C:\app\cache\settings.json").unwrap();
    link.set_target(r"C:\users\me\settings.json");

    let opened = link.open();
    assert!(opened.is_success());
    assert_eq!(opened.created_count(), 4);
    assert_eq!(platform.devices().len(), 2);

    for device in link.devices() {
        assert_eq!(
            device.current_target().unwrap().as_deref(),
            Some(r"C:\users\me\settings.json")
        );
    }

    let closed = link.close();
    assert!(closed.is_success());
    assert_eq!(closed.removed_count(), 4);
    assert!(platform.devices().is_empty());
    assert!(!platform.dir_exists(Path::new(r"C:\app\config")));
    assert!(!platform.dir_exists(Path::new(r"C:\app\cache")));
}

#[test]
fn two_sessions_share_the_staging_directory() {
    let (platform, session) = session();
    let mut first = session.symlink();
    first.add_link(r"C:\a\link").unwrap();
    first.set_target(r"C:\t.txt");
    first.open();

    let other = Session::new(platform.clone());
    let mut second = other.symlink();
    second.add_link(r"C:\b\link").unwrap();
    second.set_target(r"C:\t.txt");
    let opened = second.open();
    let outcomes: Vec<_> = opened.into_iter().map(|e| e.result.unwrap()).collect();
    assert_eq!(outcomes, vec![OpenOutcome::Created, OpenOutcome::AlreadyPresent]);

    // The second aggregate only observed the device; closing it leaves the first intact.
    second.close();
    assert_eq!(platform.devices().len(), 1);
    assert!(first.close().is_success());
    assert!(platform.devices().is_empty());
}

#[test]
fn device_conflict_is_reported_not_overwritten() {
    let (platform, session) = session();
    let mut first = session.symlink();
    first.add_link(r"C:\a\link").unwrap();
    first.set_target(r"C:\one.txt");
    first.open();

    let mut second = session.symlink();
    second.add_link(r"C:\b\link").unwrap();
    second.set_target(r"C:\two.txt");
    let opened = second.open();
    assert!(opened.is_success());
    assert!(opened.entries().iter().any(|entry| matches!(
        &entry.result,
        Ok(OpenOutcome::Conflict { actual }) if actual == r"C:\one.txt"
    )));
    assert_eq!(
        platform
            .query_dos_device(r"Global\GLOBALROOT\RPC Control\link")
            .unwrap()
            .as_deref(),
        Some(r"\??\C:\one.txt")
    );
}

#[test]
fn registry_link_lifecycle() {
    let (platform, session) = session();
    let mut link = session
        .registry_link(r"HKCU\Software\Vendor\Alias", r"HKCU:\Software\Vendor\Real")
        .unwrap();
    let native = format!(r"\Registry\User\{SID}\Software\Vendor\Alias");
    assert_eq!(link.link_path(), native);

    assert!(link.open().unwrap().created());
    assert!(platform.key_exists(&native));
    assert_eq!(
        pseudo_symlink::RegistryLink::get_link_target(&session, r"HKCU\Software\Vendor\Alias")
            .unwrap(),
        Some(format!(r"\Registry\User\{SID}\Software\Vendor\Real"))
    );
    assert_eq!(link.close().unwrap(), CloseOutcome::Removed);
    assert!(!platform.key_exists(&native));
}

#[test]
fn guarded_group_cleans_up_on_scope_exit() {
    let (platform, session) = session();
    let mut file = session.symlink();
    file.add_link(r"C:\a\link").unwrap();
    file.set_target(r"C:\t.txt");

    let mut group = session.group();
    group.add(file);
    group.add(session.registry_link(r"HKLM\Software\A", r"HKLM\Software\B").unwrap());
    {
        let guard = LinkGuard::open(group).unwrap();
        assert!(guard.opened().is_success());
        let status = guard.status();
        assert_eq!(status.len(), 3);
        assert!(status.iter().all(|s| s.state == LinkState::OwnedOpen));
        assert_eq!(status[2].kind, LinkKind::Registry);
    }
    assert!(platform.devices().is_empty());
    assert!(!platform.key_exists(r"\Registry\Machine\Software\A"));
    assert!(!platform.dir_exists(Path::new(r"C:\a")));
}

#[test]
fn prompt_decides_each_conflict() {
    let (platform, session) = session();
    platform.add_dir(r"C:\keep", 4);
    platform.add_dir(r"C:\scratch", 4);
    let session = session.with_prompt(|conflict: &Conflict| {
        matches!(conflict, Conflict::NonEmptyDirectory { path } if path.to_string_lossy().ends_with("scratch"))
    });

    let mut link = session.symlink();
    link.add_link(r"C:\keep\link").unwrap();
    link.add_link(r"C:\scratch\link").unwrap();
    link.set_target(r"C:\t.txt");
    let opened = link.open();

    let failures: Vec<_> = opened.failures().collect();
    assert_eq!(failures.len(), 1);
    assert!(matches!(failures[0].1, LinkError::DirectoryNotEmpty { path } if path.to_string_lossy().ends_with("keep")));
    assert_eq!(platform.dir_entries(r"C:\keep"), Some(4));
    assert_eq!(platform.dir_entries(r"C:\scratch"), Some(0));
}

#[test]
fn injected_failure_is_attributed_to_its_resource() {
    let (platform, session) = session();
    platform.fail_with(CallKind::SetReparsePoint, 5);
    let mut link = session.symlink();
    link.add_link(r"C:\a\link").unwrap();
    link.set_target(r"C:\t.txt");

    let opened = link.open();
    let (resource, error) = opened.failures().next().unwrap();
    assert_eq!(resource.to_string(), r"junction 'C:\a'");
    assert_eq!(error.raw_os_error(), Some(5));
    assert_eq!(opened.created_count(), 1);
}

#[test]
fn replace_policy_from_config() {
    let platform = Arc::new(MemoryPlatform::new());
    platform.add_dir(r"C:\full", 2);
    let config = LinkConfig {
        on_conflict: ConflictPolicy::Replace,
        ..LinkConfig::default()
    };
    let session = Session::with_config(platform.clone(), config);
    let mut junction = session.staging_junction(r"C:\full");
    assert_eq!(junction.open().unwrap(), OpenOutcome::Created);
}

#[cfg(feature = "serde")]
#[test]
fn config_round_trips_through_json_with_defaults() {
    let config: LinkConfig =
        serde_json::from_str(r#"{ "on_conflict": "replace", "redefine_workaround": false }"#)
            .unwrap();
    assert_eq!(config.on_conflict, ConflictPolicy::Replace);
    assert!(!config.redefine_workaround);
    assert_eq!(config.staging_root, r"\RPC Control");
    assert!(config.volatile_registry_links);

    let json = serde_json::to_string(&config).unwrap();
    let back: LinkConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}
