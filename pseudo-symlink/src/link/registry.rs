//! SUMMARY:
//! Lifecycle of one native registry symbolic link, plus registry path normalization.
//!
//! DETAILS:
//! Links are created from fully-qualified native key paths (`\Registry\Machine\...`,
//! `\Registry\User\<SID>\...`). Hive abbreviations are accepted at the API surface and
//! normalized once, at construction.
//!
//! The OS refuses to resolve a link from a less-trusted hive (the current user's) into a
//! more-trusted one (the machine hive) even though creating it succeeds. That restriction is
//! not special-cased here: it surfaces as an access-denied error on first use of the link.
use super::report::ResourceId;
use super::{same_native_path, CloseOutcome, LinkKind, LinkState, LinkStatus, ManagedLink, OpenOutcome};
use crate::config::Conflict;
use crate::error::LinkError;
use crate::platform::{KeyKind, Platform};
use crate::session::{starts_with_ignore_case, Session};
use crate::Result;

use tracing::{debug, info, warn};

const NATIVE_ROOT: &str = r"\Registry\";
const MACHINE_ROOT: &str = r"\Registry\Machine";
const USER_ROOT: &str = r"\Registry\User";
const CLASSES_ROOT: &str = r"\Registry\Machine\Software\Classes";
const PROVIDER_PREFIX: &str = "Registry::";

/// SUMMARY:
/// Convert a registry path into its fully-qualified native form.
///
/// DETAILS:
/// - `HKLM`, `HKEY_LOCAL_MACHINE` map to `\Registry\Machine`;
/// - `HKU`, `HKEY_USERS` map to `\Registry\User`;
/// - `HKCU`, `HKEY_CURRENT_USER` map to `\Registry\User\<SID of the caller>`;
/// - `HKCR`, `HKEY_CLASSES_ROOT` map to `\Registry\Machine\Software\Classes`.
///
/// The hive may be followed by `\` or by the PowerShell drive separator `:\`, forward slashes
/// are accepted, and a leading `Registry::` provider prefix is ignored. A path already rooted at
/// `\Registry\` is returned unchanged.
///
/// ERRORS:
/// - `LinkError::InvalidRegistryPath`: Empty path or unknown hive.
/// - `LinkError::SidLookupFailed`: `HKCU` path and the caller's SID cannot be resolved.
///
/// EXAMPLE:
/// ```rust
/// use pseudo_symlink::{link::registry::normalize_path, platform::MemoryPlatform};
/// let platform = MemoryPlatform::with_sid("S-1-5-21-1-2-3-1001");
/// assert_eq!(
///     normalize_path(&platform, r"HKCU\Software\X")?,
///     r"\Registry\User\S-1-5-21-1-2-3-1001\Software\X"
/// );
/// assert_eq!(normalize_path(&platform, r"HKLM:\Software")?, r"\Registry\Machine\Software");
/// assert!(normalize_path(&platform, r"HKXX\Software").is_err());
/// # Ok::<_, pseudo_symlink::LinkError>(())
/// ```
pub fn normalize_path(platform: &dyn Platform, path: &str) -> Result<String> {
    if starts_with_ignore_case(path, NATIVE_ROOT) {
        return Ok(path.to_owned());
    }

    let unified = path.replace('/', "\\");
    let mut rest = unified.as_str();
    if starts_with_ignore_case(rest, PROVIDER_PREFIX) {
        rest = &rest[PROVIDER_PREFIX.len()..];
    }
    if starts_with_ignore_case(rest, NATIVE_ROOT) {
        return Ok(rest.to_owned());
    }

    let split = rest.find([':', '\\']).unwrap_or(rest.len());
    let (hive, tail) = rest.split_at(split);
    let tail = tail
        .trim_start_matches(':')
        .trim_start_matches('\\')
        .trim_end_matches('\\');

    let root = match hive.to_ascii_uppercase().as_str() {
        "HKLM" | "HKEY_LOCAL_MACHINE" => MACHINE_ROOT.to_owned(),
        "HKU" | "HKEY_USERS" => USER_ROOT.to_owned(),
        "HKCR" | "HKEY_CLASSES_ROOT" => CLASSES_ROOT.to_owned(),
        "HKCU" | "HKEY_CURRENT_USER" => {
            let sid = platform
                .current_user_sid()
                .map_err(|source| LinkError::SidLookupFailed { source })?;
            format!(r"{USER_ROOT}\{sid}")
        }
        _ => return Err(LinkError::invalid_registry_path(path)),
    };

    if tail.is_empty() {
        Ok(root)
    } else {
        Ok(format!(r"{root}\{tail}"))
    }
}

/// SUMMARY:
/// The key at `link_path` carrying a symbolic-link value that points at `target_path`.
///
/// EXAMPLE:
/// ```rust
/// use pseudo_symlink::{platform::MemoryPlatform, Session};
/// use std::sync::Arc;
///
/// let platform = Arc::new(MemoryPlatform::new());
/// let session = Session::new(platform.clone());
/// let mut link = session.registry_link(r"HKCU\Software\Alias", r"HKCU\Software\Real")?;
/// assert!(link.open()?.created());
/// assert!(platform.key_exists(link.link_path()));
/// assert!(link.close()?.removed());
/// assert!(!platform.key_exists(link.link_path()));
/// # Ok::<_, pseudo_symlink::LinkError>(())
/// ```
#[derive(Debug)]
pub struct RegistryLink {
    session: Session,
    link_path: String,
    target_path: String,
    state: LinkState,
}

impl RegistryLink {
    pub(crate) fn new(session: Session, link_path: &str, target_path: &str) -> Result<Self> {
        let link_path = normalize_path(session.platform(), link_path)?;
        let target_path = normalize_path(session.platform(), target_path)?;
        Ok(Self {
            session,
            link_path,
            target_path,
            state: LinkState::NotOpened,
        })
    }

    /// Native path of the link key.
    #[inline]
    pub fn link_path(&self) -> &str {
        &self.link_path
    }

    /// Native path the link resolves to.
    #[inline]
    pub fn target_path(&self) -> &str {
        &self.target_path
    }

    #[inline]
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// SUMMARY:
    /// Create the link key and write its link value, or observe an existing link.
    ///
    /// RETURNS:
    /// - `OpenOutcome::Created`: Key created and link value written by this instance.
    /// - `OpenOutcome::AlreadyPresent`: The key already links to `target_path`; nothing written.
    /// - `OpenOutcome::Conflict`: The key links elsewhere; it is left untouched.
    ///
    /// ERRORS:
    /// - `LinkError::KeyNotLink`: An ordinary key is in the way and replacing it was refused.
    /// - `LinkError::RegistryQueryFailed`, `LinkError::RegistryDeleteFailed`,
    ///   `LinkError::RegistryLinkFailed`: Native call failed.
    pub fn open(&mut self) -> Result<OpenOutcome> {
        match self.query()? {
            KeyKind::Missing => self.create(),
            KeyKind::Plain => {
                let conflict = Conflict::PlainRegistryKey {
                    path: self.link_path.clone(),
                };
                if !self.session.authorize(&conflict) {
                    warn!(%conflict, "key replacement refused");
                    return Err(LinkError::KeyNotLink {
                        path: self.link_path.clone(),
                    });
                }
                warn!(%conflict, "replacing key");
                self.session
                    .platform()
                    .delete_key_tree(&self.link_path)
                    .map_err(|e| LinkError::registry_delete_failed(&self.link_path, e))?;
                self.create()
            }
            KeyKind::Link(existing) if same_native_path(&existing, &self.target_path) => {
                debug!(key = %self.link_path, "registry link already in place");
                if !self.state.is_owned() {
                    self.state = LinkState::ObservedExisting;
                }
                Ok(OpenOutcome::AlreadyPresent)
            }
            KeyKind::Link(existing) => {
                warn!(
                    key = %self.link_path,
                    expected = %self.target_path,
                    actual = %existing,
                    "registry key already links elsewhere"
                );
                if !self.state.is_owned() {
                    self.state = LinkState::ObservedExisting;
                }
                Ok(OpenOutcome::Conflict { actual: existing })
            }
        }
    }

    fn create(&mut self) -> Result<OpenOutcome> {
        let platform = self.session.platform();
        let volatile = self.session.config().volatile_registry_links;
        debug!(key = %self.link_path, volatile, "creating link key");
        platform
            .create_link_key(&self.link_path, volatile)
            .map_err(|e| LinkError::registry_link_failed(&self.link_path, e))?;

        debug!(key = %self.link_path, target = %self.target_path, "writing link value");
        if let Err(e) = platform.set_link_value(&self.link_path, &self.target_path) {
            if let Err(cleanup) = platform.delete_key(&self.link_path) {
                warn!(key = %self.link_path, error = %cleanup, "could not remove half-created link key");
            }
            return Err(LinkError::registry_link_failed(&self.link_path, e));
        }

        self.state = LinkState::OwnedOpen;
        info!(key = %self.link_path, target = %self.target_path, "registry link created");
        Ok(OpenOutcome::Created)
    }

    fn query(&self) -> Result<KeyKind> {
        self.session
            .platform()
            .query_key(&self.link_path)
            .map_err(|e| LinkError::registry_query_failed(&self.link_path, e))
    }

    /// SUMMARY:
    /// Delete the link key if this instance created it and it still links to `target_path`.
    pub fn close(&mut self) -> Result<CloseOutcome> {
        if !self.state.is_owned() {
            debug!(key = %self.link_path, state = ?self.state, "registry link not owned");
            return Ok(CloseOutcome::NotOwned);
        }
        self.teardown(false)
    }

    /// Delete the key at `link_path` without ownership or target checks.
    pub fn force_close(&mut self) -> Result<CloseOutcome> {
        self.teardown(true)
    }

    fn teardown(&mut self, force: bool) -> Result<CloseOutcome> {
        let actual = match self.query()? {
            KeyKind::Missing => {
                debug!(key = %self.link_path, "registry link already gone");
                self.state = LinkState::Closed;
                return Ok(CloseOutcome::Vanished);
            }
            KeyKind::Plain => None,
            KeyKind::Link(existing) => Some(existing),
        };

        let matches = actual
            .as_deref()
            .is_some_and(|existing| same_native_path(existing, &self.target_path));
        if !force && !matches {
            warn!(
                key = %self.link_path,
                expected = %self.target_path,
                actual = ?actual,
                "registry link changed; leaving it in place"
            );
            self.state = LinkState::Closed;
            return Ok(CloseOutcome::TargetMismatch { actual });
        }

        debug!(key = %self.link_path, "deleting link key");
        self.session
            .platform()
            .delete_key(&self.link_path)
            .map_err(|e| LinkError::registry_delete_failed(&self.link_path, e))?;
        self.state = LinkState::Closed;
        info!(key = %self.link_path, "registry link removed");
        Ok(CloseOutcome::Removed)
    }

    /// Link value currently stored at `link_path`, re-read from the registry.
    pub fn current_target(&self) -> Result<Option<String>> {
        Ok(match self.query()? {
            KeyKind::Link(target) => Some(target),
            KeyKind::Missing | KeyKind::Plain => None,
        })
    }

    /// SUMMARY:
    /// Read the link value of the key at `key_path` (any accepted form).
    ///
    /// RETURNS:
    /// - `Ok(None)`: The key is missing or carries no link value.
    pub fn get_link_target(session: &Session, key_path: &str) -> Result<Option<String>> {
        let native = normalize_path(session.platform(), key_path)?;
        let kind = session
            .platform()
            .query_key(&native)
            .map_err(|e| LinkError::registry_query_failed(&native, e))?;
        Ok(match kind {
            KeyKind::Link(target) => Some(target),
            KeyKind::Missing | KeyKind::Plain => None,
        })
    }

    pub fn status(&self) -> LinkStatus {
        LinkStatus {
            kind: LinkKind::Registry,
            link_path: self.link_path.clone(),
            target_path: self.target_path.clone(),
            state: self.state,
        }
    }

    pub fn resource_id(&self) -> ResourceId {
        ResourceId::Registry {
            path: self.link_path.clone(),
        }
    }
}

impl ManagedLink for RegistryLink {
    type Opened = OpenOutcome;
    type Closed = CloseOutcome;

    fn open(&mut self) -> Result<OpenOutcome> {
        RegistryLink::open(self)
    }

    fn close(&mut self) -> Result<CloseOutcome> {
        RegistryLink::close(self)
    }

    fn force_close(&mut self) -> Result<CloseOutcome> {
        RegistryLink::force_close(self)
    }

    fn describe(&self) -> String {
        format!("registry link '{}' -> '{}'", self.link_path, self.target_path)
    }
}
