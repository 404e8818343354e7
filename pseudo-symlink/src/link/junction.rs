//! SUMMARY:
//! Lifecycle of one directory mount point (junction).
use super::report::ResourceId;
use super::{
    key_of, same_native_path, CloseOutcome, LinkKind, LinkState, LinkStatus, ManagedLink,
    OpenOutcome,
};
use crate::config::Conflict;
use crate::error::LinkError;
use crate::platform::Platform;
use crate::reparse;
use crate::session::Session;
use crate::Result;

use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// SUMMARY:
/// A reparse point at `base_dir` redirecting traversal to the native path `target_dir`.
///
/// DETAILS:
/// Construction has no OS effect. `open` creates the reparse point (and the directory when it
/// is missing); `close` removes only what that `open` created. Two junctions are equal when
/// their directories and targets match case-insensitively.
///
/// EXAMPLE:
/// ```rust
/// use pseudo_symlink::{platform::MemoryPlatform, LinkState, Session};
/// use std::sync::Arc;
///
/// let platform = Arc::new(MemoryPlatform::new());
/// let session = Session::new(platform.clone());
/// let mut junction = session.staging_junction(r"C:\a\b");
/// assert!(junction.open()?.created());
/// assert_eq!(junction.state(), LinkState::OwnedOpen);
/// assert_eq!(
///     junction.current_target()?.as_deref(),
///     Some(r"\RPC Control")
/// );
/// junction.close()?;
/// assert_eq!(junction.current_target()?, None);
/// # Ok::<_, pseudo_symlink::LinkError>(())
/// ```
#[derive(Debug)]
pub struct Junction {
    session: Session,
    base_dir: PathBuf,
    target_dir: String,
    state: LinkState,
    owns_directory: bool,
}

impl Junction {
    pub(crate) fn new(session: Session, base_dir: PathBuf, target_dir: String) -> Self {
        let target_dir = session.raw_target(&target_dir);
        Self {
            session,
            base_dir,
            target_dir,
            state: LinkState::NotOpened,
            owns_directory: false,
        }
    }

    #[inline]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Native path the junction redirects to.
    #[inline]
    pub fn target_dir(&self) -> &str {
        &self.target_dir
    }

    #[inline]
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// `true` while this instance created `base_dir` and will remove it on close.
    #[inline]
    pub fn owns_directory(&self) -> bool {
        self.owns_directory
    }

    /// SUMMARY:
    /// Create the reparse point, or observe an identical one already in place.
    ///
    /// DETAILS:
    /// The buffer is encoded before any native call, so an oversized target never touches the
    /// filesystem. A non-empty directory or a junction to another target is a conflict that
    /// the session's prompt or policy must approve before anything is deleted.
    ///
    /// RETURNS:
    /// - `OpenOutcome::Created`: The reparse point was set; the instance owns it.
    /// - `OpenOutcome::AlreadyPresent`: `base_dir` already redirects to `target_dir`. An owned
    ///   junction stays owned; otherwise the state becomes `ObservedExisting`.
    ///
    /// ERRORS:
    /// - `LinkError::BufferTooLarge`: `target_dir` does not fit the reparse path buffer.
    /// - `LinkError::DirectoryNotEmpty` / `LinkError::JunctionConflict`: Conflict refused.
    /// - `LinkError::DirectoryCreateFailed`, `LinkError::ReparseQueryFailed`,
    ///   `LinkError::ReparseSetFailed`, `LinkError::ReparseDeleteFailed`: Native call failed.
    pub fn open(&mut self) -> Result<OpenOutcome> {
        let buffer = reparse::encode_mount_point(&self.target_dir)?;
        let platform = self.session.platform();

        let mut created_directory = false;
        if !platform.dir_exists(&self.base_dir) {
            debug!(path = %self.base_dir.display(), "creating junction directory");
            platform
                .create_dir(&self.base_dir)
                .map_err(|e| LinkError::directory_create_failed(&self.base_dir, e))?;
            created_directory = true;
        }

        let prepared = self.prepare_directory(platform);
        let existing = match prepared {
            Ok(existing) => existing,
            Err(e) => {
                if created_directory {
                    self.rollback_directory(platform);
                }
                return Err(e);
            }
        };
        if let Some(outcome) = existing {
            if !self.state.is_owned() {
                self.state = LinkState::ObservedExisting;
            }
            return Ok(outcome);
        }

        debug!(
            path = %self.base_dir.display(),
            target = %self.target_dir,
            "setting mount point"
        );
        if let Err(e) = platform.set_reparse_point(&self.base_dir, buffer.as_bytes()) {
            if created_directory {
                self.rollback_directory(platform);
            }
            return Err(LinkError::reparse_set_failed(&self.base_dir, e));
        }

        self.owns_directory = self.owns_directory || created_directory;
        self.state = LinkState::OwnedOpen;
        info!(
            path = %self.base_dir.display(),
            target = %self.target_dir,
            "junction created"
        );
        Ok(OpenOutcome::Created)
    }

    // Returns `Some(AlreadyPresent)` when nothing needs to be written, `None` when the directory
    // is now an empty, plain directory ready for the reparse point.
    fn prepare_directory(&self, platform: &dyn Platform) -> Result<Option<OpenOutcome>> {
        match Self::get_target(platform, &self.base_dir)? {
            Some(existing) if same_native_path(&existing, &self.target_dir) => {
                debug!(path = %self.base_dir.display(), "junction already in place");
                Ok(Some(OpenOutcome::AlreadyPresent))
            }
            Some(existing) => {
                let conflict = Conflict::ForeignJunction {
                    path: self.base_dir.clone(),
                    existing: existing.clone(),
                };
                if !self.session.authorize(&conflict) {
                    warn!(%conflict, "junction replacement refused");
                    return Err(LinkError::JunctionConflict {
                        path: self.base_dir.clone(),
                        existing,
                    });
                }
                warn!(%conflict, "replacing junction");
                let empty = reparse::encode_empty();
                platform
                    .delete_reparse_point(&self.base_dir, empty.as_bytes())
                    .map_err(|e| LinkError::reparse_delete_failed(&self.base_dir, e))?;
                Ok(None)
            }
            None => {
                let is_empty = platform
                    .dir_is_empty(&self.base_dir)
                    .map_err(|e| LinkError::handle_open_failed(&self.base_dir, e))?;
                if !is_empty {
                    let conflict = Conflict::NonEmptyDirectory {
                        path: self.base_dir.clone(),
                    };
                    if !self.session.authorize(&conflict) {
                        warn!(%conflict, "clearing directory refused");
                        return Err(LinkError::DirectoryNotEmpty {
                            path: self.base_dir.clone(),
                        });
                    }
                    warn!(%conflict, "clearing directory");
                    platform
                        .clear_dir(&self.base_dir)
                        .map_err(|e| LinkError::directory_remove_failed(&self.base_dir, e))?;
                }
                Ok(None)
            }
        }
    }

    fn rollback_directory(&self, platform: &dyn Platform) {
        if let Err(e) = platform.remove_dir(&self.base_dir) {
            warn!(
                path = %self.base_dir.display(),
                error = %e,
                "could not remove junction directory after failed open"
            );
        }
    }

    /// SUMMARY:
    /// Remove the junction if this instance created it and it still points at `target_dir`.
    ///
    /// RETURNS:
    /// - `CloseOutcome::NotOwned`: Not opened by this instance; no native call was issued.
    /// - `CloseOutcome::TargetMismatch`: Redirected elsewhere since `open`; left in place.
    /// - `CloseOutcome::Vanished`: The reparse point is already gone.
    /// - `CloseOutcome::Removed`: Reparse point deleted (and the owned directory removed).
    pub fn close(&mut self) -> Result<CloseOutcome> {
        if !self.state.is_owned() {
            debug!(path = %self.base_dir.display(), state = ?self.state, "junction not owned");
            return Ok(CloseOutcome::NotOwned);
        }
        self.teardown(false)
    }

    /// Remove whatever mount point is at `base_dir`, skipping ownership and target checks.
    pub fn force_close(&mut self) -> Result<CloseOutcome> {
        self.teardown(true)
    }

    fn teardown(&mut self, force: bool) -> Result<CloseOutcome> {
        let session = self.session.clone();
        let platform = session.platform();
        let current = Self::get_target(platform, &self.base_dir)?;

        let Some(current) = current else {
            debug!(path = %self.base_dir.display(), "junction already gone");
            self.remove_owned_directory(platform, true)?;
            self.state = LinkState::Closed;
            return Ok(CloseOutcome::Vanished);
        };

        if !force && !same_native_path(&current, &self.target_dir) {
            warn!(
                path = %self.base_dir.display(),
                expected = %self.target_dir,
                actual = %current,
                "junction target changed; leaving it in place"
            );
            self.state = LinkState::Closed;
            self.owns_directory = false;
            return Ok(CloseOutcome::TargetMismatch {
                actual: Some(current),
            });
        }

        debug!(path = %self.base_dir.display(), "deleting mount point");
        let empty = reparse::encode_empty();
        platform
            .delete_reparse_point(&self.base_dir, empty.as_bytes())
            .map_err(|e| LinkError::reparse_delete_failed(&self.base_dir, e))?;
        self.remove_owned_directory(platform, false)?;
        self.state = LinkState::Closed;
        info!(path = %self.base_dir.display(), "junction removed");
        Ok(CloseOutcome::Removed)
    }

    // After the mount point is gone the directory is empty unless someone else has filled it;
    // a vanished link only takes the directory along when it is still empty.
    fn remove_owned_directory(&mut self, platform: &dyn Platform, only_if_empty: bool) -> Result<()> {
        if !self.owns_directory || !platform.dir_exists(&self.base_dir) {
            self.owns_directory = false;
            return Ok(());
        }
        if only_if_empty && !matches!(platform.dir_is_empty(&self.base_dir), Ok(true)) {
            self.owns_directory = false;
            return Ok(());
        }
        debug!(path = %self.base_dir.display(), "removing junction directory");
        platform
            .remove_dir(&self.base_dir)
            .map_err(|e| LinkError::directory_remove_failed(&self.base_dir, e))?;
        self.owns_directory = false;
        Ok(())
    }

    /// Target currently stored at `base_dir`, re-read from the filesystem.
    pub fn current_target(&self) -> Result<Option<String>> {
        Self::get_target(self.session.platform(), &self.base_dir)
    }

    /// SUMMARY:
    /// Read the mount-point target of `base_dir`.
    ///
    /// RETURNS:
    /// - `Ok(None)`: `base_dir` does not exist, is not a reparse point, or carries a reparse
    ///   point of another kind.
    ///
    /// ERRORS:
    /// - `LinkError::ReparseQueryFailed`: The query failed for another reason.
    /// - `LinkError::MalformedReparseBuffer`: The returned buffer is truncated.
    pub fn get_target(platform: &dyn Platform, base_dir: &Path) -> Result<Option<String>> {
        if !platform.dir_exists(base_dir) {
            return Ok(None);
        }
        let buffer = platform
            .get_reparse_point(base_dir)
            .map_err(|e| LinkError::reparse_query_failed(base_dir, e))?;
        match buffer {
            Some(bytes) => reparse::decode_mount_point(&bytes),
            None => Ok(None),
        }
    }

    pub fn status(&self) -> LinkStatus {
        LinkStatus {
            kind: LinkKind::Junction,
            link_path: self.base_dir.display().to_string(),
            target_path: self.target_dir.clone(),
            state: self.state,
        }
    }

    pub fn resource_id(&self) -> ResourceId {
        ResourceId::Junction {
            base_dir: self.base_dir.clone(),
        }
    }
}

impl PartialEq for Junction {
    fn eq(&self, other: &Self) -> bool {
        same_native_path(&self.base_dir.to_string_lossy(), &other.base_dir.to_string_lossy())
            && same_native_path(&self.target_dir, &other.target_dir)
    }
}

impl Eq for Junction {}

impl Hash for Junction {
    fn hash<H: Hasher>(&self, state: &mut H) {
        key_of(&self.base_dir.to_string_lossy()).hash(state);
        key_of(&self.target_dir).hash(state);
    }
}

impl ManagedLink for Junction {
    type Opened = OpenOutcome;
    type Closed = CloseOutcome;

    fn open(&mut self) -> Result<OpenOutcome> {
        Junction::open(self)
    }

    fn close(&mut self) -> Result<CloseOutcome> {
        Junction::close(self)
    }

    fn force_close(&mut self) -> Result<CloseOutcome> {
        Junction::force_close(self)
    }

    fn describe(&self) -> String {
        format!("junction '{}' -> '{}'", self.base_dir.display(), self.target_dir)
    }
}
