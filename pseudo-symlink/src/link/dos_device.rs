//! SUMMARY:
//! Lifecycle of one object-manager namespace entry inside the staging directory.
use super::report::ResourceId;
use super::{
    key_of, same_native_path, CloseOutcome, LinkKind, LinkState, LinkStatus, ManagedLink,
    OpenOutcome,
};
use crate::error::LinkError;
use crate::session::Session;
use crate::Result;

use std::hash::{Hash, Hasher};
use tracing::{debug, info, warn};

/// SUMMARY:
/// The staging entry `name` resolving to the file `target`.
///
/// DETAILS:
/// `target` is kept in Win32 form (`C:\t.txt`); the definition itself uses the raw native
/// form (`\??\C:\t.txt`). The device name is derived from the session configuration, so two
/// sessions with different staging roots never see each other's entries.
///
/// With `LinkConfig::redefine_workaround` enabled every define and remove is issued twice.
///
/// EXAMPLE:
/// ```rust
/// use pseudo_symlink::{platform::MemoryPlatform, Session};
/// use std::sync::Arc;
///
/// let session = Session::new(Arc::new(MemoryPlatform::new()));
/// let mut device = session.dos_device("link", r"C:\t.txt");
/// assert!(device.open()?.created());
/// assert_eq!(device.current_target()?.as_deref(), Some(r"C:\t.txt"));
/// assert!(device.close()?.removed());
/// # Ok::<_, pseudo_symlink::LinkError>(())
/// ```
#[derive(Debug)]
pub struct ObjectNamespaceLink {
    session: Session,
    name: String,
    target: String,
    state: LinkState,
    // Raw target actually defined by `open`; teardown verifies against this value.
    defined_target: Option<String>,
}

impl ObjectNamespaceLink {
    pub(crate) fn new(session: Session, name: String, target: String) -> Self {
        Self {
            session,
            name,
            target,
            state: LinkState::NotOpened,
            defined_target: None,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn target(&self) -> &str {
        &self.target
    }

    #[inline]
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Name passed to the device calls (`Global\GLOBALROOT\RPC Control\<name>`).
    pub fn device_name(&self) -> String {
        self.session.device_name(&self.name)
    }

    /// Raw native form of `target` as stored in the definition.
    pub fn raw_target(&self) -> String {
        self.session.raw_target(&self.target)
    }

    /// Point the entry at `target` from the next `open` on. A definition this instance owns is
    /// replaced by that `open`; any other definition is untouched.
    pub fn set_target(&mut self, target: impl Into<String>) {
        self.target = target.into();
    }

    /// SUMMARY:
    /// Define the entry, or observe an existing definition with the same name.
    ///
    /// RETURNS:
    /// - `OpenOutcome::Created`: Defined by this instance. An owned definition of an earlier
    ///   target is removed and redefined.
    /// - `OpenOutcome::AlreadyPresent`: Already resolves to `target`; nothing was written.
    /// - `OpenOutcome::Conflict`: Resolves to another target. Another definition cannot be
    ///   overwritten safely, so it is left as is and reported.
    ///
    /// ERRORS:
    /// - `LinkError::DeviceQueryFailed` / `LinkError::DeviceDefineFailed`: Native call failed.
    pub fn open(&mut self) -> Result<OpenOutcome> {
        let device = self.device_name();
        let raw = self.raw_target();

        match self.query(&device)? {
            Some(existing) if same_native_path(&existing, &raw) => {
                debug!(device = %device, "device already defined");
                if !self.state.is_owned() {
                    self.state = LinkState::ObservedExisting;
                }
                return Ok(OpenOutcome::AlreadyPresent);
            }
            Some(existing) if self.owns_definition(&existing) => {
                debug!(device = %device, old = %existing, new = %raw, "retargeting owned device");
                self.remove(&device, &existing)?;
                self.finish();
            }
            Some(existing) => {
                let actual = self.session.strip_raw_target(&existing);
                warn!(
                    device = %device,
                    expected = %self.target,
                    actual = %actual,
                    "device already defined with another target"
                );
                if !self.state.is_owned() {
                    self.state = LinkState::ObservedExisting;
                }
                return Ok(OpenOutcome::Conflict { actual });
            }
            None => {}
        }

        self.define(&device, &raw)?;
        if self.session.config().redefine_workaround {
            if let Err(e) = self.define(&device, &raw) {
                let platform = self.session.platform();
                if let Err(rollback) = platform.remove_dos_device(&device, &raw) {
                    warn!(device = %device, error = %rollback, "could not undo first definition");
                }
                return Err(e);
            }
        }

        self.defined_target = Some(raw);
        self.state = LinkState::OwnedOpen;
        info!(device = %device, target = %self.target, "device defined");
        Ok(OpenOutcome::Created)
    }

    fn owns_definition(&self, current: &str) -> bool {
        self.state.is_owned()
            && self
                .defined_target
                .as_deref()
                .is_some_and(|defined| same_native_path(current, defined))
    }

    fn define(&self, device: &str, raw: &str) -> Result<()> {
        debug!(device = %device, target = %raw, "defining device");
        self.session
            .platform()
            .define_dos_device(device, raw)
            .map_err(|source| LinkError::DeviceDefineFailed {
                name: device.to_owned(),
                target: raw.to_owned(),
                source,
            })
    }

    fn query(&self, device: &str) -> Result<Option<String>> {
        self.session
            .platform()
            .query_dos_device(device)
            .map_err(|source| LinkError::DeviceQueryFailed {
                name: device.to_owned(),
                source,
            })
    }

    /// SUMMARY:
    /// Remove the definition if this instance created it and it still resolves to the target
    /// it was defined with.
    pub fn close(&mut self) -> Result<CloseOutcome> {
        if !self.state.is_owned() {
            debug!(name = %self.name, state = ?self.state, "device not owned");
            return Ok(CloseOutcome::NotOwned);
        }
        self.teardown(false)
    }

    /// Remove the current definition of the entry, whatever it resolves to.
    pub fn force_close(&mut self) -> Result<CloseOutcome> {
        self.teardown(true)
    }

    fn teardown(&mut self, force: bool) -> Result<CloseOutcome> {
        let device = self.device_name();
        let expected = self
            .defined_target
            .clone()
            .unwrap_or_else(|| self.raw_target());

        let Some(current) = self.query(&device)? else {
            debug!(device = %device, "device already gone");
            self.finish();
            return Ok(CloseOutcome::Vanished);
        };

        if !force && !same_native_path(&current, &expected) {
            let actual = self.session.strip_raw_target(&current);
            warn!(
                device = %device,
                expected = %expected,
                actual = %actual,
                "device redefined; leaving it in place"
            );
            self.finish();
            return Ok(CloseOutcome::TargetMismatch {
                actual: Some(actual),
            });
        }

        self.remove(&device, &current)?;
        self.finish();
        info!(device = %device, "device removed");
        Ok(CloseOutcome::Removed)
    }

    fn remove(&self, device: &str, current: &str) -> Result<()> {
        let platform = self.session.platform();
        debug!(device = %device, target = %current, "removing device");
        platform
            .remove_dos_device(device, current)
            .map_err(|source| LinkError::DeviceRemoveFailed {
                name: device.to_owned(),
                source,
            })?;
        if self.session.config().redefine_workaround {
            // The duplicate definition may already be gone.
            if let Err(e) = platform.remove_dos_device(device, current) {
                debug!(device = %device, error = %e, "second removal skipped");
            }
        }
        Ok(())
    }

    fn finish(&mut self) {
        self.state = LinkState::Closed;
        self.defined_target = None;
    }

    /// Win32 form of what the entry currently resolves to, re-read from the namespace.
    pub fn current_target(&self) -> Result<Option<String>> {
        let device = self.device_name();
        Ok(self
            .query(&device)?
            .map(|native| self.session.strip_raw_target(&native)))
    }

    /// SUMMARY:
    /// Resolve the staging entry `name` in `session` without constructing a link.
    pub fn get_target(session: &Session, name: &str) -> Result<Option<String>> {
        let device = session.device_name(name);
        let native = session
            .platform()
            .query_dos_device(&device)
            .map_err(|source| LinkError::DeviceQueryFailed {
                name: device.clone(),
                source,
            })?;
        Ok(native.map(|n| session.strip_raw_target(&n)))
    }

    pub fn status(&self) -> LinkStatus {
        LinkStatus {
            kind: LinkKind::DosDevice,
            link_path: self.session.staging_path(&self.name),
            target_path: self.target.clone(),
            state: self.state,
        }
    }

    pub fn resource_id(&self) -> ResourceId {
        ResourceId::DosDevice {
            name: self.name.clone(),
        }
    }
}

impl PartialEq for ObjectNamespaceLink {
    fn eq(&self, other: &Self) -> bool {
        self.name.eq_ignore_ascii_case(&other.name) && same_native_path(&self.target, &other.target)
    }
}

impl Eq for ObjectNamespaceLink {}

impl Hash for ObjectNamespaceLink {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.to_ascii_lowercase().hash(state);
        key_of(&self.target).hash(state);
    }
}

impl ManagedLink for ObjectNamespaceLink {
    type Opened = OpenOutcome;
    type Closed = CloseOutcome;

    fn open(&mut self) -> Result<OpenOutcome> {
        ObjectNamespaceLink::open(self)
    }

    fn close(&mut self) -> Result<CloseOutcome> {
        ObjectNamespaceLink::close(self)
    }

    fn force_close(&mut self) -> Result<CloseOutcome> {
        ObjectNamespaceLink::force_close(self)
    }

    fn describe(&self) -> String {
        format!("device '{}' -> '{}'", self.session.staging_path(&self.name), self.target)
    }
}
