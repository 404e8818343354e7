//! SUMMARY:
//! The pseudo-symlink: junctions into the staging directory plus devices resolving to one target.
//!
//! DETAILS:
//! For a link path `C:\a\b\link` the parent `C:\a\b` becomes a junction to the staging directory
//! and the file name `link` becomes a staging entry resolving to the target. Opening
//! `C:\a\b\link` then traverses the junction into the staging directory and follows the entry.
use super::dos_device::ObjectNamespaceLink;
use super::junction::Junction;
use super::report::{LinkReport, ResourceId};
use super::{CloseOutcome, LinkStatus, ManagedLink, OpenOutcome};
use crate::error::LinkError;
use crate::session::Session;
use crate::Result;

use std::path::{Path, PathBuf};
use tracing::warn;

/// SUMMARY:
/// Any number of link paths sharing one redirection target.
///
/// DETAILS:
/// Junctions and devices are deduplicated: link paths sharing a directory share one junction,
/// and link paths sharing a file name share one device. Every device always resolves to the
/// current target; `set_target` retargets all of them.
///
/// EXAMPLE:
/// ```rust
/// use pseudo_symlink::{platform::MemoryPlatform, Session};
/// use std::sync::Arc;
///
/// let session = Session::new(Arc::new(MemoryPlatform::new()));
/// let mut link = session.symlink();
/// link.add_link(r"C:\a\b\link1")?;
/// link.add_link(r"C:\a\b\link2")?;
/// link.set_target(r"C:\t.txt");
/// assert_eq!(link.junctions().len(), 1);
/// assert_eq!(link.devices().len(), 2);
/// # Ok::<_, pseudo_symlink::LinkError>(())
/// ```
#[derive(Debug)]
pub struct FileSystemLink {
    session: Session,
    target: Option<String>,
    junctions: Vec<Junction>,
    devices: Vec<ObjectNamespaceLink>,
    links: Vec<PathBuf>,
    keep_alive: bool,
}

impl FileSystemLink {
    pub(crate) fn new(session: Session) -> Self {
        Self {
            session,
            target: None,
            junctions: Vec::new(),
            devices: Vec::new(),
            links: Vec::new(),
            keep_alive: false,
        }
    }

    /// SUMMARY:
    /// Register `path` as a link resolving to the shared target.
    ///
    /// PARAMETERS:
    /// - `path` (`AsRef<Path>`): `<directory>\<name>`; the directory is made absolute.
    ///
    /// ERRORS:
    /// - `LinkError::InvalidLinkPath`: No parent directory, or no (UTF-8) file name.
    pub fn add_link(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let (parent, name) = path
            .to_str()
            .and_then(split_link_path)
            .ok_or_else(|| LinkError::invalid_link_path(path))?;
        let parent = self
            .session
            .platform()
            .absolute_path(Path::new(&parent))
            .map_err(|_| LinkError::invalid_link_path(path))?;

        let junction = self.session.staging_junction(&parent);
        if !self.junctions.contains(&junction) {
            self.junctions.push(junction);
        }
        let device = self
            .session
            .dos_device(name, self.target.clone().unwrap_or_default());
        if !self.devices.contains(&device) {
            self.devices.push(device);
        }
        let parent = parent.to_string_lossy();
        self.links
            .push(PathBuf::from(format!(r"{}\{name}", parent.trim_end_matches('\\'))));
        Ok(())
    }

    /// Change the shared target and retarget every device.
    pub fn set_target(&mut self, target: impl Into<String>) {
        let target = target.into();
        for device in &mut self.devices {
            device.set_target(target.clone());
        }
        self.target = Some(target);

        let mut unique: Vec<ObjectNamespaceLink> = Vec::with_capacity(self.devices.len());
        for device in self.devices.drain(..) {
            if !unique.contains(&device) {
                unique.push(device);
            }
        }
        self.devices = unique;
    }

    #[inline]
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    #[inline]
    pub fn junctions(&self) -> &[Junction] {
        &self.junctions
    }

    #[inline]
    pub fn devices(&self) -> &[ObjectNamespaceLink] {
        &self.devices
    }

    /// Absolute link paths added so far, in insertion order.
    #[inline]
    pub fn links(&self) -> &[PathBuf] {
        &self.links
    }

    #[inline]
    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Leave the links in place when a `LinkGuard` holding this aggregate is dropped.
    pub fn set_keep_alive(&mut self, keep_alive: bool) {
        self.keep_alive = keep_alive;
    }

    /// SUMMARY:
    /// Open every junction, then every device.
    ///
    /// DETAILS:
    /// A failure on one sub-resource does not stop or roll back the others; each result is
    /// recorded against its resource. Without a target the report holds a single
    /// `LinkError::MissingTarget` and no native call is issued.
    pub fn open(&mut self) -> LinkReport<OpenOutcome> {
        let mut report = LinkReport::new();
        if self.target.as_deref().map_or(true, str::is_empty) {
            report.push(self.resource_id(), Err(LinkError::MissingTarget));
            return report;
        }
        for junction in &mut self.junctions {
            let result = junction.open();
            record(&mut report, junction.resource_id(), result, "open");
        }
        for device in &mut self.devices {
            let result = device.open();
            record(&mut report, device.resource_id(), result, "open");
        }
        report
    }

    /// Close every device, then every junction, each subject to its own ownership.
    pub fn close(&mut self) -> LinkReport<CloseOutcome> {
        self.teardown(false)
    }

    pub fn force_close(&mut self) -> LinkReport<CloseOutcome> {
        self.teardown(true)
    }

    // Devices go first so no staging entry outlives the junction that exposes it.
    fn teardown(&mut self, force: bool) -> LinkReport<CloseOutcome> {
        let mut report = LinkReport::new();
        for device in &mut self.devices {
            let result = if force { device.force_close() } else { device.close() };
            record(&mut report, device.resource_id(), result, "close");
        }
        for junction in &mut self.junctions {
            let result = if force {
                junction.force_close()
            } else {
                junction.close()
            };
            record(&mut report, junction.resource_id(), result, "close");
        }
        report
    }

    pub fn status(&self) -> Vec<LinkStatus> {
        self.junctions
            .iter()
            .map(Junction::status)
            .chain(self.devices.iter().map(ObjectNamespaceLink::status))
            .collect()
    }

    pub fn resource_id(&self) -> ResourceId {
        ResourceId::FileSystemLink {
            target: self.target.clone(),
        }
    }
}

// Link paths use Windows separators on every host; `C:\link` keeps its drive root.
fn split_link_path(path: &str) -> Option<(String, &str)> {
    let index = path.rfind(['\\', '/'])?;
    let (parent, name) = (&path[..index], &path[index + 1..]);
    if parent.is_empty() || name.is_empty() {
        return None;
    }
    let parent = if parent.ends_with(':') {
        format!(r"{parent}\")
    } else {
        parent.replace('/', "\\")
    };
    Some((parent, name))
}

pub(crate) fn record<T>(
    report: &mut LinkReport<T>,
    resource: ResourceId,
    result: Result<T>,
    operation: &str,
) {
    if let Err(e) = &result {
        warn!(resource = %resource, error = %e, "{operation} failed");
    }
    report.push(resource, result);
}

impl ManagedLink for FileSystemLink {
    type Opened = LinkReport<OpenOutcome>;
    type Closed = LinkReport<CloseOutcome>;

    fn open(&mut self) -> Result<Self::Opened> {
        Ok(FileSystemLink::open(self))
    }

    fn close(&mut self) -> Result<Self::Closed> {
        Ok(FileSystemLink::close(self))
    }

    fn force_close(&mut self) -> Result<Self::Closed> {
        Ok(FileSystemLink::force_close(self))
    }

    fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    fn describe(&self) -> String {
        format!(
            "symlink {:?} -> '{}'",
            self.links,
            self.target.as_deref().unwrap_or_default()
        )
    }
}
