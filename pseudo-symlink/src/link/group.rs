//! SUMMARY:
//! Bulk open/close/status over file-system and registry links.
use super::registry::RegistryLink;
use super::report::LinkReport;
use super::symlink::{record, FileSystemLink};
use super::{CloseOutcome, LinkStatus, ManagedLink, OpenOutcome};
use crate::Result;

/// One member of a `LinkGroup`.
#[derive(Debug)]
pub enum GroupMember {
    FileSystem(FileSystemLink),
    Registry(RegistryLink),
}

impl From<FileSystemLink> for GroupMember {
    fn from(link: FileSystemLink) -> Self {
        GroupMember::FileSystem(link)
    }
}

impl From<RegistryLink> for GroupMember {
    fn from(link: RegistryLink) -> Self {
        GroupMember::Registry(link)
    }
}

/// SUMMARY:
/// Members driven together, in the order they were added. No invariant is shared between them.
///
/// EXAMPLE:
/// ```rust
/// use pseudo_symlink::{platform::MemoryPlatform, Session};
/// use std::sync::Arc;
///
/// let session = Session::new(Arc::new(MemoryPlatform::new()));
/// let mut file = session.symlink();
/// file.add_link(r"C:\a\link")?;
/// file.set_target(r"C:\t.txt");
///
/// let mut group = session.group();
/// group.add(file);
/// group.add(session.registry_link(r"HKCU\Software\A", r"HKCU\Software\B")?);
///
/// let opened = group.open();
/// assert!(opened.is_success());
/// assert_eq!(group.status().len(), 3);
/// assert_eq!(group.close().removed_count(), 3);
/// # Ok::<_, pseudo_symlink::LinkError>(())
/// ```
#[derive(Debug, Default)]
pub struct LinkGroup {
    members: Vec<GroupMember>,
    keep_alive: bool,
}

impl LinkGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, member: impl Into<GroupMember>) {
        self.members.push(member.into());
    }

    #[inline]
    pub fn members(&self) -> &[GroupMember] {
        &self.members
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[inline]
    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    pub fn set_keep_alive(&mut self, keep_alive: bool) {
        self.keep_alive = keep_alive;
    }

    /// Open every member; failures are recorded per resource and do not stop the others.
    pub fn open(&mut self) -> LinkReport<OpenOutcome> {
        let mut report = LinkReport::new();
        for member in &mut self.members {
            match member {
                GroupMember::FileSystem(link) => report.extend(link.open()),
                GroupMember::Registry(link) => {
                    let result = link.open();
                    record(&mut report, link.resource_id(), result, "open");
                }
            }
        }
        report
    }

    pub fn close(&mut self) -> LinkReport<CloseOutcome> {
        self.teardown(false)
    }

    pub fn force_close(&mut self) -> LinkReport<CloseOutcome> {
        self.teardown(true)
    }

    /// SUMMARY:
    /// Close every member except file-system links marked `keep_alive`.
    ///
    /// DETAILS:
    /// This is what a `LinkGuard` runs on drop. `close` and `force_close` still reach keep-alive
    /// members.
    pub fn release(&mut self) -> LinkReport<CloseOutcome> {
        self.teardown_where(false, |member| match member {
            GroupMember::FileSystem(link) => !link.keep_alive(),
            GroupMember::Registry(_) => true,
        })
    }

    fn teardown(&mut self, force: bool) -> LinkReport<CloseOutcome> {
        self.teardown_where(force, |_| true)
    }

    fn teardown_where(
        &mut self,
        force: bool,
        include: impl Fn(&GroupMember) -> bool,
    ) -> LinkReport<CloseOutcome> {
        let mut report = LinkReport::new();
        for member in self.members.iter_mut().filter(|member| include(member)) {
            match member {
                GroupMember::FileSystem(link) if force => report.extend(link.force_close()),
                GroupMember::FileSystem(link) => report.extend(link.close()),
                GroupMember::Registry(link) => {
                    let result = if force { link.force_close() } else { link.close() };
                    record(&mut report, link.resource_id(), result, "close");
                }
            }
        }
        report
    }

    /// SUMMARY:
    /// (kind, link path, target path, ownership) of every primitive, in member order.
    pub fn status(&self) -> Vec<LinkStatus> {
        let mut status = Vec::new();
        for member in &self.members {
            match member {
                GroupMember::FileSystem(link) => status.extend(link.status()),
                GroupMember::Registry(link) => status.push(link.status()),
            }
        }
        status
    }
}

impl ManagedLink for LinkGroup {
    type Opened = LinkReport<OpenOutcome>;
    type Closed = LinkReport<CloseOutcome>;

    fn open(&mut self) -> Result<Self::Opened> {
        Ok(LinkGroup::open(self))
    }

    fn close(&mut self) -> Result<Self::Closed> {
        Ok(LinkGroup::close(self))
    }

    fn force_close(&mut self) -> Result<Self::Closed> {
        Ok(LinkGroup::force_close(self))
    }

    fn release(&mut self) -> Result<Self::Closed> {
        Ok(LinkGroup::release(self))
    }

    fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    fn describe(&self) -> String {
        format!("link group of {} member(s)", self.members.len())
    }
}
