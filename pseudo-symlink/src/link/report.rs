//! Per-resource results of composite operations.
//!
//! A composite never aborts on the first failing sub-resource: every member is attempted and
//! its own result is recorded against it, in the order the operation visited it.
use super::{CloseOutcome, OpenOutcome};
use crate::error::LinkError;
use crate::Result;

use std::fmt;
use std::path::PathBuf;

/// Identifies the sub-resource a `ReportEntry` belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceId {
    Junction { base_dir: PathBuf },
    DosDevice { name: String },
    Registry { path: String },
    /// A whole pseudo-symlink; used when the aggregate itself rejects the call.
    FileSystemLink { target: Option<String> },
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceId::Junction { base_dir } => write!(f, "junction '{}'", base_dir.display()),
            ResourceId::DosDevice { name } => write!(f, "device '{name}'"),
            ResourceId::Registry { path } => write!(f, "registry link '{path}'"),
            ResourceId::FileSystemLink { target: Some(target) } => {
                write!(f, "symlink -> '{target}'")
            }
            ResourceId::FileSystemLink { target: None } => f.write_str("symlink (no target)"),
        }
    }
}

#[derive(Debug)]
pub struct ReportEntry<T> {
    pub resource: ResourceId,
    pub result: Result<T>,
}

/// SUMMARY:
/// Ordered, per-resource results of one composite `open`, `close` or `force_close`.
///
/// EXAMPLE:
/// ```rust
/// use pseudo_symlink::{platform::MemoryPlatform, Session};
/// use std::sync::Arc;
///
/// let session = Session::new(Arc::new(MemoryPlatform::new()));
/// let mut link = session.symlink();
/// link.set_target(r"C:\t.txt");
/// link.add_link(r"C:\a\b\link")?;
/// let report = link.open();
/// assert!(report.is_success());
/// assert_eq!(report.created_count(), 2);
/// # Ok::<_, pseudo_symlink::LinkError>(())
/// ```
#[derive(Debug)]
pub struct LinkReport<T> {
    entries: Vec<ReportEntry<T>>,
}

impl<T> Default for LinkReport<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> LinkReport<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, resource: ResourceId, result: Result<T>) {
        self.entries.push(ReportEntry { resource, result });
    }

    pub fn extend(&mut self, other: LinkReport<T>) {
        self.entries.extend(other.entries);
    }

    #[inline]
    pub fn entries(&self) -> &[ReportEntry<T>] {
        &self.entries
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `true` when every visited resource succeeded.
    pub fn is_success(&self) -> bool {
        self.entries.iter().all(|entry| entry.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&ResourceId, &LinkError)> {
        self.entries
            .iter()
            .filter_map(|entry| entry.result.as_ref().err().map(|e| (&entry.resource, e)))
    }

    /// SUMMARY:
    /// Collapse the report into the successful values, or the first error encountered.
    pub fn into_result(self) -> Result<Vec<T>> {
        self.entries.into_iter().map(|entry| entry.result).collect()
    }
}

impl LinkReport<OpenOutcome> {
    pub fn created_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(&entry.result, Ok(outcome) if outcome.created()))
            .count()
    }
}

impl LinkReport<CloseOutcome> {
    pub fn removed_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(&entry.result, Ok(outcome) if outcome.removed()))
            .count()
    }
}

impl<T> IntoIterator for LinkReport<T> {
    type Item = ReportEntry<T>;
    type IntoIter = std::vec::IntoIter<ReportEntry<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
