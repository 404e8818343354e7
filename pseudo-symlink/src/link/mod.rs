//! SUMMARY:
//! Link primitives, their composites, and the ownership-tracked lifecycle they share.
//!
//! OVERVIEW:
//! - `Junction`: one directory mount point.
//! - `ObjectNamespaceLink`: one DOS-device entry inside the staging directory.
//! - `RegistryLink`: one native registry symbolic link.
//! - `FileSystemLink`: junctions + devices sharing one target (the pseudo-symlink).
//! - `LinkGroup`: any number of file-system and registry links, driven together.
//!
//! Ownership is creation based. A primitive only tears down an OS object that its own
//! `open` brought into existence (`LinkState::OwnedOpen`); anything it merely found in place
//! is `ObservedExisting` and survives `close`.
pub mod dos_device;
pub mod group;
pub mod guard;
pub mod junction;
pub mod registry;
pub mod report;
pub mod symlink;

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// SUMMARY:
/// Lifecycle position of one link primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LinkState {
    /// Constructed, no OS call issued yet.
    #[default]
    NotOpened,
    /// This instance created the OS object and is responsible for removing it.
    OwnedOpen,
    /// The OS object was already in place when `open` ran; `close` leaves it alone.
    ObservedExisting,
    /// Torn down, or ownership relinquished after the object changed underneath.
    Closed,
}

impl LinkState {
    #[inline]
    pub fn is_owned(self) -> bool {
        self == LinkState::OwnedOpen
    }
}

/// SUMMARY:
/// Result of a successful `open`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    /// A new OS object was created and is owned by the instance.
    Created,
    /// An identical object already existed; nothing was modified.
    AlreadyPresent,
    /// An object with the same name points elsewhere; it was left untouched.
    Conflict { actual: String },
}

impl OpenOutcome {
    #[inline]
    pub fn created(&self) -> bool {
        matches!(self, OpenOutcome::Created)
    }
}

/// SUMMARY:
/// Result of a successful `close` / `force_close`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    /// The OS object was removed.
    Removed,
    /// The instance does not own the object; no OS call was issued.
    NotOwned,
    /// The object now points at `actual` (or, for `None`, is no longer a link) and was left alone.
    TargetMismatch { actual: Option<String> },
    /// The object had already disappeared.
    Vanished,
}

impl CloseOutcome {
    #[inline]
    pub fn removed(&self) -> bool {
        matches!(self, CloseOutcome::Removed)
    }
}

/// Kind of primitive a `LinkStatus` describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LinkKind {
    Junction,
    DosDevice,
    Registry,
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LinkKind::Junction => "junction",
            LinkKind::DosDevice => "device",
            LinkKind::Registry => "registry",
        })
    }
}

/// SUMMARY:
/// Read-only diagnostic snapshot of one primitive: (type, link path, target path, ownership).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinkStatus {
    pub kind: LinkKind,
    pub link_path: String,
    pub target_path: String,
    pub state: LinkState,
}

impl LinkStatus {
    #[inline]
    pub fn owned(&self) -> bool {
        self.state.is_owned()
    }
}

/// SUMMARY:
/// Common open/close surface, so links can be held by a `LinkGuard`.
pub trait ManagedLink {
    type Opened;
    type Closed;

    fn open(&mut self) -> crate::Result<Self::Opened>;

    /// Tear down what this instance owns; never touches observed or foreign objects.
    fn close(&mut self) -> crate::Result<Self::Closed>;

    /// Tear down regardless of ownership and target checks.
    fn force_close(&mut self) -> crate::Result<Self::Closed>;

    /// When `true`, a guard releases the link without closing it.
    fn keep_alive(&self) -> bool {
        false
    }

    /// Automatic teardown run when a guard drops the link. Composites skip keep-alive members.
    fn release(&mut self) -> crate::Result<Self::Closed> {
        self.close()
    }

    fn describe(&self) -> String;
}

// Native namespaces compare case-insensitively; a trailing separator is not significant.
pub(crate) fn same_native_path(a: &str, b: &str) -> bool {
    a.trim_end_matches('\\')
        .eq_ignore_ascii_case(b.trim_end_matches('\\'))
}

pub(crate) fn key_of(value: &str) -> String {
    value.trim_end_matches('\\').to_ascii_lowercase()
}

#[cfg(test)]
mod tests;
