//! SUMMARY:
//! Define the crate-wide error type for link creation, verification and teardown.
//!
//! OVERVIEW:
//! `LinkError` covers four families of failure:
//! - configuration errors (missing target, malformed link or registry paths), rejected
//!   before any native call is issued;
//! - conflicts that need an explicit decision (`DirectoryNotEmpty`, `JunctionConflict`,
//!   `KeyNotLink`) and were refused by the active `ConflictPolicy`;
//! - native call failures, which carry the underlying `std::io::Error` and therefore the
//!   raw OS error code;
//! - codec errors (`BufferTooLarge`), rejected before any native call.
//!
//! A target that changed underneath an owned link is not an error. It is reported as an
//! outcome (`CloseOutcome::TargetMismatch`, `OpenOutcome::Conflict`).
use std::error::Error;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

const MAX_ERROR_PATH_LEN: usize = 256;

// Internal helper: render error-friendly path display (truncate long values).
pub(crate) fn truncate_path_display(path: &Path, max_len: usize) -> String {
    truncate_display(&path.to_string_lossy(), max_len)
}

pub(crate) fn truncate_display(value: &str, max_len: usize) -> String {
    let char_count = value.chars().count();
    if char_count <= max_len {
        return value.to_owned();
    }
    let keep = max_len.saturating_sub(5) / 2;
    let start: String = value.chars().take(keep).collect();
    let mut tail_chars: Vec<char> = value.chars().rev().take(keep).collect();
    tail_chars.reverse();
    let end: String = tail_chars.into_iter().collect();
    format!("{start}...{end}")
}

/// SUMMARY:
/// Represent errors produced while opening, verifying or closing pseudo-symlinks.
///
/// DETAILS:
/// Every variant that wraps a native failure keeps the `io::Error` as its `source`, so
/// `err.source()` and `raw_os_error()` expose the OS error code. Paths embedded in the
/// `Display` output are truncated to keep messages bounded.
#[derive(Debug)]
pub enum LinkError {
    /// A `FileSystemLink` was opened before a target was set.
    MissingTarget,
    /// A link path has no parent directory or no file name component.
    InvalidLinkPath { path: PathBuf },
    /// A registry path does not start with a known hive or native root.
    InvalidRegistryPath { path: String },
    /// The UTF-16 substitute name does not fit the fixed reparse path buffer.
    BufferTooLarge { len: usize, capacity: usize },
    /// A buffer returned by the driver is shorter than the fields it declares.
    MalformedReparseBuffer { len: usize },
    /// The junction directory has contents and the conflict policy refused to clear them.
    DirectoryNotEmpty { path: PathBuf },
    /// The junction directory already redirects elsewhere and the policy refused to replace it.
    JunctionConflict { path: PathBuf, existing: String },
    /// The registry key exists, is not a link, and the policy refused to replace it.
    KeyNotLink { path: String },
    /// A handle to the junction directory could not be acquired.
    HandleOpenFailed { path: PathBuf, source: io::Error },
    /// Reading the reparse data of a directory failed for a reason other than "no reparse point".
    ReparseQueryFailed { path: PathBuf, source: io::Error },
    /// The "set reparse point" control failed (access denied, unsupported filesystem, ...).
    ReparseSetFailed { path: PathBuf, source: io::Error },
    /// The "delete reparse point" control failed.
    ReparseDeleteFailed { path: PathBuf, source: io::Error },
    /// The junction directory did not exist and could not be created.
    DirectoryCreateFailed { path: PathBuf, source: io::Error },
    /// The junction directory could not be cleared or removed.
    DirectoryRemoveFailed { path: PathBuf, source: io::Error },
    /// Querying an object-namespace device failed.
    DeviceQueryFailed { name: String, source: io::Error },
    /// Defining an object-namespace device failed.
    DeviceDefineFailed {
        name: String,
        target: String,
        source: io::Error,
    },
    /// Removing an object-namespace device failed.
    DeviceRemoveFailed { name: String, source: io::Error },
    /// Opening or querying a registry key failed.
    RegistryQueryFailed { path: String, source: io::Error },
    /// Creating a registry link key or writing its link value failed.
    RegistryLinkFailed { path: String, source: io::Error },
    /// Deleting a registry key failed.
    RegistryDeleteFailed { path: String, source: io::Error },
    /// The security identifier of the current user could not be resolved.
    SidLookupFailed { source: io::Error },
}

impl LinkError {
    #[inline]
    pub(crate) fn invalid_link_path(path: impl Into<PathBuf>) -> Self {
        Self::InvalidLinkPath { path: path.into() }
    }

    #[inline]
    pub(crate) fn invalid_registry_path(path: impl Into<String>) -> Self {
        Self::InvalidRegistryPath { path: path.into() }
    }

    #[inline]
    pub(crate) fn buffer_too_large(len: usize, capacity: usize) -> Self {
        Self::BufferTooLarge { len, capacity }
    }

    #[inline]
    pub(crate) fn handle_open_failed(path: &Path, source: io::Error) -> Self {
        Self::HandleOpenFailed {
            path: path.to_path_buf(),
            source,
        }
    }

    #[inline]
    pub(crate) fn reparse_query_failed(path: &Path, source: io::Error) -> Self {
        Self::ReparseQueryFailed {
            path: path.to_path_buf(),
            source,
        }
    }

    #[inline]
    pub(crate) fn reparse_set_failed(path: &Path, source: io::Error) -> Self {
        Self::ReparseSetFailed {
            path: path.to_path_buf(),
            source,
        }
    }

    #[inline]
    pub(crate) fn reparse_delete_failed(path: &Path, source: io::Error) -> Self {
        Self::ReparseDeleteFailed {
            path: path.to_path_buf(),
            source,
        }
    }

    #[inline]
    pub(crate) fn directory_create_failed(path: &Path, source: io::Error) -> Self {
        Self::DirectoryCreateFailed {
            path: path.to_path_buf(),
            source,
        }
    }

    #[inline]
    pub(crate) fn directory_remove_failed(path: &Path, source: io::Error) -> Self {
        Self::DirectoryRemoveFailed {
            path: path.to_path_buf(),
            source,
        }
    }

    #[inline]
    pub(crate) fn registry_query_failed(path: &str, source: io::Error) -> Self {
        Self::RegistryQueryFailed {
            path: path.to_owned(),
            source,
        }
    }

    #[inline]
    pub(crate) fn registry_link_failed(path: &str, source: io::Error) -> Self {
        Self::RegistryLinkFailed {
            path: path.to_owned(),
            source,
        }
    }

    #[inline]
    pub(crate) fn registry_delete_failed(path: &str, source: io::Error) -> Self {
        Self::RegistryDeleteFailed {
            path: path.to_owned(),
            source,
        }
    }

    /// SUMMARY:
    /// Return the raw OS error code of the underlying native failure, if any.
    ///
    /// RETURNS:
    /// - `Option<i32>`: `Some(code)` for native call failures that carried an OS code.
    pub fn raw_os_error(&self) -> Option<i32> {
        self.io_source().and_then(io::Error::raw_os_error)
    }

    /// SUMMARY:
    /// Report whether the error is a conflict refused by the active policy.
    ///
    /// DETAILS:
    /// Conflicts are the errors a caller can resolve by retrying with
    /// `ConflictPolicy::Replace` or an approving `ConflictPrompt`.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::DirectoryNotEmpty { .. } | Self::JunctionConflict { .. } | Self::KeyNotLink { .. }
        )
    }

    fn io_source(&self) -> Option<&io::Error> {
        match self {
            Self::HandleOpenFailed { source, .. }
            | Self::ReparseQueryFailed { source, .. }
            | Self::ReparseSetFailed { source, .. }
            | Self::ReparseDeleteFailed { source, .. }
            | Self::DirectoryCreateFailed { source, .. }
            | Self::DirectoryRemoveFailed { source, .. }
            | Self::DeviceQueryFailed { source, .. }
            | Self::DeviceDefineFailed { source, .. }
            | Self::DeviceRemoveFailed { source, .. }
            | Self::RegistryQueryFailed { source, .. }
            | Self::RegistryLinkFailed { source, .. }
            | Self::RegistryDeleteFailed { source, .. }
            | Self::SidLookupFailed { source } => Some(source),
            Self::MissingTarget
            | Self::InvalidLinkPath { .. }
            | Self::InvalidRegistryPath { .. }
            | Self::BufferTooLarge { .. }
            | Self::MalformedReparseBuffer { .. }
            | Self::DirectoryNotEmpty { .. }
            | Self::JunctionConflict { .. }
            | Self::KeyNotLink { .. } => None,
        }
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = |path: &Path| truncate_path_display(path, MAX_ERROR_PATH_LEN);
        let s = |value: &str| truncate_display(value, MAX_ERROR_PATH_LEN);
        match self {
            LinkError::MissingTarget => write!(f, "Link target has not been set"),
            LinkError::InvalidLinkPath { path } => {
                write!(f, "Invalid link path '{}': expected <directory>\\<name>", p(path))
            }
            LinkError::InvalidRegistryPath { path } => {
                write!(f, "Invalid registry path '{}': unknown hive", s(path))
            }
            LinkError::BufferTooLarge { len, capacity } => write!(
                f,
                "Reparse target of {len} bytes exceeds the {capacity}-byte path buffer"
            ),
            LinkError::MalformedReparseBuffer { len } => {
                write!(f, "Reparse buffer of {len} bytes is truncated or malformed")
            }
            LinkError::DirectoryNotEmpty { path } => {
                write!(f, "Junction directory '{}' is not empty", p(path))
            }
            LinkError::JunctionConflict { path, existing } => write!(
                f,
                "Directory '{}' is already a junction to '{}'",
                p(path),
                s(existing)
            ),
            LinkError::KeyNotLink { path } => {
                write!(f, "Registry key '{}' exists and is not a link", s(path))
            }
            LinkError::HandleOpenFailed { path, .. } => {
                write!(f, "Cannot open directory handle: {}", p(path))
            }
            LinkError::ReparseQueryFailed { path, .. } => {
                write!(f, "Cannot read reparse point: {}", p(path))
            }
            LinkError::ReparseSetFailed { path, .. } => {
                write!(f, "Cannot set reparse point: {}", p(path))
            }
            LinkError::ReparseDeleteFailed { path, .. } => {
                write!(f, "Cannot delete reparse point: {}", p(path))
            }
            LinkError::DirectoryCreateFailed { path, .. } => {
                write!(f, "Cannot create junction directory: {}", p(path))
            }
            LinkError::DirectoryRemoveFailed { path, .. } => {
                write!(f, "Cannot remove junction directory contents: {}", p(path))
            }
            LinkError::DeviceQueryFailed { name, .. } => {
                write!(f, "Cannot query object-namespace device '{}'", s(name))
            }
            LinkError::DeviceDefineFailed { name, target, .. } => write!(
                f,
                "Cannot define object-namespace device '{}' -> '{}'",
                s(name),
                s(target)
            ),
            LinkError::DeviceRemoveFailed { name, .. } => {
                write!(f, "Cannot remove object-namespace device '{}'", s(name))
            }
            LinkError::RegistryQueryFailed { path, .. } => {
                write!(f, "Cannot query registry key '{}'", s(path))
            }
            LinkError::RegistryLinkFailed { path, .. } => {
                write!(f, "Cannot create registry link '{}'", s(path))
            }
            LinkError::RegistryDeleteFailed { path, .. } => {
                write!(f, "Cannot delete registry key '{}'", s(path))
            }
            LinkError::SidLookupFailed { .. } => {
                write!(f, "Cannot resolve the current user's security identifier")
            }
        }
    }
}

impl Error for LinkError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.io_source().map(|e| e as &(dyn Error + 'static))
    }
}
