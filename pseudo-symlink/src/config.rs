//! SUMMARY:
//! Configuration values and the conflict decision hook.
//!
//! DETAILS:
//! The object-manager staging directory and the DOS-device prefixes are process/session
//! global on Windows. They are carried here as explicit values so a caller (or a test) can
//! point the engine at an isolated namespace.
//!
//! Conflicts (non-empty junction directory, junction to another target, ordinary registry key
//! in the way) are never resolved silently. The session asks its `ConflictPrompt` when one is
//! installed and falls back to `LinkConfig::on_conflict` otherwise.
use std::fmt;
use std::path::PathBuf;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Object-manager directory every junction points at and every device lives under.
pub const DEFAULT_STAGING_ROOT: &str = r"\RPC Control";

/// Prefix that escapes the per-session DOS device directory to the object-manager root.
pub const DEFAULT_DEVICE_PREFIX: &str = r"Global\GLOBALROOT";

/// Prefix marking a device target as a raw native path.
pub const DEFAULT_RAW_TARGET_PREFIX: &str = r"\??\";

/// SUMMARY:
/// Pre-supplied decision for destructive conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ConflictPolicy {
    /// Refuse: the operation fails with a conflict error.
    #[default]
    Fail,
    /// Clear directory contents, drop a foreign junction, or delete a non-link key, then proceed.
    Replace,
}

/// SUMMARY:
/// Engine configuration.
///
/// EXAMPLE:
/// ```rust
/// use pseudo_symlink::{ConflictPolicy, LinkConfig};
/// let config = LinkConfig {
///     on_conflict: ConflictPolicy::Replace,
///     ..LinkConfig::default()
/// };
/// assert_eq!(config.staging_root, r"\RPC Control");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LinkConfig {
    pub staging_root: String,
    pub device_prefix: String,
    pub raw_target_prefix: String,
    pub on_conflict: ConflictPolicy,
    /// Issue every device define/remove call twice.
    ///
    /// Session-scoped definitions have been observed to revert after the first call. Turn this
    /// off to measure whether the current OS build still needs it.
    pub redefine_workaround: bool,
    /// Create registry link keys volatile, so they vanish at the next hive unload.
    pub volatile_registry_links: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            staging_root: DEFAULT_STAGING_ROOT.to_owned(),
            device_prefix: DEFAULT_DEVICE_PREFIX.to_owned(),
            raw_target_prefix: DEFAULT_RAW_TARGET_PREFIX.to_owned(),
            on_conflict: ConflictPolicy::default(),
            redefine_workaround: true,
            volatile_registry_links: true,
        }
    }
}

/// SUMMARY:
/// A destructive step the engine needs permission for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    /// The junction directory has entries that would have to be deleted.
    NonEmptyDirectory { path: PathBuf },
    /// The junction directory already redirects to `existing`.
    ForeignJunction { path: PathBuf, existing: String },
    /// An ordinary registry key (and its subkeys) would have to be deleted.
    PlainRegistryKey { path: String },
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conflict::NonEmptyDirectory { path } => write!(
                f,
                "directory '{}' is not empty; its contents will be deleted",
                path.display()
            ),
            Conflict::ForeignJunction { path, existing } => write!(
                f,
                "directory '{}' is a junction to '{existing}'; it will be replaced",
                path.display()
            ),
            Conflict::PlainRegistryKey { path } => write!(
                f,
                "registry key '{path}' is not a link; it and its subkeys will be deleted"
            ),
        }
    }
}

/// SUMMARY:
/// Injected decision callback for conflicts (for example an interactive confirmation).
///
/// DETAILS:
/// Return `true` to allow the destructive step. Closures of the right shape implement it.
pub trait ConflictPrompt: Send + Sync {
    fn approve(&self, conflict: &Conflict) -> bool;
}

impl<F> ConflictPrompt for F
where
    F: Fn(&Conflict) -> bool + Send + Sync,
{
    fn approve(&self, conflict: &Conflict) -> bool {
        self(conflict)
    }
}
