//! SUMMARY:
//! The native call surface the link engine drives.
//!
//! OVERVIEW:
//! `Platform` lists exactly the OS operations the core needs. Every method maps to one
//! native call (or one short, fixed sequence of them) and returns `io::Result`, so the
//! caller decides how a failure is classified. Nothing is cached: each call re-queries the OS.
//!
//! - `WindowsPlatform` (Windows only) issues the real Win32 / ntdll calls.
//! - `MemoryPlatform` simulates the three namespaces in memory and records every call,
//!   which lets tests substitute an isolated namespace on any host.
use std::io;
use std::path::{Path, PathBuf};

pub mod memory;
#[cfg(windows)]
pub mod windows;

pub use memory::{CallKind, MemoryPlatform, NativeCall};
#[cfg(windows)]
pub use windows::WindowsPlatform;

/// SUMMARY:
/// What currently lives at a native registry key path, observed without following links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyKind {
    /// No key exists at the path.
    Missing,
    /// An ordinary key (no symbolic-link value).
    Plain,
    /// A symbolic-link key whose link value points at the contained native path.
    Link(String),
}

/// SUMMARY:
/// Native OS operations used to create, verify and remove link primitives.
///
/// DETAILS:
/// Implementations must release any handle they acquire before returning, on success and on
/// failure alike. Paths are passed exactly as the caller computed them; implementations do not
/// normalize them further.
pub trait Platform: Send + Sync {
    /// Resolve `path` to an absolute path without following reparse points.
    fn absolute_path(&self, path: &Path) -> io::Result<PathBuf>;

    fn dir_exists(&self, path: &Path) -> bool;

    fn create_dir(&self, path: &Path) -> io::Result<()>;

    /// `Ok(true)` when the directory has no entries. A junction is reported by its own entries
    /// (none), never by listing its target.
    fn dir_is_empty(&self, path: &Path) -> io::Result<bool>;

    /// Remove every entry under `path`, without following reparse points, keeping `path`.
    fn clear_dir(&self, path: &Path) -> io::Result<()>;

    /// Remove the (empty) directory `path`.
    fn remove_dir(&self, path: &Path) -> io::Result<()>;

    /// Issue "get reparse point" against `path`. `Ok(None)` means "not a reparse point".
    fn get_reparse_point(&self, path: &Path) -> io::Result<Option<Vec<u8>>>;

    /// Issue "set reparse point" with `buffer` against `path`.
    fn set_reparse_point(&self, path: &Path, buffer: &[u8]) -> io::Result<()>;

    /// Issue "delete reparse point" with the header-only `buffer` against `path`.
    fn delete_reparse_point(&self, path: &Path, buffer: &[u8]) -> io::Result<()>;

    /// Resolve the device `name`. `Ok(None)` when no definition exists.
    fn query_dos_device(&self, name: &str) -> io::Result<Option<String>>;

    /// Define `name` -> `target` with raw-target-path and no-broadcast semantics.
    fn define_dos_device(&self, name: &str, target: &str) -> io::Result<()>;

    /// Remove the definition of `name` that exactly matches `target`.
    fn remove_dos_device(&self, name: &str, target: &str) -> io::Result<()>;

    /// Inspect the key at native path `path` with link-aware open semantics.
    fn query_key(&self, path: &str) -> io::Result<KeyKind>;

    /// Create a new key at `path` flagged as a symbolic link (no link value yet).
    fn create_link_key(&self, path: &str, volatile: bool) -> io::Result<()>;

    /// Write the symbolic-link value of the link key at `path`.
    fn set_link_value(&self, path: &str, target: &str) -> io::Result<()>;

    /// Delete the key (not its link target) at `path`.
    fn delete_key(&self, path: &str) -> io::Result<()>;

    /// Delete the key at `path` together with all of its subkeys.
    fn delete_key_tree(&self, path: &str) -> io::Result<()>;

    /// String form (`S-1-5-21-...`) of the invoking user's security identifier.
    fn current_user_sid(&self) -> io::Result<String>;
}
