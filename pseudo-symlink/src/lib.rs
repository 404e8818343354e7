//! # pseudo-symlink
//!
//! Unprivileged pseudo symbolic links on Windows.
//!
//! Real symbolic links need `SeCreateSymbolicLinkPrivilege`. This crate automates a technique
//! that needs no privilege at all:
//! - a **file** link `C:\a\b\link -> C:\t.txt` is a junction from `C:\a\b` into the
//!   object-manager directory `\RPC Control`, plus a DOS-device entry `\RPC Control\link`
//!   resolving to `\??\C:\t.txt`;
//! - a **registry** link is a key created with the symbolic-link option whose
//!   `SymbolicLinkValue` names another native key path.
//!
//! Every OS object is tracked with creation-based ownership: a link only ever removes an
//! object its own `open` created. Objects found already in place are observed, not owned,
//! and survive `close`.
//!
//! ## Quick start
//!
//! ```rust
//! use pseudo_symlink::{platform::MemoryPlatform, LinkGuard, Session};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), pseudo_symlink::LinkError> {
//! // `Session::native(config)` on Windows; the in-memory platform works on every host.
//! let platform = Arc::new(MemoryPlatform::new());
//! let session = Session::new(platform.clone());
//!
//! let mut link = session.symlink();
//! link.add_link(r"C:\a\b\link")?;
//! link.set_target(r"C:\t.txt");
//!
//! {
//!     let guard = LinkGuard::open(link)?;
//!     assert!(guard.opened().is_success());
//!     assert_eq!(guard.status().len(), 2);
//! } // devices, then junctions, are removed here
//!
//! assert!(platform.devices().is_empty());
//! # Ok(()) }
//! ```
//!
//! ## Layout
//!
//! - `reparse`: mount-point buffer codec.
//! - `link`: the primitives (`Junction`, `ObjectNamespaceLink`, `RegistryLink`), the composites
//!   (`FileSystemLink`, `LinkGroup`), per-resource reports and `LinkGuard`.
//! - `platform`: the native call surface (`Platform`), implemented over the Win32/ntdll APIs
//!   (`WindowsPlatform`) and in memory (`MemoryPlatform`).
//! - `config` / `session`: staging namespace, conflict policy and prompt, shared by every link.
//!
//! ## Conflicts
//!
//! A non-empty junction directory, a junction to another target or an ordinary registry key in
//! the way is never destroyed silently. Either set `LinkConfig::on_conflict` to
//! `ConflictPolicy::Replace` or install a `ConflictPrompt` with `Session::with_prompt`.
//!
//! ## Logging
//!
//! The crate emits `tracing` events (`debug` per native call, `info` per created/removed link,
//! `warn` for conflicts and mismatches) and never installs a subscriber.
#![cfg_attr(not(windows), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod link;
pub mod platform;
pub mod reparse;
pub mod session;

// Public exports
pub use config::{Conflict, ConflictPolicy, ConflictPrompt, LinkConfig};
pub use error::LinkError;
pub use link::dos_device::ObjectNamespaceLink;
pub use link::group::{GroupMember, LinkGroup};
pub use link::guard::LinkGuard;
pub use link::junction::Junction;
pub use link::registry::RegistryLink;
pub use link::report::{LinkReport, ReportEntry, ResourceId};
pub use link::symlink::FileSystemLink;
pub use link::{CloseOutcome, LinkKind, LinkState, LinkStatus, ManagedLink, OpenOutcome};
pub use session::Session;

/// Result type alias for this crate's operations.
pub type Result<T> = std::result::Result<T, LinkError>;
