//! In-memory simulation of the directory, object-namespace and registry surfaces.
//!
//! Semantics mirror what the engine relies on from Windows:
//! - a directory carries at most one reparse buffer, stored verbatim;
//! - device definitions stack per name, and an exact-match remove pops the matching one;
//! - registry keys are `Plain` or links, and a link key has no value until one is written.
//!
//! Every call is appended to a log (`calls`) so tests can assert which native operations
//! were or were not issued. Failures can be injected per call kind.
use super::{KeyKind, Platform};
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const ERROR_FILE_NOT_FOUND: i32 = 2;
const ERROR_PATH_NOT_FOUND: i32 = 3;
const ERROR_DIR_NOT_EMPTY: i32 = 145;
const ERROR_ALREADY_EXISTS: i32 = 183;
const ERROR_KEY_HAS_CHILDREN: i32 = 1020;
const ERROR_NOT_A_REPARSE_POINT: i32 = 4390;

/// One native operation issued against a `MemoryPlatform`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeCall {
    CreateDir(PathBuf),
    ClearDir(PathBuf),
    RemoveDir(PathBuf),
    GetReparsePoint(PathBuf),
    SetReparsePoint(PathBuf),
    DeleteReparsePoint(PathBuf),
    QueryDosDevice(String),
    DefineDosDevice { name: String, target: String },
    RemoveDosDevice { name: String, target: String },
    QueryKey(String),
    CreateLinkKey(String),
    SetLinkValue { path: String, target: String },
    DeleteKey(String),
    DeleteKeyTree(String),
}

/// Discriminant of `NativeCall`, used to inject failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    CreateDir,
    ClearDir,
    RemoveDir,
    GetReparsePoint,
    SetReparsePoint,
    DeleteReparsePoint,
    QueryDosDevice,
    DefineDosDevice,
    RemoveDosDevice,
    QueryKey,
    CreateLinkKey,
    SetLinkValue,
    DeleteKey,
    DeleteKeyTree,
}

impl NativeCall {
    pub fn kind(&self) -> CallKind {
        match self {
            NativeCall::CreateDir(_) => CallKind::CreateDir,
            NativeCall::ClearDir(_) => CallKind::ClearDir,
            NativeCall::RemoveDir(_) => CallKind::RemoveDir,
            NativeCall::GetReparsePoint(_) => CallKind::GetReparsePoint,
            NativeCall::SetReparsePoint(_) => CallKind::SetReparsePoint,
            NativeCall::DeleteReparsePoint(_) => CallKind::DeleteReparsePoint,
            NativeCall::QueryDosDevice(_) => CallKind::QueryDosDevice,
            NativeCall::DefineDosDevice { .. } => CallKind::DefineDosDevice,
            NativeCall::RemoveDosDevice { .. } => CallKind::RemoveDosDevice,
            NativeCall::QueryKey(_) => CallKind::QueryKey,
            NativeCall::CreateLinkKey(_) => CallKind::CreateLinkKey,
            NativeCall::SetLinkValue { .. } => CallKind::SetLinkValue,
            NativeCall::DeleteKey(_) => CallKind::DeleteKey,
            NativeCall::DeleteKeyTree(_) => CallKind::DeleteKeyTree,
        }
    }

    /// `true` for calls that change OS state (everything except the queries).
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self.kind(),
            CallKind::GetReparsePoint | CallKind::QueryDosDevice | CallKind::QueryKey
        )
    }
}

#[derive(Debug, Default)]
struct DirNode {
    entries: usize,
    reparse: Option<Vec<u8>>,
}

#[derive(Debug)]
struct KeyNode {
    is_link: bool,
    link_value: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    dirs: BTreeMap<String, DirNode>,
    devices: BTreeMap<String, Vec<String>>,
    keys: BTreeMap<String, KeyNode>,
    calls: Vec<NativeCall>,
    // kind -> (calls still allowed to succeed, error code)
    failures: HashMap<CallKind, (usize, i32)>,
}

/// SUMMARY:
/// `Platform` implementation backed by in-memory maps.
///
/// EXAMPLE:
/// ```rust
/// use pseudo_symlink::platform::{MemoryPlatform, Platform};
/// let platform = MemoryPlatform::new();
/// platform.define_dos_device(r"Global\GLOBALROOT\RPC Control\a", r"\??\C:\t")?;
/// assert_eq!(
///     platform.query_dos_device(r"Global\GLOBALROOT\RPC Control\a")?.as_deref(),
///     Some(r"\??\C:\t")
/// );
/// # Ok::<_, std::io::Error>(())
/// ```
#[derive(Debug)]
pub struct MemoryPlatform {
    state: Mutex<State>,
    sid: String,
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::with_sid("S-1-5-21-1000-2000-3000-1001")
    }

    /// Simulated platform reporting `sid` as the current user.
    pub fn with_sid(sid: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            sid: sid.into(),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panicking test thread must not hide the log from the remaining assertions.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: NativeCall) -> io::Result<MutexGuard<'_, State>> {
        let mut state = self.state();
        let kind = call.kind();
        state.calls.push(call);
        let failure = match state.failures.get_mut(&kind) {
            Some((0, code)) => Some(*code),
            Some((remaining, _)) => {
                *remaining -= 1;
                None
            }
            None => None,
        };
        match failure {
            Some(code) => Err(io::Error::from_raw_os_error(code)),
            None => Ok(state),
        }
    }

    /// Make every subsequent call of `kind` fail with the raw OS error `code`.
    pub fn fail_with(&self, kind: CallKind, code: i32) {
        self.fail_after(kind, 0, code);
    }

    /// Let the next `successes` calls of `kind` through, then fail every later one with `code`.
    pub fn fail_after(&self, kind: CallKind, successes: usize, code: i32) {
        self.state().failures.insert(kind, (successes, code));
    }

    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// Every call issued so far, in order.
    pub fn calls(&self) -> Vec<NativeCall> {
        self.state().calls.clone()
    }

    /// Calls issued so far that change OS state.
    pub fn mutations(&self) -> Vec<NativeCall> {
        self.calls().into_iter().filter(NativeCall::is_mutation).collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Seed an existing directory holding `entries` children.
    pub fn add_dir(&self, path: impl AsRef<Path>, entries: usize) {
        let path = path.as_ref();
        self.state().dirs.insert(
            path_key(path),
            DirNode {
                entries,
                reparse: None,
            },
        );
    }

    /// Seed a directory already carrying `buffer` as its reparse data.
    pub fn add_reparse_dir(&self, path: impl AsRef<Path>, buffer: Vec<u8>) {
        let path = path.as_ref();
        self.state().dirs.insert(
            path_key(path),
            DirNode {
                entries: 0,
                reparse: Some(buffer),
            },
        );
    }

    /// Number of entries in the directory, or `None` when it does not exist.
    pub fn dir_entries(&self, path: impl AsRef<Path>) -> Option<usize> {
        self.state()
            .dirs
            .get(&path_key(path.as_ref()))
            .map(|node| node.entries)
    }

    /// Seed an ordinary registry key.
    pub fn add_key(&self, path: &str) {
        self.state().keys.insert(
            name_key(path),
            KeyNode {
                is_link: false,
                link_value: None,
            },
        );
    }

    /// Seed a registry link key pointing at `target`.
    pub fn add_link_key(&self, path: &str, target: &str) {
        self.state().keys.insert(
            name_key(path),
            KeyNode {
                is_link: true,
                link_value: Some(target.to_owned()),
            },
        );
    }

    pub fn key_exists(&self, path: &str) -> bool {
        self.state().keys.contains_key(&name_key(path))
    }

    /// All current device definitions (name, stacked targets).
    pub fn devices(&self) -> Vec<(String, Vec<String>)> {
        self.state()
            .devices
            .iter()
            .map(|(name, targets)| (name.clone(), targets.clone()))
            .collect()
    }
}

impl Platform for MemoryPlatform {
    fn absolute_path(&self, path: &Path) -> io::Result<PathBuf> {
        Ok(path.to_path_buf())
    }

    fn dir_exists(&self, path: &Path) -> bool {
        self.state().dirs.contains_key(&path_key(path))
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        let mut state = self.record(NativeCall::CreateDir(path.to_path_buf()))?;
        let key = path_key(path);
        if state.dirs.contains_key(&key) {
            return Err(io::Error::from_raw_os_error(ERROR_ALREADY_EXISTS));
        }
        state.dirs.insert(key, DirNode::default());
        Ok(())
    }

    fn dir_is_empty(&self, path: &Path) -> io::Result<bool> {
        let state = self.state();
        let node = state
            .dirs
            .get(&path_key(path))
            .ok_or_else(|| io::Error::from_raw_os_error(ERROR_PATH_NOT_FOUND))?;
        Ok(node.entries == 0)
    }

    fn clear_dir(&self, path: &Path) -> io::Result<()> {
        let mut state = self.record(NativeCall::ClearDir(path.to_path_buf()))?;
        let node = state
            .dirs
            .get_mut(&path_key(path))
            .ok_or_else(|| io::Error::from_raw_os_error(ERROR_PATH_NOT_FOUND))?;
        node.entries = 0;
        Ok(())
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        let mut state = self.record(NativeCall::RemoveDir(path.to_path_buf()))?;
        let key = path_key(path);
        match state.dirs.get(&key).map(|node| node.entries) {
            None => Err(io::Error::from_raw_os_error(ERROR_PATH_NOT_FOUND)),
            Some(0) => {
                state.dirs.remove(&key);
                Ok(())
            }
            Some(_) => Err(io::Error::from_raw_os_error(ERROR_DIR_NOT_EMPTY)),
        }
    }

    fn get_reparse_point(&self, path: &Path) -> io::Result<Option<Vec<u8>>> {
        let state = self.record(NativeCall::GetReparsePoint(path.to_path_buf()))?;
        let node = state
            .dirs
            .get(&path_key(path))
            .ok_or_else(|| io::Error::from_raw_os_error(ERROR_PATH_NOT_FOUND))?;
        Ok(node.reparse.clone())
    }

    fn set_reparse_point(&self, path: &Path, buffer: &[u8]) -> io::Result<()> {
        let mut state = self.record(NativeCall::SetReparsePoint(path.to_path_buf()))?;
        let node = state
            .dirs
            .get_mut(&path_key(path))
            .ok_or_else(|| io::Error::from_raw_os_error(ERROR_PATH_NOT_FOUND))?;
        if node.entries > 0 {
            return Err(io::Error::from_raw_os_error(ERROR_DIR_NOT_EMPTY));
        }
        node.reparse = Some(buffer.to_vec());
        Ok(())
    }

    fn delete_reparse_point(&self, path: &Path, _buffer: &[u8]) -> io::Result<()> {
        let mut state = self.record(NativeCall::DeleteReparsePoint(path.to_path_buf()))?;
        let node = state
            .dirs
            .get_mut(&path_key(path))
            .ok_or_else(|| io::Error::from_raw_os_error(ERROR_PATH_NOT_FOUND))?;
        match node.reparse.take() {
            Some(_) => Ok(()),
            None => Err(io::Error::from_raw_os_error(ERROR_NOT_A_REPARSE_POINT)),
        }
    }

    fn query_dos_device(&self, name: &str) -> io::Result<Option<String>> {
        let state = self.record(NativeCall::QueryDosDevice(name.to_owned()))?;
        Ok(state
            .devices
            .get(&name_key(name))
            .and_then(|targets| targets.last().cloned()))
    }

    fn define_dos_device(&self, name: &str, target: &str) -> io::Result<()> {
        let mut state = self.record(NativeCall::DefineDosDevice {
            name: name.to_owned(),
            target: target.to_owned(),
        })?;
        state
            .devices
            .entry(name_key(name))
            .or_default()
            .push(target.to_owned());
        Ok(())
    }

    fn remove_dos_device(&self, name: &str, target: &str) -> io::Result<()> {
        let mut state = self.record(NativeCall::RemoveDosDevice {
            name: name.to_owned(),
            target: target.to_owned(),
        })?;
        let key = name_key(name);
        let targets = state
            .devices
            .get_mut(&key)
            .ok_or_else(|| io::Error::from_raw_os_error(ERROR_FILE_NOT_FOUND))?;
        let position = targets
            .iter()
            .rposition(|t| t.eq_ignore_ascii_case(target))
            .ok_or_else(|| io::Error::from_raw_os_error(ERROR_FILE_NOT_FOUND))?;
        targets.remove(position);
        if targets.is_empty() {
            state.devices.remove(&key);
        }
        Ok(())
    }

    fn query_key(&self, path: &str) -> io::Result<KeyKind> {
        let state = self.record(NativeCall::QueryKey(path.to_owned()))?;
        Ok(match state.keys.get(&name_key(path)) {
            None => KeyKind::Missing,
            Some(KeyNode {
                is_link: true,
                link_value: Some(target),
                ..
            }) => KeyKind::Link(target.clone()),
            Some(_) => KeyKind::Plain,
        })
    }

    fn create_link_key(&self, path: &str, _volatile: bool) -> io::Result<()> {
        let mut state = self.record(NativeCall::CreateLinkKey(path.to_owned()))?;
        let key = name_key(path);
        if state.keys.contains_key(&key) {
            return Err(io::Error::from_raw_os_error(ERROR_ALREADY_EXISTS));
        }
        state.keys.insert(
            key,
            KeyNode {
                is_link: true,
                link_value: None,
            },
        );
        Ok(())
    }

    fn set_link_value(&self, path: &str, target: &str) -> io::Result<()> {
        let mut state = self.record(NativeCall::SetLinkValue {
            path: path.to_owned(),
            target: target.to_owned(),
        })?;
        let node = state
            .keys
            .get_mut(&name_key(path))
            .ok_or_else(|| io::Error::from_raw_os_error(ERROR_FILE_NOT_FOUND))?;
        node.link_value = Some(target.to_owned());
        Ok(())
    }

    fn delete_key(&self, path: &str) -> io::Result<()> {
        let mut state = self.record(NativeCall::DeleteKey(path.to_owned()))?;
        let key = name_key(path);
        if !state.keys.contains_key(&key) {
            return Err(io::Error::from_raw_os_error(ERROR_FILE_NOT_FOUND));
        }
        let child_prefix = format!("{key}\\");
        if state.keys.keys().any(|k| k.starts_with(&child_prefix)) {
            return Err(io::Error::from_raw_os_error(ERROR_KEY_HAS_CHILDREN));
        }
        state.keys.remove(&key);
        Ok(())
    }

    fn delete_key_tree(&self, path: &str) -> io::Result<()> {
        let mut state = self.record(NativeCall::DeleteKeyTree(path.to_owned()))?;
        let key = name_key(path);
        if !state.keys.contains_key(&key) {
            return Err(io::Error::from_raw_os_error(ERROR_FILE_NOT_FOUND));
        }
        let child_prefix = format!("{key}\\");
        state
            .keys
            .retain(|k, _| k != &key && !k.starts_with(&child_prefix));
        Ok(())
    }

    fn current_user_sid(&self) -> io::Result<String> {
        Ok(self.sid.clone())
    }
}

fn path_key(path: &Path) -> String {
    name_key(&path.to_string_lossy())
}

fn name_key(name: &str) -> String {
    name.trim_end_matches(['\\', '/']).to_ascii_lowercase()
}
