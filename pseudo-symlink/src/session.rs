//! SUMMARY:
//! Shared context (platform backend, configuration, conflict prompt) for every link.
use crate::config::{Conflict, ConflictPolicy, ConflictPrompt, LinkConfig};
use crate::link::dos_device::ObjectNamespaceLink;
use crate::link::group::LinkGroup;
use crate::link::junction::Junction;
use crate::link::registry::RegistryLink;
use crate::link::symlink::FileSystemLink;
use crate::platform::Platform;
use crate::Result;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

struct SessionInner {
    platform: Arc<dyn Platform>,
    config: LinkConfig,
    prompt: Option<Arc<dyn ConflictPrompt>>,
}

/// SUMMARY:
/// Cheaply clonable handle bundling the native call surface with the engine configuration.
///
/// DETAILS:
/// Every link keeps a clone of the session that created it, so teardown (including the drop
/// of a `LinkGuard`) always reaches the same platform and staging namespace the link was
/// opened with.
///
/// EXAMPLE:
/// ```rust
/// use pseudo_symlink::{platform::MemoryPlatform, Session};
/// use std::sync::Arc;
///
/// let session = Session::new(Arc::new(MemoryPlatform::new()));
/// assert_eq!(session.device_name("link"), r"Global\GLOBALROOT\RPC Control\link");
/// assert_eq!(session.raw_target(r"C:\t.txt"), r"\??\C:\t.txt");
/// ```
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.inner.config)
            .field("prompt", &self.inner.prompt.is_some())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Session over `platform` with the default configuration.
    pub fn new<P: Platform + 'static>(platform: Arc<P>) -> Self {
        Self::with_config(platform, LinkConfig::default())
    }

    pub fn with_config<P: Platform + 'static>(platform: Arc<P>, config: LinkConfig) -> Self {
        Self::from_dyn(platform, config)
    }

    pub fn from_dyn(platform: Arc<dyn Platform>, config: LinkConfig) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                platform,
                config,
                prompt: None,
            }),
        }
    }

    /// Session over the real Windows APIs with `config`.
    #[cfg(windows)]
    pub fn native(config: LinkConfig) -> Self {
        Self::with_config(Arc::new(crate::platform::WindowsPlatform::new()), config)
    }

    /// SUMMARY:
    /// Return a session that consults `prompt` for every conflict instead of `on_conflict`.
    pub fn with_prompt(&self, prompt: impl ConflictPrompt + 'static) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                platform: self.inner.platform.clone(),
                config: self.inner.config.clone(),
                prompt: Some(Arc::new(prompt)),
            }),
        }
    }

    #[inline]
    pub fn platform(&self) -> &dyn Platform {
        self.inner.platform.as_ref()
    }

    #[inline]
    pub fn config(&self) -> &LinkConfig {
        &self.inner.config
    }

    pub(crate) fn authorize(&self, conflict: &Conflict) -> bool {
        match &self.inner.prompt {
            Some(prompt) => prompt.approve(conflict),
            None => self.inner.config.on_conflict == ConflictPolicy::Replace,
        }
    }

    /// Native path of `name` inside the staging directory (`\RPC Control\name`).
    pub fn staging_path(&self, name: &str) -> String {
        format!(
            "{}\\{name}",
            self.inner.config.staging_root.trim_end_matches('\\')
        )
    }

    /// Name handed to the DOS-device calls for the staging entry `name`.
    pub fn device_name(&self, name: &str) -> String {
        format!("{}{}", self.inner.config.device_prefix, self.staging_path(name))
    }

    /// SUMMARY:
    /// Convert a Win32 path into the raw native form a device definition expects.
    ///
    /// DETAILS:
    /// - `C:\x` becomes `\??\C:\x`;
    /// - `\\?\C:\x` becomes `\??\C:\x` (same namespace, object-manager spelling);
    /// - `\\server\share` becomes `\??\UNC\server\share`;
    /// - anything else already rooted at `\` is taken as native and returned unchanged.
    pub fn raw_target(&self, target: &str) -> String {
        let prefix = &self.inner.config.raw_target_prefix;
        if starts_with_ignore_case(target, prefix) {
            target.to_owned()
        } else if let Some(rest) = target.strip_prefix(r"\\?\") {
            format!("{prefix}{rest}")
        } else if let Some(rest) = target.strip_prefix(r"\\") {
            format!("{prefix}UNC\\{rest}")
        } else if target.starts_with('\\') {
            target.to_owned()
        } else {
            format!("{prefix}{target}")
        }
    }

    /// Inverse of `raw_target` for display and comparison against Win32 paths.
    pub fn strip_raw_target(&self, native: &str) -> String {
        let prefix = &self.inner.config.raw_target_prefix;
        if !starts_with_ignore_case(native, prefix) {
            return native.to_owned();
        }
        let rest = &native[prefix.len()..];
        match rest.get(..4) {
            Some(unc) if unc.eq_ignore_ascii_case(r"UNC\") => format!(r"\\{}", &rest[4..]),
            _ => rest.to_owned(),
        }
    }

    /// Junction at `base_dir` redirecting to `target_dir`.
    pub fn junction(&self, base_dir: impl AsRef<Path>, target_dir: impl Into<String>) -> Junction {
        Junction::new(self.clone(), base_dir.as_ref().to_path_buf(), target_dir.into())
    }

    /// Junction at `base_dir` redirecting into the staging directory.
    pub fn staging_junction(&self, base_dir: impl AsRef<Path>) -> Junction {
        let staging = self.inner.config.staging_root.clone();
        self.junction(base_dir, staging)
    }

    /// Staging entry `name` resolving to the Win32 path `target`.
    pub fn dos_device(&self, name: impl Into<String>, target: impl Into<String>) -> ObjectNamespaceLink {
        ObjectNamespaceLink::new(self.clone(), name.into(), target.into())
    }

    /// SUMMARY:
    /// Registry link from `link_path` to `target_path`, both normalized to native form.
    ///
    /// ERRORS:
    /// - `LinkError::InvalidRegistryPath`: Either path has an unknown hive.
    /// - `LinkError::SidLookupFailed`: An `HKCU` path needs the user SID and it is unavailable.
    pub fn registry_link(&self, link_path: &str, target_path: &str) -> Result<RegistryLink> {
        RegistryLink::new(self.clone(), link_path, target_path)
    }

    /// Empty pseudo-symlink aggregate; add link paths and a target before opening.
    pub fn symlink(&self) -> FileSystemLink {
        FileSystemLink::new(self.clone())
    }

    pub fn group(&self) -> LinkGroup {
        LinkGroup::new()
    }
}

pub(crate) fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}
