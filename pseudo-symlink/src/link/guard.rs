//! SUMMARY:
//! Scoped ownership of an opened link: closed on every exit path unless released.
use super::ManagedLink;
use crate::Result;

use std::fmt;
use std::ops::{Deref, DerefMut};
use tracing::{debug, warn};

/// SUMMARY:
/// Holds an opened link and closes it when dropped.
///
/// DETAILS:
/// `close` only removes what the link itself created, so dropping a guard around a link that
/// merely observed existing OS objects leaves them alone. Links reporting `keep_alive()` are
/// released without closing, and a `LinkGroup` leaves its keep-alive members open. Errors
/// during the drop-time close are logged, never raised.
///
/// EXAMPLE:
/// ```rust
/// use pseudo_symlink::{link::guard::LinkGuard, platform::MemoryPlatform, Session};
/// use std::sync::Arc;
///
/// let platform = Arc::new(MemoryPlatform::new());
/// let session = Session::new(platform.clone());
/// {
///     let guard = LinkGuard::open(session.dos_device("link", r"C:\t.txt"))?;
///     assert!(guard.opened().created());
///     assert_eq!(platform.devices().len(), 1);
/// }
/// assert!(platform.devices().is_empty());
/// # Ok::<_, pseudo_symlink::LinkError>(())
/// ```
pub struct LinkGuard<L: ManagedLink> {
    link: Option<L>,
    opened: L::Opened,
}

impl<L: ManagedLink> LinkGuard<L> {
    /// SUMMARY:
    /// Open `link` and guard it.
    ///
    /// ERRORS:
    /// - Whatever `link.open()` returns; the link is dropped without a close call since a
    ///   failed open owns nothing.
    pub fn open(mut link: L) -> Result<Self> {
        let opened = link.open()?;
        Ok(Self {
            link: Some(link),
            opened,
        })
    }

    /// What `open` reported when the guard was created.
    #[inline]
    pub fn opened(&self) -> &L::Opened {
        &self.opened
    }

    /// Release the link without closing it.
    pub fn into_inner(mut self) -> L {
        match self.link.take() {
            Some(link) => link,
            None => unreachable!("link is only taken by consuming methods"),
        }
    }

    /// Close now and surface the result instead of logging it.
    pub fn close(self) -> Result<L::Closed> {
        self.into_inner().close()
    }

    pub fn force_close(self) -> Result<L::Closed> {
        self.into_inner().force_close()
    }
}

impl<L: ManagedLink> Deref for LinkGuard<L> {
    type Target = L;

    fn deref(&self) -> &L {
        match &self.link {
            Some(link) => link,
            None => unreachable!("link is only taken by consuming methods"),
        }
    }
}

impl<L: ManagedLink> DerefMut for LinkGuard<L> {
    fn deref_mut(&mut self) -> &mut L {
        match &mut self.link {
            Some(link) => link,
            None => unreachable!("link is only taken by consuming methods"),
        }
    }
}

impl<L: ManagedLink> Drop for LinkGuard<L> {
    fn drop(&mut self) {
        let Some(mut link) = self.link.take() else {
            return;
        };
        if link.keep_alive() {
            debug!(link = %link.describe(), "keep-alive link released");
            return;
        }
        match link.release() {
            Ok(_) => debug!(link = %link.describe(), "guard closed link"),
            Err(e) => warn!(link = %link.describe(), error = %e, "failed to close link on drop"),
        }
    }
}

impl<L: ManagedLink + fmt::Debug> fmt::Debug for LinkGuard<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkGuard").field("link", &self.link).finish_non_exhaustive()
    }
}
