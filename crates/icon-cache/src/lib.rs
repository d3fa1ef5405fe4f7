//! Icon resource cache for the status-area tray.
//!
//! Maps an icon file path to the platform icon handles needed by the tray:
//! the small tray/list icon, the large icon, and the notification balloon
//! icon. All three are created together on first use and reused by every
//! later update until [`IconCache::teardown`].
//!
//! The cache never touches the OS itself; decoding and releasing handles
//! goes through an [`IconLoader`] supplied by the caller on every call, so
//! the engine can own the loader and the cache side by side.

mod cache;

pub use cache::{IconCache, IconEntry, IconFailure};

use std::fmt;

/// Rendering size of a tray icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IconKind {
    /// Small icon shown in the status area and in lists.
    Regular,
    /// Large icon (application switcher size).
    Large,
    /// Icon shown inside notification balloons.
    Notification,
}

impl IconKind {
    /// All kinds, in the order they are loaded on a cache miss.
    pub const ALL: [IconKind; 3] = [IconKind::Large, IconKind::Regular, IconKind::Notification];
}

impl fmt::Display for IconKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IconKind::Regular => "regular",
            IconKind::Large => "large",
            IconKind::Notification => "notification",
        };
        f.write_str(name)
    }
}

/// Error decoding an icon file into a platform handle.
#[derive(Debug, thiserror::Error)]
pub enum IconLoadError {
    #[error("icon file not found: {0}")]
    NotFound(String),

    #[error("failed to decode {kind} icon from {path}: {reason}")]
    Decode {
        path: String,
        kind: IconKind,
        reason: String,
    },
}

/// Platform icon-loading API consumed by the cache.
pub trait IconLoader {
    /// Opaque platform icon handle.
    type Handle: Copy + PartialEq + fmt::Debug;

    /// Decodes `path` into a handle of the given size.
    fn load(&mut self, path: &str, kind: IconKind) -> Result<Self::Handle, IconLoadError>;

    /// Releases a handle previously returned by [`IconLoader::load`].
    fn release(&mut self, handle: Self::Handle);
}
