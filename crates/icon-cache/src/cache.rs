use std::collections::HashMap;

use tracing::{debug, warn};

use crate::{IconKind, IconLoadError, IconLoader};

/// Handles created for one icon path. A kind that failed to load is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IconEntry<H> {
    pub regular: Option<H>,
    pub large: Option<H>,
    pub notification: Option<H>,
}

impl<H: Copy> IconEntry<H> {
    /// Returns the handle for `kind`, if it loaded.
    pub fn get(&self, kind: IconKind) -> Option<H> {
        match kind {
            IconKind::Regular => self.regular,
            IconKind::Large => self.large,
            IconKind::Notification => self.notification,
        }
    }

    fn handles(&self) -> impl Iterator<Item = H> {
        [self.regular, self.large, self.notification].into_iter().flatten()
    }
}

/// A kind that could not be loaded while creating an entry.
#[derive(Debug)]
pub struct IconFailure {
    pub path: String,
    pub kind: IconKind,
    pub error: IconLoadError,
}

/// Unbounded per-path icon cache.
///
/// Entries are created on the first miss and only dropped by
/// [`IconCache::teardown`]. After a teardown the cache is closed: `fetch`
/// returns `None` until the next [`IconCache::prewarm`].
///
/// Load failures are kept until [`IconCache::take_failures`] so the owner can
/// report them through its own diagnostics.
#[derive(Debug)]
pub struct IconCache<H> {
    entries: HashMap<String, IconEntry<H>>,
    failures: Vec<IconFailure>,
    ignore_case: bool,
    open: bool,
}

impl<H: Copy + PartialEq + std::fmt::Debug> Default for IconCache<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Copy + PartialEq + std::fmt::Debug> IconCache<H> {
    /// Creates an open, empty cache keyed by exact path.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            failures: Vec::new(),
            ignore_case: false,
            open: true,
        }
    }

    /// Creates an open, empty cache that treats paths differing only in
    /// ASCII case as the same icon.
    pub fn case_insensitive() -> Self {
        Self {
            ignore_case: true,
            ..Self::new()
        }
    }

    /// Returns the handle of `kind` for `path`, loading all kinds on a miss.
    ///
    /// Returns `None` for an empty path, for a kind that failed to load, and
    /// while the cache is closed.
    pub fn fetch<L>(&mut self, loader: &mut L, path: &str, kind: IconKind) -> Option<H>
    where
        L: IconLoader<Handle = H>,
    {
        if path.is_empty() {
            return None;
        }
        if !self.open {
            warn!(path, %kind, "icon cache is torn down; fetch ignored");
            return None;
        }

        let key = self.key(path);
        if let Some(entry) = self.entries.get(&key) {
            return entry.get(kind);
        }

        let entry = create_entry(loader, path, &mut self.failures);
        self.entries.insert(key, entry);
        entry.get(kind)
    }

    /// Reopens the cache and loads every path not cached yet.
    pub fn prewarm<L, S>(&mut self, loader: &mut L, paths: &[S])
    where
        L: IconLoader<Handle = H>,
        S: AsRef<str>,
    {
        self.open = true;
        for path in paths.iter().map(AsRef::as_ref) {
            self.fetch(loader, path, IconKind::Regular);
        }
        debug!(entries = self.entries.len(), "icon cache prewarmed");
    }

    /// Releases every cached handle, empties and closes the cache.
    /// Calling it again is a no-op.
    pub fn teardown<L>(&mut self, loader: &mut L)
    where
        L: IconLoader<Handle = H>,
    {
        let released = self.entries.len();
        for (_, entry) in self.entries.drain() {
            for handle in entry.handles() {
                loader.release(handle);
            }
        }
        self.open = false;
        if released > 0 {
            debug!(released, "icon cache torn down");
        }
    }

    /// Drains the load failures recorded since the last call.
    pub fn take_failures(&mut self) -> Vec<IconFailure> {
        std::mem::take(&mut self.failures)
    }

    /// Returns a cached handle without loading anything.
    pub fn get(&self, path: &str, kind: IconKind) -> Option<H> {
        self.entries.get(&self.key(path)).and_then(|e| e.get(kind))
    }

    /// Whether an entry exists for `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(&self.key(path))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `fetch` may create new entries.
    pub fn is_open(&self) -> bool {
        self.open
    }

    fn key(&self, path: &str) -> String {
        if self.ignore_case {
            path.to_ascii_lowercase()
        } else {
            path.to_string()
        }
    }
}

/// Loads all three kinds for `path`. Kinds are requested one call at a time;
/// some icon extraction APIs return only one size when asked for several.
fn create_entry<L: IconLoader>(
    loader: &mut L,
    path: &str,
    failures: &mut Vec<IconFailure>,
) -> IconEntry<L::Handle> {
    let mut entry = IconEntry {
        regular: None,
        large: None,
        notification: None,
    };
    for kind in IconKind::ALL {
        let handle = match loader.load(path, kind) {
            Ok(handle) => Some(handle),
            Err(error) => {
                debug!(path, %kind, "icon load failed: {error}");
                failures.push(IconFailure {
                    path: path.to_string(),
                    kind,
                    error,
                });
                None
            }
        };
        match kind {
            IconKind::Regular => entry.regular = handle,
            IconKind::Large => entry.large = handle,
            IconKind::Notification => entry.notification = handle,
        }
    }
    entry
}
