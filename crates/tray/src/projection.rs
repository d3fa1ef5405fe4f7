//! Projection of a [`Menu`] into a native popup menu.

use std::collections::HashMap;

use crate::error::PlatformError;
use crate::menu::{ItemPath, Menu, MenuItem};
use crate::platform::{MenuApi, NativeItem};

/// First identifier handed out by a projection.
pub const ID_TRAY_FIRST: u32 = 1000;

/// A built native menu plus the table leading each identifier back to the
/// item it was projected from.
#[derive(Debug)]
pub struct Projection<M> {
    pub root: M,
    table: HashMap<u32, ItemPath>,
}

impl<M> Projection<M> {
    /// Source item of the native entry `id`.
    pub fn resolve(&self, id: u32) -> Option<&ItemPath> {
        self.table.get(&id)
    }

    /// Identifier assigned to the item at `path` in this projection.
    pub fn id_of(&self, path: &ItemPath) -> Option<u32> {
        self.table
            .iter()
            .find_map(|(id, p)| (p == path).then_some(*id))
    }

    /// Number of selectable (non-separator) entries.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Builds a native menu for `menu`.
///
/// Identifiers start at [`ID_TRAY_FIRST`] and advance by one per item at
/// every level, depth-first; a submenu entry takes its identifier after its
/// children. On failure every native menu created so far is destroyed.
pub fn project<P: MenuApi>(
    platform: &mut P,
    menu: &Menu,
) -> Result<Projection<P::Menu>, PlatformError> {
    let mut id = ID_TRAY_FIRST;
    let mut table = HashMap::new();
    let root = project_level(platform, menu, None, &mut id, &mut table)?;
    Ok(Projection { root, table })
}

fn project_level<P: MenuApi>(
    platform: &mut P,
    menu: &Menu,
    parent: Option<&ItemPath>,
    id: &mut u32,
    table: &mut HashMap<u32, ItemPath>,
) -> Result<P::Menu, PlatformError> {
    let native = platform.create_menu()?;

    for (index, entry) in menu.items().iter().enumerate() {
        let path = match parent {
            Some(parent) => parent.child(index),
            None => ItemPath::root(index),
        };

        let result = match entry {
            MenuItem::Separator => platform.insert_separator(native, *id),
            MenuItem::Action(item) | MenuItem::Checkbox(item) => {
                let inserted = platform.insert_item(
                    native,
                    NativeItem {
                        id: *id,
                        text: &item.text,
                        disabled: item.disabled,
                        checked: item.checked,
                        submenu: None,
                    },
                );
                if inserted.is_ok() {
                    table.insert(*id, path);
                }
                inserted
            }
            MenuItem::Submenu(item, children) => {
                let sub = match project_level(platform, children, Some(&path), id, table) {
                    Ok(sub) => sub,
                    Err(e) => {
                        platform.destroy_menu(native);
                        return Err(e);
                    }
                };
                let inserted = platform.insert_item(
                    native,
                    NativeItem {
                        id: *id,
                        text: &item.text,
                        disabled: item.disabled,
                        checked: item.checked,
                        submenu: Some(sub),
                    },
                );
                match inserted {
                    Ok(()) => {
                        table.insert(*id, path);
                        Ok(())
                    }
                    Err(e) => {
                        // Not attached yet, so the parent will not free it.
                        platform.destroy_menu(sub);
                        Err(e)
                    }
                }
            }
        };

        if let Err(e) = result {
            platform.destroy_menu(native);
            return Err(e);
        }
        *id += 1;
    }

    Ok(native)
}
