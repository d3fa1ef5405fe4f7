//! Menu tree model for the tray context menu.
//!
//! A [`Menu`] is an ordered sequence of [`MenuItem`]s. Submenus nest a child
//! `Menu`. Items are addressed by [`ItemPath`], which is also what a projected
//! native menu entry refers back to.

use std::fmt;
use std::rc::Rc;

use crate::dispatch::Dispatch;

/// Callback attached to a menu item or to the notification balloon.
///
/// Closures capture whatever context they need. The [`Dispatch`] argument
/// gives access to the activated item and the live configuration.
#[derive(Clone)]
pub struct Callback(Rc<dyn Fn(&mut Dispatch<'_>)>);

impl Callback {
    pub fn new(f: impl Fn(&mut Dispatch<'_>) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub(crate) fn call(&self, ctx: &mut Dispatch<'_>) {
        (self.0)(ctx)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback(..)")
    }
}

/// Properties shared by every non-separator menu entry.
#[derive(Debug, Clone, Default)]
pub struct Item {
    /// Display text.
    pub text: String,
    /// Greyed out and not selectable.
    pub disabled: bool,
    /// Shows a check mark. Only [`MenuItem::Checkbox`] toggles it on click.
    pub checked: bool,
    /// Invoked when the entry is selected.
    pub action: Option<Callback>,
}

impl Item {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    pub fn on_click(mut self, f: impl Fn(&mut Dispatch<'_>) + 'static) -> Self {
        self.action = Some(Callback::new(f));
        self
    }
}

/// One entry of a menu level.
#[derive(Debug, Clone)]
pub enum MenuItem {
    Separator,
    Action(Item),
    Checkbox(Item),
    Submenu(Item, Menu),
}

impl MenuItem {
    /// Plain entry running `f` when selected.
    pub fn action(text: impl Into<String>, f: impl Fn(&mut Dispatch<'_>) + 'static) -> Self {
        MenuItem::Action(Item::new(text).on_click(f))
    }

    /// Check-box entry; the check mark flips before `f` runs.
    pub fn checkbox(
        text: impl Into<String>,
        checked: bool,
        f: impl Fn(&mut Dispatch<'_>) + 'static,
    ) -> Self {
        MenuItem::Checkbox(Item::new(text).checked(checked).on_click(f))
    }

    /// Entry opening `children`.
    pub fn submenu(text: impl Into<String>, children: Menu) -> Self {
        MenuItem::Submenu(Item::new(text), children)
    }

    /// Informational entry: disabled, no action.
    pub fn label(text: impl Into<String>) -> Self {
        MenuItem::Action(Item::new(text).disabled(true))
    }

    pub fn item(&self) -> Option<&Item> {
        match self {
            MenuItem::Separator => None,
            MenuItem::Action(item) | MenuItem::Checkbox(item) | MenuItem::Submenu(item, _) => {
                Some(item)
            }
        }
    }

    pub fn item_mut(&mut self) -> Option<&mut Item> {
        match self {
            MenuItem::Separator => None,
            MenuItem::Action(item) | MenuItem::Checkbox(item) | MenuItem::Submenu(item, _) => {
                Some(item)
            }
        }
    }

    /// Display text; `None` for separators.
    pub fn text(&self) -> Option<&str> {
        self.item().map(|i| i.text.as_str())
    }

    pub fn children(&self) -> Option<&Menu> {
        match self {
            MenuItem::Submenu(_, children) => Some(children),
            _ => None,
        }
    }

    pub fn is_separator(&self) -> bool {
        matches!(self, MenuItem::Separator)
    }

    pub fn is_checkbox(&self) -> bool {
        matches!(self, MenuItem::Checkbox(_))
    }
}

/// Ordered sequence of menu items.
#[derive(Debug, Clone, Default)]
pub struct Menu(Vec<MenuItem>);

impl Menu {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends an item (builder style).
    pub fn with(mut self, item: MenuItem) -> Self {
        self.0.push(item);
        self
    }

    pub fn push(&mut self, item: MenuItem) {
        self.0.push(item);
    }

    pub fn items(&self) -> &[MenuItem] {
        &self.0
    }

    pub fn items_mut(&mut self) -> &mut Vec<MenuItem> {
        &mut self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Looks up the item at `path`.
    pub fn get(&self, path: &ItemPath) -> Option<&MenuItem> {
        let (last, parents) = path.0.split_last()?;
        let mut level = self;
        for &i in parents {
            level = level.0.get(i)?.children()?;
        }
        level.0.get(*last)
    }

    pub fn get_mut(&mut self, path: &ItemPath) -> Option<&mut MenuItem> {
        let (last, parents) = path.0.split_last()?;
        let mut level = self;
        for &i in parents {
            level = match level.0.get_mut(i)? {
                MenuItem::Submenu(_, children) => children,
                _ => return None,
            };
        }
        level.0.get_mut(*last)
    }

    /// Finds the path of the item reached by following display texts,
    /// one per level. Separators never match.
    pub fn find<S: AsRef<str>>(&self, texts: &[S]) -> Option<ItemPath> {
        let mut path = Vec::with_capacity(texts.len());
        let mut level = Some(self);
        for text in texts {
            let items = level?;
            let (i, item) = items
                .0
                .iter()
                .enumerate()
                .find(|(_, item)| item.text() == Some(text.as_ref()))?;
            path.push(i);
            level = item.children();
        }
        if path.is_empty() {
            return None;
        }
        Some(ItemPath(path))
    }
}

impl From<Vec<MenuItem>> for Menu {
    fn from(items: Vec<MenuItem>) -> Self {
        Self(items)
    }
}

impl FromIterator<MenuItem> for Menu {
    fn from_iter<T: IntoIterator<Item = MenuItem>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Position of an item in the tree: one index per nesting level.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemPath(Vec<usize>);

impl ItemPath {
    pub fn root(index: usize) -> Self {
        Self(vec![index])
    }

    /// Path of the `index`-th child of this item.
    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<usize>> for ItemPath {
    fn from(indices: Vec<usize>) -> Self {
        Self(indices)
    }
}

impl fmt::Display for ItemPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for i in &self.0 {
            if !first {
                f.write_str("/")?;
            }
            write!(f, "{i}")?;
            first = false;
        }
        Ok(())
    }
}
