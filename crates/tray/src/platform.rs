//! Seams between the tray engine and the host platform.
//!
//! A backend implements four small traits: the native event loop, the
//! native menu API, icon loading (from `statray-icon-cache`), and the
//! notify-icon API. [`Platform`] is implemented for anything that has all
//! four.

use std::fmt;

use statray_icon_cache::IconLoader;
use uuid::Uuid;

use crate::error::PlatformError;

/// Stable identity of the tray registration.
///
/// Re-registering with the same identity after a shell restart replaces the
/// old icon instead of adding a second one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrayIdentity {
    /// Non-zero numeric id within the owning window.
    pub id: u32,
    pub guid: Uuid,
}

impl TrayIdentity {
    pub const DEFAULT: TrayIdentity = TrayIdentity {
        id: 1,
        guid: Uuid::from_u128(0xC1A1C4E1_7C42_4DB4_93B4_2E9E0D7A8E31),
    };
}

impl Default for TrayIdentity {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// An event read from the host's native queue, already translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeEvent {
    /// A menu entry with this identifier was selected.
    MenuCommand(u32),
    /// The user clicked the notification balloon.
    NotificationClicked,
    /// The shell hosting the status area restarted; registrations are gone.
    ShellRestarted,
    /// The host asked the loop to stop.
    Quit,
}

/// A native menu entry to insert.
#[derive(Debug, Clone, Copy)]
pub struct NativeItem<'a, M> {
    pub id: u32,
    pub text: &'a str,
    pub disabled: bool,
    pub checked: bool,
    /// Already-built submenu to attach. Ownership moves to the parent menu.
    pub submenu: Option<M>,
}

/// Which parts of [`AppliedState`] the OS should take from this call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Presentation {
    pub icon: bool,
    pub tooltip: bool,
    /// Keep the standard tooltip visible under the modern notify-icon
    /// behavior.
    pub show_tooltip: bool,
    /// Show the notification balloon.
    pub info: bool,
}

/// Presentation block pushed to the OS in one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedState<I> {
    pub flags: Presentation,
    pub icon: Option<I>,
    pub tooltip: String,
    pub info_title: String,
    pub info_text: String,
    pub balloon_icon: Option<I>,
    /// The balloon shows `balloon_icon` as a large user icon.
    pub large_balloon: bool,
}

impl<I> Default for AppliedState<I> {
    fn default() -> Self {
        Self {
            flags: Presentation::default(),
            icon: None,
            tooltip: String::new(),
            info_title: String::new(),
            info_text: String::new(),
            balloon_icon: None,
            large_balloon: false,
        }
    }
}

/// Native window / message loop.
pub trait EventLoop {
    /// Creates whatever owns native events for the tray (window, class).
    fn open(&mut self) -> Result<(), PlatformError>;

    /// Destroys what [`EventLoop::open`] created. Safe to call when closed.
    fn close(&mut self);

    /// Reads the next event.
    ///
    /// Blocking: waits until one native message arrives; `Ok(None)` means it
    /// was not tray-related. Non-blocking: `Ok(None)` means the queue is
    /// empty.
    fn next_event(&mut self, blocking: bool) -> Result<Option<NativeEvent>, PlatformError>;

    /// Queues a [`NativeEvent::Quit`] for the loop.
    fn post_quit(&mut self);
}

/// Native popup-menu API.
pub trait MenuApi {
    type Menu: Copy + PartialEq + fmt::Debug;

    fn create_menu(&mut self) -> Result<Self::Menu, PlatformError>;

    fn insert_separator(&mut self, menu: Self::Menu, id: u32) -> Result<(), PlatformError>;

    fn insert_item(
        &mut self,
        menu: Self::Menu,
        item: NativeItem<'_, Self::Menu>,
    ) -> Result<(), PlatformError>;

    /// Updates the check mark of entry `id` anywhere below `menu`.
    fn set_checked(&mut self, menu: Self::Menu, id: u32, checked: bool)
    -> Result<(), PlatformError>;

    /// Makes `menu` the one shown when the tray icon is clicked.
    fn install_menu(&mut self, menu: Self::Menu);

    /// Destroys `menu` and every submenu attached to it.
    fn destroy_menu(&mut self, menu: Self::Menu);
}

/// Notify-icon (status item) API.
pub trait NotifyApi: IconLoader {
    /// Adds the tray object to the status area.
    fn add(&mut self, identity: &TrayIdentity) -> Result<(), PlatformError>;

    /// Opts into the modern notify-icon behavior.
    fn set_version(&mut self, identity: &TrayIdentity) -> Result<(), PlatformError>;

    /// Applies the fields selected by `state.flags` in one call.
    fn modify(
        &mut self,
        identity: &TrayIdentity,
        state: &AppliedState<Self::Handle>,
    ) -> Result<(), PlatformError>;

    fn remove(&mut self, identity: &TrayIdentity) -> Result<(), PlatformError>;
}

/// Everything the engine needs from a backend.
pub trait Platform: EventLoop + MenuApi + NotifyApi {}

impl<T: EventLoop + MenuApi + NotifyApi> Platform for T {}
