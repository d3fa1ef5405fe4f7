//! Headless backend that simulates the host shell in memory.
//!
//! Used by the test suite and by the demo on hosts without a native backend.
//! User and shell activity is injected through a [`SimController`], which
//! can be cloned and moved to another thread while the engine thread blocks
//! in `step(true)`. The simulated shell mirrors notify-icon semantics: a
//! restart drops every registration, a second registration under the same
//! identity is refused, and `modify` only updates the fields whose flag is
//! set.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use statray_icon_cache::{IconKind, IconLoadError, IconLoader};
use tracing::trace;

use crate::error::PlatformError;
use crate::platform::{
    AppliedState, EventLoop, MenuApi, NativeEvent, NativeItem, NotifyApi, TrayIdentity,
};

/// Simulated native menu handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SimMenuId(u64);

/// Simulated native icon handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SimIcon(u64);

/// Input injected into the simulated host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimInput {
    /// The user picks the entry reached by these texts in the shown menu.
    Select(Vec<String>),
    /// A raw menu command with this identifier.
    Command(u32),
    NotificationClick,
    /// The shell restarts and forgets every tray registration.
    ShellRestart,
    /// The host asks the application to quit.
    Quit,
}

/// Sending side of the simulated host.
#[derive(Debug, Clone)]
pub struct SimController {
    tx: Sender<SimInput>,
}

impl SimController {
    /// Returns `false` once the platform has been dropped.
    pub fn send(&self, input: SimInput) -> bool {
        self.tx.send(input).is_ok()
    }

    pub fn select<S: AsRef<str>>(&self, texts: &[S]) -> bool {
        self.send(SimInput::Select(
            texts.iter().map(|t| t.as_ref().to_string()).collect(),
        ))
    }

    pub fn command(&self, id: u32) -> bool {
        self.send(SimInput::Command(id))
    }

    pub fn click_notification(&self) -> bool {
        self.send(SimInput::NotificationClick)
    }

    pub fn restart_shell(&self) -> bool {
        self.send(SimInput::ShellRestart)
    }

    pub fn quit(&self) -> bool {
        self.send(SimInput::Quit)
    }
}

/// Failures to inject into the next platform calls.
#[derive(Debug, Clone, Default)]
pub struct SimFailures {
    pub open: bool,
    pub add: bool,
    pub set_version: bool,
    pub modify: bool,
    /// Number of menus that may still be created before creation fails.
    pub create_menu_after: Option<usize>,
    /// Icon paths that fail to load.
    pub icon_paths: Vec<String>,
}

/// Platform call recorded for ordering checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimCall {
    Open,
    Close,
    Add,
    Remove,
    Modify,
    InstallMenu(SimMenuId),
    DestroyMenu(SimMenuId),
}

/// Menu entry as the user would see it. Identifiers are deliberately left
/// out so two projections of the same tree compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimNode {
    /// `None` for separators.
    pub label: Option<String>,
    pub disabled: bool,
    pub checked: bool,
    pub children: Vec<SimNode>,
}

impl SimNode {
    pub fn separator() -> Self {
        Self {
            label: None,
            disabled: false,
            checked: false,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct SimEntry {
    id: u32,
    label: Option<String>,
    disabled: bool,
    checked: bool,
    submenu: Option<SimMenuId>,
}

/// What the shell currently shows for one registration.
#[derive(Debug, Clone)]
struct ShellIcon {
    identity: TrayIdentity,
    icon_path: Option<String>,
    tooltip: String,
    info_title: String,
    info_text: String,
}

#[derive(Debug, Default)]
struct Shell {
    icons: Vec<ShellIcon>,
    balloons_shown: usize,
}

impl Shell {
    fn find_mut(&mut self, identity: &TrayIdentity) -> Option<&mut ShellIcon> {
        self.icons.iter_mut().find(|i| i.identity.guid == identity.guid)
    }
}

/// Read-only view of the simulated shell that outlives the platform.
#[derive(Debug, Clone)]
pub struct SimShell(Rc<RefCell<Shell>>);

impl SimShell {
    /// Number of tray icons present in the status area.
    pub fn tray_count(&self) -> usize {
        self.0.borrow().icons.len()
    }

    pub fn balloons_shown(&self) -> usize {
        self.0.borrow().balloons_shown
    }
}

/// In-memory [`Platform`](crate::Platform).
#[derive(Debug)]
pub struct SimPlatform {
    input: Receiver<SimInput>,
    pending: VecDeque<NativeEvent>,
    host_open: bool,
    failures: SimFailures,
    shell: Rc<RefCell<Shell>>,
    menus: HashMap<SimMenuId, Vec<SimEntry>>,
    next_menu: u64,
    installed: Option<SimMenuId>,
    icons: HashMap<SimIcon, (String, IconKind)>,
    next_icon: u64,
    icon_loads: usize,
    modifies: usize,
    calls: Vec<SimCall>,
}

impl SimPlatform {
    pub fn new() -> (Self, SimController) {
        let (tx, input) = mpsc::channel();
        let platform = Self {
            input,
            pending: VecDeque::new(),
            host_open: false,
            failures: SimFailures::default(),
            shell: Rc::new(RefCell::new(Shell::default())),
            menus: HashMap::new(),
            next_menu: 1,
            installed: None,
            icons: HashMap::new(),
            next_icon: 1,
            icon_loads: 0,
            modifies: 0,
            calls: Vec::new(),
        };
        (platform, SimController { tx })
    }

    pub fn failures_mut(&mut self) -> &mut SimFailures {
        &mut self.failures
    }

    pub fn shell(&self) -> SimShell {
        SimShell(self.shell.clone())
    }

    pub fn host_open(&self) -> bool {
        self.host_open
    }

    pub fn tray_count(&self) -> usize {
        self.shell.borrow().icons.len()
    }

    pub fn is_registered(&self, identity: &TrayIdentity) -> bool {
        self.shell
            .borrow()
            .icons
            .iter()
            .any(|i| i.identity.guid == identity.guid)
    }

    /// Path of the icon the shell shows for the first registration.
    pub fn shell_icon_path(&self) -> Option<String> {
        self.shell.borrow().icons.first()?.icon_path.clone()
    }

    /// Tooltip the shell shows for the first registration.
    pub fn shell_tooltip(&self) -> Option<String> {
        let shell = self.shell.borrow();
        let icon = shell.icons.first()?;
        (!icon.tooltip.is_empty()).then(|| icon.tooltip.clone())
    }

    /// Last notification title and text the shell displayed.
    pub fn shell_notification(&self) -> Option<(String, String)> {
        let shell = self.shell.borrow();
        let icon = shell.icons.first()?;
        Some((icon.info_title.clone(), icon.info_text.clone()))
    }

    pub fn balloons_shown(&self) -> usize {
        self.shell.borrow().balloons_shown
    }

    pub fn installed_menu(&self) -> Option<SimMenuId> {
        self.installed
    }

    /// Tree shape of the installed menu.
    pub fn menu_shape(&self) -> Option<Vec<SimNode>> {
        self.installed.map(|m| self.shape_of(m))
    }

    /// Native menus created and not yet destroyed, submenus included.
    pub fn live_menus(&self) -> usize {
        self.menus.len()
    }

    /// Icon handles loaded and not yet released.
    pub fn live_icons(&self) -> usize {
        self.icons.len()
    }

    pub fn icon_loads(&self) -> usize {
        self.icon_loads
    }

    pub fn modify_count(&self) -> usize {
        self.modifies
    }

    pub fn icon_info(&self, icon: SimIcon) -> Option<(&str, IconKind)> {
        self.icons
            .get(&icon)
            .map(|(path, kind)| (path.as_str(), *kind))
    }

    pub fn calls(&self) -> &[SimCall] {
        &self.calls
    }

    fn shape_of(&self, menu: SimMenuId) -> Vec<SimNode> {
        let Some(entries) = self.menus.get(&menu) else {
            return Vec::new();
        };
        entries
            .iter()
            .map(|e| SimNode {
                label: e.label.clone(),
                disabled: e.disabled,
                checked: e.checked,
                children: e.submenu.map(|s| self.shape_of(s)).unwrap_or_default(),
            })
            .collect()
    }

    /// Resolves a text path in the installed menu to a command identifier,
    /// the way a click would. Disabled entries and submenu parents produce
    /// no command.
    fn resolve_selection(&self, texts: &[String]) -> Option<u32> {
        let mut menu = self.installed?;
        let (last, parents) = texts.split_last()?;
        for text in parents {
            let entry = self.find_by_label(menu, text)?;
            if entry.disabled {
                return None;
            }
            menu = entry.submenu?;
        }
        let entry = self.find_by_label(menu, last)?;
        if entry.disabled || entry.submenu.is_some() {
            return None;
        }
        Some(entry.id)
    }

    fn find_by_label(&self, menu: SimMenuId, text: &str) -> Option<&SimEntry> {
        self.menus
            .get(&menu)?
            .iter()
            .find(|e| e.label.as_deref() == Some(text))
    }

    /// Menu and index of entry `id` anywhere below `menu`.
    fn locate(&self, menu: SimMenuId, id: u32) -> Option<(SimMenuId, usize)> {
        let entries = self.menus.get(&menu)?;
        for (i, e) in entries.iter().enumerate() {
            if e.id == id && e.label.is_some() {
                return Some((menu, i));
            }
            if let Some(found) = e.submenu.and_then(|s| self.locate(s, id)) {
                return Some(found);
            }
        }
        None
    }

    fn free_menu(&mut self, menu: SimMenuId) {
        if let Some(entries) = self.menus.remove(&menu) {
            for sub in entries.into_iter().filter_map(|e| e.submenu) {
                self.free_menu(sub);
            }
        }
    }

    fn translate(&mut self, input: SimInput) -> Option<NativeEvent> {
        trace!(?input, "simulated input");
        match input {
            SimInput::Select(texts) => self.resolve_selection(&texts).map(NativeEvent::MenuCommand),
            SimInput::Command(id) => Some(NativeEvent::MenuCommand(id)),
            SimInput::NotificationClick => Some(NativeEvent::NotificationClicked),
            SimInput::ShellRestart => {
                self.shell.borrow_mut().icons.clear();
                Some(NativeEvent::ShellRestarted)
            }
            SimInput::Quit => Some(NativeEvent::Quit),
        }
    }

    fn no_such_menu(context: &str) -> PlatformError {
        PlatformError::new(context, 1401, "Invalid menu handle.")
    }
}

impl EventLoop for SimPlatform {
    fn open(&mut self) -> Result<(), PlatformError> {
        self.calls.push(SimCall::Open);
        if self.failures.open {
            return Err(PlatformError::new(
                "RegisterClassExA",
                1410,
                "Class already exists.",
            ));
        }
        self.host_open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.calls.push(SimCall::Close);
        self.host_open = false;
    }

    fn next_event(&mut self, blocking: bool) -> Result<Option<NativeEvent>, PlatformError> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(Some(event));
        }

        let input = if blocking {
            match self.input.recv() {
                Ok(input) => input,
                // Every controller is gone: nothing can ever arrive.
                Err(_) => return Ok(Some(NativeEvent::Quit)),
            }
        } else {
            match self.input.try_recv() {
                Ok(input) => input,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return Ok(None),
            }
        };

        // An input that maps to nothing (a click on a disabled entry) still
        // counts as one native message in blocking mode.
        match self.translate(input) {
            Some(event) => Ok(Some(event)),
            None if blocking => Ok(None),
            None => self.next_event(false),
        }
    }

    fn post_quit(&mut self) {
        self.pending.push_back(NativeEvent::Quit);
    }
}

impl MenuApi for SimPlatform {
    type Menu = SimMenuId;

    fn create_menu(&mut self) -> Result<SimMenuId, PlatformError> {
        match self.failures.create_menu_after {
            Some(0) => {
                return Err(PlatformError::new(
                    "CreatePopupMenu",
                    1400,
                    "Not enough memory resources are available.",
                ));
            }
            Some(ref mut left) => *left -= 1,
            None => {}
        }
        let id = SimMenuId(self.next_menu);
        self.next_menu += 1;
        self.menus.insert(id, Vec::new());
        Ok(id)
    }

    fn insert_separator(&mut self, menu: SimMenuId, id: u32) -> Result<(), PlatformError> {
        let entries = self
            .menus
            .get_mut(&menu)
            .ok_or_else(|| Self::no_such_menu("InsertMenuA"))?;
        entries.push(SimEntry {
            id,
            label: None,
            disabled: false,
            checked: false,
            submenu: None,
        });
        Ok(())
    }

    fn insert_item(
        &mut self,
        menu: SimMenuId,
        item: NativeItem<'_, SimMenuId>,
    ) -> Result<(), PlatformError> {
        let entries = self
            .menus
            .get_mut(&menu)
            .ok_or_else(|| Self::no_such_menu("InsertMenuItemA"))?;
        entries.push(SimEntry {
            id: item.id,
            label: Some(item.text.to_string()),
            disabled: item.disabled,
            checked: item.checked,
            submenu: item.submenu,
        });
        Ok(())
    }

    fn set_checked(
        &mut self,
        menu: SimMenuId,
        id: u32,
        checked: bool,
    ) -> Result<(), PlatformError> {
        let (owner, index) = self
            .locate(menu, id)
            .ok_or_else(|| Self::no_such_menu("SetMenuItemInfoA"))?;
        if let Some(entry) = self.menus.get_mut(&owner).and_then(|e| e.get_mut(index)) {
            entry.checked = checked;
        }
        Ok(())
    }

    fn install_menu(&mut self, menu: SimMenuId) {
        self.calls.push(SimCall::InstallMenu(menu));
        self.installed = Some(menu);
    }

    fn destroy_menu(&mut self, menu: SimMenuId) {
        self.calls.push(SimCall::DestroyMenu(menu));
        self.free_menu(menu);
        if self.installed == Some(menu) {
            self.installed = None;
        }
    }
}

impl IconLoader for SimPlatform {
    type Handle = SimIcon;

    fn load(&mut self, path: &str, kind: IconKind) -> Result<SimIcon, IconLoadError> {
        if self.failures.icon_paths.iter().any(|p| p == path) {
            return Err(IconLoadError::NotFound(path.to_string()));
        }
        self.icon_loads += 1;
        let icon = SimIcon(self.next_icon);
        self.next_icon += 1;
        self.icons.insert(icon, (path.to_string(), kind));
        Ok(icon)
    }

    fn release(&mut self, handle: SimIcon) {
        self.icons.remove(&handle);
    }
}

impl NotifyApi for SimPlatform {
    fn add(&mut self, identity: &TrayIdentity) -> Result<(), PlatformError> {
        self.calls.push(SimCall::Add);
        if self.failures.add {
            return Err(PlatformError::new(
                "Shell_NotifyIconA(NIM_ADD)",
                1460,
                "This operation returned because the timeout period expired.",
            ));
        }
        let mut shell = self.shell.borrow_mut();
        if shell.find_mut(identity).is_some() {
            return Err(PlatformError::new(
                "Shell_NotifyIconA(NIM_ADD)",
                0,
                "a tray icon with this identity is already registered",
            ));
        }
        shell.icons.push(ShellIcon {
            identity: *identity,
            icon_path: None,
            tooltip: String::new(),
            info_title: String::new(),
            info_text: String::new(),
        });
        Ok(())
    }

    fn set_version(&mut self, identity: &TrayIdentity) -> Result<(), PlatformError> {
        if self.failures.set_version || !self.is_registered(identity) {
            return Err(PlatformError::new(
                "Shell_NotifyIconA(NIM_SETVERSION)",
                0,
                "no extended error message",
            ));
        }
        Ok(())
    }

    fn modify(
        &mut self,
        identity: &TrayIdentity,
        state: &AppliedState<SimIcon>,
    ) -> Result<(), PlatformError> {
        self.calls.push(SimCall::Modify);
        let fail = || {
            PlatformError::new(
                "Shell_NotifyIconA(NIM_MODIFY)",
                0,
                "no extended error message",
            )
        };
        if self.failures.modify {
            return Err(fail());
        }

        let mut shell = self.shell.borrow_mut();
        let icon = shell.find_mut(identity).ok_or_else(fail)?;
        if state.flags.icon {
            icon.icon_path = state
                .icon
                .and_then(|h| self.icons.get(&h))
                .map(|(path, _)| path.clone());
        }
        if state.flags.tooltip {
            icon.tooltip = state.tooltip.clone();
        }
        let shows_balloon = state.flags.info;
        if shows_balloon {
            icon.info_title = state.info_title.clone();
            icon.info_text = state.info_text.clone();
            shell.balloons_shown += 1;
        }
        self.modifies += 1;
        Ok(())
    }

    fn remove(&mut self, identity: &TrayIdentity) -> Result<(), PlatformError> {
        self.calls.push(SimCall::Remove);
        let mut shell = self.shell.borrow_mut();
        let before = shell.icons.len();
        shell.icons.retain(|i| i.identity.guid != identity.guid);
        if shell.icons.len() == before {
            return Err(PlatformError::new(
                "Shell_NotifyIconA(NIM_DELETE)",
                0,
                "no extended error message",
            ));
        }
        Ok(())
    }
}
