//! Event dispatch: pumps native events and routes them to callbacks.

use tracing::debug;

use crate::config::TrayConfig;
use crate::diag::{self, LogLevel};
use crate::engine::{EngineState, TrayEngine};
use crate::menu::{Callback, Item, ItemPath, MenuItem};
use crate::platform::{NativeEvent, Platform};

/// Outcome of one [`TrayEngine::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// Keep calling `step`.
    Continue,
    /// The host asked to stop; leave the loop.
    Shutdown,
}

/// Context handed to menu and notification callbacks.
///
/// Callbacks cannot call back into the engine directly. They edit the
/// configuration here and ask for an update or exit, which the dispatcher
/// performs once the callback returns.
pub struct Dispatch<'a> {
    config: &'a mut TrayConfig,
    source: Option<ItemPath>,
    update_requested: bool,
    exit_requested: bool,
}

impl<'a> Dispatch<'a> {
    pub(crate) fn new(config: &'a mut TrayConfig, source: Option<ItemPath>) -> Self {
        Self {
            config,
            source,
            update_requested: false,
            exit_requested: false,
        }
    }

    /// Path of the activated item; `None` for notification clicks.
    pub fn path(&self) -> Option<&ItemPath> {
        self.source.as_ref()
    }

    /// The activated item. Checkbox items already show their new state.
    pub fn item(&self) -> Option<&Item> {
        let path = self.source.as_ref()?;
        self.config.menu.get(path)?.item()
    }

    pub fn item_mut(&mut self) -> Option<&mut Item> {
        let path = self.source.as_ref()?;
        self.config.menu.get_mut(path)?.item_mut()
    }

    pub fn config(&self) -> &TrayConfig {
        &*self.config
    }

    pub fn config_mut(&mut self) -> &mut TrayConfig {
        &mut *self.config
    }

    /// Re-applies the configuration after the callback returns.
    pub fn request_update(&mut self) {
        self.update_requested = true;
    }

    /// Tears the tray down after the callback returns; the next `step`
    /// reports [`StepStatus::Shutdown`].
    pub fn request_exit(&mut self) {
        self.exit_requested = true;
    }
}

impl<P: Platform> TrayEngine<P> {
    /// Runs one iteration of the event loop.
    ///
    /// Blocking: waits for one native event and dispatches it. Non-blocking:
    /// dispatches everything already queued and returns.
    pub fn step(&mut self, blocking: bool) -> StepStatus {
        if self.state == EngineState::Uninitialized {
            diag::emit(LogLevel::Warning, "step called before initialize");
            return StepStatus::Shutdown;
        }

        loop {
            match self.platform.next_event(blocking) {
                Ok(Some(event)) => {
                    let status = self.dispatch(event);
                    if blocking || status == StepStatus::Shutdown {
                        return status;
                    }
                }
                Ok(None) => return StepStatus::Continue,
                Err(e) => {
                    diag::os_failure(LogLevel::Error, &e);
                    return StepStatus::Shutdown;
                }
            }
        }
    }

    /// Routes one translated native event.
    pub fn dispatch(&mut self, event: NativeEvent) -> StepStatus {
        match event {
            NativeEvent::MenuCommand(id) => self.activate(id),
            NativeEvent::NotificationClicked => self.notification_clicked(),
            NativeEvent::ShellRestarted => self.recover(),
            NativeEvent::Quit => return StepStatus::Shutdown,
        }
        StepStatus::Continue
    }

    fn activate(&mut self, id: u32) {
        if self.state != EngineState::Active {
            debug!(id, state = %self.state, "menu command ignored");
            return;
        }
        let Some(projection) = &self.menu else {
            return;
        };
        let root = projection.root;
        let Some(path) = projection.resolve(id).cloned() else {
            debug!(id, "menu command has no matching item");
            return;
        };

        let (toggled, action) = match self.config.menu.get_mut(&path) {
            Some(MenuItem::Checkbox(item)) => {
                item.checked = !item.checked;
                (Some(item.checked), item.action.clone())
            }
            Some(entry) => (None, entry.item().and_then(|i| i.action.clone())),
            None => {
                debug!(id, %path, "menu item vanished since projection");
                return;
            }
        };

        if let Some(checked) = toggled
            && let Err(e) = self.platform.set_checked(root, id, checked)
        {
            diag::os_failure(LogLevel::Warning, &e);
        }

        self.run(action, Some(path));
    }

    fn notification_clicked(&mut self) {
        if self.state != EngineState::Active {
            debug!(state = %self.state, "notification click ignored");
            return;
        }
        let action = self.config.on_notification_click.clone();
        if action.is_none() {
            debug!("notification click without a callback");
        }
        self.run(action, None);
    }

    fn run(&mut self, action: Option<Callback>, source: Option<ItemPath>) {
        let Some(action) = action else {
            return;
        };

        let mut ctx = Dispatch::new(&mut self.config, source);
        action.call(&mut ctx);
        let (update, exit) = (ctx.update_requested, ctx.exit_requested);

        if exit {
            if let Err(e) = self.teardown() {
                debug!("exit requested: {e}");
            }
        } else if update && self.state == EngineState::Active {
            self.refresh(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;
    use crate::menu::Menu;
    use crate::sim::{SimController, SimPlatform};

    fn active(config: TrayConfig) -> (TrayEngine<SimPlatform>, SimController) {
        let (sim, ctl) = SimPlatform::new();
        let mut tray = TrayEngine::new(sim);
        tray.initialize(config).unwrap();
        (tray, ctl)
    }

    /// Menu whose every leaf records its text into `log`.
    fn recording_menu(log: &Rc<RefCell<Vec<String>>>) -> Menu {
        let rec = |text: &str| {
            let log = log.clone();
            let name = text.to_string();
            MenuItem::action(text, move |_| log.borrow_mut().push(name.clone()))
        };
        Menu::new()
            .with(rec("A"))
            .with(MenuItem::Separator)
            .with(MenuItem::submenu(
                "Sub",
                Menu::new().with(rec("B")).with(MenuItem::submenu(
                    "Deeper",
                    Menu::new().with(rec("C")).with(rec("D")),
                )),
            ))
            .with(rec("E"))
    }

    #[test]
    fn activation_runs_exactly_that_leaf() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let (mut tray, ctl) = active(TrayConfig::new("a.ico").with_menu(recording_menu(&log)));

        ctl.select(&["Sub", "Deeper", "D"]);
        assert_eq!(tray.step(true), StepStatus::Continue);
        assert_eq!(*log.borrow(), vec!["D"]);

        ctl.select(&["E"]);
        assert_eq!(tray.step(true), StepStatus::Continue);
        assert_eq!(*log.borrow(), vec!["D", "E"]);
    }

    #[test]
    fn every_leaf_resolves_through_its_identifier() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let (mut tray, _ctl) = active(TrayConfig::new("a.ico").with_menu(recording_menu(&log)));

        for (texts, expected) in [
            (vec!["A"], "A"),
            (vec!["Sub", "B"], "B"),
            (vec!["Sub", "Deeper", "C"], "C"),
            (vec!["E"], "E"),
        ] {
            log.borrow_mut().clear();
            let path = tray.config().menu.find(texts.as_slice()).unwrap();
            let id = tray.projection().unwrap().id_of(&path).unwrap();
            tray.dispatch(NativeEvent::MenuCommand(id));
            assert_eq!(*log.borrow(), vec![expected]);
        }
    }

    #[test]
    fn checkbox_toggles_before_callback() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_cb = seen.clone();
        let menu = Menu::new().with(MenuItem::checkbox("Mute", false, move |d| {
            seen_cb.borrow_mut().push(d.item().unwrap().checked);
        }));
        let (mut tray, ctl) = active(TrayConfig::new("a.ico").with_menu(menu));

        ctl.select(&["Mute"]);
        tray.step(true);
        assert_eq!(*seen.borrow(), vec![true]);
        assert!(tray.platform().menu_shape().unwrap()[0].checked);

        ctl.select(&["Mute"]);
        tray.step(true);
        assert_eq!(*seen.borrow(), vec![true, false]);

        // Two activations restore the initial flag.
        let mute = tray.config().menu.get(&ItemPath::root(0)).unwrap();
        assert!(!mute.item().unwrap().checked);
        assert!(!tray.platform().menu_shape().unwrap()[0].checked);
    }

    #[test]
    fn non_checkbox_checked_flag_is_left_alone() {
        let menu = Menu::new().with(MenuItem::Action(
            Item::new("Pinned").checked(true).on_click(|_| {}),
        ));
        let (mut tray, ctl) = active(TrayConfig::new("a.ico").with_menu(menu));

        ctl.select(&["Pinned"]);
        tray.step(true);
        ctl.select(&["Pinned"]);
        tray.step(true);

        let pinned = tray.config().menu.get(&ItemPath::root(0)).unwrap();
        assert!(pinned.item().unwrap().checked);
    }

    #[test]
    fn checkbox_without_callback_still_toggles() {
        let menu = Menu::new().with(MenuItem::Checkbox(Item::new("Flag")));
        let (mut tray, _ctl) = active(TrayConfig::new("a.ico").with_menu(menu));

        let id = tray.projection().unwrap().id_of(&ItemPath::root(0)).unwrap();
        tray.dispatch(NativeEvent::MenuCommand(id));
        let flag = tray.config().menu.get(&ItemPath::root(0)).unwrap();
        assert!(flag.item().unwrap().checked);
    }

    #[test]
    fn unknown_identifier_is_dropped() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let (mut tray, ctl) = active(TrayConfig::new("a.ico").with_menu(recording_menu(&log)));

        ctl.command(4242);
        assert_eq!(tray.step(true), StepStatus::Continue);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn notification_click_runs_callback() {
        let clicks = Rc::new(Cell::new(0));
        let counter = clicks.clone();
        let config = TrayConfig::new("a.ico")
            .with_notification("Done", "ok")
            .on_notification_click(move |d| {
                assert!(d.path().is_none());
                assert!(d.item().is_none());
                counter.set(counter.get() + 1);
            });
        let (mut tray, ctl) = active(config);

        ctl.click_notification();
        tray.step(true);
        assert_eq!(clicks.get(), 1);
    }

    #[test]
    fn notification_click_after_teardown_is_ignored() {
        let clicks = Rc::new(Cell::new(0));
        let counter = clicks.clone();
        let config = TrayConfig::new("a.ico")
            .on_notification_click(move |_| counter.set(counter.get() + 1));
        let (mut tray, _ctl) = active(config);

        tray.teardown().unwrap();
        assert_eq!(tray.dispatch(NativeEvent::NotificationClicked), StepStatus::Continue);
        assert_eq!(clicks.get(), 0);
    }

    #[test]
    fn notification_click_without_callback_is_ignored() {
        let (mut tray, ctl) = active(TrayConfig::new("a.ico"));
        ctl.click_notification();
        assert_eq!(tray.step(true), StepStatus::Continue);
    }

    #[test]
    fn callback_requested_update_is_applied() {
        let menu = Menu::new().with(MenuItem::action("Start", |d| {
            d.item_mut().unwrap().text = "Stop".into();
            d.config_mut().tooltip = "Running".into();
            d.request_update();
        }));
        let (mut tray, ctl) = active(TrayConfig::new("a.ico").with_menu(menu));

        ctl.select(&["Start"]);
        tray.step(true);

        assert_eq!(tray.platform().menu_shape().unwrap()[0].label.as_deref(), Some("Stop"));
        assert_eq!(tray.applied().tooltip, "Running");
    }

    #[test]
    fn edits_without_update_request_stay_in_memory() {
        let menu = Menu::new().with(MenuItem::action("Start", |d| {
            d.item_mut().unwrap().text = "Stop".into();
        }));
        let (mut tray, ctl) = active(TrayConfig::new("a.ico").with_menu(menu));

        ctl.select(&["Start"]);
        tray.step(true);

        assert_eq!(tray.config().menu.items()[0].text(), Some("Stop"));
        assert_eq!(tray.platform().menu_shape().unwrap()[0].label.as_deref(), Some("Start"));
    }

    #[test]
    fn exit_request_tears_down_and_next_step_shuts_down() {
        let menu = Menu::new().with(MenuItem::action("Quit", |d| d.request_exit()));
        let (mut tray, ctl) = active(TrayConfig::new("a.ico").with_menu(menu));

        ctl.select(&["Quit"]);
        assert_eq!(tray.step(true), StepStatus::Continue);
        assert_eq!(tray.state(), EngineState::Destroyed);
        assert_eq!(tray.step(true), StepStatus::Shutdown);
    }

    #[test]
    fn host_quit_shuts_down() {
        let (mut tray, ctl) = active(TrayConfig::new("a.ico"));
        ctl.quit();
        assert_eq!(tray.step(true), StepStatus::Shutdown);
    }

    #[test]
    fn non_blocking_drains_queue() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let (mut tray, ctl) = active(TrayConfig::new("a.ico").with_menu(recording_menu(&log)));

        assert_eq!(tray.step(false), StepStatus::Continue);
        assert!(log.borrow().is_empty());

        ctl.select(&["A"]);
        ctl.select(&["E"]);
        ctl.select(&["Sub", "B"]);
        assert_eq!(tray.step(false), StepStatus::Continue);
        assert_eq!(*log.borrow(), vec!["A", "E", "B"]);
    }

    #[test]
    fn non_blocking_stops_at_quit() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let (mut tray, ctl) = active(TrayConfig::new("a.ico").with_menu(recording_menu(&log)));

        ctl.select(&["A"]);
        ctl.quit();
        ctl.select(&["E"]);
        assert_eq!(tray.step(false), StepStatus::Shutdown);
        assert_eq!(*log.borrow(), vec!["A"]);
    }

    #[test]
    fn step_before_initialize_shuts_down() {
        let (sim, _ctl) = SimPlatform::new();
        let mut tray = TrayEngine::new(sim);
        assert_eq!(tray.step(false), StepStatus::Shutdown);
    }

    #[test]
    fn disabled_items_cannot_be_selected() {
        let clicks = Rc::new(Cell::new(0));
        let counter = clicks.clone();
        let menu = Menu::new().with(MenuItem::Action(
            Item::new("Locked")
                .disabled(true)
                .on_click(move |_| counter.set(counter.get() + 1)),
        ));
        let (mut tray, ctl) = active(TrayConfig::new("a.ico").with_menu(menu));

        ctl.select(&["Locked"]);
        tray.step(true);
        assert_eq!(clicks.get(), 0);
    }
}
