fn main() {
    println!("Run `cargo test -p tray-scenarios` to execute the tray scenarios.");
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::thread;

    use statray_tray::sim::{SimCall, SimController, SimNode, SimPlatform};
    use statray_tray::{
        EngineState, Menu, MenuItem, StepStatus, TrayConfig, TrayEngine, TrayError,
    };

    type Counter = Rc<Cell<u32>>;

    fn counter() -> Counter {
        Rc::new(Cell::new(0))
    }

    fn bump(c: &Counter) -> impl Fn(&mut statray_tray::Dispatch<'_>) + 'static {
        let c = c.clone();
        move |_| c.set(c.get() + 1)
    }

    fn start(config: TrayConfig) -> (TrayEngine<SimPlatform>, SimController) {
        let (sim, ctl) = SimPlatform::new();
        let mut tray = TrayEngine::new(sim);
        tray.initialize(config).unwrap();
        (tray, ctl)
    }

    fn label(text: &str) -> SimNode {
        SimNode {
            label: Some(text.to_string()),
            disabled: false,
            checked: false,
            children: Vec::new(),
        }
    }

    #[test]
    fn quit_runs_exactly_once() {
        let quits = counter();
        let clicks = counter();
        let quit = quits.clone();
        let config = TrayConfig::new("a.png")
            .with_menu(Menu::new().with(MenuItem::action("Quit", move |ctx| {
                quit.set(quit.get() + 1);
                ctx.request_exit();
            })))
            .on_notification_click(bump(&clicks));

        let (mut tray, ctl) = start(config);
        assert!(tray.platform().shell_tooltip().is_none());

        ctl.select(&["Quit"]);
        assert_eq!(tray.step(true), StepStatus::Continue);
        assert_eq!(tray.step(true), StepStatus::Shutdown);

        assert_eq!(quits.get(), 1);
        assert_eq!(clicks.get(), 0);
        assert_eq!(tray.state(), EngineState::Destroyed);
        assert_eq!(tray.platform().tray_count(), 0);
    }

    #[test]
    fn notification_is_shown_then_cleared() {
        let (mut tray, _ctl) = start(TrayConfig::new("a.png"));
        assert!(!tray.applied().flags.info);

        tray.update(TrayConfig::new("a.png").with_notification("Done", "Build finished"))
            .unwrap();
        let applied = tray.applied();
        assert!(applied.flags.info);
        assert_eq!(applied.info_title, "Done");
        assert_eq!(applied.info_text, "Build finished");
        // Without a dedicated balloon icon the tray icon is used.
        assert_eq!(applied.balloon_icon, applied.icon);
        assert_eq!(tray.platform().balloons_shown(), 1);

        tray.update(TrayConfig::new("a.png")).unwrap();
        let applied = tray.applied();
        assert!(!applied.flags.info);
        assert!(applied.info_title.is_empty());
        assert!(applied.info_text.is_empty());
        assert_eq!(tray.platform().balloons_shown(), 1);
    }

    #[test]
    fn shell_restart_restores_the_same_tray() {
        let config = TrayConfig::new("a.png").with_tooltip("Idle").with_menu(
            Menu::new()
                .with(MenuItem::action("Open", |_| {}))
                .with(MenuItem::Separator)
                .with(MenuItem::submenu(
                    "More",
                    Menu::new().with(MenuItem::action("About", |_| {})),
                ))
                .with(MenuItem::action("Quit", |ctx| ctx.request_exit())),
        );
        let (mut tray, ctl) = start(config);
        let before = tray.platform().menu_shape().unwrap();
        assert_eq!(
            before,
            vec![
                label("Open"),
                SimNode::separator(),
                SimNode {
                    children: vec![label("About")],
                    ..label("More")
                },
                label("Quit"),
            ]
        );

        ctl.restart_shell();
        assert_eq!(tray.step(true), StepStatus::Continue);

        let sim = tray.platform();
        assert_eq!(sim.tray_count(), 1);
        assert_eq!(sim.shell_icon_path().as_deref(), Some("a.png"));
        assert_eq!(sim.shell_tooltip().as_deref(), Some("Idle"));
        assert_eq!(sim.menu_shape().unwrap(), before);
        assert_eq!(sim.live_menus(), 2);
    }

    #[test]
    fn activating_one_leaf_runs_only_its_callback() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let rec = |name: &'static str| {
            let log = log.clone();
            MenuItem::action(name, move |_| log.borrow_mut().push(name))
        };
        let config = TrayConfig::new("a.png").with_menu(
            Menu::new().with(rec("A")).with(MenuItem::submenu(
                "B",
                Menu::new().with(rec("B1")).with(MenuItem::submenu(
                    "B2",
                    Menu::new().with(rec("B2a")),
                )),
            )),
        );
        let (mut tray, ctl) = start(config);

        ctl.select(&["B", "B2", "B2a"]);
        tray.step(true);
        assert_eq!(*log.borrow(), vec!["B2a"]);
    }

    #[test]
    fn checkbox_toggles_back_after_two_activations() {
        let (mut tray, ctl) = start(
            TrayConfig::new("a.png").with_menu(Menu::new().with(MenuItem::checkbox(
                "Mute",
                false,
                |_| {},
            ))),
        );

        ctl.select(&["Mute"]);
        tray.step(true);
        assert!(tray.platform().menu_shape().unwrap()[0].checked);
        assert_eq!(tray.config().menu.items()[0].item().map(|i| i.checked), Some(true));

        ctl.select(&["Mute"]);
        tray.step(true);
        assert!(!tray.platform().menu_shape().unwrap()[0].checked);
        assert_eq!(tray.config().menu.items()[0].item().map(|i| i.checked), Some(false));
    }

    #[test]
    fn unchanged_updates_reuse_icons_and_skip_the_shell() {
        let (mut tray, _ctl) = start(TrayConfig::new("a.png").with_tooltip("Idle"));
        let loads = tray.platform().icon_loads();
        let modifies = tray.platform().modify_count();
        let icon = tray.applied().icon;

        tray.update(TrayConfig::new("a.png").with_tooltip("Idle")).unwrap();
        tray.update(TrayConfig::new("a.png").with_tooltip("Idle")).unwrap();

        assert_eq!(tray.platform().icon_loads(), loads);
        assert_eq!(tray.platform().modify_count(), modifies);
        assert_eq!(tray.applied().icon, icon);
    }

    #[test]
    fn switching_icons_loads_each_path_once() {
        let (mut tray, _ctl) = start(TrayConfig::new("idle.png"));
        tray.update(TrayConfig::new("busy.png")).unwrap();
        let busy = tray.applied().icon;
        tray.update(TrayConfig::new("idle.png")).unwrap();
        tray.update(TrayConfig::new("busy.png")).unwrap();

        assert_eq!(tray.applied().icon, busy);
        assert_eq!(tray.icon_cache().len(), 2);
        // Three kinds per path.
        assert_eq!(tray.platform().icon_loads(), 6);
        assert_eq!(tray.platform().shell_icon_path().as_deref(), Some("busy.png"));
    }

    #[test]
    fn teardown_empties_the_cache_and_frees_everything() {
        let (mut tray, _ctl) = start(
            TrayConfig::new("a.png")
                .with_prewarm(["b.png", "c.png"])
                .with_menu(Menu::new().with(MenuItem::submenu(
                    "More",
                    Menu::new().with(MenuItem::label("v1")),
                ))),
        );
        assert_eq!(tray.icon_cache().len(), 3);

        tray.teardown().unwrap();
        assert!(tray.icon_cache().is_empty());
        assert!(!tray.icon_cache().is_open());
        let sim = tray.platform();
        assert_eq!(sim.live_icons(), 0);
        assert_eq!(sim.live_menus(), 0);
        assert_eq!(sim.tray_count(), 0);
        assert!(!sim.host_open());

        assert!(matches!(
            tray.update(TrayConfig::new("a.png")),
            Err(TrayError::InvalidState { .. })
        ));
    }

    #[test]
    fn failed_registration_releases_everything() {
        let (mut sim, _ctl) = SimPlatform::new();
        sim.failures_mut().add = true;
        let mut tray = TrayEngine::new(sim);

        let err = tray
            .initialize(TrayConfig::new("a.png").with_prewarm(["a.png"]))
            .unwrap_err();
        assert!(matches!(err, TrayError::Registration(_)));
        assert!(err.to_string().contains("NIM_ADD"));

        assert_eq!(tray.state(), EngineState::Uninitialized);
        let sim = tray.platform();
        assert!(!sim.host_open());
        assert_eq!(sim.live_icons(), 0);
        assert_eq!(sim.live_menus(), 0);
        assert_eq!(sim.tray_count(), 0);
    }

    #[test]
    fn new_menu_is_installed_before_the_old_one_is_destroyed() {
        let (mut tray, _ctl) = start(
            TrayConfig::new("a.png").with_menu(Menu::new().with(MenuItem::label("one"))),
        );
        let old = tray.platform().installed_menu().unwrap();

        tray.update(TrayConfig::new("a.png").with_menu(Menu::new().with(MenuItem::label("two"))))
            .unwrap();
        let new = tray.platform().installed_menu().unwrap();
        assert_ne!(old, new);

        let calls = tray.platform().calls();
        let installed = calls
            .iter()
            .position(|c| *c == SimCall::InstallMenu(new))
            .unwrap();
        let destroyed = calls
            .iter()
            .position(|c| *c == SimCall::DestroyMenu(old))
            .unwrap();
        assert!(installed < destroyed);
        assert_eq!(tray.platform().live_menus(), 1);
    }

    #[test]
    fn loop_driven_from_another_thread() {
        let opened = counter();
        let (mut tray, ctl) = start(TrayConfig::new("a.png").with_menu(
            Menu::new()
                .with(MenuItem::action("Open", bump(&opened)))
                .with(MenuItem::action("Quit", |ctx| ctx.request_exit())),
        ));

        let driver = thread::spawn(move || {
            ctl.select(&["Open"]);
            ctl.restart_shell();
            ctl.select(&["Open"]);
            ctl.select(&["Quit"]);
        });

        let mut steps = 0;
        while tray.step(true) == StepStatus::Continue {
            steps += 1;
            assert!(steps < 16, "loop did not stop");
        }
        driver.join().unwrap();

        assert_eq!(opened.get(), 2);
        assert_eq!(tray.state(), EngineState::Destroyed);
    }
}
