//! Builds the demo tray and runs its event loop on the main thread.

use statray_tray::{
    Dispatch, EngineState, Menu, MenuItem, NativePlatform, StepStatus, TrayConfig, TrayEngine,
};

use crate::config::DemoConfig;

const MUTE: &str = "Mute notifications";

/// Runs the tray until the user picks Quit or the host stops the loop.
pub fn run(config: DemoConfig) -> anyhow::Result<()> {
    let platform = platform();
    let mut tray = TrayEngine::new(platform);
    tray.initialize(build(&config))?;
    tracing::info!(identity = %tray.identity().guid, "tray ready");

    while tray.step(true) == StepStatus::Continue {}

    if tray.state() == EngineState::Active {
        tray.teardown()?;
    }
    Ok(())
}

/// Tray configuration with the demo menu.
pub fn build(config: &DemoConfig) -> TrayConfig {
    let title = config.notification_title.clone();
    let text = config.notification_text.clone();

    let more = Menu::new()
        .with(MenuItem::action("Show notification", move |ctx| {
            if muted(ctx) {
                tracing::info!("notifications muted; not showing");
                return;
            }
            let cfg = ctx.config_mut();
            cfg.notification.title = title.clone();
            cfg.notification.text = text.clone();
            ctx.request_update();
        }))
        .with(MenuItem::action("Clear notification", |ctx| {
            ctx.config_mut().clear_notification();
            ctx.request_update();
        }));

    let menu = Menu::new()
        .with(MenuItem::label(format!(
            "Statray demo {}",
            env!("CARGO_PKG_VERSION")
        )))
        .with(MenuItem::Separator)
        .with(MenuItem::action("Hello", |ctx| {
            tracing::info!(path = ?ctx.path().map(ToString::to_string), "hello");
        }))
        .with(MenuItem::checkbox(MUTE, false, |ctx| {
            let checked = ctx.item().is_some_and(|i| i.checked);
            tracing::info!(muted = checked, "mute toggled");
        }))
        .with(MenuItem::submenu("More", more))
        .with(MenuItem::Separator)
        .with(MenuItem::action("Quit", |ctx| {
            tracing::info!("quit requested via tray");
            ctx.request_exit();
        }));

    config
        .tray_config()
        .with_menu(menu)
        .on_notification_click(|ctx| {
            tracing::info!("notification clicked");
            ctx.config_mut().clear_notification();
            ctx.request_update();
        })
}

fn muted(ctx: &Dispatch<'_>) -> bool {
    let menu = &ctx.config().menu;
    menu.find(&[MUTE])
        .and_then(|path| menu.get(&path))
        .and_then(MenuItem::item)
        .is_some_and(|item| item.checked)
}

#[cfg(windows)]
fn platform() -> NativePlatform {
    NativePlatform::new()
}

/// Without a native tray, a scripted user drives the headless backend.
#[cfg(not(windows))]
fn platform() -> NativePlatform {
    use std::thread;
    use std::time::Duration;

    let (sim, ctl) = NativePlatform::new();
    thread::spawn(move || {
        let pause = || thread::sleep(Duration::from_millis(300));
        pause();
        ctl.select(&["Hello"]);
        pause();
        ctl.select(&["More", "Show notification"]);
        pause();
        ctl.click_notification();
        pause();
        ctl.restart_shell();
        pause();
        ctl.select(&[MUTE]);
        pause();
        ctl.select(&["More", "Show notification"]);
        pause();
        ctl.select(&["Quit"]);
    });
    sim
}
