//! Status-area tray engine.
//!
//! Keeps exactly one tray icon with a context menu and optional notification
//! balloons in sync with an in-memory [`TrayConfig`]:
//! - [`TrayEngine::initialize`] / [`TrayEngine::update`]: project the menu
//!   tree into a native menu and push only the presentation changes
//! - [`TrayEngine::step`]: pump native events, run menu and notification
//!   callbacks
//! - shell restarts are detected on the event queue and the tray is restored
//!   automatically
//!
//! Everything runs on the thread that calls `step`; the engine is not `Send`.
//!
//! # Platform notes
//! - Windows: Win32 `Shell_NotifyIcon` backend in [`win32`]
//! - Elsewhere, and in tests: the in-memory [`sim`] backend

mod config;
mod diag;
mod dispatch;
mod engine;
mod error;
mod menu;
mod platform;
mod projection;
mod recovery;

pub mod sim;
#[cfg(windows)]
pub mod win32;

pub use config::{Notification, TrayConfig};
pub use diag::{LogCallback, LogLevel, set_log_callback};
pub use dispatch::{Dispatch, StepStatus};
pub use engine::{EngineState, INFO_TEXT_MAX, INFO_TITLE_MAX, TOOLTIP_MAX, TrayEngine};
pub use error::{PlatformError, TrayError};
pub use menu::{Callback, Item, ItemPath, Menu, MenuItem};
pub use platform::{
    AppliedState, EventLoop, MenuApi, NativeEvent, NativeItem, NotifyApi, Platform,
    Presentation, TrayIdentity,
};
pub use projection::{ID_TRAY_FIRST, Projection, project};
pub use statray_icon_cache::{IconKind, IconLoadError, IconLoader};

/// Backend for the current host.
#[cfg(windows)]
pub type NativePlatform = win32::Win32Platform;
/// Backend for the current host.
#[cfg(not(windows))]
pub type NativePlatform = sim::SimPlatform;
