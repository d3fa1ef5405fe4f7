//! Tray configuration: what the tray should look like right now.

use crate::dispatch::Dispatch;
use crate::menu::{Callback, Menu};

/// Notification balloon content. All fields empty means "no notification".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub text: String,
    /// Icon path for the balloon; the tray icon is used when empty.
    pub icon: String,
}

impl Notification {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            icon: String::new(),
        }
    }

    /// Whether there is anything to show. The icon alone does not count.
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.text.is_empty()
    }
}

/// Complete description of the tray presence.
///
/// Empty strings and `None` callbacks mean the feature is not shown.
#[derive(Debug, Clone, Default)]
pub struct TrayConfig {
    /// Path of the tray icon.
    pub icon: String,
    pub tooltip: String,
    pub notification: Notification,
    /// Runs when the user clicks the notification balloon.
    pub on_notification_click: Option<Callback>,
    pub menu: Menu,
    /// Icon paths loaded into the icon cache by `initialize`.
    pub prewarm_icons: Vec<String>,
}

impl TrayConfig {
    pub fn new(icon: impl Into<String>) -> Self {
        Self {
            icon: icon.into(),
            ..Self::default()
        }
    }

    pub fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = tooltip.into();
        self
    }

    pub fn with_menu(mut self, menu: Menu) -> Self {
        self.menu = menu;
        self
    }

    pub fn with_notification(mut self, title: impl Into<String>, text: impl Into<String>) -> Self {
        self.notification.title = title.into();
        self.notification.text = text.into();
        self
    }

    pub fn with_notification_icon(mut self, icon: impl Into<String>) -> Self {
        self.notification.icon = icon.into();
        self
    }

    pub fn on_notification_click(mut self, f: impl Fn(&mut Dispatch<'_>) + 'static) -> Self {
        self.on_notification_click = Some(Callback::new(f));
        self
    }

    pub fn with_prewarm<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prewarm_icons = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Removes the notification so the next update clears it.
    pub fn clear_notification(&mut self) {
        self.notification.title.clear();
        self.notification.text.clear();
    }
}
