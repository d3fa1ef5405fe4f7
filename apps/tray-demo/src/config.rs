//! Demo configuration.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/statray/demo.toml`
//! - Windows: `%APPDATA%/statray/demo.toml`
//!
//! `STATRAY_CONFIG` overrides the location.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use statray_tray::TrayConfig;

/// Demo tray configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Icon file shown in the status area.
    #[serde(default = "default_icon")]
    pub icon: String,

    /// Hover text; empty hides the tooltip.
    #[serde(default = "default_tooltip")]
    pub tooltip: String,

    /// Icons decoded at startup, before the tray appears.
    #[serde(default)]
    pub prewarm_icons: Vec<String>,

    /// Title of the balloon shown by the "Show notification" entry.
    #[serde(default = "default_notification_title")]
    pub notification_title: String,

    #[serde(default = "default_notification_text")]
    pub notification_text: String,

    /// Balloon icon; the tray icon is used when empty.
    #[serde(default)]
    pub notification_icon: String,
}

fn default_icon() -> String {
    if cfg!(windows) {
        "icon.ico".into()
    } else {
        "icon.png".into()
    }
}

fn default_tooltip() -> String {
    "Statray demo".into()
}

fn default_notification_title() -> String {
    "Statray".into()
}

fn default_notification_text() -> String {
    "Hello from the tray".into()
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            icon: default_icon(),
            tooltip: default_tooltip(),
            prewarm_icons: Vec::new(),
            notification_title: default_notification_title(),
            notification_text: default_notification_text(),
            notification_icon: String::new(),
        }
    }
}

impl DemoConfig {
    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path()?)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: DemoConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = DemoConfig::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Tray configuration without a menu and without a pending
    /// notification.
    pub fn tray_config(&self) -> TrayConfig {
        let mut tray = TrayConfig::new(&self.icon)
            .with_tooltip(&self.tooltip)
            .with_prewarm(&self.prewarm_icons);
        if !self.notification_icon.is_empty() {
            tray = tray.with_notification_icon(&self.notification_icon);
        }
        tray
    }
}

/// Returns the configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    if let Ok(path) = std::env::var("STATRAY_CONFIG")
        && !path.is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("statray")
            .join("demo.toml"))
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("statray").join("demo.toml"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        Ok(PathBuf::from("/tmp/statray/demo.toml"))
    }
}
