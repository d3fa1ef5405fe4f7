//! The tray engine: owns the live tray object and keeps it in sync with the
//! current [`TrayConfig`].

use std::fmt;

use statray_icon_cache::{IconCache, IconKind};
use tracing::debug;

use crate::config::TrayConfig;
use crate::diag::{self, LogLevel};
use crate::error::TrayError;
use crate::platform::{AppliedState, Platform, TrayIdentity};
use crate::projection::{self, Projection};

/// Tooltip capacity in bytes, terminator excluded.
pub const TOOLTIP_MAX: usize = 127;
/// Notification title capacity in bytes, terminator excluded.
pub const INFO_TITLE_MAX: usize = 63;
/// Notification text capacity in bytes, terminator excluded.
pub const INFO_TEXT_MAX: usize = 255;

/// Lifecycle of a [`TrayEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Active,
    /// Terminal.
    Destroyed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Uninitialized => "uninitialized",
            EngineState::Active => "active",
            EngineState::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

/// Single tray presence driven from one thread.
///
/// The engine owns the configuration it was last given; read or edit it with
/// [`TrayEngine::config`] / [`TrayEngine::config_mut`] and push edits with
/// [`TrayEngine::update`], or from a callback through
/// [`Dispatch::request_update`](crate::Dispatch::request_update).
pub struct TrayEngine<P: Platform> {
    pub(crate) platform: P,
    pub(crate) identity: TrayIdentity,
    pub(crate) state: EngineState,
    pub(crate) config: TrayConfig,
    pub(crate) icons: IconCache<P::Handle>,
    pub(crate) menu: Option<Projection<P::Menu>>,
    pub(crate) applied: AppliedState<P::Handle>,
}

impl<P: Platform> TrayEngine<P> {
    pub fn new(platform: P) -> Self {
        Self::with_identity(platform, TrayIdentity::DEFAULT)
    }

    pub fn with_identity(platform: P, identity: TrayIdentity) -> Self {
        Self {
            platform,
            identity,
            state: EngineState::Uninitialized,
            config: TrayConfig::default(),
            icons: IconCache::new(),
            menu: None,
            applied: AppliedState::default(),
        }
    }

    /// Registers the tray object and shows `config`.
    ///
    /// On failure everything created so far is released and the engine stays
    /// uninitialized. Registration failures usually mean the host has no
    /// status area; they are not retried.
    pub fn initialize(&mut self, config: TrayConfig) -> Result<(), TrayError> {
        if self.state != EngineState::Uninitialized {
            return Err(self.invalid("initialize"));
        }

        self.icons.prewarm(&mut self.platform, &config.prewarm_icons);
        self.report_icon_failures();

        if let Err(e) = self.platform.open() {
            diag::os_failure(LogLevel::Error, &e);
            self.icons.teardown(&mut self.platform);
            return Err(TrayError::Registration(e));
        }

        if let Err(e) = self.platform.add(&self.identity) {
            diag::os_failure(LogLevel::Error, &e);
            self.platform.close();
            self.icons.teardown(&mut self.platform);
            return Err(TrayError::Registration(e));
        }

        if let Err(e) = self.platform.set_version(&self.identity) {
            diag::os_failure(LogLevel::Warning, &e);
        }

        self.state = EngineState::Active;
        self.config = config;
        self.refresh(false);

        diag::emit(
            LogLevel::Info,
            &format!(
                "tray {} initialized with {} cached icons",
                self.identity.guid,
                self.icons.len()
            ),
        );
        Ok(())
    }

    /// Replaces the configuration and pushes the difference to the OS.
    pub fn update(&mut self, config: TrayConfig) -> Result<(), TrayError> {
        if self.state != EngineState::Active {
            return Err(self.invalid("update"));
        }
        self.config = config;
        self.refresh(false);
        Ok(())
    }

    /// Pushes the current configuration again, e.g. after editing it through
    /// [`TrayEngine::config_mut`].
    pub fn refresh_current(&mut self) -> Result<(), TrayError> {
        if self.state != EngineState::Active {
            return Err(self.invalid("update"));
        }
        self.refresh(false);
        Ok(())
    }

    /// Removes the tray object, frees the menu and icons, and asks the event
    /// loop to stop. The engine cannot be used afterwards.
    pub fn teardown(&mut self) -> Result<(), TrayError> {
        if self.state != EngineState::Active {
            return Err(self.invalid("tear down"));
        }

        if let Err(e) = self.platform.remove(&self.identity) {
            diag::os_failure(LogLevel::Warning, &e);
        }
        if let Some(menu) = self.menu.take() {
            self.platform.destroy_menu(menu.root);
        }
        self.icons.teardown(&mut self.platform);
        self.platform.post_quit();
        self.platform.close();

        self.applied = AppliedState::default();
        self.state = EngineState::Destroyed;
        diag::emit(LogLevel::Info, "tray torn down");
        Ok(())
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn identity(&self) -> &TrayIdentity {
        &self.identity
    }

    pub fn config(&self) -> &TrayConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut TrayConfig {
        &mut self.config
    }

    /// Presentation state last accepted by the OS.
    pub fn applied(&self) -> &AppliedState<P::Handle> {
        &self.applied
    }

    /// Currently installed native menu and its identifier table.
    pub fn projection(&self) -> Option<&Projection<P::Menu>> {
        self.menu.as_ref()
    }

    pub fn icon_cache(&self) -> &IconCache<P::Handle> {
        &self.icons
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Rebuilds the native menu and applies the presentation state.
    ///
    /// The new menu is installed before the old one is destroyed. The OS is
    /// only called when the computed state differs from the applied one,
    /// unless `force` is set.
    pub(crate) fn refresh(&mut self, force: bool) {
        let superseded = match projection::project(&mut self.platform, &self.config.menu) {
            Ok(projection) => {
                self.platform.install_menu(projection.root);
                self.menu.replace(projection)
            }
            Err(e) => {
                diag::os_failure(LogLevel::Warning, &e);
                None
            }
        };

        let next = self.presentation(force);
        if force || next != self.applied {
            match self.platform.modify(&self.identity, &next) {
                Ok(()) => self.applied = next,
                Err(e) => diag::os_failure(LogLevel::Warning, &e),
            }
        } else {
            debug!("tray presentation unchanged; skipping modify");
        }

        if let Some(old) = superseded {
            self.platform.destroy_menu(old.root);
        }
    }

    /// Computes the presentation block from scratch for the current
    /// configuration. Only the icon handle carries over, when the new one
    /// could not be loaded; a forced apply sends it again since the OS may
    /// have lost it.
    fn presentation(&mut self, force: bool) -> AppliedState<P::Handle> {
        let mut next = AppliedState::default();

        match self
            .icons
            .fetch(&mut self.platform, &self.config.icon, IconKind::Regular)
        {
            Some(icon) => {
                next.icon = Some(icon);
                next.flags.icon = true;
            }
            None => {
                if !self.config.icon.is_empty() {
                    diag::emit(
                        LogLevel::Warning,
                        &format!("no icon for {}; keeping the current one", self.config.icon),
                    );
                }
                next.icon = self.applied.icon;
                next.flags.icon = force && next.icon.is_some();
            }
        }

        if !self.config.tooltip.is_empty() {
            next.tooltip = truncate(&self.config.tooltip, TOOLTIP_MAX);
            next.flags.tooltip = true;
            next.flags.show_tooltip = true;
        }

        let notification = &self.config.notification;
        if !notification.is_empty() {
            next.info_title = truncate(&notification.title, INFO_TITLE_MAX);
            next.info_text = truncate(&notification.text, INFO_TEXT_MAX);
            let own = self
                .icons
                .fetch(&mut self.platform, &notification.icon, IconKind::Notification);
            if own.is_none() && !notification.icon.is_empty() {
                diag::emit(
                    LogLevel::Warning,
                    &format!(
                        "no notification icon for {}; using the tray icon",
                        notification.icon
                    ),
                );
            }
            let balloon = own.or(next.icon);
            if let Some(balloon) = balloon {
                next.balloon_icon = Some(balloon);
                next.large_balloon = true;
            }
            next.flags.info = true;
        }

        self.report_icon_failures();
        next
    }

    fn report_icon_failures(&mut self) {
        for failure in self.icons.take_failures() {
            diag::emit(
                LogLevel::Warning,
                &format!(
                    "failed to load {} icon from {}: {}",
                    failure.kind, failure.path, failure.error
                ),
            );
        }
    }

    fn invalid(&self, op: &'static str) -> TrayError {
        diag::emit(
            LogLevel::Warning,
            &format!("cannot {op} a tray in state {}", self.state),
        );
        TrayError::InvalidState {
            op,
            state: self.state,
        }
    }
}

impl<P: Platform> Drop for TrayEngine<P> {
    fn drop(&mut self) {
        if self.state == EngineState::Active {
            let _ = self.teardown();
        }
    }
}

/// Cuts `s` to at most `max` bytes without splitting a character.
fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}
