//! Restores the tray after the shell hosting the status area restarts.
//!
//! A shell restart wipes every notify-icon registration. The platform
//! reports it as [`NativeEvent::ShellRestarted`](crate::NativeEvent) on the
//! normal event queue, so recovery runs on the loop thread like any other
//! event.

use tracing::debug;

use crate::diag::{self, LogLevel};
use crate::engine::{EngineState, TrayEngine};
use crate::platform::Platform;

impl<P: Platform> TrayEngine<P> {
    /// Re-adds the tray object under the same identity and re-applies the
    /// last configuration. Repeated calls never add a second icon.
    pub(crate) fn recover(&mut self) {
        if self.state != EngineState::Active {
            debug!(state = %self.state, "shell restart ignored");
            return;
        }
        diag::emit(LogLevel::Info, "shell restarted; restoring tray icon");

        if let Err(e) = self.platform.add(&self.identity) {
            diag::os_failure(LogLevel::Warning, &e);
        }
        if let Err(e) = self.platform.set_version(&self.identity) {
            diag::os_failure(LogLevel::Warning, &e);
        }

        self.refresh(true);
        diag::emit(
            LogLevel::Info,
            &format!("tray {} restored after shell restart", self.identity.guid),
        );
    }
}
