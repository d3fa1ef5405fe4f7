//! Error types for the tray engine.

use crate::engine::EngineState;

/// A failed call into the host platform, carrying the OS's own diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{context} failed (err={code}): {message}")]
pub struct PlatformError {
    /// The OS call that failed, e.g. `Shell_NotifyIconA(NIM_ADD)`.
    pub context: String,
    /// Raw OS error code (0 when the platform has none).
    pub code: i64,
    /// OS-provided error text.
    pub message: String,
}

impl PlatformError {
    pub fn new(context: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            code,
            message: message.into(),
        }
    }
}

/// Errors returned to callers of the tray engine.
///
/// Icon load failures and failed update-style OS calls are not errors at
/// this level; they go to the diagnostic sink and the loop keeps running.
#[derive(Debug, thiserror::Error)]
pub enum TrayError {
    #[error("tray registration failed: {0}")]
    Registration(#[source] PlatformError),

    #[error("cannot {op} a tray in state {state}")]
    InvalidState {
        op: &'static str,
        state: EngineState,
    },
}
