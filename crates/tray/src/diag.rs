//! Process-wide diagnostic sink.
//!
//! Every diagnostic is recorded as a `tracing` event. Hosts that do not use
//! `tracing` can additionally install a plain function with
//! [`set_log_callback`]; it receives the same messages.

use std::sync::{PoisonError, RwLock};

use tracing::{debug, error, info, warn};

use crate::error::PlatformError;

/// Severity of a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// Signature of the diagnostic sink.
pub type LogCallback = fn(LogLevel, &str);

static SINK: RwLock<Option<LogCallback>> = RwLock::new(None);

/// Installs (or with `None`, removes) the process-wide diagnostic sink.
/// A later call overwrites the previous sink.
pub fn set_log_callback(cb: Option<LogCallback>) {
    *SINK.write().unwrap_or_else(PoisonError::into_inner) = cb;
}

pub(crate) fn emit(level: LogLevel, message: &str) {
    match level {
        LogLevel::Debug => debug!(target: "statray", "{message}"),
        LogLevel::Info => info!(target: "statray", "{message}"),
        LogLevel::Warning => warn!(target: "statray", "{message}"),
        LogLevel::Error => error!(target: "statray", "{message}"),
    }

    let sink = *SINK.read().unwrap_or_else(PoisonError::into_inner);
    if let Some(sink) = sink {
        sink(level, message);
    }
}

/// Reports a failed OS call with the OS's error text attached.
pub(crate) fn os_failure(level: LogLevel, err: &PlatformError) {
    emit(level, &err.to_string());
}


#[cfg(test)]
mod tests {
    use super::testing::{captured_with, install};
    use super::*;

    #[test]
    fn sink_receives_messages_until_removed() {
        let _sink = install();
        emit(LogLevel::Warning, "diag-sink-marker one");
        os_failure(
            LogLevel::Error,
            &PlatformError::new("diag-sink-marker call", 5, "Access is denied."),
        );
        set_log_callback(None);
        emit(LogLevel::Info, "diag-sink-marker dropped");

        let got = captured_with("diag-sink-marker");
        assert_eq!(got.len(), 2);
        assert_eq!(got[0], (LogLevel::Warning, "diag-sink-marker one".into()));
        assert_eq!(got[1].0, LogLevel::Error);
        assert!(got[1].1.contains("err=5"));
        assert!(got[1].1.contains("Access is denied."));
    }

    #[test]
    fn levels_are_ordered_by_severity() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Warning < LogLevel::Error);
    }
}
