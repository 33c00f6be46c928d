use crate::core::payload::Payload;
use crate::events::chain_observer::ChainObserver;

/// Logging levels for the middleware
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
}

/// Observer that reports the drain lifecycle through `tracing`
///
/// Dispatches and resumes are logged at the configured level; skipped steps
/// one level above it, since an unhandled step is usually a wiring mistake.
///
/// # Example
///
/// ```ignore
/// use event_bridge::middleware::logging::{LoggingMiddleware, LogLevel};
///
/// let engine = ChainEngine::new();
/// engine.observe(LoggingMiddleware::new(LogLevel::Info).with_payloads(true));
/// ```
#[derive(Debug, Clone)]
pub struct LoggingMiddleware {
    level: LogLevel,
    log_payloads: bool,
    log_skips: bool,
}

impl LoggingMiddleware {
    /// Create a new logging middleware with the specified log level
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            log_payloads: false,
            log_skips: true,
        }
    }

    /// Create a logging middleware with info level (default)
    pub fn info() -> Self {
        Self::new(LogLevel::Info)
    }

    pub fn debug() -> Self {
        Self::new(LogLevel::Debug)
    }

    /// Include dispatch payloads and results in the log lines
    pub fn with_payloads(mut self, enabled: bool) -> Self {
        self.log_payloads = enabled;
        self
    }

    /// Configure whether to log steps without handlers
    pub fn with_skip_logging(mut self, enabled: bool) -> Self {
        self.log_skips = enabled;
        self
    }

    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Trace => tracing::trace!(target: "event_bridge::chain", "{message}"),
            LogLevel::Debug => tracing::debug!(target: "event_bridge::chain", "{message}"),
            LogLevel::Info => tracing::info!(target: "event_bridge::chain", "{message}"),
            LogLevel::Warn => tracing::warn!(target: "event_bridge::chain", "{message}"),
        }
    }

    fn escalated(&self) -> LogLevel {
        match self.level {
            LogLevel::Trace => LogLevel::Debug,
            LogLevel::Debug => LogLevel::Info,
            LogLevel::Info | LogLevel::Warn => LogLevel::Warn,
        }
    }

    fn describe(&self, payload: &Payload) -> String {
        if self.log_payloads {
            serde_json::to_string(payload).unwrap_or_else(|_| "<unserializable>".into())
        } else {
            format!("{} field(s)", payload.len())
        }
    }
}

impl ChainObserver for LoggingMiddleware {
    fn on_drain_start(&self) {
        self.log(self.level, "drain started");
    }

    fn on_dispatch(&self, event: &str, index: usize, payload: &Payload) {
        self.log(
            self.level,
            &format!("dispatch #{index} {event}: {}", self.describe(payload)),
        );
    }

    fn on_resume(&self, event: &str, index: usize, result: &Payload) {
        self.log(
            self.level,
            &format!("resumed #{index} {event}: {}", self.describe(result)),
        );
    }

    fn on_skip(&self, event: &str, index: usize) {
        if self.log_skips {
            self.log(
                self.escalated(),
                &format!("skipped #{index} {event}: no handler registered"),
            );
        }
    }

    fn on_drain_complete(&self, steps: usize) {
        self.log(self.level, &format!("drain complete after {steps} step(s)"));
    }
}

impl Default for LoggingMiddleware {
    fn default() -> Self {
        Self::info()
    }
}
