//! Console logger

use super::traits::{LogLevel, Logger};

/// Logs to the console, info to stdout and everything else to stderr
///
/// Lines below the threshold (`Info` by default) are dropped.
#[derive(Debug, Clone)]
pub struct ConsoleLogger {
    prefix: String,
    threshold: LogLevel,
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleLogger {
    pub fn new() -> Self {
        Self::with_prefix("[toolhub]")
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            threshold: LogLevel::Info,
        }
    }

    /// Lowest level that gets printed
    pub fn with_threshold(mut self, threshold: LogLevel) -> Self {
        self.threshold = threshold;
        self
    }

    fn enabled(&self, level: LogLevel) -> bool {
        level >= self.threshold
    }

    fn emit(&self, level: LogLevel, message: &str) {
        if !self.enabled(level) {
            return;
        }
        match level {
            LogLevel::Info => println!("{} {}: {}", self.prefix, level, message),
            _ => eprintln!("{} {}: {}", self.prefix, level, message),
        }
    }
}

impl Logger for ConsoleLogger {
    fn debug(&self, message: &str) {
        self.emit(LogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.emit(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.emit(LogLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.emit(LogLevel::Error, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_logger_creation() {
        let logger = ConsoleLogger::new();
        assert_eq!(logger.prefix, "[toolhub]");
        assert!(!logger.enabled(LogLevel::Debug));
        assert!(logger.enabled(LogLevel::Warn));

        let custom = ConsoleLogger::with_prefix("[agent]").with_threshold(LogLevel::Debug);
        assert_eq!(custom.prefix, "[agent]");
        assert!(custom.enabled(LogLevel::Debug));
    }

    #[test]
    fn test_console_logger_through_macros() {
        let logger = ConsoleLogger::with_prefix("[test]");
        crate::log_info!(logger, "connected to {}", "alpha");
        crate::log_warn!(logger, "teardown for {} took too long", "alpha");
    }
}
