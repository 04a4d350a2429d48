//! Structured, in-memory logging for the WWV detection pipeline.
//!
//! Hand-rolled rather than `log`/`tracing`-based, matching the teacher's
//! choice of an embeddable logger with no global state: detectors hold or
//! borrow a `SignalLogger` directly, so the crate works identically
//! whether the caller wires it to stderr, a file, or nothing at all.

use std::fmt;

/// Log level for filtering messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to record
    pub level: LogLevel,

    /// Per-subsystem-group enable flags (see `SignalLogger::log` for the mapping)
    pub enable_tick: bool,
    pub enable_marker: bool,
    pub enable_bcd: bool,
    pub enable_correlation: bool,
    pub enable_tone: bool,
    pub enable_sync: bool,

    /// Maximum number of log entries to keep (ring buffer)
    pub max_entries: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            enable_tick: true,
            enable_marker: true,
            enable_bcd: true,
            enable_correlation: true,
            enable_tone: true,
            enable_sync: true,
            max_entries: 1000,
        }
    }
}

impl LogConfig {
    /// Verbose logging for debugging
    pub fn verbose() -> Self {
        Self {
            level: LogLevel::Debug,
            max_entries: 5000,
            ..Default::default()
        }
    }

    /// Quiet logging for production
    pub fn quiet() -> Self {
        Self {
            level: LogLevel::Warn,
            enable_tick: false,
            enable_marker: false,
            enable_bcd: false,
            enable_correlation: false,
            enable_tone: false,
            enable_sync: false,
            max_entries: 100,
        }
    }

    /// Disable all logging
    pub fn disabled() -> Self {
        Self {
            level: LogLevel::Error,
            enable_tick: false,
            enable_marker: false,
            enable_bcd: false,
            enable_correlation: false,
            enable_tone: false,
            enable_sync: false,
            max_entries: 0,
        }
    }
}

/// A single log entry
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub subsystem: &'static str,
    pub message: String,
}

/// Logger that collects structured log entries in a fixed-capacity ring.
#[derive(Debug, Clone)]
pub struct SignalLogger {
    config: LogConfig,
    entries: Vec<LogEntry>,
}

impl SignalLogger {
    pub fn new(config: LogConfig) -> Self {
        let capacity = config.max_entries.min(1000);
        Self {
            config,
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Log a message at the specified level, tagged with a subsystem name.
    ///
    /// Subsystems: `TICK`, `MARKER`, `BCD_TIME`, `BCD_FREQ`, `TICK_CORR`,
    /// `BCD_CORR`, `TONE`, `SYNC`.
    pub fn log(&mut self, level: LogLevel, subsystem: &'static str, message: impl fmt::Display) {
        if level < self.config.level {
            return;
        }

        let enabled = match subsystem {
            "TICK" => self.config.enable_tick,
            "MARKER" => self.config.enable_marker,
            "BCD_TIME" | "BCD_FREQ" => self.config.enable_bcd,
            "TICK_CORR" | "BCD_CORR" => self.config.enable_correlation,
            "TONE" => self.config.enable_tone,
            "SYNC" => self.config.enable_sync,
            _ => true,
        };

        if !enabled {
            return;
        }

        let entry = LogEntry {
            level,
            subsystem,
            message: message.to_string(),
        };

        if self.config.max_entries > 0 {
            if self.entries.len() >= self.config.max_entries {
                self.entries.remove(0);
            }
            self.entries.push(entry);
        }

        #[cfg(any(test, debug_assertions))]
        {
            eprintln!("[{}] {}: {}", level, subsystem, message);
        }
    }

    pub fn trace(&mut self, subsystem: &'static str, message: impl fmt::Display) {
        self.log(LogLevel::Trace, subsystem, message);
    }

    pub fn debug(&mut self, subsystem: &'static str, message: impl fmt::Display) {
        self.log(LogLevel::Debug, subsystem, message);
    }

    pub fn info(&mut self, subsystem: &'static str, message: impl fmt::Display) {
        self.log(LogLevel::Info, subsystem, message);
    }

    pub fn warn(&mut self, subsystem: &'static str, message: impl fmt::Display) {
        self.log(LogLevel::Warn, subsystem, message);
    }

    pub fn error(&mut self, subsystem: &'static str, message: impl fmt::Display) {
        self.log(LogLevel::Error, subsystem, message);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn to_string(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("[{}] {}: {}", e.level, e.subsystem, e.message))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn entries_for_subsystem(&self, subsystem: &str) -> Vec<&LogEntry> {
        self.entries
            .iter()
            .filter(|e| e.subsystem == subsystem)
            .collect()
    }

    pub fn entries_at_level(&self, level: LogLevel) -> Vec<&LogEntry> {
        self.entries.iter().filter(|e| e.level >= level).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Count of entries at each level: (trace, debug, info, warn, error)
    pub fn level_counts(&self) -> (usize, usize, usize, usize, usize) {
        let mut trace = 0;
        let mut debug = 0;
        let mut info = 0;
        let mut warn = 0;
        let mut error = 0;

        for entry in &self.entries {
            match entry.level {
                LogLevel::Trace => trace += 1,
                LogLevel::Debug => debug += 1,
                LogLevel::Info => info += 1,
                LogLevel::Warn => warn += 1,
                LogLevel::Error => error += 1,
            }
        }

        (trace, debug, info, warn, error)
    }
}

impl Default for SignalLogger {
    fn default() -> Self {
        Self::new(LogConfig::default())
    }
}

impl fmt::Display for SignalLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filtering_by_level() {
        let config = LogConfig {
            level: LogLevel::Info,
            ..Default::default()
        };
        let mut logger = SignalLogger::new(config);

        logger.trace("TICK", "trace message");
        logger.debug("TICK", "debug message");
        logger.info("TICK", "info message");
        logger.warn("TICK", "warn message");

        assert_eq!(logger.entries().len(), 2);
    }

    #[test]
    fn test_subsystem_filtering() {
        let config = LogConfig {
            level: LogLevel::Debug,
            enable_tick: false,
            enable_marker: true,
            ..Default::default()
        };
        let mut logger = SignalLogger::new(config);

        logger.info("TICK", "tick message");
        logger.info("MARKER", "marker message");

        assert_eq!(logger.entries().len(), 1);
        assert_eq!(logger.entries()[0].subsystem, "MARKER");
    }

    #[test]
    fn test_max_entries_limit() {
        let config = LogConfig {
            level: LogLevel::Debug,
            max_entries: 3,
            ..Default::default()
        };
        let mut logger = SignalLogger::new(config);

        logger.info("TICK", "message 1");
        logger.info("TICK", "message 2");
        logger.info("TICK", "message 3");
        logger.info("TICK", "message 4");

        assert_eq!(logger.entries().len(), 3);
        assert!(logger.entries()[0].message.contains("message 2"));
    }

    #[test]
    fn test_bcd_subgroup_shares_flag() {
        let config = LogConfig {
            level: LogLevel::Debug,
            enable_bcd: false,
            ..Default::default()
        };
        let mut logger = SignalLogger::new(config);

        logger.info("BCD_TIME", "time pulse");
        logger.info("BCD_FREQ", "freq pulse");

        assert_eq!(logger.entries().len(), 0);
    }
}
