//! Structured external logging: wraps a `wwv_core::SignalLogger`'s entries
//! (and run-level statistics) into JSON/logfmt/pretty lines written to
//! stdout, stderr, or a file.

use chrono::{DateTime, Utc};
use color_eyre::eyre::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Write};

use crate::config::{LogFormat, LogTarget, LoggingConfig};

/// Structured log event types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEvent {
    /// Periodic telemetry sample (see `TelemetryAggregator`).
    Telemetry(TelemetryEvent),

    /// A run-end statistical summary.
    Statistics(StatisticsEvent),

    Info { message: String },
    Warn { message: String },
    Error { message: String, details: Option<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub timestamp: DateTime<Utc>,
    pub ticks_detected: u64,
    pub markers_detected: u64,
    pub bcd_symbols_decoded: u64,
    pub noise_floor: f64,
    pub tick_jitter_ms: f64,
    pub sync_confidence: f64,
    pub sync_locked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsEvent {
    pub timestamp: DateTime<Utc>,
    pub duration_secs: f64,
    pub noise_floor: StatSummary,
    pub tick_jitter_ms: StatSummary,
    pub total_ticks: u64,
    pub total_markers: u64,
    pub total_bcd_symbols: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatSummary {
    pub mean: f64,
    pub stddev: f64,
    pub min: f64,
    pub max: f64,
    pub samples: usize,
}

/// Logger that outputs structured logs to the configured target/format.
pub struct StructuredLogger {
    config: LoggingConfig,
    writer: Box<dyn Write + Send>,
    start_time: DateTime<Utc>,
}

impl StructuredLogger {
    pub fn new(config: LoggingConfig) -> Result<Self> {
        let writer: Box<dyn Write + Send> = match &config.target {
            LogTarget::Stdout => Box::new(io::stdout()),
            LogTarget::Stderr => Box::new(io::stderr()),
            LogTarget::File => {
                let path = config
                    .file_path
                    .as_ref()
                    .ok_or_else(|| color_eyre::eyre::eyre!("File path required for file logging"))?;
                Box::new(BufWriter::new(File::create(path)?))
            }
        };

        Ok(Self {
            config,
            writer,
            start_time: Utc::now(),
        })
    }

    pub fn log(&mut self, event: LogEvent) -> Result<()> {
        let output = match self.config.format {
            LogFormat::Json => self.format_json(&event)?,
            LogFormat::Logfmt => self.format_logfmt(&event)?,
            LogFormat::Pretty => self.format_pretty(&event)?,
        };

        writeln!(self.writer, "{}", output)?;
        self.writer.flush()?;

        Ok(())
    }

    fn format_json(&self, event: &LogEvent) -> Result<String> {
        Ok(serde_json::to_string(event)?)
    }

    fn format_logfmt(&self, event: &LogEvent) -> Result<String> {
        let ts = Utc::now().to_rfc3339();

        let msg = match event {
            LogEvent::Telemetry(t) => format!(
                "ts=\"{}\" type=telemetry ticks={} markers={} bcd_symbols={} noise_floor={:.6} jitter_ms={:.3} sync_confidence={:.3} sync_locked={}",
                ts, t.ticks_detected, t.markers_detected, t.bcd_symbols_decoded, t.noise_floor, t.tick_jitter_ms, t.sync_confidence, t.sync_locked
            ),
            LogEvent::Statistics(s) => format!(
                "ts=\"{}\" type=statistics duration_secs={:.2} total_ticks={} total_markers={} total_bcd_symbols={} noise_floor_mean={:.6} jitter_mean_ms={:.3}",
                ts, s.duration_secs, s.total_ticks, s.total_markers, s.total_bcd_symbols, s.noise_floor.mean, s.tick_jitter_ms.mean
            ),
            LogEvent::Info { message } => format!("ts=\"{}\" level=info msg=\"{}\"", ts, message),
            LogEvent::Warn { message } => format!("ts=\"{}\" level=warn msg=\"{}\"", ts, message),
            LogEvent::Error { message, details } => {
                if let Some(d) = details {
                    format!("ts=\"{}\" level=error msg=\"{}\" details=\"{}\"", ts, message, d)
                } else {
                    format!("ts=\"{}\" level=error msg=\"{}\"", ts, message)
                }
            }
        };

        Ok(msg)
    }

    fn format_pretty(&self, event: &LogEvent) -> Result<String> {
        let ts = Utc::now().format("%Y-%m-%d %H:%M:%S%.3f");

        let msg = match event {
            LogEvent::Telemetry(t) => format!(
                "[{}] TELEMETRY: ticks={} markers={} bcd_symbols={} | noise_floor={:.6} jitter={:.3}ms | sync={} ({:.2})",
                ts, t.ticks_detected, t.markers_detected, t.bcd_symbols_decoded, t.noise_floor, t.tick_jitter_ms,
                if t.sync_locked { "LOCKED" } else { "SEARCHING" }, t.sync_confidence
            ),
            LogEvent::Statistics(s) => format!(
                "[{}] STATISTICS ({:.2}s): ticks={} markers={} bcd_symbols={} | noise floor: μ={:.6} σ={:.6} [{:.6},{:.6}] | jitter: μ={:.3}ms σ={:.3}ms",
                ts, s.duration_secs, s.total_ticks, s.total_markers, s.total_bcd_symbols,
                s.noise_floor.mean, s.noise_floor.stddev, s.noise_floor.min, s.noise_floor.max,
                s.tick_jitter_ms.mean, s.tick_jitter_ms.stddev
            ),
            LogEvent::Info { message } => format!("[{}] INFO: {}", ts, message),
            LogEvent::Warn { message } => format!("[{}] WARN: {}", ts, message),
            LogEvent::Error { message, details } => {
                if let Some(d) = details {
                    format!("[{}] ERROR: {} | {}", ts, message, d)
                } else {
                    format!("[{}] ERROR: {}", ts, message)
                }
            }
        };

        Ok(msg)
    }

    pub fn elapsed(&self) -> f64 {
        (Utc::now() - self.start_time).num_milliseconds() as f64 / 1000.0
    }
}
