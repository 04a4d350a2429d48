//! CLI-specific configuration structures for TOML-based configuration.

use color_eyre::eyre::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};

use wwv_core::config::{
    BcdFreqDetectorConfig, BcdSymbolCorrelatorConfig, BcdTimeDetectorConfig, MarkerDetectorConfig,
    Station, SyncDetectorConfig, TickCorrelatorConfig, TickDetectorConfig, ToneTrackerConfig,
};

/// Deep merge JSON values - override takes precedence over base.
/// For objects, recursively merge; for arrays and primitives, override replaces base.
fn merge_json_values(base: &mut JsonValue, override_val: JsonValue) {
    match (base, override_val) {
        (JsonValue::Object(base_map), JsonValue::Object(override_map)) => {
            for (key, value) in override_map {
                if let Some(base_value) = base_map.get_mut(&key) {
                    merge_json_values(base_value, value);
                } else {
                    base_map.insert(key, value);
                }
            }
        }
        (base_val, override_val) => {
            *base_val = override_val;
        }
    }
}

/// Custom deserializer to handle both single string and array of strings for include.
fn deserialize_include_optional<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrVec {
        String(String),
        Vec(Vec<String>),
    }

    let opt: Option<StringOrVec> = Option::deserialize(deserializer)?;
    match opt {
        None => Ok(Vec::new()),
        Some(StringOrVec::String(s)) => Ok(vec![s]),
        Some(StringOrVec::Vec(v)) => Ok(v),
    }
}

/// Complete CLI configuration bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Optional path(s) to other config file(s) to include (relative to this
    /// config's directory). Supports single string or array of strings.
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_include_optional")]
    pub include: Vec<String>,

    #[serde(default)]
    pub station: Station,

    #[serde(default)]
    pub input: InputConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub detectors: DetectorsConfig,

    #[serde(default)]
    pub terminal: TerminalConfig,
}

/// Where I/Q samples come from: a recorded WAV file, or a synthetic
/// generator used for demos and smoke tests.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InputConfig {
    #[serde(default)]
    pub wav_path: Option<PathBuf>,
    #[serde(default)]
    pub synthetic: Option<SyntheticConfig>,
}

/// Parameters for a generated test signal: a clean tick/marker/BCD/tone
/// train with additive Gaussian noise at the requested SNR.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticConfig {
    #[serde(default = "default_duration_secs")]
    pub duration_secs: f64,
    #[serde(default = "default_sample_rate")]
    pub sample_rate_hz: f32,
    #[serde(default = "default_snr_db")]
    pub snr_db: f32,
}

fn default_duration_secs() -> f64 {
    60.0
}
fn default_sample_rate() -> f32 {
    50_000.0
}
fn default_snr_db() -> f32 {
    20.0
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            duration_secs: default_duration_secs(),
            sample_rate_hz: default_sample_rate(),
            snr_db: default_snr_db(),
        }
    }
}

/// CSV telemetry destinations; a stream with no path configured is not
/// written.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    #[serde(default)]
    pub tick_csv: Option<PathBuf>,
    #[serde(default)]
    pub marker_csv: Option<PathBuf>,
    #[serde(default)]
    pub bcd_time_csv: Option<PathBuf>,
    #[serde(default)]
    pub bcd_freq_csv: Option<PathBuf>,
    #[serde(default)]
    pub bcd_symbol_csv: Option<PathBuf>,
    #[serde(default)]
    pub tone_csv: Option<PathBuf>,
}

/// Per-component detector/correlator configuration, each defaulted
/// independently from `wwv-core`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DetectorsConfig {
    #[serde(default)]
    pub tick: TickDetectorConfig,
    #[serde(default)]
    pub marker: MarkerDetectorConfig,
    #[serde(default)]
    pub bcd_time: BcdTimeDetectorConfig,
    #[serde(default)]
    pub bcd_freq: BcdFreqDetectorConfig,
    #[serde(default)]
    pub tick_correlator: TickCorrelatorConfig,
    #[serde(default)]
    pub bcd_correlator: BcdSymbolCorrelatorConfig,
    #[serde(default)]
    pub tone: ToneTrackerConfig,
    #[serde(default)]
    pub sync: SyncDetectorConfig,
}

/// Terminal/run-level configuration: logging and progress reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default = "default_telemetry_interval")]
    pub telemetry_interval_secs: f64,

    #[serde(default = "default_true")]
    pub progress_bar: bool,
}

fn default_telemetry_interval() -> f64 {
    5.0
}

fn default_true() -> bool {
    true
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            telemetry_interval_secs: default_telemetry_interval(),
            progress_bar: default_true(),
        }
    }
}

/// Logging output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_target")]
    pub target: LogTarget,

    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default = "default_log_format")]
    pub format: LogFormat,

    #[serde(default = "default_log_level")]
    pub level: LogLevel,
}

fn default_log_target() -> LogTarget {
    LogTarget::Stderr
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            target: default_log_target(),
            file_path: None,
            format: default_log_format(),
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    /// Convert the CLI's logging config into the core's in-memory ring-buffer
    /// logger config, enabling every subsystem group by default.
    pub fn to_core_log_config(&self) -> wwv_core::LogConfig {
        use wwv_core::LogLevel as CoreLogLevel;

        let level = match self.level {
            LogLevel::Trace => CoreLogLevel::Trace,
            LogLevel::Debug => CoreLogLevel::Debug,
            LogLevel::Info => CoreLogLevel::Info,
            LogLevel::Warn => CoreLogLevel::Warn,
            LogLevel::Error => CoreLogLevel::Error,
        };

        wwv_core::LogConfig {
            level,
            ..wwv_core::LogConfig::verbose()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    Stdout,
    Stderr,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Logfmt,
    Pretty,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl CliConfig {
    /// Load configuration from a TOML file, resolving `include` directives
    /// depth-first and deep-merging each on top of the defaults, with the
    /// top-level file's own keys taking final precedence.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;

        let config_toml: toml::Value =
            toml::from_str(&content).wrap_err("Failed to parse TOML configuration")?;
        let mut config_json =
            serde_json::to_value(&config_toml).wrap_err("Failed to convert TOML to JSON")?;

        let includes = match config_json.get("include") {
            Some(JsonValue::String(s)) => vec![s.clone()],
            Some(JsonValue::Array(arr)) => {
                arr.iter().filter_map(|v| v.as_str().map(String::from)).collect()
            }
            _ => Vec::new(),
        };

        if let JsonValue::Object(ref mut map) = config_json {
            map.remove("include");
        }

        let mut base_json =
            serde_json::to_value(Self::default()).wrap_err("Failed to create default config")?;

        for include_path in &includes {
            let include_full_path = if Path::new(include_path).is_absolute() {
                PathBuf::from(include_path)
            } else {
                path.parent()
                    .unwrap_or_else(|| Path::new("."))
                    .join(include_path)
            };

            let included_config = Self::from_file(&include_full_path).wrap_err_with(|| {
                format!("Failed to load included config: {}", include_full_path.display())
            })?;
            let included_json = serde_json::to_value(&included_config)
                .wrap_err("Failed to convert included config to JSON")?;

            merge_json_values(&mut base_json, included_json);
        }

        merge_json_values(&mut base_json, config_json);

        let config: CliConfig =
            serde_json::from_value(base_json).wrap_err("Failed to parse final configuration")?;

        Ok(config)
    }

    pub fn default() -> Self {
        Self {
            include: Vec::new(),
            station: Station::default(),
            input: InputConfig::default(),
            output: OutputConfig::default(),
            detectors: DetectorsConfig::default(),
            terminal: TerminalConfig::default(),
        }
    }
}
