//! WWV error types with granular categories

use thiserror::Error;

/// Top-level error type for all wwv-core operations
#[derive(Debug, Error)]
pub enum WwvError {
    #[error("detection error: {0}")]
    Detection(#[from] DetectionError),

    #[error("correlation error: {0}")]
    Correlation(#[from] CorrelationError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("DSP processing error: {0}")]
    Dsp(#[from] DspError),
}

/// Detector construction / runtime errors
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("mismatched i/q slice lengths: i={i_len}, q={q_len}")]
    MismatchedIqLength { i_len: usize, q_len: usize },

    #[error("tuner parameter {name} out of range: {value} not in [{min}, {max}]")]
    TunerOutOfRange {
        name: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },

    #[error("detector not initialized: {reason}")]
    NotInitialized { reason: String },
}

/// Correlator (tick chain, BCD symbol window) errors
#[derive(Debug, Error)]
pub enum CorrelationError {
    #[error("no sync anchor available")]
    NoAnchor,

    #[error("invalid event second {second}, must be in [0,59]")]
    InvalidSecond { second: u32 },

    #[error("chain statistics requested on empty chain")]
    EmptyChain,
}

/// Configuration validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid sample rate: {rate} Hz (must be > 0)")]
    InvalidSampleRate { rate: f32 },

    #[error("FFT size {size} is not a power of 2")]
    InvalidFftSize { size: usize },

    #[error("invalid bandwidth: {bandwidth_hz} Hz (must be > 0)")]
    InvalidBandwidth { bandwidth_hz: f32 },

    #[error("invalid target frequency: {freq_hz} Hz exceeds Nyquist for sample rate {sample_rate_hz} Hz")]
    AboveNyquist { freq_hz: f32, sample_rate_hz: f32 },
}

/// DSP primitive errors (FFT processor, matched-filter correlator)
#[derive(Debug, Error)]
pub enum DspError {
    #[error("FFT size {size} is not a power of 2")]
    InvalidFftSize { size: usize },

    #[error("invalid sample rate: {rate} Hz (must be > 0)")]
    InvalidSampleRate { rate: f32 },

    #[error("buffer underrun: requested {requested}, available {available}")]
    BufferUnderrun { requested: usize, available: usize },

    #[error("mismatched i/q slice lengths: i={i_len}, q={q_len}")]
    MismatchedIqLength { i_len: usize, q_len: usize },
}

/// Result type alias for wwv-core operations
pub type Result<T> = std::result::Result<T, WwvError>;
