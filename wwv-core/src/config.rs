//! Configuration types for the WWV/WWVH detection pipeline.
//!
//! Each detector/correlator config is a serde-derived struct with a
//! `Default` impl carrying the constants named in the component design,
//! following the teacher's pattern of one config struct per concern with
//! documented defaults rather than scattered magic numbers.

use serde::{Deserialize, Serialize};

/// WWV's tick/marker carrier, 1000 Hz.
pub const WWV_TICK_FREQ_HZ: f32 = 1000.0;
/// WWVH's tick/marker carrier, 1200 Hz.
pub const WWVH_TICK_FREQ_HZ: f32 = 1200.0;
/// 100 Hz BCD time-code subcarrier (shared by WWV and WWVH).
pub const BCD_SUBCARRIER_HZ: f32 = 100.0;
/// Reference tone frequencies used by the tone tracker.
pub const TONE_500_HZ: f32 = 500.0;
pub const TONE_600_HZ: f32 = 600.0;
pub const CARRIER_NOMINAL_HZ: f32 = 0.0;

/// Seconds-within-minute at which a BCD 'P' (position marker) symbol is valid.
pub const VALID_P_POSITIONS: [u32; 7] = [0, 9, 19, 29, 39, 49, 59];

/// BCD symbol duration classification bands (see `BcdSymbolCorrelatorConfig`).
/// `MARKER_MAX` is the nominal upper edge of a P-marker pulse, but durations
/// past it are classified the same as the 350-900ms band (P at a valid
/// position, '1' otherwise) rather than discarded — see `classify_duration`.
pub const BCD_SYMBOL_ZERO_MAX_MS: f32 = 350.0;
pub const BCD_SYMBOL_ONE_MAX_MS: f32 = 650.0;
pub const BCD_SYMBOL_MARKER_MAX_MS: f32 = 900.0;
pub const BCD_SYMBOL_MIN_MS: f32 = 100.0;

/// Noise-floor clamp shared by every adaptive-floor detector.
pub const NOISE_FLOOR_MIN: f32 = 1e-4;
pub const NOISE_FLOOR_MAX: f32 = 5.0;

/// Which WWV-family station a detector's target frequency is tuned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Station {
    #[default]
    Wwv,
    Wwvh,
}

impl Station {
    pub fn tick_freq_hz(self) -> f32 {
        match self {
            Station::Wwv => WWV_TICK_FREQ_HZ,
            Station::Wwvh => WWVH_TICK_FREQ_HZ,
        }
    }
}

/// Tick detector (component C) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickDetectorConfig {
    pub station: Station,
    pub sample_rate_hz: f32,
    pub fft_size: usize,
    pub bandwidth_hz: f32,

    /// Matched-filter ring capacity in samples (component B).
    pub template_samples: usize,
    /// Recompute correlation every N samples.
    pub corr_decimation: usize,

    pub min_duration_ms: f32,
    pub max_duration_ms: f32,
    /// Tick-local marker bailout: IN_TICK durations beyond this are rejected
    /// outright rather than classified, independent of `MarkerDetectorConfig`'s
    /// own (much larger) max-duration timeout.
    pub marker_bailout_ms: f32,
    pub cooldown_ms: f32,

    pub warmup_adapt_rate: f32,
    pub warmup_frames: u32,
    pub hysteresis_ratio: f32,

    pub corr_threshold_mult: f32,
    pub corr_noise_adapt: f32,
    pub marker_min_duration_ms: f32,
    pub marker_max_duration_ms: f32,
    pub marker_min_interval_ms: f32,

    pub history_size: usize,
    pub avg_window_ms: f32,

    pub gate_start_ms: f32,
    pub gate_end_ms: f32,
    pub gate_recovery_ms: f32,

    /// Runtime tuners, validated on every set attempt (see `TunerBounds`).
    /// These are the only noise-floor adaptation rates the tick detector
    /// reads (§4.C's asymmetric blend: `adapt_alpha_down` fast/downward,
    /// `adapt_alpha_up` slow/upward so ticks don't train the floor upward).
    pub threshold_multiplier: f32,
    pub adapt_alpha_down: f32,
    pub adapt_alpha_up: f32,
}

impl Default for TickDetectorConfig {
    fn default() -> Self {
        Self {
            station: Station::default(),
            sample_rate_hz: 50_000.0,
            fft_size: 256,
            bandwidth_hz: 40.0,
            template_samples: 500,
            corr_decimation: 8,
            min_duration_ms: 2.0,
            max_duration_ms: 50.0,
            marker_bailout_ms: 1000.0,
            cooldown_ms: 500.0,
            warmup_adapt_rate: 0.05,
            warmup_frames: 50,
            hysteresis_ratio: 0.7,
            corr_threshold_mult: 5.0,
            corr_noise_adapt: 0.01,
            marker_min_duration_ms: 600.0,
            marker_max_duration_ms: 1500.0,
            marker_min_interval_ms: 55_000.0,
            history_size: 30,
            avg_window_ms: 15_000.0,
            gate_start_ms: 0.0,
            gate_end_ms: 100.0,
            gate_recovery_ms: 5000.0,
            threshold_multiplier: 2.0,
            // Blend fraction moved *toward* the new sample each frame: 0.002
            // downward (fast), 0.0002 upward (slow, so ticks don't train the
            // floor upward) — see `TickDetector::process_frame`.
            adapt_alpha_down: 1.0 - 0.002,
            adapt_alpha_up: 0.0002,
        }
    }
}

/// Bounds for a single runtime tuner, used by `TickDetector::set_*` methods
/// to validate and reject out-of-range overrides (leaving the previous
/// value untouched).
pub struct TunerBounds {
    pub min: f32,
    pub max: f32,
}

impl TickDetectorConfig {
    pub const THRESHOLD_MULTIPLIER_BOUNDS: TunerBounds = TunerBounds { min: 1.0, max: 5.0 };
    pub const ADAPT_ALPHA_DOWN_BOUNDS: TunerBounds = TunerBounds { min: 0.9, max: 0.999 };
    pub const ADAPT_ALPHA_UP_BOUNDS: TunerBounds = TunerBounds { min: 0.0001, max: 0.1 };
    pub const MIN_DURATION_MS_BOUNDS: TunerBounds = TunerBounds { min: 1.0, max: 10.0 };
}

/// Marker detector (component D) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerDetectorConfig {
    pub sample_rate_hz: f32,
    pub fft_size: usize,
    pub bandwidth_hz: f32,

    /// Sliding-window length, in milliseconds of frames, accumulated for
    /// the marker energy sum.
    pub window_ms: f32,

    pub threshold_multiplier: f32,
    pub noise_adapt_rate: f32,
    pub warmup_adapt_rate: f32,
    pub warmup_frames: u32,
    pub min_startup_ms: f32,

    pub min_duration_ms: f32,
    pub max_duration_ms: f32,
    pub cooldown_ms: f32,
}

impl Default for MarkerDetectorConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 50_000.0,
            fft_size: 256,
            bandwidth_hz: 40.0,
            window_ms: 800.0,
            threshold_multiplier: 3.0,
            noise_adapt_rate: 0.001,
            warmup_adapt_rate: 0.02,
            warmup_frames: 200,
            min_startup_ms: 10_000.0,
            min_duration_ms: 500.0,
            max_duration_ms: 5000.0,
            cooldown_ms: 30_000.0,
        }
    }
}

/// BCD time-domain detector (component E) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BcdTimeDetectorConfig {
    pub sample_rate_hz: f32,
    pub fft_size: usize,
    pub bandwidth_hz: f32,

    pub noise_adapt_down: f32,
    pub noise_adapt_up: f32,
    pub warmup_adapt_rate: f32,
    pub warmup_frames: u32,
    pub threshold_multiplier: f32,

    pub min_duration_ms: f32,
    pub max_duration_ms: f32,
    pub cooldown_ms: f32,
    /// Consecutive below-threshold frames required before a pulse is
    /// considered ended (debounce), unlike the tick/marker detectors.
    pub debounce_frames: u32,
}

impl Default for BcdTimeDetectorConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 50_000.0,
            fft_size: 256,
            bandwidth_hz: 20.0,
            noise_adapt_down: 0.002,
            noise_adapt_up: 0.0002,
            warmup_adapt_rate: 0.05,
            warmup_frames: 50,
            threshold_multiplier: 2.0,
            min_duration_ms: 150.0,
            max_duration_ms: 850.0,
            cooldown_ms: 200.0,
            debounce_frames: 3,
        }
    }
}

/// BCD frequency-domain detector (component F) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BcdFreqDetectorConfig {
    pub sample_rate_hz: f32,
    pub fft_size: usize,
    pub bandwidth_hz: f32,

    pub window_ms: f32,
    pub threshold_multiplier: f32,
    pub warmup_adapt_rate: f32,
    pub warmup_frames: u32,
    pub min_startup_ms: f32,

    pub min_duration_ms: f32,
    pub max_duration_ms: f32,
    pub cooldown_ms: f32,
    pub debounce_frames: u32,
}

impl Default for BcdFreqDetectorConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 50_000.0,
            fft_size: 2048,
            bandwidth_hz: 20.0,
            window_ms: 500.0,
            threshold_multiplier: 3.0,
            warmup_adapt_rate: 0.02,
            warmup_frames: 50,
            min_startup_ms: 5000.0,
            min_duration_ms: 150.0,
            max_duration_ms: 850.0,
            cooldown_ms: 500.0,
            debounce_frames: 3,
        }
    }
}

/// Tick correlator (component G) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickCorrelatorConfig {
    /// Interval band, in ms, considered a "normal" correlated tick.
    pub normal_interval_min_ms: f32,
    pub normal_interval_max_ms: f32,
    /// Interval band considered a single-skip correlation (one missed tick).
    pub skip_interval_min_ms: f32,
    pub skip_interval_max_ms: f32,

    pub recent_intervals_len: usize,
    pub min_chain_length_for_epoch: usize,
    pub interval_std_dev_tolerance_ms: f32,
    pub epoch_confidence_threshold: f32,
    pub max_consecutive_misses: u32,
    pub discipline_window_ms: f32,
}

impl Default for TickCorrelatorConfig {
    fn default() -> Self {
        Self {
            normal_interval_min_ms: 950.0,
            normal_interval_max_ms: 1050.0,
            skip_interval_min_ms: 1900.0,
            skip_interval_max_ms: 2100.0,
            recent_intervals_len: 5,
            min_chain_length_for_epoch: 5,
            interval_std_dev_tolerance_ms: 5.0,
            epoch_confidence_threshold: 0.8,
            max_consecutive_misses: 3,
            discipline_window_ms: 50.0,
        }
    }
}

/// BCD symbol correlator (component H) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BcdSymbolCorrelatorConfig {
    pub window_duration_ms: f32,
    pub window_tolerance_ms: f32,
    pub min_events_for_symbol: usize,
    pub energy_threshold_low: f32,
    /// Consecutive good inter-symbol intervals (900-1100ms) required to move
    /// ACQUIRING -> TENTATIVE -> TRACKING.
    pub tracking_confirm_count: u32,
}

impl Default for BcdSymbolCorrelatorConfig {
    fn default() -> Self {
        Self {
            window_duration_ms: 1000.0,
            window_tolerance_ms: 50.0,
            min_events_for_symbol: 2,
            energy_threshold_low: 0.001,
            tracking_confirm_count: 3,
        }
    }
}

/// Tone tracker (component I) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToneTrackerConfig {
    pub sample_rate_hz: f32,
    pub fft_size: usize,
    pub search_bins: usize,
    pub min_snr_db: f32,
    pub noise_bin_start: usize,
    pub noise_bin_end: usize,
    /// EMA blend factor used when publishing to `SharedNoiseFloor`.
    pub noise_floor_blend: f32,
}

impl Default for ToneTrackerConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 50_000.0,
            fft_size: 2048,
            search_bins: 10,
            min_snr_db: 10.0,
            noise_bin_start: 50,
            noise_bin_end: 150,
            noise_floor_blend: 0.1,
        }
    }
}

/// Sync detector (component J) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncDetectorConfig {
    pub marker_interval_ms: f32,
    pub drift_allowance_ms: f32,
    /// Number of missed-marker intervals of silence before LOCKED drops to
    /// RECOVERING.
    pub recovering_after_intervals: f32,
    /// Number of missed-marker intervals of silence before RECOVERING decays
    /// all the way to SEARCHING.
    pub searching_after_intervals: f32,
}

impl Default for SyncDetectorConfig {
    fn default() -> Self {
        Self {
            marker_interval_ms: 60_000.0,
            drift_allowance_ms: 500.0,
            recovering_after_intervals: 2.0,
            searching_after_intervals: 4.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        let tick = TickDetectorConfig::default();
        assert!(tick.gate_start_ms < tick.gate_end_ms);
        assert!(tick.min_duration_ms < tick.max_duration_ms);

        let marker = MarkerDetectorConfig::default();
        assert!(marker.min_duration_ms < marker.max_duration_ms);

        let corr = TickCorrelatorConfig::default();
        assert!(corr.normal_interval_min_ms < corr.normal_interval_max_ms);
        assert!(corr.skip_interval_min_ms > corr.normal_interval_max_ms);
    }

    #[test]
    fn valid_p_positions_match_spec() {
        assert_eq!(VALID_P_POSITIONS, [0, 9, 19, 29, 39, 49, 59]);
    }
}
