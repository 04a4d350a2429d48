//! Telemetry sampling and statistical aggregation for a detection run.

use crate::logging::{StatSummary, TelemetryEvent};
use chrono::Utc;
use std::time::Instant;

/// Accumulates per-event telemetry samples and computes run statistics.
pub struct TelemetryAggregator {
    noise_floor_samples: Vec<f64>,
    tick_jitter_samples: Vec<f64>,

    last_sample_time: Instant,
    total_ticks: u64,
    total_markers: u64,
    total_bcd_symbols: u64,
    current_sync_locked: bool,
    current_sync_confidence: f64,

    sample_interval_secs: f64,
}

impl TelemetryAggregator {
    pub fn new(sample_interval_secs: f64) -> Self {
        Self {
            noise_floor_samples: Vec::new(),
            tick_jitter_samples: Vec::new(),
            last_sample_time: Instant::now(),
            total_ticks: 0,
            total_markers: 0,
            total_bcd_symbols: 0,
            current_sync_locked: false,
            current_sync_confidence: 0.0,
            sample_interval_secs,
        }
    }

    /// Record a tick: its noise floor and the jitter against the running
    /// average interval (both already computed by `TickDetector`).
    pub fn record_tick(&mut self, noise_floor: f32, interval_ms: f32, avg_interval_ms: f32) {
        self.total_ticks += 1;
        self.noise_floor_samples.push(noise_floor as f64);
        if avg_interval_ms > 0.0 {
            self.tick_jitter_samples
                .push((interval_ms - avg_interval_ms) as f64);
        }
    }

    pub fn record_marker(&mut self) {
        self.total_markers += 1;
    }

    pub fn record_bcd_symbol(&mut self) {
        self.total_bcd_symbols += 1;
    }

    pub fn record_sync(&mut self, locked: bool, confidence: f32) {
        self.current_sync_locked = locked;
        self.current_sync_confidence = confidence as f64;
    }

    pub fn should_sample(&self) -> bool {
        self.last_sample_time.elapsed().as_secs_f64() >= self.sample_interval_secs
    }

    /// Generate a telemetry event and reset the sampling timer.
    pub fn sample(&mut self) -> Option<TelemetryEvent> {
        if !self.should_sample() {
            return None;
        }

        let event = TelemetryEvent {
            timestamp: Utc::now(),
            ticks_detected: self.total_ticks,
            markers_detected: self.total_markers,
            bcd_symbols_decoded: self.total_bcd_symbols,
            noise_floor: self.mean(&self.noise_floor_samples).unwrap_or(0.0),
            tick_jitter_ms: self.mean(&self.tick_jitter_samples).unwrap_or(0.0),
            sync_confidence: self.current_sync_confidence,
            sync_locked: self.current_sync_locked,
        };

        self.last_sample_time = Instant::now();

        Some(event)
    }

    pub fn compute_statistics(&self) -> (StatSummary, StatSummary) {
        (
            self.compute_stat_summary(&self.noise_floor_samples),
            self.compute_stat_summary(&self.tick_jitter_samples),
        )
    }

    fn compute_stat_summary(&self, samples: &[f64]) -> StatSummary {
        if samples.is_empty() {
            return StatSummary {
                mean: 0.0,
                stddev: 0.0,
                min: 0.0,
                max: 0.0,
                samples: 0,
            };
        }

        let mean = self.mean(samples).unwrap_or(0.0);
        let variance =
            samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / samples.len() as f64;
        let stddev = variance.sqrt();
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        StatSummary {
            mean,
            stddev,
            min,
            max,
            samples: samples.len(),
        }
    }

    fn mean(&self, samples: &[f64]) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }

    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    pub fn total_markers(&self) -> u64 {
        self.total_markers
    }

    pub fn total_bcd_symbols(&self) -> u64 {
        self.total_bcd_symbols
    }
}
