//! Tick chain correlator (component G).
//!
//! Groups incoming tick timestamps into contiguous ~1-second chains,
//! tolerating the occasional missed tick at ~2 seconds, and once a chain is
//! long and regular enough, publishes a sub-second timing epoch with a
//! confidence derived from how tight the recent intervals have been.

use std::collections::VecDeque;

use crate::config::TickCorrelatorConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CorrelationKind {
    Normal,
    Skip,
    None,
}

/// A disciplined timing reference ready to hand to a tick detector's gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochEstimate {
    pub epoch_ms: f32,
    pub confidence: f32,
}

struct Tracking {
    active: bool,
    predicted_next_ms: f64,
    discipline_window_ms: f32,
    last_std_dev_ms: f32,
    consecutive_misses: u32,
}

pub struct TickCorrelator {
    config: TickCorrelatorConfig,

    last_tick_ms: Option<f64>,
    current_chain_length: u32,
    current_chain_start_ms: f64,
    recent_intervals: VecDeque<f32>,

    tracking: Tracking,

    total_correlated: u64,
    total_uncorrelated: u64,
    longest_chain_ticks: u32,

    pending_epoch: Option<EpochEstimate>,
}

impl TickCorrelator {
    pub fn new(config: TickCorrelatorConfig) -> Self {
        let recent_intervals = VecDeque::with_capacity(config.recent_intervals_len);
        Self {
            last_tick_ms: None,
            current_chain_length: 0,
            current_chain_start_ms: 0.0,
            recent_intervals,
            tracking: Tracking {
                active: false,
                predicted_next_ms: 0.0,
                discipline_window_ms: config.discipline_window_ms,
                last_std_dev_ms: f32::MAX,
                consecutive_misses: 0,
            },
            total_correlated: 0,
            total_uncorrelated: 0,
            longest_chain_ticks: 0,
            pending_epoch: None,
            config,
        }
    }

    pub fn total_correlated(&self) -> u64 {
        self.total_correlated
    }

    pub fn total_uncorrelated(&self) -> u64 {
        self.total_uncorrelated
    }

    pub fn longest_chain_ticks(&self) -> u32 {
        self.longest_chain_ticks
    }

    pub fn current_chain_length(&self) -> u32 {
        self.current_chain_length
    }

    /// Consume the most recent epoch estimate, if one became available since
    /// the last call.
    pub fn take_epoch(&mut self) -> Option<EpochEstimate> {
        self.pending_epoch.take()
    }

    /// Feed the next observed tick timestamp into the chain tracker.
    pub fn ingest_tick(&mut self, timestamp_ms: f64) {
        let Some(last) = self.last_tick_ms else {
            self.start_new_chain(timestamp_ms);
            self.last_tick_ms = Some(timestamp_ms);
            return;
        };

        let interval = (timestamp_ms - last) as f32;
        let prediction_match = self.tracking.active
            && (timestamp_ms - self.tracking.predicted_next_ms).abs()
                <= self.tracking.discipline_window_ms as f64;

        match self.correlate(interval, prediction_match) {
            CorrelationKind::Normal | CorrelationKind::Skip => {
                self.current_chain_length += 1;
                self.longest_chain_ticks = self.longest_chain_ticks.max(self.current_chain_length);
                self.total_correlated += 1;
                self.track_interval(interval);
                self.tracking.consecutive_misses = 0;
                self.calculate_epoch(timestamp_ms);
            }
            CorrelationKind::None => {
                self.total_uncorrelated += 1;
                if self.tracking.active {
                    self.tracking.consecutive_misses += 1;
                    if self.tracking.consecutive_misses > self.config.max_consecutive_misses {
                        self.tracking.active = false;
                    }
                }
                self.start_new_chain(timestamp_ms);
            }
        }

        self.tracking.predicted_next_ms = timestamp_ms + 1000.0;
        self.last_tick_ms = Some(timestamp_ms);
    }

    fn start_new_chain(&mut self, timestamp_ms: f64) {
        self.current_chain_length = 1;
        self.current_chain_start_ms = timestamp_ms;
        self.recent_intervals.clear();
    }

    fn correlate(&self, interval: f32, prediction_match: bool) -> CorrelationKind {
        if prediction_match {
            return CorrelationKind::Normal;
        }
        if interval >= self.config.normal_interval_min_ms && interval <= self.config.normal_interval_max_ms {
            CorrelationKind::Normal
        } else if interval >= self.config.skip_interval_min_ms && interval <= self.config.skip_interval_max_ms {
            CorrelationKind::Skip
        } else {
            CorrelationKind::None
        }
    }

    fn track_interval(&mut self, interval_ms: f32) {
        if self.recent_intervals.len() == self.config.recent_intervals_len {
            self.recent_intervals.pop_front();
        }
        self.recent_intervals.push_back(interval_ms);
    }

    fn calculate_epoch(&mut self, timestamp_ms: f64) {
        if self.current_chain_length < self.config.min_chain_length_for_epoch {
            return;
        }
        if self.recent_intervals.len() < 2 {
            return;
        }

        let mean: f32 =
            self.recent_intervals.iter().sum::<f32>() / self.recent_intervals.len() as f32;
        let variance: f32 = self
            .recent_intervals
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f32>()
            / self.recent_intervals.len() as f32;
        let std_dev = variance.sqrt();
        self.tracking.last_std_dev_ms = std_dev;

        if std_dev > self.config.interval_std_dev_tolerance_ms {
            return;
        }

        // Confidence decays linearly from 1.0 at std_dev=0 to 0.0 at the
        // tolerance boundary.
        let confidence = (1.0 - std_dev / self.config.interval_std_dev_tolerance_ms).clamp(0.0, 1.0);
        if confidence < self.config.epoch_confidence_threshold {
            return;
        }

        self.tracking.active = true;
        self.tracking.consecutive_misses = 0;
        let epoch_ms = (timestamp_ms as f32).rem_euclid(1000.0);
        self.pending_epoch = Some(EpochEstimate { epoch_ms, confidence });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regular_tick_train_produces_confident_epoch() {
        let config = TickCorrelatorConfig::default();
        let mut corr = TickCorrelator::new(config.clone());

        let mut epoch = None;
        for n in 0..(config.min_chain_length_for_epoch + 3) {
            corr.ingest_tick(n as f64 * 1000.0);
            if let Some(e) = corr.take_epoch() {
                epoch = Some(e);
            }
        }

        let epoch = epoch.expect("a regular tick train should yield an epoch");
        assert!(epoch.confidence >= config.epoch_confidence_threshold);
    }

    #[test]
    fn irregular_intervals_break_the_chain() {
        let config = TickCorrelatorConfig::default();
        let mut corr = TickCorrelator::new(config);
        corr.ingest_tick(0.0);
        corr.ingest_tick(1000.0);
        corr.ingest_tick(5000.0); // way outside both normal and skip bounds
        assert_eq!(corr.current_chain_length(), 1);
        assert!(corr.total_uncorrelated() >= 1);
    }

    #[test]
    fn single_skip_is_tolerated() {
        let config = TickCorrelatorConfig::default();
        let mut corr = TickCorrelator::new(config);
        corr.ingest_tick(0.0);
        corr.ingest_tick(1000.0);
        corr.ingest_tick(3000.0); // missed one tick, ~2000ms interval
        assert_eq!(corr.current_chain_length(), 3);
    }
}
