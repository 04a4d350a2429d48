//! Minute-marker sync detector (component J).
//!
//! Tracks marker cadence (from either the tick detector's `TickMarkerEvent`
//! or the marker detector's `MarkerEvent` — whichever arrives) and derives
//! a {SEARCHING, ACQUIRING, LOCKED, RECOVERING} confidence state, publishing
//! `last_marker_ms`/confidence as the minute anchor for the BCD symbol
//! correlator.

use crate::config::SyncDetectorConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Searching,
    Acquiring,
    Locked,
    Recovering,
}

pub struct SyncDetector {
    config: SyncDetectorConfig,
    state: SyncState,
    last_marker_ms: Option<f64>,
    confidence: f32,
}

impl SyncDetector {
    pub fn new(config: SyncDetectorConfig) -> Self {
        Self {
            config,
            state: SyncState::Searching,
            last_marker_ms: None,
            confidence: 0.0,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Minute anchor in ms, if one has ever been observed. Retained through
    /// RECOVERING so the BCD correlator doesn't lose its window state on a
    /// single missed marker.
    pub fn last_marker_ms(&self) -> Option<f64> {
        self.last_marker_ms
    }

    /// Feed the timestamp of a marker-cadence event (from either the tick
    /// detector or the marker detector).
    pub fn on_marker(&mut self, timestamp_ms: f64) {
        let Some(last) = self.last_marker_ms else {
            self.state = SyncState::Acquiring;
            self.last_marker_ms = Some(timestamp_ms);
            self.confidence = 0.2;
            return;
        };

        let interval_ms = timestamp_ms - last;
        let expected = self.config.marker_interval_ms as f64;
        let drift = self.config.drift_allowance_ms as f64;
        let on_cadence = (interval_ms - expected).abs() <= drift;

        match self.state {
            SyncState::Acquiring => {
                if on_cadence {
                    self.state = SyncState::Locked;
                    self.confidence = 0.95;
                } else {
                    // Didn't fit 60s from the first marker: restart
                    // acquisition from this one instead.
                    self.confidence = 0.2;
                }
            }
            SyncState::Locked | SyncState::Recovering => {
                if on_cadence {
                    self.state = SyncState::Locked;
                    self.confidence = (self.confidence + 0.1).min(1.0);
                } else {
                    self.confidence = (self.confidence - 0.3).max(0.0);
                }
            }
            SyncState::Searching => {
                self.state = SyncState::Acquiring;
                self.confidence = 0.2;
            }
        }

        self.last_marker_ms = Some(timestamp_ms);
    }

    /// Advance the detector's silence timer; call once per elapsed
    /// marker-interval-worth of wall time (or more finely, with
    /// `now_ms` threaded through on every sample/frame) so LOCKED can decay
    /// toward RECOVERING/SEARCHING without a marker ever having to arrive.
    pub fn on_tick_without_marker(&mut self, now_ms: f64) {
        let Some(last) = self.last_marker_ms else {
            return;
        };
        if self.state == SyncState::Searching {
            return;
        }

        let elapsed_intervals = (now_ms - last) / self.config.marker_interval_ms as f64;

        if elapsed_intervals >= self.config.searching_after_intervals as f64 {
            self.state = SyncState::Searching;
            self.confidence = 0.0;
            self.last_marker_ms = None;
        } else if elapsed_intervals >= self.config.recovering_after_intervals as f64
            && self.state == SyncState::Locked
        {
            self.state = SyncState::Recovering;
            self.confidence = (self.confidence * 0.5).max(0.1);
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self.state, SyncState::Locked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_marker_moves_to_acquiring() {
        let mut sync = SyncDetector::new(SyncDetectorConfig::default());
        sync.on_marker(1000.0);
        assert_eq!(sync.state(), SyncState::Acquiring);
    }

    #[test]
    fn second_marker_on_cadence_locks() {
        let mut sync = SyncDetector::new(SyncDetectorConfig::default());
        sync.on_marker(0.0);
        sync.on_marker(60_000.0);
        assert_eq!(sync.state(), SyncState::Locked);
        assert!(sync.confidence() > 0.9);
    }

    #[test]
    fn prolonged_silence_decays_to_searching() {
        let config = SyncDetectorConfig::default();
        let mut sync = SyncDetector::new(config.clone());
        sync.on_marker(0.0);
        sync.on_marker(60_000.0);
        assert_eq!(sync.state(), SyncState::Locked);

        sync.on_tick_without_marker(60_000.0 + config.marker_interval_ms as f64 * 2.5);
        assert_eq!(sync.state(), SyncState::Recovering);
        assert!(sync.last_marker_ms().is_some());

        sync.on_tick_without_marker(60_000.0 + config.marker_interval_ms as f64 * 5.0);
        assert_eq!(sync.state(), SyncState::Searching);
    }

    #[test]
    fn off_cadence_marker_degrades_confidence_without_unlocking() {
        let mut sync = SyncDetector::new(SyncDetectorConfig::default());
        sync.on_marker(0.0);
        sync.on_marker(60_000.0);
        let locked_confidence = sync.confidence();
        sync.on_marker(130_000.0); // 70s later, outside drift allowance
        assert!(sync.confidence() < locked_confidence);
    }
}
