//! Minute-anchored BCD symbol correlator (component H).
//!
//! Integrates `BcdTimeEvent`/`BcdFreqEvent` pulses into 1-second windows
//! keyed off a minute anchor published by the sync detector, then
//! classifies each window's pulse duration into a `0`/`1`/marker symbol,
//! gating marker classification to the seconds where WWV actually places
//! one.
//!
//! Duration is estimated per side from the first/last event span when a
//! side saw two or more events (tighter than any single pulse's own
//! reported width), falling back to the lone reported duration when a
//! side only saw one; the two sides are then averaged if both
//! contributed.

use crate::config::{VALID_P_POSITIONS, BCD_SYMBOL_MIN_MS, BCD_SYMBOL_ONE_MAX_MS, BCD_SYMBOL_ZERO_MAX_MS};
use crate::config::BcdSymbolCorrelatorConfig;
use crate::events::{BcdFreqEvent, BcdSource, BcdSymbol, BcdTimeEvent};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifiedSymbol {
    pub second: i32,
    pub symbol: BcdSymbol,
    pub source: BcdSource,
    pub window_start_ms: f64,
    pub duration_ms: f32,
    pub confidence: f32,
    pub time_event_count: u32,
    pub freq_event_count: u32,
    pub time_energy: f32,
    pub freq_energy: f32,
}

/// Correlator's confidence in its own inter-symbol cadence, independent of
/// any one symbol's classification confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    Acquiring,
    Tentative,
    Tracking,
}

#[derive(Default)]
struct DomainAccumulator {
    energy_sum: f32,
    duration_sum: f32,
    event_count: u32,
    first_ms: Option<f64>,
    last_ms: f64,
}

impl DomainAccumulator {
    fn reset(&mut self) {
        *self = Self::default();
    }

    fn ingest(&mut self, energy: f32, duration_ms: f32, timestamp_ms: f64) {
        self.energy_sum += energy;
        self.duration_sum += duration_ms;
        self.event_count += 1;
        if self.first_ms.is_none() {
            self.first_ms = Some(timestamp_ms);
        }
        self.last_ms = timestamp_ms;
    }

    fn mean_duration(&self) -> f32 {
        if self.event_count == 0 {
            0.0
        } else {
            self.duration_sum / self.event_count as f32
        }
    }
}

pub struct BcdSymbolCorrelator {
    config: BcdSymbolCorrelatorConfig,
    minute_anchor_ms: Option<f64>,

    window_open: bool,
    current_second: i32,
    window_start_ms: f64,

    time: DomainAccumulator,
    freq: DomainAccumulator,

    last_symbol_ms: Option<f64>,
    symbol_count: u64,

    tracking_state: TrackingState,
    consecutive_good_intervals: u32,
}

impl BcdSymbolCorrelator {
    pub fn new(config: BcdSymbolCorrelatorConfig) -> Self {
        Self {
            config,
            minute_anchor_ms: None,
            window_open: false,
            current_second: 0,
            window_start_ms: 0.0,
            time: DomainAccumulator::default(),
            freq: DomainAccumulator::default(),
            last_symbol_ms: None,
            symbol_count: 0,
            tracking_state: TrackingState::Acquiring,
            consecutive_good_intervals: 0,
        }
    }

    pub fn symbol_count(&self) -> u64 {
        self.symbol_count
    }

    pub fn tracking_state(&self) -> TrackingState {
        self.tracking_state
    }

    /// Publish (or re-publish, as sync tracks drift) the minute anchor in
    /// milliseconds since start, aligned to second 0 of the minute.
    pub fn set_minute_anchor(&mut self, anchor_ms: f64) {
        self.minute_anchor_ms = Some(anchor_ms);
    }

    pub fn ingest_time_event(&mut self, event: &BcdTimeEvent) -> Option<ClassifiedSymbol> {
        let anchor = self.minute_anchor_ms?;
        let second = self.second_for_timestamp(event.timestamp_ms, anchor)?;
        let closed = self.check_transition(second, anchor, event.timestamp_ms);
        self.time
            .ingest(event.peak_energy, event.duration_ms, event.timestamp_ms);
        closed
    }

    pub fn ingest_freq_event(&mut self, event: &BcdFreqEvent) -> Option<ClassifiedSymbol> {
        let anchor = self.minute_anchor_ms?;
        let second = self.second_for_timestamp(event.timestamp_ms, anchor)?;
        let closed = self.check_transition(second, anchor, event.timestamp_ms);
        self.freq
            .ingest(event.accumulated_energy, event.duration_ms, event.timestamp_ms);
        closed
    }

    fn second_for_timestamp(&self, timestamp_ms: f64, anchor_ms: f64) -> Option<i32> {
        if timestamp_ms < anchor_ms {
            return None;
        }
        let elapsed_s = ((timestamp_ms - anchor_ms) / 1000.0).floor() as i64;
        Some((elapsed_s.rem_euclid(60)) as i32)
    }

    fn window_start(anchor_ms: f64, second: i32) -> f64 {
        anchor_ms + second as f64 * 1000.0
    }

    /// If an event falls into a new second, close the previous window (if
    /// open) and emit its classified symbol before opening the new one.
    fn check_transition(
        &mut self,
        second: i32,
        anchor_ms: f64,
        _timestamp_ms: f64,
    ) -> Option<ClassifiedSymbol> {
        if !self.window_open {
            self.open_window(second, anchor_ms);
            return None;
        }
        if second == self.current_second {
            return None;
        }

        let closed = self.close_window();
        self.open_window(second, anchor_ms);
        closed
    }

    fn open_window(&mut self, second: i32, anchor_ms: f64) {
        self.window_open = true;
        self.current_second = second;
        self.window_start_ms = Self::window_start(anchor_ms, second);
        self.time.reset();
        self.freq.reset();
    }

    fn close_window(&mut self) -> Option<ClassifiedSymbol> {
        self.window_open = false;

        let duration_ms = match (side_duration_estimate(&self.time), side_duration_estimate(&self.freq)) {
            (Some(t), Some(f)) => (t + f) / 2.0,
            (Some(t), None) => t,
            (None, Some(f)) => f,
            (None, None) => return None,
        };

        let source = match (self.time.event_count > 0, self.freq.event_count > 0) {
            (true, true) => BcdSource::Both,
            (true, false) => BcdSource::Time,
            (false, true) => BcdSource::Freq,
            (false, false) => BcdSource::None,
        };

        let total_events = self.time.event_count + self.freq.event_count;
        let total_energy = self.time.energy_sum + self.freq.energy_sum;

        let mut confidence = if source == BcdSource::Both { 1.0 } else { 0.6 };
        if total_events < self.config.min_events_for_symbol
            || total_energy <= self.config.energy_threshold_low
        {
            confidence *= 0.5;
        }

        let symbol = classify_duration(duration_ms, self.current_second);

        // None-classified windows still advance bookkeeping (per spec:
        // "Symbol None events are not emitted to callbacks but must still
        // close the window and update state") but never touch the
        // inter-symbol cadence tracker or the emitted-symbol counters.
        if symbol == BcdSymbol::None {
            return None;
        }

        self.symbol_count += 1;
        self.advance_tracking_state(self.window_start_ms);
        self.last_symbol_ms = Some(self.window_start_ms);

        Some(ClassifiedSymbol {
            second: self.current_second,
            symbol,
            source,
            window_start_ms: self.window_start_ms,
            duration_ms,
            confidence,
            time_event_count: self.time.event_count,
            freq_event_count: self.freq.event_count,
            time_energy: self.time.energy_sum,
            freq_energy: self.freq.energy_sum,
        })
    }

    fn advance_tracking_state(&mut self, window_start_ms: f64) {
        let Some(last) = self.last_symbol_ms else {
            self.tracking_state = TrackingState::Tentative;
            return;
        };

        let interval_ms = window_start_ms - last;
        let on_cadence = (900.0..=1100.0).contains(&interval_ms);

        if on_cadence {
            self.consecutive_good_intervals += 1;
            if self.consecutive_good_intervals >= self.config.tracking_confirm_count {
                self.tracking_state = TrackingState::Tracking;
            } else if self.tracking_state == TrackingState::Acquiring {
                self.tracking_state = TrackingState::Tentative;
            }
        } else {
            self.consecutive_good_intervals = 0;
            self.tracking_state = TrackingState::Tentative;
        }
    }
}

/// Duration estimate for one side: the first/last span when the side has
/// at least two events, its single reported duration when it has exactly
/// one, or `None` when it contributed nothing this window.
fn side_duration_estimate(side: &DomainAccumulator) -> Option<f32> {
    if side.event_count >= 2 {
        side.first_ms.map(|first| (side.last_ms - first) as f32)
    } else if side.event_count == 1 {
        Some(side.mean_duration())
    } else {
        None
    }
}

pub fn is_valid_p_position(second: i32) -> bool {
    second >= 0 && VALID_P_POSITIONS.contains(&(second as u32))
}

pub fn classify_duration(duration_ms: f32, second: i32) -> BcdSymbol {
    if duration_ms < BCD_SYMBOL_MIN_MS {
        return BcdSymbol::None;
    }
    if duration_ms <= BCD_SYMBOL_ZERO_MAX_MS {
        BcdSymbol::Zero
    } else if duration_ms <= BCD_SYMBOL_ONE_MAX_MS {
        BcdSymbol::One
    } else if is_valid_p_position(second) {
        // Covers both the ≤900 ms band and anything longer: an overlong
        // pulse at a P position is still read as the position marker, not
        // discarded, matching spec.md 4.H's identical treatment of the two
        // longest duration bands.
        BcdSymbol::Marker
    } else {
        BcdSymbol::One
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_zero_one_and_marker_by_duration() {
        assert_eq!(classify_duration(200.0, 1), BcdSymbol::Zero);
        assert_eq!(classify_duration(500.0, 1), BcdSymbol::One);
        assert_eq!(classify_duration(800.0, 0), BcdSymbol::Marker);
    }

    #[test]
    fn marker_duration_outside_valid_position_is_not_a_marker() {
        assert_eq!(classify_duration(800.0, 5), BcdSymbol::One);
    }

    #[test]
    fn overlong_pulse_at_a_p_position_is_still_a_marker() {
        assert_eq!(classify_duration(950.0, 9), BcdSymbol::Marker);
        assert_eq!(classify_duration(950.0, 10), BcdSymbol::One);
    }

    #[test]
    fn valid_p_positions_match_expected_set() {
        for s in [0, 9, 19, 29, 39, 49, 59] {
            assert!(is_valid_p_position(s));
        }
        assert!(!is_valid_p_position(10));
    }

    #[test]
    fn two_time_events_in_same_second_integrate_into_one_symbol() {
        let config = BcdSymbolCorrelatorConfig::default();
        let mut corr = BcdSymbolCorrelator::new(config);
        corr.set_minute_anchor(0.0);

        let e1 = BcdTimeEvent {
            timestamp_ms: 100.0,
            duration_ms: 200.0,
            peak_energy: 0.1,
            noise_floor: 0.01,
            snr_db: 10.0,
        };
        let e2 = BcdTimeEvent {
            timestamp_ms: 300.0,
            duration_ms: 210.0,
            peak_energy: 0.1,
            noise_floor: 0.01,
            snr_db: 10.0,
        };
        assert!(corr.ingest_time_event(&e1).is_none());
        assert!(corr.ingest_time_event(&e2).is_none());

        // Crossing into second 1 closes the window for second 0.
        let e3 = BcdTimeEvent {
            timestamp_ms: 1100.0,
            duration_ms: 205.0,
            peak_energy: 0.1,
            noise_floor: 0.01,
            snr_db: 10.0,
        };
        let closed = corr.ingest_time_event(&e3).unwrap();
        assert_eq!(closed.second, 0);
        assert_eq!(closed.symbol, BcdSymbol::Zero);
    }

    #[test]
    fn one_time_and_one_freq_event_agree_with_full_confidence() {
        let config = BcdSymbolCorrelatorConfig::default();
        let mut corr = BcdSymbolCorrelator::new(config);
        corr.set_minute_anchor(0.0);

        let time_event = BcdTimeEvent {
            timestamp_ms: 5010.0,
            duration_ms: 500.0,
            peak_energy: 0.5,
            noise_floor: 0.01,
            snr_db: 15.0,
        };
        let freq_event = BcdFreqEvent {
            timestamp_ms: 5020.0,
            duration_ms: 500.0,
            accumulated_energy: 0.5,
            baseline_energy: 0.01,
            snr_db: 15.0,
        };
        assert!(corr.ingest_time_event(&time_event).is_none());
        assert!(corr.ingest_freq_event(&freq_event).is_none());

        // An event in second 6 closes the window for second 5.
        let next = BcdTimeEvent {
            timestamp_ms: 6010.0,
            duration_ms: 500.0,
            peak_energy: 0.5,
            noise_floor: 0.01,
            snr_db: 15.0,
        };
        let closed = corr.ingest_time_event(&next).unwrap();

        assert_eq!(closed.second, 5);
        assert_eq!(closed.symbol, BcdSymbol::One);
        assert_eq!(closed.source, BcdSource::Both);
        assert_eq!(closed.confidence, 1.0);
        assert_eq!(closed.window_start_ms, 5000.0);
    }

    #[test]
    fn none_classified_window_is_not_emitted_but_clears_state() {
        let config = BcdSymbolCorrelatorConfig::default();
        let mut corr = BcdSymbolCorrelator::new(config);
        corr.set_minute_anchor(0.0);

        // A 30 ms pulse is below BCD_SYMBOL_MIN_MS and classifies to None.
        let tiny = BcdTimeEvent {
            timestamp_ms: 100.0,
            duration_ms: 30.0,
            peak_energy: 0.1,
            noise_floor: 0.01,
            snr_db: 10.0,
        };
        let next = BcdTimeEvent {
            timestamp_ms: 1100.0,
            duration_ms: 200.0,
            peak_energy: 0.1,
            noise_floor: 0.01,
            snr_db: 10.0,
        };
        assert!(corr.ingest_time_event(&tiny).is_none());
        // Window closes with a None classification: no callback-worthy
        // symbol, but the correlator must still have moved on to second 1.
        assert!(corr.ingest_time_event(&next).is_none());
        assert_eq!(corr.symbol_count(), 0);
    }
}
