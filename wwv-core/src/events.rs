//! Event value objects emitted by detectors, and the sink trait that
//! receives them.
//!
//! Detectors never own a sink: every `process_*` call borrows `&mut dyn
//! EventSink` (or is generic over `impl EventSink`) for the duration of a
//! single call and never reenters it. This mirrors the teacher's callback
//! contract without the function-pointer-plus-opaque-user-data plumbing a
//! Rust trait object makes unnecessary.

/// Which side(s) contributed to a classified BCD symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BcdSource {
    None,
    Time,
    Freq,
    Both,
}

/// A classified BCD symbol value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BcdSymbol {
    None,
    Zero,
    One,
    Marker,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickEvent {
    pub number: u64,
    pub timestamp_ms: f64,
    pub interval_ms: f32,
    pub duration_ms: f32,
    pub peak_energy: f32,
    pub avg_interval_ms: f32,
    pub noise_floor: f32,
    pub corr_peak: f32,
    pub corr_ratio: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerEvent {
    pub number: u64,
    pub timestamp_ms: f64,
    pub since_last_marker_sec: f32,
    pub accumulated_energy: f32,
    pub peak_energy: f32,
    pub duration_ms: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickMarkerEvent {
    pub number: u64,
    pub timestamp_ms: f64,
    pub start_timestamp_ms: f64,
    pub duration_ms: f32,
    pub corr_ratio: f32,
    pub interval_ms: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BcdTimeEvent {
    pub timestamp_ms: f64,
    pub duration_ms: f32,
    pub peak_energy: f32,
    pub noise_floor: f32,
    pub snr_db: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BcdFreqEvent {
    pub timestamp_ms: f64,
    pub duration_ms: f32,
    pub accumulated_energy: f32,
    pub baseline_energy: f32,
    pub snr_db: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BcdSymbolEvent {
    pub symbol: BcdSymbol,
    pub timestamp_ms: f64,
    pub duration_ms: f32,
    pub confidence: f32,
    pub source: BcdSource,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneMeasurement {
    pub measured_hz: f32,
    pub offset_hz: f32,
    pub offset_ppm: f32,
    pub snr_db: f32,
    pub valid: bool,
}

/// Receives immutable events emitted by detectors.
///
/// Implementors never see a call reenter: detectors invoke sink methods
/// synchronously from inside a single `process_sample`/`process_frame`
/// call and never hold the borrow beyond it. Default no-op bodies let a
/// caller implement only the events it cares about.
pub trait EventSink {
    fn on_tick(&mut self, _event: &TickEvent) {}
    fn on_marker(&mut self, _event: &MarkerEvent) {}
    fn on_tick_marker(&mut self, _event: &TickMarkerEvent) {}
    fn on_bcd_time(&mut self, _event: &BcdTimeEvent) {}
    fn on_bcd_freq(&mut self, _event: &BcdFreqEvent) {}
    fn on_bcd_symbol(&mut self, _event: &BcdSymbolEvent) {}
    fn on_tone(&mut self, _event: &ToneMeasurement) {}
}

/// A sink that drops every event; useful as a default generic parameter
/// or in tests that only care about a detector's return value.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {}

/// An in-memory sink that simply collects every event it receives, handy
/// for tests and for the CLI's end-of-run summary.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    pub ticks: Vec<TickEvent>,
    pub markers: Vec<MarkerEvent>,
    pub tick_markers: Vec<TickMarkerEvent>,
    pub bcd_time: Vec<BcdTimeEvent>,
    pub bcd_freq: Vec<BcdFreqEvent>,
    pub bcd_symbols: Vec<BcdSymbolEvent>,
    pub tones: Vec<ToneMeasurement>,
}

impl EventSink for CollectingSink {
    fn on_tick(&mut self, event: &TickEvent) {
        self.ticks.push(*event);
    }

    fn on_marker(&mut self, event: &MarkerEvent) {
        self.markers.push(*event);
    }

    fn on_tick_marker(&mut self, event: &TickMarkerEvent) {
        self.tick_markers.push(*event);
    }

    fn on_bcd_time(&mut self, event: &BcdTimeEvent) {
        self.bcd_time.push(*event);
    }

    fn on_bcd_freq(&mut self, event: &BcdFreqEvent) {
        self.bcd_freq.push(*event);
    }

    fn on_bcd_symbol(&mut self, event: &BcdSymbolEvent) {
        self.bcd_symbols.push(*event);
    }

    fn on_tone(&mut self, event: &ToneMeasurement) {
        self.tones.push(*event);
    }
}
