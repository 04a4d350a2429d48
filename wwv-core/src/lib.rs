//! WWV/WWVH time-signal detection core.
//!
//! A single-threaded, sample-driven pipeline that turns I/Q radio samples
//! into tick, minute-marker, BCD time-code, and reference-tone events.
//! Each detector in [`detection`] is independent and FFT/correlator-owned;
//! [`correlation`] and [`sync`] consume the timestamped events those
//! detectors emit to recover disciplined timing and classified BCD
//! symbols. The crate performs no I/O — event delivery is through the
//! [`events::EventSink`] trait, and wiring samples, sinks, and telemetry
//! together is the orchestrator's job (see the `wwv-cli` binary).

pub mod config;
pub mod correlation;
pub mod detection;
pub mod dsp;
pub mod errors;
pub mod events;
pub mod logging;
pub mod shared;
pub mod sync;
pub mod telemetry;

pub use config::Station;
pub use correlation::{BcdSymbolCorrelator, ClassifiedSymbol, EpochEstimate, TickCorrelator};
pub use detection::{BcdFreqDetector, BcdTimeDetector, EpochSource, MarkerDetector, TickDetector, ToneTracker};
pub use errors::{ConfigError, CorrelationError, DetectionError, DspError, Result, WwvError};
pub use events::{
    BcdFreqEvent, BcdSource, BcdSymbol, BcdSymbolEvent, BcdTimeEvent, CollectingSink, EventSink,
    MarkerEvent, NullSink, TickEvent, TickMarkerEvent, ToneMeasurement,
};
pub use logging::{LogConfig, LogLevel, SignalLogger};
pub use shared::SharedNoiseFloor;
pub use sync::{SyncDetector, SyncState};
