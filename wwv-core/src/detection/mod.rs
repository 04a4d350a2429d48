//! Per-second and per-minute feature detectors (components C-F, I).
//!
//! Each detector owns its own FFT (or correlator) state and is driven one
//! I/Q sample at a time via `process_sample`. None of them know about each
//! other directly; cross-detector coordination happens through
//! `SharedNoiseFloor` and the correlators in [`crate::correlation`].

pub mod bcd_freq;
pub mod bcd_time;
pub mod marker;
pub mod tick;
pub mod tone;

pub use bcd_freq::BcdFreqDetector;
pub use bcd_time::BcdTimeDetector;
pub use marker::MarkerDetector;
pub use tick::{EpochSource, TickDetector};
pub use tone::ToneTracker;
