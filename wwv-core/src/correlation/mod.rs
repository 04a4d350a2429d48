//! Cross-second and cross-minute correlators (components G, H).
//!
//! These sit downstream of the per-frame detectors: they don't touch I/Q
//! samples directly, only the timestamped events the detectors emit, and
//! feed disciplined timing back upstream (the tick correlator's epoch) or
//! sideways (the BCD symbol correlator's classified bits).

pub mod bcd_correlator;
pub mod tick_correlator;

pub use bcd_correlator::{BcdSymbolCorrelator, ClassifiedSymbol, TrackingState};
pub use tick_correlator::{EpochEstimate, TickCorrelator};
