//! Shared DSP primitives used across every detector: the windowed FFT
//! processor (component A) and the matched-filter correlator (component B).

pub mod fft;
pub mod matched_filter;

pub use fft::WindowedFftProcessor;
pub use matched_filter::MatchedFilterCorrelator;
