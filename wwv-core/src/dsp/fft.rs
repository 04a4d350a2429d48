//! Windowed FFT processor (component A).
//!
//! Buffers `fft_size` I/Q samples, applies a window function, runs a
//! complex FFT via `rustfft`, and exposes "bucket energy": the magnitude
//! sum across a ± bandwidth/2 span of bins around a target frequency,
//! mirrored into the negative-frequency half of the spectrum and
//! normalized by `fft_size`. This is the single piece of spectral-analysis
//! code shared by every detector and the tone tracker.

use crate::errors::DspError;
use num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Window function applied before the FFT. Detectors use `Hann`; the tone
/// tracker uses `BlackmanHarris` for its tighter sidelobes (needed to
/// resolve 500/600 Hz tones against a wideband signal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowFunction {
    Hann,
    BlackmanHarris,
}

fn hann_window(size: usize) -> Vec<f32> {
    if size <= 1 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|n| {
            let x = std::f32::consts::PI * 2.0 * n as f32 / (size - 1) as f32;
            0.5 * (1.0 - x.cos())
        })
        .collect()
}

/// 4-term Blackman-Harris window (a0=0.35875, a1=0.48829, a2=0.14128, a3=0.01168).
fn blackman_harris_window(size: usize) -> Vec<f32> {
    const A0: f32 = 0.35875;
    const A1: f32 = 0.48829;
    const A2: f32 = 0.14128;
    const A3: f32 = 0.01168;
    if size <= 1 {
        return vec![1.0; size];
    }
    let n_minus_1 = (size - 1) as f32;
    (0..size)
        .map(|n| {
            let x = std::f32::consts::PI * 2.0 * n as f32 / n_minus_1;
            A0 - A1 * x.cos() + A2 * (2.0 * x).cos() - A3 * (3.0 * x).cos()
        })
        .collect()
}

pub struct WindowedFftProcessor {
    fft_size: usize,
    sample_rate: f32,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex32>,
}

impl WindowedFftProcessor {
    pub fn new(fft_size: usize, sample_rate: f32) -> Result<Self, DspError> {
        Self::with_window(fft_size, sample_rate, WindowFunction::Hann)
    }

    pub fn with_window(
        fft_size: usize,
        sample_rate: f32,
        window_fn: WindowFunction,
    ) -> Result<Self, DspError> {
        if fft_size == 0 || !fft_size.is_power_of_two() {
            return Err(DspError::InvalidFftSize { size: fft_size });
        }
        if !(sample_rate > 0.0) {
            return Err(DspError::InvalidSampleRate { rate: sample_rate });
        }

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let window = match window_fn {
            WindowFunction::Hann => hann_window(fft_size),
            WindowFunction::BlackmanHarris => blackman_harris_window(fft_size),
        };

        Ok(Self {
            fft_size,
            sample_rate,
            fft,
            window,
            buffer: vec![Complex32::new(0.0, 0.0); fft_size],
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn hz_per_bin(&self) -> f32 {
        self.sample_rate / self.fft_size as f32
    }

    /// Apply the window to `i`/`q` and run the FFT in place.
    pub fn process(&mut self, i_samples: &[f32], q_samples: &[f32]) -> Result<(), DspError> {
        if i_samples.len() != q_samples.len() {
            return Err(DspError::MismatchedIqLength {
                i_len: i_samples.len(),
                q_len: q_samples.len(),
            });
        }
        if i_samples.len() != self.fft_size {
            return Err(DspError::BufferUnderrun {
                requested: self.fft_size,
                available: i_samples.len(),
            });
        }

        for n in 0..self.fft_size {
            let w = self.window[n];
            self.buffer[n] = Complex32::new(i_samples[n] * w, q_samples[n] * w);
        }

        self.fft.process(&mut self.buffer);
        Ok(())
    }

    /// Magnitude of each FFT output bin, valid until the next `process` call.
    pub fn magnitudes(&self) -> Vec<f32> {
        self.buffer.iter().map(|c| c.norm()).collect()
    }

    pub fn magnitude(&self, bin: usize) -> f32 {
        self.buffer[bin % self.fft_size].norm()
    }

    /// Summed magnitude, normalized by `fft_size`, across bins spanning
    /// ±⌈bandwidth/2⌉ bins around `target_hz`, including the mirrored
    /// negative-frequency bins.
    pub fn bucket_energy(&self, target_hz: f32, bandwidth_hz: f32) -> f32 {
        let hz_per_bin = self.hz_per_bin();
        let center_bin = (target_hz / hz_per_bin).round() as i64;
        let half_bins = ((bandwidth_hz / 2.0) / hz_per_bin).ceil() as i64;

        let mut sum = 0.0f32;
        for offset in -half_bins..=half_bins {
            let bin = center_bin + offset;
            sum += self.magnitude_at_signed_bin(bin);
            // Mirror bin into the negative-frequency half of the spectrum.
            sum += self.magnitude_at_signed_bin(-bin);
        }
        sum / self.fft_size as f32
    }

    fn magnitude_at_signed_bin(&self, bin: i64) -> f32 {
        let n = self.fft_size as i64;
        let wrapped = ((bin % n) + n) % n;
        self.magnitude(wrapped as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_power_of_two_size() {
        assert!(matches!(
            WindowedFftProcessor::new(300, 50_000.0),
            Err(DspError::InvalidFftSize { size: 300 })
        ));
    }

    #[test]
    fn rejects_non_positive_sample_rate() {
        assert!(matches!(
            WindowedFftProcessor::new(256, 0.0),
            Err(DspError::InvalidSampleRate { .. })
        ));
    }

    #[test]
    fn pure_tone_has_energy_at_target_bin() {
        let fft_size = 256;
        let sample_rate = 50_000.0f32;
        let mut proc = WindowedFftProcessor::new(fft_size, sample_rate).unwrap();

        let hz_per_bin = sample_rate / fft_size as f32;
        let target_bin = 20;
        let freq = target_bin as f32 * hz_per_bin;

        let mut i = vec![0.0f32; fft_size];
        let mut q = vec![0.0f32; fft_size];
        for n in 0..fft_size {
            let phase = 2.0 * std::f32::consts::PI * freq * n as f32 / sample_rate;
            i[n] = phase.cos();
            q[n] = phase.sin();
        }
        proc.process(&i, &q).unwrap();

        let on_target = proc.bucket_energy(freq, hz_per_bin * 4.0);
        let off_target = proc.bucket_energy(freq * 3.0, hz_per_bin * 4.0);
        assert!(on_target > off_target * 10.0);
    }

    #[test]
    fn silence_yields_zero_energy() {
        let fft_size = 256;
        let mut proc = WindowedFftProcessor::new(fft_size, 50_000.0).unwrap();
        let zeros = vec![0.0f32; fft_size];
        proc.process(&zeros, &zeros).unwrap();
        assert_eq!(proc.bucket_energy(1000.0, 40.0), 0.0);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let mut proc = WindowedFftProcessor::new(256, 50_000.0).unwrap();
        let i = vec![0.0f32; 256];
        let q = vec![0.0f32; 128];
        assert!(matches!(
            proc.process(&i, &q),
            Err(DspError::MismatchedIqLength { .. })
        ));
    }
}
