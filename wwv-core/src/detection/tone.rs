//! Reference tone tracker (component I).
//!
//! Measures the carrier (nominally 0 Hz after downconversion) and the
//! 500/600 Hz minute-tone using a wideband Blackman-Harris FFT with
//! parabolic bin interpolation for sub-bin frequency resolution, and
//! publishes a slowly-adapting noise-floor estimate for the marker
//! detector to blend into its own baseline.

use crate::config::{ToneTrackerConfig, CARRIER_NOMINAL_HZ, NOISE_FLOOR_MIN, TONE_500_HZ, TONE_600_HZ};
use crate::dsp::fft::WindowFunction;
use crate::dsp::WindowedFftProcessor;
use crate::errors::{DetectionError, DspError, WwvError};
use crate::events::{EventSink, ToneMeasurement};
use crate::logging::SignalLogger;
use crate::shared::SharedNoiseFloor;

pub struct ToneTracker {
    config: ToneTrackerConfig,
    fft: WindowedFftProcessor,
    shared_noise_floor: Option<SharedNoiseFloor>,

    i_buf: Vec<f32>,
    q_buf: Vec<f32>,
    buf_idx: usize,

    frame_count: u64,
    frame_duration_ms: f32,

    last_carrier: Option<ToneMeasurement>,
    last_tone: Option<ToneMeasurement>,
}

impl ToneTracker {
    pub fn new(config: ToneTrackerConfig) -> Result<Self, WwvError> {
        Self::with_shared_noise_floor(config, None)
    }

    pub fn with_shared_noise_floor(
        config: ToneTrackerConfig,
        shared_noise_floor: Option<SharedNoiseFloor>,
    ) -> Result<Self, WwvError> {
        let fft = WindowedFftProcessor::with_window(
            config.fft_size,
            config.sample_rate_hz,
            WindowFunction::BlackmanHarris,
        )
        .map_err(WwvError::Dsp)?;
        let frame_duration_ms = config.fft_size as f32 * 1000.0 / config.sample_rate_hz;

        Ok(Self {
            i_buf: vec![0.0; config.fft_size],
            q_buf: vec![0.0; config.fft_size],
            buf_idx: 0,
            frame_count: 0,
            frame_duration_ms,
            last_carrier: None,
            last_tone: None,
            fft,
            shared_noise_floor,
            config,
        })
    }

    pub fn last_carrier(&self) -> Option<ToneMeasurement> {
        self.last_carrier
    }

    pub fn last_tone(&self) -> Option<ToneMeasurement> {
        self.last_tone
    }

    pub fn process_sample(
        &mut self,
        i: f32,
        q: f32,
        sink: &mut impl EventSink,
        logger: Option<&mut SignalLogger>,
    ) -> Result<(), WwvError> {
        self.i_buf[self.buf_idx] = i;
        self.q_buf[self.buf_idx] = q;
        self.buf_idx += 1;

        if self.buf_idx == self.config.fft_size {
            self.buf_idx = 0;
            self.process_frame(sink, logger)?;
        }
        Ok(())
    }

    fn process_frame(
        &mut self,
        sink: &mut impl EventSink,
        logger: Option<&mut SignalLogger>,
    ) -> Result<(), WwvError> {
        self.fft
            .process(&self.i_buf, &self.q_buf)
            .map_err(|e| match e {
                DspError::MismatchedIqLength { i_len, q_len } => {
                    WwvError::Detection(DetectionError::MismatchedIqLength { i_len, q_len })
                }
                other => WwvError::Dsp(other),
            })?;

        self.frame_count += 1;
        let magnitudes = self.fft.magnitudes();
        let noise_estimate = self.estimate_noise_floor(&magnitudes);

        let carrier = self.measure_frequency(&magnitudes, CARRIER_NOMINAL_HZ, noise_estimate, true);
        // 500 Hz and 600 Hz differ between the two stations; track whichever
        // reads the stronger signal-to-noise ratio this frame.
        let tone_500 = self.measure_frequency(&magnitudes, TONE_500_HZ, noise_estimate, false);
        let tone_600 = self.measure_frequency(&magnitudes, TONE_600_HZ, noise_estimate, false);
        let tone = if tone_600.snr_db > tone_500.snr_db {
            tone_600
        } else {
            tone_500
        };

        self.last_carrier = Some(carrier);
        self.last_tone = Some(tone);

        if carrier.valid {
            sink.on_tone(&carrier);
        }
        if tone.valid {
            sink.on_tone(&tone);
            if let Some(shared) = &self.shared_noise_floor {
                shared.blend(noise_estimate, self.config.noise_floor_blend);
            }
        }

        if let Some(l) = logger {
            l.trace(
                "TONE",
                format!(
                    "frame={} carrier={:.3}Hz tone={:.3}Hz snr={:.1}dB",
                    self.frame_count, carrier.measured_hz, tone.measured_hz, tone.snr_db
                ),
            );
        }
        Ok(())
    }

    fn estimate_noise_floor(&self, magnitudes: &[f32]) -> f32 {
        let fft_size = self.config.fft_size;
        let start = self.config.noise_bin_start.min(fft_size - 1);
        let end = self.config.noise_bin_end.min(fft_size - 1);
        if start >= end {
            return NOISE_FLOOR_MIN;
        }
        let mut sum = 0.0f32;
        let mut count = 0usize;
        for bin in start..end {
            sum += magnitudes[bin] / fft_size as f32;
            sum += magnitudes[fft_size - bin] / fft_size as f32;
            count += 2;
        }
        (sum / count.max(1) as f32).max(NOISE_FLOOR_MIN)
    }

    /// Locate the strongest bin within `search_bins` of `center_bin` and
    /// refine it with a 3-point parabolic interpolation, returning the
    /// refined bin position and the peak magnitude found.
    fn find_and_interpolate(&self, magnitudes: &[f32], center_bin: i64) -> (f32, f32) {
        let fft_size = self.config.fft_size;
        let search = self.config.search_bins as i64;

        let mag_at = |bin: i64| -> f32 {
            let n = fft_size as i64;
            let wrapped = ((bin % n) + n) % n;
            magnitudes[wrapped as usize]
        };

        let mut best_bin = center_bin;
        let mut best_mag = f32::MIN;
        for offset in -search..=search {
            let bin = center_bin + offset;
            let mag = mag_at(bin);
            if mag > best_mag {
                best_mag = mag;
                best_bin = bin;
            }
        }

        let alpha = mag_at(best_bin - 1);
        let beta = best_mag;
        let gamma = mag_at(best_bin + 1);
        let denom = alpha - 2.0 * beta + gamma;
        let p = if denom.abs() > f32::EPSILON {
            0.5 * (alpha - gamma) / denom
        } else {
            0.0
        };
        (best_bin as f32 + p, best_mag)
    }

    /// Carrier: a single peak searched around bin 0 (its mirror is itself).
    /// Tone: the spec calls for an independent upper- and lower-sideband
    /// estimate, each parabola-refined on its own side of DC, averaged
    /// together — this rejects a sideband-only bias that picking whichever
    /// single bin is strongest would introduce.
    fn measure_frequency(
        &self,
        magnitudes: &[f32],
        target_hz: f32,
        noise_floor: f32,
        carrier: bool,
    ) -> ToneMeasurement {
        let fft_size = self.config.fft_size;
        let hz_per_bin = self.fft.hz_per_bin();
        let center_bin = (target_hz / hz_per_bin).round() as i64;

        let (measured_hz, peak_mag) = if carrier {
            let (refined_bin, peak_mag) = self.find_and_interpolate(magnitudes, center_bin);
            (refined_bin * hz_per_bin, peak_mag)
        } else {
            let (usb_bin, usb_mag) = self.find_and_interpolate(magnitudes, center_bin);
            let (lsb_bin, lsb_mag) = self.find_and_interpolate(magnitudes, -center_bin);
            let usb_hz = usb_bin * hz_per_bin;
            let lsb_hz = -lsb_bin * hz_per_bin;
            ((usb_hz + lsb_hz) / 2.0, usb_mag.max(lsb_mag))
        };

        let offset_hz = if carrier {
            measured_hz
        } else {
            measured_hz.abs() - target_hz
        };
        let offset_ppm = if target_hz.abs() > f32::EPSILON {
            (offset_hz / target_hz) * 1.0e6
        } else {
            0.0
        };

        let snr_db = 20.0
            * ((peak_mag / fft_size as f32).max(NOISE_FLOOR_MIN) / noise_floor.max(NOISE_FLOOR_MIN))
                .log10();
        let max_offset_hz = self.config.search_bins as f32 * hz_per_bin;
        let valid = snr_db >= self.config.min_snr_db && offset_hz.abs() <= max_offset_hz;

        ToneMeasurement {
            measured_hz,
            offset_hz,
            offset_ppm,
            snr_db,
            valid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingSink;

    #[test]
    fn silence_yields_invalid_measurements() {
        let config = ToneTrackerConfig::default();
        let mut tracker = ToneTracker::new(config.clone()).unwrap();
        let mut sink = CollectingSink::default();

        for _ in 0..config.fft_size {
            tracker.process_sample(0.0, 0.0, &mut sink, None).unwrap();
        }

        assert!(!tracker.last_carrier().unwrap().valid);
        assert!(!tracker.last_tone().unwrap().valid);
    }

    #[test]
    fn strong_tone_is_measured_near_target() {
        let config = ToneTrackerConfig::default();
        let mut tracker = ToneTracker::new(config.clone()).unwrap();
        let mut sink = CollectingSink::default();

        // A real-valued reference tone is conjugate-symmetric in the
        // spectrum (energy at both +500 Hz and -500 Hz), which is what the
        // dual-sideband measurement is built to average across.
        for _ in 0..3 {
            for n in 0..config.fft_size {
                let phase =
                    2.0 * std::f32::consts::PI * TONE_500_HZ * n as f32 / config.sample_rate_hz;
                tracker
                    .process_sample(phase.cos() * 5.0, 0.0, &mut sink, None)
                    .unwrap();
            }
        }

        let tone = tracker.last_tone().unwrap();
        assert!(tone.valid);
        assert!((tone.measured_hz - TONE_500_HZ).abs() < 5.0);
    }
}
