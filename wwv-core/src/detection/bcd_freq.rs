//! BCD frequency-domain detector (component F).
//!
//! Gives confident presence of the 100 Hz subcarrier pulse via a long
//! (2048-point) FFT and a sliding-window energy accumulator, trading edge
//! precision (owned by `BcdTimeDetector`) for robustness to noise.

use std::collections::VecDeque;

use crate::config::{BcdFreqDetectorConfig, BCD_SUBCARRIER_HZ, NOISE_FLOOR_MAX, NOISE_FLOOR_MIN};
use crate::dsp::WindowedFftProcessor;
use crate::errors::{DetectionError, DspError, WwvError};
use crate::events::{BcdFreqEvent, EventSink};
use crate::logging::SignalLogger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    InPulse,
    Cooldown,
}

pub struct BcdFreqDetector {
    config: BcdFreqDetectorConfig,
    fft: WindowedFftProcessor,

    i_buf: Vec<f32>,
    q_buf: Vec<f32>,
    buf_idx: usize,

    energy_history: VecDeque<f32>,
    window_frames: usize,
    accumulated_energy: f32,
    baseline_energy: f32,

    state: State,
    pulse_start_frame: u64,
    pulse_peak_accum: f32,
    consecutive_low_frames: u32,
    cooldown_frames_remaining: u32,

    frame_count: u64,
    warmup_complete: bool,

    pulses_detected: u64,
    pulses_rejected: u64,

    frame_duration_ms: f32,
}

impl BcdFreqDetector {
    pub fn new(config: BcdFreqDetectorConfig) -> Result<Self, WwvError> {
        let fft = WindowedFftProcessor::new(config.fft_size, config.sample_rate_hz)
            .map_err(WwvError::Dsp)?;
        let frame_duration_ms = config.fft_size as f32 * 1000.0 / config.sample_rate_hz;
        let window_frames = (config.window_ms / frame_duration_ms).round().max(1.0) as usize;

        Ok(Self {
            i_buf: vec![0.0; config.fft_size],
            q_buf: vec![0.0; config.fft_size],
            buf_idx: 0,
            energy_history: VecDeque::with_capacity(window_frames),
            window_frames,
            accumulated_energy: 0.0,
            baseline_energy: NOISE_FLOOR_MIN,
            state: State::Idle,
            pulse_start_frame: 0,
            pulse_peak_accum: 0.0,
            consecutive_low_frames: 0,
            cooldown_frames_remaining: 0,
            frame_count: 0,
            warmup_complete: false,
            pulses_detected: 0,
            pulses_rejected: 0,
            frame_duration_ms,
            fft,
            config,
        })
    }

    pub fn pulses_detected(&self) -> u64 {
        self.pulses_detected
    }

    pub fn baseline_energy(&self) -> f32 {
        self.baseline_energy
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
        let energy = self
            .fft
            .bucket_energy(BCD_SUBCARRIER_HZ, self.config.bandwidth_hz);

        self.frame_count += 1;
        let timestamp_ms = self.frame_count as f64 * self.frame_duration_ms as f64;

        if self.energy_history.len() == self.window_frames {
            self.accumulated_energy -= self.energy_history.pop_front().unwrap();
        }
        self.energy_history.push_back(energy);
        self.accumulated_energy += energy;

        if !self.warmup_complete {
            let rate = self.config.warmup_adapt_rate;
            self.baseline_energy = self.baseline_energy * (1.0 - rate) + energy * rate;
            if self.frame_count >= self.config.warmup_frames as u64 {
                self.warmup_complete = true;
            }
        } else if self.state == State::Idle {
            self.baseline_energy =
                self.baseline_energy * (1.0 - self.config.warmup_adapt_rate * 0.05)
                    + energy * (self.config.warmup_adapt_rate * 0.05);
        }
        self.baseline_energy = self.baseline_energy.clamp(NOISE_FLOOR_MIN, NOISE_FLOOR_MAX);

        let threshold = self.baseline_energy * self.config.threshold_multiplier;
        self.run_state_machine(threshold, timestamp_ms, sink, logger);
        Ok(())
    }

    fn run_state_machine(
        &mut self,
        threshold: f32,
        timestamp_ms: f64,
        sink: &mut impl EventSink,
        logger: Option<&mut SignalLogger>,
    ) {
        match self.state {
            State::Idle => {
                let past_startup = timestamp_ms >= self.config.min_startup_ms as f64;
                if past_startup && self.accumulated_energy > threshold {
                    self.state = State::InPulse;
                    self.pulse_start_frame = self.frame_count;
                    self.pulse_peak_accum = self.accumulated_energy;
                    self.consecutive_low_frames = 0;
                }
            }
            State::InPulse => {
                self.pulse_peak_accum = self.pulse_peak_accum.max(self.accumulated_energy);
                if self.accumulated_energy <= threshold {
                    self.consecutive_low_frames += 1;
                } else {
                    self.consecutive_low_frames = 0;
                }

                let duration_ms =
                    (self.frame_count - self.pulse_start_frame) as f32 * self.frame_duration_ms;

                if self.consecutive_low_frames >= self.config.debounce_frames {
                    self.finish_pulse(duration_ms, timestamp_ms, threshold, sink, logger);
                    self.enter_cooldown();
                } else if duration_ms > self.config.max_duration_ms {
                    // Pulse timed out: reseed the baseline from what we just
                    // observed rather than keep adapting from the stale
                    // pre-pulse value.
                    self.baseline_energy =
                        (self.pulse_peak_accum / self.window_frames as f32).clamp(NOISE_FLOOR_MIN, NOISE_FLOOR_MAX);
                    self.pulses_rejected += 1;
                    self.enter_cooldown();
                }
            }
            State::Cooldown => {
                if self.cooldown_frames_remaining == 0 {
                    self.state = State::Idle;
                } else {
                    self.cooldown_frames_remaining -= 1;
                }
            }
        }
    }

    fn finish_pulse(
        &mut self,
        duration_ms: f32,
        timestamp_ms: f64,
        threshold: f32,
        sink: &mut impl EventSink,
        logger: Option<&mut SignalLogger>,
    ) {
        if duration_ms < self.config.min_duration_ms || duration_ms > self.config.max_duration_ms {
            self.pulses_rejected += 1;
            return;
        }

        self.pulses_detected += 1;
        let snr_db = 20.0 * (self.pulse_peak_accum / self.baseline_energy.max(NOISE_FLOOR_MIN)).log10();
        let event = BcdFreqEvent {
            timestamp_ms,
            duration_ms,
            accumulated_energy: self.pulse_peak_accum,
            baseline_energy: threshold / self.config.threshold_multiplier,
            snr_db,
        };
        sink.on_bcd_freq(&event);
        if let Some(l) = logger {
            l.trace("BCD_FREQ", format!("pulse #{}", self.pulses_detected));
        }
    }

    fn enter_cooldown(&mut self) {
        self.state = State::Cooldown;
        self.cooldown_frames_remaining =
            (self.config.cooldown_ms / self.frame_duration_ms).round() as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingSink;

    #[test]
    fn silence_produces_no_pulses() {
        let config = BcdFreqDetectorConfig::default();
        let mut det = BcdFreqDetector::new(config.clone()).unwrap();
        let mut sink = CollectingSink::default();

        let n = config.fft_size * (config.warmup_frames as usize + 10);
        for _ in 0..n {
            det.process_sample(0.0, 0.0, &mut sink, None).unwrap();
        }

        assert_eq!(det.pulses_detected(), 0);
    }
}
