//! BCD time-domain detector (component E).
//!
//! Gives precise edge timing for the 100 Hz subcarrier pulses, using the
//! same IDLE/IN_PULSE/COOLDOWN pattern as the tick detector but requiring
//! `debounce_frames` consecutive sub-threshold frames before ending a
//! pulse, rather than a single one.

use crate::config::{BcdTimeDetectorConfig, BCD_SUBCARRIER_HZ, NOISE_FLOOR_MAX, NOISE_FLOOR_MIN};
use crate::dsp::WindowedFftProcessor;
use crate::errors::{DetectionError, DspError, WwvError};
use crate::events::{BcdTimeEvent, EventSink};
use crate::logging::SignalLogger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    InPulse,
    Cooldown,
}

pub struct BcdTimeDetector {
    config: BcdTimeDetectorConfig,
    fft: WindowedFftProcessor,

    i_buf: Vec<f32>,
    q_buf: Vec<f32>,
    buf_idx: usize,

    state: State,
    noise_floor: f32,
    threshold_high: f32,
    threshold_low: f32,

    pulse_start_frame: u64,
    pulse_peak_energy: f32,
    consecutive_low_frames: u32,
    cooldown_frames_remaining: u32,

    frame_count: u64,
    warmup_complete: bool,

    pulses_detected: u64,
    pulses_rejected: u64,

    frame_duration_ms: f32,
}

impl BcdTimeDetector {
    pub fn new(config: BcdTimeDetectorConfig) -> Result<Self, WwvError> {
        let fft = WindowedFftProcessor::new(config.fft_size, config.sample_rate_hz)
            .map_err(WwvError::Dsp)?;
        let frame_duration_ms = config.fft_size as f32 * 1000.0 / config.sample_rate_hz;

        Ok(Self {
            i_buf: vec![0.0; config.fft_size],
            q_buf: vec![0.0; config.fft_size],
            buf_idx: 0,
            state: State::Idle,
            noise_floor: NOISE_FLOOR_MIN,
            threshold_high: 0.0,
            threshold_low: 0.0,
            pulse_start_frame: 0,
            pulse_peak_energy: 0.0,
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

    pub fn noise_floor(&self) -> f32 {
        self.noise_floor
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

        if !self.warmup_complete {
            let rate = self.config.warmup_adapt_rate;
            self.noise_floor = self.noise_floor * (1.0 - rate) + energy * rate;
            if self.frame_count >= self.config.warmup_frames as u64 {
                self.warmup_complete = true;
            }
        } else if self.state == State::Idle && energy < self.threshold_high {
            if energy < self.noise_floor {
                self.noise_floor = self.noise_floor * (1.0 - self.config.noise_adapt_down)
                    + energy * self.config.noise_adapt_down;
            } else {
                self.noise_floor = self.noise_floor * (1.0 - self.config.noise_adapt_up)
                    + energy * self.config.noise_adapt_up;
            }
        }
        self.noise_floor = self.noise_floor.clamp(NOISE_FLOOR_MIN, NOISE_FLOOR_MAX);
        self.threshold_high = self.noise_floor * self.config.threshold_multiplier;
        self.threshold_low = self.threshold_high * 0.7;

        self.run_state_machine(energy, timestamp_ms, sink, logger);
        Ok(())
    }

    fn run_state_machine(
        &mut self,
        energy: f32,
        timestamp_ms: f64,
        sink: &mut impl EventSink,
        logger: Option<&mut SignalLogger>,
    ) {
        match self.state {
            State::Idle => {
                if energy > self.threshold_high {
                    self.state = State::InPulse;
                    self.pulse_start_frame = self.frame_count;
                    self.pulse_peak_energy = energy;
                    self.consecutive_low_frames = 0;
                }
            }
            State::InPulse => {
                self.pulse_peak_energy = self.pulse_peak_energy.max(energy);
                if energy < self.threshold_low {
                    self.consecutive_low_frames += 1;
                } else {
                    self.consecutive_low_frames = 0;
                }

                let duration_ms =
                    (self.frame_count - self.pulse_start_frame) as f32 * self.frame_duration_ms;

                if self.consecutive_low_frames >= self.config.debounce_frames {
                    self.finish_pulse(duration_ms, timestamp_ms, sink, logger);
                    self.enter_cooldown();
                } else if duration_ms > self.config.max_duration_ms {
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
        sink: &mut impl EventSink,
        logger: Option<&mut SignalLogger>,
    ) {
        if duration_ms < self.config.min_duration_ms || duration_ms > self.config.max_duration_ms {
            self.pulses_rejected += 1;
            return;
        }

        self.pulses_detected += 1;
        let snr_db = 20.0 * (self.pulse_peak_energy / self.noise_floor.max(NOISE_FLOOR_MIN)).log10();
        let event = BcdTimeEvent {
            timestamp_ms,
            duration_ms,
            peak_energy: self.pulse_peak_energy,
            noise_floor: self.noise_floor,
            snr_db,
        };
        sink.on_bcd_time(&event);
        if let Some(l) = logger {
            l.trace("BCD_TIME", format!("pulse #{}", self.pulses_detected));
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
        let config = BcdTimeDetectorConfig::default();
        let mut det = BcdTimeDetector::new(config.clone()).unwrap();
        let mut sink = CollectingSink::default();

        let n = config.fft_size * (config.warmup_frames as usize + 20);
        for _ in 0..n {
            det.process_sample(0.0, 0.0, &mut sink, None).unwrap();
        }

        assert_eq!(det.pulses_detected(), 0);
    }
}
