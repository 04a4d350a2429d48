//! Marker detector (component D).
//!
//! Detects the 800 ms 1000 Hz minute-marker pulse via a sliding-window
//! energy accumulator (rather than instantaneous per-frame energy) tested
//! against an adaptive baseline, using the same IDLE/IN_MARKER/COOLDOWN
//! pattern as the tick detector.

use std::collections::VecDeque;

use crate::config::{MarkerDetectorConfig, Station, NOISE_FLOOR_MAX, NOISE_FLOOR_MIN};
use crate::dsp::WindowedFftProcessor;
use crate::errors::{DetectionError, DspError, WwvError};
use crate::events::{EventSink, MarkerEvent};
use crate::logging::SignalLogger;
use crate::shared::SharedNoiseFloor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    InMarker,
    Cooldown,
}

pub struct MarkerDetector {
    config: MarkerDetectorConfig,
    station: Station,
    fft: WindowedFftProcessor,
    shared_noise_floor: Option<SharedNoiseFloor>,

    i_buf: Vec<f32>,
    q_buf: Vec<f32>,
    buf_idx: usize,

    energy_history: VecDeque<f32>,
    window_frames: usize,
    accumulated_energy: f32,
    baseline_energy: f32,

    state: State,
    marker_start_frame: u64,
    marker_peak_energy: f32,
    cooldown_frames_remaining: u32,

    frame_count: u64,
    warmup_complete: bool,

    markers_detected: u64,
    last_marker_ms: Option<f64>,

    frame_duration_ms: f32,
}

impl MarkerDetector {
    pub fn new(config: MarkerDetectorConfig, station: Station) -> Result<Self, WwvError> {
        Self::with_shared_noise_floor(config, station, None)
    }

    pub fn with_shared_noise_floor(
        config: MarkerDetectorConfig,
        station: Station,
        shared_noise_floor: Option<SharedNoiseFloor>,
    ) -> Result<Self, WwvError> {
        let fft = WindowedFftProcessor::new(config.fft_size, config.sample_rate_hz)
            .map_err(WwvError::Dsp)?;
        let frame_duration_ms = config.fft_size as f32 * 1000.0 / config.sample_rate_hz;
        let window_frames = (config.window_ms / frame_duration_ms).round().max(1.0) as usize;

        Ok(Self {
            fft,
            station,
            shared_noise_floor,
            i_buf: vec![0.0; config.fft_size],
            q_buf: vec![0.0; config.fft_size],
            buf_idx: 0,
            energy_history: VecDeque::with_capacity(window_frames),
            window_frames,
            accumulated_energy: 0.0,
            baseline_energy: NOISE_FLOOR_MIN,
            state: State::Idle,
            marker_start_frame: 0,
            marker_peak_energy: 0.0,
            cooldown_frames_remaining: 0,
            frame_count: 0,
            warmup_complete: false,
            markers_detected: 0,
            last_marker_ms: None,
            frame_duration_ms,
            config,
        })
    }

    pub fn markers_detected(&self) -> u64 {
        self.markers_detected
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
            .bucket_energy(self.station.tick_freq_hz(), self.config.bandwidth_hz);

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
            let rate = self.config.noise_adapt_rate;
            self.baseline_energy = self.baseline_energy * (1.0 - rate) + energy * rate;
            if let Some(shared) = &self.shared_noise_floor {
                // Blend in the tone tracker's subcarrier noise-floor estimate
                // rather than re-deriving it from scratch.
                self.baseline_energy =
                    self.baseline_energy * (1.0 - rate) + shared.get() * rate;
            }
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
                    self.state = State::InMarker;
                    self.marker_start_frame = self.frame_count;
                    self.marker_peak_energy = self.accumulated_energy;
                }
            }
            State::InMarker => {
                self.marker_peak_energy = self.marker_peak_energy.max(self.accumulated_energy);
                let duration_ms =
                    (self.frame_count - self.marker_start_frame) as f32 * self.frame_duration_ms;

                if self.accumulated_energy <= threshold {
                    self.finish_marker(duration_ms, timestamp_ms, threshold, sink, logger);
                    self.enter_cooldown();
                } else if duration_ms > self.config.max_duration_ms {
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

    fn finish_marker(
        &mut self,
        duration_ms: f32,
        timestamp_ms: f64,
        threshold: f32,
        sink: &mut impl EventSink,
        logger: Option<&mut SignalLogger>,
    ) {
        if duration_ms < self.config.min_duration_ms || duration_ms > self.config.max_duration_ms {
            return;
        }

        let since_last_marker_sec = match self.last_marker_ms {
            Some(t) => ((timestamp_ms - t) / 1000.0) as f32,
            None => f32::INFINITY,
        };

        self.markers_detected += 1;
        let event = MarkerEvent {
            number: self.markers_detected,
            timestamp_ms,
            since_last_marker_sec,
            accumulated_energy: self.marker_peak_energy,
            peak_energy: self.marker_peak_energy,
            duration_ms,
        };
        self.last_marker_ms = Some(timestamp_ms);
        sink.on_marker(&event);
        if let Some(l) = logger {
            l.info(
                "MARKER",
                format!("marker #{} threshold={:.4}", event.number, threshold),
            );
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
    fn silence_detects_no_markers() {
        let config = MarkerDetectorConfig::default();
        let mut det = MarkerDetector::new(config.clone(), Station::Wwv).unwrap();
        let mut sink = CollectingSink::default();

        let n = config.fft_size * 500;
        for _ in 0..n {
            det.process_sample(0.0, 0.0, &mut sink, None).unwrap();
        }

        assert_eq!(det.markers_detected(), 0);
    }

    #[test]
    fn cooldown_blocks_immediate_redetection() {
        let config = MarkerDetectorConfig {
            min_startup_ms: 0.0,
            ..MarkerDetectorConfig::default()
        };
        let mut det = MarkerDetector::new(config, Station::Wwv).unwrap();
        assert_eq!(det.state, State::Idle);
    }
}
