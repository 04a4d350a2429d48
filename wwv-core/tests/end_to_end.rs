//! Integration tests exercising the end-to-end scenarios.
//!
//! Each test wires together the same detector/correlator pairs the CLI
//! orchestrator wires at runtime (tick detector + tick correlator, sync
//! detector + BCD symbol correlator) rather than driving a single
//! component in isolation.

use wwv_core::config::{
    BcdSymbolCorrelatorConfig, SyncDetectorConfig, TickCorrelatorConfig, TickDetectorConfig,
};
use wwv_core::events::{BcdFreqEvent, BcdSource, BcdSymbol, BcdTimeEvent, CollectingSink};
use wwv_core::{SyncDetector, TickCorrelator, TickDetector};

/// Deterministic xorshift32, used only to give the warmup/idle scenario a
/// non-zero noise floor to adapt to without pulling in a `rand` dependency
/// this crate otherwise has no use for.
struct Xorshift32(u32);

impl Xorshift32 {
    fn next_f32(&mut self, amplitude: f32) -> f32 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 17;
        self.0 ^= self.0 << 5;
        (self.0 as f32 / u32::MAX as f32 - 0.5) * 2.0 * amplitude
    }
}

fn feed_tone(
    det: &mut TickDetector,
    sink: &mut CollectingSink,
    freq_hz: f32,
    sample_rate: f32,
    n_samples: usize,
    start_phase_sample: u64,
) {
    for n in 0..n_samples {
        let t = (start_phase_sample + n as u64) as f32;
        let phase = 2.0 * std::f32::consts::PI * freq_hz * t / sample_rate;
        det.process_sample(phase.cos(), phase.sin(), sink, None)
            .unwrap();
    }
}

/// Scenario 1: warmup then idle. 2 s of low-amplitude noise at 50 kHz;
/// expect 0 ticks, 0 markers, and warmup completing partway through.
#[test]
fn warmup_then_idle_detects_nothing() {
    let config = TickDetectorConfig::default();
    let sample_rate = config.sample_rate_hz;
    let mut det = TickDetector::new(config.clone()).unwrap();
    let mut sink = CollectingSink::default();
    let mut noise = Xorshift32(0x9E3779B9);

    let warmup_samples = config.fft_size * config.warmup_frames as usize;
    for _ in 0..warmup_samples {
        let n = noise.next_f32(0.01);
        det.process_sample(n, n, &mut sink, None).unwrap();
    }
    assert!(det.warmup_complete());

    let total_samples = (2.0 * sample_rate) as usize;
    let remaining = total_samples.saturating_sub(warmup_samples);
    for _ in 0..remaining {
        let n = noise.next_f32(0.01);
        det.process_sample(n, n, &mut sink, None).unwrap();
    }

    assert_eq!(det.ticks_detected(), 0);
    assert_eq!(det.markers_detected(), 0);
    assert!(sink.ticks.is_empty());
    assert!(sink.tick_markers.is_empty());
}

/// Scenario 2: a clean 60-tick train, wired through the tick correlator so
/// the chain-epoch feedback path (tick detector → tick correlator →
/// `set_epoch`) is exercised the way the orchestrator exercises it.
#[test]
fn clean_tick_train_correlates_with_tight_intervals() {
    let config = TickDetectorConfig {
        gate_end_ms: 1000.0, // disable the narrow gate; the correlator hasn't locked yet at t=0
        ..TickDetectorConfig::default()
    };
    let sample_rate = config.sample_rate_hz;
    let freq = config.station.tick_freq_hz();
    let mut det = TickDetector::new(config.clone()).unwrap();
    let mut corr = TickCorrelator::new(TickCorrelatorConfig::default());
    let mut sink = CollectingSink::default();

    let warmup_samples = config.fft_size * (config.warmup_frames as usize + 2);
    for _ in 0..warmup_samples {
        det.process_sample(0.0, 0.0, &mut sink, None).unwrap();
    }
    sink.ticks.clear();

    let on_samples = (0.005 * sample_rate) as usize;
    let off_samples = (0.995 * sample_rate) as usize;
    let mut sample_clock = 0u64;
    for _ in 0..60 {
        feed_tone(&mut det, &mut sink, freq, sample_rate, on_samples, sample_clock);
        sample_clock += on_samples as u64;
        for _ in 0..off_samples {
            det.process_sample(0.0, 0.0, &mut sink, None).unwrap();
        }
        sample_clock += off_samples as u64;
    }

    for event in &sink.ticks {
        corr.ingest_tick(event.timestamp_ms);
        if let Some(epoch) = corr.take_epoch() {
            det.set_epoch(epoch.epoch_ms as f32, wwv_core::EpochSource::TickChain, epoch.confidence);
        }
    }

    assert!(det.ticks_detected() >= 50, "expected close to 60 ticks, got {}", det.ticks_detected());
    assert_eq!(det.markers_detected(), 0);

    for event in sink.ticks.iter().skip(1) {
        assert!(
            (event.interval_ms - 1000.0).abs() <= 20.0,
            "interval {} ms too far from 1000 ms",
            event.interval_ms
        );
    }
    assert!(det.noise_floor() <= 0.01);
}

/// Scenario 3: the same train but the pulse bridging second 59 into the
/// next minute is 800 ms long, so the tick detector classifies it as a
/// minute marker instead of a tick.
#[test]
fn marker_length_pulse_is_classified_as_tick_marker_not_a_tick() {
    let config = TickDetectorConfig {
        gate_end_ms: 1000.0,
        ..TickDetectorConfig::default()
    };
    let sample_rate = config.sample_rate_hz;
    let freq = config.station.tick_freq_hz();
    let mut det = TickDetector::new(config.clone()).unwrap();
    let mut sink = CollectingSink::default();

    let warmup_samples = config.fft_size * (config.warmup_frames as usize + 2);
    for _ in 0..warmup_samples {
        det.process_sample(0.0, 0.0, &mut sink, None).unwrap();
    }
    sink.ticks.clear();
    sink.tick_markers.clear();

    let on_samples = (0.005 * sample_rate) as usize;
    let off_samples = (0.995 * sample_rate) as usize;
    let marker_on_samples = (0.8 * sample_rate) as usize;
    let marker_off_samples = (0.2 * sample_rate) as usize;
    let mut sample_clock = 0u64;

    for _ in 0..5 {
        feed_tone(&mut det, &mut sink, freq, sample_rate, on_samples, sample_clock);
        sample_clock += on_samples as u64;
        for _ in 0..off_samples {
            det.process_sample(0.0, 0.0, &mut sink, None).unwrap();
        }
        sample_clock += off_samples as u64;
    }

    let ticks_before_marker = det.ticks_detected();

    feed_tone(&mut det, &mut sink, freq, sample_rate, marker_on_samples, sample_clock);
    sample_clock += marker_on_samples as u64;
    for _ in 0..marker_off_samples {
        det.process_sample(0.0, 0.0, &mut sink, None).unwrap();
    }

    assert_eq!(det.markers_detected(), 1);
    assert_eq!(sink.tick_markers.len(), 1);
    let marker = sink.tick_markers[0];
    assert!((marker.duration_ms - 800.0).abs() <= 20.0);
    assert_eq!(det.ticks_detected(), ticks_before_marker, "a marker pulse must not also count as a tick");
}

/// Locks a sync detector on two 60 s-apart markers and returns it alongside
/// a BCD symbol correlator already anchored to the second (most recent)
/// marker, the way `Pipeline::handle_marker` only publishes the anchor
/// once `sync.is_locked()`.
fn locked_sync_and_anchored_correlator() -> (SyncDetector, wwv_core::BcdSymbolCorrelator) {
    let mut sync = SyncDetector::new(SyncDetectorConfig::default());
    sync.on_marker(0.0);
    sync.on_marker(60_000.0);
    assert!(sync.is_locked());

    let mut corr = wwv_core::BcdSymbolCorrelator::new(BcdSymbolCorrelatorConfig::default());
    corr.set_minute_anchor(sync.last_marker_ms().unwrap());
    (sync, corr)
}

/// Scenario 4: a time-event and a freq-event agreeing on a 500 ms pulse at
/// second 5 classify to binary '1' with full confidence, once the sync
/// detector has actually locked and published the anchor (rather than a
/// bare literal anchor value).
#[test]
fn locked_sync_and_agreeing_pulses_classify_binary_one() {
    let (_sync, mut corr) = locked_sync_and_anchored_correlator();

    let time_event = BcdTimeEvent {
        timestamp_ms: 65_010.0,
        duration_ms: 500.0,
        peak_energy: 0.5,
        noise_floor: 0.01,
        snr_db: 15.0,
    };
    let freq_event = BcdFreqEvent {
        timestamp_ms: 65_020.0,
        duration_ms: 500.0,
        accumulated_energy: 0.5,
        baseline_energy: 0.01,
        snr_db: 15.0,
    };
    assert!(corr.ingest_time_event(&time_event).is_none());
    assert!(corr.ingest_freq_event(&freq_event).is_none());

    let closing = BcdTimeEvent {
        timestamp_ms: 66_010.0,
        duration_ms: 500.0,
        peak_energy: 0.5,
        noise_floor: 0.01,
        snr_db: 15.0,
    };
    let closed = corr.ingest_time_event(&closing).unwrap();

    assert_eq!(closed.second, 5);
    assert_eq!(closed.symbol, BcdSymbol::One);
    assert_eq!(closed.source, BcdSource::Both);
    assert_eq!(closed.confidence, 1.0);
}

/// Scenario 5: an 800 ms pulse at second 9 (a valid P position) classifies
/// as a position marker.
#[test]
fn pulse_at_valid_p_position_classifies_as_marker() {
    let (_sync, mut corr) = locked_sync_and_anchored_correlator();

    let time_event = BcdTimeEvent {
        timestamp_ms: 69_005.0,
        duration_ms: 800.0,
        peak_energy: 0.5,
        noise_floor: 0.01,
        snr_db: 15.0,
    };
    let freq_event = BcdFreqEvent {
        timestamp_ms: 69_015.0,
        duration_ms: 800.0,
        accumulated_energy: 0.5,
        baseline_energy: 0.01,
        snr_db: 15.0,
    };
    assert!(corr.ingest_time_event(&time_event).is_none());
    assert!(corr.ingest_freq_event(&freq_event).is_none());

    let closing = BcdTimeEvent {
        timestamp_ms: 70_010.0,
        duration_ms: 500.0,
        peak_energy: 0.5,
        noise_floor: 0.01,
        snr_db: 15.0,
    };
    let closed = corr.ingest_time_event(&closing).unwrap();

    assert_eq!(closed.second, 9);
    assert_eq!(closed.symbol, BcdSymbol::Marker);
}

/// Scenario 6: the identical 800 ms pulse at second 7 (not a valid P
/// position) downgrades to a binary '1' instead.
#[test]
fn pulse_at_invalid_p_position_downgrades_to_one() {
    let (_sync, mut corr) = locked_sync_and_anchored_correlator();

    let time_event = BcdTimeEvent {
        timestamp_ms: 67_005.0,
        duration_ms: 800.0,
        peak_energy: 0.5,
        noise_floor: 0.01,
        snr_db: 15.0,
    };
    let freq_event = BcdFreqEvent {
        timestamp_ms: 67_015.0,
        duration_ms: 800.0,
        accumulated_energy: 0.5,
        baseline_energy: 0.01,
        snr_db: 15.0,
    };
    assert!(corr.ingest_time_event(&time_event).is_none());
    assert!(corr.ingest_freq_event(&freq_event).is_none());

    let closing = BcdTimeEvent {
        timestamp_ms: 68_010.0,
        duration_ms: 500.0,
        peak_energy: 0.5,
        noise_floor: 0.01,
        snr_db: 15.0,
    };
    let closed = corr.ingest_time_event(&closing).unwrap();

    assert_eq!(closed.second, 7);
    assert_eq!(closed.symbol, BcdSymbol::One);
}
