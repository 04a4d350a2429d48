//! Synthetic I/Q signal generator for demos and smoke tests.
//!
//! Produces a baseband complex stream carrying a continuous tick train,
//! once-a-minute marker, a repeating BCD subcarrier pulse, and a 500 Hz
//! reference tone, plus additive Gaussian noise at the requested SNR. It
//! is not a faithful WWV time-code encoder (no real minute payload is
//! assembled) — good enough to drive every detector's state machine end
//! to end without a recorded WAV file on hand.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::f32::consts::PI;

use wwv_core::Station;

use crate::config::SyntheticConfig;

pub fn generate(config: &SyntheticConfig, station: Station) -> Vec<(f32, f32)> {
    let sample_rate = config.sample_rate_hz;
    let total_samples = (config.duration_secs * sample_rate as f64) as usize;
    let tick_hz = station.tick_freq_hz();

    let signal_amplitude = 1.0_f32;
    let noise_std = signal_amplitude / 10f32.powf(config.snr_db / 20.0);

    let mut rng = StdRng::seed_from_u64(0x5757_5648);
    let mut samples = Vec::with_capacity(total_samples);

    for n in 0..total_samples {
        let t = n as f32 / sample_rate;
        let second_frac = t.rem_euclid(1.0);
        let minute_frac = t.rem_euclid(60.0);

        let mut i = 0.0_f32;
        let mut q = 0.0_f32;

        let is_marker_second = minute_frac < 0.001;
        if is_marker_second {
            if second_frac < 0.8 {
                let (c, s) = tone(tick_hz, t);
                i += 0.8 * c;
                q += 0.8 * s;
            }
        } else if second_frac < 0.005 {
            let (c, s) = tone(tick_hz, t);
            i += c;
            q += s;
        }

        // Repeating 200 ms BCD subcarrier pulse at the top of each second.
        if second_frac < 0.2 {
            let (c, s) = tone(100.0, t);
            i += 0.5 * c;
            q += 0.5 * s;
        }

        // Continuous 500 Hz reference tone, low amplitude.
        let (c, s) = tone(500.0, t);
        i += 0.2 * c;
        q += 0.2 * s;

        i += rng.sample::<f32, _>(StandardNormal) * noise_std;
        q += rng.sample::<f32, _>(StandardNormal) * noise_std;

        samples.push((i, q));
    }

    samples
}

fn tone(freq_hz: f32, t: f32) -> (f32, f32) {
    let phase = 2.0 * PI * freq_hz * t;
    (phase.cos(), phase.sin())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_requested_sample_count() {
        let config = SyntheticConfig {
            duration_secs: 1.0,
            sample_rate_hz: 1000.0,
            snr_db: 20.0,
        };
        let samples = generate(&config, Station::Wwv);
        assert_eq!(samples.len(), 1000);
    }
}
