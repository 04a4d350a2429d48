//! Matched-filter correlator (component B).
//!
//! A sample-rate circular buffer of the most recent `template_len` I/Q
//! samples, correlated against a Hann-windowed complex template (cosine on
//! I, sine on Q) at the tick target frequency. The tick detector calls
//! `push_sample` on every sample and `correlate` only every
//! `CORR_DECIMATION` samples.

use crate::errors::DspError;

pub struct MatchedFilterCorrelator {
    template_i: Vec<f32>,
    template_q: Vec<f32>,
    ring_i: Vec<f32>,
    ring_q: Vec<f32>,
    write_pos: usize,
    filled: usize,
}

impl MatchedFilterCorrelator {
    pub fn new(template_len: usize, target_hz: f32, sample_rate: f32) -> Result<Self, DspError> {
        if template_len == 0 {
            return Err(DspError::InvalidFftSize { size: template_len });
        }
        if !(sample_rate > 0.0) {
            return Err(DspError::InvalidSampleRate { rate: sample_rate });
        }

        let mut template_i = Vec::with_capacity(template_len);
        let mut template_q = Vec::with_capacity(template_len);
        for n in 0..template_len {
            let window = if template_len > 1 {
                let x = std::f32::consts::PI * 2.0 * n as f32 / (template_len - 1) as f32;
                0.5 * (1.0 - x.cos())
            } else {
                1.0
            };
            let phase = 2.0 * std::f32::consts::PI * target_hz * n as f32 / sample_rate;
            template_i.push(window * phase.cos());
            template_q.push(window * phase.sin());
        }

        Ok(Self {
            template_i,
            template_q,
            ring_i: vec![0.0; template_len],
            ring_q: vec![0.0; template_len],
            write_pos: 0,
            filled: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.ring_i.len()
    }

    /// Write one sample into the ring, overwriting the oldest entry.
    pub fn push_sample(&mut self, i: f32, q: f32) {
        self.ring_i[self.write_pos] = i;
        self.ring_q[self.write_pos] = q;
        self.write_pos = (self.write_pos + 1) % self.ring_i.len();
        self.filled = (self.filled + 1).min(self.ring_i.len());
    }

    /// Magnitude of the complex inner product of the ring (oldest-to-newest)
    /// against the template.
    pub fn correlate(&self) -> f32 {
        let n = self.ring_i.len();
        let mut sum_i = 0.0f32;
        let mut sum_q = 0.0f32;
        // Oldest sample is at `write_pos` (next slot to be overwritten).
        for k in 0..n {
            let idx = (self.write_pos + k) % n;
            let si = self.ring_i[idx];
            let sq = self.ring_q[idx];
            let ti = self.template_i[k];
            let tq = self.template_q[k];
            // Complex inner product: (si + j*sq) * conj(ti + j*tq)
            sum_i += si * ti + sq * tq;
            sum_q += sq * ti - si * tq;
        }
        (sum_i * sum_i + sum_q * sum_q).sqrt()
    }

    pub fn is_full(&self) -> bool {
        self.filled >= self.ring_i.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matched_tone_correlates_higher_than_silence() {
        let sample_rate = 50_000.0f32;
        let target_hz = 1000.0f32;
        let len = 500;
        let mut corr = MatchedFilterCorrelator::new(len, target_hz, sample_rate).unwrap();

        for n in 0..len {
            let phase = 2.0 * std::f32::consts::PI * target_hz * n as f32 / sample_rate;
            corr.push_sample(phase.cos(), phase.sin());
        }
        let tone_peak = corr.correlate();

        let mut silent = MatchedFilterCorrelator::new(len, target_hz, sample_rate).unwrap();
        for _ in 0..len {
            silent.push_sample(0.0, 0.0);
        }
        let silence_peak = silent.correlate();

        assert!(tone_peak > silence_peak * 10.0);
    }

    #[test]
    fn rejects_zero_length() {
        assert!(MatchedFilterCorrelator::new(0, 1000.0, 50_000.0).is_err());
    }

    #[test]
    fn ring_wraps_without_panicking() {
        let mut corr = MatchedFilterCorrelator::new(4, 1000.0, 50_000.0).unwrap();
        for n in 0..20 {
            corr.push_sample(n as f32, -(n as f32));
        }
        assert!(corr.is_full());
        let _ = corr.correlate();
    }
}
