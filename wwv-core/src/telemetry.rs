//! Bit-exact CSV line formatters for the six telemetry streams (Section 6).
//!
//! Pure string formatting, no I/O: `wwv-core` never opens a file or socket.
//! The orchestrator (`wwv-cli`) supplies the wall-clock "time" string and
//! whatever call-site context (expected tick/marker number, WWV second,
//! BCD window bookkeeping) these formatters need, then owns where the line
//! is written — a CSV file, a UDP datagram, or nowhere at all.

use crate::events::{
    BcdFreqEvent, BcdSource, BcdSymbol, BcdSymbolEvent, BcdTimeEvent, MarkerEvent, TickEvent,
    ToneMeasurement,
};

pub const TICK_CSV_HEADER: &str =
    "time,timestamp_ms,tick_num,expected,energy_peak,duration_ms,interval_ms,avg_interval_ms,noise_floor,corr_peak,corr_ratio";
pub const MARKER_CSV_HEADER: &str =
    "time,timestamp_ms,marker_num,wwv_sec,expected,accum_energy,duration_ms,since_last_sec,baseline,threshold";
pub const BCD_TIME_CSV_HEADER: &str =
    "time,timestamp_ms,pulse_num,peak_energy,duration_ms,noise_floor,snr_db";
pub const BCD_FREQ_CSV_HEADER: &str =
    "time,timestamp_ms,pulse_num,accum_energy,duration_ms,baseline,snr_db";
pub const BCD_SYMBOL_CSV_HEADER: &str = "time,timestamp_ms,symbol_num,second,symbol,source,duration_ms,confidence,interval_sec,time_events,freq_events,time_energy,freq_energy,state";
pub const TONE_CSV_HEADER: &str = "time,timestamp_ms,measured_hz,offset_hz,offset_ppm,snr_db,valid";

pub fn tick_csv_line(time: &str, event: &TickEvent, expected: u64) -> String {
    format!(
        "{},{:.3},{},{},{:.6},{:.3},{:.3},{:.3},{:.6},{:.6},{:.3}",
        time,
        event.timestamp_ms,
        event.number,
        expected,
        event.peak_energy,
        event.duration_ms,
        event.interval_ms,
        event.avg_interval_ms,
        event.noise_floor,
        event.corr_peak,
        event.corr_ratio,
    )
}

pub fn marker_csv_line(
    time: &str,
    event: &MarkerEvent,
    wwv_sec: u32,
    expected: u64,
    baseline: f32,
    threshold: f32,
) -> String {
    format!(
        "{},{:.3},{},{},{},{:.6},{:.3},{:.3},{:.6},{:.6}",
        time,
        event.timestamp_ms,
        event.number,
        wwv_sec,
        expected,
        event.accumulated_energy,
        event.duration_ms,
        event.since_last_marker_sec,
        baseline,
        threshold,
    )
}

pub fn bcd_time_csv_line(time: &str, pulse_num: u64, event: &BcdTimeEvent) -> String {
    format!(
        "{},{:.3},{},{:.6},{:.3},{:.6},{:.3}",
        time,
        event.timestamp_ms,
        pulse_num,
        event.peak_energy,
        event.duration_ms,
        event.noise_floor,
        event.snr_db,
    )
}

pub fn bcd_freq_csv_line(time: &str, pulse_num: u64, event: &BcdFreqEvent) -> String {
    format!(
        "{},{:.3},{},{:.6},{:.3},{:.6},{:.3}",
        time,
        event.timestamp_ms,
        pulse_num,
        event.accumulated_energy,
        event.duration_ms,
        event.baseline_energy,
        event.snr_db,
    )
}

fn symbol_char(symbol: BcdSymbol) -> char {
    match symbol {
        BcdSymbol::None => '-',
        BcdSymbol::Zero => '0',
        BcdSymbol::One => '1',
        BcdSymbol::Marker => 'P',
    }
}

fn source_str(source: BcdSource) -> &'static str {
    match source {
        BcdSource::None => "NONE",
        BcdSource::Time => "TIME",
        BcdSource::Freq => "FREQ",
        BcdSource::Both => "BOTH",
    }
}

#[allow(clippy::too_many_arguments)]
pub fn bcd_symbol_csv_line(
    time: &str,
    symbol_num: u64,
    second: i32,
    event: &BcdSymbolEvent,
    interval_sec: f32,
    time_events: u32,
    freq_events: u32,
    time_energy: f32,
    freq_energy: f32,
    state: &str,
) -> String {
    format!(
        "{},{:.3},{},{},{},{},{:.3},{:.3},{:.3},{},{},{:.6},{:.6},{}",
        time,
        event.timestamp_ms,
        symbol_num,
        second,
        symbol_char(event.symbol),
        source_str(event.source),
        event.duration_ms,
        event.confidence,
        interval_sec,
        time_events,
        freq_events,
        time_energy,
        freq_energy,
        state,
    )
}

pub fn tone_csv_line(time: &str, timestamp_ms: f64, event: &ToneMeasurement) -> String {
    format!(
        "{},{:.3},{:.4},{:.4},{:.2},{:.3},{}",
        time,
        timestamp_ms,
        event.measured_hz,
        event.offset_hz,
        event.offset_ppm,
        event.snr_db,
        event.valid,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_line_has_eleven_comma_separated_fields() {
        let event = TickEvent {
            number: 1,
            timestamp_ms: 1000.0,
            interval_ms: 1000.0,
            duration_ms: 5.0,
            peak_energy: 0.5,
            avg_interval_ms: 1000.0,
            noise_floor: 0.01,
            corr_peak: 0.2,
            corr_ratio: 20.0,
        };
        let line = tick_csv_line("2026-01-01T00:00:01Z", &event, 1);
        assert_eq!(line.split(',').count(), TICK_CSV_HEADER.split(',').count());
    }

    #[test]
    fn bcd_symbol_line_uses_dash_for_none_and_p_for_marker() {
        let base = BcdSymbolEvent {
            symbol: BcdSymbol::None,
            timestamp_ms: 500.0,
            duration_ms: 50.0,
            confidence: 0.0,
            source: BcdSource::None,
        };
        let none_line = bcd_symbol_csv_line("t", 1, 0, &base, 0.0, 0, 0, 0.0, 0.0, "ACQUIRING");
        assert!(none_line.contains(",-,"));

        let marker = BcdSymbolEvent {
            symbol: BcdSymbol::Marker,
            ..base
        };
        let marker_line = bcd_symbol_csv_line("t", 2, 9, &marker, 1.0, 2, 2, 0.1, 0.1, "TRACKING");
        assert!(marker_line.contains(",P,"));
    }
}
