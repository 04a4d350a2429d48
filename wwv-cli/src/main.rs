mod config;
mod logging;
mod synth;
mod telemetry;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::Parser;
use color_eyre::eyre::{eyre, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use config::{CliConfig, OutputConfig};
use logging::{LogEvent, StatisticsEvent, StructuredLogger};
use telemetry::TelemetryAggregator;

use wwv_core::correlation::ClassifiedSymbol;
use wwv_core::{
    BcdFreqDetector, BcdFreqEvent, BcdSymbolCorrelator, BcdSymbolEvent, BcdTimeDetector,
    BcdTimeEvent, EpochSource, MarkerDetector, MarkerEvent, SharedNoiseFloor, SignalLogger,
    SyncDetector, TickCorrelator, TickDetector, TickEvent, TickMarkerEvent, ToneMeasurement,
    ToneTracker,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "WWV/WWVH time-signal decoder", long_about = None)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<String>,

    /// Enable verbose diagnostic output.
    #[arg(short, long)]
    verbose: bool,

    /// WAV file to decode (overrides config's input.wav_path).
    #[arg(short = 'i', long)]
    input: Option<PathBuf>,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();

    let mut config = match &args.config {
        Some(path) => CliConfig::from_file(path)
            .wrap_err_with(|| format!("Failed to load config from {}", path))?,
        None => CliConfig::default(),
    };

    if let Some(input_path) = args.input {
        config.input.wav_path = Some(input_path);
    }

    let mut logger = StructuredLogger::new(config.terminal.logging.clone())?;

    let samples = load_samples(&config).wrap_err("Failed to load or synthesize input samples")?;

    logger.log(LogEvent::Info {
        message: format!("Loaded {} I/Q samples", samples.len()),
    })?;

    let progress = if config.terminal.progress_bar {
        let bar = ProgressBar::new(samples.len() as u64);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{wide_bar}] {pos}/{len} samples",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Some(bar)
    } else {
        None
    };

    let sample_rate = config.detectors.tick.sample_rate_hz;
    let mut pipeline = Pipeline::new(&config, Utc::now())?;

    for (n, &(i, q)) in samples.iter().enumerate() {
        let timestamp_ms = n as f64 * 1000.0 / sample_rate as f64;
        pipeline.process_one(i, q, timestamp_ms)?;

        if let Some(event) = pipeline.telemetry.sample() {
            logger.log(LogEvent::Telemetry(event))?;
        }

        if let Some(bar) = &progress {
            bar.inc(1);
        }
    }

    if let Some(bar) = progress {
        bar.finish_with_message("done");
    }

    pipeline.flush_writers()?;

    let (noise_floor_stats, tick_jitter_stats) = pipeline.telemetry.compute_statistics();
    let stats_event = StatisticsEvent {
        timestamp: Utc::now(),
        duration_secs: logger.elapsed(),
        noise_floor: noise_floor_stats,
        tick_jitter_ms: tick_jitter_stats,
        total_ticks: pipeline.telemetry.total_ticks(),
        total_markers: pipeline.telemetry.total_markers(),
        total_bcd_symbols: pipeline.telemetry.total_bcd_symbols(),
    };
    logger.log(LogEvent::Statistics(stats_event))?;

    if args.verbose {
        logger.log(LogEvent::Info {
            message: format!(
                "sync state: {:?} (confidence {:.2})",
                pipeline.sync.state(),
                pipeline.sync.confidence()
            ),
        })?;
    }

    Ok(())
}

fn load_samples(config: &CliConfig) -> Result<Vec<(f32, f32)>> {
    if let Some(wav_path) = &config.input.wav_path {
        return read_wav(wav_path);
    }

    if let Some(synthetic) = &config.input.synthetic {
        return Ok(synth::generate(synthetic, config.station));
    }

    Err(eyre!(
        "no input configured: set input.wav_path or input.synthetic in the config"
    ))
}

/// Reads I/Q samples from a WAV file. Stereo files are treated as
/// interleaved (I, Q) channels; mono files are treated as a real-valued
/// I stream with Q = 0.
fn read_wav(path: &PathBuf) -> Result<Vec<(f32, f32)>> {
    let mut reader =
        hound::WavReader::open(path).wrap_err_with(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .wrap_err("reading float WAV samples")?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<Vec<_>, _>>()
                .wrap_err("reading integer WAV samples")?
        }
    };

    let iq = match spec.channels {
        1 => samples.into_iter().map(|i| (i, 0.0)).collect(),
        2 => samples
            .chunks_exact(2)
            .map(|pair| (pair[0], pair[1]))
            .collect(),
        n => {
            return Err(eyre!(
                "unsupported channel count {n}: expected mono (I only) or stereo (I/Q)"
            ))
        }
    };

    Ok(iq)
}

/// Owns every detector/correlator and wires the feedback graph described
/// in the spec's data-flow section: the tick correlator's epoch feeds
/// back into the tick detector's timing gate; sync cadence (from
/// tick-markers or marker-detector markers) publishes the BCD symbol
/// correlator's minute anchor. All five detectors are driven from the
/// same sample stream — there is only one I/Q source available here, so
/// the "display-rate" feed the spec carves out for the tone tracker
/// collapses onto the same detection-rate stream as the others.
struct Pipeline {
    tick: TickDetector,
    marker: MarkerDetector,
    bcd_time: BcdTimeDetector,
    bcd_freq: BcdFreqDetector,
    tone: ToneTracker,

    tick_correlator: TickCorrelator,
    bcd_correlator: BcdSymbolCorrelator,
    sync: SyncDetector,

    #[allow(dead_code)]
    shared_noise_floor: SharedNoiseFloor,
    logger: SignalLogger,
    telemetry: TelemetryAggregator,

    wall_clock_seed: DateTime<Utc>,
    writers: Writers,

    tick_num: u64,
    marker_num: u64,
    bcd_time_num: u64,
    bcd_freq_num: u64,
    symbol_num: u64,

    minute_anchor_ms: Option<f64>,
    last_symbol_window_ms: Option<f64>,
}

struct Writers {
    tick: Option<BufWriter<File>>,
    marker: Option<BufWriter<File>>,
    bcd_time: Option<BufWriter<File>>,
    bcd_freq: Option<BufWriter<File>>,
    bcd_symbol: Option<BufWriter<File>>,
    tone: Option<BufWriter<File>>,
}

impl Writers {
    fn new(output: &OutputConfig) -> Result<Self> {
        Ok(Self {
            tick: open_with_header(&output.tick_csv, wwv_core::telemetry::TICK_CSV_HEADER)?,
            marker: open_with_header(&output.marker_csv, wwv_core::telemetry::MARKER_CSV_HEADER)?,
            bcd_time: open_with_header(
                &output.bcd_time_csv,
                wwv_core::telemetry::BCD_TIME_CSV_HEADER,
            )?,
            bcd_freq: open_with_header(
                &output.bcd_freq_csv,
                wwv_core::telemetry::BCD_FREQ_CSV_HEADER,
            )?,
            bcd_symbol: open_with_header(
                &output.bcd_symbol_csv,
                wwv_core::telemetry::BCD_SYMBOL_CSV_HEADER,
            )?,
            tone: open_with_header(&output.tone_csv, wwv_core::telemetry::TONE_CSV_HEADER)?,
        })
    }

    fn flush(&mut self) -> Result<()> {
        for w in [
            &mut self.tick,
            &mut self.marker,
            &mut self.bcd_time,
            &mut self.bcd_freq,
            &mut self.bcd_symbol,
            &mut self.tone,
        ] {
            if let Some(w) = w {
                w.flush()?;
            }
        }
        Ok(())
    }
}

fn open_with_header(path: &Option<PathBuf>, header: &str) -> Result<Option<BufWriter<File>>> {
    match path {
        None => Ok(None),
        Some(path) => {
            let mut w = BufWriter::new(
                File::create(path).wrap_err_with(|| format!("creating {}", path.display()))?,
            );
            writeln!(w, "{}", header)?;
            Ok(Some(w))
        }
    }
}

impl Pipeline {
    fn new(config: &CliConfig, wall_clock_seed: DateTime<Utc>) -> Result<Self> {
        let shared_noise_floor = SharedNoiseFloor::default();

        let tick = TickDetector::new(config.detectors.tick.clone())?;
        let marker = MarkerDetector::with_shared_noise_floor(
            config.detectors.marker.clone(),
            config.station,
            Some(shared_noise_floor.clone()),
        )?;
        let bcd_time = BcdTimeDetector::new(config.detectors.bcd_time.clone())?;
        let bcd_freq = BcdFreqDetector::new(config.detectors.bcd_freq.clone())?;
        let tone = ToneTracker::with_shared_noise_floor(
            config.detectors.tone.clone(),
            Some(shared_noise_floor.clone()),
        )?;

        let tick_correlator = TickCorrelator::new(config.detectors.tick_correlator.clone());
        let bcd_correlator = BcdSymbolCorrelator::new(config.detectors.bcd_correlator.clone());
        let sync = SyncDetector::new(config.detectors.sync.clone());

        Ok(Self {
            tick,
            marker,
            bcd_time,
            bcd_freq,
            tone,
            tick_correlator,
            bcd_correlator,
            sync,
            shared_noise_floor,
            logger: SignalLogger::new(config.terminal.logging.to_core_log_config()),
            telemetry: TelemetryAggregator::new(config.terminal.telemetry_interval_secs),
            wall_clock_seed,
            writers: Writers::new(&config.output)?,
            tick_num: 0,
            marker_num: 0,
            bcd_time_num: 0,
            bcd_freq_num: 0,
            symbol_num: 0,
            minute_anchor_ms: None,
            last_symbol_window_ms: None,
        })
    }

    fn wall_clock_at(&self, timestamp_ms: f64) -> DateTime<Utc> {
        self.wall_clock_seed + chrono::Duration::milliseconds(timestamp_ms.round() as i64)
    }

    /// Second-of-minute relative to the last published minute anchor, or 0
    /// before any anchor has been established.
    fn wwv_second(&self, timestamp_ms: f64) -> u32 {
        match self.minute_anchor_ms {
            Some(anchor) if timestamp_ms >= anchor => {
                (((timestamp_ms - anchor) / 1000.0).floor() as i64).rem_euclid(60) as u32
            }
            _ => 0,
        }
    }

    fn process_one(&mut self, i: f32, q: f32, timestamp_ms: f64) -> Result<()> {
        let mut ticks = wwv_core::CollectingSink::default();
        self.tick
            .process_sample(i, q, &mut ticks, Some(&mut self.logger))?;
        for event in &ticks.ticks {
            self.handle_tick(*event)?;
        }
        for event in &ticks.tick_markers {
            self.handle_tick_marker(*event)?;
        }

        let mut markers = wwv_core::CollectingSink::default();
        self.marker
            .process_sample(i, q, &mut markers, Some(&mut self.logger))?;
        for event in &markers.markers {
            self.handle_marker(*event)?;
        }

        let mut bcd_time = wwv_core::CollectingSink::default();
        self.bcd_time
            .process_sample(i, q, &mut bcd_time, Some(&mut self.logger))?;
        for event in &bcd_time.bcd_time {
            self.handle_bcd_time(*event)?;
        }

        let mut bcd_freq = wwv_core::CollectingSink::default();
        self.bcd_freq
            .process_sample(i, q, &mut bcd_freq, Some(&mut self.logger))?;
        for event in &bcd_freq.bcd_freq {
            self.handle_bcd_freq(*event)?;
        }

        let mut tones = wwv_core::CollectingSink::default();
        self.tone
            .process_sample(i, q, &mut tones, Some(&mut self.logger))?;
        for event in &tones.tones {
            self.handle_tone(*event, timestamp_ms)?;
        }

        self.telemetry
            .record_sync(self.sync.is_locked(), self.sync.confidence());

        Ok(())
    }

    fn handle_tick(&mut self, event: TickEvent) -> Result<()> {
        self.telemetry
            .record_tick(event.noise_floor, event.interval_ms, event.avg_interval_ms);
        self.tick_correlator.ingest_tick(event.timestamp_ms);
        if let Some(epoch) = self.tick_correlator.take_epoch() {
            self.tick
                .set_epoch(epoch.epoch_ms as f32, EpochSource::TickChain, epoch.confidence);
        }
        self.sync.on_tick_without_marker(event.timestamp_ms);

        self.tick_num += 1;
        if let Some(w) = &mut self.writers.tick {
            let time = self.wall_clock_at(event.timestamp_ms).to_rfc3339();
            let expected = (event.timestamp_ms / 1000.0).round() as u64;
            writeln!(w, "{}", wwv_core::telemetry::tick_csv_line(&time, &event, expected))?;
        }
        Ok(())
    }

    fn handle_tick_marker(&mut self, event: TickMarkerEvent) -> Result<()> {
        self.logger.info(
            "TICK_CORR",
            &format!(
                "tick detector classified a minute marker at {:.1} ms",
                event.start_timestamp_ms
            ),
        );
        self.sync.on_marker(event.start_timestamp_ms);
        if self.sync.is_locked() {
            self.minute_anchor_ms = Some(event.start_timestamp_ms);
            self.bcd_correlator.set_minute_anchor(event.start_timestamp_ms);
        }
        Ok(())
    }

    fn handle_marker(&mut self, event: MarkerEvent) -> Result<()> {
        self.telemetry.record_marker();
        self.sync.on_marker(event.timestamp_ms);
        if self.sync.is_locked() {
            self.minute_anchor_ms = Some(event.timestamp_ms);
            self.bcd_correlator.set_minute_anchor(event.timestamp_ms);
        }

        self.marker_num += 1;
        if let Some(w) = &mut self.writers.marker {
            let time = self.wall_clock_at(event.timestamp_ms).to_rfc3339();
            let wwv_sec = self.wwv_second(event.timestamp_ms);
            let expected = self.marker_num;
            let baseline = self.marker.baseline_energy();
            // Mirrors the multiplier `MarkerDetector` applies internally;
            // not otherwise exposed, so recomputed here for the CSV column.
            let threshold = baseline * 3.0;
            writeln!(
                w,
                "{}",
                wwv_core::telemetry::marker_csv_line(
                    &time, &event, wwv_sec, expected, baseline, threshold
                )
            )?;
        }
        Ok(())
    }

    fn handle_bcd_time(&mut self, event: BcdTimeEvent) -> Result<()> {
        self.bcd_time_num += 1;
        if let Some(w) = &mut self.writers.bcd_time {
            let time = self.wall_clock_at(event.timestamp_ms).to_rfc3339();
            writeln!(
                w,
                "{}",
                wwv_core::telemetry::bcd_time_csv_line(&time, self.bcd_time_num, &event)
            )?;
        }

        if self.sync.is_locked() {
            if let Some(symbol) = self.bcd_correlator.ingest_time_event(&event) {
                self.handle_classified_symbol(symbol)?;
            }
        }
        Ok(())
    }

    fn handle_bcd_freq(&mut self, event: BcdFreqEvent) -> Result<()> {
        self.bcd_freq_num += 1;
        if let Some(w) = &mut self.writers.bcd_freq {
            let time = self.wall_clock_at(event.timestamp_ms).to_rfc3339();
            writeln!(
                w,
                "{}",
                wwv_core::telemetry::bcd_freq_csv_line(&time, self.bcd_freq_num, &event)
            )?;
        }

        if self.sync.is_locked() {
            if let Some(symbol) = self.bcd_correlator.ingest_freq_event(&event) {
                self.handle_classified_symbol(symbol)?;
            }
        }
        Ok(())
    }

    fn handle_classified_symbol(&mut self, symbol: ClassifiedSymbol) -> Result<()> {
        self.telemetry.record_bcd_symbol();
        self.symbol_num += 1;

        let event = BcdSymbolEvent {
            symbol: symbol.symbol,
            timestamp_ms: symbol.window_start_ms + 500.0,
            duration_ms: symbol.duration_ms,
            confidence: symbol.confidence,
            source: symbol.source,
        };

        if let Some(w) = &mut self.writers.bcd_symbol {
            let time = self.wall_clock_at(event.timestamp_ms).to_rfc3339();
            let interval_sec = match self.last_symbol_window_ms {
                Some(last) => ((symbol.window_start_ms - last) / 1000.0) as f32,
                None => 0.0,
            };
            self.last_symbol_window_ms = Some(symbol.window_start_ms);

            let state = match self.bcd_correlator.tracking_state() {
                wwv_core::correlation::TrackingState::Acquiring => "ACQUIRING",
                wwv_core::correlation::TrackingState::Tentative => "TENTATIVE",
                wwv_core::correlation::TrackingState::Tracking => "TRACKING",
            };
            writeln!(
                w,
                "{}",
                wwv_core::telemetry::bcd_symbol_csv_line(
                    &time,
                    self.symbol_num,
                    symbol.second,
                    &event,
                    interval_sec,
                    symbol.time_event_count,
                    symbol.freq_event_count,
                    symbol.time_energy,
                    symbol.freq_energy,
                    state,
                )
            )?;
        }

        Ok(())
    }

    fn handle_tone(&mut self, event: ToneMeasurement, timestamp_ms: f64) -> Result<()> {
        if let Some(w) = &mut self.writers.tone {
            let time = self.wall_clock_at(timestamp_ms).to_rfc3339();
            writeln!(w, "{}", wwv_core::telemetry::tone_csv_line(&time, timestamp_ms, &event))?;
        }
        Ok(())
    }

    fn flush_writers(&mut self) -> Result<()> {
        self.writers.flush()
    }
}
