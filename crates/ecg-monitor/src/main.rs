//! ECG Monitor - live heart-rate estimation from a serial-style sample stream

mod monitor;
mod playback;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use ecg_processing::{analyze_record, PipelineConfig};
use ecg_simulation::{start_ecg_stream, EcgConfig, HeartRhythm, NoiseConfig, StreamCommand, StreamConfig};
use monitor::{log_estimates, MonitorCommand, MonitorService};
use playback::{PlaybackSelector, Playlist};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Source {
    /// Synthetic ECG from the built-in simulator
    Simulate,
    /// One sample per line on standard input
    Stdin,
}

#[derive(Parser, Debug)]
#[command(name = "ecg-monitor", about = "Heart-rate monitor for line-oriented ECG samples")]
struct Args {
    /// Pipeline configuration (JSON); defaults to the streaming profile
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where samples come from
    #[arg(long, value_enum, default_value_t = Source::Simulate)]
    source: Source,

    /// Sampling rate used when no configuration file is given
    #[arg(long, default_value_t = 100.0)]
    sampling_rate: f64,

    /// Heart rate of the simulated source
    #[arg(long, default_value_t = 72.0)]
    simulate_bpm: f64,

    /// Probability of a malformed line from the simulated source
    #[arg(long, default_value_t = 0.0)]
    garbage_prob: f64,

    /// Seed for the simulated source
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many seconds
    #[arg(long)]
    duration: Option<f64>,

    /// Analyze a whole recording (one sample per line) and exit
    #[arg(long)]
    record: Option<PathBuf>,

    /// Playlist (JSON with `low`, `normal` and `high` track paths)
    #[arg(long)]
    playlist: Option<PathBuf>,

    /// Period of scheduled runs when `auto_run` is off
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    if args.print_config {
        println!("{}", config.to_json()?);
        return Ok(());
    }

    if let Some(record) = &args.record {
        return analyze_file(config, record);
    }

    let playlist = match &args.playlist {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading playlist {}", path.display()))?;
            serde_json::from_str::<Playlist>(&json)
                .with_context(|| format!("parsing playlist {}", path.display()))?
        }
        None => Playlist::default(),
    };

    let (line_sender, line_receiver) = mpsc::channel(1024);
    let mut service = MonitorService::new(config.clone(), line_receiver, Duration::from_millis(args.poll_ms))?;
    service.register_consumer(PlaybackSelector::new(playlist));
    tokio::spawn(log_estimates(service.subscribe()));

    match args.source {
        Source::Stdin => {
            info!("Reading samples from stdin");
            tokio::spawn(forward_stdin(line_sender));
        }
        Source::Simulate => {
            let stream_config = StreamConfig {
                ecg_config: EcgConfig {
                    sampling_rate_hz: config.sampling_rate_hz,
                    rhythm: HeartRhythm::Constant { bpm: args.simulate_bpm },
                    noise: NoiseConfig {
                        malformed_line_prob: args.garbage_prob,
                        ..Default::default()
                    },
                    seed: args.seed,
                    ..Default::default()
                },
                ..Default::default()
            };
            let (chunks, control) = start_ecg_stream(stream_config).await?;
            control.send(StreamCommand::Start).await?;
            info!("Simulating {:.0} BPM at {} Hz", args.simulate_bpm, config.sampling_rate_hz);
            tokio::spawn(forward_chunks(chunks, line_sender, control));
        }
    }

    let stopper = service.command_handle();
    let duration = args.duration;
    tokio::spawn(async move {
        match duration {
            Some(seconds) => {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs_f64(seconds)) => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            None => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
        let _ = stopper.send(MonitorCommand::Stop).await;
    });

    let stats = service.run().await?;
    info!(
        "Monitor finished: {} lines, {} samples accepted, {} rejected, {} runs ({} failed)",
        stats.lines_received,
        stats.pipeline.samples_accepted,
        stats.pipeline.samples_rejected,
        stats.pipeline.runs_completed,
        stats.pipeline.runs_failed
    );
    if let Some(bpm) = stats.last_bpm {
        println!("{:.1}", bpm);
    }
    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<PipelineConfig> {
    let config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            PipelineConfig::from_json(&json)?
        }
        None if args.record.is_some() => PipelineConfig::record_analysis(args.sampling_rate),
        None => PipelineConfig {
            // one estimate per second of signal
            run_interval_samples: (args.sampling_rate.round() as usize).max(1),
            ..PipelineConfig::streaming(args.sampling_rate)
        },
    };
    config.validate()?;
    Ok(config)
}

fn analyze_file(config: PipelineConfig, path: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading record {}", path.display()))?;

    let mut samples = Vec::new();
    let mut skipped = 0usize;
    for line in text.lines().filter(|line| !line.trim().is_empty()) {
        match line.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => samples.push(value),
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!("Skipped {} malformed lines in {}", skipped, path.display());
    }
    if samples.is_empty() {
        bail!("{} holds no samples", path.display());
    }

    let seconds = samples.len() as f64 / config.sampling_rate_hz;
    let estimate = analyze_record(config, &samples)?;
    info!(
        "{}: {} beats over {:.1} s, zone {}",
        path.display(),
        estimate.beat_count(),
        seconds,
        estimate.zone().description()
    );
    println!("{:.1}", estimate.bpm);
    Ok(())
}

async fn forward_stdin(sender: mpsc::Sender<String>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if sender.send(line).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                error!("Reading stdin failed: {}", e);
                break;
            }
        }
    }
}

async fn forward_chunks(
    mut chunks: broadcast::Receiver<Vec<String>>,
    sender: mpsc::Sender<String>,
    control: mpsc::Sender<StreamCommand>,
) {
    loop {
        match chunks.recv().await {
            Ok(chunk) => {
                for line in chunk {
                    if sender.send(line).await.is_err() {
                        let _ = control.send(StreamCommand::Stop).await;
                        return;
                    }
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Monitor fell behind the simulator, lost {} chunks", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => {
                error!("Simulator stream closed");
                break;
            }
        }
    }
}
