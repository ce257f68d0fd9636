//! Real-time ECG line stream standing in for the serial device

use crate::ecg_simulator::{EcgConfig, EcgSimulator};
use crate::signal_patterns::HeartRhythm;
use ecg_core::{EcgError, EcgResult};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Configuration for real-time streaming
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// ECG simulation configuration
    pub ecg_config: EcgConfig,
    /// Chunk duration in seconds (e.g., 0.1 for 100ms chunks)
    pub chunk_duration: f64,
    /// Buffer size for the stream (number of chunks to keep)
    pub buffer_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ecg_config: EcgConfig::default(),
            chunk_duration: 0.1,
            buffer_size: 50,
        }
    }
}

impl StreamConfig {
    fn samples_per_chunk(&self) -> usize {
        (self.chunk_duration * self.ecg_config.sampling_rate_hz).round() as usize
    }
}

/// Commands for controlling the stream
#[derive(Debug, Clone)]
pub enum StreamCommand {
    Start,
    Stop,
    Pause,
    Resume,
    SetHeartRate(f64),
    SetRhythm(HeartRhythm),
}

/// Stream statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamStats {
    pub is_running: bool,
    pub chunks_generated: u64,
    pub lines_sent: u64,
    pub simulated_seconds: f64,
    pub current_bpm: f64,
    pub last_chunk_us: u64,
}

/// Real-time ECG stream emitting chunks of text lines at the sampling cadence
pub struct RealTimeEcgStream {
    config: StreamConfig,
    simulator: EcgSimulator,
    data_sender: broadcast::Sender<Vec<String>>,
    control_receiver: mpsc::Receiver<StreamCommand>,
    control_sender: mpsc::Sender<StreamCommand>,
    stats: StreamStats,
}

impl RealTimeEcgStream {
    /// Create new real-time ECG stream
    pub fn new(config: StreamConfig) -> EcgResult<Self> {
        if !(config.chunk_duration > 0.0) || config.samples_per_chunk() == 0 {
            return Err(EcgError::SimulationError {
                reason: format!(
                    "chunk of {} s holds no sample at {} Hz",
                    config.chunk_duration, config.ecg_config.sampling_rate_hz
                ),
            });
        }
        if config.buffer_size == 0 {
            return Err(EcgError::SimulationError {
                reason: "stream buffer must hold at least one chunk".to_string(),
            });
        }

        let simulator = EcgSimulator::new(config.ecg_config.clone())?;
        let (data_sender, _) = broadcast::channel(config.buffer_size);
        let (control_sender, control_receiver) = mpsc::channel(32);
        let stats = StreamStats {
            current_bpm: simulator.current_bpm(),
            ..Default::default()
        };

        Ok(RealTimeEcgStream {
            config,
            simulator,
            data_sender,
            control_receiver,
            control_sender,
            stats,
        })
    }

    /// Get a receiver for data updates
    pub fn subscribe(&self) -> broadcast::Receiver<Vec<String>> {
        self.data_sender.subscribe()
    }

    /// Get control sender for sending commands
    pub fn control_handle(&self) -> mpsc::Sender<StreamCommand> {
        self.control_sender.clone()
    }

    /// Run until every control handle is dropped
    pub async fn run(&mut self) -> EcgResult<()> {
        let chunk_period = Duration::from_secs_f64(self.config.chunk_duration);
        let samples_per_chunk = self.config.samples_per_chunk();
        let mut ticker = interval(chunk_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Dropping our own sender lets `recv` observe when all handles are gone
        let (closed_sender, _) = mpsc::channel(1);
        drop(std::mem::replace(&mut self.control_sender, closed_sender));

        info!(
            "ECG stream ready: {} Hz, {} samples per {:.0} ms chunk",
            self.config.ecg_config.sampling_rate_hz,
            samples_per_chunk,
            self.config.chunk_duration * 1000.0
        );

        loop {
            tokio::select! {
                _ = ticker.tick(), if self.stats.is_running => {
                    self.emit_chunk(samples_per_chunk, chunk_period);
                }

                command = self.control_receiver.recv() => {
                    match command {
                        Some(StreamCommand::Start) => {
                            self.stats.is_running = true;
                            info!("ECG stream started");
                        }
                        Some(StreamCommand::Stop) => {
                            self.stats.is_running = false;
                            self.stats.chunks_generated = 0;
                            self.stats.lines_sent = 0;
                            self.simulator.reset_time();
                            self.stats.simulated_seconds = 0.0;
                            info!("ECG stream stopped");
                        }
                        Some(StreamCommand::Pause) => {
                            self.stats.is_running = false;
                            info!("ECG stream paused");
                        }
                        Some(StreamCommand::Resume) => {
                            self.stats.is_running = true;
                            info!("ECG stream resumed");
                        }
                        Some(StreamCommand::SetHeartRate(bpm)) => {
                            self.apply_rhythm(HeartRhythm::Constant { bpm });
                        }
                        Some(StreamCommand::SetRhythm(rhythm)) => {
                            self.apply_rhythm(rhythm);
                        }
                        None => {
                            debug!("ECG stream control channel closed");
                            break;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn emit_chunk(&mut self, samples_per_chunk: usize, chunk_period: Duration) {
        let started = Instant::now();
        let lines = self.simulator.generate_lines(samples_per_chunk);
        let elapsed = started.elapsed();

        self.stats.chunks_generated += 1;
        self.stats.lines_sent += lines.len() as u64;
        self.stats.simulated_seconds = self.simulator.elapsed();
        self.stats.current_bpm = self.simulator.current_bpm();
        self.stats.last_chunk_us = elapsed.as_micros() as u64;

        // No subscriber is not an error
        let _ = self.data_sender.send(lines);

        if elapsed > chunk_period {
            warn!(
                "Chunk generation took {:.1} ms, longer than chunk duration {:.0} ms",
                elapsed.as_secs_f64() * 1000.0,
                self.config.chunk_duration * 1000.0
            );
        }
    }

    fn apply_rhythm(&mut self, rhythm: HeartRhythm) {
        match self.simulator.set_rhythm(rhythm) {
            Ok(()) => {
                self.stats.current_bpm = self.simulator.current_bpm();
                info!("ECG stream rhythm set: {} ({:.0} BPM)", rhythm.description(), self.stats.current_bpm);
            }
            Err(e) => warn!("Ignoring rhythm change: {}", e),
        }
    }

    /// Get current stream statistics
    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    /// Get current configuration
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }
}

/// Helper function to create and start a stream in the background
pub async fn start_ecg_stream(config: StreamConfig) -> EcgResult<(
    broadcast::Receiver<Vec<String>>,
    mpsc::Sender<StreamCommand>,
)> {
    let mut stream = RealTimeEcgStream::new(config)?;
    let data_receiver = stream.subscribe();
    let control_sender = stream.control_handle();

    tokio::spawn(async move {
        if let Err(e) = stream.run().await {
            error!("ECG stream error: {}", e);
        }
    });

    Ok((data_receiver, control_sender))
}
