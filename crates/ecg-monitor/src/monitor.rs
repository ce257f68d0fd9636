//! Monitor service hosting one pipeline in a tokio task

use ecg_core::HeartRateEstimate;
use ecg_processing::{EstimateConsumer, Pipeline, PipelineConfig, PipelineStats};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Commands for controlling the monitor
#[derive(Debug, Clone)]
pub enum MonitorCommand {
    Start,
    Pause,
    Resume,
    Reset,
    Stop,
}

/// Snapshot of the monitor state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorStats {
    pub is_running: bool,
    pub lines_received: u64,
    pub lines_ignored: u64,
    pub pipeline: PipelineStats,
    pub last_bpm: Option<f64>,
}

/// Feeds raw lines into the pipeline and publishes every estimate
pub struct MonitorService {
    pipeline: Pipeline,
    line_receiver: mpsc::Receiver<String>,
    estimate_sender: broadcast::Sender<HeartRateEstimate>,
    command_receiver: mpsc::Receiver<MonitorCommand>,
    command_sender: mpsc::Sender<MonitorCommand>,
    poll_period: Duration,
    is_running: bool,
    lines_received: u64,
    lines_ignored: u64,
}

impl MonitorService {
    /// Create the service; `poll_period` drives `poll()` when `auto_run` is off
    pub fn new(
        config: PipelineConfig,
        line_receiver: mpsc::Receiver<String>,
        poll_period: Duration,
    ) -> anyhow::Result<Self> {
        let mut pipeline = Pipeline::new(config)?;
        let (estimate_sender, _) = broadcast::channel(16);
        let (command_sender, command_receiver) = mpsc::channel(32);

        let publisher = estimate_sender.clone();
        pipeline.register_consumer(move |estimate: &HeartRateEstimate| {
            // No subscriber is not an error
            let _ = publisher.send(estimate.clone());
        });

        Ok(MonitorService {
            pipeline,
            line_receiver,
            estimate_sender,
            command_receiver,
            command_sender,
            poll_period,
            is_running: true,
            lines_received: 0,
            lines_ignored: 0,
        })
    }

    /// Attach a consumer (e.g. the playback selector) to the pipeline
    pub fn register_consumer(&mut self, consumer: impl EstimateConsumer + 'static) {
        self.pipeline.register_consumer(consumer);
    }

    /// Get a receiver for published estimates
    pub fn subscribe(&self) -> broadcast::Receiver<HeartRateEstimate> {
        self.estimate_sender.subscribe()
    }

    /// Get command sender for controlling the monitor
    pub fn command_handle(&self) -> mpsc::Sender<MonitorCommand> {
        self.command_sender.clone()
    }

    /// Main loop; returns on `Stop` or when the line source closes
    pub async fn run(&mut self) -> anyhow::Result<MonitorStats> {
        let manual_poll = !self.pipeline.config().auto_run;
        let mut poll_ticker = interval(self.poll_period);
        poll_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Monitor started: pipeline {}, {}",
            self.pipeline.id(),
            if manual_poll { "scheduled runs" } else { "run on every push" }
        );

        loop {
            tokio::select! {
                line = self.line_receiver.recv() => {
                    match line {
                        Some(line) => self.handle_line(&line),
                        None => {
                            info!("Sample source closed");
                            break;
                        }
                    }
                }

                _ = poll_ticker.tick(), if manual_poll && self.is_running => {
                    self.pipeline.poll();
                }

                command = self.command_receiver.recv() => {
                    match command {
                        Some(MonitorCommand::Start) | Some(MonitorCommand::Resume) => {
                            self.is_running = true;
                            info!("Monitor running");
                        }
                        Some(MonitorCommand::Pause) => {
                            self.is_running = false;
                            info!("Monitor paused");
                        }
                        Some(MonitorCommand::Reset) => {
                            self.pipeline.reset();
                        }
                        Some(MonitorCommand::Stop) | None => {
                            debug!("Monitor stopping");
                            break;
                        }
                    }
                }
            }
        }

        Ok(self.stats())
    }

    fn handle_line(&mut self, line: &str) {
        self.lines_received += 1;
        if !self.is_running {
            self.lines_ignored += 1;
            return;
        }
        // Rejected lines are already logged and counted by the pipeline
        let _ = self.pipeline.ingest(line);
    }

    pub fn stats(&self) -> MonitorStats {
        MonitorStats {
            is_running: self.is_running,
            lines_received: self.lines_received,
            lines_ignored: self.lines_ignored,
            pipeline: self.pipeline.stats().clone(),
            last_bpm: self.pipeline.last_estimate().map(|e| e.bpm),
        }
    }
}

/// Log every published estimate until the channel closes
pub async fn log_estimates(mut receiver: broadcast::Receiver<HeartRateEstimate>) {
    loop {
        match receiver.recv().await {
            Ok(estimate) => info!(
                "Heart rate {:.1} BPM ({} beats, zone {})",
                estimate.bpm,
                estimate.beat_count(),
                estimate.zone().description()
            ),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Estimate log lagged, skipped {} estimates", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
