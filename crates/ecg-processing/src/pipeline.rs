//! Heart-rate pipeline orchestrating the stages over a sliding window

use crate::config::PipelineConfig;
use crate::filters::{FilterMode, LowPassFilter, StreamingLowPass};
use crate::peaks::PeakDetector;
use crate::processor::{ProcessorType, StageMetrics, WindowProcessor};
use crate::rate::RateEstimator;
use crate::smoothing::Smoother;
use crate::wavelet::BeatEnhancer;
use ecg_core::{EcgError, EcgResult, EnhancedSignal, HeartRateEstimate, Sample, SampleBuffer};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Receiver of every completed estimate (plot refresh, playback selection, ...)
pub trait EstimateConsumer: Send {
    fn on_estimate(&mut self, estimate: &HeartRateEstimate);
}

impl<F> EstimateConsumer for F
where
    F: FnMut(&HeartRateEstimate) + Send,
{
    fn on_estimate(&mut self, estimate: &HeartRateEstimate) {
        self(estimate)
    }
}

/// Lifecycle of a pipeline instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    /// Window not yet full, no run has happened
    Accumulating,
    /// Window full, every accepted sample may trigger a run
    Ready,
}

/// Counters for one pipeline instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub samples_accepted: u64,
    pub samples_rejected: u64,
    pub runs_completed: u64,
    pub runs_failed: u64,
    pub last_run_us: u64,
    /// Per-stage timings of the most recent run
    pub stage_metrics: Vec<StageMetrics>,
}

/// Streaming heart-rate estimator
///
/// Samples accumulate in a fixed window. Once the window is full every
/// `run_interval_samples` accepted samples trigger a run of the stage chain
/// over a snapshot of the window, and the estimate is handed to every
/// registered consumer. A failing run is logged and counted; it never
/// touches the window or stops the pipeline.
pub struct Pipeline {
    id: Uuid,
    config: PipelineConfig,
    buffer: SampleBuffer,
    // Present in streaming mode: samples are low-passed on arrival
    prefilter: Option<StreamingLowPass>,
    conditioning: Vec<Box<dyn WindowProcessor>>,
    enhancer: BeatEnhancer,
    detector: PeakDetector,
    consumers: Vec<Box<dyn EstimateConsumer>>,
    state: PipelineState,
    pending_samples: usize,
    stats: PipelineStats,
    last_estimate: Option<HeartRateEstimate>,
}

impl Pipeline {
    /// Build every stage from `config`, rejecting invalid configurations up front
    pub fn new(config: PipelineConfig) -> EcgResult<Self> {
        config.validate()?;

        let buffer = SampleBuffer::new(config.window_size_samples)?;
        let mut prefilter = None;
        let mut conditioning: Vec<Box<dyn WindowProcessor>> = Vec::new();

        if config.preprocess {
            let lowpass = LowPassFilter::design(
                config.lowpass_cutoff_hz,
                config.sampling_rate_hz,
                config.lowpass_order,
            )?;
            match config.filter_mode {
                FilterMode::Batch => conditioning.push(Box::new(lowpass)),
                FilterMode::Streaming => prefilter = Some(lowpass.stream()),
            }
            conditioning.push(Box::new(Smoother::new(config.smoother_span, config.smoother_degree)?));
        }

        let enhancer = BeatEnhancer::new(config.wavelet, config.wavelet_levels, &config.keep_detail_levels)?;
        let detector = PeakDetector::new(config.peak_height_factor, config.min_distance())?;

        let id = Uuid::new_v4();
        info!(
            "Pipeline {} created: {} Hz, window {} samples, {:?} low-pass, wavelet {} keeping {:?}",
            id,
            config.sampling_rate_hz,
            config.window_size_samples,
            config.filter_mode,
            config.wavelet,
            enhancer.keep_levels()
        );

        Ok(Pipeline {
            id,
            config,
            buffer,
            prefilter,
            conditioning,
            enhancer,
            detector,
            consumers: Vec::new(),
            state: PipelineState::Accumulating,
            pending_samples: 0,
            stats: PipelineStats::default(),
            last_estimate: None,
        })
    }

    pub fn register_consumer(&mut self, consumer: impl EstimateConsumer + 'static) {
        self.consumers.push(Box::new(consumer));
    }

    /// Parse one raw reading (e.g. a serial line) and push it
    ///
    /// Malformed or non-finite readings are rejected without touching the window.
    pub fn ingest(&mut self, raw: &str) -> EcgResult<()> {
        let trimmed = raw.trim();
        let sample = trimmed.parse::<f64>().map_err(|e| EcgError::ParseError {
            input: raw.to_string(),
            reason: e.to_string(),
        });

        match sample {
            Ok(sample) => self.push_sample(sample),
            Err(e) => {
                self.stats.samples_rejected += 1;
                warn!("Pipeline {}: dropping sample: {}", self.id, e);
                Err(e)
            }
        }
    }

    /// Push one numeric sample, running the stages when due
    pub fn push_sample(&mut self, sample: Sample) -> EcgResult<()> {
        if !sample.is_finite() {
            self.stats.samples_rejected += 1;
            let error = EcgError::ParseError {
                input: sample.to_string(),
                reason: "sample is not a finite number".to_string(),
            };
            warn!("Pipeline {}: dropping sample: {}", self.id, error);
            return Err(error);
        }

        let value = match self.prefilter.as_mut() {
            Some(filter) => filter.process_sample(sample),
            None => sample,
        };
        self.buffer.push(value);
        self.stats.samples_accepted += 1;
        self.pending_samples += 1;

        if self.state == PipelineState::Accumulating && self.buffer.is_full() {
            self.state = PipelineState::Ready;
            info!(
                "Pipeline {} ready after {} samples",
                self.id, self.stats.samples_accepted
            );
        }

        if self.config.auto_run {
            self.poll();
        }
        Ok(())
    }

    /// Run the stages if the window is full and enough new samples arrived
    ///
    /// Returns the new estimate, or `None` when no run was due or the run failed.
    pub fn poll(&mut self) -> Option<&HeartRateEstimate> {
        if self.state != PipelineState::Ready
            || self.pending_samples < self.config.run_interval_samples
        {
            return None;
        }
        self.run().ok()
    }

    /// Run the stages again on the current window
    pub fn recompute(&mut self) -> EcgResult<&HeartRateEstimate> {
        if self.state != PipelineState::Ready {
            return Err(EcgError::InvalidInput {
                reason: format!(
                    "window holds {} of {} samples",
                    self.buffer.len(),
                    self.buffer.capacity()
                ),
            });
        }
        self.run()
    }

    /// Stage chain over one window, without buffering or emission
    ///
    /// In streaming filter mode the window is expected to be low-passed already.
    pub fn process_window(&self, window: &[f64]) -> EcgResult<HeartRateEstimate> {
        self.evaluate(window, &mut Vec::new())
    }

    /// Clear window, filter state and counters; consumers stay registered
    pub fn reset(&mut self) {
        self.buffer.clear();
        if let Some(filter) = self.prefilter.as_mut() {
            filter.reset();
        }
        self.state = PipelineState::Accumulating;
        self.pending_samples = 0;
        self.stats = PipelineStats::default();
        self.last_estimate = None;
        info!("Pipeline {} reset", self.id);
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn last_estimate(&self) -> Option<&HeartRateEstimate> {
        self.last_estimate.as_ref()
    }

    /// Samples currently in the window (low-passed in streaming mode)
    pub fn buffered_samples(&self) -> usize {
        self.buffer.len()
    }

    fn run(&mut self) -> EcgResult<&HeartRateEstimate> {
        let window = self.buffer.snapshot();
        let started = Instant::now();
        let mut metrics = Vec::with_capacity(self.conditioning.len() + 2);
        self.pending_samples = 0;

        let result = self.evaluate(&window, &mut metrics);
        self.stats.last_run_us = started.elapsed().as_micros() as u64;
        self.stats.stage_metrics = metrics;

        match result {
            Ok(estimate) => {
                self.stats.runs_completed += 1;
                debug!(
                    "Pipeline {}: {:.1} BPM from {} beats in {} us",
                    self.id,
                    estimate.bpm,
                    estimate.beat_count(),
                    self.stats.last_run_us
                );
                for consumer in &mut self.consumers {
                    consumer.on_estimate(&estimate);
                }
                Ok(self.last_estimate.insert(estimate))
            }
            Err(e) => {
                self.stats.runs_failed += 1;
                if e.is_recoverable() {
                    warn!("Pipeline {}: skipping run: {}", self.id, e);
                } else {
                    error!("Pipeline {}: run failed: {}", self.id, e);
                }
                Err(e)
            }
        }
    }

    fn evaluate(&self, window: &[f64], metrics: &mut Vec<StageMetrics>) -> EcgResult<HeartRateEstimate> {
        let mut signal = window.to_vec();
        for stage in &self.conditioning {
            signal = run_stage(stage.as_ref(), &signal, metrics)?;
        }
        let band = run_stage(&self.enhancer, &signal, metrics)?;
        let enhanced_signal = EnhancedSignal::from_band_signal(&band);

        let timer = StageMetrics::start_timing("Peak Detection", ProcessorType::Detection);
        let peak_indices = self.detector.find_peaks_in_energy(enhanced_signal.as_slice())?;
        let bpm = RateEstimator::estimate(peak_indices.len(), window.len(), self.config.sampling_rate_hz)?;
        metrics.push(timer.finish());

        Ok(HeartRateEstimate {
            bpm,
            peak_indices,
            enhanced_signal,
        })
    }
}

/// Time one stage, refusing windows it cannot handle
fn run_stage(
    stage: &dyn WindowProcessor,
    signal: &[f64],
    metrics: &mut Vec<StageMetrics>,
) -> EcgResult<Vec<f64>> {
    let timer = StageMetrics::start_timing(stage.name(), stage.processor_type());
    let result = if stage.can_process(signal) {
        stage.process(signal)
    } else {
        Err(EcgError::InvalidInput {
            reason: format!("{} cannot process a window of {} samples", stage.name(), signal.len()),
        })
    };

    match result {
        Ok(output) => {
            metrics.push(timer.finish());
            Ok(output)
        }
        Err(e) => {
            metrics.push(timer.finish_with_error(&e.to_string()));
            Err(e)
        }
    }
}

/// One-shot analysis of a complete recording
///
/// The whole record is treated as a single window; its length sets the rate
/// denominator.
pub fn analyze_record(config: PipelineConfig, samples: &[f64]) -> EcgResult<HeartRateEstimate> {
    if let Some(bad) = samples.iter().position(|s| !s.is_finite()) {
        return Err(EcgError::InvalidInput {
            reason: format!("sample {} is not a finite number", bad),
        });
    }

    let pipeline = Pipeline::new(config)?;
    let estimate = match pipeline.prefilter.clone() {
        Some(mut filter) => {
            let filtered: Vec<f64> = samples.iter().map(|&s| filter.process_sample(s)).collect();
            pipeline.process_window(&filtered)?
        }
        None => pipeline.process_window(samples)?,
    };

    info!(
        "Record of {} samples: {:.1} BPM from {} beats",
        samples.len(),
        estimate.bpm,
        estimate.beat_count()
    );
    Ok(estimate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn pulse_train(len: usize, period: usize) -> Vec<f64> {
        (0..len).map(|i| if i % period == 0 { 1.0 } else { 0.0 }).collect()
    }

    fn collecting_pipeline(config: PipelineConfig) -> (Pipeline, Arc<Mutex<Vec<f64>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let mut pipeline = Pipeline::new(config).unwrap();
        pipeline.register_consumer(move |estimate: &HeartRateEstimate| {
            sink.lock().unwrap().push(estimate.bpm);
        });
        (pipeline, received)
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = PipelineConfig {
            lowpass_cutoff_hz: 80.0,
            ..Default::default()
        };
        assert!(matches!(
            Pipeline::new(config),
            Err(EcgError::InvalidParameter { parameter: "lowpass_cutoff_hz", .. })
        ));
    }

    #[test]
    fn test_no_run_below_capacity() {
        let (mut pipeline, received) = collecting_pipeline(PipelineConfig::default());

        for sample in pulse_train(999, 100) {
            pipeline.push_sample(sample).unwrap();
        }

        assert_eq!(pipeline.state(), PipelineState::Accumulating);
        assert!(received.lock().unwrap().is_empty());
        assert!(pipeline.poll().is_none());
        assert!(pipeline.recompute().is_err());
        assert_eq!(pipeline.stats().runs_completed, 0);
    }

    #[test]
    fn test_pulse_train_through_ingest() {
        let (mut pipeline, received) = collecting_pipeline(PipelineConfig::default());

        for sample in pulse_train(1000, 100) {
            pipeline.ingest(&format!("{}\r\n", sample)).unwrap();
        }

        assert_eq!(pipeline.state(), PipelineState::Ready);
        let rates = received.lock().unwrap().clone();
        assert_eq!(rates.len(), 1);
        assert!((rates[0] - 60.0).abs() <= 1.0, "got {} BPM", rates[0]);

        let estimate = pipeline.last_estimate().unwrap();
        assert_eq!(estimate.enhanced_signal.len(), 1000);
        assert!(estimate.peak_indices.min_gap().map_or(true, |gap| gap >= 50));
    }

    #[test]
    fn test_every_push_reruns_once_ready() {
        let (mut pipeline, received) = collecting_pipeline(PipelineConfig::default());
        for sample in pulse_train(1005, 100) {
            pipeline.push_sample(sample).unwrap();
        }
        assert_eq!(received.lock().unwrap().len(), 6);
        assert_eq!(pipeline.stats().runs_completed, 6);
    }

    #[test]
    fn test_run_interval_debounces() {
        let config = PipelineConfig {
            run_interval_samples: 10,
            ..Default::default()
        };
        let (mut pipeline, received) = collecting_pipeline(config);

        for sample in pulse_train(1025, 100) {
            pipeline.push_sample(sample).unwrap();
        }
        // one run on fill, then one per 10 new samples
        assert_eq!(received.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_manual_poll() {
        let config = PipelineConfig {
            auto_run: false,
            ..Default::default()
        };
        let (mut pipeline, received) = collecting_pipeline(config);

        for sample in pulse_train(1000, 100) {
            pipeline.push_sample(sample).unwrap();
        }
        assert!(received.lock().unwrap().is_empty());

        assert!(pipeline.poll().is_some());
        assert!(pipeline.poll().is_none());
        pipeline.push_sample(0.0).unwrap();
        assert!(pipeline.poll().is_some());
        assert_eq!(received.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let mut pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        for sample in pulse_train(1000, 100) {
            pipeline.push_sample(sample).unwrap();
        }

        let first = pipeline.recompute().unwrap().clone();
        let second = pipeline.recompute().unwrap().clone();
        assert_eq!(first, second);
        assert_eq!(pipeline.process_window(&pulse_train(1000, 100)).unwrap(), first);
    }

    #[test]
    fn test_all_zero_window() {
        let (mut pipeline, received) = collecting_pipeline(PipelineConfig::default());
        for _ in 0..1000 {
            pipeline.push_sample(0.0).unwrap();
        }

        let estimate = pipeline.last_estimate().unwrap();
        assert!(estimate.peak_indices.is_empty());
        assert_eq!(estimate.bpm, 0.0);
        assert_eq!(received.lock().unwrap().as_slice(), &[0.0]);
    }

    #[test]
    fn test_malformed_input_is_dropped() {
        let (mut pipeline, received) = collecting_pipeline(PipelineConfig::default());
        for sample in pulse_train(999, 100) {
            pipeline.push_sample(sample).unwrap();
        }

        for raw in ["", "12a", "1.0.0", "NaN", "inf", "--"] {
            assert!(matches!(pipeline.ingest(raw), Err(EcgError::ParseError { .. })), "{:?}", raw);
        }
        assert!(pipeline.push_sample(f64::NEG_INFINITY).is_err());

        assert_eq!(pipeline.buffered_samples(), 999);
        assert_eq!(pipeline.state(), PipelineState::Accumulating);
        assert!(received.lock().unwrap().is_empty());
        assert_eq!(pipeline.stats().samples_rejected, 7);
        assert_eq!(pipeline.stats().samples_accepted, 999);

        pipeline.ingest(" 0.0 ").unwrap();
        assert_eq!(received.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_reset_returns_to_accumulating() {
        let (mut pipeline, received) = collecting_pipeline(PipelineConfig::default());
        for sample in pulse_train(1000, 100) {
            pipeline.push_sample(sample).unwrap();
        }
        pipeline.reset();

        assert_eq!(pipeline.state(), PipelineState::Accumulating);
        assert_eq!(pipeline.buffered_samples(), 0);
        assert!(pipeline.last_estimate().is_none());
        assert_eq!(pipeline.stats(), &PipelineStats::default());

        for sample in pulse_train(1000, 100) {
            pipeline.push_sample(sample).unwrap();
        }
        assert_eq!(received.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_stage_metrics_recorded() {
        let mut pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        for sample in pulse_train(1000, 100) {
            pipeline.push_sample(sample).unwrap();
        }

        let stages: Vec<&str> = pipeline
            .stats()
            .stage_metrics
            .iter()
            .map(|m| m.stage.as_str())
            .collect();
        assert_eq!(
            stages,
            vec![
                "Butterworth Low-pass",
                "Savitzky-Golay Smoother",
                "Stationary Wavelet Enhancer",
                "Peak Detection"
            ]
        );
        assert!(pipeline.stats().stage_metrics.iter().all(|m| m.success));

        let types: Vec<ProcessorType> = pipeline
            .stats()
            .stage_metrics
            .iter()
            .map(|m| m.processor_type)
            .collect();
        assert_eq!(
            types,
            vec![
                ProcessorType::Conditioning,
                ProcessorType::Conditioning,
                ProcessorType::Enhancement,
                ProcessorType::Detection
            ]
        );
    }

    #[test]
    fn test_window_shorter_than_smoother_span_is_refused() {
        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let mut metrics = Vec::new();

        let result = pipeline.evaluate(&[0.0; 10], &mut metrics);
        assert!(matches!(result, Err(EcgError::InvalidInput { .. })));
        assert!(pipeline.process_window(&[0.0; 10]).is_err());

        // the low-pass ran, the smoother refused, nothing after it started
        assert_eq!(metrics.len(), 2);
        assert!(metrics[0].success);
        assert_eq!(metrics[1].stage, "Savitzky-Golay Smoother");
        assert!(!metrics[1].success);
        assert!(metrics[1]
            .error_message
            .as_deref()
            .is_some_and(|m| m.contains("10 samples")));
    }

    #[test]
    fn test_instances_are_independent() {
        let mut a = Pipeline::new(PipelineConfig::default()).unwrap();
        let mut b = Pipeline::new(PipelineConfig::default()).unwrap();
        assert_ne!(a.id(), b.id());

        for sample in pulse_train(1000, 100) {
            a.push_sample(sample).unwrap();
        }
        b.push_sample(1.0).unwrap();

        assert_eq!(a.state(), PipelineState::Ready);
        assert_eq!(b.state(), PipelineState::Accumulating);
        assert_eq!(b.buffered_samples(), 1);
    }

    #[test]
    fn test_analyze_record_rejects_bad_records() {
        assert!(matches!(
            analyze_record(PipelineConfig::record_analysis(100.0), &[]),
            Err(EcgError::InvalidInput { .. })
        ));
        assert!(analyze_record(PipelineConfig::record_analysis(100.0), &[0.0, f64::NAN, 1.0]).is_err());
    }
}
