//! Sliding window over the most recent raw samples

use crate::error::{EcgError, EcgResult};
use std::collections::VecDeque;

/// A single scalar ECG reading
pub type Sample = f64;

/// Fixed-capacity sliding window, oldest sample evicted first
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl SampleBuffer {
    /// Create an empty buffer holding at most `capacity` samples
    pub fn new(capacity: usize) -> EcgResult<Self> {
        if capacity == 0 {
            return Err(EcgError::invalid_parameter(
                "window_size_samples",
                "sample buffer capacity must be greater than 0",
            ));
        }

        Ok(SampleBuffer {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Append one sample, evicting the oldest when at capacity
    pub fn push(&mut self, sample: Sample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// True once the buffer holds `capacity` samples
    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    /// Ordered copy of the current contents, oldest first
    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recently pushed sample
    pub fn latest(&self) -> Option<Sample> {
        self.samples.back().copied()
    }

    /// Drop every sample; capacity is unchanged
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
