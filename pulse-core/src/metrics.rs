//! Metric samples carried by the feed

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::PayloadError;

/// Number of samples a [`MetricsWindow`] keeps by default
pub const DEFAULT_WINDOW: usize = 50;

/// One server metrics sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// CPU usage in percent
    pub cpu: f64,
    /// Memory usage in gigabytes
    pub memory: f64,
    /// Seconds on the server's clock
    pub timestamp: i64,
}

impl MetricSample {
    /// Decode a sample from its JSON text
    pub fn parse(raw: &str) -> Result<Self, PayloadError> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// The most recent samples, oldest evicted first
#[derive(Debug, Clone)]
pub struct MetricsWindow {
    samples: VecDeque<MetricSample>,
    capacity: usize,
}

impl Default for MetricsWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl MetricsWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: MetricSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
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

    pub fn latest(&self) -> Option<&MetricSample> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricSample> {
        self.samples.iter()
    }

    /// Mean cpu usage over the window
    pub fn average_cpu(&self) -> Option<f64> {
        self.average(|sample| sample.cpu)
    }

    /// Mean memory usage over the window
    pub fn average_memory(&self) -> Option<f64> {
        self.average(|sample| sample.memory)
    }

    fn average(&self, field: impl Fn(&MetricSample) -> f64) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let total: f64 = self.samples.iter().map(field).sum();
        Some(total / self.samples.len() as f64)
    }
}
