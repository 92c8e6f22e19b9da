//! Bounded per-device telemetry history.
//!
//! Each device keeps the most recent N samples in arrival order; appending
//! at capacity evicts the oldest. The map of histories is owned exclusively
//! by the monitor's sampling task, so no locking is involved anywhere here.

use std::collections::HashMap;
use std::collections::VecDeque;

use crate::telemetry::DeviceSample;

/// Default number of samples retained per device.
pub const DEFAULT_HISTORY_WINDOW: usize = 60;

/// Ordered, time-ascending, bounded sequence of samples for one device.
#[derive(Debug)]
pub struct DeviceHistory {
    capacity: usize,
    samples: VecDeque<DeviceSample>,
}

impl DeviceHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a sample, evicting the oldest when at capacity.
    pub fn push(&mut self, sample: DeviceSample) {
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

    /// The most recent sample.
    pub fn latest(&self) -> Option<&DeviceSample> {
        self.samples.back()
    }

    /// The sample `n` positions before the latest (`0` = latest).
    pub fn nth_from_latest(&self, n: usize) -> Option<&DeviceSample> {
        self.samples.len().checked_sub(n + 1).and_then(|idx| self.samples.get(idx))
    }

    /// Oldest-to-newest iteration.
    pub fn iter(&self) -> impl Iterator<Item = &DeviceSample> {
        self.samples.iter()
    }
}

/// Per-device histories, keyed by device id.
#[derive(Debug)]
pub struct HistoryMap {
    window: usize,
    devices: HashMap<u32, DeviceHistory>,
}

impl HistoryMap {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            devices: HashMap::new(),
        }
    }

    /// Append `sample` to its device's history, creating the history on
    /// first sight of the device. Returns the post-append history so the
    /// caller can score the exact snapshot the sample landed in.
    pub fn record(&mut self, sample: DeviceSample) -> &DeviceHistory {
        let history = self
            .devices
            .entry(sample.device_id)
            .or_insert_with(|| DeviceHistory::new(self.window));
        history.push(sample);
        history
    }

    pub fn get(&self, device_id: u32) -> Option<&DeviceHistory> {
        self.devices.get(&device_id)
    }

    /// Number of devices seen so far.
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
