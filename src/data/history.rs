//! Bounded per-device history for trend display.

use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;

/// Default number of samples kept per device.
pub const DEFAULT_HISTORY_CAPACITY: usize = 500;

/// One history point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    /// Unix milliseconds at which the sample was received.
    pub time_ms: u64,
    pub temperature: f64,
    pub gas_level: f64,
}

/// FIFO-bounded series of samples for one device.
///
/// Stored as three index-aligned sequences so trend consumers can read a
/// single metric without copying. All three are only ever changed together
/// inside `&mut self` methods, so their lengths are equal at every point a
/// reader can observe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySeries {
    time: VecDeque<u64>,
    temperature: VecDeque<f64>,
    gas_level: VecDeque<f64>,
    #[serde(skip)]
    capacity: usize,
}

impl HistorySeries {
    /// Create an empty series. A zero capacity is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            time: VecDeque::with_capacity(capacity),
            temperature: VecDeque::with_capacity(capacity),
            gas_level: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest one if the series is full.
    pub fn push(&mut self, sample: Sample) {
        self.time.push_back(sample.time_ms);
        self.temperature.push_back(sample.temperature);
        self.gas_level.push_back(sample.gas_level);

        if self.time.len() > self.capacity {
            self.time.pop_front();
            self.temperature.pop_front();
            self.gas_level.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn time(&self) -> &VecDeque<u64> {
        &self.time
    }

    pub fn temperature(&self) -> &VecDeque<f64> {
        &self.temperature
    }

    pub fn gas_level(&self) -> &VecDeque<f64> {
        &self.gas_level
    }

    /// Sample at `index` (0 is the oldest).
    pub fn get(&self, index: usize) -> Option<Sample> {
        Some(Sample {
            time_ms: *self.time.get(index)?,
            temperature: *self.temperature.get(index)?,
            gas_level: *self.gas_level.get(index)?,
        })
    }

    pub fn latest(&self) -> Option<Sample> {
        self.get(self.len().checked_sub(1)?)
    }

    /// Iterate samples oldest first.
    pub fn samples(&self) -> impl Iterator<Item = Sample> + '_ {
        self.time
            .iter()
            .zip(self.temperature.iter())
            .zip(self.gas_level.iter())
            .map(|((&time_ms, &temperature), &gas_level)| Sample {
                time_ms,
                temperature,
                gas_level,
            })
    }

    /// Lowest and highest temperature in the window.
    pub fn temperature_range(&self) -> Option<(f64, f64)> {
        min_max(&self.temperature)
    }

    /// Lowest and highest gas level in the window.
    pub fn gas_range(&self) -> Option<(f64, f64)> {
        min_max(&self.gas_level)
    }

    /// Temperature trend normalized to 0-7 for 8 bar levels.
    pub fn temperature_sparkline(&self) -> Vec<u8> {
        normalize_sparkline(&self.temperature)
    }

    /// Gas trend normalized to 0-7 for 8 bar levels.
    pub fn gas_sparkline(&self) -> Vec<u8> {
        normalize_sparkline(&self.gas_level)
    }
}

fn min_max(values: &VecDeque<f64>) -> Option<(f64, f64)> {
    let mut iter = values.iter().copied();
    let first = iter.next()?;
    Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
}

/// Normalize values to 0-7 range for sparkline display.
///
/// Returns an empty Vec if there's not enough history.
fn normalize_sparkline(values: &VecDeque<f64>) -> Vec<u8> {
    if values.len() < 2 {
        return Vec::new();
    }

    let Some((min, max)) = min_max(values) else {
        return Vec::new();
    };
    let range = max - min;

    values
        .iter()
        .map(|&v| {
            if range <= f64::EPSILON {
                return 0;
            }
            let normalized = ((v - min) / range * 7.0) as u8;
            normalized.min(7)
        })
        .collect()
}

/// History series for every device seen in this session.
#[derive(Debug, Clone, PartialEq)]
pub struct History {
    series: BTreeMap<String, HistorySeries>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    /// Create a new empty history with the default per-device capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            series: BTreeMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append a sample to `device`'s series, creating it on first use.
    pub fn append(&mut self, device: &str, sample: Sample) {
        if let Some(series) = self.series.get_mut(device) {
            series.push(sample);
            return;
        }

        let mut series = HistorySeries::with_capacity(self.capacity);
        series.push(sample);
        self.series.insert(device.to_string(), series);
    }

    pub fn series(&self, device: &str) -> Option<&HistorySeries> {
        self.series.get(device)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &HistorySeries)> {
        self.series.iter()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.series.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(i: u64) -> Sample {
        Sample {
            time_ms: i,
            temperature: i as f64,
            gas_level: i as f64 / 10.0,
        }
    }

    #[test]
    fn test_series_evicts_oldest_at_capacity() {
        let mut series = HistorySeries::with_capacity(3);
        for i in 0..5 {
            series.push(sample(i));
        }

        assert_eq!(series.len(), 3);
        assert_eq!(series.time().iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(series.get(0), Some(sample(2)));
        assert_eq!(series.latest(), Some(sample(4)));
    }

    #[test]
    fn test_series_stays_aligned_past_default_cap() {
        let mut history = History::new();
        for i in 0..(DEFAULT_HISTORY_CAPACITY as u64 + 137) {
            history.append("node1", sample(i));

            let series = history.series("node1").unwrap();
            assert!(series.len() <= DEFAULT_HISTORY_CAPACITY);
            assert_eq!(series.time().len(), series.temperature().len());
            assert_eq!(series.time().len(), series.gas_level().len());
        }

        let series = history.series("node1").unwrap();
        assert_eq!(series.len(), DEFAULT_HISTORY_CAPACITY);
        assert_eq!(series.get(0), Some(sample(137)));
        assert!(series.samples().all(|s| s.temperature == s.time_ms as f64));
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let mut series = HistorySeries::with_capacity(0);
        series.push(sample(1));
        series.push(sample(2));
        assert_eq!(series.len(), 1);
        assert_eq!(series.latest(), Some(sample(2)));
    }

    #[test]
    fn test_history_keeps_devices_separate() {
        let mut history = History::with_capacity(10);
        history.append("a", sample(1));
        history.append("b", sample(2));
        history.append("b", sample(3));

        assert_eq!(history.series("a").unwrap().len(), 1);
        assert_eq!(history.series("b").unwrap().len(), 2);
        assert!(history.series("c").is_none());
    }

    #[test]
    fn test_ranges_and_sparkline() {
        let mut series = HistorySeries::with_capacity(10);
        assert!(series.temperature_range().is_none());
        assert!(series.temperature_sparkline().is_empty());

        for t in [20.0, 27.0, 21.0] {
            series.push(Sample {
                time_ms: 0,
                temperature: t,
                gas_level: 1.0,
            });
        }

        assert_eq!(series.temperature_range(), Some((20.0, 27.0)));
        assert_eq!(series.temperature_sparkline(), vec![0, 7, 1]);
        // Flat series renders at the bottom.
        assert_eq!(series.gas_sparkline(), vec![0, 0, 0]);
    }
}
