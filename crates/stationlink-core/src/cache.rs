//! Bounded, time-aware cache of recent readings.
//!
//! A ring of the most recent readings with O(1) eviction at the size limit.
//! The freshest entry is served by the manager inside `cache_timeout` so the
//! physical device is not polled more often than it can answer, and the
//! tail doubles as the history burst for new broadcast subscribers.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use stationlink_types::SensorReading;

/// A cached reading plus its insertion time.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The cached reading.
    pub reading: SensorReading,
    /// When the entry was inserted (monotonic).
    pub inserted_at: Instant,
}

impl CacheEntry {
    /// Age of this entry.
    pub fn age(&self) -> Duration {
        self.inserted_at.elapsed()
    }
}

/// Bounded, insertion-ordered store of recent readings.
#[derive(Debug)]
pub struct SensorCache {
    entries: VecDeque<CacheEntry>,
    max_size: usize,
    max_age: Option<Duration>,
}

impl SensorCache {
    /// Create a cache holding at most `max_size` readings.
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_size.min(64)),
            max_size: max_size.max(1),
            max_age: None,
        }
    }

    /// Create a cache that additionally drops entries older than `max_age`.
    pub fn with_max_age(max_size: usize, max_age: Duration) -> Self {
        Self {
            max_age: Some(max_age),
            ..Self::new(max_size)
        }
    }

    /// Insert a reading, evicting the oldest entry if the cache is full.
    pub fn push(&mut self, reading: SensorReading) {
        if self.entries.len() == self.max_size {
            self.entries.pop_front();
        }
        self.entries.push_back(CacheEntry {
            reading,
            inserted_at: Instant::now(),
        });
    }

    /// The most recent entry, if any survives the age limit.
    pub fn latest(&mut self) -> Option<&CacheEntry> {
        self.expire();
        self.entries.back()
    }

    /// The most recent reading if it is younger than `timeout`.
    pub fn fresh(&mut self, timeout: Duration) -> Option<SensorReading> {
        self.latest()
            .filter(|entry| entry.age() < timeout)
            .map(|entry| entry.reading)
    }

    /// The `count` most recent readings, oldest first.
    pub fn recent(&mut self, count: usize) -> Vec<SensorReading> {
        self.expire();
        let skip = self.entries.len().saturating_sub(count);
        self.entries
            .iter()
            .skip(skip)
            .map(|entry| entry.reading)
            .collect()
    }

    /// Number of cached readings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drop entries past the age limit. Oldest entries are at the front,
    /// so eviction stops at the first young enough entry.
    fn expire(&mut self) {
        if let Some(max_age) = self.max_age {
            while self
                .entries
                .front()
                .is_some_and(|entry| entry.age() > max_age)
            {
                self.entries.pop_front();
            }
        }
    }
}
