use std::collections::VecDeque;

use tokio::time::Instant;

/// How many samples the watchdog keeps. At the default 60s check interval
/// this is ten minutes of history.
pub const HISTORY_CAPACITY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempSample {
    pub captured_at: Instant,
    pub temperature: f32,
    pub setpoint: f32,
}

/// Bounded, insertion-ordered record of recent thermostat readings. Oldest
/// sample is evicted once the buffer is full.
#[derive(Debug, Clone, Default)]
pub struct TempHistory {
    samples: VecDeque<TempSample>,
}

impl TempHistory {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    pub fn record(&mut self, temperature: f32, setpoint: f32, captured_at: Instant) {
        if self.samples.len() == HISTORY_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(TempSample {
            captured_at,
            temperature,
            setpoint,
        });
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample at `index`, oldest first.
    pub fn get(&self, index: usize) -> Option<&TempSample> {
        self.samples.get(index)
    }

    pub fn latest(&self) -> Option<&TempSample> {
        self.samples.back()
    }
}
