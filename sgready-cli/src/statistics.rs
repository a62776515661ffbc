use std::{collections::VecDeque, iter::Sum, ops::Div};

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use sgready_quantities::Zero;

/// Read view on a physical quantity.
pub trait Statistics<T> {
    /// Average over the trailing window, zero when the window is empty.
    fn average(&self) -> T;

    /// Last written value, zero when nothing has been written yet.
    fn most_recent(&self) -> T;
}

/// Statistics that never change.
#[cfg(test)]
#[must_use]
#[derive(Copy, Clone, Debug)]
pub struct Fixed<T>(pub T);

#[cfg(test)]
impl<T: Copy> Statistics<T> for Fixed<T> {
    fn average(&self) -> T {
        self.0
    }

    fn most_recent(&self) -> T {
        self.0
    }
}

#[derive(Copy, Clone)]
struct Sample<T> {
    timestamp: DateTime<Utc>,
    value: T,
}

/// Thread-safe moving average over a time window along with the most recent sample.
#[must_use]
pub struct StatisticsTracker<T> {
    window: TimeDelta,
    samples: Mutex<VecDeque<Sample<T>>>,
}

impl<T> StatisticsTracker<T> {
    pub const fn new(window: TimeDelta) -> Self {
        Self { window, samples: Mutex::new(VecDeque::new()) }
    }

    /// Record the sample and drop everything older than the window.
    pub fn update(&self, value: T, now: DateTime<Utc>) {
        let limit = now - self.window;
        let mut samples = self.samples.lock();
        samples.push_back(Sample { timestamp: now, value });
        // Concurrent producers may push slightly out of order, so check every sample.
        samples.retain(|sample| sample.timestamp >= limit);
    }
}

#[cfg(test)]
impl<T> StatisticsTracker<T> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }
}

impl<T> Statistics<T> for StatisticsTracker<T>
where
    T: Copy + Sum + Div<f64, Output = T> + Zero,
{
    fn average(&self) -> T {
        let samples = self.samples.lock();
        if samples.is_empty() {
            return T::ZERO;
        }
        #[expect(clippy::cast_precision_loss)]
        let len = samples.len() as f64;
        samples.iter().map(|sample| sample.value).sum::<T>() / len
    }

    fn most_recent(&self) -> T {
        self.samples.lock().back().map_or(T::ZERO, |sample| sample.value)
    }
}
