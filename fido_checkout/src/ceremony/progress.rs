use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};

pub const PROGRESS_COMPLETE: f64 = 100.0;

/// Simulated progress of one in-flight attempt.
///
/// Climbs toward `ceiling` in random increments, never decreases within an
/// attempt, and only reaches 100 through [`ProgressMeter::complete`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressMeter {
    value: f64,
    ceiling: f64,
    max_step: f64,
}

impl ProgressMeter {
    pub fn new(ceiling: f64, max_step: f64) -> Self {
        Self {
            value: 0.0,
            ceiling: ceiling.clamp(0.0, PROGRESS_COMPLETE),
            max_step: max_step.max(0.0),
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Start of a new attempt.
    pub fn reset(&mut self) {
        self.value = 0.0;
    }

    /// Apply one timer tick; `entropy` scales the increment from 0 to `max_step`.
    pub fn tick(&mut self, entropy: u8) -> f64 {
        if self.value < self.ceiling {
            let step = f64::from(entropy) / f64::from(u8::MAX) * self.max_step;
            self.value = (self.value + step).min(self.ceiling);
        }
        self.value
    }

    /// Raise to a flow milestone; lower milestones are ignored.
    pub fn raise_to(&mut self, milestone: f64) -> f64 {
        let milestone = milestone.min(self.ceiling.max(self.value));
        if milestone > self.value {
            self.value = milestone;
        }
        self.value
    }

    /// The underlying operation resolved.
    pub fn complete(&mut self) -> f64 {
        self.value = PROGRESS_COMPLETE;
        self.value
    }
}

/// Fixed-interval timer that exists only while an attempt is in flight.
///
/// Dropping it is the cancellation; there is no background task to leak.
#[derive(Debug)]
pub(super) struct ProgressTicker {
    interval: Interval,
}

impl ProgressTicker {
    pub(super) fn start(period: Duration) -> Self {
        let period = period.max(Duration::from_millis(1));
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

/// Resolves on the next tick, or never when no ticker is running.
pub(super) async fn next_tick(ticker: &mut Option<ProgressTicker>) {
    match ticker {
        Some(t) => {
            t.interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
