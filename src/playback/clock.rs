use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{self, Interval, MissedTickBehavior};

/// Source of rendering opportunities for clip playback.
#[async_trait]
pub trait FrameClock: Send {
    /// Resolves at the next rendering opportunity. Must be cancel-safe.
    async fn tick(&mut self);
}

/// Builds one clock per playback session.
pub type FrameClockFactory = Arc<dyn Fn() -> Box<dyn FrameClock> + Send + Sync>;

/// Fixed-rate clock. Late opportunities are dropped rather than replayed in a
/// burst.
pub struct IntervalFrameClock {
    interval: Interval,
}

impl IntervalFrameClock {
    pub fn new(period: Duration) -> Self {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }

    pub fn factory(period: Duration) -> FrameClockFactory {
        Arc::new(move || Box::new(IntervalFrameClock::new(period)) as Box<dyn FrameClock>)
    }
}

#[async_trait]
impl FrameClock for IntervalFrameClock {
    async fn tick(&mut self) {
        self.interval.tick().await;
    }
}
