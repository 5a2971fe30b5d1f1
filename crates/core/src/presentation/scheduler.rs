use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::rotator::Rotator;
use super::DEFAULT_ROTATION_PERIOD;

/// Periodic tick that advances a [`Rotator`] for one list generation.
///
/// The task stops on its own once the rotator moves to another generation or
/// has nothing left to rotate; dropping the handle cancels it.
pub struct RotationTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
    generation: u64,
}

impl RotationTask {
    /// Spawns the tick loop on the current tokio runtime.
    pub fn spawn(rotator: Arc<Mutex<Rotator>>, period: Duration) -> Self {
        let period = effective_period(period);
        let token = CancellationToken::new();
        let generation = lock(&rotator).generation();
        let first_tick = Instant::now() + period;
        let handle = tokio::spawn(run(rotator, first_tick, period, generation, token.clone()));

        debug!(
            event_name = "upsell.rotation.started",
            generation,
            period_ms = period.as_millis() as u64,
            "rotation task started"
        );
        Self { token, handle, generation }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for RotationTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn run(
    rotator: Arc<Mutex<Rotator>>,
    first_tick: Instant,
    period: Duration,
    generation: u64,
    token: CancellationToken,
) {
    let mut ticker = interval_at(first_tick, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!(event_name = "upsell.rotation.cancelled", generation, "rotation task cancelled");
                return;
            }
            _ = ticker.tick() => {
                if !tick_generation(&rotator, generation) {
                    debug!(event_name = "upsell.rotation.stale", generation, "rotation task stopped");
                    return;
                }
            }
        }
    }
}

/// A zero period would make the interval panic; it falls back to the default.
pub fn effective_period(period: Duration) -> Duration {
    if period.is_zero() {
        warn!(
            event_name = "upsell.rotation.invalid_period",
            fallback_secs = DEFAULT_ROTATION_PERIOD.as_secs(),
            "rotation period must be non-zero; using the default"
        );
        return DEFAULT_ROTATION_PERIOD;
    }
    period
}

/// Advances the rotator if it still shows `generation`; false means stop.
fn tick_generation(rotator: &Mutex<Rotator>, generation: u64) -> bool {
    let mut rotator = lock(rotator);
    if rotator.generation() != generation || !rotator.needs_ticks() {
        return false;
    }
    rotator.tick();
    true
}

pub(crate) fn lock(rotator: &Mutex<Rotator>) -> std::sync::MutexGuard<'_, Rotator> {
    match rotator.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{effective_period, lock, RotationTask};
    use crate::domain::product::{Product, ProductCategory};
    use crate::presentation::{RotationState, Rotator, DEFAULT_ROTATION_PERIOD};
    use crate::suggestions::{RankedSuggestions, Suggestion, TriggerCategory};

    fn shared_rotator(count: usize) -> Arc<Mutex<Rotator>> {
        let suggestions = (0..count)
            .map(|index| Suggestion {
                rule_id: "rule".to_owned(),
                product: Product::new(
                    format!("p-{index}"),
                    format!("Product {index}"),
                    ProductCategory::Acai,
                    Decimal::ONE,
                ),
                message: String::new(),
                trigger: TriggerCategory::Affinity,
                priority: 1,
                confidence: 0.9,
                price_delta: None,
            })
            .collect();
        let mut rotator = Rotator::new();
        rotator.replace(Arc::new(RankedSuggestions {
            fingerprint: "fp".to_owned(),
            suggestions,
            computed_at: Utc::now(),
        }));
        Arc::new(Mutex::new(rotator))
    }

    async fn advance(duration: Duration) {
        tokio::time::advance(duration).await;
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn advances_once_per_period() {
        let rotator = shared_rotator(3);
        let _task = RotationTask::spawn(Arc::clone(&rotator), Duration::from_secs(8));

        advance(Duration::from_secs(7)).await;
        assert_eq!(lock(&rotator).state(), RotationState::Showing(0));

        advance(Duration::from_secs(1)).await;
        assert_eq!(lock(&rotator).state(), RotationState::Showing(1));

        advance(Duration::from_secs(8)).await;
        advance(Duration::from_secs(8)).await;
        assert_eq!(lock(&rotator).state(), RotationState::Showing(0));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_ticking() {
        let rotator = shared_rotator(2);
        let task = RotationTask::spawn(Arc::clone(&rotator), Duration::from_secs(8));

        task.cancel();
        advance(Duration::from_secs(20)).await;

        assert_eq!(lock(&rotator).state(), RotationState::Showing(0));
        assert!(task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_generation_stops_the_task() {
        let rotator = shared_rotator(2);
        let task = RotationTask::spawn(Arc::clone(&rotator), Duration::from_secs(8));

        lock(&rotator).dismiss();
        advance(Duration::from_secs(8)).await;

        assert_eq!(lock(&rotator).state(), RotationState::Idle);
        assert!(task.is_finished());
    }

    #[test]
    fn zero_period_falls_back_to_the_default() {
        assert_eq!(effective_period(Duration::ZERO), DEFAULT_ROTATION_PERIOD);
        assert_eq!(effective_period(Duration::from_secs(3)), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_period_task_keeps_ticking_at_the_default_pace() {
        let rotator = shared_rotator(2);
        let task = RotationTask::spawn(Arc::clone(&rotator), Duration::ZERO);

        advance(DEFAULT_ROTATION_PERIOD).await;

        assert_eq!(lock(&rotator).state(), RotationState::Showing(1));
        assert!(!task.is_finished());
    }
}
