use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::time::{Instant, sleep_until};

use crate::{core::state::SgReadyState, prelude::*, sink::Sink};

/// Sink wrapper that keeps at least the configured interval between two applied states.
///
/// Requests that arrive too early are not queued: only the latest one is kept and applied
/// once the interval has elapsed.
#[must_use]
#[derive(Clone)]
pub struct DebounceActuator(Arc<Inner>);

struct Inner {
    interval: Duration,
    sink: Arc<dyn Sink>,
    epoch: Instant,

    /// Last applied state.
    current: Slot,

    /// Latest request that has not been applied yet.
    pending: Slot,

    /// Nanoseconds since [`Self::epoch`].
    last_apply: AtomicU64,

    timer_scheduled: AtomicBool,
}

/// Atomic optional state.
struct Slot(AtomicU8);

impl Slot {
    const NONE: u8 = u8::MAX;

    const fn empty() -> Self {
        Self(AtomicU8::new(Self::NONE))
    }

    fn load(&self) -> Option<SgReadyState> {
        Self::decode(self.0.load(Ordering::Acquire))
    }

    fn store(&self, state: Option<SgReadyState>) {
        self.0.store(Self::encode(state), Ordering::Release);
    }

    fn take(&self) -> Option<SgReadyState> {
        Self::decode(self.0.swap(Self::NONE, Ordering::AcqRel))
    }

    fn encode(state: Option<SgReadyState>) -> u8 {
        state.map_or(Self::NONE, SgReadyState::to_bits)
    }

    fn decode(bits: u8) -> Option<SgReadyState> {
        (bits != Self::NONE).then(|| SgReadyState::from_bits(bits))
    }
}

impl DebounceActuator {
    const NEVER: u64 = u64::MAX;

    pub fn new(interval: Duration, sink: Arc<dyn Sink>) -> Self {
        Self(Arc::new(Inner {
            interval,
            sink,
            epoch: Instant::now(),
            current: Slot::empty(),
            pending: Slot::empty(),
            last_apply: AtomicU64::new(Self::NEVER),
            timer_scheduled: AtomicBool::new(false),
        }))
    }

    /// Last state passed to the sink, if any.
    #[must_use]
    pub fn current(&self) -> Option<SgReadyState> {
        self.0.current.load()
    }

    /// Latest request waiting for the interval to elapse.
    #[must_use]
    pub fn pending(&self) -> Option<SgReadyState> {
        self.0.pending.load()
    }

    /// Whether the sink reflects the most recent request.
    #[must_use]
    pub fn is_synchronized(&self) -> bool {
        self.pending().is_none()
    }

    /// Apply the state now if the interval allows, otherwise postpone it.
    ///
    /// Only errors of an immediate application are returned, delayed ones are logged.
    #[instrument(skip_all, fields(state = state.name()))]
    pub async fn request(&self, state: SgReadyState, now: Instant) -> Result {
        if self.current() == Some(state) {
            // A return to the applied state supersedes whatever is pending.
            self.0.pending.store(None);
            return Ok(());
        }
        if self.0.next_allowed().is_none_or(|next_allowed| now >= next_allowed) {
            self.0.pending.store(None);
            return self.0.apply(state, now).await;
        }
        self.0.pending.store(Some(state));
        if self
            .0
            .timer_scheduled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            debug!(next_allowed = ?self.0.next_allowed(), "postponed");
            tokio::spawn(Arc::clone(&self.0).fire());
        } else {
            debug!("superseded the pending state");
        }
        Ok(())
    }
}

impl Inner {
    fn next_allowed(&self) -> Option<Instant> {
        let last_apply = self.last_apply.load(Ordering::Acquire);
        (last_apply != DebounceActuator::NEVER)
            .then(|| self.epoch + Duration::from_nanos(last_apply) + self.interval)
    }

    async fn apply(&self, state: SgReadyState, now: Instant) -> Result {
        self.current.store(Some(state));
        let since_epoch = now.saturating_duration_since(self.epoch).as_nanos();
        let last_apply = u64::try_from(since_epoch).unwrap_or(DebounceActuator::NEVER - 1);
        self.last_apply.store(last_apply, Ordering::Release);
        debug!("applying {state}");
        self.sink.on_state(state).await
    }

    async fn fire(self: Arc<Self>) {
        // Re-check the deadline on wake-up: an immediate application may have moved it.
        while let Some(next_allowed) = self.next_allowed() {
            if Instant::now() >= next_allowed {
                break;
            }
            sleep_until(next_allowed).await;
        }
        self.timer_scheduled.store(false, Ordering::Release);
        let Some(state) = self.pending.take() else {
            return;
        };
        if self.current.load() == Some(state) {
            return;
        }
        if let Err(error) = self.apply(state, Instant::now()).await {
            error!("failed to apply the postponed {state}: {error:#}");
        }
    }
}

#[async_trait]
impl Sink for DebounceActuator {
    async fn on_state(&self, state: SgReadyState) -> Result {
        self.request(state, Instant::now()).await
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use tokio::time::sleep;

    use super::*;

    /// Records every received state together with the time it arrived.
    struct TimedSink {
        start: Instant,
        applied: Mutex<Vec<(Duration, SgReadyState)>>,
    }

    struct Harness {
        start: Instant,
        sink: Arc<TimedSink>,
        actuator: DebounceActuator,
    }

    impl Harness {
        fn new(interval: Duration) -> Self {
            let start = Instant::now();
            let sink = Arc::new(TimedSink { start, applied: Mutex::default() });
            let actuator = DebounceActuator::new(interval, sink.clone());
            Self { start, sink, actuator }
        }

        async fn request(&self, state: SgReadyState) -> Result {
            self.actuator.request(state, Instant::now()).await
        }

        async fn sleep_until(&self, offset: Duration) {
            sleep_until(self.start + offset).await;
        }

        fn applied(&self) -> Vec<(Duration, SgReadyState)> {
            self.sink.applied.lock().clone()
        }
    }

    #[async_trait]
    impl Sink for TimedSink {
        async fn on_state(&self, state: SgReadyState) -> Result {
            self.applied.lock().push((self.start.elapsed(), state));
            Ok(())
        }
    }

    const fn minutes(minutes: u64) -> Duration {
        Duration::from_secs(60 * minutes)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_request_is_applied_immediately() -> Result {
        let harness = Harness::new(minutes(5));
        assert_eq!(harness.actuator.current(), None);

        harness.request(SgReadyState::EXCESS_PV).await?;
        assert_eq!(harness.actuator.current(), Some(SgReadyState::EXCESS_PV));
        assert!(harness.actuator.is_synchronized());
        assert_eq!(harness.applied().len(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_collapse_to_latest() -> Result {
        let harness = Harness::new(minutes(5));
        harness.request(SgReadyState::NORMAL).await?;

        harness.request(SgReadyState::AVAILABLE_PV).await?;
        harness.sleep_until(minutes(1)).await;
        harness.request(SgReadyState::EXCESS_PV).await?;
        assert_eq!(harness.actuator.pending(), Some(SgReadyState::EXCESS_PV));

        harness.sleep_until(minutes(5) - Duration::from_secs(1)).await;
        assert_eq!(harness.actuator.current(), Some(SgReadyState::NORMAL));

        harness.sleep_until(minutes(10)).await;
        let applied = harness.applied();
        let states: Vec<_> = applied.iter().map(|(_, state)| *state).collect();
        assert_eq!(states, [SgReadyState::NORMAL, SgReadyState::EXCESS_PV]);
        assert_eq!(applied[1].0, minutes(5));
        assert!(harness.actuator.is_synchronized());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_waits_for_the_moved_deadline() -> Result {
        let harness = Harness::new(minutes(5));
        harness.request(SgReadyState::NORMAL).await?;
        harness.request(SgReadyState::EXCESS_PV).await?;
        assert_eq!(harness.actuator.pending(), Some(SgReadyState::EXCESS_PV));

        // A request stamped at the deadline gets ahead of the sleeping timer.
        harness.sleep_until(minutes(5) - Duration::from_secs(1)).await;
        harness.actuator.request(SgReadyState::AVAILABLE_PV, harness.start + minutes(5)).await?;
        assert_eq!(harness.actuator.current(), Some(SgReadyState::AVAILABLE_PV));
        harness.request(SgReadyState::EXCESS_PV).await?;
        assert_eq!(harness.actuator.pending(), Some(SgReadyState::EXCESS_PV));

        harness.sleep_until(minutes(10) - Duration::from_secs(1)).await;
        assert_eq!(harness.actuator.current(), Some(SgReadyState::AVAILABLE_PV));
        assert_eq!(harness.applied().len(), 2);

        harness.sleep_until(minutes(11)).await;
        let applied = harness.applied();
        assert_eq!(applied.len(), 3);
        assert_eq!(applied[2], (minutes(10), SgReadyState::EXCESS_PV));
        assert!(harness.actuator.is_synchronized());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_postponed_state_is_applied_at_the_deadline() -> Result {
        let harness = Harness::new(minutes(5));
        harness.request(SgReadyState::NORMAL).await?;
        harness.sleep_until(minutes(2)).await;
        harness.request(SgReadyState::EXCESS_PV).await?;

        harness.sleep_until(minutes(8)).await;
        let applied = harness.applied();
        assert_eq!(applied.len(), 2);
        assert_eq!(applied[1].1, SgReadyState::EXCESS_PV);
        assert!(applied[1].0 >= applied[0].0 + minutes(5));
        assert!(applied[1].0 < minutes(5) + Duration::from_secs(1));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_after_interval() -> Result {
        let harness = Harness::new(minutes(5));
        harness.request(SgReadyState::NORMAL).await?;
        harness.sleep_until(minutes(6)).await;
        harness.request(SgReadyState::AVAILABLE_PV).await?;
        assert_eq!(harness.actuator.current(), Some(SgReadyState::AVAILABLE_PV));
        assert!(harness.actuator.is_synchronized());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_return_to_current_cancels_pending() -> Result {
        let harness = Harness::new(minutes(5));
        harness.request(SgReadyState::NORMAL).await?;
        harness.request(SgReadyState::EXCESS_PV).await?;
        harness.sleep_until(minutes(1)).await;
        harness.request(SgReadyState::NORMAL).await?;
        assert!(harness.actuator.is_synchronized());

        harness.sleep_until(minutes(10)).await;
        assert_eq!(harness.applied().len(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_request_is_not_forwarded() -> Result {
        let harness = Harness::new(minutes(5));
        for _ in 0..3 {
            harness.request(SgReadyState::AVAILABLE_PV).await?;
            sleep(minutes(10)).await;
        }
        assert_eq!(harness.applied().len(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_forwards_immediately() -> Result {
        let harness = Harness::new(Duration::ZERO);
        harness.request(SgReadyState::NORMAL).await?;
        harness.request(SgReadyState::EXCESS_PV).await?;
        harness.request(SgReadyState::AVAILABLE_PV).await?;
        let states: Vec<_> = harness.applied().into_iter().map(|(_, state)| state).collect();
        assert_eq!(
            states,
            [SgReadyState::NORMAL, SgReadyState::EXCESS_PV, SgReadyState::AVAILABLE_PV],
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_sink_interface() -> Result {
        let harness = Harness::new(minutes(5));
        let sink: Arc<dyn Sink> = Arc::new(harness.actuator.clone());
        sink.on_state(SgReadyState::BLOCKED).await?;
        assert_eq!(harness.actuator.current(), Some(SgReadyState::BLOCKED));
        Ok(())
    }
}
