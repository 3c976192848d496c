// Shared connection state and capture pacing. Both engines hold an
// Arc<DeviceLink>; the delay doubles as the failure backoff knob.
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info};
use tokio::sync::{Notify, mpsc};
use tokio::time::sleep;

use crate::events::BridgeEvent;

/// Additive backoff step, milliseconds.
pub const DELAY_STEP: u64 = 150;
/// Lower clamp for the pacing delay.
pub const DELAY_MINI: u64 = 100;
pub const DELAY_FAST: u64 = 200;
pub const DELAY_NORMAL: u64 = 400;
pub const DELAY_SLOW: u64 = 800;
/// Upper clamp for the pacing delay.
pub const DELAY_MAX: u64 = 2000;
/// Sentinel: park until the connection state changes.
pub const DELAY_INFINITE: u64 = u64::MAX;

struct LinkState {
    connected: bool,
    delay_ms: u64,
}

/// Connected/disconnected state plus the clamped pacing delay, with a
/// cancelable timed wait. State transitions go out on the event channel.
pub struct DeviceLink {
    state: Mutex<LinkState>,
    wake: Notify,
    events: mpsc::Sender<BridgeEvent>,
}

impl DeviceLink {
    pub fn new(events: mpsc::Sender<BridgeEvent>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(LinkState {
                connected: false,
                delay_ms: DELAY_NORMAL,
            }),
            wake: Notify::new(),
            events,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// Record a connection transition. Emits `DeviceFound` or
    /// `DeviceDisconnected` and wakes every parked `loop_delay`; calls
    /// that do not change the state are silent.
    pub async fn set_connected(&self, connected: bool) {
        let changed = {
            let mut state = self.lock();
            let changed = state.connected != connected;
            state.connected = connected;
            changed
        };
        if !changed {
            return;
        }
        info!(
            "device link {}",
            if connected { "connected" } else { "lost" }
        );
        self.wake.notify_waiters();
        let event = if connected {
            BridgeEvent::DeviceFound
        } else {
            BridgeEvent::DeviceDisconnected
        };
        let _ = self.events.send(event).await;
    }

    /// Report that a device wait ran out without a state change, so the
    /// consumer can decide whether to keep probing.
    pub async fn report_wait_timeout(&self) {
        let _ = self.events.send(BridgeEvent::DeviceWaitTimeout).await;
    }

    pub fn delay(&self) -> u64 {
        self.lock().delay_ms
    }

    /// Set the pacing delay, clamped into [`DELAY_MINI`, `DELAY_MAX`].
    /// Returns the stored value.
    pub fn set_delay(&self, ms: u64) -> u64 {
        let clamped = ms.clamp(DELAY_MINI, DELAY_MAX);
        self.lock().delay_ms = clamped;
        clamped
    }

    pub fn set_mini_delay(&self) -> u64 {
        self.set_delay(DELAY_MINI)
    }

    pub fn set_max_delay(&self) -> u64 {
        self.set_delay(DELAY_MAX)
    }

    /// Park subsequent `loop_delay` calls until the next state change.
    pub fn set_infinite_delay(&self) {
        self.lock().delay_ms = DELAY_INFINITE;
    }

    /// Add one backoff step, capped at `DELAY_MAX`; the result is never
    /// smaller than the previous value. The INFINITE sentinel is left
    /// alone. Returns the new delay.
    pub fn increase_delay(&self) -> u64 {
        let mut state = self.lock();
        if state.delay_ms != DELAY_INFINITE {
            state.delay_ms = (state.delay_ms + DELAY_STEP).min(DELAY_MAX);
        }
        state.delay_ms
    }

    /// Sleep for the current delay. Returns early when the connection
    /// state changes; with `DELAY_INFINITE` it parks until that happens.
    pub async fn loop_delay(&self) {
        let ms = self.delay();
        if ms == DELAY_INFINITE {
            debug!("link parked until next connection change");
            self.wake.notified().await;
            return;
        }
        let woken = self.wake.notified();
        tokio::select! {
            _ = sleep(Duration::from_millis(ms)) => {}
            _ = woken => {}
        }
    }

    /// Park until a device is attached; returns at once when one already
    /// is. Wakeup interest is registered before the state check, so a
    /// connect landing between the two is not lost.
    pub async fn wait_until_connected(&self) {
        loop {
            let woken = self.wake.notified();
            tokio::pin!(woken);
            woken.as_mut().enable();
            if self.is_connected() {
                return;
            }
            woken.await;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LinkState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{Instant, timeout};

    fn test_link() -> (Arc<DeviceLink>, mpsc::Receiver<BridgeEvent>) {
        let (tx, rx) = mpsc::channel(32);
        (DeviceLink::new(tx), rx)
    }

    #[tokio::test]
    async fn test_set_delay_clamps_both_ends() {
        let (link, _rx) = test_link();
        assert_eq!(link.set_delay(0), DELAY_MINI, "below MINI clamps up");
        assert_eq!(link.set_delay(10_000), DELAY_MAX, "above MAX clamps down");
        assert_eq!(link.set_delay(DELAY_SLOW), DELAY_SLOW, "in-range sticks");
    }

    #[tokio::test]
    async fn test_increase_delay_monotone_and_capped() {
        let (link, _rx) = test_link();
        link.set_mini_delay();

        let mut previous = link.delay();
        for _ in 0..40 {
            let next = link.increase_delay();
            assert!(next >= previous, "delay must never decrease");
            assert!(next <= DELAY_MAX, "delay must never exceed DELAY_MAX");
            previous = next;
        }
        assert_eq!(previous, DELAY_MAX, "repeated increases must reach the cap");
    }

    #[tokio::test]
    async fn test_increase_delay_leaves_infinite_parked() {
        let (link, _rx) = test_link();
        link.set_infinite_delay();
        assert_eq!(link.increase_delay(), DELAY_INFINITE);
    }

    #[tokio::test]
    async fn test_connection_transitions_emit_once() {
        let (link, mut rx) = test_link();

        link.set_connected(true).await;
        link.set_connected(true).await;
        link.set_connected(false).await;

        assert!(
            matches!(rx.recv().await, Some(BridgeEvent::DeviceFound)),
            "first transition emits DeviceFound"
        );
        assert!(
            matches!(rx.recv().await, Some(BridgeEvent::DeviceDisconnected)),
            "repeat set_connected(true) must not emit a second event"
        );
        assert!(
            rx.try_recv().is_err(),
            "no further events should be queued"
        );
    }

    #[tokio::test]
    async fn test_loop_delay_interrupted_by_state_change() {
        let (link, _rx) = test_link();
        link.set_max_delay();

        let waker = link.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            waker.set_connected(true).await;
        });

        let started = Instant::now();
        link.loop_delay().await;
        assert!(
            started.elapsed() < Duration::from_millis(DELAY_MAX),
            "a state change must cut the wait short"
        );
    }

    #[tokio::test]
    async fn test_infinite_delay_parks_until_notified() {
        let (link, _rx) = test_link();
        link.set_infinite_delay();

        let waker = link.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            waker.set_connected(true).await;
        });

        let started = Instant::now();
        link.loop_delay().await;
        let elapsed = started.elapsed();
        assert!(
            elapsed >= Duration::from_millis(40) && elapsed < Duration::from_secs(5),
            "park must end on the state change, elapsed: {elapsed:?}"
        );
    }

    #[tokio::test]
    async fn test_wait_until_connected_parks_then_releases() {
        let (link, _rx) = test_link();

        let parked = link.clone();
        let waiter = tokio::spawn(async move {
            parked.wait_until_connected().await;
        });

        sleep(Duration::from_millis(50)).await;
        assert!(
            !waiter.is_finished(),
            "the wait must hold while no device is attached"
        );

        link.set_connected(true).await;
        timeout(Duration::from_secs(1), waiter)
            .await
            .expect("connect must release the wait")
            .expect("waiter task must not panic");
    }

    #[tokio::test]
    async fn test_wait_until_connected_is_immediate_when_connected() {
        let (link, _rx) = test_link();
        link.set_connected(true).await;

        timeout(Duration::from_millis(50), link.wait_until_connected())
            .await
            .expect("an attached device must not be waited for");
    }

    #[tokio::test]
    async fn test_wait_timeout_report() {
        let (link, mut rx) = test_link();
        link.report_wait_timeout().await;
        assert!(matches!(rx.recv().await, Some(BridgeEvent::DeviceWaitTimeout)));
    }
}
