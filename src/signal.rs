//! Binary, auto-resetting delivery signal.
//!
//! [`DeliverySignal`] is the only state shared between the driver thread and
//! the pipeline's delivery thread. Setting it is non-blocking; a successful
//! wait consumes it. Repeated sets before a wait collapse into a single
//! pending wake that carries the most recent [`FrameStamp`], if any.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::time::ReferenceTime;

/// Presentation span of the frame that set a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStamp {
    /// Presentation start time.
    pub start: ReferenceTime,
    /// Presentation stop time.
    pub stop: ReferenceTime,
}

impl FrameStamp {
    /// Returns `true` if the frame covers `target` or lies after it.
    pub fn reaches(&self, target: ReferenceTime) -> bool {
        self.stop > target || self.start >= target
    }
}

/// Result of [`DeliverySignal::wait_reaching`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The signal was set by a frame that reaches the target, or by an
    /// unstamped [`set`](DeliverySignal::set).
    Signalled(Option<FrameStamp>),
    /// The timeout elapsed first.
    TimedOut,
}

#[derive(Debug, Default)]
struct Slot {
    set: bool,
    stamp: Option<FrameStamp>,
}

impl Slot {
    fn take(&mut self) -> Option<FrameStamp> {
        self.set = false;
        self.stamp.take()
    }
}

#[derive(Debug, Default)]
struct SignalState {
    slot: Mutex<Slot>,
    condvar: Condvar,
}

/// Auto-reset event shared between a driver and the observers it hands out.
///
/// Clones share the same underlying state.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use framegrab::DeliverySignal;
///
/// let signal = DeliverySignal::new();
/// signal.set();
/// signal.set();
/// assert!(signal.wait_timeout(Duration::from_millis(10)));
/// // The two sets collapsed into one wake.
/// assert!(!signal.wait_timeout(Duration::from_millis(10)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct DeliverySignal {
    shared: Arc<SignalState>,
}

impl DeliverySignal {
    /// Create a signal in the cleared state.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.shared
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the signal without a frame stamp, waking one waiter.
    pub fn set(&self) {
        let mut slot = self.lock();
        slot.set = true;
        slot.stamp = None;
        self.shared.condvar.notify_one();
    }

    /// Set the signal on behalf of a frame spanning `stamp`.
    pub fn set_stamped(&self, stamp: FrameStamp) {
        let mut slot = self.lock();
        slot.set = true;
        slot.stamp = Some(stamp);
        self.shared.condvar.notify_one();
    }

    /// Clear any pending set without waiting.
    pub fn reset(&self) {
        self.lock().take();
    }

    /// Returns `true` if a set is pending.
    pub fn is_set(&self) -> bool {
        self.lock().set
    }

    /// Block until the signal is set, then clear it.
    pub fn wait(&self) {
        let guard = self.lock();
        let mut slot = self
            .shared
            .condvar
            .wait_while(guard, |slot| !slot.set)
            .unwrap_or_else(PoisonError::into_inner);
        slot.take();
    }

    /// Block for at most `timeout` waiting for the signal.
    ///
    /// Returns `true` (and clears the signal) if it was set in time.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self.lock();
        let (mut slot, _) = self
            .shared
            .condvar
            .wait_timeout_while(guard, timeout, |slot| !slot.set)
            .unwrap_or_else(PoisonError::into_inner);
        if slot.set {
            slot.take();
            true
        } else {
            false
        }
    }

    /// Block for at most `timeout` waiting for a set that reaches `target`.
    ///
    /// Stamped sets from frames entirely before `target` are consumed and
    /// ignored. Unstamped sets always satisfy the wait.
    pub fn wait_reaching(&self, target: ReferenceTime, timeout: Duration) -> WaitOutcome {
        let deadline = Instant::now().checked_add(timeout);
        let mut slot = self.lock();
        loop {
            if slot.set {
                match slot.take() {
                    Some(stamp) if !stamp.reaches(target) => {
                        log::trace!(
                            "Ignoring frame {}..{} while waiting for {target}",
                            stamp.start,
                            stamp.stop
                        );
                    }
                    stamp => return WaitOutcome::Signalled(stamp),
                }
            }

            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => timeout,
            };
            if remaining.is_zero() {
                return WaitOutcome::TimedOut;
            }
            let (guard, _) = self
                .shared
                .condvar
                .wait_timeout(slot, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            slot = guard;
        }
    }
}
