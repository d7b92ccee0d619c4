#![forbid(unsafe_code)]

//! Host-driven frame and timer scheduling.
//!
//! Every time-driven component in this crate asks a [`Host`] for display
//! frames and timers instead of touching the browser directly. The web crate
//! implements [`Host`] on top of `requestAnimationFrame` / `setTimeout`;
//! [`ManualHost`] implements it with a clock that only moves when the caller
//! advances it, so whole mount/unmount cycles can be replayed in tests.
//!
//! # Invariants
//!
//! 1. Cancelling an unknown or already-fired id is a no-op.
//! 2. A frame callback requested while a frame is running lands in the next
//!    frame, never the current one.
//! 3. A frame cancelled while its batch is running does not run.
//! 4. Timers fire in deadline order; ties fire in scheduling order.
//! 5. A [`FrameLoop`] never has more than one outstanding frame request.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Handle for an outstanding frame request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub u64);

/// Handle for an outstanding timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// Callback run once on the next display frame with the frame timestamp.
pub type FrameCallback = Box<dyn FnOnce(Duration)>;

/// Callback run once when a timer elapses.
pub type TimerCallback = Box<dyn FnOnce()>;

/// Frame and timer capability supplied by the embedding environment.
///
/// All methods take `&self`: hosts are shared between components behind an
/// `Rc` and use interior mutability for their bookkeeping.
pub trait Host {
    /// Monotonic time since the host was created.
    fn now(&self) -> Duration;

    /// Run `callback` once on the next display frame.
    fn request_frame(&self, callback: FrameCallback) -> FrameId;

    /// Cancel a pending frame request.
    fn cancel_frame(&self, id: FrameId);

    /// Run `callback` once after `delay`.
    fn set_timeout(&self, delay: Duration, callback: TimerCallback) -> TimerId;

    /// Cancel a pending timer.
    fn clear_timeout(&self, id: TimerId);
}

// ---------------------------------------------------------------------------
// ManualHost
// ---------------------------------------------------------------------------

struct PendingTimer {
    id: TimerId,
    deadline: Duration,
    callback: TimerCallback,
}

#[derive(Default)]
struct ManualInner {
    now: Duration,
    next_id: u64,
    frames: Vec<(FrameId, FrameCallback)>,
    timers: Vec<PendingTimer>,
    frames_run: u64,
}

impl ManualInner {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Deterministic host whose clock is advanced explicitly.
///
/// ```
/// use std::rc::Rc;
/// use std::time::Duration;
/// use folio_core::runtime::{Host, ManualHost};
///
/// let host = Rc::new(ManualHost::new());
/// let fired = Rc::new(std::cell::Cell::new(false));
/// let flag = Rc::clone(&fired);
/// host.set_timeout(Duration::from_millis(50), Box::new(move || flag.set(true)));
///
/// host.advance(Duration::from_millis(49));
/// assert!(!fired.get());
/// host.advance(Duration::from_millis(1));
/// assert!(fired.get());
/// ```
#[derive(Default)]
pub struct ManualHost {
    inner: RefCell<ManualInner>,
}

impl std::fmt::Debug for ManualHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ManualHost")
            .field("now", &inner.now)
            .field("pending_frames", &inner.frames.len())
            .field("pending_timers", &inner.timers.len())
            .field("frames_run", &inner.frames_run)
            .finish()
    }
}

impl ManualHost {
    /// Nominal 60 Hz frame interval.
    pub const FRAME_INTERVAL: Duration = Duration::from_micros(16_667);

    /// Create a host at time zero with nothing scheduled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward by `dt`, firing every timer that falls due.
    ///
    /// Timers scheduled by a firing timer are honoured within the same call
    /// if their deadline is not past the new time.
    pub fn advance(&self, dt: Duration) {
        let target = self.inner.borrow().now.saturating_add(dt);
        loop {
            let due = {
                let mut inner = self.inner.borrow_mut();
                let next = inner
                    .timers
                    .iter()
                    .enumerate()
                    .filter(|(_, timer)| timer.deadline <= target)
                    .min_by_key(|(_, timer)| (timer.deadline, timer.id))
                    .map(|(idx, _)| idx);
                match next {
                    Some(idx) => {
                        let timer = inner.timers.remove(idx);
                        inner.now = inner.now.max(timer.deadline);
                        Some(timer.callback)
                    }
                    None => {
                        inner.now = target;
                        None
                    }
                }
            };
            match due {
                Some(callback) => callback(),
                None => break,
            }
        }
    }

    /// Run one display frame: every callback requested before this call.
    pub fn frame(&self) {
        let (batch, now) = {
            let mut inner = self.inner.borrow_mut();
            inner.frames_run += 1;
            let ids: Vec<FrameId> = inner.frames.iter().map(|(id, _)| *id).collect();
            (ids, inner.now)
        };
        for id in batch {
            let callback = {
                let mut inner = self.inner.borrow_mut();
                inner
                    .frames
                    .iter()
                    .position(|(pending, _)| *pending == id)
                    .map(|idx| inner.frames.remove(idx).1)
            };
            if let Some(callback) = callback {
                callback(now);
            }
        }
    }

    /// Advance by `interval` and run a frame, `count` times.
    pub fn run_frames(&self, count: usize, interval: Duration) {
        for _ in 0..count {
            self.advance(interval);
            self.frame();
        }
    }

    /// Number of frame requests not yet run or cancelled.
    #[must_use]
    pub fn pending_frames(&self) -> usize {
        self.inner.borrow().frames.len()
    }

    /// Number of timers not yet fired or cleared.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.inner.borrow().timers.len()
    }

    /// Number of frames run so far.
    #[must_use]
    pub fn frames_run(&self) -> u64 {
        self.inner.borrow().frames_run
    }
}

impl Host for ManualHost {
    fn now(&self) -> Duration {
        self.inner.borrow().now
    }

    fn request_frame(&self, callback: FrameCallback) -> FrameId {
        let mut inner = self.inner.borrow_mut();
        let id = FrameId(inner.next_id());
        inner.frames.push((id, callback));
        id
    }

    fn cancel_frame(&self, id: FrameId) {
        let removed = {
            let mut inner = self.inner.borrow_mut();
            inner
                .frames
                .iter()
                .position(|(pending, _)| *pending == id)
                .map(|idx| inner.frames.remove(idx))
        };
        // Dropped outside the borrow: the callback may own handles that
        // call back into the host when released.
        drop(removed);
    }

    fn set_timeout(&self, delay: Duration, callback: TimerCallback) -> TimerId {
        let mut inner = self.inner.borrow_mut();
        let id = TimerId(inner.next_id());
        let deadline = inner.now.saturating_add(delay);
        inner.timers.push(PendingTimer {
            id,
            deadline,
            callback,
        });
        id
    }

    fn clear_timeout(&self, id: TimerId) {
        let removed = {
            let mut inner = self.inner.borrow_mut();
            inner
                .timers
                .iter()
                .position(|timer| timer.id == id)
                .map(|idx| inner.timers.remove(idx))
        };
        drop(removed);
    }
}

// ---------------------------------------------------------------------------
// FrameLoop
// ---------------------------------------------------------------------------

/// Whether a [`FrameLoop`] step wants another frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    /// Schedule the step again on the next frame.
    Continue,
    /// Stop the loop; no further frame is requested.
    Break,
}

struct LoopInner {
    host: Rc<dyn Host>,
    pending: Cell<Option<FrameId>>,
    cancelled: Cell<bool>,
    step: RefCell<Box<dyn FnMut(Duration) -> LoopControl>>,
}

impl LoopInner {
    fn schedule(this: &Rc<Self>) {
        let weak: Weak<Self> = Rc::downgrade(this);
        let id = this.host.request_frame(Box::new(move |now| {
            if let Some(inner) = weak.upgrade() {
                Self::run(&inner, now);
            }
        }));
        this.pending.set(Some(id));
    }

    fn run(this: &Rc<Self>, now: Duration) {
        this.pending.set(None);
        if this.cancelled.get() {
            return;
        }
        let control = {
            let step = &mut *this.step.borrow_mut();
            step(now)
        };
        if control == LoopControl::Continue && !this.cancelled.get() {
            Self::schedule(this);
        }
    }
}

/// Runs a step once per display frame until it breaks or is cancelled.
///
/// The loop owns at most one outstanding frame request. Cancelling (or
/// dropping) the loop withdraws that request from the host, so the step can
/// never run after disposal.
pub struct FrameLoop {
    inner: Rc<LoopInner>,
}

impl std::fmt::Debug for FrameLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameLoop")
            .field("pending", &self.inner.pending.get())
            .field("cancelled", &self.inner.cancelled.get())
            .finish()
    }
}

impl FrameLoop {
    /// Start the loop; the first step runs on the next frame.
    pub fn start(
        host: Rc<dyn Host>,
        step: impl FnMut(Duration) -> LoopControl + 'static,
    ) -> Self {
        let inner = Rc::new(LoopInner {
            host,
            pending: Cell::new(None),
            cancelled: Cell::new(false),
            step: RefCell::new(Box::new(step)),
        });
        LoopInner::schedule(&inner);
        Self { inner }
    }

    /// Stop the loop and withdraw any pending frame request. Idempotent.
    pub fn cancel(&self) {
        if self.inner.cancelled.replace(true) {
            return;
        }
        if let Some(id) = self.inner.pending.take() {
            self.inner.host.cancel_frame(id);
        }
    }

    /// Whether a frame is still requested for this loop.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.inner.cancelled.get() && self.inner.pending.get().is_some()
    }
}

impl Drop for FrameLoop {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared_host() -> Rc<ManualHost> {
        Rc::new(ManualHost::new())
    }

    #[test]
    fn timers_fire_in_deadline_order() {
        let host = shared_host();
        let log = Rc::new(RefCell::new(Vec::new()));
        for (label, ms) in [("late", 30u64), ("early", 10), ("tie", 10)] {
            let log = Rc::clone(&log);
            host.set_timeout(
                Duration::from_millis(ms),
                Box::new(move || log.borrow_mut().push(label)),
            );
        }
        host.advance(Duration::from_millis(100));
        assert_eq!(*log.borrow(), vec!["early", "tie", "late"]);
        assert_eq!(host.now(), Duration::from_millis(100));
    }

    #[test]
    fn cleared_timer_never_fires() {
        let host = shared_host();
        let fired = Rc::new(Cell::new(false));
        let flag = Rc::clone(&fired);
        let id = host.set_timeout(Duration::from_millis(5), Box::new(move || flag.set(true)));
        host.clear_timeout(id);
        host.clear_timeout(id);
        host.advance(Duration::from_millis(10));
        assert!(!fired.get());
        assert_eq!(host.pending_timers(), 0);
    }

    #[test]
    fn frame_requested_during_frame_runs_next_frame() {
        let host = shared_host();
        let count = Rc::new(Cell::new(0));
        let inner_host = Rc::clone(&host);
        let inner_count = Rc::clone(&count);
        host.request_frame(Box::new(move |_| {
            inner_count.set(inner_count.get() + 1);
            let again = Rc::clone(&inner_count);
            inner_host.request_frame(Box::new(move |_| again.set(again.get() + 1)));
        }));
        host.frame();
        assert_eq!(count.get(), 1);
        host.frame();
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn frame_cancelled_mid_batch_is_skipped() {
        let host = shared_host();
        let ran = Rc::new(Cell::new(false));
        let victim_ran = Rc::clone(&ran);
        let victim_slot: Rc<Cell<Option<FrameId>>> = Rc::new(Cell::new(None));
        let slot = Rc::clone(&victim_slot);
        let canceller = Rc::clone(&host);
        host.request_frame(Box::new(move |_| {
            if let Some(id) = slot.get() {
                canceller.cancel_frame(id);
            }
        }));
        let victim = host.request_frame(Box::new(move |_| victim_ran.set(true)));
        victim_slot.set(Some(victim));
        host.frame();
        assert!(!ran.get());
    }

    #[test]
    fn frame_loop_runs_until_break() {
        let host = shared_host();
        let steps = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&steps);
        let frame_loop = FrameLoop::start(host.clone(), move |_| {
            counter.set(counter.get() + 1);
            if counter.get() == 3 {
                LoopControl::Break
            } else {
                LoopControl::Continue
            }
        });
        host.run_frames(10, ManualHost::FRAME_INTERVAL);
        assert_eq!(steps.get(), 3);
        assert!(!frame_loop.is_running());
        assert_eq!(host.pending_frames(), 0);
    }

    #[test]
    fn frame_loop_cancel_withdraws_request() {
        let host = shared_host();
        let steps = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&steps);
        let frame_loop = FrameLoop::start(host.clone(), move |_| {
            counter.set(counter.get() + 1);
            LoopControl::Continue
        });
        host.run_frames(2, ManualHost::FRAME_INTERVAL);
        frame_loop.cancel();
        frame_loop.cancel();
        assert_eq!(host.pending_frames(), 0);
        host.run_frames(5, ManualHost::FRAME_INTERVAL);
        assert_eq!(steps.get(), 2);
    }

    #[test]
    fn dropping_frame_loop_cancels_it() {
        let host = shared_host();
        let frame_loop = FrameLoop::start(host.clone(), |_| LoopControl::Continue);
        assert_eq!(host.pending_frames(), 1);
        drop(frame_loop);
        assert_eq!(host.pending_frames(), 0);
    }
}
