//! Update Scheduler - frame-aligned, cancellable render requests.
//!
//! A render request is a single-shot callback for "the next frame". The
//! instance holds the [`FrameHandle`] of its pending request and cancels it
//! before requesting again, so a burst of writes collapses into the last
//! request and exactly one render.
//!
//! The runtime owns a `Box<dyn FrameScheduler>`:
//! - [`ManualScheduler`]: everything pending is due on the next flush
//! - [`FrameClock`]: requests are due at the next frame boundary
//!
//! # Example
//!
//! ```ignore
//! let mut runtime = Runtime::with_scheduler(config, Box::new(FrameClock::new(interval)));
//! loop {
//!     runtime.flush()?;
//!     std::thread::sleep(interval);
//! }
//! ```

use std::time::{Duration, Instant};

use crate::types::InstanceId;

/// Handle of a pending frame request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

/// Source of frame callbacks.
pub trait FrameScheduler {
    /// Request a frame for `instance`.
    fn request_frame(&mut self, instance: InstanceId) -> FrameHandle;

    /// Cancel a pending request. Unknown or fired handles are ignored.
    fn cancel_frame(&mut self, handle: FrameHandle);

    /// Remove and return the instances whose frame is due at `now`, in
    /// request order.
    fn take_due(&mut self, now: Instant) -> Vec<InstanceId>;

    /// Number of pending requests.
    fn pending(&self) -> usize;
}

// =============================================================================
// Manual
// =============================================================================

/// Scheduler whose frames fire whenever the host flushes.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    queue: Vec<(FrameHandle, InstanceId)>,
    next_handle: u64,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self, instance: InstanceId) -> FrameHandle {
        let handle = FrameHandle(self.next_handle);
        self.next_handle += 1;
        self.queue.push((handle, instance));
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        self.queue.retain(|(h, _)| *h != handle);
    }

    fn take_due(&mut self, _now: Instant) -> Vec<InstanceId> {
        self.queue.drain(..).map(|(_, id)| id).collect()
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }
}

// =============================================================================
// Frame clock
// =============================================================================

/// Scheduler aligned to a fixed frame interval.
///
/// A request made during frame `n` (counted from the clock's origin) is due
/// at the start of frame `n + 1`.
#[derive(Debug)]
pub struct FrameClock {
    interval: Duration,
    origin: Instant,
    queue: Vec<(FrameHandle, InstanceId, Instant)>,
    next_handle: u64,
}

impl FrameClock {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            origin: Instant::now(),
            queue: Vec::new(),
            next_handle: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Frame boundary following `now`.
    pub fn next_frame_after(&self, now: Instant) -> Instant {
        let elapsed = now.saturating_duration_since(self.origin).as_nanos();
        let interval = self.interval.as_nanos();
        let frames = elapsed / interval + 1;
        let offset = frames.saturating_mul(interval);
        self.origin + Duration::from_nanos(u64::try_from(offset).unwrap_or(u64::MAX))
    }

    /// Earliest pending deadline, for hosts that sleep until the next frame.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.queue.iter().map(|(_, _, at)| *at).min()
    }

    fn request_at(&mut self, instance: InstanceId, now: Instant) -> FrameHandle {
        let handle = FrameHandle(self.next_handle);
        self.next_handle += 1;
        let due = self.next_frame_after(now);
        self.queue.push((handle, instance, due));
        handle
    }
}

impl FrameScheduler for FrameClock {
    fn request_frame(&mut self, instance: InstanceId) -> FrameHandle {
        self.request_at(instance, Instant::now())
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        self.queue.retain(|(h, _, _)| *h != handle);
    }

    fn take_due(&mut self, now: Instant) -> Vec<InstanceId> {
        let mut due = Vec::new();
        self.queue.retain(|(_, id, at)| {
            if *at <= now {
                due.push(*id);
                false
            } else {
                true
            }
        });
        due
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_cancel_and_take() {
        let mut scheduler = ManualScheduler::new();
        let first = scheduler.request_frame(InstanceId(1));
        scheduler.request_frame(InstanceId(2));
        scheduler.cancel_frame(first);
        let again = scheduler.request_frame(InstanceId(1));
        assert_ne!(first, again);
        assert_eq!(scheduler.pending(), 2);

        let due = scheduler.take_due(Instant::now());
        assert_eq!(due, vec![InstanceId(2), InstanceId(1)]);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_cancel_unknown_handle_is_ignored() {
        let mut scheduler = ManualScheduler::new();
        let handle = scheduler.request_frame(InstanceId(1));
        scheduler.take_due(Instant::now());
        scheduler.cancel_frame(handle);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_frame_clock_alignment() {
        let interval = Duration::from_millis(16);
        let mut clock = FrameClock::new(interval);
        let origin = clock.origin;

        assert_eq!(clock.next_frame_after(origin), origin + interval);
        assert_eq!(
            clock.next_frame_after(origin + Duration::from_millis(20)),
            origin + interval * 2
        );

        let handle = clock.request_at(InstanceId(3), origin + Duration::from_millis(5));
        assert_eq!(clock.next_deadline(), Some(origin + interval));
        assert!(clock.take_due(origin + Duration::from_millis(10)).is_empty());
        assert_eq!(clock.take_due(origin + interval), vec![InstanceId(3)]);

        clock.cancel_frame(handle);
        assert_eq!(clock.pending(), 0);
    }

    #[test]
    fn test_frame_clock_cancel() {
        let mut clock = FrameClock::new(Duration::from_millis(16));
        let origin = clock.origin;
        let handle = clock.request_at(InstanceId(1), origin);
        clock.cancel_frame(handle);
        assert!(clock.take_due(origin + Duration::from_secs(1)).is_empty());
    }
}
