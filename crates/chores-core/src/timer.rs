//! # Single-Shot Timers
//!
//! Debounce and cooldown windows are modeled as an explicit [`Timer`] owned by
//! the detector that needs it. A timer holds at most one pending deadline;
//! scheduling again supersedes the previous one.
//!
//! Nothing fires on its own: the owner calls [`Timer::take_expired`] whenever
//! it is polled, and the registry reports the earliest pending deadline so the
//! host can wake up at the right moment.
//!
//! Handles make cancellation idempotent. Cancelling with a handle that was
//! already fired, already cancelled, or superseded by a newer schedule is a
//! no-op.

use chrono::{DateTime, TimeDelta, Utc};

/// Identifies one scheduling of a [`Timer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle(u64);

/// A cancellable, single-shot deadline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timer {
    deadline: Option<DateTime<Utc>>,
    generation: u64,
}

impl Timer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer to fire `delay` after `now`.
    ///
    /// A deadline past the representable range never fires.
    pub fn schedule(&mut self, now: DateTime<Utc>, delay: TimeDelta) -> TimerHandle {
        self.schedule_at(
            now.checked_add_signed(delay)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        )
    }

    /// Arm the timer for an absolute deadline, superseding any pending one.
    pub fn schedule_at(&mut self, deadline: DateTime<Utc>) -> TimerHandle {
        self.generation = self.generation.wrapping_add(1);
        self.deadline = Some(deadline);
        TimerHandle(self.generation)
    }

    /// Cancel the scheduling identified by `handle`.
    ///
    /// Returns true only if a pending deadline was actually removed.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        if handle.0 == self.generation && self.deadline.is_some() {
            self.deadline = None;
            true
        } else {
            false
        }
    }

    /// Fire the timer if its deadline has passed.
    ///
    /// Returns true exactly once per scheduling.
    pub fn take_expired(&mut self, now: DateTime<Utc>) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    #[must_use]
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }
}
