//! Event kernel
//!
//! Drives the scheduler: pops the earliest event, advances the simulated
//! clock to its timestamp and dispatches it synchronously to an
//! [`EventHandler`]. One logical timeline, no threads. A handler error halts
//! the run and is returned to the caller.

use tracing::{debug, trace};

use crate::error::{KernelError, KernelResult, StarResult};
use crate::event::{Event, EventId, ScheduledEvent};
use crate::scheduler::Scheduler;
use crate::time::{Delay, SimTime};

/// Receiver of dispatched events
pub trait EventHandler {
    fn handle(&mut self, ctx: &mut KernelContext<'_>, scheduled: ScheduledEvent) -> StarResult<()>;
}

impl<F> EventHandler for F
where
    F: FnMut(&mut KernelContext<'_>, ScheduledEvent) -> StarResult<()>,
{
    fn handle(&mut self, ctx: &mut KernelContext<'_>, scheduled: ScheduledEvent) -> StarResult<()> {
        (self)(ctx, scheduled)
    }
}

/// Mutable view of the kernel handed to a handler during dispatch.
///
/// Handlers can read the clock and schedule follow-up events, nothing more.
pub struct KernelContext<'k> {
    scheduler: &'k mut Scheduler,
    now: SimTime,
}

impl<'k> KernelContext<'k> {
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Schedule `event` to fire `delay` after the current instant
    pub fn schedule(&mut self, event: Event, delay: Delay) -> KernelResult<EventId> {
        let at = self.now.plus(delay)?;
        trace!(%at, %event, "schedule");
        Ok(self.scheduler.schedule(at, event))
    }

    pub fn pending(&self) -> usize {
        self.scheduler.len()
    }
}

/// Outcome of a `run` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Events dispatched during this call
    pub dispatched: u64,
    /// Clock after the call
    pub now: SimTime,
    /// Events still queued
    pub pending: usize,
}

/// The discrete-event kernel
#[derive(Debug, Default)]
pub struct Kernel {
    scheduler: Scheduler,
    now: SimTime,
    processed: u64,
    terminated: bool,
    event_limit: Option<u64>,
}

impl Kernel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the total number of dispatched events; reaching it fails the run
    pub fn with_event_limit(mut self, limit: Option<u64>) -> Self {
        self.event_limit = limit;
        self
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Total events dispatched since creation
    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn pending(&self) -> usize {
        self.scheduler.len()
    }

    pub fn next_time(&self) -> Option<SimTime> {
        self.scheduler.next_time()
    }

    pub fn is_idle(&self) -> bool {
        self.scheduler.is_empty()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Schedule `event` after a signed delay.
    ///
    /// Negative delays are rejected with `InvalidDelay`; a terminated kernel
    /// rejects everything.
    pub fn schedule(&mut self, event: Event, delay: i64) -> KernelResult<EventId> {
        let delay = Delay::new(delay)?;
        self.schedule_after(event, delay)
    }

    pub fn schedule_after(&mut self, event: Event, delay: Delay) -> KernelResult<EventId> {
        if self.terminated {
            return Err(KernelError::Terminated);
        }
        let at = self.now.plus(delay)?;
        Ok(self.scheduler.schedule(at, event))
    }

    /// Dispatch exactly one event.
    ///
    /// Returns the dispatched event's timestamp, or `None` if the queue is
    /// empty or the kernel has been terminated.
    pub fn step(&mut self, handler: &mut dyn EventHandler) -> StarResult<Option<SimTime>> {
        if self.terminated {
            return Ok(None);
        }
        if let Some(limit) = self.event_limit
            && self.processed >= limit
            && !self.scheduler.is_empty()
        {
            return Err(KernelError::EventLimit(limit).into());
        }
        let Some(scheduled) = self.scheduler.pop_next() else {
            return Ok(None);
        };

        // The queue never yields an event older than the clock
        self.now = self.now.max(scheduled.at);
        self.processed += 1;
        trace!(id = %scheduled.id, now = %self.now, event = %scheduled.event, "dispatch");

        let mut ctx = KernelContext {
            scheduler: &mut self.scheduler,
            now: self.now,
        };
        handler.handle(&mut ctx, scheduled)?;
        Ok(Some(self.now))
    }

    /// Run until the queue is empty or the kernel is terminated
    pub fn run(&mut self, handler: &mut dyn EventHandler) -> StarResult<RunSummary> {
        let start = self.processed;
        while self.step(handler)?.is_some() {}
        Ok(self.summary(start))
    }

    /// Dispatch every event timestamped at or before `deadline`, then move
    /// the clock to `deadline`
    pub fn run_until(
        &mut self,
        deadline: SimTime,
        handler: &mut dyn EventHandler,
    ) -> StarResult<RunSummary> {
        let start = self.processed;
        while !self.terminated
            && let Some(next) = self.scheduler.next_time()
            && next <= deadline
        {
            self.step(handler)?;
        }
        if !self.terminated {
            self.now = self.now.max(deadline);
        }
        Ok(self.summary(start))
    }

    /// Stop accepting events and discard the queue.
    ///
    /// Returns the number of discarded events.
    pub fn terminate(&mut self) -> usize {
        if self.terminated {
            return 0;
        }
        self.terminated = true;
        let dropped = self.scheduler.clear();
        debug!(now = %self.now, dropped, "kernel terminated");
        dropped
    }

    fn summary(&self, start: u64) -> RunSummary {
        RunSummary {
            dispatched: self.processed - start,
            now: self.now,
            pending: self.scheduler.len(),
        }
    }
}
