//! Cooperative one-shot timer scheduler
//!
//! Every timed behavior in the kiosk (poll cadences, control pulses,
//! session timeouts) runs through a single fixed-capacity timer table.
//! The table is dispatched once per tick with run-to-completion
//! semantics: no callback ever runs concurrently with another or with
//! the dispatching caller, so components need no synchronization among
//! themselves.
//!
//! Capacity is deliberately small ([`SCHEDULER_SLOTS`]). Each state
//! machine holds at most one outstanding task, so exhausting the table
//! means a component is leaking timers and the process aborts rather
//! than limping on with lost deadlines.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use cardvend_core::constants::SCHEDULER_SLOTS;

/// Handle to a scheduled task, returned by [`Scheduler::schedule`].
///
/// Handles stay valid forever: cancelling a task that already fired or
/// was already cancelled is a no-op, even if its slot has since been
/// reused for an unrelated task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskHandle {
    slot: usize,
    generation: u32,
}

struct Slot {
    deadline: Duration,
    seq: u64,
    callback: Box<dyn FnOnce()>,
}

struct Inner {
    /// Virtual monotonic clock, advanced by the tick loop.
    now: Duration,
    next_seq: u64,
    slots: [Option<Slot>; SCHEDULER_SLOTS],
    /// Bumped each time a slot is occupied, so stale handles miss.
    generations: [u32; SCHEDULER_SLOTS],
}

/// Fixed-capacity one-shot timer table with run-to-completion dispatch.
///
/// Cloning is cheap and every clone refers to the same table. A fired
/// callback may itself schedule or cancel tasks, including re-arming
/// itself; the table releases its internal borrow before any callback
/// runs.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<RefCell<Inner>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                now: Duration::ZERO,
                next_seq: 0,
                slots: [const { None }; SCHEDULER_SLOTS],
                generations: [0; SCHEDULER_SLOTS],
            })),
        }
    }

    /// Advances the virtual clock by `elapsed`.
    ///
    /// Nothing fires here; deadlines are only acted on by
    /// [`Scheduler::dispatch`].
    pub fn advance(&self, elapsed: Duration) {
        self.inner.borrow_mut().now += elapsed;
    }

    /// Current position of the virtual clock.
    pub fn now(&self) -> Duration {
        self.inner.borrow().now
    }

    /// Registers a one-shot task to fire no earlier than `delay` from now.
    ///
    /// # Panics
    ///
    /// Panics if the timer table is full. Callers must bound their
    /// outstanding tasks; running out of slots is a programming error,
    /// not a runtime condition to recover from.
    pub fn schedule<F>(&self, delay: Duration, callback: F) -> TaskHandle
    where
        F: FnOnce() + 'static,
    {
        let mut inner = self.inner.borrow_mut();
        let deadline = inner.now + delay;
        let seq = inner.next_seq;
        inner.next_seq += 1;

        let Some(slot) = inner.slots.iter().position(Option::is_none) else {
            panic!("timer table exhausted ({SCHEDULER_SLOTS} slots); a component is leaking timers");
        };
        inner.generations[slot] = inner.generations[slot].wrapping_add(1);
        let generation = inner.generations[slot];
        inner.slots[slot] = Some(Slot {
            deadline,
            seq,
            callback: Box::new(callback),
        });

        TaskHandle { slot, generation }
    }

    /// Removes a pending task. No-op for fired, cancelled, or stale
    /// handles.
    pub fn cancel(&self, handle: TaskHandle) {
        let mut inner = self.inner.borrow_mut();
        if inner.generations[handle.slot] == handle.generation {
            inner.slots[handle.slot] = None;
        }
    }

    /// Number of tasks currently waiting in the table.
    pub fn pending(&self) -> usize {
        self.inner.borrow().slots.iter().filter(|s| s.is_some()).count()
    }

    /// Fires every task whose deadline has elapsed, in scheduling order.
    ///
    /// Due tasks are removed from the table before any callback runs, so
    /// callbacks see a table with their own slot already free.
    pub fn dispatch(&self) {
        let mut due: Vec<(u64, Box<dyn FnOnce()>)> = Vec::new();
        {
            let mut inner = self.inner.borrow_mut();
            let now = inner.now;
            for entry in inner.slots.iter_mut() {
                if entry.as_ref().is_some_and(|slot| slot.deadline <= now)
                    && let Some(slot) = entry.take()
                {
                    due.push((slot.seq, slot.callback));
                }
            }
        }
        due.sort_by_key(|(seq, _)| *seq);
        for (_, callback) in due {
            callback();
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot countdown for state machines that hold at most one
/// outstanding timer.
///
/// `start` always re-arms from scratch, cancelling any previous
/// countdown, so an instance can never occupy more than one table slot.
/// The fired flag is latched and must be consumed with
/// [`Timeout::take_fired`].
pub struct Timeout {
    scheduler: Scheduler,
    fired: Rc<Cell<bool>>,
    handle: Option<TaskHandle>,
}

impl Timeout {
    pub fn new(scheduler: &Scheduler) -> Self {
        Self {
            scheduler: scheduler.clone(),
            fired: Rc::new(Cell::new(false)),
            handle: None,
        }
    }

    /// Creates a timeout that is already in the fired state, for
    /// periodic work that must run on its first opportunity.
    pub fn new_elapsed(scheduler: &Scheduler) -> Self {
        let timeout = Self::new(scheduler);
        timeout.fired.set(true);
        timeout
    }

    /// Arms (or re-arms) the countdown. Any previous countdown is
    /// cancelled and a latched-but-unconsumed fire is discarded.
    pub fn start(&mut self, delay: Duration) {
        if let Some(handle) = self.handle.take() {
            self.scheduler.cancel(handle);
        }
        self.fired.set(false);
        let fired = Rc::clone(&self.fired);
        self.handle = Some(self.scheduler.schedule(delay, move || fired.set(true)));
    }

    /// Stops the countdown and clears any latched fire.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.scheduler.cancel(handle);
        }
        self.fired.set(false);
    }

    /// Consumes the latched fired flag, returning whether the countdown
    /// had elapsed.
    pub fn take_fired(&mut self) -> bool {
        if self.fired.get() {
            self.fired.set(false);
            self.handle = None;
            true
        } else {
            false
        }
    }
}

impl Drop for Timeout {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.scheduler.cancel(handle);
        }
    }
}
