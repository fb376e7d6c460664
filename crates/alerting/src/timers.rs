//! Cancellable alarm timers

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tokio::time::Instant;

/// Work the alarm schedules for itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlarmTask {
    /// Next amplitude pulse
    Pulse,
    /// Fade-out finished; stop the tone
    FadeComplete,
    /// Manual test ran its course; silence
    TestExpired,
}

#[derive(Debug, Clone)]
struct ScheduledTask {
    due: Instant,
    seq: u64,
    task: AlarmTask,
}

impl Eq for ScheduledTask {}

impl PartialEq for ScheduledTask {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Ord for ScheduledTask {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap behavior: earliest first, then insertion order
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for ScheduledTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Deadline-ordered task queue.
///
/// Nothing runs on its own; the owner polls with the current time. A
/// cancelled task is removed from the queue, so it can never fire late.
#[derive(Debug, Default)]
pub struct TimerQueue {
    queue: BinaryHeap<ScheduledTask>,
    next_seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due: Instant, task: AlarmTask) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(ScheduledTask { due, seq, task });
    }

    /// Drop every pending instance of `task`
    pub fn cancel(&mut self, task: AlarmTask) {
        self.queue.retain(|scheduled| scheduled.task != task);
    }

    pub fn cancel_all(&mut self) {
        self.queue.clear();
    }

    pub fn is_scheduled(&self, task: AlarmTask) -> bool {
        self.queue.iter().any(|scheduled| scheduled.task == task)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.queue.peek().map(|scheduled| scheduled.due)
    }

    /// Pop the earliest task if it is due at `now`
    pub fn pop_due(&mut self, now: Instant) -> Option<AlarmTask> {
        if self.queue.peek()?.due > now {
            return None;
        }
        self.queue.pop().map(|scheduled| scheduled.task)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
