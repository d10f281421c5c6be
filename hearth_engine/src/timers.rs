use std::collections::BTreeMap;

use serde::Serialize;

use crate::sequence::SequenceTrack;

/// Milliseconds on the scene clock.
pub type Millis = u64;

/// Identifies one armed continuation. Handles are never reused, so a stale
/// handle can always be told apart from the live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TimerHandle(u64);

/// The continuation a timer resumes when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "task", content = "track", rename_all = "snake_case")]
pub enum TimerTask {
    TypewriterTick,
    DialogueAutoAdvance,
    MenuPromptAutoOpen,
    MenuCooldown,
    SequenceStep(SequenceTrack),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FiredTimer {
    pub handle: TimerHandle,
    pub task: TimerTask,
    pub due: Millis,
}

/// Cooperative one-shot timer queue shared by every state machine of a scene.
///
/// Nothing fires on its own: the tick loop drains due timers with
/// [`TimerQueue::pop_due`] one at a time, so a handler may arm or cancel other
/// timers before the next one is looked at.
#[derive(Debug, Default, Clone, Serialize)]
pub struct TimerQueue {
    now: Millis,
    next_id: u64,
    pending: BTreeMap<(Millis, u64), TimerTask>,
    due_by_id: BTreeMap<u64, Millis>,
    fired: u64,
    cancelled: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Millis {
        self.now
    }

    pub fn schedule(&mut self, delay: Millis, task: TimerTask) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;
        let due = self.now.saturating_add(delay);
        self.pending.insert((due, id), task);
        self.due_by_id.insert(id, due);
        TimerHandle(id)
    }

    /// Disarms `handle`. Returns false when it already fired or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let Some(due) = self.due_by_id.remove(&handle.0) else {
            return false;
        };
        self.pending.remove(&(due, handle.0));
        self.cancelled += 1;
        true
    }

    /// Cancels the handle held in `slot`, leaving the slot empty.
    pub fn cancel_slot(&mut self, slot: &mut Option<TimerHandle>) -> bool {
        match slot.take() {
            Some(handle) => self.cancel(handle),
            None => false,
        }
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.due_by_id.contains_key(&handle.0)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn fired_count(&self) -> u64 {
        self.fired
    }

    pub fn cancelled_count(&self) -> u64 {
        self.cancelled
    }

    /// Removes the earliest timer due at or before `until` and moves the clock
    /// to its deadline. Ties fire in scheduling order.
    pub fn pop_due(&mut self, until: Millis) -> Option<FiredTimer> {
        let (&(due, id), _) = self.pending.first_key_value()?;
        if due > until {
            return None;
        }
        let task = self.pending.remove(&(due, id))?;
        self.due_by_id.remove(&id);
        self.now = self.now.max(due);
        self.fired += 1;
        Some(FiredTimer {
            handle: TimerHandle(id),
            task,
            due,
        })
    }

    /// Moves the clock forward once every due timer has been drained.
    pub fn settle(&mut self, until: Millis) {
        self.now = self.now.max(until);
    }

    /// Drops every armed timer; used at scene teardown.
    pub fn clear(&mut self) {
        self.cancelled += self.pending.len() as u64;
        self.pending.clear();
        self.due_by_id.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_deadline_order() {
        let mut queue = TimerQueue::new();
        let late = queue.schedule(300, TimerTask::MenuPromptAutoOpen);
        let early = queue.schedule(100, TimerTask::TypewriterTick);

        let first = queue.pop_due(1_000).expect("first timer");
        assert_eq!(first.handle, early);
        assert_eq!(queue.now(), 100);
        let second = queue.pop_due(1_000).expect("second timer");
        assert_eq!(second.handle, late);
        assert!(queue.pop_due(1_000).is_none());
        queue.settle(1_000);
        assert_eq!(queue.now(), 1_000);
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let mut queue = TimerQueue::new();
        let handle = queue.schedule(50, TimerTask::DialogueAutoAdvance);
        assert!(queue.cancel(handle));
        assert!(!queue.cancel(handle));
        assert!(queue.pop_due(10_000).is_none());
        assert_eq!(queue.cancelled_count(), 1);
        assert_eq!(queue.fired_count(), 0);
    }

    #[test]
    fn handles_are_not_reused() {
        let mut queue = TimerQueue::new();
        let a = queue.schedule(10, TimerTask::TypewriterTick);
        queue.pop_due(10).expect("fires");
        let b = queue.schedule(10, TimerTask::TypewriterTick);
        assert_ne!(a, b);
        assert!(!queue.is_pending(a));
        assert!(queue.is_pending(b));
    }

    #[test]
    fn timers_armed_while_draining_are_seen_in_same_pass() {
        let mut queue = TimerQueue::new();
        queue.schedule(100, TimerTask::TypewriterTick);
        let mut fired = 0;
        while let Some(timer) = queue.pop_due(450) {
            fired += 1;
            queue.schedule(100, timer.task);
        }
        assert_eq!(fired, 4);
        assert_eq!(queue.pending_count(), 1);
    }

    #[test]
    fn cancel_slot_empties_the_slot() {
        let mut queue = TimerQueue::new();
        let mut slot = Some(queue.schedule(10, TimerTask::MenuCooldown));
        assert!(queue.cancel_slot(&mut slot));
        assert!(slot.is_none());
        assert!(!queue.cancel_slot(&mut slot));
    }
}
