//! Due-time ordered queue of deferred callbacks.

use std::collections::BTreeMap;

use super::effects::Deferred;

/// Tasks are keyed by `(due_ms, seq)` so tasks due at the same instant come
/// out in the order they were scheduled.
#[derive(Debug, Default)]
pub struct Scheduler {
    queue: BTreeMap<(u64, u64), Deferred>,
    seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, deferred: Deferred, due_ms: u64) {
        self.seq += 1;
        self.queue.insert((due_ms, self.seq), deferred);
    }

    pub fn cancel_all(&mut self) {
        if !self.queue.is_empty() {
            tracing::debug!("Cancelling {} deferred task(s)", self.queue.len());
        }
        self.queue.clear();
    }

    pub fn next_due(&self) -> Option<u64> {
        self.queue.keys().next().map(|&(due, _)| due)
    }

    /// Remove the earliest task if it is due at `now_ms`.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<(u64, Deferred)> {
        match self.next_due() {
            Some(due) if due <= now_ms => self
                .queue
                .pop_first()
                .map(|((due, _), deferred)| (due, deferred)),
            _ => None,
        }
    }

    /// Push every task later by `by_ms`.
    pub fn shift(&mut self, by_ms: u64) {
        if by_ms == 0 {
            return;
        }
        let queue = std::mem::take(&mut self.queue);
        self.queue = queue
            .into_iter()
            .map(|((due, seq), d)| ((due.saturating_add(by_ms), seq), d))
            .collect();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::effects::DeferredTask;

    fn task(generation: u64, task: DeferredTask) -> Deferred {
        Deferred { generation, task }
    }

    #[test]
    fn test_pops_in_due_order() {
        let mut s = Scheduler::new();
        s.schedule(task(1, DeferredTask::ReviewTick), 2_000);
        s.schedule(task(1, DeferredTask::OpponentReply), 500);
        s.schedule(task(1, DeferredTask::ReplayStep), 2_000);

        assert_eq!(s.pop_due(100), None);
        assert_eq!(
            s.pop_due(5_000),
            Some((500, task(1, DeferredTask::OpponentReply)))
        );
        assert_eq!(s.pop_due(5_000).unwrap().1.task, DeferredTask::ReviewTick);
        assert_eq!(s.pop_due(5_000).unwrap().1.task, DeferredTask::ReplayStep);
        assert!(s.is_empty());
    }

    #[test]
    fn test_shift_and_cancel() {
        let mut s = Scheduler::new();
        s.schedule(task(1, DeferredTask::OpponentReply), 500);
        s.shift(1_000);
        assert_eq!(s.next_due(), Some(1_500));
        assert_eq!(s.len(), 1);
        s.cancel_all();
        assert_eq!(s.next_due(), None);
    }
}
