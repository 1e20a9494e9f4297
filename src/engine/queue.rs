// src/engine/queue.rs

use std::collections::VecDeque;

use tracing::debug;

use super::TaskName;

/// Follow-up runs requested while a task was already running.
///
/// Each task appears at most once: any number of triggers that arrive during
/// one run coalesce into a single follow-up run. Entries keep arrival order.
#[derive(Debug, Default)]
pub struct TriggerQueue {
    pending: VecDeque<TaskName>,
}

impl TriggerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn contains(&self, task: &str) -> bool {
        self.pending.iter().any(|t| t == task)
    }

    /// Record a trigger for a running task. Returns false if a follow-up run
    /// was already pending.
    pub fn record_trigger(&mut self, task: &str) -> bool {
        if self.contains(task) {
            debug!(task, "follow-up run already pending; coalesced");
            return false;
        }
        debug!(task, "queued follow-up run");
        self.pending.push_back(task.to_string());
        true
    }

    /// Remove the pending follow-up for `task`, if any.
    pub fn take(&mut self, task: &str) -> bool {
        match self.pending.iter().position(|t| t == task) {
            Some(idx) => {
                self.pending.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Drop everything (shutdown).
    pub fn clear(&mut self) -> Vec<TaskName> {
        let dropped: Vec<TaskName> = self.pending.drain(..).collect();
        if !dropped.is_empty() {
            debug!(dropped = dropped.len(), "discarded pending follow-up runs");
        }
        dropped
    }
}
