//! Scheduler - the per-tick run-list
//!
//! `refresh` snapshots the process table before any task runs. Tasks are
//! handed out in that order; the kernel checks each id against the table
//! again before running it, so a task stopped earlier in the pass is skipped.

use super::table::ProcessTable;
use super::task::TaskId;
use std::collections::VecDeque;

#[derive(Debug, Default)]
pub struct Scheduler {
    run_list: VecDeque<TaskId>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute the run-list from the table's current contents
    pub fn refresh(&mut self, table: &ProcessTable) {
        self.run_list = table.all().map(|p| p.id).collect();
    }

    /// Append to the current pass (used for same-tick spawns when enabled)
    pub fn enqueue(&mut self, id: TaskId) {
        self.run_list.push_back(id);
    }

    pub fn next(&mut self) -> Option<TaskId> {
        self.run_list.pop_front()
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.run_list.contains(&id)
    }

    /// Ids still waiting this tick
    pub fn remaining(&self) -> usize {
        self.run_list.len()
    }
}
