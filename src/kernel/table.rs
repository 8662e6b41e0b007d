//! Process table
//!
//! The authoritative map from task id to live task. Ids come from a counter
//! that only moves forward, so a stale id held by some task can never point at
//! a newer task.

use super::error::KernelError;
use super::task::{Process, TaskId};
use std::collections::BTreeMap;

/// All live tasks, in id order
#[derive(Debug, Default)]
pub struct ProcessTable {
    next_id: u32,
    processes: BTreeMap<TaskId, Process>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty table whose counter resumes at `next_id`
    pub fn with_next_id(next_id: u32) -> Self {
        Self {
            next_id,
            processes: BTreeMap::new(),
        }
    }

    /// Hand out the next id. The counter never wraps.
    pub fn allocate(&mut self) -> Result<TaskId, KernelError> {
        let id = TaskId(self.next_id);
        self.next_id = self
            .next_id
            .checked_add(1)
            .ok_or(KernelError::IdsExhausted)?;
        Ok(id)
    }

    /// The value the next `allocate` will return
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    pub fn register(&mut self, process: Process) -> Result<(), KernelError> {
        if self.processes.contains_key(&process.id) {
            return Err(KernelError::DuplicateId(process.id));
        }
        // Keep the counter ahead of ids that arrived from outside `allocate`
        if process.id.0 >= self.next_id {
            self.next_id = process
                .id
                .0
                .checked_add(1)
                .ok_or(KernelError::IdOutOfRange(process.id))?;
        }
        self.processes.insert(process.id, process);
        Ok(())
    }

    pub fn unregister(&mut self, id: TaskId) -> bool {
        self.processes.remove(&id).is_some()
    }

    pub fn get(&self, id: TaskId) -> Option<&Process> {
        self.processes.get(&id)
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.processes.contains_key(&id)
    }

    /// Live tasks in table order
    pub fn all(&self) -> impl Iterator<Item = &Process> {
        self.processes.values()
    }

    pub fn ids(&self) -> Vec<TaskId> {
        self.processes.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// Remove a task for the duration of its step
    pub(crate) fn take(&mut self, id: TaskId) -> Option<Process> {
        self.processes.remove(&id)
    }

    /// Put back a task taken with `take`
    pub(crate) fn put_back(&mut self, process: Process) {
        self.processes.insert(process.id, process);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::context::KernelContext;
    use crate::kernel::error::TaskError;
    use crate::kernel::task::{Fields, Step, Task};

    struct Noop;

    impl Task for Noop {
        fn kind(&self) -> &'static str {
            "Noop"
        }

        fn step(&mut self, _ctx: &mut KernelContext<'_>) -> Result<Step, TaskError> {
            Ok(Step::Continue)
        }

        fn to_fields(&self) -> Result<Fields, TaskError> {
            Ok(Fields::new())
        }
    }

    fn noop(id: TaskId) -> Process {
        Process::new(id, Box::new(Noop))
    }

    #[test]
    fn test_allocate_increments() {
        let mut table = ProcessTable::new();
        assert_eq!(table.allocate().unwrap(), TaskId(0));
        assert_eq!(table.allocate().unwrap(), TaskId(1));
        assert_eq!(table.next_id(), 2);
    }

    #[test]
    fn test_register_duplicate_fails() {
        let mut table = ProcessTable::new();
        let id = table.allocate().unwrap();
        table.register(noop(id)).unwrap();

        let err = table.register(noop(id)).unwrap_err();
        assert!(matches!(err, KernelError::DuplicateId(dup) if dup == id));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_unregister_reports_removal() {
        let mut table = ProcessTable::new();
        let id = table.allocate().unwrap();
        table.register(noop(id)).unwrap();

        assert!(table.unregister(id));
        assert!(!table.unregister(id));
        assert!(table.get(id).is_none());
    }

    #[test]
    fn test_all_is_in_id_order() {
        let mut table = ProcessTable::new();
        table.register(noop(TaskId(5))).unwrap();
        table.register(noop(TaskId(1))).unwrap();
        table.register(noop(TaskId(3))).unwrap();

        let ids: Vec<_> = table.all().map(|p| p.id).collect();
        assert_eq!(ids, [TaskId(1), TaskId(3), TaskId(5)]);
    }

    #[test]
    fn test_register_raises_counter() {
        let mut table = ProcessTable::with_next_id(2);
        table.register(noop(TaskId(9))).unwrap();
        assert_eq!(table.allocate().unwrap(), TaskId(10));
    }

    #[test]
    fn test_allocate_refuses_to_wrap() {
        let mut table = ProcessTable::with_next_id(u32::MAX - 1);
        assert_eq!(table.allocate().unwrap(), TaskId(u32::MAX - 1));

        let err = table.allocate().unwrap_err();
        assert!(matches!(err, KernelError::IdsExhausted));
        assert_eq!(table.next_id(), u32::MAX);
    }

    #[test]
    fn test_register_rejects_last_id() {
        let mut table = ProcessTable::new();
        let err = table.register(noop(TaskId(u32::MAX))).unwrap_err();
        assert!(matches!(err, KernelError::IdOutOfRange(TaskId(u32::MAX))));
        assert!(table.is_empty());
        assert_eq!(table.next_id(), 0);
    }

    #[test]
    fn test_take_and_put_back() {
        let mut table = ProcessTable::new();
        let id = table.allocate().unwrap();
        table.register(noop(id)).unwrap();

        let process = table.take(id).unwrap();
        assert!(!table.contains(id));
        table.put_back(process);
        assert!(table.contains(id));
    }
}
