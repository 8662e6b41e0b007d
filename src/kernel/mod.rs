//! The kernel - process table, scheduler, messenger, and persistence
//!
//! One `tick` per host tick:
//! - snapshot the process table into a run-list
//! - for each task still registered, deliver its mail, then `step` it
//! - drop tasks that complete, fail, or panic; siblings keep running
//! - persist every `persist_interval` ticks
//!
//! Nothing here is global. The host owns the `Kernel` and hands it the world
//! and the store each tick; tasks reach the kernel only through
//! [`KernelContext`].

pub mod config;
pub mod context;
pub mod error;
pub mod message;
pub mod registry;
pub mod scheduler;
pub mod snapshot;
pub mod socket;
pub mod table;
pub mod task;


pub use config::KernelConfig;
pub use context::KernelContext;
pub use error::{KernelError, RestoreError, TaskError};
pub use message::{Message, MessageId, Messenger, Payload, PayloadKind, Recipient};
pub use registry::TaskRegistry;
pub use scheduler::Scheduler;
pub use snapshot::{KernelSnapshot, TaskRecord};
pub use socket::Socket;
pub use table::ProcessTable;
pub use task::{Fields, Process, Step, Task, TaskId, fields_of};

use crate::store::Store;
use crate::world::World;
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error, info, warn};

/// How the kernel came up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boot {
    /// No usable record; baseline tasks were synthesized
    Cold,
    /// Rebuilt from the persisted record
    Warm { restored: usize, skipped: usize },
}

/// What one tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    /// Tasks stepped
    pub ran: usize,
    /// Finished with `Complete` or stopped themselves
    pub completed: usize,
    /// Returned an error or panicked
    pub failed: usize,
    /// In the run-list but stopped before their turn
    pub skipped: usize,
    pub persisted: bool,
}

enum Outcome {
    Stepped(Step),
    Failed(String),
}

/// The kernel manages all task state
pub struct Kernel {
    config: KernelConfig,
    registry: TaskRegistry,
    table: ProcessTable,
    messenger: Messenger,
    scheduler: Scheduler,
    ticks: u64,
    mode: Boot,
    /// Entries as last written or restored, for tasks that fail to serialize
    saved: BTreeMap<TaskId, Value>,
}

impl Kernel {
    /// An empty kernel. Most callers want [`Kernel::boot`].
    pub fn new(config: KernelConfig, registry: TaskRegistry) -> Self {
        Self {
            config,
            registry,
            table: ProcessTable::new(),
            messenger: Messenger::new(),
            scheduler: Scheduler::new(),
            ticks: 0,
            mode: Boot::Cold,
            saved: BTreeMap::new(),
        }
    }

    /// Bring the kernel up after a global reset
    ///
    /// Restores from the record at `config.record_key` when there is one.
    /// Otherwise `baseline` populates the empty kernel, which is persisted
    /// straight away so a second reset does not bootstrap again.
    pub fn boot<F>(
        config: KernelConfig,
        registry: TaskRegistry,
        store: &mut dyn Store,
        baseline: F,
    ) -> Self
    where
        F: FnOnce(&mut Kernel),
    {
        let mut kernel = Self::new(config, registry);

        if let Some(raw) = store.get(&kernel.config.record_key) {
            match KernelSnapshot::from_json(&raw) {
                Ok(snapshot) => {
                    kernel.restore(snapshot, &raw, store);
                    return kernel;
                }
                Err(e) => {
                    error!("kernel record is unreadable, cold starting: {}", e);
                    kernel.write_backup(store, raw);
                }
            }
        }

        baseline(&mut kernel);
        info!(tasks = kernel.table.len(), "cold start");
        if let Err(e) = kernel.persist(store) {
            error!("failed to persist after cold start: {}", e);
        }
        kernel
    }

    fn restore(&mut self, snapshot: KernelSnapshot, raw: &str, store: &mut dyn Store) {
        self.table = ProcessTable::with_next_id(snapshot.next_task_id);
        self.messenger = Messenger::from_snapshot(snapshot.messenger);

        let mut restored = 0;
        let mut skipped = 0;
        for entry in &snapshot.tasks {
            match self.restore_task(entry) {
                Ok(id) => {
                    self.saved.insert(id, entry.clone());
                    restored += 1;
                }
                Err(e) => {
                    warn!("skipping task {}: {}", TaskRecord::label(entry), e);
                    skipped += 1;
                }
            }
        }

        self.mode = Boot::Warm { restored, skipped };
        info!(
            restored,
            skipped,
            next_task_id = self.table.next_id(),
            "warm start"
        );

        if skipped > 0 {
            // The last record with every entry lives on only in the backup
            self.write_backup(store, raw.to_string());
            if let Err(e) = self.persist(store) {
                error!("failed to persist cleaned record: {}", e);
            }
        }
    }

    fn restore_task(&mut self, entry: &Value) -> Result<TaskId, KernelError> {
        let record = TaskRecord::from_value(entry)?;
        let task = self
            .registry
            .restore(&record.kind, Value::Object(record.fields))?;
        self.table.register(Process::new(record.id, task))?;
        Ok(record.id)
    }

    fn write_backup(&self, store: &mut dyn Store, raw: String) {
        if let Err(e) = store.set(&self.config.backup_key, raw) {
            error!("failed to write backup record: {}", e);
        }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn table(&self) -> &ProcessTable {
        &self.table
    }

    pub fn messenger(&self) -> &Messenger {
        &self.messenger
    }

    /// Ticks run since boot
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn mode(&self) -> Boot {
        self.mode
    }

    /// Register a task under a fresh id. It first runs on the next tick.
    pub fn spawn_task(&mut self, task: Box<dyn Task>) -> Result<TaskId, KernelError> {
        let id = self.table.allocate()?;
        debug!(task = id.0, kind = task.kind(), "spawn");
        self.table.put_back(Process::new(id, task));
        Ok(id)
    }

    /// Reserve an id for a task built later with [`Kernel::register_task`]
    pub fn allocate_id(&mut self) -> Result<TaskId, KernelError> {
        self.table.allocate()
    }

    /// Register a task under an id it already carries
    pub fn register_task(&mut self, id: TaskId, task: Box<dyn Task>) -> Result<(), KernelError> {
        debug!(task = id.0, kind = task.kind(), "register");
        self.table.register(Process::new(id, task))
    }

    /// Unregister a task; absent ids are reported and ignored
    pub fn stop_task(&mut self, id: TaskId) -> bool {
        if self.table.unregister(id) {
            debug!(task = id.0, "stopped");
            true
        } else {
            warn!(task = id.0, "stop requested for unknown task");
            false
        }
    }

    pub fn has_task(&self, id: TaskId) -> bool {
        self.table.contains(id)
    }

    /// Queue a message from outside any task (host code, tests)
    pub fn send_message(&mut self, from: TaskId, to: Recipient, payload: Payload) -> MessageId {
        let id = self.messenger.next_message_id();
        self.messenger.send(Message {
            id,
            from,
            to,
            payload,
        });
        id
    }

    pub fn next_message_id(&mut self) -> MessageId {
        self.messenger.next_message_id()
    }

    /// `"<id> <description>"` for every live task, in table order
    pub fn describe(&self) -> Vec<String> {
        self.table.all().map(Process::display).collect()
    }

    /// Run one tick
    pub fn tick(&mut self, world: &dyn World, store: &mut dyn Store) -> TickReport {
        self.ticks += 1;
        let mut report = TickReport {
            tick: self.ticks,
            ..TickReport::default()
        };

        self.messenger.set_tick(self.ticks);
        self.messenger.expire_public(self.config.broadcast_ttl);
        self.scheduler.refresh(&self.table);

        while let Some(id) = self.scheduler.next() {
            // Stopped earlier in this pass
            let Some(mut process) = self.table.take(id) else {
                report.skipped += 1;
                continue;
            };

            let mail = self.messenger.poll(id).unwrap_or_default();
            let mut ctx = KernelContext::new(
                id,
                self.ticks,
                self.config.same_tick_spawns,
                &mut self.table,
                &mut self.messenger,
                &mut self.scheduler,
                world,
                &mut *store,
            );

            let outcome = run_step(&mut process, mail, &mut ctx);
            let stop_requested = ctx.stop_requested();
            report.ran += 1;

            match outcome {
                Outcome::Stepped(Step::Continue) if !stop_requested => {
                    self.table.put_back(process);
                }
                Outcome::Stepped(_) => {
                    debug!(task = id.0, kind = process.kind(), "completed");
                    report.completed += 1;
                }
                Outcome::Failed(cause) => {
                    error!(
                        task = id.0,
                        kind = process.kind(),
                        "{} failed: {}",
                        process.display(),
                        cause
                    );
                    report.failed += 1;
                }
            }
        }

        if self.config.persists_on(self.ticks) {
            match self.persist(store) {
                Ok(()) => report.persisted = true,
                Err(e) => error!(tick = self.ticks, "persist failed: {}", e),
            }
        }

        debug!(
            tick = report.tick,
            ran = report.ran,
            completed = report.completed,
            failed = report.failed,
            "tick done"
        );
        report
    }

    /// The kernel record as JSON
    pub fn serialize(&self) -> Result<String, KernelError> {
        self.encode(&self.entries())
    }

    /// Write the kernel record to the store
    pub fn persist(&mut self, store: &mut dyn Store) -> Result<(), KernelError> {
        let entries = self.entries();
        let raw = self.encode(&entries)?;
        store.set(&self.config.record_key, raw)?;
        self.saved = entries.into_iter().collect();
        debug!(tick = self.ticks, tasks = self.table.len(), "persisted");
        Ok(())
    }

    /// One entry per live task. A task that fails to serialize keeps the
    /// entry it last had on record, or is left out if it never had one.
    fn entries(&self) -> Vec<(TaskId, Value)> {
        let mut entries = Vec::with_capacity(self.table.len());
        for process in self.table.all() {
            let entry = process.task.to_fields().and_then(|fields| {
                TaskRecord {
                    kind: process.kind().to_string(),
                    id: process.id,
                    fields,
                }
                .to_value()
            });
            match entry {
                Ok(entry) => entries.push((process.id, entry)),
                Err(e) => match self.saved.get(&process.id) {
                    Some(last) => {
                        warn!(
                            task = process.id.0,
                            kind = process.kind(),
                            "keeping last saved entry: {}",
                            e
                        );
                        entries.push((process.id, last.clone()));
                    }
                    None => error!(
                        task = process.id.0,
                        kind = process.kind(),
                        "not persisted: {}",
                        e
                    ),
                },
            }
        }
        entries
    }

    fn encode(&self, entries: &[(TaskId, Value)]) -> Result<String, KernelError> {
        let snapshot = KernelSnapshot {
            next_task_id: self.table.next_id(),
            messenger: self.messenger.snapshot(),
            tasks: entries.iter().map(|(_, entry)| entry.clone()).collect(),
        };
        Ok(snapshot.to_json()?)
    }
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("ticks", &self.ticks)
            .field("mode", &self.mode)
            .field("tasks", &self.table.len())
            .field("next_task_id", &self.table.next_id())
            .finish()
    }
}

/// Deliver mail, then step. Panics are turned into failures.
fn run_step(
    process: &mut Process,
    mail: Vec<Message>,
    ctx: &mut KernelContext<'_>,
) -> Outcome {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        for message in mail {
            process.task.receive(message, ctx);
        }
        // Stopped itself while handling mail
        if ctx.stop_requested() {
            return Ok(Step::Complete);
        }
        process.task.step(ctx)
    }));

    match result {
        Ok(Ok(step)) => Outcome::Stepped(step),
        Ok(Err(e)) => Outcome::Failed(e.to_string()),
        Err(payload) => Outcome::Failed(format!("panicked: {}", panic_message(&*payload))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
