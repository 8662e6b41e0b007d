//! KernelContext - the capability handed to a running task
//!
//! Tasks never reach the kernel through global state. Everything a step may
//! do to the rest of the system goes through this borrow: spawning, stopping,
//! messaging, and read access to the world and the domain store.

use super::error::KernelError;
use super::message::{Message, MessageId, Messenger, Payload, PayloadKind, Recipient};
use super::scheduler::Scheduler;
use super::socket::Socket;
use super::table::ProcessTable;
use super::task::{Process, Task, TaskId};
use crate::store::Store;
use crate::world::World;
use tracing::{debug, warn};

pub struct KernelContext<'a> {
    current: TaskId,
    stop_requested: bool,
    tick: u64,
    same_tick_spawns: bool,
    table: &'a mut ProcessTable,
    messenger: &'a mut Messenger,
    scheduler: &'a mut Scheduler,
    world: &'a dyn World,
    memory: &'a mut dyn Store,
}

impl<'a> KernelContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        current: TaskId,
        tick: u64,
        same_tick_spawns: bool,
        table: &'a mut ProcessTable,
        messenger: &'a mut Messenger,
        scheduler: &'a mut Scheduler,
        world: &'a dyn World,
        memory: &'a mut dyn Store,
    ) -> Self {
        Self {
            current,
            stop_requested: false,
            tick,
            same_tick_spawns,
            table,
            messenger,
            scheduler,
            world,
            memory,
        }
    }

    /// Id of the task being run
    pub fn id(&self) -> TaskId {
        self.current
    }

    /// Kernel tick counter (ticks since this boot)
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn world(&self) -> &dyn World {
        self.world
    }

    /// Domain key/value store, outside the kernel's own record
    pub fn memory(&mut self) -> &mut dyn Store {
        &mut *self.memory
    }

    /// Register a new task; it first runs on the next tick
    pub fn spawn(&mut self, task: Box<dyn Task>) -> Result<TaskId, KernelError> {
        let id = self.table.allocate()?;
        debug!(task = id.0, kind = task.kind(), parent = self.current.0, "spawn");
        self.table.put_back(Process::new(id, task));
        if self.same_tick_spawns {
            self.scheduler.enqueue(id);
        }
        Ok(id)
    }

    /// Stop a task. Stopping yourself ends the task after this step.
    pub fn stop(&mut self, id: TaskId) -> bool {
        if id == self.current {
            self.stop_requested = true;
            return true;
        }
        if self.table.unregister(id) {
            debug!(task = id.0, by = self.current.0, "stopped");
            true
        } else {
            warn!(task = id.0, by = self.current.0, "stop requested for unknown task");
            false
        }
    }

    pub fn has_task(&self, id: TaskId) -> bool {
        if id == self.current {
            return !self.stop_requested;
        }
        self.table.contains(id)
    }

    /// Send to one task
    pub fn send(&mut self, to: TaskId, payload: Payload) -> MessageId {
        self.post(Recipient::Task(to), payload)
    }

    /// Post on the public board
    pub fn broadcast(&mut self, payload: Payload) -> MessageId {
        self.post(Recipient::Broadcast, payload)
    }

    /// Send `payload` from a new [`Socket`] that hands the first reply of
    /// kind `expects` to this task. The reply arrives from the returned id.
    /// The socket gives up `timeout` world ticks from now.
    pub fn request(
        &mut self,
        to: Recipient,
        payload: Payload,
        expects: PayloadKind,
        timeout: u32,
    ) -> Result<TaskId, KernelError> {
        let deadline = self.world.time().saturating_add(timeout.max(1));
        let socket = self.spawn(Box::new(Socket::new(self.current, expects, deadline)))?;
        self.post_as(socket, to, payload);
        Ok(socket)
    }

    pub fn public_messages(&self) -> Vec<Message> {
        self.messenger.public_messages().cloned().collect()
    }

    /// Claim a broadcast; `None` if another task got it first
    pub fn take_public(&mut self, id: MessageId) -> Option<Message> {
        self.messenger.take_public(id)
    }

    pub fn next_message_id(&mut self) -> MessageId {
        self.messenger.next_message_id()
    }

    pub(crate) fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    fn post(&mut self, to: Recipient, payload: Payload) -> MessageId {
        self.post_as(self.current, to, payload)
    }

    fn post_as(&mut self, from: TaskId, to: Recipient, payload: Payload) -> MessageId {
        let id = self.messenger.next_message_id();
        self.messenger.send(Message {
            id,
            from,
            to,
            payload,
        });
        id
    }
}
