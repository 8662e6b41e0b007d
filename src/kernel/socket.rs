//! Socket - waits for one reply on behalf of another task
//!
//! [`KernelContext::request`] sends a message whose sender is a fresh socket,
//! so whoever answers replies to the socket. The first reply of the expected
//! kind is handed to the owner, sent from the socket's id, and the socket
//! ends. It also ends once the owner is gone or the deadline passes.
//!
//! [`KernelContext::request`]: super::KernelContext::request

use super::context::KernelContext;
use super::error::TaskError;
use super::message::{Message, PayloadKind};
use super::task::{Fields, Step, Task, TaskId, fields_of};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Socket {
    pub owner: TaskId,
    pub expects: PayloadKind,
    /// World time at which the socket stops waiting
    pub deadline: u32,
    #[serde(skip)]
    answered: bool,
}

impl Socket {
    pub const KIND: &'static str = "Socket";

    pub fn new(owner: TaskId, expects: PayloadKind, deadline: u32) -> Self {
        Self {
            owner,
            expects,
            deadline,
            answered: false,
        }
    }
}

impl Task for Socket {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn describe(&self) -> String {
        format!("{} for {:?}", Self::KIND, self.expects)
    }

    fn step(&mut self, ctx: &mut KernelContext<'_>) -> Result<Step, TaskError> {
        if !ctx.has_task(self.owner) {
            debug!(task = ctx.id().0, owner = self.owner.0, "owner gone");
            return Ok(Step::Complete);
        }
        if ctx.world().time() >= self.deadline {
            info!(
                task = ctx.id().0,
                owner = self.owner.0,
                "no {:?} before the deadline",
                self.expects
            );
            return Ok(Step::Complete);
        }
        Ok(Step::Continue)
    }

    fn receive(&mut self, message: Message, ctx: &mut KernelContext<'_>) {
        if self.answered || message.payload.kind() != self.expects {
            warn!(
                task = ctx.id().0,
                from = message.from.0,
                "unexpected {:?}",
                message.payload
            );
            return;
        }
        debug!(
            task = ctx.id().0,
            owner = self.owner.0,
            from = message.from.0,
            "reply received"
        );
        ctx.send(self.owner, message.payload);
        self.answered = true;
        let me = ctx.id();
        ctx.stop(me);
    }

    fn to_fields(&self) -> Result<Fields, TaskError> {
        fields_of(self)
    }
}
