//! Messenger - addressed messages between tasks
//!
//! Per-recipient FIFO mailboxes plus a public board for broadcasts. The
//! kernel drains a task's mailbox right before its step. Only the id counter
//! survives a reset: pending mail describes a world that no longer exists.
//!
//! Broadcasts nobody claims are dropped once they are `broadcast_ttl` ticks
//! old, see [`Messenger::expire_public`].

use super::task::TaskId;
use crate::world::RoomReport;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, error};

/// Unique identifier for a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u32);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "msg:{}", self.0)
    }
}

/// Where a message goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    Task(TaskId),
    /// Posted on the public board until some task claims it
    Broadcast,
}

/// Every message body the system understands
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Ask whoever watches `room` for a report
    SurveyRequest { room: String },
    SurveyReport(RoomReport),
    /// The recipient should finish at its next step
    Stop,
    /// Free-form text, logged by the recipient
    Note(String),
}

/// Payload discriminant, for tasks that wait on one kind of answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadKind {
    SurveyRequest,
    SurveyReport,
    Stop,
    Note,
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::SurveyRequest { .. } => PayloadKind::SurveyRequest,
            Payload::SurveyReport(_) => PayloadKind::SurveyReport,
            Payload::Stop => PayloadKind::Stop,
            Payload::Note(_) => PayloadKind::Note,
        }
    }
}

/// A message in flight
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub from: TaskId,
    pub to: Recipient,
    pub payload: Payload,
}

/// The persisted part of the messenger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessengerSnapshot {
    pub next_message_id: u32,
}

/// A broadcast on the board, with the tick it went up
#[derive(Debug)]
struct Posted {
    tick: u64,
    message: Message,
}

/// Mailboxes and the message id counter
#[derive(Debug, Default)]
pub struct Messenger {
    next_message_id: u32,
    /// Kernel tick new broadcasts are stamped with
    tick: u64,
    mailboxes: HashMap<TaskId, Vec<Message>>,
    public: BTreeMap<MessageId, Posted>,
}

impl Messenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a snapshot; mailboxes start empty
    pub fn from_snapshot(snapshot: MessengerSnapshot) -> Self {
        Self {
            next_message_id: snapshot.next_message_id,
            ..Self::default()
        }
    }

    /// Parse a serialized messenger, falling back to a fresh one
    pub fn from_serialized(serialized: &str) -> Self {
        match serde_json::from_str::<MessengerSnapshot>(serialized) {
            Ok(snapshot) => Self::from_snapshot(snapshot),
            Err(e) => {
                error!("failed to deserialize messenger: {}", e);
                Self::new()
            }
        }
    }

    pub fn snapshot(&self) -> MessengerSnapshot {
        MessengerSnapshot {
            next_message_id: self.next_message_id,
        }
    }

    /// Counters only; pending messages are dropped
    pub fn serialize(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.snapshot())
    }

    pub fn next_message_id(&mut self) -> MessageId {
        let id = MessageId(self.next_message_id);
        self.next_message_id = self.next_message_id.wrapping_add(1);
        id
    }

    pub fn set_tick(&mut self, tick: u64) {
        self.tick = tick;
    }

    /// Queue a message. The recipient is not checked: mail for a dead task
    /// is never polled and disappears at the next reset.
    pub fn send(&mut self, message: Message) {
        match message.to {
            Recipient::Task(to) => self.mailboxes.entry(to).or_default().push(message),
            Recipient::Broadcast => {
                let posted = Posted {
                    tick: self.tick,
                    message,
                };
                self.public.insert(posted.message.id, posted);
            }
        }
    }

    /// Take every pending message for `recipient`, oldest first
    pub fn poll(&mut self, recipient: TaskId) -> Option<Vec<Message>> {
        self.mailboxes.remove(&recipient)
    }

    pub fn pending(&self, recipient: TaskId) -> usize {
        self.mailboxes.get(&recipient).map_or(0, Vec::len)
    }

    /// Broadcasts not yet claimed, in id order
    pub fn public_messages(&self) -> impl Iterator<Item = &Message> {
        self.public.values().map(|posted| &posted.message)
    }

    /// Claim a broadcast so no other task answers it
    pub fn take_public(&mut self, id: MessageId) -> Option<Message> {
        self.public.remove(&id).map(|posted| posted.message)
    }

    /// Drop broadcasts posted `ttl` or more ticks ago. Zero keeps them all.
    pub fn expire_public(&mut self, ttl: u64) -> usize {
        if ttl == 0 {
            return 0;
        }
        let now = self.tick;
        let before = self.public.len();
        self.public.retain(|_, posted| now.saturating_sub(posted.tick) < ttl);
        let expired = before - self.public.len();
        if expired > 0 {
            debug!(expired, tick = now, "unclaimed broadcasts expired");
        }
        expired
    }
}
