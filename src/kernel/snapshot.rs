//! The persisted kernel record
//!
//! ```text
//! { "nextTaskId": 7,
//!   "messenger": { "nextMessageId": 31 },
//!   "tasks": [ { "kind": "Janitor", "id": 0 }, { "kind": "RoomManager", "id": 1, "room": "W1N1", ... } ] }
//! ```
//!
//! Tasks are kept as raw JSON values so one bad entry cannot stop the rest
//! of the record from parsing.

use super::error::{RestoreError, TaskError};
use super::message::MessengerSnapshot;
use super::task::{Fields, RESERVED_FIELDS, TaskId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KernelSnapshot {
    pub next_task_id: u32,
    #[serde(default)]
    pub messenger: MessengerSnapshot,
    #[serde(default)]
    pub tasks: Vec<Value>,
}

impl KernelSnapshot {
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// One task entry split into its envelope and its kind-specific fields
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    pub kind: String,
    pub id: TaskId,
    pub fields: Fields,
}

impl TaskRecord {
    /// Merge `kind` and `id` into the task's field object. Fields that
    /// would shadow the envelope are refused rather than dropped.
    pub fn to_value(&self) -> Result<Value, TaskError> {
        if let Some(key) = RESERVED_FIELDS
            .iter()
            .find(|key| self.fields.contains_key(**key))
        {
            return Err(TaskError::ReservedField(key.to_string()));
        }
        let mut entry = Fields::new();
        entry.insert("kind".into(), Value::String(self.kind.clone()));
        entry.insert("id".into(), Value::from(self.id.0));
        entry.extend(self.fields.clone());
        Ok(Value::Object(entry))
    }

    /// Split an entry back into envelope and fields
    pub fn from_value(value: &Value) -> Result<Self, RestoreError> {
        let Value::Object(entry) = value else {
            return Err(RestoreError::MissingKind);
        };
        let kind = entry
            .get("kind")
            .and_then(Value::as_str)
            .ok_or(RestoreError::MissingKind)?
            .to_string();
        let id = entry
            .get("id")
            .and_then(Value::as_u64)
            .and_then(|id| u32::try_from(id).ok())
            .map(TaskId)
            .ok_or(RestoreError::MissingId)?;

        let mut fields = entry.clone();
        for key in RESERVED_FIELDS {
            fields.remove(key);
        }
        Ok(Self { kind, id, fields })
    }

    /// Short label for diagnostics about a record that may not be valid
    pub fn label(value: &Value) -> String {
        let kind = value.get("kind").and_then(Value::as_str).unwrap_or("?");
        let id = value
            .get("id")
            .map(Value::to_string)
            .unwrap_or_else(|| "?".into());
        format!("{} {}", id, kind)
    }
}
