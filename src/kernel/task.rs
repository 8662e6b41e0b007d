//! Task abstraction
//!
//! A Task is the unit of execution in overmind. Tasks are cooperative: the
//! kernel calls `step` once per tick and the task decides where it suspends.
//! Nothing on the call stack survives a global reset, so every value a task
//! needs across ticks lives in a serialized field and the body is written as
//! an explicit state machine over those fields.

use super::context::KernelContext;
use super::error::TaskError;
use super::message::Message;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// A task's persisted fields. `kind` and `id` are added by the kernel.
pub type Fields = Map<String, Value>;

/// Reserved for the record envelope
pub const RESERVED_FIELDS: [&str; 2] = ["kind", "id"];

/// Serialize a task body into its field object
///
/// The body must serialize to a JSON object without `kind` or `id` keys.
pub fn fields_of<T: Serialize>(body: &T) -> Result<Fields, TaskError> {
    match serde_json::to_value(body)? {
        Value::Object(fields) => {
            if let Some(key) = RESERVED_FIELDS.iter().find(|key| fields.contains_key(**key)) {
                return Err(TaskError::ReservedField(key.to_string()));
            }
            Ok(fields)
        }
        other => Err(TaskError::NotAnObject(json_type(&other))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Unique identifier for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u32);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Task({})", self.0)
    }
}

/// Outcome of one `step`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Run again next tick
    Continue,
    /// Finished; the kernel unregisters the task
    Complete,
}

/// The Task trait - implement this to create a kind of work
///
/// Concrete kinds also derive `Serialize`/`Deserialize` and are listed in a
/// [`TaskRegistry`](super::registry::TaskRegistry) so they can be rebuilt after
/// a reset.
pub trait Task {
    /// Kind tag used to pick a constructor on restore
    fn kind(&self) -> &'static str;

    /// One-line description for diagnostics
    fn describe(&self) -> String {
        self.kind().to_string()
    }

    /// Advance to the next suspension point
    fn step(&mut self, ctx: &mut KernelContext<'_>) -> Result<Step, TaskError>;

    /// Handle a message delivered just before `step`
    fn receive(&mut self, message: Message, ctx: &mut KernelContext<'_>) {
        warn!(
            task = ctx.id().0,
            kind = self.kind(),
            from = message.from.0,
            "unhandled message {}: {:?}",
            message.id,
            message.payload
        );
    }

    /// Kind-specific fields, without `kind` and `id`. Usually `fields_of(self)`.
    fn to_fields(&self) -> Result<Fields, TaskError>;
}

/// A live task: the body plus the id the table knows it by
pub struct Process {
    pub id: TaskId,
    pub task: Box<dyn Task>,
}

impl Process {
    pub fn new(id: TaskId, task: Box<dyn Task>) -> Self {
        Self { id, task }
    }

    pub fn kind(&self) -> &'static str {
        self.task.kind()
    }

    /// `"<id> <description>"`, the form every diagnostic uses
    pub fn display(&self) -> String {
        format!("{} {}", self.id.0, self.task.describe())
    }
}

impl std::fmt::Debug for Process {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Process")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Idle;

    impl Task for Idle {
        fn kind(&self) -> &'static str {
            "Idle"
        }

        fn step(&mut self, _ctx: &mut KernelContext<'_>) -> Result<Step, TaskError> {
            Ok(Step::Continue)
        }

        fn to_fields(&self) -> Result<Fields, TaskError> {
            Ok(Fields::new())
        }
    }

    #[test]
    fn test_task_id_display() {
        assert_eq!(TaskId(7).to_string(), "Task(7)");
    }

    #[test]
    fn test_task_id_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&TaskId(3)).unwrap(), "3");
        let id: TaskId = serde_json::from_str("12").unwrap();
        assert_eq!(id, TaskId(12));
    }

    #[derive(Serialize)]
    struct Tally(u32);

    #[derive(Serialize)]
    struct Tagged {
        kind: String,
        count: u32,
    }

    #[derive(Serialize)]
    struct Wrapper {
        fields: u32,
    }

    #[test]
    fn test_fields_of_rejects_non_objects() {
        let err = fields_of(&Tally(3)).unwrap_err();
        assert!(matches!(err, TaskError::NotAnObject("a number")));
    }

    #[test]
    fn test_fields_of_rejects_reserved_keys() {
        let tagged = Tagged {
            kind: "mine".into(),
            count: 1,
        };
        let err = fields_of(&tagged).unwrap_err();
        assert!(matches!(err, TaskError::ReservedField(key) if key == "kind"));
    }

    #[test]
    fn test_fields_of_keeps_ordinary_keys() {
        let fields = fields_of(&Wrapper { fields: 5 }).unwrap();
        assert_eq!(fields.get("fields"), Some(&Value::from(5)));
    }

    #[test]
    fn test_process_display_uses_describe() {
        let process = Process::new(TaskId(4), Box::new(Idle));
        assert_eq!(process.display(), "4 Idle");
        assert_eq!(process.kind(), "Idle");
    }
}
