//! Task registry - kind tag to constructor
//!
//! A reset leaves only serialized records behind. The registry turns a record
//! back into a live task by looking its `kind` up here.

use super::error::RestoreError;
use super::socket::Socket;
use super::task::Task;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;

type Constructor = fn(Value) -> serde_json::Result<Box<dyn Task>>;

fn construct<T>(fields: Value) -> serde_json::Result<Box<dyn Task>>
where
    T: Task + DeserializeOwned + 'static,
{
    Ok(Box::new(serde_json::from_value::<T>(fields)?))
}

pub struct TaskRegistry {
    constructors: HashMap<&'static str, Constructor>,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRegistry {
    /// A registry that knows the kernel's own kinds
    pub fn new() -> Self {
        let mut registry = Self {
            constructors: HashMap::new(),
        };
        registry.register::<Socket>(Socket::KIND);
        registry
    }

    /// Register `T` under `kind`, which must match `T::kind()`
    pub fn register<T>(&mut self, kind: &'static str) -> &mut Self
    where
        T: Task + DeserializeOwned + 'static,
    {
        self.constructors.insert(kind, construct::<T>);
        self
    }

    pub fn knows(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.constructors.keys().copied()
    }

    /// Rebuild a task from its kind tag and field object
    pub fn restore(&self, kind: &str, fields: Value) -> Result<Box<dyn Task>, RestoreError> {
        let constructor = self
            .constructors
            .get(kind)
            .ok_or_else(|| RestoreError::UnknownKind {
                kind: kind.to_string(),
            })?;
        constructor(fields).map_err(|source| RestoreError::Malformed {
            kind: kind.to_string(),
            source,
        })
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.kinds().collect();
        kinds.sort_unstable();
        f.debug_struct("TaskRegistry").field("kinds", &kinds).finish()
    }
}
