//! Janitor - clears store entries left behind by dead units

use crate::kernel::{Fields, KernelContext, Step, Task, TaskError, fields_of};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Store keys of per-unit bookkeeping start with this
pub const UNIT_PREFIX: &str = "unit:";

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Janitor {}

impl Janitor {
    pub const KIND: &'static str = "Janitor";

    pub fn new() -> Self {
        Self {}
    }
}

impl Task for Janitor {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn step(&mut self, ctx: &mut KernelContext<'_>) -> Result<Step, TaskError> {
        let alive: HashSet<String> = ctx.world().units().into_iter().collect();
        let id = ctx.id();

        let memory = ctx.memory();
        for key in memory.keys() {
            let Some(unit) = key.strip_prefix(UNIT_PREFIX) else {
                continue;
            };
            if !alive.contains(unit) && memory.remove(&key) {
                debug!(task = id.0, unit, "cleared memory of dead unit");
            }
        }
        Ok(Step::Continue)
    }

    fn to_fields(&self) -> Result<Fields, TaskError> {
        fields_of(self)
    }
}
