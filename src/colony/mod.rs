//! The colony - domain tasks that run on the kernel
//!
//! Every kind is registered once, in [`registry`]. A cold start gets the
//! topology built by [`bootstrap`]: one janitor, and a manager plus a survey
//! for every room we own.

mod janitor;
mod room;
mod survey;

pub use janitor::{Janitor, UNIT_PREFIX};
pub use room::RoomManager;
pub use survey::{DEFAULT_INTERVAL, RoomSurvey};

pub use crate::world::RoomReport;

use crate::kernel::{Kernel, KernelError, TaskRegistry};
use crate::world::World;
use tracing::info;

/// Constructors for every colony task kind
pub fn registry() -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    registry
        .register::<Janitor>(Janitor::KIND)
        .register::<RoomManager>(RoomManager::KIND)
        .register::<RoomSurvey>(RoomSurvey::KIND);
    registry
}

/// Spawn the baseline tasks into an empty kernel
pub fn bootstrap(kernel: &mut Kernel, world: &dyn World) -> Result<(), KernelError> {
    kernel.spawn_task(Box::new(Janitor::new()))?;

    for room in world.owned_rooms() {
        // The manager and its survey refer to each other
        let manager = kernel.allocate_id()?;
        let survey = kernel.spawn_task(Box::new(RoomSurvey::new(&room, manager)))?;
        kernel.register_task(manager, Box::new(RoomManager::new(&room, Some(survey))))?;
        info!(room = %room, manager = manager.0, survey = survey.0, "room under management");
    }
    Ok(())
}
