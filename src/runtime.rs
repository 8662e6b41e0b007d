//! Host runtime integration
//!
//! The host calls the exported loop once per game tick. After a global reset
//! the module is loaded fresh, so the first call boots the kernel from the
//! store and every later call ticks it.

use crate::colony;
use crate::kernel::{Kernel, KernelConfig, TickReport, config::CONFIG_KEY};
use crate::logging;
use crate::store::Store;
use crate::world::World;
use tracing::{error, info};

/// Boot-on-first-tick wrapper around the kernel
#[derive(Debug, Default)]
pub struct Runtime {
    kernel: Option<Kernel>,
}

impl Runtime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_booted(&self) -> bool {
        self.kernel.is_some()
    }

    pub fn kernel(&self) -> Option<&Kernel> {
        self.kernel.as_ref()
    }

    pub fn kernel_mut(&mut self) -> Option<&mut Kernel> {
        self.kernel.as_mut()
    }

    /// Drop all in-memory state, as a global reset would
    pub fn reset(&mut self) {
        self.kernel = None;
    }

    /// Run one host tick, booting first if needed
    pub fn run(&mut self, world: &dyn World, store: &mut dyn Store) -> TickReport {
        let kernel = match self.kernel.take() {
            Some(kernel) => kernel,
            None => boot(world, store),
        };
        let kernel = self.kernel.insert(kernel);
        kernel.tick(world, store)
    }
}

fn boot(world: &dyn World, store: &mut dyn Store) -> Kernel {
    let config = KernelConfig::load(store, CONFIG_KEY);
    logging::init(&config.log_filter);
    info!(time = world.time(), "booting");

    Kernel::boot(config, colony::registry(), store, |kernel| {
        if let Err(e) = colony::bootstrap(kernel, world) {
            error!("bootstrap failed: {}", e);
        }
    })
}

#[cfg(target_arch = "wasm32")]
mod host {
    use super::Runtime;
    use crate::platform::screeps::{HostStore, HostWorld};
    use std::cell::RefCell;
    use tracing::{debug, error};

    thread_local! {
        static RUNTIME: RefCell<Runtime> = RefCell::new(Runtime::new());
    }

    pub fn tick() {
        let Some(world) = HostWorld::new() else {
            error!("no Game object, skipping tick");
            return;
        };
        let mut store = match HostStore::new() {
            Ok(store) => store,
            Err(e) => {
                error!("skipping tick: {}", e);
                return;
            }
        };

        RUNTIME.with(|runtime| {
            let report = runtime.borrow_mut().run(&world, &mut store);
            debug!(
                tick = report.tick,
                ran = report.ran,
                failed = report.failed,
                "host tick"
            );
        });
    }
}

#[cfg(target_arch = "wasm32")]
pub use host::tick;
