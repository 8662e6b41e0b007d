//! overmind - a cooperative task kernel that survives global resets
//!
//! Design principles:
//! - Tractable: one thread, one pass over the process table per tick
//! - Reset-proof: everything a task needs across ticks is a serialized field
//! - Contained failures: a task that errors or panics is dropped, not the tick
//! - No ambient state: tasks get a `KernelContext`, never a global kernel
//!
//! Platform support:
//! - Game host (wasm32-unknown-unknown): exported `loop`, state in `Memory`
//! - Native: in-memory store and world, for tests and simulation

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub mod colony;
pub mod kernel;
pub mod logging;
pub mod platform;
pub mod runtime;
pub mod store;
pub mod world;

/// Initialize panic hook so a panic reaches the host console before abort
#[cfg(target_arch = "wasm32")]
fn init_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Called by the host once per tick. This is the WASM entry point.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(js_name = loop)]
pub fn game_loop() {
    init_panic_hook();
    runtime::tick();
}
