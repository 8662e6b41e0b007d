//! Platform Abstraction Layer
//!
//! The kernel and the colony only see the [`Store`](crate::store::Store) and
//! [`World`](crate::world::World) traits. This module holds the host-side
//! implementations:
//!
//! - Game host (wasm32): `HostStore` over the global `Memory` object,
//!   `HostWorld` over the global `Game` object
//! - Native: `MemoryStore` and `SimWorld`, used by tests

#[cfg(target_arch = "wasm32")]
pub mod screeps;
