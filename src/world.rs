//! World-query capability
//!
//! A read-only view of the simulation for the current tick. Nothing read
//! through it is persisted by the kernel; tasks hold names, not objects, and
//! look entities up again every tick.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a task can see of one room this tick
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoomView {
    pub name: String,
    /// Controlled by us
    pub owned: bool,
    pub energy: u32,
    pub energy_capacity: u32,
    /// Our units currently in the room
    pub units: Vec<String>,
}

/// A room's state as a survey saw it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomReport {
    pub room: String,
    pub energy: u32,
    pub energy_capacity: u32,
    pub units: usize,
    /// World time of the reading
    pub time: u32,
}

impl RoomReport {
    pub fn from_view(view: &RoomView, time: u32) -> Self {
        Self {
            room: view.name.clone(),
            energy: view.energy,
            energy_capacity: view.energy_capacity,
            units: view.units.len(),
            time,
        }
    }
}

pub trait World {
    /// Simulation time of this tick
    fn time(&self) -> u32;

    /// Names of all visible rooms
    fn rooms(&self) -> Vec<String>;

    fn room(&self, name: &str) -> Option<RoomView>;

    /// Names of all our living units
    fn units(&self) -> Vec<String>;

    fn owned_rooms(&self) -> Vec<String> {
        self.rooms()
            .into_iter()
            .filter(|name| self.room(name).is_some_and(|room| room.owned))
            .collect()
    }
}

/// A world held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct SimWorld {
    pub time: u32,
    rooms: BTreeMap<String, RoomView>,
}

impl SimWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a room
    pub fn with_room(mut self, room: RoomView) -> Self {
        self.insert_room(room);
        self
    }

    pub fn insert_room(&mut self, room: RoomView) {
        self.rooms.insert(room.name.clone(), room);
    }

    pub fn remove_room(&mut self, name: &str) -> Option<RoomView> {
        self.rooms.remove(name)
    }

    pub fn room_mut(&mut self, name: &str) -> Option<&mut RoomView> {
        self.rooms.get_mut(name)
    }

    /// Advance the clock by one tick
    pub fn advance(&mut self) {
        self.time += 1;
    }
}

impl World for SimWorld {
    fn time(&self) -> u32 {
        self.time
    }

    fn rooms(&self) -> Vec<String> {
        self.rooms.keys().cloned().collect()
    }

    fn room(&self, name: &str) -> Option<RoomView> {
        self.rooms.get(name).cloned()
    }

    fn units(&self) -> Vec<String> {
        self.rooms
            .values()
            .flat_map(|room| room.units.iter().cloned())
            .collect()
    }
}
