//! Game host bindings
//!
//! Everything goes through `js_sys::Reflect` on the host's globals. The
//! objects are fetched again every tick; nothing from `Game` is kept across
//! ticks.

use crate::store::{Store, StoreError};
use crate::world::{RoomView, World};
use js_sys::{Object, Reflect};
use wasm_bindgen::{JsCast, JsValue};

fn global(name: &str) -> Option<Object> {
    Reflect::get(&js_sys::global(), &JsValue::from_str(name))
        .ok()
        .and_then(|value| value.dyn_into::<Object>().ok())
}

fn field(target: &JsValue, key: &str) -> Option<JsValue> {
    Reflect::get(target, &JsValue::from_str(key))
        .ok()
        .filter(|value| !value.is_undefined() && !value.is_null())
}

fn keys(target: &Object) -> Vec<String> {
    Object::keys(target)
        .iter()
        .filter_map(|key| key.as_string())
        .collect()
}

fn js_error(context: &str, value: JsValue) -> StoreError {
    StoreError::Unavailable(format!("{}: {:?}", context, value))
}

/// The persisted `Memory` object, one string per key
pub struct HostStore {
    memory: Object,
}

impl HostStore {
    pub fn new() -> Result<Self, StoreError> {
        let memory = global("Memory")
            .ok_or_else(|| StoreError::Unavailable("no global Memory".to_string()))?;
        Ok(Self { memory })
    }
}

impl Store for HostStore {
    fn get(&self, key: &str) -> Option<String> {
        // Non-string values belong to someone else
        field(&self.memory, key)?.as_string()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        let written = Reflect::set(&self.memory, &JsValue::from_str(key), &JsValue::from_str(&value))
            .map_err(|e| js_error(key, e))?;
        if written {
            Ok(())
        } else {
            Err(StoreError::Encoding(key.to_string()))
        }
    }

    fn remove(&mut self, key: &str) -> bool {
        let key = JsValue::from_str(key);
        let existed = Reflect::has(&self.memory, &key).unwrap_or(false);
        existed && Reflect::delete_property(&self.memory, &key).unwrap_or(false)
    }

    fn keys(&self) -> Vec<String> {
        keys(&self.memory)
    }
}

/// Read-only view of the global `Game` object for this tick
pub struct HostWorld {
    game: Object,
}

impl HostWorld {
    pub fn new() -> Option<Self> {
        global("Game").map(|game| Self { game })
    }

    fn collection(&self, name: &str) -> Option<Object> {
        field(&self.game, name).and_then(|value| value.dyn_into::<Object>().ok())
    }

    fn units_in(&self, room: &str) -> Vec<String> {
        let Some(creeps) = self.collection("creeps") else {
            return Vec::new();
        };
        keys(&creeps)
            .into_iter()
            .filter(|name| {
                field(&creeps, name)
                    .and_then(|creep| field(&creep, "room"))
                    .and_then(|r| field(&r, "name"))
                    .and_then(|n| n.as_string())
                    .is_some_and(|n| n == room)
            })
            .collect()
    }
}

impl World for HostWorld {
    fn time(&self) -> u32 {
        field(&self.game, "time")
            .and_then(|t| t.as_f64())
            .map_or(0, |t| t as u32)
    }

    fn rooms(&self) -> Vec<String> {
        self.collection("rooms").map(|rooms| keys(&rooms)).unwrap_or_default()
    }

    fn room(&self, name: &str) -> Option<RoomView> {
        let room = field(&self.collection("rooms")?, name)?;
        let number = |key: &str| {
            field(&room, key)
                .and_then(|v| v.as_f64())
                .map_or(0, |v| v as u32)
        };
        let owned = field(&room, "controller")
            .and_then(|c| field(&c, "my"))
            .and_then(|my| my.as_bool())
            .unwrap_or(false);

        Some(RoomView {
            name: name.to_string(),
            owned,
            energy: number("energyAvailable"),
            energy_capacity: number("energyCapacityAvailable"),
            units: self.units_in(name),
        })
    }

    fn units(&self) -> Vec<String> {
        self.collection("creeps").map(|creeps| keys(&creeps)).unwrap_or_default()
    }
}
