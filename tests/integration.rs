//! Integration tests for overmind
//!
//! Drive the colony end to end against the in-memory world and store,
//! including global resets in the middle of a run.

use overmind::colony::{self, RoomReport};
use overmind::kernel::{
    Boot, Fields, Kernel, KernelConfig, KernelContext, KernelSnapshot, Message, Payload,
    PayloadKind, Recipient, Step, Task, TaskError, TaskId, TaskRegistry, fields_of,
};
use serde::{Deserialize, Serialize};
use overmind::runtime::Runtime;
use overmind::store::{MemoryStore, Store};
use overmind::world::{RoomView, SimWorld, World};

fn room(name: &str, owned: bool, units: &[&str]) -> RoomView {
    RoomView {
        name: name.into(),
        owned,
        energy: 300,
        energy_capacity: 550,
        units: units.iter().map(|u| u.to_string()).collect(),
    }
}

fn colony_world() -> SimWorld {
    SimWorld::new()
        .with_room(room("W1N1", true, &["Harvester1", "Upgrader1"]))
        .with_room(room("W2N1", true, &["Harvester2"]))
        .with_room(room("W3N1", false, &[]))
}

fn boot(world: &dyn World, store: &mut MemoryStore) -> Kernel {
    Kernel::boot(KernelConfig::default(), colony::registry(), store, |kernel| {
        colony::bootstrap(kernel, world).unwrap();
    })
}

fn record(store: &MemoryStore) -> KernelSnapshot {
    KernelSnapshot::from_json(&store.get("kernel").unwrap()).unwrap()
}

// ============================================================================
// Boot and Reset
// ============================================================================

#[test]
fn test_cold_boot_builds_baseline() {
    let world = colony_world();
    let mut store = MemoryStore::new();
    let kernel = boot(&world, &mut store);

    assert_eq!(kernel.mode(), Boot::Cold);
    assert_eq!(
        kernel.describe(),
        [
            "0 Janitor",
            "1 RoomManager W1N1",
            "2 RoomSurvey W1N1",
            "3 RoomManager W2N1",
            "4 RoomSurvey W2N1",
        ]
    );
    // Persisted before the first tick
    assert_eq!(record(&store).tasks.len(), 5);
}

#[test]
fn test_global_reset_mid_run() {
    let mut world = colony_world();
    let mut store = MemoryStore::new();
    let mut runtime = Runtime::new();

    for _ in 0..12 {
        world.advance();
        runtime.run(&world, &mut store);
    }
    let before = runtime.kernel().unwrap().serialize().unwrap();
    runtime.kernel_mut().unwrap().persist(&mut store).unwrap();

    runtime.reset();
    assert!(!runtime.is_booted());

    world.advance();
    runtime.run(&world, &mut store);
    let kernel = runtime.kernel().unwrap();
    assert_eq!(
        kernel.mode(),
        Boot::Warm {
            restored: 5,
            skipped: 0
        }
    );
    assert_eq!(kernel.table().ids(), record_ids(&before));
}

fn record_ids(raw: &str) -> Vec<TaskId> {
    KernelSnapshot::from_json(raw)
        .unwrap()
        .tasks
        .iter()
        .map(|task| TaskId(task["id"].as_u64().unwrap() as u32))
        .collect()
}

#[test]
fn test_reset_before_first_persist_loses_only_progress() {
    let mut world = colony_world();
    let mut store = MemoryStore::new();
    let mut runtime = Runtime::new();

    // Cold boot persisted the baseline; three ticks of progress are not
    for _ in 0..3 {
        world.advance();
        runtime.run(&world, &mut store);
    }
    runtime.reset();
    runtime.run(&world, &mut store);

    let kernel = runtime.kernel().unwrap();
    assert!(matches!(kernel.mode(), Boot::Warm { restored: 5, .. }));
    assert_eq!(kernel.table().next_id(), 5);
}

#[test]
fn test_corrupt_record_falls_back_to_cold_start() {
    let world = colony_world();
    let mut store = MemoryStore::new();
    store.set("kernel", "{\"nextTaskId\":".into()).unwrap();

    let kernel = boot(&world, &mut store);
    assert_eq!(kernel.mode(), Boot::Cold);
    assert_eq!(kernel.table().len(), 5);
    assert_eq!(
        store.get("kernel.backup").as_deref(),
        Some("{\"nextTaskId\":")
    );
}

#[test]
fn test_unknown_kind_in_colony_record() {
    let world = colony_world();
    let mut store = MemoryStore::new();
    let kernel = boot(&world, &mut store);

    let mut snapshot = record(&store);
    snapshot
        .tasks
        .push(serde_json::json!({ "kind": "Defender", "id": 9, "target": "Invader" }));
    snapshot.next_task_id = 10;
    store.set("kernel", snapshot.to_json().unwrap()).unwrap();
    drop(kernel);

    let mut kernel = boot(&world, &mut store);
    assert_eq!(
        kernel.mode(),
        Boot::Warm {
            restored: 5,
            skipped: 1
        }
    );
    assert!(store.get("kernel.backup").unwrap().contains("Defender"));
    assert!(!store.get("kernel").unwrap().contains("Defender"));

    // The counter does not go backwards past the dropped entry
    assert_eq!(
        kernel.spawn_task(Box::new(colony::Janitor::new())).unwrap(),
        TaskId(10)
    );
}

// ============================================================================
// Colony Behavior
// ============================================================================

#[test]
fn test_manager_records_survey_reports() {
    let mut world = colony_world();
    let mut store = MemoryStore::new();
    let mut kernel = boot(&world, &mut store);

    for _ in 0..2 {
        kernel.tick(&world, &mut store);
        world.advance();
    }
    kernel.persist(&mut store).unwrap();

    let manager = record(&store)
        .tasks
        .into_iter()
        .find(|task| task["kind"] == "RoomManager" && task["room"] == "W1N1")
        .unwrap();
    let report: RoomReport = serde_json::from_value(manager["lastReport"].clone()).unwrap();
    assert_eq!(report.room, "W1N1");
    assert_eq!(report.units, 2);
    assert_eq!(report.energy_capacity, 550);
}

#[test]
fn test_losing_a_room_retires_its_tasks() {
    let mut world = colony_world();
    let mut store = MemoryStore::new();
    let mut kernel = boot(&world, &mut store);
    kernel.tick(&world, &mut store);

    world.remove_room("W2N1");
    let report = kernel.tick(&world, &mut store);

    assert_eq!(report.failed, 0);
    assert_eq!(
        kernel.describe(),
        ["0 Janitor", "1 RoomManager W1N1", "2 RoomSurvey W1N1"]
    );
}

#[test]
fn test_janitor_clears_dead_units() {
    let mut world = colony_world();
    let mut store = MemoryStore::new();
    store.set("unit:Harvester2", "{\"role\":\"harvester\"}".into()).unwrap();
    store.set("unit:Upgrader1", "{\"role\":\"upgrader\"}".into()).unwrap();
    let mut kernel = boot(&world, &mut store);

    kernel.tick(&world, &mut store);
    assert!(store.contains("unit:Harvester2"));

    if let Some(room) = world.room_mut("W2N1") {
        room.units.clear();
    }
    kernel.tick(&world, &mut store);
    assert!(!store.contains("unit:Harvester2"));
    assert!(store.contains("unit:Upgrader1"));
}

#[test]
fn test_broadcast_survey_request_is_answered_once() {
    let world = colony_world();
    let mut store = MemoryStore::new();
    let mut kernel = boot(&world, &mut store);
    kernel.tick(&world, &mut store);

    let asker = TaskId(500);
    for _ in 0..2 {
        kernel.send_message(
            asker,
            Recipient::Broadcast,
            Payload::SurveyRequest {
                room: "W2N1".into(),
            },
        );
    }
    kernel.send_message(
        asker,
        Recipient::Broadcast,
        Payload::SurveyRequest {
            room: "E9S9".into(),
        },
    );
    kernel.tick(&world, &mut store);

    // Both W2N1 requests answered by the W2N1 survey; nobody watches E9S9
    assert_eq!(kernel.messenger().pending(asker), 2);
    assert_eq!(kernel.messenger().public_messages().count(), 1);
}

#[test]
fn test_stop_message_retires_room() {
    let world = colony_world();
    let mut store = MemoryStore::new();
    let mut kernel = boot(&world, &mut store);
    kernel.tick(&world, &mut store);

    kernel.send_message(TaskId(0), Recipient::Task(TaskId(3)), Payload::Stop);
    kernel.tick(&world, &mut store);

    assert!(!kernel.has_task(TaskId(3)));
    assert!(!kernel.has_task(TaskId(4)));
    assert_eq!(kernel.table().len(), 3);
}

#[test]
fn test_idle_ticks_keep_topology() {
    let mut world = colony_world();
    let mut store = MemoryStore::new();
    let mut kernel = boot(&world, &mut store);
    let ids = kernel.table().ids();

    for _ in 0..25 {
        world.advance();
        let report = kernel.tick(&world, &mut store);
        assert_eq!(report.ran, 5);
        assert_eq!(report.failed, 0);
    }
    assert_eq!(kernel.table().ids(), ids);
    assert_eq!(kernel.ticks(), 25);
}

/// Asks for a room report through a socket and keeps the answer
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Scout {
    room: String,
    socket: Option<TaskId>,
    answer: Option<RoomReport>,
    answered_by: Option<TaskId>,
}

impl Task for Scout {
    fn kind(&self) -> &'static str {
        "Scout"
    }

    fn step(&mut self, ctx: &mut KernelContext<'_>) -> Result<Step, TaskError> {
        if self.socket.is_none() {
            let request = Payload::SurveyRequest {
                room: self.room.clone(),
            };
            let socket =
                ctx.request(Recipient::Broadcast, request, PayloadKind::SurveyReport, 20)?;
            self.socket = Some(socket);
        }
        Ok(Step::Continue)
    }

    fn receive(&mut self, message: Message, _ctx: &mut KernelContext<'_>) {
        if let Payload::SurveyReport(report) = message.payload {
            self.answer = Some(report);
            self.answered_by = Some(message.from);
        }
    }

    fn to_fields(&self) -> Result<Fields, TaskError> {
        fields_of(self)
    }
}

#[test]
fn test_request_is_answered_through_a_socket() {
    let world = colony_world();
    let mut store = MemoryStore::new();
    let mut registry: TaskRegistry = colony::registry();
    registry.register::<Scout>("Scout");
    let mut kernel = Kernel::boot(KernelConfig::default(), registry, &mut store, |kernel| {
        colony::bootstrap(kernel, &world).unwrap();
    });
    let scout = kernel
        .spawn_task(Box::new(Scout {
            room: "W2N1".into(),
            ..Scout::default()
        }))
        .unwrap();

    // Scout asks; the W2N1 survey answers the socket; the socket forwards
    kernel.tick(&world, &mut store);
    assert!(kernel.describe().contains(&"6 Socket for SurveyReport".to_string()));
    kernel.tick(&world, &mut store);
    assert!(!kernel.has_task(TaskId(6)));
    kernel.tick(&world, &mut store);
    kernel.persist(&mut store).unwrap();

    let entry = record(&store)
        .tasks
        .into_iter()
        .find(|task| task["id"] == scout.0)
        .unwrap();
    let answer: RoomReport = serde_json::from_value(entry["answer"].clone()).unwrap();
    assert_eq!(answer.room, "W2N1");
    assert_eq!(answer.units, 1);
    assert_eq!(entry["socket"], 6);
    assert_eq!(entry["answeredBy"], 6);
    assert_eq!(kernel.messenger().public_messages().count(), 0);
}
