//! RoomSurvey - periodic room readings for a manager
//!
//! A step is either idle or a reading: when world time reaches `next_due` the
//! survey sends a report and schedules the next one `interval` ticks out.
//! World time rather than the kernel's tick count drives it, so the schedule
//! carries across a reset. Broadcast `SurveyRequest`s for the room are
//! answered on the spot.

use super::RoomReport;
use crate::kernel::{
    Fields, KernelContext, Message, Payload, Step, Task, TaskError, TaskId, fields_of,
};
use crate::world::RoomView;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Ticks between scheduled reports
pub const DEFAULT_INTERVAL: u32 = 5;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSurvey {
    pub room: String,
    pub manager: TaskId,
    pub interval: u32,
    /// World time of the next scheduled report
    pub next_due: u32,
}

impl RoomSurvey {
    pub const KIND: &'static str = "RoomSurvey";

    pub fn new(room: &str, manager: TaskId) -> Self {
        Self {
            room: room.to_string(),
            manager,
            interval: DEFAULT_INTERVAL,
            next_due: 0,
        }
    }

    fn answer_requests(&self, view: &RoomView, ctx: &mut KernelContext<'_>) {
        let time = ctx.world().time();
        for message in ctx.public_messages() {
            let Payload::SurveyRequest { room } = &message.payload else {
                continue;
            };
            if room != &self.room {
                continue;
            }
            // Someone else may have claimed it already
            if let Some(request) = ctx.take_public(message.id) {
                let report = RoomReport::from_view(view, time);
                ctx.send(request.from, Payload::SurveyReport(report));
                debug!(task = ctx.id().0, to = request.from.0, "answered survey request");
            }
        }
    }
}

impl Task for RoomSurvey {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn describe(&self) -> String {
        format!("{} {}", Self::KIND, self.room)
    }

    fn step(&mut self, ctx: &mut KernelContext<'_>) -> Result<Step, TaskError> {
        let Some(view) = ctx.world().room(&self.room) else {
            info!(task = ctx.id().0, room = %self.room, "room lost, survey ends");
            return Ok(Step::Complete);
        };
        if !ctx.has_task(self.manager) {
            debug!(task = ctx.id().0, manager = self.manager.0, "manager gone");
            return Ok(Step::Complete);
        }

        self.answer_requests(&view, ctx);

        let now = ctx.world().time();
        if now >= self.next_due {
            let report = RoomReport::from_view(&view, now);
            ctx.send(self.manager, Payload::SurveyReport(report));
            self.next_due = now.saturating_add(self.interval.max(1));
        }
        Ok(Step::Continue)
    }

    fn receive(&mut self, message: Message, ctx: &mut KernelContext<'_>) {
        match message.payload {
            Payload::Stop => {
                let me = ctx.id();
                ctx.stop(me);
            }
            // Ask for an early reading
            Payload::SurveyRequest { room } if room == self.room => {
                self.next_due = ctx.world().time();
            }
            Payload::Note(text) => {
                info!(task = ctx.id().0, from = message.from.0, "{}", text);
            }
            other => {
                warn!(task = ctx.id().0, from = message.from.0, "unexpected {:?}", other);
            }
        }
    }

    fn to_fields(&self) -> Result<Fields, TaskError> {
        fields_of(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colony::{RoomManager, registry};
    use crate::kernel::{Kernel, KernelConfig, Recipient};
    use crate::store::MemoryStore;
    use crate::world::SimWorld;

    fn world() -> SimWorld {
        SimWorld::new().with_room(RoomView {
            name: "W1N1".into(),
            owned: true,
            energy: 120,
            energy_capacity: 300,
            units: vec!["Harvester1".into()],
        })
    }

    /// Manager at 0, survey at 1
    fn pair(kernel: &mut Kernel) -> (TaskId, TaskId) {
        let manager = kernel.allocate_id().unwrap();
        let survey = kernel.spawn_task(Box::new(RoomSurvey::new("W1N1", manager))).unwrap();
        kernel
            .register_task(manager, Box::new(RoomManager::new("W1N1", Some(survey))))
            .unwrap();
        (manager, survey)
    }

    #[test]
    fn test_reports_on_schedule() {
        let mut world = world();
        let mut store = MemoryStore::new();
        let mut kernel = Kernel::new(KernelConfig::default(), registry());
        let (manager, _) = pair(&mut kernel);

        // Survey reports on its first step; the manager reads it next tick
        kernel.tick(&world, &mut store);
        assert_eq!(kernel.messenger().pending(manager), 1);
        world.advance();
        kernel.tick(&world, &mut store);
        assert_eq!(kernel.messenger().pending(manager), 0);

        for _ in 0..3 {
            world.advance();
            kernel.tick(&world, &mut store);
            assert_eq!(kernel.messenger().pending(manager), 0);
        }
        // time 5
        world.advance();
        kernel.tick(&world, &mut store);
        assert_eq!(kernel.messenger().pending(manager), 1);
    }

    #[test]
    fn test_answers_broadcast_request() {
        let world = world();
        let mut store = MemoryStore::new();
        let mut kernel = Kernel::new(KernelConfig::default(), registry());
        pair(&mut kernel);
        kernel.tick(&world, &mut store);

        let asker = TaskId(77);
        kernel.send_message(
            asker,
            Recipient::Broadcast,
            Payload::SurveyRequest {
                room: "W1N1".into(),
            },
        );
        kernel.tick(&world, &mut store);

        assert_eq!(kernel.messenger().public_messages().count(), 0);
        assert_eq!(kernel.messenger().pending(asker), 1);
    }

    #[test]
    fn test_ignores_requests_for_other_rooms() {
        let world = world();
        let mut store = MemoryStore::new();
        let mut kernel = Kernel::new(KernelConfig::default(), registry());
        pair(&mut kernel);

        kernel.send_message(
            TaskId(77),
            Recipient::Broadcast,
            Payload::SurveyRequest {
                room: "E5S5".into(),
            },
        );
        kernel.tick(&world, &mut store);
        assert_eq!(kernel.messenger().public_messages().count(), 1);
    }

    #[test]
    fn test_ends_without_manager() {
        let world = world();
        let mut store = MemoryStore::new();
        let mut kernel = Kernel::new(KernelConfig::default(), registry());
        let id = kernel.spawn_task(Box::new(RoomSurvey::new("W1N1", TaskId(50)))).unwrap();

        let report = kernel.tick(&world, &mut store);
        assert_eq!(report.completed, 1);
        assert!(!kernel.has_task(id));
    }

    #[test]
    fn test_fields_round_trip_through_registry() {
        let survey = RoomSurvey {
            room: "W1N1".into(),
            manager: TaskId(3),
            interval: 7,
            next_due: 140,
        };
        let fields = serde_json::Value::Object(survey.to_fields().unwrap());
        assert_eq!(
            fields,
            serde_json::json!({ "room": "W1N1", "manager": 3, "interval": 7, "nextDue": 140 })
        );
        let restored = registry().restore(RoomSurvey::KIND, fields).unwrap();
        assert_eq!(restored.describe(), "RoomSurvey W1N1");
    }
}
