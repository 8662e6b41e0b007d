//! RoomManager - owns one room for as long as we control it

use super::RoomReport;
use super::survey::RoomSurvey;
use crate::kernel::{
    Fields, KernelContext, Message, Payload, Step, Task, TaskError, TaskId, fields_of,
};
use crate::world::RoomView;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomManager {
    pub room: String,
    /// The survey feeding this manager, if one has been spawned
    pub survey: Option<TaskId>,
    #[serde(default)]
    pub last_report: Option<RoomReport>,
    /// Last view of the room, refreshed every step
    #[serde(skip)]
    view: Option<RoomView>,
}

impl RoomManager {
    pub const KIND: &'static str = "RoomManager";

    pub fn new(room: &str, survey: Option<TaskId>) -> Self {
        Self {
            room: room.to_string(),
            survey,
            last_report: None,
            view: None,
        }
    }

    pub fn view(&self) -> Option<&RoomView> {
        self.view.as_ref()
    }

    fn release(&mut self, ctx: &mut KernelContext<'_>) {
        if let Some(survey) = self.survey.take() {
            if ctx.has_task(survey) {
                ctx.stop(survey);
            }
        }
    }
}

impl Task for RoomManager {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn describe(&self) -> String {
        format!("{} {}", Self::KIND, self.room)
    }

    fn step(&mut self, ctx: &mut KernelContext<'_>) -> Result<Step, TaskError> {
        let Some(view) = ctx.world().room(&self.room) else {
            info!(task = ctx.id().0, room = %self.room, "room lost");
            self.release(ctx);
            return Ok(Step::Complete);
        };
        if !view.owned {
            info!(task = ctx.id().0, room = %self.room, "room no longer ours");
            self.release(ctx);
            return Ok(Step::Complete);
        }
        self.view = Some(view);

        let survey_alive = self.survey.is_some_and(|id| ctx.has_task(id));
        if !survey_alive {
            let survey = ctx.spawn(Box::new(RoomSurvey::new(&self.room, ctx.id())))?;
            debug!(task = ctx.id().0, survey = survey.0, "respawned survey");
            self.survey = Some(survey);
        }

        Ok(Step::Continue)
    }

    fn receive(&mut self, message: Message, ctx: &mut KernelContext<'_>) {
        match message.payload {
            Payload::SurveyReport(report) if report.room == self.room => {
                debug!(
                    task = ctx.id().0,
                    energy = report.energy,
                    units = report.units,
                    "survey report"
                );
                self.last_report = Some(report);
            }
            Payload::SurveyReport(report) => {
                warn!(task = ctx.id().0, room = %report.room, "report for another room");
            }
            Payload::Stop => {
                info!(task = ctx.id().0, from = message.from.0, "stop requested");
                self.release(ctx);
                let me = ctx.id();
                ctx.stop(me);
            }
            Payload::Note(text) => {
                info!(task = ctx.id().0, from = message.from.0, "{}", text);
            }
            Payload::SurveyRequest { room } => {
                warn!(task = ctx.id().0, room = %room, "managers do not answer survey requests");
            }
        }
    }

    fn to_fields(&self) -> Result<Fields, TaskError> {
        fields_of(self)
    }
}
