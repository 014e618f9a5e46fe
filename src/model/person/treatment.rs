//! The treatment statechart (§4.8): no treatment vs. an in-progress
//! treatment series, plus the yearly "ongoing treatment" ticks a series
//! produces while active.
//!
//! Grounded in `original_source/crcsim/agent.py::Person.handle_treatment_message`
//! and `Person.handle_ongoing_treatment`.

use super::Person;
use crate::model::enums::{PersonTreatmentMessage as M, PersonTreatmentState as S, TreatmentRole};
use crate::output::EventLog;
use crate::params::Parameters;
use crate::scheduler::{Message, Scheduler};

impl Person {
    pub(super) fn handle_treatment_message(&mut self, message: M, scheduler: &mut Scheduler, out: &mut EventLog) {
        match (self.treatment_state, message) {
            (S::Uninitialized, M::Init) => {
                self.treatment_state = S::NoTreatment;
            }
            (S::Uninitialized, _) => {
                panic!("Person received unexpected message {message:?} in treatment state {:?}", self.treatment_state)
            }

            (S::NoTreatment, M::StartTreatment) => self.start_treatment_series(scheduler, out),

            // Starting a new series while one is already running cancels the
            // old series's ongoing-treatment ticks first.
            (S::Treatment, M::StartTreatment) => {
                if let Some(handle) = self.ongoing_treatment_event.take() {
                    handle.set(false);
                }
                self.start_treatment_series(scheduler, out);
            }

            (S::NoTreatment, _) | (S::Treatment, _) => {}
        }
    }

    fn start_treatment_series(&mut self, scheduler: &mut Scheduler, out: &mut EventLog) {
        self.treatment_state = S::Treatment;
        out.add_treatment(self.id, self.stage_at_detection, TreatmentRole::Initial, scheduler.time());
        self.previous_treatment_initiation_age = Some(scheduler.time() as i64);
        self.num_ongoing_treatments = 0;
        self.ongoing_treatment_event = Some(scheduler.schedule(Message::OngoingTreatment, 1.0));
    }

    pub(super) fn handle_ongoing_treatment(&mut self, scheduler: &mut Scheduler, params: &Parameters, out: &mut EventLog) {
        self.num_ongoing_treatments += 1;
        out.add_treatment(self.id, self.stage_at_detection, TreatmentRole::Ongoing, scheduler.time());

        if self.num_ongoing_treatments < params.max_ongoing_treatments {
            self.ongoing_treatment_event = Some(scheduler.schedule(Message::OngoingTreatment, 1.0));
        }
    }
}
