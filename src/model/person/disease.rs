//! The disease statechart (§4.6): healthy → polyp stages → preclinical
//! cancer stages → clinical cancer stages → dead, driven by messages the
//! person's lesions post as they progress.
//!
//! Grounded in `original_source/crcsim/agent.py::Person.handle_disease_message`.

use super::Person;
use crate::model::enums::{PersonDiseaseMessage as M, PersonDiseaseState as S, TreatmentRole};
use crate::output::EventLog;
use crate::scheduler::{Message, Scheduler};

/// What the caller must do after the state/log write, beyond the
/// transition itself. Kept separate from the match arms below so every
/// arm stays a pure `(old, message) -> new_state` lookup, with all side
/// effects sequenced in the same order the source performs them: set
/// state, log the transition, *then* act on what just happened.
enum Followup {
    None,
    Died,
    DiedOfCrc,
    ClinicalOnset(u8),
}

impl Person {
    pub(super) fn handle_disease_message(&mut self, message: M, scheduler: &mut Scheduler, out: &mut EventLog) {
        let old_state = self.disease_state;

        let (new_state, followup) = match (old_state, message) {
            (S::Uninitialized, M::Init) => (S::Healthy, Followup::None),
            (S::Uninitialized, _) => {
                panic!("Person received unexpected message {message:?} in disease state {old_state:?}")
            }

            (S::Healthy, M::PolypOnset) => (S::SmallPolyp, Followup::None),
            (S::Healthy, M::OtherDeath | M::PolypectomyDeath) => (S::Dead, Followup::Died),
            (S::Healthy, _) => return,

            (S::SmallPolyp, M::AllPolypsRemoved) => (S::Healthy, Followup::None),
            (S::SmallPolyp, M::PolypMediumOnset) => (S::MediumPolyp, Followup::None),
            (S::SmallPolyp, M::OtherDeath | M::PolypectomyDeath) => (S::Dead, Followup::Died),
            (S::SmallPolyp, _) => return,

            (S::MediumPolyp, M::AllPolypsRemoved) => (S::Healthy, Followup::None),
            (S::MediumPolyp, M::PolypLargeOnset) => (S::LargePolyp, Followup::None),
            (S::MediumPolyp, M::PreclinicalOnset) => (S::PreclinicalStage1, Followup::None),
            (S::MediumPolyp, M::OtherDeath | M::PolypectomyDeath) => (S::Dead, Followup::Died),
            (S::MediumPolyp, _) => return,

            (S::LargePolyp, M::AllPolypsRemoved) => (S::Healthy, Followup::None),
            (S::LargePolyp, M::PreclinicalOnset) => (S::PreclinicalStage1, Followup::None),
            (S::LargePolyp, M::OtherDeath | M::PolypectomyDeath) => (S::Dead, Followup::Died),
            (S::LargePolyp, _) => return,

            (S::PreclinicalStage1, M::Pre2Onset) => (S::PreclinicalStage2, Followup::None),
            (S::PreclinicalStage1, M::ClinicalOnset) => (S::ClinicalStage1, Followup::ClinicalOnset(1)),
            (S::PreclinicalStage1, M::OtherDeath | M::PolypectomyDeath) => (S::Dead, Followup::Died),
            (S::PreclinicalStage1, _) => return,

            (S::PreclinicalStage2, M::Pre3Onset) => (S::PreclinicalStage3, Followup::None),
            (S::PreclinicalStage2, M::ClinicalOnset) => (S::ClinicalStage2, Followup::ClinicalOnset(2)),
            (S::PreclinicalStage2, M::OtherDeath | M::PolypectomyDeath) => (S::Dead, Followup::Died),
            (S::PreclinicalStage2, _) => return,

            (S::PreclinicalStage3, M::Pre4Onset) => (S::PreclinicalStage4, Followup::None),
            (S::PreclinicalStage3, M::ClinicalOnset) => (S::ClinicalStage3, Followup::ClinicalOnset(3)),
            (S::PreclinicalStage3, M::OtherDeath | M::PolypectomyDeath) => (S::Dead, Followup::Died),
            (S::PreclinicalStage3, _) => return,

            (S::PreclinicalStage4, M::ClinicalOnset) => (S::ClinicalStage4, Followup::ClinicalOnset(4)),
            (S::PreclinicalStage4, M::OtherDeath | M::PolypectomyDeath) => (S::Dead, Followup::Died),
            (S::PreclinicalStage4, _) => return,

            (S::ClinicalStage1 | S::ClinicalStage2 | S::ClinicalStage3 | S::ClinicalStage4, M::OtherDeath | M::PolypectomyDeath) => {
                (S::Dead, Followup::Died)
            }
            (S::ClinicalStage1 | S::ClinicalStage2 | S::ClinicalStage3 | S::ClinicalStage4, M::CrcDeath) => {
                (S::Dead, Followup::DiedOfCrc)
            }
            (S::ClinicalStage1 | S::ClinicalStage2 | S::ClinicalStage3 | S::ClinicalStage4, _) => return,

            (S::Dead, _) => return,
        };

        self.disease_state = new_state;
        out.add_disease_state_change(
            self.id,
            message.name(),
            scheduler.time(),
            old_state.name(),
            new_state.name(),
            self.routine_test.clone(),
        );

        match followup {
            Followup::None => {}
            Followup::Died => {
                scheduler.schedule(Message::EndSimulation, 0.0);
            }
            Followup::DiedOfCrc => {
                scheduler.schedule(Message::EndSimulation, 0.0);
                out.add_treatment(self.id, self.stage_at_detection, TreatmentRole::Terminal, scheduler.time());
            }
            Followup::ClinicalOnset(stage) => {
                self.stage_at_detection = Some(stage);
                self.detect_other_cancers(scheduler);
                scheduler.schedule(Message::Treatment(crate::model::enums::PersonTreatmentMessage::StartTreatment), 0.0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::enums::{RaceEthnicity, Sex};

    fn healthy_person() -> Person {
        let mut person = Person::new(1, Sex::Female, RaceEthnicity::WhiteNonHispanic);
        let mut scheduler = Scheduler::new();
        let mut out = EventLog::new();
        person.handle_disease_message(M::Init, &mut scheduler, &mut out);
        person
    }

    #[test]
    fn init_enters_healthy() {
        let person = healthy_person();
        assert_eq!(person.disease_state, S::Healthy);
    }

    #[test]
    fn polyp_onset_moves_healthy_to_small_polyp() {
        let mut person = healthy_person();
        let mut scheduler = Scheduler::new();
        let mut out = EventLog::new();
        person.handle_disease_message(M::PolypOnset, &mut scheduler, &mut out);
        assert_eq!(person.disease_state, S::SmallPolyp);

        let record = &out.records()[0];
        assert_eq!(record.old_state, Some("HEALTHY"));
        assert_eq!(record.new_state, Some("SMALL_POLYP"));
        assert_eq!(record.message, Some("POLYP_ONSET"));
    }

    #[test]
    fn other_death_from_any_nonterminal_state_ends_the_simulation() {
        let mut person = healthy_person();
        let mut scheduler = Scheduler::new();
        let mut out = EventLog::new();
        person.handle_disease_message(M::OtherDeath, &mut scheduler, &mut out);
        assert_eq!(person.disease_state, S::Dead);
        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.consume_next().message, Message::EndSimulation);
    }

    #[test]
    fn clinical_onset_records_stage_and_starts_treatment() {
        let mut person = healthy_person();
        person.disease_state = S::PreclinicalStage2;
        let mut scheduler = Scheduler::new();
        let mut out = EventLog::new();
        person.handle_disease_message(M::ClinicalOnset, &mut scheduler, &mut out);

        assert_eq!(person.disease_state, S::ClinicalStage2);
        assert_eq!(person.stage_at_detection, Some(2));

        let messages: Vec<_> = std::iter::from_fn(|| {
            if scheduler.is_empty() {
                None
            } else {
                Some(scheduler.consume_next().message)
            }
        })
        .collect();
        assert!(messages.contains(&Message::Treatment(crate::model::enums::PersonTreatmentMessage::StartTreatment)));
    }

    #[test]
    fn crc_death_from_clinical_stage_logs_terminal_treatment_and_ends_simulation() {
        let mut person = healthy_person();
        person.disease_state = S::ClinicalStage3;
        person.stage_at_detection = Some(3);
        let mut scheduler = Scheduler::new();
        let mut out = EventLog::new();
        person.handle_disease_message(M::CrcDeath, &mut scheduler, &mut out);

        assert_eq!(person.disease_state, S::Dead);
        let treatment_records: Vec<_> =
            out.records().iter().filter(|r| r.record_type == crate::output::RecordType::Treatment).collect();
        assert_eq!(treatment_records.len(), 1);
        assert_eq!(treatment_records[0].role, Some("TERMINAL"));
        assert_eq!(treatment_records[0].stage, Some(3));
    }

    #[test]
    fn messages_unreachable_from_the_current_state_are_ignored() {
        let mut person = healthy_person();
        let mut scheduler = Scheduler::new();
        let mut out = EventLog::new();
        // Healthy doesn't react to PreclinicalOnset-family messages.
        person.handle_disease_message(M::Pre2Onset, &mut scheduler, &mut out);
        assert_eq!(person.disease_state, S::Healthy);
        assert!(out.records().is_empty());
    }
}
