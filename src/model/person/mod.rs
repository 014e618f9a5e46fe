//! A simulated individual: three parallel statecharts (disease, testing,
//! treatment) driven by a private [`Scheduler`], plus the lesions those
//! statecharts act on.
//!
//! Grounded in `original_source/crcsim/agent.py::Person`. The constructor
//! and per-person event loop follow `__main__.py`'s driver loop exactly:
//! one `Scheduler` per person, `consume_next` until empty or an
//! `EndSimulation` message is seen.

mod disease;
mod testing;
mod treatment;

use std::collections::HashMap;

use rand::Rng;
use rand_distr::{Distribution, Gamma};

use crate::model::enums::{
    LesionState, PersonDiseaseMessage, PersonDiseaseState, PersonTestingMessage, PersonTestingState,
    PersonTreatmentMessage, PersonTreatmentState, RaceEthnicity, Sex,
};
use crate::model::incidence::sample_next_onset;
use crate::model::lesion::{Lesion, LesionOutcome};
use crate::output::EventLog;
use crate::params::Parameters;
use crate::scheduler::{EventHandle, Message, Scheduler};

pub struct Person {
    pub id: u64,
    pub sex: Sex,
    pub race_ethnicity: RaceEthnicity,

    pub expected_lifespan: f64,

    pub lesions: Vec<Lesion>,
    lesion_risk_index: f64,
    previous_lesion_onset_time: f64,

    // Testing attributes.
    pub routine_test: Option<String>,
    diagnostic_test: String,
    surveillance_test: String,
    routine_is_diagnostic: bool,
    never_compliant: bool,
    routine_compliance_history: Vec<bool>,
    previous_test_small: HashMap<String, u32>,
    previous_test_medium: HashMap<String, u32>,
    previous_test_large: HashMap<String, u32>,
    previous_test_age: HashMap<String, i64>,

    // Treatment attributes.
    previous_treatment_initiation_age: Option<i64>,
    num_ongoing_treatments: u32,
    num_surveillance_tests_since_positive: Option<u32>,
    ongoing_treatment_event: Option<EventHandle>,
    stage_at_detection: Option<u8>,

    pub disease_state: PersonDiseaseState,
    pub testing_state: PersonTestingState,
    pub treatment_state: PersonTreatmentState,

    testing_transition_timeout_event: Option<EventHandle>,
}

impl Person {
    pub fn new(id: u64, sex: Sex, race_ethnicity: RaceEthnicity) -> Self {
        Self {
            id,
            sex,
            race_ethnicity,
            expected_lifespan: 0.0,
            lesions: Vec::new(),
            lesion_risk_index: 0.0,
            previous_lesion_onset_time: 0.0,
            routine_test: None,
            diagnostic_test: String::new(),
            surveillance_test: String::new(),
            routine_is_diagnostic: false,
            never_compliant: false,
            routine_compliance_history: Vec::new(),
            previous_test_small: HashMap::new(),
            previous_test_medium: HashMap::new(),
            previous_test_large: HashMap::new(),
            previous_test_age: HashMap::new(),
            previous_treatment_initiation_age: None,
            num_ongoing_treatments: 0,
            num_surveillance_tests_since_positive: None,
            ongoing_treatment_event: None,
            stage_at_detection: None,
            disease_state: PersonDiseaseState::Uninitialized,
            testing_state: PersonTestingState::Uninitialized,
            treatment_state: PersonTreatmentState::Uninitialized,
            testing_transition_timeout_event: None,
        }
    }

    /// Initialize all three statecharts, start the yearly-actions and
    /// life timers, and schedule the first lesion if one occurs before
    /// expected death. Does not run the simulation; call [`Person::run`]
    /// afterward to drain the scheduler.
    ///
    /// `expected_lifespan` is drawn by the caller, not here: §6.3's driver
    /// contract pre-draws every cohort member's lifespan from one shared
    /// RNG before any individual's simulation begins, so the per-person
    /// `rng` passed to the rest of this method never influences it.
    pub fn start(&mut self, expected_lifespan: f64, scheduler: &mut Scheduler, params: &Parameters, rng: &mut impl Rng, out: &mut EventLog) {
        self.never_compliant = rng.random::<f64>() < params.never_compliant_rate;
        self.choose_tests(params, scheduler, rng, out);

        self.handle_disease_message(PersonDiseaseMessage::Init, scheduler, out);
        self.handle_testing_message(PersonTestingMessage::Init, scheduler, params, rng, out);
        self.handle_treatment_message(PersonTreatmentMessage::Init, scheduler, out);

        scheduler.schedule(Message::YearlyActions, 1.0);

        self.start_life_timer(expected_lifespan, scheduler, out);

        let gamma = Gamma::new(params.lesion_risk_alpha, params.lesion_risk_beta)
            .expect("lesion risk distribution parameters must be positive");
        self.lesion_risk_index = gamma.sample(rng);

        if let Some(delay) = self.next_lesion_delay(params, scheduler.time(), rng) {
            scheduler.schedule(Message::CreateLesion, delay);
        }
    }

    /// Drain this person's scheduler, dispatching each enabled event to
    /// the statechart (or bare callback) it targets, until the queue is
    /// empty or an `EndSimulation` message is consumed.
    pub fn run(&mut self, scheduler: &mut Scheduler, params: &Parameters, rng: &mut impl Rng, out: &mut EventLog) {
        while !scheduler.is_empty() {
            let event = scheduler.consume_next();
            if !event.enabled() {
                continue;
            }
            match event.message {
                Message::EndSimulation => break,
                Message::Disease(m) => self.handle_disease_message(m, scheduler, out),
                Message::Testing(m) => self.handle_testing_message(m, scheduler, params, rng, out),
                Message::Treatment(m) => self.handle_treatment_message(m, scheduler, out),
                Message::Lesion(idx, m) => self.handle_lesion_message(idx, m, scheduler, params, rng, out),
                Message::CreateLesion => self.handle_lesion_creation(scheduler, params, rng, out),
                Message::YearlyActions => self.handle_yearly_actions(scheduler, params, rng, out),
                Message::OngoingTreatment => self.handle_ongoing_treatment(scheduler, params, out),
            }
        }
    }

    fn start_life_timer(&mut self, expected_lifespan: f64, scheduler: &mut Scheduler, out: &mut EventLog) {
        self.expected_lifespan = expected_lifespan;
        scheduler.schedule(Message::Disease(PersonDiseaseMessage::OtherDeath), self.expected_lifespan);
        out.add_expected_lifespan(self.id, self.expected_lifespan);
    }

    fn next_lesion_delay(&self, params: &Parameters, now: f64, rng: &mut impl Rng) -> Option<f64> {
        sample_next_onset(
            params,
            self.lesion_risk_index,
            self.previous_lesion_onset_time,
            self.expected_lifespan,
            now,
            rng,
        )
    }

    fn handle_lesion_creation(&mut self, scheduler: &mut Scheduler, params: &Parameters, rng: &mut impl Rng, out: &mut EventLog) {
        let index = self.lesions.len();
        let lesion = Lesion::new(index, scheduler, params, rng);
        self.lesions.push(lesion);
        out.add_lesion_state_change(
            self.id,
            index,
            crate::model::enums::LesionMessage::Init.name(),
            scheduler.time(),
            LesionState::Uninitialized.name(),
            LesionState::SmallPolyp.name(),
        );

        self.previous_lesion_onset_time = scheduler.time();

        if let Some(delay) = self.next_lesion_delay(params, scheduler.time(), rng) {
            scheduler.schedule(Message::CreateLesion, delay);
        }
    }

    fn handle_lesion_message(
        &mut self,
        index: usize,
        message: crate::model::enums::LesionMessage,
        scheduler: &mut Scheduler,
        params: &Parameters,
        rng: &mut impl Rng,
        out: &mut EventLog,
    ) {
        let old_state = self.lesions[index].state;
        let outcome = self.lesions[index].handle_message(message, scheduler, params, rng);
        let new_state = self.lesions[index].state;
        if old_state != new_state {
            out.add_lesion_state_change(
                self.id,
                index,
                message.name(),
                scheduler.time(),
                old_state.name(),
                new_state.name(),
            );
        }
        if outcome == LesionOutcome::JustRemoved
            && self.lesions.iter().all(|l| l.state == LesionState::Removed)
        {
            scheduler.schedule(Message::Disease(PersonDiseaseMessage::AllPolypsRemoved), 0.0);
        }
    }

    /// Schedule a `CLINICAL_DETECTION` message for every lesion still in a
    /// preclinical cancer stage. Used when one cancer's clinical onset
    /// implies every other cancer this person has would also now be found
    /// (§4.6/§4.7: "when one cancer is detected, all are detected"). Like
    /// the source, this schedules future events rather than dispatching
    /// immediately, so detection order still runs through the scheduler.
    pub(super) fn detect_other_cancers(&self, scheduler: &mut Scheduler) {
        for (index, lesion) in self.lesions.iter().enumerate() {
            if matches!(
                lesion.state,
                LesionState::PreclinicalStage1
                    | LesionState::PreclinicalStage2
                    | LesionState::PreclinicalStage3
                    | LesionState::PreclinicalStage4
            ) {
                scheduler.schedule(Message::Lesion(index, crate::model::enums::LesionMessage::ClinicalDetection), 0.0);
            }
        }
    }

    fn choose_tests(&mut self, params: &Parameters, scheduler: &Scheduler, rng: &mut impl Rng, out: &mut EventLog) {
        self.diagnostic_test = params.diagnostic_test.clone();
        self.surveillance_test = params.surveillance_test.clone();

        if params.use_variable_routine_test {
            let starting_test = params.routine_test_by_year[0].clone();
            self.routine_test = Some(starting_test.clone());
            out.add_routine_test_chosen(self.id, &starting_test, scheduler.time());
            return;
        }

        // A test's probability of being chosen is its configured `proportion`;
        // these may sum to less than 1, in which case a person may end up
        // with no routine test at all (`self.routine_test` stays `None`).
        let mut tests: Vec<(&String, f64)> =
            params.tests.iter().map(|(name, t)| (name, t.proportion)).collect();
        tests.sort_by(|a, b| a.0.cmp(b.0));

        self.routine_test = None;
        let draw: f64 = rng.random();
        let mut cumulative = 0.0;
        for (name, proportion) in tests {
            cumulative += proportion;
            if draw < cumulative {
                self.routine_test = Some(name.clone());
                out.add_routine_test_chosen(self.id, name, scheduler.time());
                break;
            }
        }
    }

    fn is_false_positive(&self, test: Option<&str>, params: &Parameters, rng: &mut impl Rng) -> bool {
        match test {
            None => false,
            Some(test) => rng.random::<f64>() < 1.0 - params.tests[test].specificity,
        }
    }
}
