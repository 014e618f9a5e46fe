//! The testing statechart (§4.7): routine screening, diagnostic workup,
//! a post-negative skip-testing cooldown, and surveillance, plus the
//! yearly tick that decides whether each year's test is actually due.
//!
//! Grounded in `original_source/crcsim/agent.py::Person.handle_testing_message`,
//! `is_compliant`, `test_diagnostic`, `test_routine`, `test_surveillance`,
//! `do_tests`, and `handle_yearly_actions`.

use rand::Rng;

use super::Person;
use crate::model::enums::{
    LesionMessage, LesionState, PersonDiseaseState, PersonTestingMessage as M, PersonTestingState as S,
    PersonTreatmentMessage, PersonTreatmentState, TestingRole,
};
use crate::output::EventLog;
use crate::params::Parameters;
use crate::scheduler::{Message, Scheduler};

/// Tallies from one round of per-lesion detection, used to decide which
/// message to schedule once every lesion has been checked. Order of
/// preference when several things were found: cancer, then polyps, then
/// nothing — "most developed lesion wins" per the source's comment.
#[derive(Default)]
struct DetectionTally {
    lesions: u32,
    polyps: u32,
    polyps_small: u32,
    polyps_medium: u32,
    polyps_large: u32,
    cancer: u32,
}

impl Person {
    pub(super) fn handle_testing_message(
        &mut self,
        message: M,
        scheduler: &mut Scheduler,
        params: &Parameters,
        rng: &mut impl Rng,
        out: &mut EventLog,
    ) {
        match (self.testing_state, message) {
            (S::Uninitialized, M::Init) => {
                self.testing_state = S::Routine;
            }
            (S::Uninitialized, _) => {
                panic!("Person received unexpected message {message:?} in testing state {:?}", self.testing_state)
            }

            (S::Routine, M::Symptomatic) => {
                self.testing_state = S::Diagnostic;
                self.test_diagnostic(true, scheduler, params, rng, out);
            }
            (S::Routine, M::ScreenPositive) => {
                self.testing_state = S::Diagnostic;
                self.test_diagnostic(false, scheduler, params, rng, out);
            }
            (S::Routine, M::RoutineIsDiagnostic) => {
                self.testing_state = S::Diagnostic;
                self.routine_is_diagnostic = true;
                self.test_diagnostic(false, scheduler, params, rng, out);
            }
            (S::Routine, _) => {}

            (S::Diagnostic, M::Negative) => {
                self.testing_state = S::SkipTesting;
                self.routine_is_diagnostic = false;
                self.testing_transition_timeout_event = Some(
                    scheduler.schedule(Message::Testing(M::ReturnToRoutine), params.duration_screen_skip_testing),
                );
            }
            (S::Diagnostic, M::NotCompliant) => {
                self.testing_state = S::Routine;
                self.routine_is_diagnostic = false;
            }
            (S::Diagnostic, M::PositivePolyp | M::PositiveCancer) => {
                self.testing_state = S::Surveillance;
                self.num_surveillance_tests_since_positive = Some(0);
                self.routine_is_diagnostic = false;
            }
            (S::Diagnostic, _) => {}

            (S::SkipTesting, M::Symptomatic) => {
                if let Some(handle) = self.testing_transition_timeout_event.take() {
                    handle.set(false);
                }
                self.testing_state = S::Diagnostic;
                self.test_diagnostic(true, scheduler, params, rng, out);
            }
            (S::SkipTesting, M::ReturnToRoutine) => {
                if let Some(handle) = self.testing_transition_timeout_event.take() {
                    handle.set(false);
                }
                self.testing_state = S::Routine;
            }
            (S::SkipTesting, _) => {}

            (S::Surveillance, M::Symptomatic) => {
                self.testing_state = S::Surveillance;
                self.test_surveillance(true, scheduler, params, rng, out);
            }
            (S::Surveillance, M::PositivePolyp) => {
                self.testing_state = S::Surveillance;
                self.num_surveillance_tests_since_positive = Some(0);
            }
            (S::Surveillance, M::PositiveCancer) => {
                self.testing_state = S::Surveillance;
                self.num_surveillance_tests_since_positive = Some(0);
                // Even if the person is already in surveillance because of an
                // earlier cancer, a newly-detected cancer restarts treatment.
                scheduler.schedule(Message::Treatment(PersonTreatmentMessage::StartTreatment), 0.0);
            }
            (S::Surveillance, _) => {}

            (S::NoTesting, _) => {}
        }
    }

    /// Whether `self` currently complies with taking `test`, drawing and
    /// recording a fresh sample for routine tests (the history feeds
    /// conditional compliance on later calls).
    fn is_compliant(&mut self, test: Option<&str>, scheduler: &Scheduler, params: &Parameters, rng: &mut impl Rng) -> bool {
        let Some(test) = test else { return false };

        if self.testing_state == S::Diagnostic && !self.routine_is_diagnostic {
            return rng.random::<f64>() < params.diagnostic_compliance_rate;
        }
        if self.testing_state == S::Surveillance {
            return rng.random::<f64>() < params.surveillance_compliance_rate;
        }
        assert!(
            self.testing_state == S::Routine || (self.testing_state == S::Diagnostic && self.routine_is_diagnostic),
            "is_compliant called in unexpected testing state {:?}",
            self.testing_state
        );

        let compliance_prob = if self.never_compliant {
            0.0
        } else if !params.use_conditional_compliance || self.routine_compliance_history.is_empty() {
            let mut prob = params.initial_compliance_rate;
            if params.never_compliant_rate < 1.0 {
                prob /= 1.0 - params.never_compliant_rate;
                if prob > 1.0 {
                    prob = 1.0;
                }
            } else {
                prob = 0.0;
            }
            prob
        } else {
            let test_params = &params.tests[test];
            let testing_year = scheduler.time() as i64 - test_params.routine_start;
            assert!(
                testing_year >= 0 && testing_year <= test_params.routine_end - test_params.routine_start,
                "unexpected age {} resulting in testing year {testing_year}",
                scheduler.time()
            );
            let prev_compliant = *self.routine_compliance_history.last().unwrap();
            if prev_compliant {
                test_params.compliance_rate_given_prev_compliant
            } else {
                test_params.compliance_rate_given_not_prev_compliant
            }
        };

        let compliant = rng.random::<f64>() < compliance_prob;
        self.routine_compliance_history.push(compliant);
        compliant
    }

    /// Apply one lesion's detection outcome to a running tally, logging
    /// its pathology record and scheduling its `CLINICAL_DETECTION`
    /// message. Returns `false` for a lesion state the caller's protocol
    /// doesn't expect to see (already-known cancers during surveillance
    /// are skipped by the caller before this is reached).
    #[allow(clippy::too_many_arguments)]
    fn tally_detected_lesion(
        &self,
        index: usize,
        role: TestingRole,
        scheduler: &mut Scheduler,
        out: &mut EventLog,
        tally: &mut DetectionTally,
    ) {
        let lesion = &self.lesions[index];
        match lesion.state {
            LesionState::SmallPolyp => {
                tally.lesions += 1;
                tally.polyps += 1;
                tally.polyps_small += 1;
                out.add_pathology(self.id, index as i64, role, scheduler.time());
            }
            LesionState::MediumPolyp => {
                tally.lesions += 1;
                tally.polyps += 1;
                tally.polyps_medium += 1;
                out.add_pathology(self.id, index as i64, role, scheduler.time());
            }
            LesionState::LargePolyp => {
                tally.lesions += 1;
                tally.polyps += 1;
                tally.polyps_large += 1;
                out.add_pathology(self.id, index as i64, role, scheduler.time());
            }
            LesionState::PreclinicalStage1
            | LesionState::PreclinicalStage2
            | LesionState::PreclinicalStage3
            | LesionState::PreclinicalStage4 => {
                tally.lesions += 1;
                tally.cancer += 1;
            }
            LesionState::ClinicalStage1
            | LesionState::ClinicalStage2
            | LesionState::ClinicalStage3
            | LesionState::ClinicalStage4 => {
                // A surveillance test re-examining a cancer it already knows
                // about doesn't need to do anything further.
                return;
            }
            other => panic!("unexpected lesion state {other:?} during detection"),
        }
        scheduler.schedule(Message::Lesion(index, LesionMessage::ClinicalDetection), 0.0);
    }

    /// The diagnostic workup triggered by a positive screen or reported
    /// symptoms: examines every lesion, logs pathology/polypectomy, and
    /// moves the testing statechart on to NEGATIVE/POSITIVE_POLYP/
    /// POSITIVE_CANCER (or POLYPECTOMY_DEATH, terminating early).
    fn test_diagnostic(&mut self, symptomatic: bool, scheduler: &mut Scheduler, params: &Parameters, rng: &mut impl Rng, out: &mut EventLog) {
        if self.testing_state != S::Diagnostic || self.is_terminal_disease_state() {
            return;
        }
        let role = if self.routine_is_diagnostic { TestingRole::Routine } else { TestingRole::Diagnostic };
        let diagnostic_test = self.diagnostic_test.clone();

        if !self.is_compliant(Some(&diagnostic_test), scheduler, params, rng) && !symptomatic {
            scheduler.schedule(Message::Testing(M::NotCompliant), 0.0);
            out.add_noncompliance(self.id, &diagnostic_test, role, scheduler.time());
            return;
        }

        let test_params = &params.tests[&diagnostic_test];
        out.add_test_performed(self.id, &diagnostic_test, role, scheduler.time());
        self.previous_test_age.insert(diagnostic_test.clone(), scheduler.time() as i64);

        let mut tally = DetectionTally::default();

        if self.disease_state == PersonDiseaseState::Healthy {
            // A false positive in a healthy person is assumed to still go
            // through pathology and polypectomy, just with a negative result.
            if self.is_false_positive(Some(&diagnostic_test), params, rng) {
                out.add_pathology(self.id, -1, role, scheduler.time());
                out.add_polypectomy(self.id, role, scheduler.time());
                if rng.random::<f64>() < params.polypectomy_proportion_lethal {
                    scheduler.schedule(Message::Disease(crate::model::enums::PersonDiseaseMessage::PolypectomyDeath), 0.0);
                    return;
                }
            }
            scheduler.schedule(Message::Testing(M::Negative), 0.0);
        } else {
            for index in 0..self.lesions.len() {
                if self.lesions[index].is_detected(Some(&diagnostic_test), params, rng) {
                    self.tally_detected_lesion(index, role, scheduler, out, &mut tally);
                }
            }

            if tally.polyps > 0 {
                out.add_polypectomy(self.id, role, scheduler.time());
                if rng.random::<f64>() < params.polypectomy_proportion_lethal {
                    scheduler.schedule(Message::Disease(crate::model::enums::PersonDiseaseMessage::PolypectomyDeath), 0.0);
                    return;
                }
            }

            if tally.lesions == 0 {
                scheduler.schedule(Message::Testing(M::Negative), 0.0);
            } else if tally.cancer > 0 {
                scheduler.schedule(Message::Testing(M::PositiveCancer), 0.0);
            } else {
                scheduler.schedule(Message::Testing(M::PositivePolyp), 0.0);
            }
        }

        self.previous_test_small.insert(diagnostic_test.clone(), tally.polyps_small);
        self.previous_test_medium.insert(diagnostic_test.clone(), tally.polyps_medium);
        self.previous_test_large.insert(diagnostic_test.clone(), tally.polyps_large);

        if rng.random::<f64>() < test_params.proportion_perforation {
            out.add_perforation(self.id, &diagnostic_test, role, scheduler.time(), self.routine_test.clone());
        }
    }

    /// This year's routine screen: either hands off straight to the
    /// diagnostic protocol (when the routine and diagnostic tests are the
    /// same), or runs its own lighter compliance/false-positive/per-lesion
    /// check and raises SCREEN_POSITIVE on the first hit.
    fn test_routine(&mut self, scheduler: &mut Scheduler, params: &Parameters, rng: &mut impl Rng, out: &mut EventLog) {
        if self.testing_state != S::Routine || self.is_terminal_disease_state() {
            return;
        }
        let Some(routine_test) = self.routine_test.clone() else { return };

        if routine_test == self.diagnostic_test {
            scheduler.schedule(Message::Testing(M::RoutineIsDiagnostic), 0.0);
            return;
        }

        if !self.is_compliant(Some(&routine_test), scheduler, params, rng) {
            out.add_noncompliance(self.id, &routine_test, TestingRole::Routine, scheduler.time());
            return;
        }

        let test_params = &params.tests[&routine_test];
        out.add_test_performed(self.id, &routine_test, TestingRole::Routine, scheduler.time());
        self.previous_test_age.insert(routine_test.clone(), scheduler.time() as i64);

        if self.disease_state == PersonDiseaseState::Healthy {
            if self.is_false_positive(Some(&routine_test), params, rng) {
                scheduler.schedule(Message::Testing(M::ScreenPositive), 0.0);
            }
        } else {
            for lesion in &self.lesions {
                if lesion.is_detected(Some(&routine_test), params, rng) {
                    scheduler.schedule(Message::Testing(M::ScreenPositive), 0.0);
                    break;
                }
            }
        }

        if rng.random::<f64>() < test_params.proportion_perforation {
            out.add_perforation(self.id, &routine_test, TestingRole::Routine, scheduler.time(), self.routine_test.clone());
        }
    }

    /// The surveillance equivalent of `test_diagnostic`: same tallying and
    /// polypectomy-lethality logic, but leaves already-known clinical
    /// cancers alone instead of re-detecting them.
    fn test_surveillance(&mut self, symptomatic: bool, scheduler: &mut Scheduler, params: &Parameters, rng: &mut impl Rng, out: &mut EventLog) {
        if self.testing_state != S::Surveillance || self.disease_state == PersonDiseaseState::Dead {
            return;
        }
        let surveillance_test = self.surveillance_test.clone();

        if !self.is_compliant(Some(&surveillance_test), scheduler, params, rng) && !symptomatic {
            scheduler.schedule(Message::Testing(M::NotCompliant), 0.0);
            out.add_noncompliance(self.id, &surveillance_test, TestingRole::Surveillance, scheduler.time());
            return;
        }

        let test_params = &params.tests[&surveillance_test];
        out.add_test_performed(self.id, &surveillance_test, TestingRole::Surveillance, scheduler.time());
        self.previous_test_age.insert(surveillance_test.clone(), scheduler.time() as i64);
        self.num_surveillance_tests_since_positive =
            Some(self.num_surveillance_tests_since_positive.unwrap_or(0) + 1);

        let mut tally = DetectionTally::default();

        if self.disease_state == PersonDiseaseState::Healthy {
            if self.is_false_positive(Some(&surveillance_test), params, rng) {
                out.add_pathology(self.id, -1, TestingRole::Surveillance, scheduler.time());
                out.add_polypectomy(self.id, TestingRole::Surveillance, scheduler.time());
                if rng.random::<f64>() < params.polypectomy_proportion_lethal {
                    scheduler.schedule(Message::Disease(crate::model::enums::PersonDiseaseMessage::PolypectomyDeath), 0.0);
                    return;
                }
            }
            scheduler.schedule(Message::Testing(M::Negative), 0.0);
        } else {
            for index in 0..self.lesions.len() {
                if self.lesions[index].is_detected(Some(&surveillance_test), params, rng) {
                    self.tally_detected_lesion(index, TestingRole::Surveillance, scheduler, out, &mut tally);
                }
            }

            if tally.polyps > 0 {
                out.add_polypectomy(self.id, TestingRole::Surveillance, scheduler.time());
                if rng.random::<f64>() < params.polypectomy_proportion_lethal {
                    scheduler.schedule(Message::Disease(crate::model::enums::PersonDiseaseMessage::PolypectomyDeath), 0.0);
                    return;
                }
            }

            if tally.lesions == 0 {
                scheduler.schedule(Message::Testing(M::Negative), 0.0);
            } else if tally.cancer > 0 {
                scheduler.schedule(Message::Testing(M::PositiveCancer), 0.0);
            } else if tally.polyps > 0 {
                scheduler.schedule(Message::Testing(M::PositivePolyp), 0.0);
            }
        }

        self.previous_test_small.insert(surveillance_test.clone(), tally.polyps_small);
        self.previous_test_medium.insert(surveillance_test.clone(), tally.polyps_medium);
        self.previous_test_large.insert(surveillance_test.clone(), tally.polyps_large);

        if rng.random::<f64>() < test_params.proportion_perforation {
            out.add_perforation(self.id, &surveillance_test, TestingRole::Surveillance, scheduler.time(), self.routine_test.clone());
        }
    }

    fn is_terminal_disease_state(&self) -> bool {
        matches!(
            self.disease_state,
            PersonDiseaseState::ClinicalStage1
                | PersonDiseaseState::ClinicalStage2
                | PersonDiseaseState::ClinicalStage3
                | PersonDiseaseState::ClinicalStage4
                | PersonDiseaseState::Dead
        )
    }

    /// The yearly tick (§4.7.2): switch this year's routine test under a
    /// variable-routine-test schedule, run whichever of `test_routine`/
    /// `test_surveillance` is due, then reschedule for next year.
    pub(super) fn handle_yearly_actions(&mut self, scheduler: &mut Scheduler, params: &Parameters, rng: &mut impl Rng, out: &mut EventLog) {
        if params.use_variable_routine_test {
            let time = scheduler.time();
            let first_year = *params.routine_testing_year.first().unwrap();
            let last_year = *params.routine_testing_year.last().unwrap();
            if time >= first_year as f64 && time <= last_year as f64 {
                let year_index = (time as i64 - first_year) as usize;
                let test = params.routine_test_by_year[year_index].clone();
                self.routine_test = Some(test.clone());
                out.add_routine_test_chosen(self.id, &test, scheduler.time());
            }
        }

        self.do_tests(scheduler, params, rng, out);

        scheduler.schedule(Message::YearlyActions, 1.0);
    }

    /// Decide whether this year's routine or surveillance test is due, and
    /// if so run it. Routine due-gating checks every configured routine
    /// test's recency, not just this person's own, so switching tests
    /// doesn't let someone dodge the frequency limit of whichever test
    /// they'd otherwise be due for.
    fn do_tests(&mut self, scheduler: &mut Scheduler, params: &Parameters, rng: &mut impl Rng, out: &mut EventLog) {
        let time = scheduler.time();

        match self.testing_state {
            S::Routine => {
                let Some(routine_test) = self.routine_test.clone() else { return };
                let test_params = &params.tests[&routine_test];
                if (time as i64) < test_params.routine_start || (time as i64) > test_params.routine_end {
                    return;
                }

                let found_skip = params.routine_tests.iter().any(|test| {
                    self.previous_test_age
                        .get(test)
                        .is_some_and(|age| (time as i64 - age) as f64 < params.tests[test].routine_freq)
                });
                if !found_skip {
                    self.test_routine(scheduler, params, rng, out);
                }
            }
            S::Surveillance => {
                if time as i64 > params.surveillance_end_age as i64 {
                    return;
                }

                let (previous_test_age, frequency) = if self.treatment_state == PersonTreatmentState::NoTreatment {
                    self.regular_surveillance_schedule(params)
                } else {
                    self.post_treatment_surveillance_schedule(params)
                };

                if (time as i64 - previous_test_age) as f64 >= frequency {
                    self.test_surveillance(false, scheduler, params, rng, out);
                }
            }
            _ => {}
        }
    }

    /// Surveillance scheduling for someone who has had polyps but never
    /// cancer: interval depends on the size distribution found on
    /// whichever of the diagnostic/surveillance test was most recent.
    fn regular_surveillance_schedule(&self, params: &Parameters) -> (i64, f64) {
        let diagnostic_age = *self
            .previous_test_age
            .get(&self.diagnostic_test)
            .expect("person in surveillance must have a previous diagnostic test age");

        let (previous_test, previous_test_age) = match self.previous_test_age.get(&self.surveillance_test) {
            Some(&age) if age >= diagnostic_age => (&self.surveillance_test, age),
            _ => (&self.diagnostic_test, diagnostic_age),
        };

        let num_small = *self.previous_test_small.get(previous_test).unwrap_or(&0);
        let num_medium = *self.previous_test_medium.get(previous_test).unwrap_or(&0);
        let num_large = *self.previous_test_large.get(previous_test).unwrap_or(&0);

        let frequency = if num_small + num_medium + num_large == 0 {
            params.surveillance_freq_polyp_none
        } else if num_small + num_medium <= 2 && num_large == 0 {
            params.surveillance_freq_polyp_mild
        } else if num_small + num_medium + num_large <= 10 {
            params.surveillance_freq_polyp_moderate
        } else {
            params.surveillance_freq_polyp_severe
        };

        (previous_test_age, frequency)
    }

    /// Surveillance scheduling for someone already being treated for
    /// cancer: interval depends on how many post-treatment surveillance
    /// tests they've had so far.
    fn post_treatment_surveillance_schedule(&self, params: &Parameters) -> (i64, f64) {
        let treatment_age = self
            .previous_treatment_initiation_age
            .expect("person in post-treatment surveillance must have a treatment initiation age");

        let previous_test_age = match self.previous_test_age.get(&self.surveillance_test) {
            Some(&age) => age.max(treatment_age),
            None => treatment_age,
        };

        let tests_since_positive = self
            .num_surveillance_tests_since_positive
            .expect("person in post-treatment surveillance must track tests since positive");

        let frequency = match tests_since_positive {
            0 => params.surveillance_freq_cancer_first,
            1 => params.surveillance_freq_cancer_second,
            _ => params.surveillance_freq_cancer_rest,
        };

        (previous_test_age, frequency)
    }
}
