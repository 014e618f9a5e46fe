//! The lesion statechart (§4.5): one polyp/cancer's progression from small
//! polyp through preclinical and clinical cancer stages to removal or
//! death, driven by exponentially-distributed stage-duration timers.
//!
//! Grounded in `original_source/crcsim/agent.py::Lesion`. A lesion has no
//! owning reference back to its `Person` (the design notes call this out
//! explicitly as non-owning); instead, messages meant for the Person are
//! scheduled through the same `Scheduler` the Person itself consumes from,
//! tagged with a `Message::Disease`/`Message::Testing` variant, and the
//! "all polyps removed" check — which needs visibility into every sibling
//! lesion — is performed by [`crate::model::person::Person`] after
//! delegating to a lesion's `handle_message`.

use rand::Rng;
use rand_distr::{Distribution, Exp};

use crate::model::enums::{LesionMessage, LesionState, PersonDiseaseMessage, PersonTestingMessage};
use crate::params::Parameters;
use crate::scheduler::{EventHandle, Message, Scheduler};

/// What a lesion transition requires its caller to additionally handle.
/// Everything a lesion can decide on its own (its own state, its own
/// timers, messages addressed to the Person) is handled inside
/// `handle_message`; this is only for the one thing that needs visibility
/// across every lesion on the Person.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LesionOutcome {
    None,
    /// The lesion just transitioned to `REMOVED`; the caller should check
    /// whether every lesion on the Person is now removed.
    JustRemoved,
}

#[derive(Debug)]
pub struct Lesion {
    /// Also this lesion's index in the owning Person's lesion vector —
    /// lesions are never removed from that vector (only marked `Removed`/
    /// `Dead`), so the index is stable for the lesion's whole lifetime and
    /// doubles as its self-addressing tag for `Message::Lesion`.
    pub id: usize,
    pub state: LesionState,
    transition_timeout: Option<EventHandle>,
    symptoms: Option<EventHandle>,
}

fn exp_delay(mean: f64, rng: &mut impl Rng) -> f64 {
    if mean == 0.0 {
        return 0.0;
    }
    Exp::new(1.0 / mean).expect("mean duration must be positive").sample(rng)
}

impl Lesion {
    /// Construct a new lesion and immediately drive it through `INIT`,
    /// which puts it into `SMALL_POLYP` and schedules its first timer and
    /// the `POLYP_ONSET` message to the Person's disease statechart.
    pub fn new(id: usize, scheduler: &mut Scheduler, params: &Parameters, rng: &mut impl Rng) -> Self {
        let mut lesion = Self {
            id,
            state: LesionState::Uninitialized,
            transition_timeout: None,
            symptoms: None,
        };
        lesion.handle_message(LesionMessage::Init, scheduler, params, rng);
        lesion
    }

    pub fn handle_message(
        &mut self,
        message: LesionMessage,
        scheduler: &mut Scheduler,
        params: &Parameters,
        rng: &mut impl Rng,
    ) -> LesionOutcome {
        use LesionMessage as M;
        use LesionState as S;

        match (self.state, message) {
            (S::Uninitialized, M::Init) => {
                self.state = S::SmallPolyp;
                scheduler.schedule(Message::Disease(PersonDiseaseMessage::PolypOnset), 0.0);
                let delay = exp_delay(params.mean_duration_polyp1_polyp2, rng);
                self.transition_timeout =
                    Some(scheduler.schedule(Message::Lesion(self.id, M::ProgressPolypStage), delay));
                LesionOutcome::None
            }

            (S::Uninitialized, _) => {
                panic!("Lesion received unexpected message {message:?} in state {:?}", self.state)
            }

            (S::SmallPolyp, M::ProgressPolypStage) => {
                self.disable_transition_timeout();
                self.state = S::MediumPolyp;
                scheduler.schedule(Message::Disease(PersonDiseaseMessage::PolypMediumOnset), 0.0);

                let large_delay = exp_delay(params.mean_duration_polyp2_polyp3, rng);
                let pre_delay = exp_delay(params.mean_duration_polyp2_pre, rng);
                self.transition_timeout = Some(if large_delay < pre_delay {
                    scheduler.schedule(Message::Lesion(self.id, M::ProgressPolypStage), large_delay)
                } else {
                    scheduler.schedule(Message::Lesion(self.id, M::BecomeCancer), pre_delay)
                });
                LesionOutcome::None
            }
            (S::SmallPolyp, M::ClinicalDetection) => self.remove(),
            (S::SmallPolyp, _) => LesionOutcome::None,

            (S::MediumPolyp, M::ProgressPolypStage) => {
                self.disable_transition_timeout();
                self.state = S::LargePolyp;
                scheduler.schedule(Message::Disease(PersonDiseaseMessage::PolypLargeOnset), 0.0);
                let delay = exp_delay(params.mean_duration_polyp3_pre, rng);
                self.transition_timeout =
                    Some(scheduler.schedule(Message::Lesion(self.id, M::BecomeCancer), delay));
                LesionOutcome::None
            }
            (S::MediumPolyp, M::BecomeCancer) | (S::LargePolyp, M::BecomeCancer) => {
                self.disable_transition_timeout();
                self.state = S::PreclinicalStage1;
                scheduler.schedule(Message::Disease(PersonDiseaseMessage::PreclinicalOnset), 0.0);

                let progress_delay = exp_delay(params.mean_duration_pre1_pre2, rng);
                self.transition_timeout =
                    Some(scheduler.schedule(Message::Lesion(self.id, M::ProgressCancerStage), progress_delay));

                // Scheduled independently of the progression timer, not as a
                // competing pair: the symptom message goes to the Person's
                // testing statechart and must still fire even if cancer
                // progression happens first.
                let symptom_delay = exp_delay(params.mean_duration_pre1_clin1, rng);
                self.symptoms = Some(
                    scheduler.schedule(Message::Testing(PersonTestingMessage::Symptomatic), symptom_delay),
                );
                LesionOutcome::None
            }
            (S::MediumPolyp, M::ClinicalDetection) | (S::LargePolyp, M::ClinicalDetection) => {
                self.remove()
            }
            (S::MediumPolyp, _) | (S::LargePolyp, _) => LesionOutcome::None,

            (S::PreclinicalStage1, M::ProgressCancerStage) => self.advance_preclinical(
                S::PreclinicalStage2,
                PersonDiseaseMessage::Pre2Onset,
                params.mean_duration_pre2_pre3,
                params.mean_duration_pre2_clin2,
                scheduler,
                rng,
            ),
            (S::PreclinicalStage2, M::ProgressCancerStage) => self.advance_preclinical(
                S::PreclinicalStage3,
                PersonDiseaseMessage::Pre3Onset,
                params.mean_duration_pre3_pre4,
                params.mean_duration_pre3_clin3,
                scheduler,
                rng,
            ),
            (S::PreclinicalStage3, M::ProgressCancerStage) => {
                self.disable_transition_timeout();
                self.disable_symptoms();
                self.state = S::PreclinicalStage4;
                scheduler.schedule(Message::Disease(PersonDiseaseMessage::Pre4Onset), 0.0);
                let symptom_delay = exp_delay(params.mean_duration_pre4_clin4, rng);
                self.symptoms = Some(
                    scheduler.schedule(Message::Testing(PersonTestingMessage::Symptomatic), symptom_delay),
                );
                LesionOutcome::None
            }

            (S::PreclinicalStage1, M::ClinicalDetection) => {
                self.clinical_onset(S::ClinicalStage1, params.mean_duration_clin1_dead, params.proportion_survive_clin1, scheduler, rng)
            }
            (S::PreclinicalStage2, M::ClinicalDetection) => {
                self.clinical_onset(S::ClinicalStage2, params.mean_duration_clin2_dead, params.proportion_survive_clin2, scheduler, rng)
            }
            (S::PreclinicalStage3, M::ClinicalDetection) => {
                self.clinical_onset(S::ClinicalStage3, params.mean_duration_clin3_dead, params.proportion_survive_clin3, scheduler, rng)
            }
            (S::PreclinicalStage4, M::ClinicalDetection) => {
                self.disable_symptoms();
                self.clinical_onset(S::ClinicalStage4, params.mean_duration_clin4_dead, params.proportion_survive_clin4, scheduler, rng)
            }
            (S::PreclinicalStage1 | S::PreclinicalStage2 | S::PreclinicalStage3 | S::PreclinicalStage4, _) => {
                LesionOutcome::None
            }

            (S::ClinicalStage1 | S::ClinicalStage2 | S::ClinicalStage3 | S::ClinicalStage4, M::KillPerson) => {
                self.disable_transition_timeout();
                self.state = S::Dead;
                scheduler.schedule(Message::Disease(PersonDiseaseMessage::CrcDeath), 0.0);
                LesionOutcome::None
            }
            // Already-clinical lesions silently absorb a repeat detection —
            // this is what makes the surveillance protocol's "skip
            // already-clinical lesions" rule safe even if it ever sent one.
            (S::ClinicalStage1 | S::ClinicalStage2 | S::ClinicalStage3 | S::ClinicalStage4, _) => {
                LesionOutcome::None
            }

            (S::Removed, _) | (S::Dead, _) => LesionOutcome::None,
        }
    }

    fn advance_preclinical(
        &mut self,
        next: LesionState,
        onset_message: PersonDiseaseMessage,
        progress_mean: f64,
        symptom_mean: f64,
        scheduler: &mut Scheduler,
        rng: &mut impl Rng,
    ) -> LesionOutcome {
        self.disable_transition_timeout();
        self.disable_symptoms();
        self.state = next;
        scheduler.schedule(Message::Disease(onset_message), 0.0);

        let progress_delay = exp_delay(progress_mean, rng);
        self.transition_timeout = Some(
            scheduler.schedule(Message::Lesion(self.id, LesionMessage::ProgressCancerStage), progress_delay),
        );
        let symptom_delay = exp_delay(symptom_mean, rng);
        self.symptoms =
            Some(scheduler.schedule(Message::Testing(PersonTestingMessage::Symptomatic), symptom_delay));
        LesionOutcome::None
    }

    fn clinical_onset(
        &mut self,
        clinical_state: LesionState,
        mean_duration_to_death: f64,
        proportion_survive: f64,
        scheduler: &mut Scheduler,
        rng: &mut impl Rng,
    ) -> LesionOutcome {
        self.disable_transition_timeout();
        self.state = clinical_state;
        scheduler.schedule(Message::Disease(PersonDiseaseMessage::ClinicalOnset), 0.0);

        if rng.random::<f64>() >= proportion_survive {
            let delay = exp_delay(mean_duration_to_death, rng);
            self.transition_timeout =
                Some(scheduler.schedule(Message::Lesion(self.id, LesionMessage::KillPerson), delay));
        }
        LesionOutcome::None
    }

    fn remove(&mut self) -> LesionOutcome {
        self.disable_transition_timeout();
        self.state = LesionState::Removed;
        LesionOutcome::JustRemoved
    }

    fn disable_transition_timeout(&mut self) {
        if let Some(handle) = self.transition_timeout.take() {
            handle.set(false);
        }
    }

    fn disable_symptoms(&mut self) {
        if let Some(handle) = self.symptoms.take() {
            handle.set(false);
        }
    }

    /// Whether `test` detects this lesion right now, given the test's
    /// per-stage sensitivity. A lesion already at a clinical stage is
    /// always "detected" (it's already symptomatic); a removed or dead
    /// lesion never is.
    pub fn is_detected(&self, test: Option<&str>, params: &Parameters, rng: &mut impl Rng) -> bool {
        let Some(test) = test else { return false };
        let test_params = &params.tests[test];

        let sensitivity = match self.state {
            LesionState::SmallPolyp => test_params.sensitivity_polyp1,
            LesionState::MediumPolyp => test_params.sensitivity_polyp2,
            LesionState::LargePolyp => test_params.sensitivity_polyp3,
            LesionState::PreclinicalStage1
            | LesionState::PreclinicalStage2
            | LesionState::PreclinicalStage3
            | LesionState::PreclinicalStage4 => test_params.sensitivity_cancer,
            LesionState::ClinicalStage1
            | LesionState::ClinicalStage2
            | LesionState::ClinicalStage3
            | LesionState::ClinicalStage4 => return true,
            LesionState::Removed | LesionState::Dead => return false,
            LesionState::Uninitialized => {
                panic!("is_detected called on an uninitialized lesion")
            }
        };

        rng.random::<f64>() < sensitivity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::SmallRng, SeedableRng};

    #[test]
    fn init_transitions_to_small_polyp_and_schedules_timer() {
        let params = crate::testutil::minimal_parameters();
        let mut scheduler = Scheduler::new();
        let mut rng = SmallRng::seed_from_u64(1);
        let lesion = Lesion::new(0, &mut scheduler, &params, &mut rng);
        assert_eq!(lesion.state, LesionState::SmallPolyp);
        assert_eq!(scheduler.len(), 2); // POLYP_ONSET (zero-delay) + timer
    }
}
