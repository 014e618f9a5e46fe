//! Literal-value scenario tests exercising the testing/disease statecharts
//! end to end through the public driver primitives (`Person::start`/`run`),
//! rather than unit-testing individual handler methods in isolation.

use rand::{rngs::SmallRng, SeedableRng};

use crcsim::model::{Lesion, LesionState, PersonDiseaseState, PersonTestingState};
use crcsim::output::{EventLog, RecordType};
use crcsim::params::TestParams;
use crcsim::scheduler::{Message, Scheduler};
use crcsim::testutil;
use crcsim::Person;

fn colonoscopy_fit_test_params(routine_freq: f64) -> TestParams {
    TestParams {
        proportion: 0.0,
        sensitivity_polyp1: 0.5,
        sensitivity_polyp2: 0.5,
        sensitivity_polyp3: 0.5,
        sensitivity_cancer: 0.9,
        specificity: 1.0,
        cost: 0.0,
        routine_start: 50,
        routine_end: 75,
        routine_freq,
        proportion_perforation: 0.0,
        cost_perforation: 0.0,
        compliance_rate_given_prev_compliant: 1.0,
        compliance_rate_given_not_prev_compliant: 1.0,
    }
}

/// S5: a variable routine-test schedule where the assigned test switches
/// from a decennial test (Colonoscopy, routine_freq = 11, assigned years
/// 50-60) to an annual one (FIT, routine_freq = 1, assigned years 61-75).
/// Switching tests never lets someone dodge whichever routine test's
/// frequency window they're still inside, so Colonoscopy is due again at
/// year 60 but skipped (10 years since the year-50 test, still under its
/// 11-year frequency) — leaving exactly one Colonoscopy performed, and FIT
/// performed every year from first eligibility (61) through the end of the
/// testing window (75).
#[test]
fn s5_variable_routine_test_schedule_switches_and_gates_on_frequency() {
    let mut params = testutil::minimal_parameters();
    params.tests.clear();
    params.tests.insert("Colonoscopy".to_string(), colonoscopy_fit_test_params(11.0));
    params.tests.insert("FIT".to_string(), colonoscopy_fit_test_params(1.0));
    params.diagnostic_test = "Placeholder".to_string();
    params.surveillance_test = "Placeholder".to_string();
    params.routine_tests = vec!["Colonoscopy".to_string(), "FIT".to_string()];
    params.use_variable_routine_test = true;
    params.routine_testing_year = (50..=75).collect();
    params.routine_test_by_year = (0..11)
        .map(|_| "Colonoscopy".to_string())
        .chain((0..15).map(|_| "FIT".to_string()))
        .collect();
    params.initial_compliance_rate = 1.0;
    params.never_compliant_rate = 0.0;
    params.use_conditional_compliance = false;
    // "No-lesion" schedule: nobody is ever screen-positive, so every
    // routine test this person takes comes back negative.
    params.lesion_incidence = testutil::flat_step(0.0);

    let mut scheduler = Scheduler::new();
    let mut out = EventLog::new();
    let mut rng = SmallRng::seed_from_u64(1);
    let mut person = Person::new(1, testutil::DEFAULT_SEX, testutil::DEFAULT_RACE);

    person.start(100.0, &mut scheduler, &params, &mut rng, &mut out);
    person.run(&mut scheduler, &params, &mut rng, &mut out);

    let performed: Vec<(&str, i64)> = out
        .records()
        .iter()
        .filter(|r| r.record_type == RecordType::TestPerformed)
        .map(|r| (r.test_name.as_deref().unwrap(), r.time as i64))
        .collect();

    let colonoscopies: Vec<_> = performed.iter().filter(|(name, _)| *name == "Colonoscopy").collect();
    let fits: Vec<_> = performed.iter().filter(|(name, _)| *name == "FIT").collect();

    assert_eq!(colonoscopies, vec![&("Colonoscopy", 50)]);
    assert_eq!(fits.len(), 15);
    assert_eq!(fits.iter().map(|(_, t)| *t).collect::<Vec<_>>(), (61..=75).collect::<Vec<_>>());
}

/// S6: a single lesion forced into existence at time 40 on a person whose
/// routine test has perfect sensitivity. The routine screen at time 50
/// (the configured `routine_start`) detects it, sends it through the
/// diagnostic workup (a distinct test from the routine one, so the
/// ROUTINE_IS_DIAGNOSTIC hand-off doesn't short-circuit the routine
/// screen), and the resulting polypectomy removes the only lesion the
/// person has — driving disease_state back to HEALTHY via
/// ALL_POLYPS_REMOVED in the same tick.
#[test]
fn s6_single_polyp_is_screened_removed_and_clears_disease_state() {
    let mut params = testutil::minimal_parameters();
    params.tests.clear();
    let mut fobt = colonoscopy_fit_test_params(1.0);
    fobt.sensitivity_polyp1 = 1.0;
    params.tests.insert("FOBT".to_string(), fobt);
    let mut colonoscopy = colonoscopy_fit_test_params(1.0);
    colonoscopy.sensitivity_polyp1 = 1.0;
    params.tests.insert("Colonoscopy".to_string(), colonoscopy);
    params.diagnostic_test = "Colonoscopy".to_string();
    params.surveillance_test = "Colonoscopy".to_string();
    params.routine_tests = vec!["FOBT".to_string()];
    params.initial_compliance_rate = 1.0;
    params.diagnostic_compliance_rate = 1.0;
    params.never_compliant_rate = 0.0;
    params.use_conditional_compliance = false;
    params.polypectomy_proportion_lethal = 0.0;
    params.lesion_incidence = testutil::flat_step(0.0);
    // Large enough that the Exp-distributed progression timer drawn at
    // lesion creation has negligible chance of firing before the routine
    // test ten years later.
    params.mean_duration_polyp1_polyp2 = 1.0e7;

    // Force `choose_tests` to pick "FOBT" as the routine test regardless
    // of the RNG draw: alphabetically "Colonoscopy" sorts first and has
    // proportion 0, so the cumulative-proportion walk always lands on
    // "FOBT" next.
    params.tests.get_mut("FOBT").unwrap().proportion = 1.0;
    params.tests.get_mut("Colonoscopy").unwrap().proportion = 0.0;

    let mut scheduler = Scheduler::new();
    let mut out = EventLog::new();
    let mut rng = SmallRng::seed_from_u64(1);
    let mut person = Person::new(1, testutil::DEFAULT_SEX, testutil::DEFAULT_RACE);

    person.start(100.0, &mut scheduler, &params, &mut rng, &mut out);
    scheduler.schedule(Message::CreateLesion, 40.0);
    person.run(&mut scheduler, &params, &mut rng, &mut out);

    assert_eq!(person.lesions.len(), 1);
    assert_eq!(person.lesions[0].state, LesionState::Removed);
    assert_eq!(person.disease_state, PersonDiseaseState::Healthy);

    let at_fifty: Vec<_> = out.records().iter().filter(|r| r.time == 50.0).collect();

    let pathologies = at_fifty.iter().filter(|r| r.record_type == RecordType::Pathology).count();
    let polypectomies = at_fifty.iter().filter(|r| r.record_type == RecordType::Polypectomy).count();
    let removed_transitions = at_fifty
        .iter()
        .filter(|r| {
            r.record_type == RecordType::LesionStateChange
                && r.old_state == Some("SMALL_POLYP")
                && r.new_state == Some("REMOVED")
        })
        .count();
    let healthy_transitions = at_fifty
        .iter()
        .filter(|r| {
            r.record_type == RecordType::DiseaseStateChange
                && r.message == Some("ALL_POLYPS_REMOVED")
                && r.new_state == Some("HEALTHY")
        })
        .count();

    assert_eq!(pathologies, 1);
    assert_eq!(polypectomies, 1);
    assert_eq!(removed_transitions, 1);
    assert_eq!(healthy_transitions, 1);
}

/// S7: three lesions sitting in different preclinical cancer stages. When
/// one is pushed into CLINICAL_DETECTION, the person-level disease
/// transition to its clinical stage fires `detect_other_cancers`, which
/// schedules a CLINICAL_DETECTION for every other still-preclinical
/// lesion — all three land in the log at the same simulation time — but
/// only the first one to resolve starts a treatment series, and that
/// series records the first lesion's stage.
#[test]
fn s7_one_clinical_detection_cascades_to_every_preclinical_lesion() {
    let mut params = testutil::minimal_parameters();
    // Suppress the automatically-scheduled first lesion so the only
    // lesions this person ever has are the three constructed below.
    params.lesion_incidence = testutil::flat_step(0.0);

    let mut scheduler = Scheduler::new();
    let mut out = EventLog::new();
    let mut rng = SmallRng::seed_from_u64(1);
    let mut person = Person::new(1, testutil::DEFAULT_SEX, testutil::DEFAULT_RACE);

    person.start(100.0, &mut scheduler, &params, &mut rng, &mut out);

    person.lesions.push(Lesion::new(0, &mut scheduler, &params, &mut rng));
    person.lesions[0].state = LesionState::PreclinicalStage1;
    person.lesions.push(Lesion::new(1, &mut scheduler, &params, &mut rng));
    person.lesions[1].state = LesionState::PreclinicalStage2;
    person.lesions.push(Lesion::new(2, &mut scheduler, &params, &mut rng));
    person.lesions[2].state = LesionState::PreclinicalStage3;
    person.disease_state = PersonDiseaseState::PreclinicalStage1;

    scheduler.schedule(Message::Lesion(0, crcsim::model::LesionMessage::ClinicalDetection), 0.5);
    person.run(&mut scheduler, &params, &mut rng, &mut out);

    let detections: Vec<_> = out
        .records()
        .iter()
        .filter(|r| {
            r.record_type == RecordType::LesionStateChange
                && r.message == Some("CLINICAL_DETECTION")
                && r.time == 0.5
        })
        .collect();
    assert_eq!(detections.len(), 3);

    let treatments: Vec<_> = out
        .records()
        .iter()
        .filter(|r| r.record_type == RecordType::Treatment && r.time == 0.5)
        .collect();
    assert_eq!(treatments.len(), 1);
    assert_eq!(treatments[0].stage, Some(1));

    assert_eq!(person.testing_state, PersonTestingState::Routine);
}
