//! Shared test scaffolding: a minimal valid [`Parameters`] bundle and small
//! variants used across the lifespan, incidence, lesion, and person
//! statechart test suites, in the spirit of the teacher's `testutil.rs`
//! scenario-builder module.

use std::collections::HashMap;

use crate::model::{RaceEthnicity, Sex};
use crate::params::{Parameters, TestParams};
use crate::stepfn::StepFunction;

pub fn flat_step(value: f64) -> StepFunction {
    StepFunction::new("flat", vec![0.0], vec![value]).unwrap()
}

fn default_test_params() -> TestParams {
    TestParams {
        proportion: 1.0,
        sensitivity_polyp1: 0.5,
        sensitivity_polyp2: 0.5,
        sensitivity_polyp3: 0.5,
        sensitivity_cancer: 0.9,
        specificity: 0.95,
        cost: 10.0,
        routine_start: 50,
        routine_end: 75,
        routine_freq: 1.0,
        proportion_perforation: 0.0,
        cost_perforation: 0.0,
        compliance_rate_given_prev_compliant: 0.8,
        compliance_rate_given_not_prev_compliant: 0.2,
    }
}

/// A minimal, fully valid parameter bundle with a single test named "TestA",
/// flat (age-independent) incidence and mortality, and deterministic (zero
/// or near-certain) probabilities wherever a test needs to pin an outcome.
pub fn minimal_parameters() -> Parameters {
    let mut tests = HashMap::new();
    tests.insert("TestA".to_string(), default_test_params());

    Parameters {
        max_age: 100,
        lesion_risk_alpha: 2.0,
        lesion_risk_beta: 2.0,
        lesion_incidence: flat_step(0.01),
        death_rate_white_female: flat_step(0.01),
        death_rate_black_female: flat_step(0.01),
        death_rate_white_male: flat_step(0.01),
        death_rate_black_male: flat_step(0.01),
        tests,
        diagnostic_test: "TestA".to_string(),
        surveillance_test: "TestA".to_string(),
        routine_tests: vec!["TestA".to_string()],
        initial_compliance_rate: 1.0,
        diagnostic_compliance_rate: 1.0,
        surveillance_compliance_rate: 1.0,
        never_compliant_rate: 0.0,
        use_conditional_compliance: false,
        polypectomy_proportion_lethal: 0.0,
        mean_duration_polyp1_polyp2: 5.0,
        mean_duration_polyp2_polyp3: 5.0,
        mean_duration_polyp2_pre: 20.0,
        mean_duration_polyp3_pre: 10.0,
        mean_duration_pre1_pre2: 2.0,
        mean_duration_pre2_pre3: 2.0,
        mean_duration_pre3_pre4: 2.0,
        mean_duration_pre1_clin1: 3.0,
        mean_duration_pre2_clin2: 3.0,
        mean_duration_pre3_clin3: 3.0,
        mean_duration_pre4_clin4: 3.0,
        mean_duration_clin1_dead: 10.0,
        mean_duration_clin2_dead: 8.0,
        mean_duration_clin3_dead: 5.0,
        mean_duration_clin4_dead: 2.0,
        proportion_survive_clin1: 0.9,
        proportion_survive_clin2: 0.8,
        proportion_survive_clin3: 0.5,
        proportion_survive_clin4: 0.1,
        surveillance_freq_polyp_none: 10.0,
        surveillance_freq_polyp_mild: 5.0,
        surveillance_freq_polyp_moderate: 3.0,
        surveillance_freq_polyp_severe: 1.0,
        surveillance_freq_cancer_first: 1.0,
        surveillance_freq_cancer_second: 1.0,
        surveillance_freq_cancer_rest: 2.0,
        surveillance_end_age: 85.0,
        duration_screen_skip_testing: 10.0,
        max_ongoing_treatments: 4,
        use_variable_routine_test: false,
        routine_testing_year: Vec::new(),
        routine_test_by_year: Vec::new(),
    }
}

/// A parameter bundle whose four demographic mortality tables are all the
/// given flat rate, for lifespan-sampler tests that don't care about
/// demographic selection.
pub fn params_with_tables(max_age: i64, death_rate: StepFunction) -> Parameters {
    let mut params = minimal_parameters();
    params.max_age = max_age;
    params.death_rate_white_female = death_rate.clone();
    params.death_rate_black_female = death_rate.clone();
    params.death_rate_white_male = death_rate.clone();
    params.death_rate_black_male = death_rate;
    params
}

/// Four distinct demographic tables so the lifespan sampler's table-
/// selection rule (§4.3) can be exercised: white females die at age 0 with
/// certainty; everyone else never dies (clamps to `max_age`).
pub fn distinct_demographic_tables() -> Parameters {
    let mut params = minimal_parameters();
    params.death_rate_white_female = flat_step(1.0);
    params.death_rate_black_female = flat_step(0.0);
    params.death_rate_white_male = flat_step(0.0);
    params.death_rate_black_male = flat_step(0.0);
    params
}

pub const DEFAULT_SEX: Sex = Sex::Female;
pub const DEFAULT_RACE: RaceEthnicity = RaceEthnicity::WhiteNonHispanic;
