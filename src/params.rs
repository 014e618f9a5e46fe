//! Parameter bundle loading and validation (§4.9, §6.1).
//!
//! Parses a JSON parameter file into [`Parameters`], building every
//! [`StepFunction`] eagerly and failing fast on the validation conditions
//! named in §7 ("Parameter validation (fatal at load)"). Grounded in
//! `original_source/crcsim/parameters.py::load_params` for which fields
//! become step functions and in what order they're built.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::ParamError;
use crate::stepfn::StepFunction;

/// Per-test configuration (`tests[name]` in the original parameter file).
#[derive(Debug, Clone, Deserialize)]
pub struct TestParams {
    pub proportion: f64,
    pub sensitivity_polyp1: f64,
    pub sensitivity_polyp2: f64,
    pub sensitivity_polyp3: f64,
    pub sensitivity_cancer: f64,
    pub specificity: f64,
    pub cost: f64,
    pub routine_start: i64,
    pub routine_end: i64,
    pub routine_freq: f64,
    pub proportion_perforation: f64,
    pub cost_perforation: f64,
    pub compliance_rate_given_prev_compliant: f64,
    pub compliance_rate_given_not_prev_compliant: f64,
}

/// Raw, pre-validation shape of the parameter JSON file. Arrays named
/// `*_ages`/`*_rates` (or `*_years`/`*_tests`) are paired up into
/// [`StepFunction`]s by [`Parameters::load`].
#[derive(Debug, Deserialize)]
struct RawParameters {
    max_age: i64,

    lesion_risk_alpha: f64,
    lesion_risk_beta: f64,
    lesion_incidence_ages: Vec<f64>,
    lesion_incidence_rates: Vec<f64>,

    death_rate_white_female_ages: Vec<f64>,
    death_rate_white_female_rates: Vec<f64>,
    death_rate_black_female_ages: Vec<f64>,
    death_rate_black_female_rates: Vec<f64>,
    death_rate_white_male_ages: Vec<f64>,
    death_rate_white_male_rates: Vec<f64>,
    death_rate_black_male_ages: Vec<f64>,
    death_rate_black_male_rates: Vec<f64>,

    tests: HashMap<String, TestParams>,
    diagnostic_test: String,
    surveillance_test: String,
    routine_tests: Vec<String>,

    initial_compliance_rate: f64,
    diagnostic_compliance_rate: f64,
    surveillance_compliance_rate: f64,
    never_compliant_rate: f64,
    use_conditional_compliance: bool,

    polypectomy_proportion_lethal: f64,

    mean_duration_polyp1_polyp2: f64,
    mean_duration_polyp2_polyp3: f64,
    mean_duration_polyp2_pre: f64,
    mean_duration_polyp3_pre: f64,
    mean_duration_pre1_pre2: f64,
    mean_duration_pre2_pre3: f64,
    mean_duration_pre3_pre4: f64,
    mean_duration_pre1_clin1: f64,
    mean_duration_pre2_clin2: f64,
    mean_duration_pre3_clin3: f64,
    mean_duration_pre4_clin4: f64,
    mean_duration_clin1_dead: f64,
    mean_duration_clin2_dead: f64,
    mean_duration_clin3_dead: f64,
    mean_duration_clin4_dead: f64,

    proportion_survive_clin1: f64,
    proportion_survive_clin2: f64,
    proportion_survive_clin3: f64,
    proportion_survive_clin4: f64,

    surveillance_freq_polyp_none: f64,
    surveillance_freq_polyp_mild: f64,
    surveillance_freq_polyp_moderate: f64,
    surveillance_freq_polyp_severe: f64,
    surveillance_freq_cancer_first: f64,
    surveillance_freq_cancer_second: f64,
    surveillance_freq_cancer_rest: f64,
    surveillance_end_age: f64,

    duration_screen_skip_testing: f64,
    max_ongoing_treatments: u32,

    #[serde(default)]
    use_variable_routine_test: bool,
    #[serde(default)]
    routine_testing_year: Vec<i64>,
    #[serde(default)]
    routine_test_by_year: Vec<String>,
}

/// The validated, immutable parameter bundle for one simulation run.
///
/// Held behind a shared reference (or `Arc` under `--jobs > 1`) for the
/// duration of every individual's simulation, per the design notes'
/// "construct once at load; pass by shared read-only reference."
#[derive(Debug)]
pub struct Parameters {
    pub max_age: i64,

    pub lesion_risk_alpha: f64,
    pub lesion_risk_beta: f64,
    pub lesion_incidence: StepFunction,

    pub death_rate_white_female: StepFunction,
    pub death_rate_black_female: StepFunction,
    pub death_rate_white_male: StepFunction,
    pub death_rate_black_male: StepFunction,

    pub tests: HashMap<String, TestParams>,
    pub diagnostic_test: String,
    pub surveillance_test: String,
    pub routine_tests: Vec<String>,

    pub initial_compliance_rate: f64,
    pub diagnostic_compliance_rate: f64,
    pub surveillance_compliance_rate: f64,
    pub never_compliant_rate: f64,
    pub use_conditional_compliance: bool,

    pub polypectomy_proportion_lethal: f64,

    pub mean_duration_polyp1_polyp2: f64,
    pub mean_duration_polyp2_polyp3: f64,
    pub mean_duration_polyp2_pre: f64,
    pub mean_duration_polyp3_pre: f64,
    pub mean_duration_pre1_pre2: f64,
    pub mean_duration_pre2_pre3: f64,
    pub mean_duration_pre3_pre4: f64,
    pub mean_duration_pre1_clin1: f64,
    pub mean_duration_pre2_clin2: f64,
    pub mean_duration_pre3_clin3: f64,
    pub mean_duration_pre4_clin4: f64,
    pub mean_duration_clin1_dead: f64,
    pub mean_duration_clin2_dead: f64,
    pub mean_duration_clin3_dead: f64,
    pub mean_duration_clin4_dead: f64,

    pub proportion_survive_clin1: f64,
    pub proportion_survive_clin2: f64,
    pub proportion_survive_clin3: f64,
    pub proportion_survive_clin4: f64,

    pub surveillance_freq_polyp_none: f64,
    pub surveillance_freq_polyp_mild: f64,
    pub surveillance_freq_polyp_moderate: f64,
    pub surveillance_freq_polyp_severe: f64,
    pub surveillance_freq_cancer_first: f64,
    pub surveillance_freq_cancer_second: f64,
    pub surveillance_freq_cancer_rest: f64,
    pub surveillance_end_age: f64,

    pub duration_screen_skip_testing: f64,
    pub max_ongoing_treatments: u32,

    pub use_variable_routine_test: bool,
    pub routine_testing_year: Vec<i64>,
    pub routine_test_by_year: Vec<String>,
}

impl Parameters {
    pub fn load(path: &Path) -> Result<Self, ParamError> {
        let text = std::fs::read_to_string(path).map_err(|source| ParamError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: RawParameters = serde_json::from_str(&text).map_err(|source| ParamError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawParameters) -> Result<Self, ParamError> {
        let lesion_incidence = StepFunction::new(
            "lesion_incidence",
            raw.lesion_incidence_ages,
            raw.lesion_incidence_rates,
        )?;
        let death_rate_white_female = StepFunction::new(
            "death_rate_white_female",
            raw.death_rate_white_female_ages,
            raw.death_rate_white_female_rates,
        )?;
        let death_rate_black_female = StepFunction::new(
            "death_rate_black_female",
            raw.death_rate_black_female_ages,
            raw.death_rate_black_female_rates,
        )?;
        let death_rate_white_male = StepFunction::new(
            "death_rate_white_male",
            raw.death_rate_white_male_ages,
            raw.death_rate_white_male_rates,
        )?;
        let death_rate_black_male = StepFunction::new(
            "death_rate_black_male",
            raw.death_rate_black_male_ages,
            raw.death_rate_black_male_rates,
        )?;

        let proportion_sum: f64 = raw.tests.values().map(|t| t.proportion).sum();
        if proportion_sum > 1.0 {
            return Err(ParamError::TestProportionSum { sum: proportion_sum });
        }

        for name in [&raw.diagnostic_test, &raw.surveillance_test] {
            if !raw.tests.contains_key(name) {
                return Err(ParamError::UnknownTest {
                    name: name.clone(),
                    field: "diagnostic_test/surveillance_test",
                });
            }
        }
        for name in &raw.routine_tests {
            if !raw.tests.contains_key(name) {
                return Err(ParamError::UnknownTest {
                    name: name.clone(),
                    field: "routine_tests",
                });
            }
        }

        if raw.use_variable_routine_test {
            validate_variable_routine_domain(&raw)?;
        }

        Ok(Self {
            max_age: raw.max_age,
            lesion_risk_alpha: raw.lesion_risk_alpha,
            lesion_risk_beta: raw.lesion_risk_beta,
            lesion_incidence,
            death_rate_white_female,
            death_rate_black_female,
            death_rate_white_male,
            death_rate_black_male,
            tests: raw.tests,
            diagnostic_test: raw.diagnostic_test,
            surveillance_test: raw.surveillance_test,
            routine_tests: raw.routine_tests,
            initial_compliance_rate: raw.initial_compliance_rate,
            diagnostic_compliance_rate: raw.diagnostic_compliance_rate,
            surveillance_compliance_rate: raw.surveillance_compliance_rate,
            never_compliant_rate: raw.never_compliant_rate,
            use_conditional_compliance: raw.use_conditional_compliance,
            polypectomy_proportion_lethal: raw.polypectomy_proportion_lethal,
            mean_duration_polyp1_polyp2: raw.mean_duration_polyp1_polyp2,
            mean_duration_polyp2_polyp3: raw.mean_duration_polyp2_polyp3,
            mean_duration_polyp2_pre: raw.mean_duration_polyp2_pre,
            mean_duration_polyp3_pre: raw.mean_duration_polyp3_pre,
            mean_duration_pre1_pre2: raw.mean_duration_pre1_pre2,
            mean_duration_pre2_pre3: raw.mean_duration_pre2_pre3,
            mean_duration_pre3_pre4: raw.mean_duration_pre3_pre4,
            mean_duration_pre1_clin1: raw.mean_duration_pre1_clin1,
            mean_duration_pre2_clin2: raw.mean_duration_pre2_clin2,
            mean_duration_pre3_clin3: raw.mean_duration_pre3_clin3,
            mean_duration_pre4_clin4: raw.mean_duration_pre4_clin4,
            mean_duration_clin1_dead: raw.mean_duration_clin1_dead,
            mean_duration_clin2_dead: raw.mean_duration_clin2_dead,
            mean_duration_clin3_dead: raw.mean_duration_clin3_dead,
            mean_duration_clin4_dead: raw.mean_duration_clin4_dead,
            proportion_survive_clin1: raw.proportion_survive_clin1,
            proportion_survive_clin2: raw.proportion_survive_clin2,
            proportion_survive_clin3: raw.proportion_survive_clin3,
            proportion_survive_clin4: raw.proportion_survive_clin4,
            surveillance_freq_polyp_none: raw.surveillance_freq_polyp_none,
            surveillance_freq_polyp_mild: raw.surveillance_freq_polyp_mild,
            surveillance_freq_polyp_moderate: raw.surveillance_freq_polyp_moderate,
            surveillance_freq_polyp_severe: raw.surveillance_freq_polyp_severe,
            surveillance_freq_cancer_first: raw.surveillance_freq_cancer_first,
            surveillance_freq_cancer_second: raw.surveillance_freq_cancer_second,
            surveillance_freq_cancer_rest: raw.surveillance_freq_cancer_rest,
            surveillance_end_age: raw.surveillance_end_age,
            duration_screen_skip_testing: raw.duration_screen_skip_testing,
            max_ongoing_treatments: raw.max_ongoing_treatments,
            use_variable_routine_test: raw.use_variable_routine_test,
            routine_testing_year: raw.routine_testing_year,
            routine_test_by_year: raw.routine_test_by_year,
        })
    }
}

/// `routine_testing_year` must span exactly the union of every configured
/// routine test's `[routine_start, routine_end]` window (§6.1).
fn validate_variable_routine_domain(raw: &RawParameters) -> Result<(), ParamError> {
    let Some(&first) = raw.routine_testing_year.first() else {
        return Err(ParamError::VariableRoutineDomain {
            years: raw.routine_testing_year.clone(),
        });
    };
    let last = *raw.routine_testing_year.last().unwrap();

    let expected_start = raw
        .routine_tests
        .iter()
        .filter_map(|t| raw.tests.get(t))
        .map(|t| t.routine_start)
        .min();
    let expected_end = raw
        .routine_tests
        .iter()
        .filter_map(|t| raw.tests.get(t))
        .map(|t| t.routine_end)
        .max();

    let contiguous = raw
        .routine_testing_year
        .windows(2)
        .all(|w| w[1] == w[0] + 1);

    if Some(first) != expected_start || Some(last) != expected_end || !contiguous {
        return Err(ParamError::VariableRoutineDomain {
            years: raw.routine_testing_year.clone(),
        });
    }
    if raw.routine_test_by_year.len() != raw.routine_testing_year.len() {
        return Err(ParamError::VariableRoutineDomain {
            years: raw.routine_testing_year.clone(),
        });
    }
    Ok(())
}
