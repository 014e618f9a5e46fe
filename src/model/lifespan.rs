//! Lifespan sampler (§4.3): inverse-CDF sampling of age-at-non-CRC-death
//! from a per-demographic one-year mortality table.
//!
//! Grounded in `original_source/crcsim/agent.py::compute_lifespan`.

use rand::Rng;

use crate::model::enums::{RaceEthnicity, Sex};
use crate::params::Parameters;
use crate::stepfn::StepFunction;

/// Picks the demographic mortality table per the exact mapping in §4.3.
/// Any other `(sex, race_ethnicity)` combination is a contract violation:
/// the enum only has the four values named here, so this can never
/// actually miss.
fn death_rate_table<'p>(params: &'p Parameters, sex: Sex, race: RaceEthnicity) -> &'p StepFunction {
    match (sex, race) {
        (Sex::Female, RaceEthnicity::WhiteNonHispanic) => &params.death_rate_white_female,
        (Sex::Female, _) => &params.death_rate_black_female,
        (Sex::Male | Sex::Other, RaceEthnicity::WhiteNonHispanic) => &params.death_rate_white_male,
        (Sex::Male | Sex::Other, _) => &params.death_rate_black_male,
    }
}

/// Sample an age at which this person dies of causes other than CRC.
///
/// Walks the cumulative death distribution year by year; `rand` supplies
/// the uniform draw `u`. Result is clamped to `params.max_age`.
pub fn compute_lifespan(params: &Parameters, sex: Sex, race: RaceEthnicity, rng: &mut impl Rng) -> f64 {
    let death_rate = death_rate_table(params, sex, race);
    let u: f64 = rng.random();

    let mut cum_survive = 1.0_f64;
    let mut cum_death = 0.0_f64;

    for i in 0..=params.max_age {
        let q = death_rate.call(i as f64);
        let p = q * cum_survive;
        cum_death += p;
        cum_survive *= 1.0 - q;
        if u < cum_death {
            let lifespan = (i + 1) as f64 - (cum_death - u) / p;
            return lifespan.min(params.max_age as f64);
        }
    }
    params.max_age as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::SmallRng, SeedableRng};

    fn params_with_death_rate(rate: f64, max_age: i64) -> Parameters {
        let flat = StepFunction::new("d", vec![0.0], vec![rate]).unwrap();
        crate::testutil::params_with_tables(max_age, flat)
    }

    #[test]
    fn s4_lifespan_clamp_on_degenerate_table() {
        let params = params_with_death_rate(0.0, 100);
        let mut rng = SmallRng::seed_from_u64(1);
        for _ in 0..20 {
            let lifespan = compute_lifespan(&params, Sex::Female, RaceEthnicity::WhiteNonHispanic, &mut rng);
            assert_eq!(lifespan, 100.0);
        }
    }

    #[test]
    fn lifespan_never_exceeds_max_age() {
        let params = params_with_death_rate(0.05, 100);
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..500 {
            let lifespan = compute_lifespan(&params, Sex::Male, RaceEthnicity::Hispanic, &mut rng);
            assert!(lifespan <= 100.0);
            assert!(lifespan >= 0.0);
        }
    }

    #[test]
    fn demographic_table_selection_matches_spec_mapping() {
        let params = crate::testutil::distinct_demographic_tables();
        // With u pinned near 0 via a fixed seed isn't precise enough; instead
        // assert indirectly via extreme tables: white_female has rate 1.0 (dies
        // immediately at age 0), others have rate 0.0 (never die, clamp to max).
        let mut rng = SmallRng::seed_from_u64(3);
        let white_female = compute_lifespan(&params, Sex::Female, RaceEthnicity::WhiteNonHispanic, &mut rng);
        assert!(white_female < 1.0);

        let black_female = compute_lifespan(&params, Sex::Female, RaceEthnicity::BlackNonHispanic, &mut rng);
        assert_eq!(black_female, params.max_age as f64);

        let other_male = compute_lifespan(&params, Sex::Other, RaceEthnicity::OtherNonHispanic, &mut rng);
        assert_eq!(other_male, params.max_age as f64);
    }
}
