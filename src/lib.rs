pub mod cohort;
pub mod driver;
pub mod error;
pub mod model;
pub mod output;
pub mod params;
pub mod rng;
pub mod scheduler;
pub mod stepfn;
pub mod testutil;

pub use cohort::{read_cohort, CohortRow};
pub use model::Person;
pub use params::Parameters;
