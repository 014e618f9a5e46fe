pub mod enums;
pub mod incidence;
pub mod lesion;
pub mod lifespan;
pub mod person;

pub use enums::{
    LesionMessage, LesionState, PersonDiseaseMessage, PersonDiseaseState, PersonTestingMessage,
    PersonTestingState, PersonTreatmentMessage, PersonTreatmentState, PolypSeverity, RaceEthnicity, Sex,
    TestingRole, TreatmentRole,
};
pub use lesion::{Lesion, LesionOutcome};
pub use person::Person;
