//! State and message enumerations for the three person statecharts and the
//! lesion statechart, plus the small supporting enums used throughout.
//!
//! Each state/message enum carries a `name()` method returning its symbolic
//! name, used verbatim in event log records (§6.2 of the spec: "state and
//! message values are their symbolic names"). This mirrors the original
//! Python enums' `__str__` returning the member name, and the teacher's
//! hand-written `Serialize` for `EventKind` (`model/event.rs`), which also
//! maps enum variants to fixed strings rather than deriving them.

use serde::{Deserialize, Serialize};

macro_rules! named_enum {
    ($(#[$meta:meta])* $vis:vis enum $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant),+
        }

        impl $name {
            pub fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

named_enum! {
    pub enum PersonDiseaseState {
        Uninitialized => "UNINITIALIZED",
        Healthy => "HEALTHY",
        SmallPolyp => "SMALL_POLYP",
        MediumPolyp => "MEDIUM_POLYP",
        LargePolyp => "LARGE_POLYP",
        PreclinicalStage1 => "PRECLINICAL_STAGE1",
        PreclinicalStage2 => "PRECLINICAL_STAGE2",
        PreclinicalStage3 => "PRECLINICAL_STAGE3",
        PreclinicalStage4 => "PRECLINICAL_STAGE4",
        ClinicalStage1 => "CLINICAL_STAGE1",
        ClinicalStage2 => "CLINICAL_STAGE2",
        ClinicalStage3 => "CLINICAL_STAGE3",
        ClinicalStage4 => "CLINICAL_STAGE4",
        Dead => "DEAD",
    }
}

named_enum! {
    pub enum PersonDiseaseMessage {
        Init => "INIT",
        PolypOnset => "POLYP_ONSET",
        PolypMediumOnset => "POLYP_MEDIUM_ONSET",
        PolypLargeOnset => "POLYP_LARGE_ONSET",
        PreclinicalOnset => "PRECLINICAL_ONSET",
        Pre2Onset => "PRE2_ONSET",
        Pre3Onset => "PRE3_ONSET",
        Pre4Onset => "PRE4_ONSET",
        ClinicalOnset => "CLINICAL_ONSET",
        AllPolypsRemoved => "ALL_POLYPS_REMOVED",
        OtherDeath => "OTHER_DEATH",
        CrcDeath => "CRC_DEATH",
        PolypectomyDeath => "POLYPECTOMY_DEATH",
    }
}

named_enum! {
    pub enum PersonTestingState {
        Uninitialized => "UNINITIALIZED",
        Routine => "ROUTINE",
        Diagnostic => "DIAGNOSTIC",
        SkipTesting => "SKIP_TESTING",
        Surveillance => "SURVEILLANCE",
        NoTesting => "NO_TESTING",
    }
}

named_enum! {
    pub enum PersonTestingMessage {
        Init => "INIT",
        Symptomatic => "SYMPTOMATIC",
        ScreenPositive => "SCREEN_POSITIVE",
        RoutineIsDiagnostic => "ROUTINE_IS_DIAGNOSTIC",
        NotCompliant => "NOT_COMPLIANT",
        ReturnToRoutine => "RETURN_TO_ROUTINE",
        Negative => "NEGATIVE",
        PositivePolyp => "POSITIVE_POLYP",
        PositiveCancer => "POSITIVE_CANCER",
    }
}

named_enum! {
    pub enum PersonTreatmentState {
        Uninitialized => "UNINITIALIZED",
        NoTreatment => "NO_TREATMENT",
        Treatment => "TREATMENT",
    }
}

named_enum! {
    pub enum PersonTreatmentMessage {
        Init => "INIT",
        StartTreatment => "START_TREATMENT",
    }
}

named_enum! {
    pub enum LesionState {
        Uninitialized => "UNINITIALIZED",
        SmallPolyp => "SMALL_POLYP",
        MediumPolyp => "MEDIUM_POLYP",
        LargePolyp => "LARGE_POLYP",
        PreclinicalStage1 => "PRECLINICAL_STAGE1",
        PreclinicalStage2 => "PRECLINICAL_STAGE2",
        PreclinicalStage3 => "PRECLINICAL_STAGE3",
        PreclinicalStage4 => "PRECLINICAL_STAGE4",
        ClinicalStage1 => "CLINICAL_STAGE1",
        ClinicalStage2 => "CLINICAL_STAGE2",
        ClinicalStage3 => "CLINICAL_STAGE3",
        ClinicalStage4 => "CLINICAL_STAGE4",
        Removed => "REMOVED",
        Dead => "DEAD",
    }
}

named_enum! {
    pub enum LesionMessage {
        Init => "INIT",
        ProgressPolypStage => "PROGRESS_POLYP_STAGE",
        ProgressCancerStage => "PROGRESS_CANCER_STAGE",
        ClinicalDetection => "CLINICAL_DETECTION",
        BecomeCancer => "BECOME_CANCER",
        KillPerson => "KILL_PERSON",
    }
}

named_enum! {
    pub enum TestingRole {
        Routine => "ROUTINE",
        Diagnostic => "DIAGNOSTIC",
        Surveillance => "SURVEILLANCE",
    }
}

named_enum! {
    pub enum TreatmentRole {
        Initial => "INITIAL",
        Ongoing => "ONGOING",
        Terminal => "TERMINAL",
    }
}

/// A polyp-or-preclinical-cancer severity bucket, used by the surveillance
/// frequency rule (§4.7.1) to pick a surveillance interval from the counts
/// recorded on the previous test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolypSeverity {
    None,
    Mild,
    Moderate,
    Severe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Female,
    Male,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceEthnicity {
    Hispanic,
    WhiteNonHispanic,
    BlackNonHispanic,
    OtherNonHispanic,
}
