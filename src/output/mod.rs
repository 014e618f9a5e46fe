//! Event log emission (§4.11, §6.2): one flat, append-only record type
//! covering every kind of thing a simulated person's lifetime can produce,
//! plus an [`EventSink`] trait for where those records end up.
//!
//! Grounded in `original_source/crcsim/output.py`'s `Output` class (one
//! `add_*` method per record kind, all funneling into a single CSV writer)
//! and in the teacher's `flush/jsonl.rs` accumulate-then-flush pattern: a
//! person's events accumulate in an [`EventLog`] while it runs, and the
//! driver flushes the whole batch to a sink once the person finishes.

mod csv_sink;
#[cfg(feature = "postgres")]
mod postgres_sink;

use crate::error::SinkError;
use crate::model::enums::{TestingRole, TreatmentRole};

pub use csv_sink::CsvSink;
#[cfg(feature = "postgres")]
pub use postgres_sink::PostgresSink;

/// One row of the event log. Exactly one of the record-kind-specific
/// fields is meaningful for any given `record_type`; the rest are `None`.
/// This mirrors `output.py`'s single wide CSV schema rather than an enum
/// per record kind, because that's the wire format every consumer of this
/// simulation's output already expects.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub record_type: RecordType,
    pub person_id: u64,
    pub lesion_id: Option<i64>,
    pub time: f64,
    pub message: Option<&'static str>,
    pub old_state: Option<&'static str>,
    pub new_state: Option<&'static str>,
    pub test_name: Option<String>,
    pub routine_test: Option<String>,
    pub role: Option<&'static str>,
    pub stage: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    DiseaseStateChange,
    LesionStateChange,
    Noncompliance,
    ExpectedLifespan,
    RoutineTestChosen,
    TestPerformed,
    Perforation,
    Polypectomy,
    Pathology,
    Treatment,
}

impl RecordType {
    pub fn name(self) -> &'static str {
        match self {
            RecordType::DiseaseStateChange => "disease_state_change",
            RecordType::LesionStateChange => "lesion_state_change",
            RecordType::Noncompliance => "noncompliance",
            RecordType::ExpectedLifespan => "lifespan",
            RecordType::RoutineTestChosen => "test_chosen",
            RecordType::TestPerformed => "test_performed",
            RecordType::Perforation => "perforation",
            RecordType::Polypectomy => "polypectomy",
            RecordType::Pathology => "pathology",
            RecordType::Treatment => "treatment",
        }
    }
}

fn base_record(record_type: RecordType, person_id: u64, time: f64) -> EventRecord {
    EventRecord {
        record_type,
        person_id,
        lesion_id: None,
        time,
        message: None,
        old_state: None,
        new_state: None,
        test_name: None,
        routine_test: None,
        role: None,
        stage: None,
    }
}

/// Accumulates one person's event records for the duration of their
/// simulation, to be handed to an [`EventSink`] in one batch once the
/// person finishes. One `EventLog` per person, never shared across people.
#[derive(Debug, Default)]
pub struct EventLog {
    records: Vec<EventRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        Self { records: Vec::new() }
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<EventRecord> {
        self.records
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_disease_state_change(
        &mut self,
        person_id: u64,
        message: &'static str,
        time: f64,
        old_state: &'static str,
        new_state: &'static str,
        routine_test: Option<String>,
    ) {
        let mut record = base_record(RecordType::DiseaseStateChange, person_id, time);
        record.message = Some(message);
        record.old_state = Some(old_state);
        record.new_state = Some(new_state);
        record.routine_test = routine_test;
        self.records.push(record);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_lesion_state_change(
        &mut self,
        person_id: u64,
        lesion_id: usize,
        message: &'static str,
        time: f64,
        old_state: &'static str,
        new_state: &'static str,
    ) {
        let mut record = base_record(RecordType::LesionStateChange, person_id, time);
        record.lesion_id = Some(lesion_id as i64);
        record.message = Some(message);
        record.old_state = Some(old_state);
        record.new_state = Some(new_state);
        self.records.push(record);
    }

    pub fn add_noncompliance(&mut self, person_id: u64, test_name: &str, role: TestingRole, time: f64) {
        let mut record = base_record(RecordType::Noncompliance, person_id, time);
        record.test_name = Some(test_name.to_string());
        record.role = Some(role.name());
        self.records.push(record);
    }

    pub fn add_expected_lifespan(&mut self, person_id: u64, time: f64) {
        self.records.push(base_record(RecordType::ExpectedLifespan, person_id, time));
    }

    pub fn add_routine_test_chosen(&mut self, person_id: u64, test_name: &str, time: f64) {
        let mut record = base_record(RecordType::RoutineTestChosen, person_id, time);
        record.test_name = Some(test_name.to_string());
        self.records.push(record);
    }

    pub fn add_test_performed(&mut self, person_id: u64, test_name: &str, role: TestingRole, time: f64) {
        let mut record = base_record(RecordType::TestPerformed, person_id, time);
        record.test_name = Some(test_name.to_string());
        record.role = Some(role.name());
        self.records.push(record);
    }

    pub fn add_perforation(
        &mut self,
        person_id: u64,
        test_name: &str,
        role: TestingRole,
        time: f64,
        routine_test: Option<String>,
    ) {
        let mut record = base_record(RecordType::Perforation, person_id, time);
        record.test_name = Some(test_name.to_string());
        record.role = Some(role.name());
        record.routine_test = routine_test;
        self.records.push(record);
    }

    pub fn add_polypectomy(&mut self, person_id: u64, role: TestingRole, time: f64) {
        let mut record = base_record(RecordType::Polypectomy, person_id, time);
        record.role = Some(role.name());
        self.records.push(record);
    }

    pub fn add_pathology(&mut self, person_id: u64, lesion_id: i64, role: TestingRole, time: f64) {
        let mut record = base_record(RecordType::Pathology, person_id, time);
        record.lesion_id = Some(lesion_id);
        record.role = Some(role.name());
        self.records.push(record);
    }

    pub fn add_treatment(&mut self, person_id: u64, stage: Option<u8>, role: TreatmentRole, time: f64) {
        let mut record = base_record(RecordType::Treatment, person_id, time);
        record.stage = stage;
        record.role = Some(role.name());
        self.records.push(record);
    }
}

/// Where a batch of event records ends up. One call per person, so a sink
/// can commit/flush incrementally instead of holding the whole run's
/// output in memory — the same memory-economy reason `__main__.py`
/// flushes after every person rather than at the end of the run.
pub trait EventSink {
    fn write_batch(&mut self, records: &[EventRecord]) -> Result<(), SinkError>;
}
