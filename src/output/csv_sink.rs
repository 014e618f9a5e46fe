use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::error::SinkError;
use crate::output::{EventRecord, EventSink};

/// Writes the event log to a single CSV file, one row per record, columns
/// matching `output.py`'s `Output` class field list exactly.
pub struct CsvSink {
    writer: csv::Writer<BufWriter<File>>,
}

const HEADER: &[&str] = &[
    "record_type",
    "person_id",
    "lesion_id",
    "time",
    "message",
    "old_state",
    "new_state",
    "test_name",
    "routine_test",
    "role",
    "stage",
];

impl CsvSink {
    pub fn create(path: &Path) -> Result<Self, SinkError> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(BufWriter::new(file));
        writer.write_record(HEADER)?;
        Ok(Self { writer })
    }
}

fn opt_string<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

impl EventSink for CsvSink {
    fn write_batch(&mut self, records: &[EventRecord]) -> Result<(), SinkError> {
        for record in records {
            self.writer.write_record([
                record.record_type.name().to_string(),
                record.person_id.to_string(),
                opt_string(&record.lesion_id),
                record.time.to_string(),
                record.message.map(str::to_string).unwrap_or_default(),
                record.old_state.map(str::to_string).unwrap_or_default(),
                record.new_state.map(str::to_string).unwrap_or_default(),
                record.test_name.clone().unwrap_or_default(),
                record.routine_test.clone().unwrap_or_default(),
                record.role.map(str::to_string).unwrap_or_default(),
                opt_string(&record.stage),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
