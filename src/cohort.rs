//! Cohort ingestion: reading the `{id, sex, race_ethnicity}` rows a
//! simulation run is seeded from (§6.1).

use std::path::Path;

use serde::Deserialize;

use crate::error::CohortError;
use crate::model::{RaceEthnicity, Sex};

#[derive(Debug, Clone, Deserialize)]
pub struct CohortRow {
    pub id: u64,
    pub sex: Sex,
    pub race_ethnicity: RaceEthnicity,
}

pub fn read_cohort(path: &Path) -> Result<Vec<CohortRow>, CohortError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| match e.kind() {
        csv::ErrorKind::Io(_) => CohortError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::other(e.to_string()),
        },
        _ => CohortError::Csv { index: 0, source: e },
    })?;

    let mut rows = Vec::new();
    for (index, record) in reader.deserialize().enumerate() {
        let row: CohortRow = record.map_err(|source| CohortError::Csv { index, source })?;
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_rows_in_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "id,sex,race_ethnicity").unwrap();
        writeln!(file, "1,female,white_non_hispanic").unwrap();
        writeln!(file, "2,male,black_non_hispanic").unwrap();
        file.flush().unwrap();

        let rows = read_cohort(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, 1);
        assert_eq!(rows[1].id, 2);
    }

    #[test]
    fn bad_row_reports_its_index() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "id,sex,race_ethnicity").unwrap();
        writeln!(file, "1,female,white_non_hispanic").unwrap();
        writeln!(file, "2,not_a_sex,white_non_hispanic").unwrap();
        file.flush().unwrap();

        let err = read_cohort(file.path()).unwrap_err();
        match err {
            CohortError::Csv { index, .. } => assert_eq!(index, 1),
            other => panic!("expected Csv error, got {other:?}"),
        }
    }
}
