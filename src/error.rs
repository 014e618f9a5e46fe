use std::path::PathBuf;

/// Errors raised while loading and validating a parameter bundle.
///
/// These are always fatal, but never panics: a malformed parameter file is
/// an external-input problem, not an internal contract violation.
#[derive(Debug, thiserror::Error)]
pub enum ParamError {
    #[error("failed to read parameter file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse parameter file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("step function '{name}' has mismatched array lengths: {x_len} x-values vs {y_len} y-values")]
    StepFunctionLength {
        name: String,
        x_len: usize,
        y_len: usize,
    },

    #[error("step function '{name}' is not sorted in non-decreasing order")]
    StepFunctionUnsorted { name: String },

    #[error("sum of routine test proportions is {sum}, which exceeds 1")]
    TestProportionSum { sum: f64 },

    #[error(
        "variable routine test domain {years:?} does not match the union of configured routine test windows"
    )]
    VariableRoutineDomain { years: Vec<i64> },

    #[error("unknown test name '{name}' referenced by {field}")]
    UnknownTest { name: String, field: &'static str },
}

/// Errors raised while reading a cohort file.
#[derive(Debug, thiserror::Error)]
pub enum CohortError {
    #[error("failed to read cohort file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse cohort row {index}: {source}")]
    Csv {
        index: usize,
        #[source]
        source: csv::Error,
    },
}

/// Errors raised by an [`crate::output::EventSink`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("event sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("event sink CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[cfg(feature = "postgres")]
    #[error("event sink database error: {0}")]
    Db(#[from] sqlx::Error),
}
