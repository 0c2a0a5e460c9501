use chrono::NaiveDate;
use thiserror::Error;

/// Failures that stop a dataset from being loaded at all.
///
/// Row-level problems (bad dates, unparseable numbers) never show up here;
/// they are counted in [`crate::loader::LoadReport`] instead.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("the uploaded file is empty")]
    Empty,
    #[error("required column '{0}' is missing")]
    MissingColumn(String),
    #[error("unsupported file extension: {0}")]
    UnsupportedFormat(String),
    #[error("failed to read delimited text: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to read spreadsheet: {0}")]
    Spreadsheet(String),
    #[error("failed to read snapshot: {0}")]
    Snapshot(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("date range start {from} is after its end {to}")]
    InvertedRange { from: NaiveDate, to: NaiveDate },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write delimited text: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to write spreadsheet: {0}")]
    Spreadsheet(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<csv::IntoInnerError<csv::Writer<Vec<u8>>>> for ExportError {
    fn from(err: csv::IntoInnerError<csv::Writer<Vec<u8>>>) -> Self {
        ExportError::Io(err.into_error())
    }
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid email address '{0}'")]
    Address(String),
    #[error("failed to build message: {0}")]
    Build(String),
    #[error("failed to attach '{path}': {source}")]
    Attachment {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("mail submission failed: {0}")]
    Transport(String),
    #[error("email sharing is not configured")]
    NotConfigured,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} has an invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}
