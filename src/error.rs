//! Error surface of the import pipeline.
//!
//! Every variant is fatal to the current import attempt and is raised before
//! anything is written to the report store. Malformed numeric cells are not
//! errors; they degrade to `0` inside the numeric normalizer.

use crate::schema::ColumnRole;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    /// No rows or no non-blank cells at all.
    #[error("source contains no data")]
    EmptySource,

    /// Required columns could not be located by synonym or statistical inference.
    #[error("could not locate required column(s): {}", join_roles(.missing))]
    SchemaUnresolved { missing: Vec<ColumnRole> },

    /// A schema was found but every data row was filtered out as noise.
    #[error("no campaign rows could be extracted")]
    NoDataExtracted,

    #[error("invalid month '{0}', expected YYYY-MM")]
    InvalidMonth(String),

    #[error("unsupported file type: .{0}. Supported: .csv, .tsv, .txt, .xlsx, .xlsm, .xlsb, .xls")]
    UnsupportedFormat(String),

    #[error("failed to decode workbook: {0}")]
    Decode(String),

    #[error("report store error: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl ImportError {
    /// True for errors caused by the uploaded content rather than infrastructure.
    pub fn is_input_error(&self) -> bool {
        !matches!(self, ImportError::Store(_))
    }
}

fn join_roles(roles: &[ColumnRole]) -> String {
    roles
        .iter()
        .map(|r| r.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
