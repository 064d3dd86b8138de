use thiserror::Error;

#[derive(Error, Debug)]
pub enum MappingError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Matrix mapping must declare at least one concept column")]
    NoConceptColumns,

    #[error("Invalid data range: start row {start_row} is after end row {end_row}")]
    InvalidDataRange { start_row: usize, end_row: usize },

    #[error("Data range {start_row}..={end_row} is outside the grid ({row_count} rows)")]
    DataRangeOutOfBounds {
        start_row: usize,
        end_row: usize,
        row_count: usize,
    },

    #[error("Column {column} is outside the grid (widest row has {width} cells)")]
    ColumnOutOfBounds { column: usize, width: usize },

    #[error("Period column {0} is declared more than once")]
    DuplicatePeriodColumn(usize),

    #[error("Period label '{0}' is used by more than one column")]
    DuplicatePeriodLabel(String),

    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to persist statement for period {period}: {details}")]
    Persistence { period: String, details: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MappingError>;
