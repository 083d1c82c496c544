use thiserror::Error as ThisError;

/// Convenient alias, which defaults to [`Error`] as [`Err`]-variant.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error variants returned by this crate.
#[derive(ThisError, Debug)]
pub enum Error {
    #[error("Storage error: {0}")]
    Column(#[from] columnar::Error),

    #[error("Cannot append an empty list of columns")]
    EmptyColumnList,

    #[error("Entry {index} has type {actual} but {desired} is required")]
    IncompatibleTypes {
        /// Position of the first offending column, or of the offending
        /// table for table-level appends.
        index: usize,
        desired: String,
        actual: String,
        /// Set for table-level appends.
        column_name: Option<String>,
    },

    #[error("Table {table_index} has a different width")]
    IncompatibleTableWidth { table_index: usize },

    #[error("Table {table_index} does not have the column '{column_name}' at the expected position")]
    IncompatibleColumns {
        table_index: usize,
        column_name: String,
    },

    #[error("The combined table height overflows the supported maximum")]
    TableTooLong,

    #[error("At least one column label is required")]
    EmptyLabels,

    #[error("Mismatched lengths: {labels} labels but {items} entries")]
    LabelCount { labels: usize, items: usize },

    #[error("Empty column label at index {index}")]
    EmptyLabel { index: usize },

    #[error("Duplicate column label '{label}'")]
    DuplicateLabel { label: String },

    #[error("Column '{label}' has the non-numeric type {type_id}")]
    NonNumericType { label: String, type_id: String },

    #[error("The writer has already been finalized")]
    WriterFinalized,

    #[error("Columns have differing lengths: {expected} and {actual}")]
    HeightMismatch { expected: usize, actual: usize },
}
