use thiserror::Error as ThisError;

/// Convenient alias, which defaults to [`Error`] as [`Err`]-variant.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error variants returned by this crate.
#[derive(ThisError, Debug)]
pub enum Error {
    #[error("Sparse rows must be strictly increasing, position {position} holds row {row}")]
    UnsortedSparseRow { position: usize, row: u32 },

    #[error("Sparse row {row} is out of range for a column of length {len}")]
    SparseRowOutOfRange { row: u32, len: usize },

    #[error("Sparse value at position {position} equals the default value")]
    SparseDefaultValue { position: usize },

    #[error("Mismatched sparse buffers: {rows} rows but {values} values")]
    SparseLengthMismatch { rows: usize, values: usize },

    #[error("Category index {index} is out of range for a dictionary of {len} entries")]
    CategoryIndexOutOfRange { index: u32, len: usize },

    #[error("A boolean dictionary can hold at most two values, got {count}")]
    TooManyBooleanValues { count: usize },

    #[error("Positive index {index} is out of range for a dictionary of {len} entries")]
    PositiveIndexOutOfRange { index: u32, len: usize },

    #[error("A boolean dictionary with two values requires a positive index")]
    MissingPositiveIndex,

    #[error("Remapping of length {len} does not cover a dictionary of {expected} entries")]
    RemappingLength { len: usize, expected: usize },

    #[error("Remapped index {index} is out of range for a dictionary of {len} entries")]
    RemappedIndexOutOfRange { index: i32, len: usize },

    #[error("Mismatched buffer lengths: {seconds} seconds but {nanos} subsecond parts")]
    SubsecondLength { seconds: usize, nanos: usize },
}
