use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Unsupported pixel format: {0}")]
    UnsupportedFormat(String),

    #[error("Dimension mismatch: expected {expected_width}x{expected_height}, got {actual_width}x{actual_height}")]
    DimensionMismatch {
        expected_width: usize,
        expected_height: usize,
        actual_width: usize,
        actual_height: usize,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    #[error("No usable exposure found in stack")]
    NoUsableExposure,

    #[error("Failed to read input file: {0}")]
    InputReadError(String),

    #[error("Failed to write output file: {0}")]
    OutputWriteError(String),

    #[error("Failed to decode frame: {0}")]
    DecodeError(String),

    #[error("Failed to encode image: {0}")]
    EncodeError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
