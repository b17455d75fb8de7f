//! Error types shared by every terrain operation.

/// Errors that can abort a terrain operation before it commits anything.
#[derive(Debug, thiserror::Error)]
pub enum TerrainError {
    /// The operation needs an active terrain or tile set and none is loaded.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A parameter struct failed validation (bad band list, zero-sized grid, ...).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Grid dimensions disagree in a place where resampling has no meaning.
    #[error("size mismatch: expected {expected:?}, got {actual:?}")]
    SizeMismatch {
        /// Dimensions the target requires.
        expected: (usize, usize),
        /// Dimensions that were supplied.
        actual: (usize, usize),
    },

    /// Failed to decode or encode an image.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Failed to read or write a file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse or serialize a configuration file.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, TerrainError>;
