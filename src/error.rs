//! Error types for the podcast assembly pipeline.

/// Top-level error type for the assembly system.
#[derive(Debug, thiserror::Error)]
pub enum MixcastError {
    /// A speaker or voice reference could not be resolved before synthesis.
    #[error("validation error: {0}")]
    Validation(String),

    /// A segment's synthesis call failed.
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// An audio asset could not be loaded or decoded.
    ///
    /// Recoverable inside the mixdown engine (the item contributes
    /// silence); fatal only when a caller loads an asset directly.
    #[error("asset load error: {0}")]
    AssetLoad(String),

    /// Encoding the final mix buffer failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// A persistence commit failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Pipeline state machine misuse (e.g. a second concurrent run).
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, MixcastError>;
