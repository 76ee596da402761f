//! Error types for the climate-tiles pipeline.

use serde::Serialize;
use thiserror::Error;

/// Result type alias using PipelineError.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Primary error type for pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    // === Data Errors ===
    #[error("Grid/mask shape mismatch: grid is {grid_rows}x{grid_cols}, mask is {mask_rows}x{mask_cols}")]
    DataShape {
        grid_rows: usize,
        grid_cols: usize,
        mask_rows: usize,
        mask_cols: usize,
    },

    #[error("Malformed grid data: {0}")]
    GridParse(String),

    // === External Tool Errors ===
    #[error("Tile archive build failed: {0}")]
    Build(String),

    #[error("Tile extraction failed: {0}")]
    Extract(String),

    // === Storage Errors ===
    #[error("Object store transport error: {0}")]
    Transport(String),

    // === Configuration Errors ===
    #[error("Invalid configuration: {0}")]
    Config(String),

    // === Ambient Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Stable classification of pipeline errors, reported in run summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// Grid/mask dimension disagreement or malformed grid data
    DataShape,
    /// External tile renderer failure
    Build,
    /// External tile extractor failure
    Extract,
    /// Upload/network/auth failure
    Transport,
    /// Invalid date range or missing required parameter (fatal to the run)
    Config,
    /// Local file failure (tiles weren't built, as opposed to not published)
    LocalFile,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::DataShape => "DataShapeError",
            ErrorKind::Build => "BuildError",
            ErrorKind::Extract => "ExtractError",
            ErrorKind::Transport => "TransportError",
            ErrorKind::Config => "ConfigError",
            ErrorKind::LocalFile => "LocalFileError",
        };
        write!(f, "{}", s)
    }
}

impl PipelineError {
    /// Classify this error for operator-facing reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::DataShape { .. } | PipelineError::GridParse(_) => ErrorKind::DataShape,
            PipelineError::Build(_) => ErrorKind::Build,
            PipelineError::Extract(_) => ErrorKind::Extract,
            PipelineError::Transport(_) => ErrorKind::Transport,
            PipelineError::Config(_) => ErrorKind::Config,
            PipelineError::Io(_) | PipelineError::Json(_) => ErrorKind::LocalFile,
        }
    }

    /// Whether this error aborts the whole run rather than one Layer.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::Config(_))
    }
}
