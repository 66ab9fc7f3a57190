use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for fglue operations.
///
/// Rendering itself is fail-soft: unreadable files become empty content and
/// bad directive arguments become empty substitutions. These variants cover
/// the surface around the engine, such as template acquisition, file
/// selection and output writing.
#[derive(Error, Debug)]
pub enum GlueError {
    /// IO error when reading templates or writing output
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Template file missing or not a regular file
    #[error("Template not found: {}", path.display())]
    TemplateNotFound { path: PathBuf },

    /// Template text resolved to an empty string
    #[error("Template is empty")]
    EmptyTemplate,

    /// Selection resolved to zero files before the merge was invoked
    #[error("No files selected")]
    NoFilesSelected,

    /// Invalid exclude glob pattern
    #[error("Glob error: {0}")]
    Glob(#[from] globset::Error),

    /// Error while expanding a directory input (gitignore-aware walk)
    #[error("Directory traversal error: {0}")]
    Ignore(#[from] ignore::Error),

    /// Error while expanding a directory input (plain walk)
    #[error("Directory traversal error: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// Regex compilation error
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GlueError>;
