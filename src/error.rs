//! Application error types.

use thiserror::Error;

/// Application-level errors for Graphlens.
#[derive(Error, Debug)]
pub enum AppError {
    // Backend errors
    #[error("Graph source error: {0}")]
    Source(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid graph JSON: {0}")]
    Json(#[from] serde_json::Error),

    // Surface errors
    #[error("Mount point '{0}' is not attached")]
    MountMissing(String),

    #[error("Mount point '{0}' has no layout size")]
    MountNotSized(String),

    #[error("Scene has no elements to render")]
    EmptyScene,

    #[error("Mount point '{0}' already hosts a render surface")]
    SurfaceAlreadyAttached(String),

    #[error("Render surface is not ready")]
    SurfaceNotReady,

    #[error("Layout failed: {0}")]
    Layout(String),

    // Export errors
    #[error("Image encoding failed: {0}")]
    ExportEncode(String),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl AppError {
    /// Short machine-readable code, used in host notices.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Source(_) => "SOURCE_ERROR",
            AppError::ProjectNotFound(_) => "PROJECT_NOT_FOUND",
            AppError::Io(_) => "IO_ERROR",
            AppError::Json(_) => "INVALID_JSON",
            AppError::MountMissing(_) => "MOUNT_MISSING",
            AppError::MountNotSized(_) => "MOUNT_NOT_SIZED",
            AppError::EmptyScene => "EMPTY_SCENE",
            AppError::SurfaceAlreadyAttached(_) => "SURFACE_ATTACHED",
            AppError::SurfaceNotReady => "SURFACE_NOT_READY",
            AppError::Layout(_) => "LAYOUT_ERROR",
            AppError::ExportEncode(_) => "EXPORT_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
        }
    }
}
