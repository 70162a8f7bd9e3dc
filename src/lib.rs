//! Waymark - roadmap graph model.
//!
//! This library turns a hierarchical project roadmap (epics containing
//! stories) into a positioned node graph, keeps each epic's derived progress
//! fields consistent as stories change, and fits the rendered graph into its
//! viewport.

pub mod cli;
pub mod commands;
pub mod config;
pub mod graph;
pub mod models;
pub mod mutation;
pub mod storage;

use mutation::MutationTarget;

/// Library-level error type for Waymark operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed roadmap input. Never recovered automatically.
    #[error("Invalid roadmap: {0}")]
    Validation(String),

    /// The storage collaborator rejected or failed to apply a write.
    #[error("Failed to persist roadmap for project {project_id} ({target}): {message}")]
    Persistence {
        project_id: String,
        target: MutationTarget,
        message: String,
    },

    /// A fit was requested before the container had a measurable area.
    #[error("Layout not ready: {0}")]
    LayoutPrecondition(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Returns true for errors the caller should defer silently instead of
    /// surfacing to the user.
    pub fn is_benign(&self) -> bool {
        matches!(self, Error::LayoutPrecondition(_))
    }
}

/// Result type alias for Waymark operations.
pub type Result<T> = std::result::Result<T, Error>;
