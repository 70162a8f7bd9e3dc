//! Storage backend trait.

use async_trait::async_trait;

use crate::Result;
use crate::models::RoadmapDocument;

/// Persistence collaborator for roadmap documents.
///
/// Stores only support whole-document replace: every write carries the
/// complete document for a project, never a delta.
#[async_trait]
pub trait RoadmapStore: Send + Sync {
    /// Replace the stored document for `project_id`.
    async fn persist(&self, project_id: &str, document: &RoadmapDocument) -> Result<()>;

    /// Read the document for `project_id`, normalized.
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) if nothing was
    /// stored for the project.
    async fn load(&self, project_id: &str) -> Result<RoadmapDocument>;

    /// Get the storage location description (for display purposes).
    fn location(&self) -> String;

    /// Get the store type name.
    fn backend_type(&self) -> &'static str;
}
