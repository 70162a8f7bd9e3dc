//! Story mutations with optimistic apply and rollback.
//!
//! A mutation moves through `Idle -> Applying -> Committed | RolledBack`:
//!
//! 1. It is applied to the local document right away: the touched epic is
//!    re-aggregated and the graph re-synthesized.
//! 2. The whole updated document is persisted through a [`RoadmapStore`].
//! 3. On success the mutation is committed. On failure the mutation is taken
//!    out of the local document, newer in-flight mutations are replayed on the
//!    snapshot from before it, and the error is reported with enough context
//!    to explain the rollback. Nothing is retried.
//!
//! Application is serialized through one [`RoadmapSession`] per document, so
//! every mutation is computed against the latest local snapshot. Writes are
//! serialized through a gate and always send the session's current document,
//! read after the gate is taken, so a rolled-back change is never stored.

pub mod actions;
pub mod session;

pub use actions::ChannelActions;
pub use session::{MutationOutcome, Rollback, RoadmapSession};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

use crate::models::{Epic, EpicId, RoadmapDocument, Story, StoryKey, StoryPatch, StoryRef, aggregate};
use crate::storage::RoadmapStore;
use crate::{Error, Result};

/// A user-level change to one story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StoryMutation {
    /// Flip the completion flag
    Toggle { story: StoryRef },
    /// Append a story to an epic
    Add { epic_id: EpicId, story: Story },
    /// Change user-editable fields
    Edit { story: StoryRef, patch: StoryPatch },
    /// Remove a story
    Delete { story: StoryRef },
}

impl StoryMutation {
    /// What the mutation touches, for error reporting and rollback.
    pub fn target(&self) -> MutationTarget {
        match self {
            StoryMutation::Toggle { story }
            | StoryMutation::Edit { story, .. }
            | StoryMutation::Delete { story } => MutationTarget {
                epic_id: story.epic_id.clone(),
                story: Some(story.story.clone()),
            },
            StoryMutation::Add { epic_id, story } => MutationTarget {
                epic_id: epic_id.clone(),
                story: story.id.clone().map(StoryKey::Id),
            },
        }
    }

    /// Operation name
    pub fn op(&self) -> &'static str {
        match self {
            StoryMutation::Toggle { .. } => "toggle",
            StoryMutation::Add { .. } => "add",
            StoryMutation::Edit { .. } => "edit",
            StoryMutation::Delete { .. } => "delete",
        }
    }
}

/// The epic, and story if known, a mutation applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MutationTarget {
    pub epic_id: EpicId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub story: Option<StoryKey>,
}

impl fmt::Display for MutationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.story {
            Some(ref story) => write!(f, "epic {}, {}", self.epic_id, story),
            None => write!(f, "epic {}", self.epic_id),
        }
    }
}

/// Lifecycle state of one mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationState {
    /// Not applied yet
    Idle,
    /// Applied locally, persistence pending
    Applying,
    Committed,
    RolledBack,
}

impl fmt::Display for MutationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MutationState::Idle => "idle",
            MutationState::Applying => "applying",
            MutationState::Committed => "committed",
            MutationState::RolledBack => "rolled_back",
        };
        write!(f, "{}", s)
    }
}

/// Apply a mutation to a document, producing the next snapshot.
///
/// Only the touched epic is rebuilt and re-aggregated; every other epic is
/// shared with `document`. Fails with [`Error::NotFound`] for an unknown
/// epic or story and [`Error::Validation`] if the result would be invalid.
pub fn apply_mutation(document: &RoadmapDocument, mutation: &StoryMutation) -> Result<RoadmapDocument> {
    let epic_id = match mutation {
        StoryMutation::Toggle { story }
        | StoryMutation::Edit { story, .. }
        | StoryMutation::Delete { story } => &story.epic_id,
        StoryMutation::Add { epic_id, .. } => epic_id,
    };
    let index = document
        .epic_index(epic_id)
        .ok_or_else(|| Error::NotFound(format!("epic {}", epic_id)))?;

    let mut epic = (*document.epics[index]).clone();
    let locate = |key: &StoryKey, epic: &Epic| {
        epic.story_index(key)
            .ok_or_else(|| Error::NotFound(format!("{} in epic {}", key, epic_id)))
    };

    match mutation {
        StoryMutation::Toggle { story } => {
            let i = locate(&story.story, &epic)?;
            epic.stories[i].completed = !epic.stories[i].completed;
        }
        StoryMutation::Add { story, .. } => {
            epic.stories.push(story.clone());
        }
        StoryMutation::Edit { story, patch } => {
            if patch.is_empty() {
                return Err(Error::Validation(format!(
                    "edit of {} in epic {} changes nothing",
                    story.story, epic_id
                )));
            }
            let i = locate(&story.story, &epic)?;
            patch.apply_to(&mut epic.stories[i]);
        }
        StoryMutation::Delete { story } => {
            let i = locate(&story.story, &epic)?;
            epic.stories.remove(i);
        }
    }

    let mut epics = document.epics.clone();
    epics[index] = Arc::new(aggregate(epic)?);
    Ok(RoadmapDocument {
        epics,
        ..document.clone()
    })
}

/// Runs mutations for one project: apply under the session lock, persist
/// outside it, then resolve.
pub struct MutationPipeline<S: RoadmapStore + ?Sized> {
    session: Arc<Mutex<RoadmapSession>>,
    store: Arc<S>,
    /// Write gate: revision of the last document that reached the store
    written: Mutex<u64>,
}

impl<S: RoadmapStore + ?Sized> MutationPipeline<S> {
    pub fn new(session: RoadmapSession, store: Arc<S>) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            store,
            written: Mutex::new(0),
        }
    }

    /// Shared handle to the session, for readers.
    pub fn session(&self) -> Arc<Mutex<RoadmapSession>> {
        Arc::clone(&self.session)
    }

    /// Apply, persist and resolve one mutation.
    ///
    /// Returns `Err` only when the mutation could not be applied at all
    /// (unknown story, invalid result); the local document is unchanged in
    /// that case. Persistence failures come back as
    /// [`MutationOutcome::RolledBack`].
    pub async fn submit(&self, mutation: StoryMutation) -> Result<MutationOutcome> {
        let seq = self.session.lock().await.apply(&mutation)?;

        // Held until the mutation resolves, so a rolled-back change is out of
        // the local document before the next write reads it.
        let mut written = self.written.lock().await;
        let (project_id, revision, document) = {
            let mut session = self.session.lock().await;
            if let Some(outcome) = session.take_dropped(seq) {
                return Ok(outcome);
            }
            (
                session.project_id().to_string(),
                session.revision(),
                session.document().clone(),
            )
        };

        let result = if *written >= revision {
            // The stored document already includes this change.
            tracing::debug!(seq, revision, "skipping superseded write");
            Ok(false)
        } else {
            tracing::debug!(
                seq,
                revision,
                project = %project_id,
                store = self.store.backend_type(),
                location = %self.store.location(),
                "persisting roadmap"
            );
            self.store.persist(&project_id, &document).await.map(|()| {
                *written = revision;
                true
            })
        };

        let mut session = self.session.lock().await;
        match result {
            Ok(stored) => {
                if stored {
                    session.mark_stored(revision, document);
                }
                session.commit(seq)
            }
            Err(e) => session.rollback(seq, e),
        }
    }

    /// Process queued mutations in order until the queue closes, sending
    /// each result to `outcomes` if given.
    pub async fn run(
        &self,
        mut queue: mpsc::UnboundedReceiver<StoryMutation>,
        outcomes: Option<mpsc::UnboundedSender<Result<MutationOutcome>>>,
    ) {
        while let Some(mutation) = queue.recv().await {
            let op = mutation.op();
            let result = self.submit(mutation).await;
            if let Err(ref e) = result {
                tracing::warn!(op, "mutation rejected: {}", e);
            }
            if let Some(ref tx) = outcomes {
                if tx.send(result).is_err() {
                    tracing::debug!("outcome receiver dropped");
                }
            }
        }
    }
}
