//! Story actions that queue mutations.

use tokio::sync::mpsc;

use super::StoryMutation;
use crate::graph::StoryActions;
use crate::models::{StoryPatch, StoryRef};

/// [`StoryActions`] that turn story node interactions into queued
/// [`StoryMutation`]s, consumed in order by
/// [`MutationPipeline::run`](super::MutationPipeline::run).
#[derive(Debug, Clone)]
pub struct ChannelActions {
    tx: mpsc::UnboundedSender<StoryMutation>,
}

impl ChannelActions {
    /// Create the actions and the queue they feed.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StoryMutation>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, mutation: StoryMutation) {
        if self.tx.send(mutation).is_err() {
            tracing::warn!("mutation queue closed, dropping story action");
        }
    }
}

impl StoryActions for ChannelActions {
    fn toggle(&self, story: &StoryRef) {
        self.send(StoryMutation::Toggle {
            story: story.clone(),
        });
    }

    fn update(&self, story: &StoryRef, patch: StoryPatch) {
        self.send(StoryMutation::Edit {
            story: story.clone(),
            patch,
        });
    }

    fn delete(&self, story: &StoryRef) {
        self.send(StoryMutation::Delete {
            story: story.clone(),
        });
    }
}
