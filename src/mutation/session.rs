//! Per-document mutation state.
//!
//! [`RoadmapSession`] is the single writer of a project's local document. It
//! numbers every applied mutation and keeps it, with the snapshot it was
//! applied on top of, until the store accepts or rejects it.

use std::collections::{BTreeMap, VecDeque};

use super::{MutationState, MutationTarget, StoryMutation, apply_mutation};
use crate::graph::{GraphSynthesizer, RoadmapGraph};
use crate::models::RoadmapDocument;
use crate::{Error, Result};

/// How many resolved mutations keep a queryable state.
const RECENT_STATES: usize = 32;

/// A mutation applied locally whose persistence has not resolved.
#[derive(Debug, Clone)]
struct InFlight {
    mutation: StoryMutation,
    target: MutationTarget,
    /// Snapshot this mutation is currently applied on top of
    previous: RoadmapDocument,
    previous_graph: RoadmapGraph,
}

/// Details of a rolled-back mutation.
#[derive(Debug)]
pub struct Rollback {
    pub seq: u64,
    pub target: MutationTarget,
    /// Document as it was before the mutation
    pub previous: RoadmapDocument,
    /// Always [`Error::Persistence`]
    pub error: Error,
}

/// How a mutation resolved
#[derive(Debug)]
pub enum MutationOutcome {
    Committed { seq: u64, target: MutationTarget },
    RolledBack(Rollback),
}

impl MutationOutcome {
    pub fn seq(&self) -> u64 {
        match self {
            MutationOutcome::Committed { seq, .. } => *seq,
            MutationOutcome::RolledBack(rollback) => rollback.seq,
        }
    }

    pub fn target(&self) -> &MutationTarget {
        match self {
            MutationOutcome::Committed { target, .. } => target,
            MutationOutcome::RolledBack(rollback) => &rollback.target,
        }
    }

    pub fn state(&self) -> MutationState {
        match self {
            MutationOutcome::Committed { .. } => MutationState::Committed,
            MutationOutcome::RolledBack(_) => MutationState::RolledBack,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, MutationOutcome::Committed { .. })
    }
}

/// Local roadmap state for one project.
///
/// The local document is always the last stored snapshot with every
/// in-flight mutation replayed on top, in sequence order. When a mutation
/// fails, it is taken out and the newer ones are replayed without it.
#[derive(Debug)]
pub struct RoadmapSession {
    project_id: String,
    project_name: String,
    synthesizer: GraphSynthesizer,
    document: RoadmapDocument,
    graph: RoadmapGraph,
    /// Bumped on every change to `document`
    revision: u64,
    /// Last snapshot confirmed by the store
    committed: RoadmapDocument,
    committed_revision: u64,
    last_seq: u64,
    in_flight: BTreeMap<u64, InFlight>,
    /// Newer mutations that no longer applied once an older one rolled back
    dropped: BTreeMap<u64, Rollback>,
    recent: VecDeque<(u64, MutationState)>,
}

impl RoadmapSession {
    /// Start a session from a stored document, which counts as committed.
    ///
    /// The document is normalized first; an invalid document is rejected.
    pub fn new(
        project_id: impl Into<String>,
        project_name: impl Into<String>,
        document: RoadmapDocument,
        synthesizer: GraphSynthesizer,
    ) -> Result<Self> {
        let project_name = project_name.into();
        let document = document.normalized()?;
        let graph = synthesizer.synthesize(&document, &project_name)?;
        Ok(Self {
            project_id: project_id.into(),
            project_name,
            synthesizer,
            committed: document.clone(),
            document,
            graph,
            revision: 0,
            committed_revision: 0,
            last_seq: 0,
            in_flight: BTreeMap::new(),
            dropped: BTreeMap::new(),
            recent: VecDeque::with_capacity(RECENT_STATES),
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// Current local document, including optimistic mutations
    pub fn document(&self) -> &RoadmapDocument {
        &self.document
    }

    /// Graph of the current local document
    pub fn graph(&self) -> &RoadmapGraph {
        &self.graph
    }

    /// Revision of the current local document
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Last document the store confirmed
    pub fn committed(&self) -> &RoadmapDocument {
        &self.committed
    }

    pub fn committed_revision(&self) -> u64 {
        self.committed_revision
    }

    /// Number of mutations still waiting on the store
    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }

    /// State of mutation `seq`.
    ///
    /// Unissued sequence numbers are `Idle`. Only the most recent resolved
    /// mutations are remembered; older ones give `None`.
    pub fn state(&self, seq: u64) -> Option<MutationState> {
        if seq > self.last_seq {
            return Some(MutationState::Idle);
        }
        if self.in_flight.contains_key(&seq) || self.dropped.contains_key(&seq) {
            return Some(MutationState::Applying);
        }
        self.recent
            .iter()
            .find(|(s, _)| *s == seq)
            .map(|(_, state)| *state)
    }

    /// Replace the whole document, e.g. after an agent regenerated it.
    ///
    /// Fails closed: if the document is invalid the session keeps its last
    /// good document and graph. Not allowed while mutations are in flight.
    pub fn replace_document(&mut self, document: RoadmapDocument) -> Result<&RoadmapGraph> {
        let unresolved = self.in_flight.len() + self.dropped.len();
        if unresolved > 0 {
            return Err(Error::Other(format!(
                "cannot replace roadmap with {} mutation(s) in flight",
                unresolved
            )));
        }
        let document = document.normalized()?;
        let graph = self.synthesizer.synthesize(&document, &self.project_name)?;
        self.revision += 1;
        self.document = document.clone();
        self.committed = document;
        self.committed_revision = self.revision;
        self.graph = graph;
        Ok(&self.graph)
    }

    /// Apply a mutation optimistically and return its sequence number.
    ///
    /// On error nothing changes.
    pub fn apply(&mut self, mutation: &StoryMutation) -> Result<u64> {
        let (document, graph) = self.advance(&self.document, mutation)?;

        self.last_seq += 1;
        let seq = self.last_seq;
        let target = mutation.target();
        tracing::debug!(seq, op = mutation.op(), target = %target, "applied mutation");

        let previous = std::mem::replace(&mut self.document, document);
        let previous_graph = std::mem::replace(&mut self.graph, graph);
        self.revision += 1;
        self.in_flight.insert(
            seq,
            InFlight {
                mutation: mutation.clone(),
                target,
                previous,
                previous_graph,
            },
        );
        Ok(seq)
    }

    /// Record that the store now holds `document` at `revision`.
    ///
    /// Never moves the committed snapshot backwards.
    pub fn mark_stored(&mut self, revision: u64, document: RoadmapDocument) {
        if revision > self.committed_revision {
            self.committed = document;
            self.committed_revision = revision;
        }
    }

    /// Record that mutation `seq` reached the store.
    pub fn commit(&mut self, seq: u64) -> Result<MutationOutcome> {
        let entry = self
            .in_flight
            .remove(&seq)
            .ok_or_else(|| Error::NotFound(format!("mutation #{} is not in flight", seq)))?;
        self.remember(seq, MutationState::Committed);
        tracing::info!(seq, target = %entry.target, "mutation committed");

        Ok(MutationOutcome::Committed {
            seq,
            target: entry.target,
        })
    }

    /// Record that persisting mutation `seq` failed with `cause`.
    ///
    /// The mutation is taken out of the local document: newer in-flight
    /// mutations are replayed on the snapshot it was applied to. A newer
    /// mutation that no longer applies is dropped and rolled back when its
    /// own turn to write comes.
    pub fn rollback(&mut self, seq: u64, cause: Error) -> Result<MutationOutcome> {
        let entry = self
            .in_flight
            .remove(&seq)
            .ok_or_else(|| Error::NotFound(format!("mutation #{} is not in flight", seq)))?;
        let error = self.persistence_error(&entry.target, cause.to_string());
        tracing::warn!(seq, "{}", error);

        self.replay_from(seq, entry.previous.clone(), entry.previous_graph);
        self.remember(seq, MutationState::RolledBack);

        Ok(MutationOutcome::RolledBack(Rollback {
            seq,
            target: entry.target,
            previous: entry.previous,
            error,
        }))
    }

    /// Resolve mutation `seq` if it was dropped while replaying.
    pub fn take_dropped(&mut self, seq: u64) -> Option<MutationOutcome> {
        let rollback = self.dropped.remove(&seq)?;
        self.remember(seq, MutationState::RolledBack);
        Some(MutationOutcome::RolledBack(rollback))
    }

    fn advance(
        &self,
        document: &RoadmapDocument,
        mutation: &StoryMutation,
    ) -> Result<(RoadmapDocument, RoadmapGraph)> {
        let document = apply_mutation(document, mutation)?;
        let graph = self.synthesizer.synthesize(&document, &self.project_name)?;
        Ok((document, graph))
    }

    /// Rebuild the local document from `base` plus every in-flight mutation
    /// newer than `after`.
    fn replay_from(&mut self, after: u64, base: RoadmapDocument, base_graph: RoadmapGraph) {
        let mut document = base;
        let mut graph = base_graph;
        let newer: Vec<u64> = self.in_flight.range(after + 1..).map(|(s, _)| *s).collect();

        for seq in newer {
            let Some(mut entry) = self.in_flight.remove(&seq) else {
                continue;
            };
            match self.advance(&document, &entry.mutation) {
                Ok((next, next_graph)) => {
                    entry.previous = std::mem::replace(&mut document, next);
                    entry.previous_graph = std::mem::replace(&mut graph, next_graph);
                    self.in_flight.insert(seq, entry);
                }
                Err(e) => {
                    let error = self.persistence_error(
                        &entry.target,
                        format!("no longer applies after mutation #{} rolled back: {}", after, e),
                    );
                    tracing::warn!(seq, "{}", error);
                    self.dropped.insert(
                        seq,
                        Rollback {
                            seq,
                            target: entry.target,
                            previous: document.clone(),
                            error,
                        },
                    );
                }
            }
        }

        self.document = document;
        self.graph = graph;
        self.revision += 1;
    }

    fn persistence_error(&self, target: &MutationTarget, message: String) -> Error {
        Error::Persistence {
            project_id: self.project_id.clone(),
            target: target.clone(),
            message,
        }
    }

    fn remember(&mut self, seq: u64, state: MutationState) {
        if self.recent.len() == RECENT_STATES {
            self.recent.pop_front();
        }
        self.recent.push_back((seq, state));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Epic, EpicId, EpicStatus, Story, StoryKey, StoryRef};

    fn session() -> RoadmapSession {
        let doc = RoadmapDocument::new(vec![
            Epic::new(1, "One").with_stories(vec![
                Story::new("a").with_id("a").with_completed(true),
                Story::new("b").with_id("b"),
                Story::new("c").with_id("c"),
            ]),
            Epic::new(2, "Two").with_stories(vec![Story::new("solo").with_id("solo")]),
        ]);
        RoadmapSession::new("p", "Project", doc, GraphSynthesizer::new()).unwrap()
    }

    fn toggle(epic: i64, id: &str) -> StoryMutation {
        StoryMutation::Toggle {
            story: StoryRef {
                epic_id: EpicId::Number(epic),
                story: StoryKey::Id(id.to_string()),
            },
        }
    }

    fn failure() -> Error {
        Error::Other("offline".to_string())
    }

    #[test]
    fn test_new_normalizes() {
        let session = session();
        assert_eq!(session.document().epics[0].completion_percentage, 33);
        assert_eq!(session.graph().nodes.len(), 1 + 2 + 4);
        assert_eq!(session.revision(), 0);
    }

    #[test]
    fn test_apply_then_commit() {
        let mut session = session();
        let seq = session.apply(&toggle(1, "b")).unwrap();
        assert_eq!(session.state(seq), Some(MutationState::Applying));
        assert_eq!(session.document().epics[0].completion_percentage, 67);
        assert_eq!(session.committed().epics[0].completion_percentage, 33);
        assert_eq!(session.pending(), 1);

        session.mark_stored(session.revision(), session.document().clone());
        let outcome = session.commit(seq).unwrap();
        assert!(outcome.is_committed());
        assert_eq!(session.state(seq), Some(MutationState::Committed));
        assert_eq!(session.committed().epics[0].completion_percentage, 67);
        assert_eq!(session.pending(), 0);
    }

    #[test]
    fn test_rollback_restores_previous_snapshot() {
        let mut session = session();
        let before = session.document().clone();
        let graph_before = session.graph().clone();

        let seq = session.apply(&toggle(2, "solo")).unwrap();
        assert_eq!(session.document().epics[1].status, EpicStatus::Completed);

        let outcome = session.rollback(seq, failure()).unwrap();
        let MutationOutcome::RolledBack(rollback) = outcome else {
            panic!("expected rollback");
        };
        assert_eq!(rollback.previous, before);
        assert!(matches!(rollback.error, Error::Persistence { .. }));
        assert!(rollback.error.to_string().contains("epic 2, story solo"));
        assert_eq!(session.document(), &before);
        assert_eq!(session.graph(), &graph_before);
        assert_eq!(session.state(seq), Some(MutationState::RolledBack));
    }

    #[test]
    fn test_failed_apply_changes_nothing() {
        let mut session = session();
        let before = session.document().clone();
        assert!(session.apply(&toggle(1, "missing")).is_err());
        assert_eq!(session.document(), &before);
        assert_eq!(session.revision(), 0);
        assert_eq!(session.state(1), Some(MutationState::Idle));
    }

    #[test]
    fn test_mutations_build_on_latest_snapshot() {
        let mut session = session();
        session.apply(&toggle(1, "b")).unwrap();
        session.apply(&toggle(1, "c")).unwrap();
        // Both changes are in the same epic snapshot.
        assert_eq!(session.document().epics[0].completion_percentage, 100);
        assert_eq!(session.document().epics[0].status, EpicStatus::Completed);
    }

    #[test]
    fn test_stale_store_confirmation_does_not_regress_committed() {
        let mut session = session();
        session.apply(&toggle(1, "b")).unwrap();
        let older = (session.revision(), session.document().clone());
        session.apply(&toggle(1, "c")).unwrap();

        session.mark_stored(session.revision(), session.document().clone());
        session.mark_stored(older.0, older.1);
        assert_eq!(session.committed_revision(), 2);
        assert_eq!(session.committed().epics[0].completion_percentage, 100);
    }

    #[test]
    fn test_older_failure_is_replayed_out() {
        let mut session = session();
        let first = session.apply(&toggle(1, "b")).unwrap();
        let second = session.apply(&toggle(1, "c")).unwrap();

        let outcome = session.rollback(first, failure()).unwrap();
        assert_eq!(outcome.state(), MutationState::RolledBack);

        // Only the second toggle survives, locally and in the graph.
        let stories = &session.document().epics[0].stories;
        assert!(!stories[1].completed);
        assert!(stories[2].completed);
        assert_eq!(session.document().epics[0].completion_percentage, 67);
        let node = session.graph().node("1-story-1").unwrap().as_story().unwrap();
        assert!(!node.completed);
        assert_eq!(session.state(second), Some(MutationState::Applying));

        // Rolling the second back too lands on the original document.
        session.rollback(second, failure()).unwrap();
        assert_eq!(session.document().epics[0].completion_percentage, 33);
        assert_eq!(session.pending(), 0);
    }

    #[test]
    fn test_dependent_mutation_is_dropped() {
        let mut session = session();
        let before = session.document().clone();
        let add = session
            .apply(&StoryMutation::Add {
                epic_id: EpicId::Number(2),
                story: Story::new("new").with_id("new"),
            })
            .unwrap();
        let edit = session.apply(&toggle(2, "new")).unwrap();

        session.rollback(add, failure()).unwrap();
        assert_eq!(session.document(), &before);
        assert_eq!(session.pending(), 0);
        assert_eq!(session.state(edit), Some(MutationState::Applying));

        let outcome = session.take_dropped(edit).unwrap();
        let MutationOutcome::RolledBack(rollback) = outcome else {
            panic!("expected rollback");
        };
        assert!(rollback.error.to_string().contains("no longer applies"));
        assert_eq!(session.state(edit), Some(MutationState::RolledBack));
        assert!(session.take_dropped(edit).is_none());
    }

    #[test]
    fn test_failure_chain_unwinds_to_last_good() {
        let mut session = session();
        let before = session.document().clone();
        let first = session.apply(&toggle(1, "b")).unwrap();
        let second = session.apply(&toggle(1, "c")).unwrap();

        session.rollback(second, failure()).unwrap();
        session.rollback(first, failure()).unwrap();
        assert_eq!(session.document(), &before);
        assert_eq!(session.pending(), 0);
    }

    #[test]
    fn test_newest_failure_restores_to_pending_older() {
        let mut session = session();
        let first = session.apply(&toggle(1, "b")).unwrap();
        let after_first = session.document().clone();
        let second = session.apply(&toggle(1, "c")).unwrap();

        session.rollback(second, failure()).unwrap();
        assert_eq!(session.document(), &after_first);
        assert_eq!(session.pending(), 1);
        session.mark_stored(session.revision(), session.document().clone());
        session.commit(first).unwrap();
        assert_eq!(session.committed(), &after_first);
    }

    #[test]
    fn test_resolved_states_are_bounded() {
        let mut session = session();
        let first = session.apply(&toggle(1, "b")).unwrap();
        session.commit(first).unwrap();
        for _ in 0..RECENT_STATES {
            let seq = session.apply(&toggle(1, "b")).unwrap();
            session.commit(seq).unwrap();
        }
        assert_eq!(session.state(first), None);
        assert_eq!(session.state(session.last_seq), Some(MutationState::Committed));
        assert_eq!(session.recent.len(), RECENT_STATES);
    }

    #[test]
    fn test_resolving_twice_is_an_error() {
        let mut session = session();
        let seq = session.apply(&toggle(1, "b")).unwrap();
        session.commit(seq).unwrap();
        assert!(session.commit(seq).is_err());
        assert!(session.rollback(seq, failure()).is_err());
    }

    #[test]
    fn test_replace_document_fails_closed() {
        let mut session = session();
        let before = session.graph().clone();
        let invalid = RoadmapDocument::new(vec![Epic::new(1, "A"), Epic::new(1, "B")]);
        assert!(session.replace_document(invalid).is_err());
        assert_eq!(session.graph(), &before);

        let next = RoadmapDocument::new(vec![Epic::new(5, "Fresh")]);
        let graph = session.replace_document(next).unwrap();
        assert_eq!(graph.nodes.len(), 2);
    }

    #[test]
    fn test_replace_document_rejected_while_in_flight() {
        let mut session = session();
        session.apply(&toggle(1, "b")).unwrap();
        assert!(session.replace_document(RoadmapDocument::default()).is_err());
    }
}
