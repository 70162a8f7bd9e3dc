//! Data models for Waymark roadmaps.
//!
//! This module defines the core data structures:
//! - `RoadmapDocument` - The full plan for one project, an ordered list of epics
//! - `Epic` - A top-level unit of work with derived status and progress
//! - `Story` - A leaf unit of work with a single completion flag
//! - `StoryKey` / `StoryRef` - The two ways a story can be addressed
//!
//! Documents are immutable snapshots. Epics are held behind `Arc` so a new
//! snapshot can share every epic a mutation did not touch.

pub mod progress;
pub mod validation;

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::{Error, Result};

pub use progress::{EpicProgress, RoadmapSummary, aggregate, completion_percentage};

/// Identifier of an epic. Agents emit either integers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EpicId {
    Number(i64),
    Text(String),
}

impl fmt::Display for EpicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EpicId::Number(n) => write!(f, "{}", n),
            EpicId::Text(s) => write!(f, "{}", s),
        }
    }
}

impl std::str::FromStr for EpicId {
    type Err = Error;

    /// Parses CLI input. Integers become `Number`, anything else `Text`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::Validation("epic id must not be empty".to_string()));
        }
        Ok(match s.parse::<i64>() {
            Ok(n) => EpicId::Number(n),
            Err(_) => EpicId::Text(s.to_string()),
        })
    }
}

impl From<i64> for EpicId {
    fn from(n: i64) -> Self {
        EpicId::Number(n)
    }
}

impl From<&str> for EpicId {
    fn from(s: &str) -> Self {
        EpicId::Text(s.to_string())
    }
}

impl From<String> for EpicId {
    fn from(s: String) -> Self {
        EpicId::Text(s)
    }
}

/// Derived lifecycle status of an epic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EpicStatus {
    #[default]
    Pending,
    #[serde(alias = "in_progress")]
    InProgress,
    Completed,
}

impl EpicStatus {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EpicStatus::Pending => "pending",
            EpicStatus::InProgress => "in-progress",
            EpicStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for EpicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A leaf unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    /// Persistence id, unique within the parent epic. `None` until the story
    /// has been saved at least once.
    #[serde(
        default,
        deserialize_with = "deserialize_opt_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,

    /// Story title
    pub title: String,

    /// Detailed description
    #[serde(default)]
    pub description: String,

    /// Whether the story is done
    #[serde(default)]
    pub completed: bool,

    /// Estimated effort in hours
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
}

impl Story {
    /// Create a new, not yet persisted story.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            description: String::new(),
            completed: false,
            estimated_hours: None,
        }
    }

    /// Set the persistence id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the completion flag.
    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    /// Set the estimated hours.
    pub fn with_estimated_hours(mut self, hours: f64) -> Self {
        self.estimated_hours = Some(hours);
        self
    }
}

/// A top-level unit of planned work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Epic {
    /// Unique identifier within the document, also the epic's graph node id
    pub id: EpicId,

    /// Display text. Older documents call this `name`.
    #[serde(alias = "name")]
    pub title: String,

    /// Detailed description
    #[serde(default)]
    pub description: String,

    /// Tags for categorization
    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// Opaque priority value supplied by the producer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<serde_json::Value>,

    /// Ordered stories. Order is display order and placement index.
    #[serde(default, alias = "subtasks")]
    pub stories: Vec<Story>,

    /// What the user should have after completing this epic
    #[serde(default)]
    pub deliverables: Vec<String>,

    /// Ids of epics that must be completed first
    #[serde(default)]
    pub dependencies: Vec<EpicId>,

    /// High-level strategy steps, usually only on the first epic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overview: Option<Vec<String>>,

    /// How to know the epic is truly complete
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub success_criteria: Vec<String>,

    /// Estimated calendar days
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_days: Option<u32>,

    /// Estimated total work hours
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,

    /// Derived from `stories`; see [`aggregate`]
    #[serde(default)]
    pub status: EpicStatus,

    /// Derived from `stories`; see [`aggregate`]
    #[serde(default)]
    pub completion_percentage: u8,
}

impl Epic {
    /// Create a new epic with no stories.
    pub fn new(id: impl Into<EpicId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            tags: BTreeSet::new(),
            priority: None,
            stories: Vec::new(),
            deliverables: Vec::new(),
            dependencies: Vec::new(),
            overview: None,
            success_criteria: Vec::new(),
            estimated_days: None,
            estimated_hours: None,
            status: EpicStatus::default(),
            completion_percentage: 0,
        }
    }

    /// Replace the story list. Derived fields are not recomputed.
    pub fn with_stories(mut self, stories: Vec<Story>) -> Self {
        self.stories = stories;
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Resolve a story key to a position in `stories`.
    pub fn story_index(&self, key: &StoryKey) -> Option<usize> {
        match key {
            StoryKey::Index(index) => (*index < self.stories.len()).then_some(*index),
            StoryKey::Id(id) => self
                .stories
                .iter()
                .position(|s| s.id.as_deref() == Some(id.as_str())),
        }
    }
}

/// High-level description of the project the roadmap belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectSpecification {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub goals: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tech_stack: Vec<String>,
}

/// The full hierarchical plan for one project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoadmapDocument {
    /// Ordered epics. Order is the sequential order of the plan.
    #[serde(default, alias = "nodes")]
    pub epics: Vec<Arc<Epic>>,

    /// Project the roadmap was generated for
    #[serde(
        default,
        alias = "project_specification",
        skip_serializing_if = "Option::is_none"
    )]
    pub project: Option<ProjectSpecification>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_estimated_weeks: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_estimated_hours: Option<f64>,
}

impl RoadmapDocument {
    /// Create a document from a list of epics.
    pub fn new(epics: Vec<Epic>) -> Self {
        Self {
            epics: epics.into_iter().map(Arc::new).collect(),
            ..Default::default()
        }
    }

    /// Parse a document from JSON.
    ///
    /// Structural problems (e.g. `stories` not being a list) are reported as
    /// validation errors, not JSON errors: the input is well-formed JSON that
    /// does not describe a roadmap.
    pub fn from_json(json: &str) -> Result<Self> {
        let doc: RoadmapDocument =
            serde_json::from_str(json).map_err(|e| Error::Validation(e.to_string()))?;
        Ok(doc)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate and re-aggregate every epic.
    ///
    /// Documents produced by agents or older clients may carry stale derived
    /// fields; this is applied on every read.
    pub fn normalized(&self) -> Result<Self> {
        validation::validate_document(self)?;
        let epics = self
            .epics
            .iter()
            .map(|epic| {
                let aggregated = aggregate(Epic::clone(epic))?;
                if aggregated == **epic {
                    Ok(Arc::clone(epic))
                } else {
                    Ok(Arc::new(aggregated))
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            epics,
            ..self.clone()
        })
    }

    /// Find an epic by id.
    pub fn epic(&self, id: &EpicId) -> Option<&Arc<Epic>> {
        self.epics.iter().find(|e| &e.id == id)
    }

    /// Find the position of an epic by id.
    pub fn epic_index(&self, id: &EpicId) -> Option<usize> {
        self.epics.iter().position(|e| &e.id == id)
    }

    /// Total number of stories across all epics.
    pub fn story_count(&self) -> usize {
        self.epics.iter().map(|e| e.stories.len()).sum()
    }
}

/// Addresses a story within its epic.
///
/// Stories have two identities: their position, which the graph uses for
/// node ids, and their persistence id, which exists only once the story has
/// been saved. Either one can be used to target a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryKey {
    Id(String),
    Index(usize),
}

impl fmt::Display for StoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoryKey::Id(id) => write!(f, "story {}", id),
            StoryKey::Index(index) => write!(f, "story #{}", index),
        }
    }
}

/// A story addressed through its parent epic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoryRef {
    pub epic_id: EpicId,
    pub story: StoryKey,
}

/// Partial update of a story's user-editable fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,

    /// Remove the estimate. Ignored when `estimated_hours` is set.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub clear_hours: bool,
}

impl StoryPatch {
    /// Returns true if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.completed.is_none()
            && self.estimated_hours.is_none()
            && !self.clear_hours
    }

    /// Apply the patch in place.
    pub fn apply_to(&self, story: &mut Story) {
        if let Some(ref title) = self.title {
            story.title = title.clone();
        }
        if let Some(ref description) = self.description {
            story.description = description.clone();
        }
        if let Some(completed) = self.completed {
            story.completed = completed;
        }
        if self.estimated_hours.is_some() {
            story.estimated_hours = self.estimated_hours;
        } else if self.clear_hours {
            story.estimated_hours = None;
        }
    }
}

/// Story ids arrive as strings from most producers, integers from some.
fn deserialize_opt_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match Option::<RawId>::deserialize(deserializer)? {
        Some(RawId::Text(s)) if !s.trim().is_empty() => Some(s),
        Some(RawId::Text(_)) | None => None,
        Some(RawId::Number(n)) => Some(n.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_story_patch_hours() {
        let mut story = Story::new("s").with_estimated_hours(4.0);

        let clear = StoryPatch {
            clear_hours: true,
            ..Default::default()
        };
        assert!(!clear.is_empty());
        clear.apply_to(&mut story);
        assert_eq!(story.estimated_hours, None);

        let set = StoryPatch {
            estimated_hours: Some(2.5),
            clear_hours: true,
            ..Default::default()
        };
        set.apply_to(&mut story);
        assert_eq!(story.estimated_hours, Some(2.5));

        let json = serde_json::to_string(&StoryPatch::default()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn test_epic_status_serialization() {
        let json = serde_json::to_string(&EpicStatus::InProgress).unwrap();
        assert_eq!(json, r#""in-progress""#);

        let legacy: EpicStatus = serde_json::from_str(r#""in_progress""#).unwrap();
        assert_eq!(legacy, EpicStatus::InProgress);
    }

    #[test]
    fn test_epic_id_untagged() {
        let n: EpicId = serde_json::from_str("3").unwrap();
        assert_eq!(n, EpicId::Number(3));
        let s: EpicId = serde_json::from_str(r#""setup""#).unwrap();
        assert_eq!(s, EpicId::Text("setup".to_string()));
        assert_eq!(n.to_string(), "3");
    }

    #[test]
    fn test_epic_id_from_str() {
        assert_eq!("7".parse::<EpicId>().unwrap(), EpicId::Number(7));
        assert_eq!("auth".parse::<EpicId>().unwrap(), EpicId::from("auth"));
        assert!("  ".parse::<EpicId>().is_err());
    }

    #[test]
    fn test_legacy_name_field() {
        let json = r#"{"id": 1, "name": "Setup"}"#;
        let epic: Epic = serde_json::from_str(json).unwrap();
        assert_eq!(epic.title, "Setup");
        assert!(epic.stories.is_empty());
        assert_eq!(epic.status, EpicStatus::Pending);

        let out = serde_json::to_string(&epic).unwrap();
        assert!(out.contains(r#""title":"Setup""#));
        assert!(!out.contains(r#""name""#));
    }

    #[test]
    fn test_legacy_document_fields() {
        let json = r#"{
            "project_specification": {"title": "Todo app", "description": "d"},
            "nodes": [
                {"id": "a", "title": "A", "subtasks": [{"id": 4, "title": "x", "completed": true}]}
            ]
        }"#;
        let doc = RoadmapDocument::from_json(json).unwrap();
        assert_eq!(doc.epics.len(), 1);
        assert_eq!(doc.epics[0].stories[0].id.as_deref(), Some("4"));
        assert_eq!(doc.project.as_ref().unwrap().title, "Todo app");
    }

    #[test]
    fn test_stories_not_a_sequence_is_validation_error() {
        let json = r#"{"epics": [{"id": 1, "title": "A", "stories": "nope"}]}"#;
        let err = RoadmapDocument::from_json(json).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_blank_story_id_is_unsaved() {
        let story: Story = serde_json::from_str(r#"{"id": "", "title": "t"}"#).unwrap();
        assert!(story.id.is_none());
    }

    #[test]
    fn test_story_index_by_key() {
        let epic = Epic::new(1, "E").with_stories(vec![
            Story::new("a").with_id("s-1"),
            Story::new("b"),
        ]);
        assert_eq!(epic.story_index(&StoryKey::Id("s-1".into())), Some(0));
        assert_eq!(epic.story_index(&StoryKey::Index(1)), Some(1));
        assert_eq!(epic.story_index(&StoryKey::Index(2)), None);
        assert_eq!(epic.story_index(&StoryKey::Id("missing".into())), None);
    }

    #[test]
    fn test_normalized_recomputes_stale_fields() {
        let mut epic = Epic::new(1, "E").with_stories(vec![
            Story::new("a").with_completed(true),
            Story::new("b"),
        ]);
        epic.status = EpicStatus::Completed;
        epic.completion_percentage = 100;
        let untouched = Epic::new(2, "Empty");
        let doc = RoadmapDocument::new(vec![epic, untouched]);

        let normalized = doc.normalized().unwrap();
        assert_eq!(normalized.epics[0].completion_percentage, 50);
        assert_eq!(normalized.epics[0].status, EpicStatus::InProgress);
        // Already consistent epics keep their allocation.
        assert!(Arc::ptr_eq(&doc.epics[1], &normalized.epics[1]));
    }

    #[test]
    fn test_story_patch_apply() {
        let mut story = Story::new("old").with_estimated_hours(2.0);
        let patch = StoryPatch {
            title: Some("new".to_string()),
            completed: Some(true),
            ..Default::default()
        };
        assert!(!patch.is_empty());
        patch.apply_to(&mut story);
        assert_eq!(story.title, "new");
        assert!(story.completed);
        assert_eq!(story.estimated_hours, Some(2.0));
        assert!(StoryPatch::default().is_empty());
    }

    #[test]
    fn test_document_roundtrip_preserves_passthrough() {
        let json = r#"{"epics": [{"id": 1, "title": "A", "priority": "high",
            "overview": ["plan", "build"], "deliverables": ["repo"], "dependencies": [0],
            "tags": ["setup", "mvp"], "estimated_days": 3}]}"#;
        let doc = RoadmapDocument::from_json(json).unwrap();
        let out = doc.to_json_pretty().unwrap();
        let back = RoadmapDocument::from_json(&out).unwrap();
        assert_eq!(doc, back);
        assert_eq!(back.epics[0].priority, Some(serde_json::json!("high")));
        assert_eq!(back.epics[0].dependencies, vec![EpicId::Number(0)]);
    }
}
