//! Roadmap graph synthesis.
//!
//! Turns a [`RoadmapDocument`] into the flat node and edge lists a graph
//! canvas renders. Synthesis is pure and all-or-nothing: the same document
//! always yields the same graph, and an invalid document yields no graph.
//!
//! # Node ids
//!
//! - Start node: [`START_NODE_ID`]
//! - Epic node: the epic id, as text
//! - Story node: `{epic node id}-story-{index}`
//!
//! Story node ids are positional so that a story which has not been persisted
//! yet still gets a stable key. Persistence and mutations address stories by
//! their own id instead; see [`StoryKey`](crate::models::StoryKey).
//!
//! # Modules
//!
//! - `layout`: Placement constants and positions
//! - `viewport`: Fit-to-content computation and the debounced fitter

pub mod layout;
pub mod viewport;

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::models::validation::validate_document;
use crate::models::{EpicId, EpicStatus, RoadmapDocument, Story, StoryKey, StoryPatch, StoryRef};
use crate::{Error, Result};

pub use layout::{Handle, LayoutConfig, NodeSize, Position, Side};
pub use viewport::{Bounds, ContainerSize, FitCommand, FitOptions, GraphCanvas, Viewport};

/// Id of the single start node.
pub const START_NODE_ID: &str = "start-node";

/// Label shown on the start node when no project name is given.
pub const DEFAULT_START_LABEL: &str = "Start Your New Project";

/// Story-level actions a rendered story node can request.
///
/// Implemented by the caller (usually by queueing a mutation); the
/// synthesizer only hands the capability through to story payloads.
pub trait StoryActions: Send + Sync {
    fn toggle(&self, story: &StoryRef);
    fn update(&self, story: &StoryRef, patch: StoryPatch);
    fn delete(&self, story: &StoryRef);
}

/// Shared handle to a [`StoryActions`] implementation.
///
/// Two handles are equal when they point at the same implementation, which
/// keeps graph comparison structural for everything else.
#[derive(Clone)]
pub struct StoryActionHandle(Arc<dyn StoryActions>);

impl StoryActionHandle {
    pub fn new(actions: Arc<dyn StoryActions>) -> Self {
        Self(actions)
    }

    pub fn toggle(&self, story: &StoryRef) {
        self.0.toggle(story);
    }

    pub fn update(&self, story: &StoryRef, patch: StoryPatch) {
        self.0.update(story, patch);
    }

    pub fn delete(&self, story: &StoryRef) {
        self.0.delete(story);
    }
}

impl fmt::Debug for StoryActionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StoryActionHandle(..)")
    }
}

impl PartialEq for StoryActionHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Payload of the start node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartData {
    pub label: String,
}

/// Payload of an epic node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpicData {
    pub epic_id: EpicId,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub status: EpicStatus,
    pub completion_percentage: u8,
    /// Stories for the canvas to fan out in detail views
    pub stories: Vec<Story>,
    pub deliverables: Vec<String>,
    pub dependencies: Vec<EpicId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview: Option<Vec<String>>,
    /// Side the epic's stories are laid out on
    pub story_side: Side,
}

/// Payload of a story node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoryData {
    /// Persistence id, if the story has been saved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub story_id: Option<String>,
    /// Position within the parent epic
    pub index: usize,
    pub title: String,
    pub description: String,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
    /// Graph node id of the parent epic
    pub parent_node_id: String,
    pub parent_epic_id: EpicId,
    #[serde(skip)]
    pub actions: Option<StoryActionHandle>,
}

impl StoryData {
    /// Reference used for mutations: the persistence id when present,
    /// otherwise the position.
    pub fn story_ref(&self) -> StoryRef {
        let story = match self.story_id {
            Some(ref id) => StoryKey::Id(id.clone()),
            None => StoryKey::Index(self.index),
        };
        StoryRef {
            epic_id: self.parent_epic_id.clone(),
            story,
        }
    }

    /// Request a completion toggle through the injected actions.
    /// Returns false when no actions were injected.
    pub fn request_toggle(&self) -> bool {
        match self.actions {
            Some(ref actions) => {
                actions.toggle(&self.story_ref());
                true
            }
            None => false,
        }
    }

    /// Request an edit through the injected actions.
    pub fn request_update(&self, patch: StoryPatch) -> bool {
        match self.actions {
            Some(ref actions) => {
                actions.update(&self.story_ref(), patch);
                true
            }
            None => false,
        }
    }

    /// Request deletion through the injected actions.
    pub fn request_delete(&self) -> bool {
        match self.actions {
            Some(ref actions) => {
                actions.delete(&self.story_ref());
                true
            }
            None => false,
        }
    }
}

/// Node kind with its payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum NodeData {
    Start(StartData),
    Epic(EpicData),
    Story(StoryData),
}

/// A positioned graph node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: String,
    pub position: Position,
    pub width: f64,
    pub height: f64,
    #[serde(flatten)]
    pub data: NodeData,
}

impl Node {
    /// Node kind name (`start`, `epic` or `story`)
    pub fn kind(&self) -> &'static str {
        match self.data {
            NodeData::Start(_) => "start",
            NodeData::Epic(_) => "epic",
            NodeData::Story(_) => "story",
        }
    }

    pub fn as_epic(&self) -> Option<&EpicData> {
        match self.data {
            NodeData::Epic(ref data) => Some(data),
            _ => None,
        }
    }

    pub fn as_story(&self) -> Option<&StoryData> {
        match self.data {
            NodeData::Story(ref data) => Some(data),
            _ => None,
        }
    }
}

/// Type of connection between nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Start node to the first epic
    Start,
    /// One epic to the next in plan order
    Sequence,
    /// Epic to one of its stories
    Story,
}

/// A connection between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Edge {
    /// Composite `source->target` id
    pub id: String,
    pub source: String,
    pub target: String,
    pub source_handle: Handle,
    pub target_handle: Handle,
    pub kind: EdgeKind,
}

impl Edge {
    /// Create an edge; the id is derived from its endpoints.
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        source_handle: Handle,
        target_handle: Handle,
        kind: EdgeKind,
    ) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("{}->{}", source, target),
            source,
            target,
            source_handle,
            target_handle,
            kind,
        }
    }
}

/// Nodes and edges ready for a graph canvas
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoadmapGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl RoadmapGraph {
    /// Get a node by id
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Get an edge by id
    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    /// Ids of all nodes, in order
    pub fn node_ids(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.id.clone()).collect()
    }

    /// Bounding box of all nodes, or `None` for an empty graph.
    pub fn bounds(&self) -> Option<Bounds> {
        self.nodes
            .iter()
            .map(|n| Bounds::from_rect(n.position, n.width, n.height))
            .reduce(|a, b| a.union(&b))
    }
}

/// Graph node id for an epic
pub fn epic_node_id(epic_id: &EpicId) -> String {
    epic_id.to_string()
}

/// Graph node id for the story at `index` of the epic with node id `epic_node_id`
pub fn story_node_id(epic_node_id: &str, index: usize) -> String {
    format!("{}-story-{}", epic_node_id, index)
}

/// Maps roadmap documents to positioned graphs
#[derive(Debug, Clone, Default)]
pub struct GraphSynthesizer {
    /// Layout constants
    pub config: LayoutConfig,
    /// Actions injected into every story payload
    pub actions: Option<StoryActionHandle>,
}

impl GraphSynthesizer {
    /// Create a synthesizer with the default layout
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a synthesizer with custom layout constants
    pub fn with_config(config: LayoutConfig) -> Self {
        Self {
            config,
            actions: None,
        }
    }

    /// Inject story actions into synthesized story nodes
    pub fn with_actions(mut self, actions: Arc<dyn StoryActions>) -> Self {
        self.actions = Some(StoryActionHandle::new(actions));
        self
    }

    /// Synthesize the graph for a document.
    ///
    /// Epic status and percentage in the payloads are derived from the
    /// stories, so a document with stale derived fields still renders
    /// consistently.
    pub fn synthesize(&self, document: &RoadmapDocument, project_name: &str) -> Result<RoadmapGraph> {
        validate_document(document)?;

        let config = &self.config;
        let mut graph = RoadmapGraph::default();

        let label = if project_name.trim().is_empty() {
            DEFAULT_START_LABEL.to_string()
        } else {
            project_name.trim().to_string()
        };
        graph.nodes.push(Node {
            id: START_NODE_ID.to_string(),
            position: config.start_position(),
            width: config.start_size.width,
            height: config.start_size.height,
            data: NodeData::Start(StartData { label }),
        });

        let mut previous_epic: Option<String> = None;
        for (i, epic) in document.epics.iter().enumerate() {
            let epic_id = epic_node_id(&epic.id);
            let epic_pos = config.epic_position(i);
            let side = Side::for_epic(i);
            let progress = epic.progress();

            graph.nodes.push(Node {
                id: epic_id.clone(),
                position: epic_pos,
                width: config.epic_size.width,
                height: config.epic_size.height,
                data: NodeData::Epic(EpicData {
                    epic_id: epic.id.clone(),
                    title: epic.title.clone(),
                    description: epic.description.clone(),
                    tags: epic.tags.iter().cloned().collect(),
                    status: progress.status(),
                    completion_percentage: progress.percentage,
                    stories: epic.stories.clone(),
                    deliverables: epic.deliverables.clone(),
                    dependencies: epic.dependencies.clone(),
                    overview: epic.overview.clone(),
                    story_side: side,
                }),
            });

            match previous_epic {
                None => graph.edges.push(Edge::new(
                    START_NODE_ID,
                    epic_id.clone(),
                    Handle::Bottom,
                    Handle::Top,
                    EdgeKind::Start,
                )),
                Some(ref prev) => graph.edges.push(Edge::new(
                    prev.clone(),
                    epic_id.clone(),
                    Handle::Bottom,
                    Handle::Top,
                    EdgeKind::Sequence,
                )),
            }

            let count = epic.stories.len();
            for (j, story) in epic.stories.iter().enumerate() {
                let story_id = story_node_id(&epic_id, j);
                graph.nodes.push(Node {
                    id: story_id.clone(),
                    position: config.story_position(epic_pos.y, side, count, j),
                    width: config.story_size.width,
                    height: config.story_size.height,
                    data: NodeData::Story(StoryData {
                        story_id: story.id.clone(),
                        index: j,
                        title: story.title.clone(),
                        description: story.description.clone(),
                        completed: story.completed,
                        estimated_hours: story.estimated_hours,
                        parent_node_id: epic_id.clone(),
                        parent_epic_id: epic.id.clone(),
                        actions: self.actions.clone(),
                    }),
                });
                graph.edges.push(Edge::new(
                    epic_id.clone(),
                    story_id,
                    side.epic_handle(),
                    side.story_handle(),
                    EdgeKind::Story,
                ));
            }

            previous_epic = Some(epic_id);
        }

        check_unique_node_ids(&graph)?;
        tracing::debug!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "synthesized roadmap graph"
        );
        Ok(graph)
    }
}

/// Synthesize with the default layout and no story actions.
pub fn synthesize(document: &RoadmapDocument, project_name: &str) -> Result<RoadmapGraph> {
    GraphSynthesizer::new().synthesize(document, project_name)
}

/// Epic ids such as `"1-story-0"` or `"start-node"` can collide with
/// generated ids; such documents cannot be rendered.
fn check_unique_node_ids(graph: &RoadmapGraph) -> Result<()> {
    let mut seen = HashSet::new();
    for node in &graph.nodes {
        if !seen.insert(node.id.as_str()) {
            return Err(Error::Validation(format!(
                "graph node id '{}' is produced more than once",
                node.id
            )));
        }
    }
    Ok(())
}
