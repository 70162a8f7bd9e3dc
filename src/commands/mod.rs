//! Command implementations for the Waymark CLI.
//!
//! Each command returns a result type implementing [`Output`], printed as
//! JSON by default or as text with `-H`.

use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::ResolvedConfig;
use crate::graph::viewport::compute_fit;
use crate::graph::{Bounds, ContainerSize, GraphSynthesizer, NodeData, RoadmapGraph, Viewport};
use crate::models::{EpicStatus, RoadmapDocument, RoadmapSummary};
use crate::mutation::{MutationOutcome, MutationPipeline, MutationState, RoadmapSession, StoryMutation};
use crate::storage::{FileStore, RoadmapStore};
use crate::{Error, Result};

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

fn json_or_error<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
}

/// Where a roadmap lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoadmapSource {
    /// A JSON file; its stem is the project id and its directory the store.
    File(PathBuf),
    /// A project in the configured store.
    Project(String),
}

impl RoadmapSource {
    /// Build from the CLI pair; clap guarantees exactly one is set.
    pub fn from_args(file: Option<PathBuf>, project: Option<String>) -> Result<Self> {
        match (file, project) {
            (Some(path), None) => Ok(Self::File(path)),
            (None, Some(id)) => Ok(Self::Project(id)),
            _ => Err(Error::Other(
                "exactly one of <FILE> or --project is required".to_string(),
            )),
        }
    }

    /// Project id and the file store holding it.
    pub fn store(&self, config: &ResolvedConfig) -> Result<(String, FileStore)> {
        match self {
            Self::Project(id) => Ok((id.clone(), FileStore::new(&config.store_dir.value))),
            Self::File(path) => {
                let stem = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .ok_or_else(|| Error::Validation(format!("invalid file name {}", path.display())))?;
                let dir = match path.parent() {
                    Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
                    _ => PathBuf::from("."),
                };
                let store = FileStore::new(dir);
                if store.path_for(stem)?.file_name() != path.file_name() {
                    return Err(Error::Validation(format!(
                        "{} must be named <project>.json to be written through the store",
                        path.display()
                    )));
                }
                Ok((stem.to_string(), store))
            }
        }
    }

    /// Read the document as stored, without normalizing it.
    pub async fn read(&self, config: &ResolvedConfig) -> Result<RoadmapDocument> {
        match self {
            Self::File(path) => read_file(path).await,
            Self::Project(_) => {
                let (id, store) = self.store(config)?;
                read_file(&store.path_for(&id)?).await
            }
        }
    }
}

async fn read_file(path: &Path) -> Result<RoadmapDocument> {
    let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(format!("roadmap file {}", path.display()))
        } else {
            Error::Io(e)
        }
    })?;
    RoadmapDocument::from_json(&contents)
}

fn project_label(document: &RoadmapDocument, explicit: Option<&str>) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| document.project.as_ref().map(|p| p.title.clone()))
        .unwrap_or_default()
}

// === Graph ===

#[derive(Debug, Serialize)]
pub struct GraphResult {
    pub node_count: usize,
    pub edge_count: usize,
    #[serde(flatten)]
    pub graph: RoadmapGraph,
}

impl Output for GraphResult {
    fn to_json(&self) -> String {
        json_or_error(self)
    }

    fn to_human(&self) -> String {
        let mut out = format!("{} nodes, {} edges\n", self.node_count, self.edge_count);
        for node in &self.graph.nodes {
            let pos = format!("({}, {})", node.position.x, node.position.y);
            let _ = match node.data {
                NodeData::Start(ref data) => writeln!(out, "{:<16} {:<14} {}", node.id, pos, data.label),
                NodeData::Epic(ref data) => writeln!(
                    out,
                    "{:<16} {:<14} {} [{} {}%]",
                    node.id, pos, data.title, data.status, data.completion_percentage
                ),
                NodeData::Story(ref data) => writeln!(
                    out,
                    "{:<16} {:<14} [{}] {}",
                    node.id,
                    pos,
                    if data.completed { "x" } else { " " },
                    data.title
                ),
            };
        }
        out.push_str("Edges:\n");
        for edge in &self.graph.edges {
            let _ = writeln!(out, "  {}", edge.id);
        }
        out.trim_end().to_string()
    }
}

/// Synthesize the graph of a roadmap.
pub async fn graph(
    source: &RoadmapSource,
    project_name: Option<&str>,
    config: &ResolvedConfig,
) -> Result<GraphResult> {
    let document = source.read(config).await?;
    let synthesizer = GraphSynthesizer::with_config(config.layout.clone());
    let graph = synthesizer.synthesize(&document, &project_label(&document, project_name))?;
    Ok(GraphResult {
        node_count: graph.nodes.len(),
        edge_count: graph.edges.len(),
        graph,
    })
}

// === Summary ===

#[derive(Debug, Serialize)]
pub struct SummaryResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(flatten)]
    pub summary: RoadmapSummary,
    pub epics: Vec<EpicLine>,
}

#[derive(Debug, Serialize)]
pub struct EpicLine {
    pub id: String,
    pub title: String,
    pub status: EpicStatus,
    pub completion_percentage: u8,
    pub completed: usize,
    pub total: usize,
}

impl Output for SummaryResult {
    fn to_json(&self) -> String {
        json_or_error(self)
    }

    fn to_human(&self) -> String {
        let s = &self.summary;
        let mut out = String::new();
        if let Some(ref project) = self.project {
            let _ = writeln!(out, "{}", project);
        }
        let _ = writeln!(
            out,
            "{} epics, {}/{} stories done ({}%)",
            s.epic_count, s.completed_story_count, s.story_count, s.completion_percentage
        );
        let _ = writeln!(
            out,
            "pending: {}  in-progress: {}  completed: {}",
            s.pending_epics, s.in_progress_epics, s.completed_epics
        );
        if s.total_estimated_hours > 0.0 {
            let _ = writeln!(out, "estimated: {}h", s.total_estimated_hours);
        }
        for epic in &self.epics {
            let _ = writeln!(
                out,
                "  {:<8} {:<12} {:>3}%  {}/{}  {}",
                epic.id,
                epic.status.as_str(),
                epic.completion_percentage,
                epic.completed,
                epic.total,
                epic.title
            );
        }
        out.trim_end().to_string()
    }
}

/// Roadmap totals, with status derived from stories.
pub async fn summary(source: &RoadmapSource, config: &ResolvedConfig) -> Result<SummaryResult> {
    let document = source.read(config).await?.normalized()?;
    let epics = document
        .epics
        .iter()
        .map(|epic| {
            let progress = epic.progress();
            EpicLine {
                id: epic.id.to_string(),
                title: epic.title.clone(),
                status: epic.status,
                completion_percentage: epic.completion_percentage,
                completed: progress.completed,
                total: progress.total,
            }
        })
        .collect();
    Ok(SummaryResult {
        project: document.project.as_ref().map(|p| p.title.clone()),
        summary: document.summary(),
        epics,
    })
}

// === Normalize ===

#[derive(Debug, Serialize)]
pub struct NormalizeResult {
    /// Epics whose derived fields changed
    pub changed_epics: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub written: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<RoadmapDocument>,
}

impl Output for NormalizeResult {
    fn to_json(&self) -> String {
        json_or_error(self)
    }

    fn to_human(&self) -> String {
        let mut out = match self.changed_epics.len() {
            0 => "All epics already consistent".to_string(),
            n => format!("{} epic(s) updated: {}", n, self.changed_epics.join(", ")),
        };
        match (&self.written, &self.document) {
            (Some(path), _) => {
                let _ = write!(out, "\nWrote {}", path.display());
            }
            (None, Some(doc)) => {
                if let Ok(json) = doc.to_json_pretty() {
                    let _ = write!(out, "\n{}", json);
                }
            }
            (None, None) => {}
        }
        out
    }
}

/// Re-aggregate every epic; optionally write the result back to the store.
pub async fn normalize(
    source: &RoadmapSource,
    write: bool,
    config: &ResolvedConfig,
) -> Result<NormalizeResult> {
    let document = source.read(config).await?;
    let normalized = document.normalized()?;
    let changed_epics = document
        .epics
        .iter()
        .zip(&normalized.epics)
        .filter(|(before, after)| !Arc::ptr_eq(before, after))
        .map(|(epic, _)| epic.id.to_string())
        .collect();

    if write {
        let (project_id, store) = source.store(config)?;
        store.persist(&project_id, &normalized).await?;
        Ok(NormalizeResult {
            changed_epics,
            written: Some(store.path_for(&project_id)?),
            document: None,
        })
    } else {
        Ok(NormalizeResult {
            changed_epics,
            written: None,
            document: Some(normalized),
        })
    }
}

// === Fit ===

#[derive(Debug, Serialize)]
pub struct FitResult {
    pub container: ContainerSize,
    pub bounds: Bounds,
    pub viewport: Viewport,
    pub node_count: usize,
}

impl Output for FitResult {
    fn to_json(&self) -> String {
        json_or_error(self)
    }

    fn to_human(&self) -> String {
        format!(
            "Fit {} nodes into {}x{}: zoom {:.3}, pan ({:.1}, {:.1})",
            self.node_count,
            self.container.width,
            self.container.height,
            self.viewport.zoom,
            self.viewport.x,
            self.viewport.y
        )
    }
}

/// Compute the viewport a fit-to-content would produce.
pub async fn fit(
    source: &RoadmapSource,
    container: ContainerSize,
    config: &ResolvedConfig,
) -> Result<FitResult> {
    let document = source.read(config).await?;
    let synthesizer = GraphSynthesizer::with_config(config.layout.clone());
    let graph = synthesizer.synthesize(&document, &project_label(&document, None))?;
    let bounds = graph
        .bounds()
        .ok_or_else(|| Error::Other("graph has no nodes".to_string()))?;
    let viewport = compute_fit(&bounds, container, &config.fitter.options)?;
    Ok(FitResult {
        container,
        bounds,
        viewport,
        node_count: graph.nodes.len(),
    })
}

// === Story mutations ===

#[derive(Debug, Serialize)]
pub struct StoryResult {
    pub op: &'static str,
    pub seq: u64,
    pub state: MutationState,
    pub target: String,
    pub epic_status: EpicStatus,
    pub epic_completion_percentage: u8,
    pub story_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StoryResult {
    pub fn is_committed(&self) -> bool {
        self.state == MutationState::Committed
    }
}

impl Output for StoryResult {
    fn to_json(&self) -> String {
        json_or_error(self)
    }

    fn to_human(&self) -> String {
        let mut out = format!(
            "{} {}: {} (epic now {} at {}%, {} stories)",
            self.op,
            self.target,
            self.state,
            self.epic_status,
            self.epic_completion_percentage,
            self.story_count
        );
        if let Some(ref error) = self.error {
            let _ = write!(out, "\n  {}", error);
        }
        out
    }
}

/// Run one story mutation through the pipeline against the file store.
pub async fn story(
    source: &RoadmapSource,
    mutation: StoryMutation,
    config: &ResolvedConfig,
) -> Result<StoryResult> {
    let (project_id, store) = source.store(config)?;
    let document = store.load(&project_id).await?;
    let name = project_label(&document, None);
    let synthesizer = GraphSynthesizer::with_config(config.layout.clone());
    let session = RoadmapSession::new(project_id, name, document, synthesizer)?;
    let pipeline = MutationPipeline::new(session, Arc::new(store));

    let op = mutation.op();
    let epic_id = mutation.target().epic_id;
    let outcome = pipeline.submit(mutation).await?;

    let session = pipeline.session();
    let session = session.lock().await;
    let epic = session
        .document()
        .epic(&epic_id)
        .ok_or_else(|| Error::NotFound(format!("epic {}", epic_id)))?;

    let error = match outcome {
        MutationOutcome::Committed { .. } => None,
        MutationOutcome::RolledBack(ref rollback) => Some(rollback.error.to_string()),
    };
    Ok(StoryResult {
        op,
        seq: outcome.seq(),
        state: outcome.state(),
        target: outcome.target().to_string(),
        epic_status: epic.status,
        epic_completion_percentage: epic.completion_percentage,
        story_count: epic.stories.len(),
        error,
    })
}

// === Config ===

#[derive(Debug, Serialize)]
pub struct ConfigShowResult {
    #[serde(flatten)]
    pub config: ResolvedConfig,
}

impl Output for ConfigShowResult {
    fn to_json(&self) -> String {
        json_or_error(self)
    }

    fn to_human(&self) -> String {
        let c = &self.config;
        let mut out = String::new();
        match c.config_file {
            Some(ref file) => {
                let _ = writeln!(out, "config file: {} ({})", file.value.display(), file.source);
            }
            None => out.push_str("config file: none\n"),
        }
        let _ = writeln!(
            out,
            "store dir: {} ({})",
            c.store_dir.value.display(),
            c.store_dir.source
        );
        let l = &c.layout;
        let _ = writeln!(
            out,
            "layout: start ({}, {}), epics x={} from y={} every {}",
            l.start.x, l.start.y, l.epic_x, l.epic_top, l.epic_spacing
        );
        let _ = writeln!(
            out,
            "stories: rows {} apart at x={} / x={}, nudge {}",
            l.story_row_height, l.story_right_x, l.story_left_x, l.story_nudge
        );
        let f = &c.fitter;
        let _ = write!(
            out,
            "viewport: zoom {}..{}, padding {}, debounce {}ms",
            f.options.min_zoom,
            f.options.max_zoom,
            f.options.padding,
            f.quiet_period.as_millis()
        );
        out
    }
}

/// Show the resolved configuration.
pub fn config_show(config: ResolvedConfig) -> ConfigShowResult {
    ConfigShowResult { config }
}
