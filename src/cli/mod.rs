//! CLI argument definitions for Waymark.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Version string with build information, for `--version`.
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit ",
    env!("WM_GIT_COMMIT"),
    ", built ",
    env!("WM_BUILD_TIMESTAMP"),
    ")"
);

/// Waymark - roadmap graph model.
///
/// Reads roadmap documents (epics containing stories), keeps derived progress
/// consistent, and prints the positioned graph a canvas would render.
#[derive(Parser, Debug)]
#[command(name = "wm")]
#[command(author, version, long_version = LONG_VERSION, about = "Render and edit project roadmaps as graphs", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Config file to use instead of ~/.config/waymark/config.kdl.
    /// Can also be set via WAYMARK_CONFIG environment variable.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory of the roadmap store, for --project
    #[arg(long, global = true, env = "WAYMARK_STORE_DIR")]
    pub store_dir: Option<PathBuf>,

    /// Log output format (logs go to stderr, filtered by WAYMARK_LOG)
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Where to read a roadmap from: a JSON file, or a project in the store.
#[derive(Args, Debug, Clone)]
pub struct RoadmapArgs {
    /// Roadmap JSON file
    #[arg(required_unless_present = "project")]
    pub file: Option<PathBuf>,

    /// Project id in the roadmap store
    #[arg(long, conflicts_with = "file")]
    pub project: Option<String>,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the synthesized graph (nodes and edges)
    Graph {
        #[command(flatten)]
        roadmap: RoadmapArgs,

        /// Label for the start node (default: project title from the document)
        #[arg(long)]
        project_name: Option<String>,
    },

    /// Show roadmap totals and per-status epic counts
    Summary {
        #[command(flatten)]
        roadmap: RoadmapArgs,
    },

    /// Recompute derived fields and rewrite legacy field names
    Normalize {
        #[command(flatten)]
        roadmap: RoadmapArgs,

        /// Write the normalized document back instead of printing it
        #[arg(long)]
        write: bool,
    },

    /// Compute the viewport that fits the whole graph into a container
    Fit {
        #[command(flatten)]
        roadmap: RoadmapArgs,

        /// Container width in pixels
        #[arg(long)]
        width: f64,

        /// Container height in pixels
        #[arg(long)]
        height: f64,

        /// Minimum zoom (overrides config)
        #[arg(long)]
        min_zoom: Option<f64>,

        /// Maximum zoom (overrides config)
        #[arg(long)]
        max_zoom: Option<f64>,

        /// Padding as a fraction of the content size (overrides config)
        #[arg(long)]
        padding: Option<f64>,
    },

    /// Story mutations (persisted through the roadmap store)
    Story {
        #[command(subcommand)]
        command: StoryCommands,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Selects one story of an epic, by persistence id or by position.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct StorySelector {
    /// Story id
    #[arg(long)]
    pub story: Option<String>,

    /// Story position within the epic (0-based)
    #[arg(long)]
    pub index: Option<usize>,
}

/// Story subcommands
#[derive(Subcommand, Debug)]
pub enum StoryCommands {
    /// Flip a story's completion flag
    Toggle {
        #[command(flatten)]
        roadmap: RoadmapArgs,

        /// Epic id
        #[arg(long)]
        epic: String,

        #[command(flatten)]
        selector: StorySelector,
    },

    /// Append a story to an epic
    Add {
        #[command(flatten)]
        roadmap: RoadmapArgs,

        /// Epic id
        #[arg(long)]
        epic: String,

        /// Story title
        #[arg(long)]
        title: String,

        /// Story description
        #[arg(long)]
        description: Option<String>,

        /// Persistence id for the new story
        #[arg(long)]
        id: Option<String>,

        /// Estimated hours
        #[arg(long)]
        hours: Option<f64>,

        /// Create the story already completed
        #[arg(long)]
        completed: bool,
    },

    /// Change a story's title, description, completion or estimate
    Edit {
        #[command(flatten)]
        roadmap: RoadmapArgs,

        /// Epic id
        #[arg(long)]
        epic: String,

        #[command(flatten)]
        selector: StorySelector,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New description
        #[arg(long)]
        description: Option<String>,

        /// New completion flag
        #[arg(long)]
        completed: Option<bool>,

        /// New estimated hours
        #[arg(long)]
        hours: Option<f64>,

        /// Remove the estimated hours
        #[arg(long, conflicts_with = "hours")]
        clear_hours: bool,
    },

    /// Remove a story
    Delete {
        #[command(flatten)]
        roadmap: RoadmapArgs,

        /// Epic id
        #[arg(long)]
        epic: String,

        #[command(flatten)]
        selector: StorySelector,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the resolved configuration and where each part came from
    Show,
}
