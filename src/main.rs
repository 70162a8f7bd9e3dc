//! Waymark CLI - render and edit project roadmaps as graphs.

use clap::Parser;
use std::process;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use waymark::cli::{Cli, Commands, ConfigCommands, LogFormat, RoadmapArgs, StoryCommands, StorySelector};
use waymark::commands::{self, Output, RoadmapSource};
use waymark::config::{ConfigOverrides, resolve_config};
use waymark::graph::ContainerSize;
use waymark::models::{EpicId, Story, StoryKey, StoryPatch, StoryRef};
use waymark::mutation::StoryMutation;

/// Environment variable holding the log filter directives.
const LOG_ENV: &str = "WAYMARK_LOG";

/// Exit status when a story mutation was rolled back.
const EXIT_ROLLED_BACK: i32 = 2;

fn main() {
    let cli = Cli::parse();
    let human = cli.human_readable;
    init_tracing(cli.log_format);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => fail(&waymark::Error::Io(e), human),
    };

    match runtime.block_on(run_command(cli)) {
        Ok(true) => {}
        Ok(false) => process::exit(EXIT_ROLLED_BACK),
        Err(e) => fail(&e, human),
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

fn fail(error: &waymark::Error, human: bool) -> ! {
    if human {
        eprintln!("Error: {}", error);
    } else {
        eprintln!("{}", serde_json::json!({ "error": error.to_string() }));
    }
    process::exit(1);
}

/// Print output in JSON or human-readable format.
fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}

/// Run the parsed command. Returns false when a mutation was rolled back.
async fn run_command(cli: Cli) -> Result<bool, waymark::Error> {
    let human = cli.human_readable;
    let mut overrides = ConfigOverrides {
        config_path: cli.config,
        store_dir: cli.store_dir,
        ..Default::default()
    };
    if let Commands::Fit {
        min_zoom,
        max_zoom,
        padding,
        ..
    } = cli.command
    {
        overrides.min_zoom = min_zoom;
        overrides.max_zoom = max_zoom;
        overrides.padding = padding;
    }
    let config = resolve_config(&overrides)?;

    match cli.command {
        Commands::Graph {
            roadmap,
            project_name,
        } => {
            let result = commands::graph(&source(roadmap)?, project_name.as_deref(), &config).await?;
            output(&result, human);
        }
        Commands::Summary { roadmap } => {
            let result = commands::summary(&source(roadmap)?, &config).await?;
            output(&result, human);
        }
        Commands::Normalize { roadmap, write } => {
            let result = commands::normalize(&source(roadmap)?, write, &config).await?;
            output(&result, human);
        }
        Commands::Fit {
            roadmap,
            width,
            height,
            ..
        } => {
            let container = ContainerSize::new(width, height);
            let result = commands::fit(&source(roadmap)?, container, &config).await?;
            output(&result, human);
        }
        Commands::Story { command } => {
            let (roadmap, mutation) = story_mutation(command)?;
            let result = commands::story(&source(roadmap)?, mutation, &config).await?;
            output(&result, human);
            return Ok(result.is_committed());
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => output(&commands::config_show(config), human),
        },
    }
    Ok(true)
}

fn source(roadmap: RoadmapArgs) -> Result<RoadmapSource, waymark::Error> {
    RoadmapSource::from_args(roadmap.file, roadmap.project)
}

fn story_ref(epic: &str, selector: StorySelector) -> Result<StoryRef, waymark::Error> {
    let story = match (selector.story, selector.index) {
        (Some(id), _) => StoryKey::Id(id),
        (None, Some(index)) => StoryKey::Index(index),
        (None, None) => {
            return Err(waymark::Error::Other(
                "one of --story or --index is required".to_string(),
            ));
        }
    };
    Ok(StoryRef {
        epic_id: epic.parse()?,
        story,
    })
}

fn story_mutation(command: StoryCommands) -> Result<(RoadmapArgs, StoryMutation), waymark::Error> {
    Ok(match command {
        StoryCommands::Toggle {
            roadmap,
            epic,
            selector,
        } => (
            roadmap,
            StoryMutation::Toggle {
                story: story_ref(&epic, selector)?,
            },
        ),
        StoryCommands::Add {
            roadmap,
            epic,
            title,
            description,
            id,
            hours,
            completed,
        } => {
            let mut story = Story::new(title).with_completed(completed);
            if let Some(id) = id {
                story = story.with_id(id);
            }
            if let Some(description) = description {
                story = story.with_description(description);
            }
            if let Some(hours) = hours {
                story = story.with_estimated_hours(hours);
            }
            (
                roadmap,
                StoryMutation::Add {
                    epic_id: epic.parse::<EpicId>()?,
                    story,
                },
            )
        }
        StoryCommands::Edit {
            roadmap,
            epic,
            selector,
            title,
            description,
            completed,
            hours,
            clear_hours,
        } => (
            roadmap,
            StoryMutation::Edit {
                story: story_ref(&epic, selector)?,
                patch: StoryPatch {
                    title,
                    description,
                    completed,
                    estimated_hours: hours,
                    clear_hours,
                },
            },
        ),
        StoryCommands::Delete {
            roadmap,
            epic,
            selector,
        } => (
            roadmap,
            StoryMutation::Delete {
                story: story_ref(&epic, selector)?,
            },
        ),
    })
}
