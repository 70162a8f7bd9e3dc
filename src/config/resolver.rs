//! Precedence resolution for configuration.
//!
//! ## Config file location (highest to lowest)
//!
//! 1. `--config` CLI flag
//! 2. `WAYMARK_CONFIG` environment variable
//! 3. System config.kdl (`~/.config/waymark/config.kdl`)
//!
//! An explicitly named file must exist; a missing system file just means
//! "no overrides".
//!
//! ## Values (highest to lowest)
//!
//! 1. CLI flags
//! 2. config.kdl
//! 3. Built-in defaults

use kdl::KdlDocument;
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::schema::WaymarkConfig;
use crate::graph::layout::LayoutConfig;
use crate::graph::viewport::FitterConfig;
use crate::storage::default_store_dir;
use crate::{Error, Result};

/// Environment variable naming the config file.
pub const WAYMARK_CONFIG_ENV: &str = "WAYMARK_CONFIG";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    /// Value from environment variable
    EnvVar(String),
    /// Value from a config file
    File(String),
    /// Value from CLI flag
    CliFlag,
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::File(path) => write!(f, "file:{}", path),
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, Serialize)]
pub struct Resolved<T> {
    /// The resolved value
    pub value: T,
    /// Where the value came from
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    /// Create a new resolved value.
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// CLI overrides for configuration resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Config file from `--config`
    pub config_path: Option<PathBuf>,
    /// Store directory from `--store-dir`
    pub store_dir: Option<PathBuf>,
    pub min_zoom: Option<f64>,
    pub max_zoom: Option<f64>,
    pub padding: Option<f64>,
}

impl ConfigOverrides {
    /// Create empty overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set config file override.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Set store directory override.
    pub fn with_store_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.store_dir = Some(dir.into());
        self
    }
}

/// Fully resolved configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// The config file that was read, if any
    pub config_file: Option<Resolved<PathBuf>>,
    pub layout: LayoutConfig,
    pub fitter: FitterConfig,
    pub store_dir: Resolved<PathBuf>,
}

/// Path of the system config file: `~/.config/waymark/config.kdl`.
pub fn system_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("waymark").join("config.kdl"))
}

/// Read and parse a config file.
pub fn load_config_file(path: &Path) -> Result<WaymarkConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    let doc: KdlDocument = content
        .parse()
        .map_err(|e| Error::Config(format!("Failed to parse KDL in {}: {}", path.display(), e)))?;
    WaymarkConfig::from_kdl(&doc)
}

/// Resolve configuration from the environment with full precedence chain.
pub fn resolve_config(overrides: &ConfigOverrides) -> Result<ResolvedConfig> {
    let env_path = std::env::var(WAYMARK_CONFIG_ENV)
        .ok()
        .filter(|p| !p.is_empty())
        .map(PathBuf::from);
    resolve_config_with(overrides, env_path, system_config_path())
}

/// Resolve configuration given the candidate config file locations.
pub fn resolve_config_with(
    overrides: &ConfigOverrides,
    env_path: Option<PathBuf>,
    system_path: Option<PathBuf>,
) -> Result<ResolvedConfig> {
    let config_file = if let Some(ref path) = overrides.config_path {
        Some(Resolved::new(path.clone(), ValueSource::CliFlag))
    } else if let Some(path) = env_path {
        Some(Resolved::new(
            path,
            ValueSource::EnvVar(WAYMARK_CONFIG_ENV.to_string()),
        ))
    } else {
        system_path
            .filter(|p| p.exists())
            .map(|p| Resolved::new(p, ValueSource::Default))
    };

    let (file_config, file_source) = match config_file {
        Some(ref resolved) => {
            tracing::debug!(path = %resolved.value.display(), "loading config");
            (
                load_config_file(&resolved.value)?,
                ValueSource::File(resolved.value.display().to_string()),
            )
        }
        None => (WaymarkConfig::new(), ValueSource::Default),
    };

    let layout = file_config.layout.apply_to(&LayoutConfig::default());
    layout.validate()?;

    let mut fitter = file_config.viewport.apply_to(&FitterConfig::default());
    if let Some(v) = overrides.min_zoom {
        fitter.options.min_zoom = v;
    }
    if let Some(v) = overrides.max_zoom {
        fitter.options.max_zoom = v;
    }
    if let Some(v) = overrides.padding {
        fitter.options.padding = v;
    }
    fitter.options.validate()?;

    let store_dir = if let Some(ref dir) = overrides.store_dir {
        Resolved::new(dir.clone(), ValueSource::CliFlag)
    } else if let Some(ref dir) = file_config.store_dir {
        Resolved::new(dir.clone(), file_source)
    } else {
        Resolved::new(default_store_dir()?, ValueSource::Default)
    };

    Ok(ResolvedConfig {
        config_file,
        layout,
        fitter,
        store_dir,
    })
}
