//! KDL schema for config.kdl.
//!
//! This module provides:
//! - Rust structs representing the KDL schema
//! - Parsing from KDL
//! - Applying the settings onto the built-in layout and viewport defaults
//!
//! Every value is optional in the file; unset values fall back to the
//! built-in defaults.

use kdl::{KdlDocument, KdlNode, KdlValue};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::graph::layout::LayoutConfig;
use crate::graph::viewport::{FitOptions, FitterConfig};
use crate::{Error, Result};

/// Layout overrides from the `layout` block.
///
/// ```kdl
/// layout {
///     start-x 0
///     start-y 100
///     epic-x 0
///     epic-top 530
///     epic-spacing 450
///     story-row-height 140
///     story-right-x 450
///     story-left-x -450
///     story-nudge 20
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutSettings {
    pub start_x: Option<f64>,
    pub start_y: Option<f64>,
    pub epic_x: Option<f64>,
    pub epic_top: Option<f64>,
    pub epic_spacing: Option<f64>,
    pub story_row_height: Option<f64>,
    pub story_right_x: Option<f64>,
    pub story_left_x: Option<f64>,
    pub story_nudge: Option<f64>,
}

impl LayoutSettings {
    fn fields_mut(&mut self) -> [(&'static str, &mut Option<f64>); 9] {
        [
            ("start-x", &mut self.start_x),
            ("start-y", &mut self.start_y),
            ("epic-x", &mut self.epic_x),
            ("epic-top", &mut self.epic_top),
            ("epic-spacing", &mut self.epic_spacing),
            ("story-row-height", &mut self.story_row_height),
            ("story-right-x", &mut self.story_right_x),
            ("story-left-x", &mut self.story_left_x),
            ("story-nudge", &mut self.story_nudge),
        ]
    }

    /// Apply the set values on top of `base`.
    pub fn apply_to(&self, base: &LayoutConfig) -> LayoutConfig {
        let mut config = base.clone();
        if let Some(v) = self.start_x {
            config.start.x = v;
        }
        if let Some(v) = self.start_y {
            config.start.y = v;
        }
        if let Some(v) = self.epic_x {
            config.epic_x = v;
        }
        if let Some(v) = self.epic_top {
            config.epic_top = v;
        }
        if let Some(v) = self.epic_spacing {
            config.epic_spacing = v;
        }
        if let Some(v) = self.story_row_height {
            config.story_row_height = v;
        }
        if let Some(v) = self.story_right_x {
            config.story_right_x = v;
        }
        if let Some(v) = self.story_left_x {
            config.story_left_x = v;
        }
        if let Some(v) = self.story_nudge {
            config.story_nudge = v;
        }
        config
    }
}

/// Fitter overrides from the `viewport` block.
///
/// ```kdl
/// viewport {
///     min-zoom 0.1
///     max-zoom 1.2
///     padding 0.2
///     debounce-ms 100
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewportSettings {
    pub min_zoom: Option<f64>,
    pub max_zoom: Option<f64>,
    pub padding: Option<f64>,
    pub debounce_ms: Option<u64>,
}

impl ViewportSettings {
    /// Apply the set values on top of `base`.
    pub fn apply_to(&self, base: &FitterConfig) -> FitterConfig {
        let mut config = *base;
        let options: &mut FitOptions = &mut config.options;
        if let Some(v) = self.min_zoom {
            options.min_zoom = v;
        }
        if let Some(v) = self.max_zoom {
            options.max_zoom = v;
        }
        if let Some(v) = self.padding {
            options.padding = v;
        }
        if let Some(ms) = self.debounce_ms {
            config.quiet_period = Duration::from_millis(ms);
        }
        config
    }
}

/// User configuration stored in config.kdl.
///
/// # KDL Schema
///
/// ```kdl
/// layout { epic-spacing 500 }
/// viewport { max-zoom 1.5 }
/// store { dir "/home/me/roadmaps" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaymarkConfig {
    pub layout: LayoutSettings,
    pub viewport: ViewportSettings,
    /// Directory of the file store
    pub store_dir: Option<PathBuf>,
}

impl WaymarkConfig {
    /// Create an empty config with no values set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse config from a KDL document.
    ///
    /// Unknown nodes are ignored; a known key with a value of the wrong type
    /// is an error.
    pub fn from_kdl(doc: &KdlDocument) -> Result<Self> {
        let mut config = Self::new();

        if let Some(children) = doc.get("layout").and_then(|n| n.children()) {
            for (key, slot) in config.layout.fields_mut() {
                if let Some(node) = children.get(key) {
                    *slot = Some(get_number_arg(node)?);
                }
            }
        }

        if let Some(children) = doc.get("viewport").and_then(|n| n.children()) {
            let viewport = &mut config.viewport;
            if let Some(node) = children.get("min-zoom") {
                viewport.min_zoom = Some(get_number_arg(node)?);
            }
            if let Some(node) = children.get("max-zoom") {
                viewport.max_zoom = Some(get_number_arg(node)?);
            }
            if let Some(node) = children.get("padding") {
                viewport.padding = Some(get_number_arg(node)?);
            }
            if let Some(node) = children.get("debounce-ms") {
                let ms = node
                    .entries()
                    .first()
                    .and_then(|e| e.value().as_integer())
                    .and_then(|i| u64::try_from(i).ok())
                    .ok_or_else(|| {
                        Error::Config("debounce-ms must be a non-negative integer".to_string())
                    })?;
                viewport.debounce_ms = Some(ms);
            }
        }

        if let Some(children) = doc.get("store").and_then(|n| n.children()) {
            if let Some(node) = children.get("dir") {
                let dir = node
                    .entries()
                    .first()
                    .and_then(|e| e.value().as_string())
                    .ok_or_else(|| Error::Config("store dir must be a string".to_string()))?;
                config.store_dir = Some(PathBuf::from(dir));
            }
        }

        Ok(config)
    }
}

/// Numbers may be written as integers or floats.
fn get_number_arg(node: &KdlNode) -> Result<f64> {
    let value = node.entries().first().map(|e| e.value());
    match value {
        Some(KdlValue::Float(f)) => Ok(*f),
        Some(KdlValue::Integer(i)) => Ok(*i as f64),
        _ => Err(Error::Config(format!(
            "{} must be a number",
            node.name().value()
        ))),
    }
}
