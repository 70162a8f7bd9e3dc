//! Configuration for Waymark.
//!
//! ## config.kdl - User preferences
//!
//! Located at `~/.config/waymark/config.kdl`, or wherever `WAYMARK_CONFIG`
//! or `--config` points.
//!
//! Contains:
//! - `layout` block - Graph placement constants
//! - `viewport` block - Fit zoom bounds, padding and debounce interval
//! - `store` block - Directory of the file store
//!
//! ## Precedence
//!
//! CLI flag > config.kdl > defaults
//!
//! Use the [`resolver`] module for precedence resolution.

pub mod resolver;
pub mod schema;

pub use resolver::{
    ConfigOverrides, Resolved, ResolvedConfig, ValueSource, WAYMARK_CONFIG_ENV, load_config_file,
    resolve_config, resolve_config_with, system_config_path,
};
pub use schema::{LayoutSettings, ViewportSettings, WaymarkConfig};
