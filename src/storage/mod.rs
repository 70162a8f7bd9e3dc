//! Storage layer for roadmap documents.
//!
//! ## Stores
//!
//! - **File store** (default): one JSON document per project in a directory
//! - **Memory store**: in-process, for tests and demos
//!
//! Both implement [`RoadmapStore`], the whole-document persistence contract
//! the mutation pipeline writes through.

pub mod backend;
pub mod file;
pub mod memory;

pub use backend::RoadmapStore;
pub use file::FileStore;
pub use memory::MemoryStore;

use std::path::PathBuf;

use crate::{Error, Result};

/// Default directory for the file store: `~/.local/share/waymark/roadmaps`.
pub fn default_store_dir() -> Result<PathBuf> {
    let base = dirs::data_local_dir()
        .ok_or_else(|| Error::Other("Could not determine data directory".to_string()))?;
    Ok(base.join("waymark").join("roadmaps"))
}
