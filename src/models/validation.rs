//! Structural validation for roadmap documents.
//!
//! Everything downstream (aggregation, synthesis, mutations) assumes a
//! document that passed these checks. Failures are reported as
//! [`Error::Validation`] and are never coerced into something renderable.

use std::collections::HashSet;

use super::{Epic, EpicId, RoadmapDocument, Story};
use crate::{Error, Result};

/// Check a story list: ids unique within the epic, titles present, estimates
/// non-negative and finite.
pub fn validate_stories(epic_id: &EpicId, stories: &[Story]) -> Result<()> {
    let mut seen = HashSet::new();
    for (index, story) in stories.iter().enumerate() {
        if let Some(ref id) = story.id {
            if !seen.insert(id.as_str()) {
                return Err(Error::Validation(format!(
                    "epic {}: duplicate story id '{}'",
                    epic_id, id
                )));
            }
        }
        if story.title.trim().is_empty() {
            return Err(Error::Validation(format!(
                "epic {}: story #{} has an empty title",
                epic_id, index
            )));
        }
        if let Some(hours) = story.estimated_hours {
            if !hours.is_finite() || hours < 0.0 {
                return Err(Error::Validation(format!(
                    "epic {}: story #{} has invalid estimated_hours {}",
                    epic_id, index, hours
                )));
            }
        }
    }
    Ok(())
}

/// Check a single epic and its stories.
pub fn validate_epic(epic: &Epic) -> Result<()> {
    if let EpicId::Text(ref s) = epic.id {
        if s.trim().is_empty() {
            return Err(Error::Validation("epic id must not be empty".to_string()));
        }
    }
    if epic.title.trim().is_empty() {
        return Err(Error::Validation(format!(
            "epic {} has an empty title",
            epic.id
        )));
    }
    if epic.dependencies.contains(&epic.id) {
        return Err(Error::Validation(format!(
            "epic {} depends on itself",
            epic.id
        )));
    }
    if let Some(hours) = epic.estimated_hours {
        if !hours.is_finite() || hours < 0.0 {
            return Err(Error::Validation(format!(
                "epic {} has invalid estimated_hours {}",
                epic.id, hours
            )));
        }
    }
    if epic.completion_percentage > 100 {
        return Err(Error::Validation(format!(
            "epic {} has completion_percentage {} (expected 0-100)",
            epic.id, epic.completion_percentage
        )));
    }
    validate_stories(&epic.id, &epic.stories)
}

/// Check a whole document: every epic valid, epic ids unique.
pub fn validate_document(doc: &RoadmapDocument) -> Result<()> {
    let mut seen = HashSet::new();
    for epic in &doc.epics {
        if !seen.insert(&epic.id) {
            return Err(Error::Validation(format!(
                "duplicate epic id '{}'",
                epic.id
            )));
        }
        validate_epic(epic)?;
    }
    Ok(())
}
