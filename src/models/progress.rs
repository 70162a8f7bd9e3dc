//! Derived progress for epics and whole roadmaps.
//!
//! An epic's `completion_percentage` and `status` are never set by a user
//! action. They are recomputed from the epic's stories every time the stories
//! change.

use serde::{Deserialize, Serialize};

use super::validation::validate_stories;
use super::{Epic, EpicStatus, RoadmapDocument, Story};
use crate::Result;

/// Rounded completion percentage, half away from zero. Zero when `total` is 0.
pub fn completion_percentage(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total);
    // round(100 * c / t) == floor((200 * c + t) / (2 * t))
    ((200 * completed + total) / (2 * total)) as u8
}

/// Progress statistics for an epic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpicProgress {
    /// Total number of stories
    pub total: usize,
    /// Number of completed stories
    pub completed: usize,
    /// Completion percentage (0-100)
    pub percentage: u8,
}

impl EpicProgress {
    /// Create new progress stats.
    pub fn new(total: usize, completed: usize) -> Self {
        Self {
            total,
            completed,
            percentage: completion_percentage(completed, total),
        }
    }

    /// Count completion over a story list.
    pub fn of(stories: &[Story]) -> Self {
        let completed = stories.iter().filter(|s| s.completed).count();
        Self::new(stories.len(), completed)
    }

    /// Status implied by this progress.
    ///
    /// An epic without stories is `Pending`, never `Completed`: zero defined
    /// work does not count as done.
    pub fn status(&self) -> EpicStatus {
        match self.percentage {
            0 => EpicStatus::Pending,
            100 => EpicStatus::Completed,
            _ => EpicStatus::InProgress,
        }
    }
}

impl Epic {
    /// Progress computed from the current stories.
    pub fn progress(&self) -> EpicProgress {
        EpicProgress::of(&self.stories)
    }

    /// Returns true if the stored derived fields match the stories.
    pub fn is_consistent(&self) -> bool {
        let progress = self.progress();
        self.completion_percentage == progress.percentage && self.status == progress.status()
    }
}

/// Recompute an epic's derived fields from its stories.
///
/// Everything else, ids included, passes through unchanged. Fails only if
/// the story list is structurally invalid.
pub fn aggregate(mut epic: Epic) -> Result<Epic> {
    validate_stories(&epic.id, &epic.stories)?;
    let progress = epic.progress();
    epic.completion_percentage = progress.percentage;
    epic.status = progress.status();
    Ok(epic)
}

/// Roadmap-wide totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadmapSummary {
    pub epic_count: usize,
    pub story_count: usize,
    pub completed_story_count: usize,
    /// Completion over all stories, same rounding as epics
    pub completion_percentage: u8,
    pub pending_epics: usize,
    pub in_progress_epics: usize,
    pub completed_epics: usize,
    /// Sum of story estimates, or the epic's own estimate when none of its
    /// stories carry one
    pub total_estimated_hours: f64,
}

impl RoadmapDocument {
    /// Compute roadmap-wide totals. Epic statuses are derived from stories,
    /// not read from the stored fields.
    pub fn summary(&self) -> RoadmapSummary {
        let mut summary = RoadmapSummary {
            epic_count: self.epics.len(),
            story_count: 0,
            completed_story_count: 0,
            completion_percentage: 0,
            pending_epics: 0,
            in_progress_epics: 0,
            completed_epics: 0,
            total_estimated_hours: 0.0,
        };

        for epic in &self.epics {
            let progress = epic.progress();
            summary.story_count += progress.total;
            summary.completed_story_count += progress.completed;
            match progress.status() {
                EpicStatus::Pending => summary.pending_epics += 1,
                EpicStatus::InProgress => summary.in_progress_epics += 1,
                EpicStatus::Completed => summary.completed_epics += 1,
            }

            let story_hours: Vec<f64> = epic
                .stories
                .iter()
                .filter_map(|s| s.estimated_hours)
                .collect();
            summary.total_estimated_hours += if story_hours.is_empty() {
                epic.estimated_hours.unwrap_or(0.0)
            } else {
                story_hours.iter().sum()
            };
        }

        summary.completion_percentage =
            completion_percentage(summary.completed_story_count, summary.story_count);
        summary
    }
}
