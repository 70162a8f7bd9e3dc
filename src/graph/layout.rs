//! Roadmap graph layout
//!
//! Deterministic placement for the three node kinds:
//! - Start node: a fixed anchor above everything else
//! - Epic nodes: a single vertical column, one row per epic in plan order
//! - Story nodes: a stack beside their epic, vertically centered on it
//!
//! Stories fan out to the right of even-indexed epics and to the left of
//! odd-indexed ones, so stacks from neighbouring epics do not collide.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// 2D position
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    /// Create a new position
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Rendered size of a node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeSize {
    pub width: f64,
    pub height: f64,
}

impl NodeSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Connection point on a node's border
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handle {
    Top,
    Bottom,
    Left,
    Right,
}

/// Which side of its epic a story stack is laid out on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Side for the stories of the epic at `epic_index`.
    pub fn for_epic(epic_index: usize) -> Self {
        if epic_index % 2 == 0 {
            Side::Right
        } else {
            Side::Left
        }
    }

    /// Handle on the epic that story edges leave from.
    pub fn epic_handle(&self) -> Handle {
        match self {
            Side::Left => Handle::Left,
            Side::Right => Handle::Right,
        }
    }

    /// Handle on the story that story edges arrive at (the side facing the epic).
    pub fn story_handle(&self) -> Handle {
        match self {
            Side::Left => Handle::Right,
            Side::Right => Handle::Left,
        }
    }
}

/// Layout constants for the roadmap graph.
///
/// Passed explicitly to the synthesizer so several graphs can use independent
/// or test-specific values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Anchor of the start node
    pub start: Position,
    /// Column x of every epic node
    pub epic_x: f64,
    /// y of the first epic
    pub epic_top: f64,
    /// Vertical distance between consecutive epics
    pub epic_spacing: f64,
    /// Vertical distance between consecutive stories of one epic
    pub story_row_height: f64,
    /// x of stories laid out to the right (positive)
    pub story_right_x: f64,
    /// x of stories laid out to the left (negative)
    pub story_left_x: f64,
    /// Small vertical offset so the middle story never sits exactly on the epic row
    pub story_nudge: f64,
    pub start_size: NodeSize,
    pub epic_size: NodeSize,
    pub story_size: NodeSize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            start: Position::new(0.0, 100.0),
            epic_x: 0.0,
            epic_top: 530.0,
            epic_spacing: 450.0,
            story_row_height: 140.0,
            story_right_x: 450.0,
            story_left_x: -450.0,
            story_nudge: 20.0,
            start_size: NodeSize::new(450.0, 160.0),
            epic_size: NodeSize::new(280.0, 200.0),
            story_size: NodeSize::new(260.0, 110.0),
        }
    }
}

impl LayoutConfig {
    /// Validate the config values.
    pub fn validate(&self) -> Result<()> {
        let finite = [
            self.start.x,
            self.start.y,
            self.epic_x,
            self.epic_top,
            self.epic_spacing,
            self.story_row_height,
            self.story_right_x,
            self.story_left_x,
            self.story_nudge,
        ];
        if finite.iter().any(|v| !v.is_finite()) {
            return Err(Error::Config("layout values must be finite".to_string()));
        }
        if self.epic_spacing <= 0.0 {
            return Err(Error::Config(format!(
                "epic-spacing must be positive, got {}",
                self.epic_spacing
            )));
        }
        if self.story_row_height <= 0.0 {
            return Err(Error::Config(format!(
                "story-row-height must be positive, got {}",
                self.story_row_height
            )));
        }
        if self.story_right_x <= 0.0 || self.story_left_x >= 0.0 {
            return Err(Error::Config(
                "story-right-x must be positive and story-left-x negative".to_string(),
            ));
        }
        for size in [self.start_size, self.epic_size, self.story_size] {
            if !(size.width > 0.0 && size.height > 0.0) {
                return Err(Error::Config("node sizes must be positive".to_string()));
            }
        }
        Ok(())
    }

    /// Position of the start node
    pub fn start_position(&self) -> Position {
        self.start
    }

    /// Position of the epic at `index` (0-based, plan order)
    pub fn epic_position(&self, index: usize) -> Position {
        Position::new(
            self.epic_x,
            self.epic_top + index as f64 * self.epic_spacing,
        )
    }

    /// Position of story `index` out of `count` stories of an epic at `epic_y`.
    ///
    /// The stack is centered on the epic row:
    /// `start_y = epic_y - ((count - 1) * row_height) / 2 + nudge`.
    pub fn story_position(&self, epic_y: f64, side: Side, count: usize, index: usize) -> Position {
        let x = match side {
            Side::Right => self.story_right_x,
            Side::Left => self.story_left_x,
        };
        let span = count.saturating_sub(1) as f64 * self.story_row_height;
        let start_y = epic_y - span / 2.0 + self.story_nudge;
        Position::new(x, start_y + index as f64 * self.story_row_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_new() {
        let pos = Position::new(10.0, 20.0);
        assert_eq!(pos.x, 10.0);
        assert_eq!(pos.y, 20.0);
    }

    #[test]
    fn test_layout_config_default() {
        let config = LayoutConfig::default();
        assert_eq!(config.start, Position::new(0.0, 100.0));
        assert_eq!(config.epic_top, 530.0);
        assert_eq!(config.epic_spacing, 450.0);
        assert_eq!(config.story_row_height, 140.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_epic_positions_are_a_column() {
        let config = LayoutConfig::default();
        assert_eq!(config.epic_position(0), Position::new(0.0, 530.0));
        assert_eq!(config.epic_position(1), Position::new(0.0, 980.0));
        assert_eq!(config.epic_position(2), Position::new(0.0, 1430.0));
    }

    #[test]
    fn test_side_alternates_per_epic() {
        assert_eq!(Side::for_epic(0), Side::Right);
        assert_eq!(Side::for_epic(1), Side::Left);
        assert_eq!(Side::for_epic(2), Side::Right);
        assert_eq!(Side::Right.epic_handle(), Handle::Right);
        assert_eq!(Side::Right.story_handle(), Handle::Left);
        assert_eq!(Side::Left.epic_handle(), Handle::Left);
    }

    #[test]
    fn test_story_stack_centering() {
        let config = LayoutConfig::default();
        // Three stories around y=530: 530 - 140 + 20 = 410, then 550, 690
        let ys: Vec<f64> = (0..3)
            .map(|j| config.story_position(530.0, Side::Right, 3, j).y)
            .collect();
        assert_eq!(ys, vec![410.0, 550.0, 690.0]);

        // A single story sits on the epic row plus the nudge
        let single = config.story_position(980.0, Side::Left, 1, 0);
        assert_eq!(single, Position::new(-450.0, 1000.0));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = LayoutConfig {
            epic_spacing: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = LayoutConfig {
            story_left_x: 10.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = LayoutConfig {
            story_nudge: f64::INFINITY,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
