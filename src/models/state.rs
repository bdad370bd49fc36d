//! Observable engine state read by the host chrome.

use serde::{Deserialize, Serialize};

use super::entity::{Entity, Relation};

/// A 2D point, in world or screen space depending on context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Current zoom/pan transform: `screen = world * zoom + pan`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportState {
    /// Zoom factor, always > 0.
    pub zoom: f64,
    /// Screen-space translation.
    pub pan: Point,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan: Point::default(),
        }
    }
}

impl ViewportState {
    /// Zoom as a whole percentage, for display.
    pub fn zoom_percent(&self) -> u32 {
        (self.zoom * 100.0).round() as u32
    }

    pub fn world_to_screen(&self, p: Point) -> Point {
        Point::new(p.x * self.zoom + self.pan.x, p.y * self.zoom + self.pan.y)
    }

    pub fn screen_to_world(&self, p: Point) -> Point {
        Point::new((p.x - self.pan.x) / self.zoom, (p.y - self.pan.y) / self.zoom)
    }
}

/// What is currently selected. At most one entity or one relation.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Selection {
    /// Nothing selected.
    #[default]
    None,
    /// An entity is selected.
    Entity(Entity),
    /// A relation is selected.
    Relation(Relation),
}

impl Selection {
    pub fn selected_entity(&self) -> Option<&Entity> {
        match self {
            Selection::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn selected_relation(&self) -> Option<&Relation> {
        match self {
            Selection::Relation(relation) => Some(relation),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Selection::None)
    }
}

/// Where the load sequence currently stands, for the host's loading/empty/error views.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum LoadStatus {
    /// Nothing requested yet, or unmounted.
    #[default]
    Idle,
    /// A load is in flight.
    Loading,
    /// A scene is rendered on the surface.
    Ready { nodes: usize, edges: usize },
    /// The load produced no nodes; no surface exists.
    Empty,
    /// Fetch or initialization failed; `Engine::retry` re-issues the last load.
    Failed { message: String },
}

/// Severity of a host-visible notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A transient, user-visible message for the host chrome.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_transforms_are_inverse() {
        let viewport = ViewportState {
            zoom: 2.5,
            pan: Point::new(40.0, -12.0),
        };
        let world = Point::new(3.0, 7.0);
        let back = viewport.screen_to_world(viewport.world_to_screen(world));
        assert!((back.x - world.x).abs() < 1e-9);
        assert!((back.y - world.y).abs() < 1e-9);
        assert_eq!(viewport.zoom_percent(), 250);
    }

    #[test]
    fn test_selection_is_exclusive() {
        let selection = Selection::Entity(Entity::new("1", "Alice", "Person"));
        assert!(selection.selected_entity().is_some());
        assert!(selection.selected_relation().is_none());
        assert!(Selection::default().is_empty());
    }
}
