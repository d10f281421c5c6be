use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in map pixels, laid out like a Tiled object
/// (top-left corner plus extent).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle of `size` whose top-left corner sits at `anchor + offset`.
    pub fn at(anchor: Vec2, offset: Vec2, size: Vec2) -> Self {
        let origin = anchor + offset;
        Self::new(origin.x, origin.y, size.x, size.y)
    }

    pub fn min(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn max(&self) -> Vec2 {
        Vec2::new(self.x + self.width, self.y + self.height)
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    /// Strict overlap; rectangles that only share an edge do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }

    /// Area shared with `other`; zero when they do not intersect.
    pub fn overlap_area(&self, other: &Rect) -> f32 {
        let width = (self.x + self.width).min(other.x + other.width) - self.x.max(other.x);
        let height = (self.y + self.height).min(other.y + other.height) - self.y.max(other.y);
        width.max(0.0) * height.max(0.0)
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.x + other.width <= self.x + self.width
            && other.y + other.height <= self.y + self.height
    }

    pub fn translated(&self, delta: Vec2) -> Self {
        Self::new(self.x + delta.x, self.y + delta.y, self.width, self.height)
    }
}

/// Screen-space direction; `Down` grows the y coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }

    pub fn unit(self) -> Vec2 {
        match self {
            Direction::Up => Vec2::new(0.0, -1.0),
            Direction::Down => Vec2::new(0.0, 1.0),
            Direction::Left => Vec2::new(-1.0, 0.0),
            Direction::Right => Vec2::new(1.0, 0.0),
        }
    }

    pub fn walk_animation(self) -> String {
        format!("walk-{}", self.as_str())
    }

    pub fn idle_animation(self) -> String {
        format!("idle-{}", self.as_str())
    }

    /// Facing for a waypoint move. Any horizontal delta wins; the vertical
    /// axis is only consulted when the move is purely vertical.
    pub fn of_step(delta: Vec2) -> Option<Self> {
        if delta.x > 0.0 {
            Some(Direction::Right)
        } else if delta.x < 0.0 {
            Some(Direction::Left)
        } else if delta.y > 0.0 {
            Some(Direction::Down)
        } else if delta.y < 0.0 {
            Some(Direction::Up)
        } else {
            None
        }
    }
}
