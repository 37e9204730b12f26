//! Logical monitors: placed regions of the logical coordinate space.

use madori_state::Transform;

use crate::geometry::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

/// One region of the logical coordinate space. Several monitors back the same
/// logical monitor when they mirror each other.
#[derive(Debug, Clone)]
pub struct LogicalMonitor {
    /// Sequential number within the current layout, starting from 0.
    pub number: usize,
    /// Stable token of the first backing monitor.
    pub winsys_id: u64,
    /// Position and size in logical pixels.
    pub rect: Rect,
    pub scale: f64,
    pub transform: Transform,
    pub is_primary: bool,
    /// Only set when every backing monitor is a presentation display.
    pub is_presentation: bool,
    /// Indices of the backing monitors in the manager's monitor list.
    pub monitors: Vec<usize>,
}

impl LogicalMonitor {
    /// Whether `neighbor` is directly adjacent in the given direction: the
    /// facing edges are flush and the orthogonal extents overlap with
    /// non-zero length.
    pub fn has_neighbor(&self, neighbor: &LogicalMonitor, direction: Direction) -> bool {
        let rect = self.rect;
        let other = neighbor.rect;

        match direction {
            Direction::Right => other.x == rect.x + rect.w && other.vert_overlap(rect),
            Direction::Left => other.x + other.w == rect.x && other.vert_overlap(rect),
            Direction::Down => other.y == rect.y + rect.h && other.horiz_overlap(rect),
            Direction::Up => other.y + other.h == rect.y && other.horiz_overlap(rect),
        }
    }
}
