//! Integer rectangles in the logical coordinate space.

use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub w: i32,
    pub h: i32,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct Rect {
    #[cfg_attr(test, proptest(strategy = "-16384..16384i32"))]
    pub x: i32,
    #[cfg_attr(test, proptest(strategy = "-16384..16384i32"))]
    pub y: i32,
    #[cfg_attr(test, proptest(strategy = "0..16384i32"))]
    pub w: i32,
    #[cfg_attr(test, proptest(strategy = "0..16384i32"))]
    pub h: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl Size {
    pub fn new(w: i32, h: i32) -> Self {
        Self { w, h }
    }

    pub fn area(self) -> i64 {
        i64::from(self.w) * i64::from(self.h)
    }
}

impl Rect {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub fn size(self) -> Size {
        Size::new(self.w, self.h)
    }

    pub fn area(self) -> i64 {
        self.size().area()
    }

    pub fn contains(self, point: Point) -> bool {
        point.x >= self.x
            && point.x < self.x + self.w
            && point.y >= self.y
            && point.y < self.y + self.h
    }

    /// Whether the horizontal extents of the two rectangles overlap with non-zero length.
    pub fn horiz_overlap(self, other: Rect) -> bool {
        self.x < other.x + other.w && other.x < self.x + self.w
    }

    /// Whether the vertical extents of the two rectangles overlap with non-zero length.
    pub fn vert_overlap(self, other: Rect) -> bool {
        self.y < other.y + other.h && other.y < self.y + self.h
    }

    pub fn intersection(self, other: Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = (self.x + self.w).min(other.x + other.w);
        let bottom = (self.y + self.h).min(other.y + other.h);
        if right > x && bottom > y {
            Some(Rect::new(x, y, right - x, bottom - y))
        } else {
            None
        }
    }

    /// The smallest rectangle containing both.
    pub fn union(self, other: Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = (self.x + self.w).max(other.x + other.w);
        let bottom = (self.y + self.h).max(other.y + other.h);
        Rect::new(x, y, right - x, bottom - y)
    }
}
