//! Half-open numeric intervals and axis-aligned rectangles.
//!
//! `Range` follows the `[min, max)` convention for containment.  The grid
//! index treats its extent as closed on insertion (see
//! [`Range::contains_inclusive`]) so that an object sitting exactly on the
//! far edge of a network's bounding box can still be indexed.

use tdm_core::Point;

// ── Range ─────────────────────────────────────────────────────────────────────

/// Half-open interval `[min, max)`.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    /// Build a range from two bounds in either order.
    #[inline]
    pub fn new(a: f64, b: f64) -> Self {
        if a <= b { Self { min: a, max: b } } else { Self { min: b, max: a } }
    }

    #[inline]
    pub fn width(self) -> f64 {
        self.max - self.min
    }

    /// `min <= v < max`.
    #[inline]
    pub fn contains(self, v: f64) -> bool {
        self.min <= v && v < self.max
    }

    /// `min <= v <= max`.
    #[inline]
    pub fn contains_inclusive(self, v: f64) -> bool {
        self.min <= v && v <= self.max
    }

    /// `true` if the two half-open intervals share at least one value.
    #[inline]
    pub fn overlaps(self, other: Range) -> bool {
        self.min < other.max && other.min < self.max
    }

    /// `true` if `other` lies entirely within `self`.
    #[inline]
    pub fn contains_range(self, other: Range) -> bool {
        self.min <= other.min && other.max <= self.max
    }

    /// Grow by `margin` on both ends.
    #[inline]
    pub fn expanded(self, margin: f64) -> Self {
        Self { min: self.min - margin, max: self.max + margin }
    }
}

// ── Rectangle ─────────────────────────────────────────────────────────────────

/// Axis-aligned rectangle made of an x and a y [`Range`].
#[derive(Copy, Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rectangle {
    pub x: Range,
    pub y: Range,
}

impl Rectangle {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { x: Range::new(min_x, max_x), y: Range::new(min_y, max_y) }
    }

    /// Bounding rectangle of `points`, or `None` if the iterator is empty.
    pub fn from_points<I: IntoIterator<Item = Point>>(points: I) -> Option<Self> {
        let mut it = points.into_iter();
        let first = it.next()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in it {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self::new(min_x, min_y, max_x, max_y))
    }

    #[inline]
    pub fn width(self) -> f64 {
        self.x.width()
    }

    #[inline]
    pub fn height(self) -> f64 {
        self.y.width()
    }

    /// Half-open containment on both axes.
    #[inline]
    pub fn contains_point(self, p: Point) -> bool {
        self.x.contains(p.x) && self.y.contains(p.y)
    }

    #[inline]
    pub fn overlaps(self, other: Rectangle) -> bool {
        self.x.overlaps(other.x) && self.y.overlaps(other.y)
    }

    #[inline]
    pub fn contains_rect(self, other: Rectangle) -> bool {
        self.x.contains_range(other.x) && self.y.contains_range(other.y)
    }

    pub fn expanded(self, margin: f64) -> Self {
        Self { x: self.x.expanded(margin), y: self.y.expanded(margin) }
    }
}
