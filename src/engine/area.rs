//! Half-open byte ranges of a file
//!
//! An [`Area`] is `[offset, offset + length)`. Partitions are indexed by
//! area, so the algebra here decides which ranges still need to be read
//! and which partitions must be merged.

use super::error::AreaError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-open byte range `[offset, offset + length)`
///
/// Ordering is by offset, then by length, which keeps an empty area
/// ahead of a non-empty one starting at the same byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Area {
    /// First byte of the range
    pub offset: u64,
    /// Number of bytes in the range
    pub length: u64,
}

impl Area {
    /// Create an area
    #[inline]
    pub const fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// Create an area from start and end offsets (`end` exclusive)
    #[inline]
    pub fn from_bounds(start: u64, end: u64) -> Self {
        Self::new(start, end.saturating_sub(start))
    }

    /// First byte past the range
    #[inline]
    pub const fn end(&self) -> u64 {
        self.offset + self.length
    }

    /// Whether the range holds no bytes
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Whether `offset` lies inside the range
    #[inline]
    pub const fn contains(&self, offset: u64) -> bool {
        offset >= self.offset && offset < self.end()
    }

    /// Whether `other` lies completely inside this area
    pub fn contains_wholly(&self, other: &Area) -> bool {
        other.offset >= self.offset && other.end() <= self.end()
    }

    /// Whether the two areas share at least one byte
    ///
    /// Symmetric: `a.overlaps(&b) == b.overlaps(&a)`. Empty areas overlap
    /// nothing.
    pub fn overlaps(&self, other: &Area) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.offset < other.end()
            && other.offset < self.end()
    }

    /// Whether `other` covers the first byte of this area
    pub fn overlaps_at_start(&self, other: &Area) -> bool {
        !self.is_empty() && other.contains(self.offset)
    }

    /// Whether `other` covers the last byte of this area
    pub fn overlaps_at_end(&self, other: &Area) -> bool {
        !self.is_empty() && other.contains(self.end() - 1)
    }

    /// Whether the areas touch without a gap or overlap
    pub fn is_adjacent(&self, other: &Area) -> bool {
        self.end() == other.offset || other.end() == self.offset
    }

    /// Shared bytes of both areas, if any
    pub fn intersection(&self, other: &Area) -> Option<Area> {
        if !self.overlaps(other) {
            return None;
        }
        let start = self.offset.max(other.offset);
        let end = self.end().min(other.end());
        Some(Area::from_bounds(start, end))
    }

    /// Subtract `other` from this area
    ///
    /// Returns the remaining pieces in ascending order: none when `other`
    /// covers this area, one when it cuts a side off, two when it punches
    /// a hole. An area that does not overlap is returned unchanged.
    pub fn cut(&self, other: &Area) -> Vec<Area> {
        if !self.overlaps(other) {
            return vec![*self];
        }

        let mut rest = Vec::with_capacity(2);
        if other.offset > self.offset {
            rest.push(Area::from_bounds(self.offset, other.offset));
        }
        if other.end() < self.end() {
            rest.push(Area::from_bounds(other.end(), self.end()));
        }
        rest
    }

    /// Merge two directly adjacent areas
    ///
    /// The argument order does not matter.
    pub fn extend(&self, other: &Area) -> Result<Area, AreaError> {
        if self.end() == other.offset {
            Ok(Area::new(self.offset, self.length + other.length))
        } else if other.end() == self.offset {
            Ok(Area::new(other.offset, self.length + other.length))
        } else {
            Err(AreaError::NotAdjacent {
                left: *self,
                right: *other,
            })
        }
    }

    /// Move the area by a signed byte delta
    pub fn shifted(&self, delta: i64) -> Area {
        Area::new(self.offset.saturating_add_signed(delta), self.length)
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.offset, self.end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_wholly() {
        let outer = Area::new(10, 20);
        assert!(outer.contains_wholly(&Area::new(10, 20)));
        assert!(outer.contains_wholly(&Area::new(15, 5)));
        assert!(!outer.contains_wholly(&Area::new(5, 10)));
        assert!(!outer.contains_wholly(&Area::new(25, 10)));
    }

    #[test]
    fn test_overlaps_directional() {
        let area = Area::new(10, 10);
        assert!(area.overlaps_at_start(&Area::new(5, 6)));
        assert!(!area.overlaps_at_start(&Area::new(5, 5)));
        assert!(area.overlaps_at_end(&Area::new(19, 5)));
        assert!(!area.overlaps_at_end(&Area::new(20, 5)));
        assert!(!Area::new(10, 0).overlaps(&Area::new(0, 20)));
        assert!(!Area::new(0, 20).overlaps(&Area::new(10, 0)));
        assert_eq!(Area::new(10, 0).intersection(&Area::new(0, 20)), None);
        assert_eq!(Area::new(10, 0).cut(&Area::new(0, 20)), vec![Area::new(10, 0)]);
    }

    #[test]
    fn test_cut() {
        let area = Area::new(10, 10);
        assert!(area.cut(&Area::new(0, 40)).is_empty());
        assert_eq!(area.cut(&Area::new(0, 15)), vec![Area::new(15, 5)]);
        assert_eq!(area.cut(&Area::new(15, 15)), vec![Area::new(10, 5)]);
        assert_eq!(
            area.cut(&Area::new(12, 3)),
            vec![Area::new(10, 2), Area::new(15, 5)]
        );
        assert_eq!(area.cut(&Area::new(30, 3)), vec![area]);
    }

    #[test]
    fn test_extend() {
        let left = Area::new(0, 10);
        let right = Area::new(10, 10);
        assert_eq!(left.extend(&right), Ok(Area::new(0, 20)));
        assert_eq!(right.extend(&left), Ok(Area::new(0, 20)));
        assert!(left.extend(&Area::new(11, 3)).is_err());
    }

    #[test]
    fn test_intersection_and_shift() {
        let a = Area::new(0, 10);
        assert_eq!(a.intersection(&Area::new(5, 10)), Some(Area::new(5, 5)));
        assert_eq!(a.intersection(&Area::new(10, 10)), None);
        assert_eq!(Area::new(10, 4).shifted(-3), Area::new(7, 4));
        assert_eq!(Area::new(10, 4).shifted(5), Area::new(15, 4));
    }

    #[test]
    fn test_ordering_puts_empty_first() {
        let mut areas = vec![Area::new(5, 3), Area::new(5, 0), Area::new(0, 5)];
        areas.sort();
        assert_eq!(areas, vec![Area::new(0, 5), Area::new(5, 0), Area::new(5, 3)]);
    }
}
