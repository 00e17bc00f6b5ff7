//! Inclusive integer rectangles.

use std::fmt;
use std::str::FromStr;

use super::point::{IPoint, ISize};

/// An axis-aligned rectangle with inclusive corners.
///
/// `min` is the upper-left pixel and `max` the lower-right pixel, and both
/// belong to the rectangle. A rectangle where either `max` axis falls below
/// the matching `min` axis is degenerate: it covers no pixels and most
/// operations treat it as an identity or skip value.
///
/// Widths, heights and areas are computed in `i64` so corners may sit
/// anywhere in the `i32` range without overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IRect {
    /// Upper-left corner (inclusive)
    pub min: IPoint,
    /// Lower-right corner (inclusive)
    pub max: IPoint,
}

impl IRect {
    /// Creates a rectangle from two inclusive corners.
    #[inline]
    pub const fn new(min: IPoint, max: IPoint) -> Self {
        Self { min, max }
    }

    /// Creates a rectangle from inclusive corner coordinates.
    #[inline]
    pub const fn from_bounds(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self {
            min: IPoint::new(x0, y0),
            max: IPoint::new(x1, y1),
        }
    }

    /// Creates a rectangle from an origin and a size.
    ///
    /// Returns `None` when the size is empty or when the far corner would
    /// not fit in `i32` coordinates. Tile grids near the coordinate limits
    /// use this to detect that a tile origin is addressable but its extent
    /// is not.
    pub fn from_origin_size(origin: IPoint, size: ISize) -> Option<Self> {
        if size.is_empty() {
            return None;
        }
        let max_x = origin.x as i64 + size.width as i64 - 1;
        let max_y = origin.y as i64 + size.height as i64 - 1;
        if max_x > i32::MAX as i64 || max_y > i32::MAX as i64 {
            return None;
        }
        Some(Self {
            min: origin,
            max: IPoint::new(max_x as i32, max_y as i32),
        })
    }

    /// A canonical degenerate rectangle covering no pixels.
    #[inline]
    pub const fn empty() -> Self {
        Self::from_bounds(0, 0, -1, -1)
    }

    /// Returns true when the rectangle covers no pixels.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.max.x < self.min.x || self.max.y < self.min.y
    }

    /// Width in pixels, zero when degenerate.
    #[inline]
    pub fn width(&self) -> i64 {
        (self.max.x as i64 - self.min.x as i64 + 1).max(0)
    }

    /// Height in pixels, zero when degenerate.
    #[inline]
    pub fn height(&self) -> i64 {
        (self.max.y as i64 - self.min.y as i64 + 1).max(0)
    }

    /// Extent as an [`ISize`].
    ///
    /// Saturates axes that exceed `i32::MAX` pixels; such rectangles only
    /// arise when a corner sits at each end of the coordinate range.
    #[inline]
    pub fn size(&self) -> ISize {
        ISize::new(
            self.width().min(i32::MAX as i64) as i32,
            self.height().min(i32::MAX as i64) as i32,
        )
    }

    /// Total pixel count, zero when degenerate.
    #[inline]
    pub fn area(&self) -> i64 {
        self.width().saturating_mul(self.height())
    }

    /// Returns true when `point` lies inside the rectangle.
    #[inline]
    pub fn contains(&self, point: IPoint) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    /// Returns true when `other` lies entirely inside the rectangle.
    ///
    /// A degenerate `other` is never contained.
    #[inline]
    pub fn contains_rect(&self, other: &IRect) -> bool {
        !other.is_degenerate() && self.contains(other.min) && self.contains(other.max)
    }

    /// Returns true when the rectangles share at least one pixel.
    #[inline]
    pub fn intersects(&self, other: &IRect) -> bool {
        !self.intersection(other).is_degenerate()
    }

    /// The overlapping region of two rectangles.
    ///
    /// Disjoint or degenerate inputs produce a degenerate result; callers
    /// check [`IRect::is_degenerate`] before using it.
    #[inline]
    pub fn intersection(&self, other: &IRect) -> IRect {
        IRect::from_bounds(
            self.min.x.max(other.min.x),
            self.min.y.max(other.min.y),
            self.max.x.min(other.max.x),
            self.max.y.min(other.max.y),
        )
    }

    /// The smallest rectangle covering both inputs.
    ///
    /// A degenerate operand contributes nothing, so combining with one is
    /// an identity.
    pub fn combined(&self, other: &IRect) -> IRect {
        if self.is_degenerate() {
            return *other;
        }
        if other.is_degenerate() {
            return *self;
        }
        IRect::from_bounds(
            self.min.x.min(other.min.x),
            self.min.y.min(other.min.y),
            self.max.x.max(other.max.x),
            self.max.y.max(other.max.y),
        )
    }

    /// The rectangle scaled down by `2^level`.
    ///
    /// Corners divide with floor semantics so negative coordinates shrink
    /// toward negative infinity, keeping adjacent rectangles adjacent after
    /// decimation. Level 0 is the identity.
    pub fn decimated(&self, level: u32) -> IRect {
        if level == 0 {
            return *self;
        }
        let scale = 1i64 << level.min(62);
        let shrink = |v: i32| ((v as i64).div_euclid(scale)) as i32;
        IRect::from_bounds(
            shrink(self.min.x),
            shrink(self.min.y),
            shrink(self.max.x),
            shrink(self.max.y),
        )
    }

    /// The smallest rectangle containing `self` whose corners align to a
    /// `cell`-pixel grid.
    ///
    /// The result's origin is a multiple of `cell` on both axes and its
    /// width and height are multiples of `cell`. Coordinates that would
    /// leave the `i32` range clamp to it, which can only happen within one
    /// cell of the range limits. A `cell` below 1 is treated as 1.
    pub fn stretched_to_grid(&self, cell: i32) -> IRect {
        let cell = cell.max(1) as i64;
        let floor_mult = |v: i32| -> i64 { (v as i64).div_euclid(cell) * cell };
        let ceil_mult = |v: i64| -> i64 { -((-v).div_euclid(cell)) * cell };
        let clamp = |v: i64| v.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
        IRect::from_bounds(
            clamp(floor_mult(self.min.x)),
            clamp(floor_mult(self.min.y)),
            clamp(ceil_mult(self.max.x as i64 + 1) - 1),
            clamp(ceil_mult(self.max.y as i64 + 1) - 1),
        )
    }
}

impl Default for IRect {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for IRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.min.x, self.min.y, self.max.x, self.max.y
        )
    }
}

/// Errors produced when parsing a rectangle from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RectParseError {
    /// The text did not split into exactly four fields
    WrongFieldCount(usize),
    /// A field was not a valid `i32`
    InvalidField(String),
}

impl fmt::Display for RectParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RectParseError::WrongFieldCount(n) => {
                write!(f, "expected 4 whitespace-separated integers, found {}", n)
            }
            RectParseError::InvalidField(field) => {
                write!(f, "'{}' is not a valid i32 coordinate", field)
            }
        }
    }
}

impl std::error::Error for RectParseError {}

impl FromStr for IRect {
    type Err = RectParseError;

    /// Parses `"x0 y0 x1 y1"`, the same format [`IRect`] displays as.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split_whitespace().collect();
        if fields.len() != 4 {
            return Err(RectParseError::WrongFieldCount(fields.len()));
        }
        let mut values = [0i32; 4];
        for (slot, field) in values.iter_mut().zip(&fields) {
            *slot = field
                .parse()
                .map_err(|_| RectParseError::InvalidField((*field).to_string()))?;
        }
        Ok(IRect::from_bounds(values[0], values[1], values[2], values[3]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_height_inclusive() {
        let rect = IRect::from_bounds(0, 0, 63, 63);
        assert_eq!(rect.width(), 64);
        assert_eq!(rect.height(), 64);
        assert_eq!(rect.area(), 4096);

        let single = IRect::from_bounds(5, 5, 5, 5);
        assert_eq!(single.width(), 1);
        assert_eq!(single.area(), 1);
    }

    #[test]
    fn test_full_range_no_overflow() {
        let rect = IRect::from_bounds(i32::MIN, i32::MIN, i32::MAX, i32::MAX);
        assert_eq!(rect.width(), 1i64 << 32);
        assert_eq!(rect.height(), 1i64 << 32);
        assert!(!rect.is_degenerate());
    }

    #[test]
    fn test_degenerate() {
        assert!(IRect::empty().is_degenerate());
        assert!(IRect::from_bounds(10, 0, 9, 5).is_degenerate());
        assert_eq!(IRect::empty().width(), 0);
        assert_eq!(IRect::empty().area(), 0);
    }

    #[test]
    fn test_from_origin_size() {
        let rect = IRect::from_origin_size(IPoint::new(10, 20), ISize::new(64, 32));
        assert_eq!(rect, Some(IRect::from_bounds(10, 20, 73, 51)));

        assert!(IRect::from_origin_size(IPoint::new(0, 0), ISize::new(0, 32)).is_none());

        // A far corner past i32::MAX is rejected rather than wrapped.
        let near_edge = IRect::from_origin_size(IPoint::new(i32::MAX - 10, 0), ISize::new(64, 8));
        assert!(near_edge.is_none());

        // Exactly reaching the boundary still works.
        let at_edge = IRect::from_origin_size(IPoint::new(i32::MAX - 63, 0), ISize::new(64, 8));
        assert_eq!(at_edge.map(|r| r.max.x), Some(i32::MAX));
    }

    #[test]
    fn test_contains() {
        let rect = IRect::from_bounds(-10, -10, 10, 10);
        assert!(rect.contains(IPoint::new(-10, -10)));
        assert!(rect.contains(IPoint::new(10, 10)));
        assert!(!rect.contains(IPoint::new(11, 0)));
        assert!(rect.contains_rect(&IRect::from_bounds(0, 0, 5, 5)));
        assert!(!rect.contains_rect(&IRect::from_bounds(0, 0, 11, 5)));
        assert!(!rect.contains_rect(&IRect::empty()));
    }

    #[test]
    fn test_intersection() {
        let a = IRect::from_bounds(0, 0, 10, 10);
        let b = IRect::from_bounds(5, 5, 20, 20);
        assert_eq!(a.intersection(&b), IRect::from_bounds(5, 5, 10, 10));

        let disjoint = IRect::from_bounds(100, 100, 110, 110);
        assert!(a.intersection(&disjoint).is_degenerate());
        assert!(!a.intersects(&disjoint));

        // Touching at a single shared pixel still intersects.
        let corner = IRect::from_bounds(10, 10, 20, 20);
        assert_eq!(a.intersection(&corner), IRect::from_bounds(10, 10, 10, 10));
    }

    #[test]
    fn test_combined() {
        let a = IRect::from_bounds(0, 0, 10, 10);
        let b = IRect::from_bounds(20, -5, 30, 5);
        assert_eq!(a.combined(&b), IRect::from_bounds(0, -5, 30, 10));

        assert_eq!(a.combined(&IRect::empty()), a);
        assert_eq!(IRect::empty().combined(&b), b);
    }

    #[test]
    fn test_decimated() {
        let rect = IRect::from_bounds(0, 0, 255, 255);
        assert_eq!(rect.decimated(0), rect);
        assert_eq!(rect.decimated(1), IRect::from_bounds(0, 0, 127, 127));
        assert_eq!(rect.decimated(3), IRect::from_bounds(0, 0, 31, 31));
    }

    #[test]
    fn test_decimated_negative_floors() {
        // Floor division keeps -1 on the negative side of the origin.
        let rect = IRect::from_bounds(-4, -4, 3, 3);
        assert_eq!(rect.decimated(1), IRect::from_bounds(-2, -2, 1, 1));
        assert_eq!(rect.decimated(2), IRect::from_bounds(-1, -1, 0, 0));

        let odd = IRect::from_bounds(-3, -1, 2, 2);
        assert_eq!(odd.decimated(1), IRect::from_bounds(-2, -1, 1, 1));
    }

    #[test]
    fn test_stretched_to_grid() {
        let rect = IRect::from_bounds(5, 40, 70, 100);
        let aligned = rect.stretched_to_grid(32);
        assert_eq!(aligned, IRect::from_bounds(0, 32, 95, 127));
        assert!(aligned.contains_rect(&rect));
        assert_eq!(aligned.width() % 32, 0);
        assert_eq!(aligned.height() % 32, 0);
    }

    #[test]
    fn test_stretched_to_grid_negative() {
        let rect = IRect::from_bounds(-33, -1, -1, 0);
        let aligned = rect.stretched_to_grid(32);
        assert_eq!(aligned, IRect::from_bounds(-64, -32, -1, 31));
    }

    #[test]
    fn test_already_aligned_is_identity() {
        let rect = IRect::from_bounds(-64, 0, 63, 31);
        assert_eq!(rect.stretched_to_grid(32), rect);
    }

    #[test]
    fn test_parse_round_trip() {
        let rect = IRect::from_bounds(-12, 7, 1000, 2000);
        let parsed: IRect = rect.to_string().parse().unwrap();
        assert_eq!(parsed, rect);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "1 2 3".parse::<IRect>(),
            Err(RectParseError::WrongFieldCount(3))
        );
        assert_eq!(
            "1 2 3 x".parse::<IRect>(),
            Err(RectParseError::InvalidField("x".to_string()))
        );
    }

    // ========================================================================
    // Property-Based Tests
    // ========================================================================

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn arb_rect() -> impl Strategy<Value = IRect> {
            (
                -100_000i32..100_000,
                -100_000i32..100_000,
                0i32..1000,
                0i32..1000,
            )
                .prop_map(|(x, y, w, h)| IRect::from_bounds(x, y, x + w, y + h))
        }

        proptest! {
            #[test]
            fn intersection_is_commutative(a in arb_rect(), b in arb_rect()) {
                prop_assert_eq!(a.intersection(&b), b.intersection(&a));
            }

            #[test]
            fn intersection_fits_both(a in arb_rect(), b in arb_rect()) {
                let isect = a.intersection(&b);
                if !isect.is_degenerate() {
                    prop_assert!(a.contains_rect(&isect));
                    prop_assert!(b.contains_rect(&isect));
                }
            }

            #[test]
            fn combined_covers_both(a in arb_rect(), b in arb_rect()) {
                let union = a.combined(&b);
                prop_assert!(union.contains_rect(&a));
                prop_assert!(union.contains_rect(&b));
            }

            #[test]
            fn decimation_never_grows(rect in arb_rect(), level in 0u32..16) {
                let shrunk = rect.decimated(level);
                prop_assert!(shrunk.width() <= rect.width());
                prop_assert!(shrunk.height() <= rect.height());
                prop_assert!(!shrunk.is_degenerate());
            }

            #[test]
            fn grid_stretch_aligns_and_covers(rect in arb_rect()) {
                let aligned = rect.stretched_to_grid(32);
                prop_assert!(aligned.contains_rect(&rect));
                prop_assert_eq!(aligned.min.x.rem_euclid(32), 0);
                prop_assert_eq!(aligned.min.y.rem_euclid(32), 0);
                prop_assert_eq!(aligned.width() % 32, 0);
                prop_assert_eq!(aligned.height() % 32, 0);
            }

            #[test]
            fn display_parse_round_trip(rect in arb_rect()) {
                let parsed: IRect = rect.to_string().parse().unwrap();
                prop_assert_eq!(parsed, rect);
            }
        }
    }
}
