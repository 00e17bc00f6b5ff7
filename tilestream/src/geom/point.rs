//! Integer point and size value types.

use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// A position in signed 32-bit pixel space.
///
/// Points are plain `Copy` values; arithmetic wraps through the standard
/// operators and is only defined where the caller knows the result stays in
/// range. Code that must survive coordinates near the `i32` limits widens to
/// `i64` before adding (see [`IRect::from_origin_size`]).
///
/// [`IRect::from_origin_size`]: crate::geom::IRect::from_origin_size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IPoint {
    /// Horizontal coordinate (east-positive)
    pub x: i32,
    /// Vertical coordinate (south-positive)
    pub y: i32,
}

impl IPoint {
    /// Creates a point at `(x, y)`.
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl Add for IPoint {
    type Output = IPoint;

    #[inline]
    fn add(self, rhs: IPoint) -> IPoint {
        IPoint::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for IPoint {
    #[inline]
    fn add_assign(&mut self, rhs: IPoint) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for IPoint {
    type Output = IPoint;

    #[inline]
    fn sub(self, rhs: IPoint) -> IPoint {
        IPoint::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for IPoint {
    #[inline]
    fn sub_assign(&mut self, rhs: IPoint) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Neg for IPoint {
    type Output = IPoint;

    #[inline]
    fn neg(self) -> IPoint {
        IPoint::new(-self.x, -self.y)
    }
}

impl fmt::Display for IPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A raster extent in pixels.
///
/// Unlike [`IPoint`], a size is a count rather than a coordinate, so both
/// axes are expected to be non-negative. A zero or negative axis marks the
/// size as empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ISize {
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
}

impl ISize {
    /// Creates a size of `width` by `height` pixels.
    #[inline]
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Returns true when either axis is zero or negative.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Total pixel count, zero when empty.
    #[inline]
    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }
}

impl fmt::Display for ISize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
