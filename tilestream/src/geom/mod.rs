//! Integer pixel-space geometry for tile addressing.
//!
//! All raster addressing in this crate happens in a signed 32-bit pixel
//! space. A [`IRect`] stores its corners inclusively: a rectangle from
//! `(0, 0)` to `(63, 63)` is exactly 64×64 pixels. Decimation levels halve
//! the space per level, so the same scene shrinks as the level rises.
//!
//! # Architecture
//!
//! - [`IPoint`] / [`ISize`] - plain value types for positions and extents
//! - [`IRect`] - inclusive corner rectangle with intersection, union,
//!   decimation and grid-alignment operations
//!
//! Interior arithmetic widens to `i64` so that rectangles spanning the full
//! `i32` range never overflow while computing widths or areas. Operations
//! that must produce `i32` pixel coordinates report failure instead of
//! wrapping.
//!
//! # Example
//!
//! ```
//! use tilestream::geom::{IPoint, IRect};
//!
//! let aoi = IRect::from_bounds(0, 0, 255, 191);
//! assert_eq!(aoi.width(), 256);
//! assert_eq!(aoi.height(), 192);
//! assert!(aoi.contains(IPoint::new(200, 100)));
//!
//! // One decimation level halves both axes.
//! let half = aoi.decimated(1);
//! assert_eq!(half, IRect::from_bounds(0, 0, 127, 95));
//! ```

pub mod point;
pub mod rect;

pub use point::{IPoint, ISize};
pub use rect::{IRect, RectParseError};
