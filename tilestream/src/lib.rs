//! Tilestream - Pull-based tiled raster pipeline
//!
//! This library moves large rasters through a chain of
//! [`source::ImageSource`] stages one tile at a time. A consumer at the
//! downstream end asks for rectangles; each stage pulls what it needs
//! from its upstream, transforms it, and hands the tile down. Nothing in
//! the chain ever buffers a whole image, so the working set stays at a
//! few tiles regardless of raster size.
//!
//! # Pipeline stages
//!
//! - [`source`]: the [`source::ImageSource`] capability trait and an
//!   in-memory source for small rasters and tests
//! - [`sequencer`]: row-major tile iteration over an area of interest
//! - [`mosaic`]: combines overlapping inputs under a merge policy
//! - [`lut`]: band value remapping and index-to-RGB colorization
//! - [`histogram`]: whole-area statistics with progress reporting and
//!   cooperative cancellation
//! - [`parallel`]: stripe-partitioned multi-threaded drivers
//!
//! Supporting modules: [`tile`] (owned raster tiles and the buffer
//! pool), [`geom`] (inclusive integer rectangles), [`pixel`] (scalar
//! kinds and radiometry defaults), [`config`] (INI-backed property
//! trees), [`progress`], [`cancel`], [`error`] and [`logging`].
//!
//! # Example
//!
//! ```
//! use tilestream::geom::IRect;
//! use tilestream::mosaic::MosaicFilter;
//! use tilestream::pixel::ScalarKind;
//! use tilestream::sequencer::TileSequencer;
//! use tilestream::source::MemorySource;
//!
//! // Two overlapping scenes, mosaicked and driven tile by tile.
//! let mut west = MemorySource::new(IRect::from_bounds(0, 0, 63, 63), 1, ScalarKind::U8);
//! west.image_mut().fill(40.0);
//! west.image_mut().validate();
//! let mut east = MemorySource::new(IRect::from_bounds(32, 0, 95, 63), 1, ScalarKind::U8);
//! east.image_mut().fill(200.0);
//! east.image_mut().validate();
//!
//! let mut mosaic = MosaicFilter::new();
//! mosaic.add_input(west);
//! mosaic.add_input(east);
//!
//! // The union covers 96x64 pixels, a 3x2 grid of 32x32 tiles.
//! let mut seq = TileSequencer::new(mosaic).with_tile_size(32, 32);
//! let mut produced = 0;
//! while let Some(tile) = seq.get_next_tile() {
//!     assert_eq!(tile.rect().size().area(), 32 * 32);
//!     produced += 1;
//! }
//! assert_eq!(produced, 6);
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod geom;
pub mod histogram;
pub mod logging;
pub mod lut;
pub mod mosaic;
pub mod parallel;
pub mod pixel;
pub mod progress;
pub mod sequencer;
pub mod source;
pub mod tile;

/// Version of the tilestream library.
///
/// Defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_core_types_are_reachable() {
        use crate::geom::IRect;
        use crate::pixel::ScalarKind;
        use crate::tile::RasterTile;

        let tile = RasterTile::new(IRect::from_bounds(0, 0, 7, 7), 1, ScalarKind::U8);
        assert_eq!(tile.bands(), 1);
    }
}
