//! The producer contract every pipeline stage speaks.
//!
//! An [`ImageSource`] is anything that can be asked for a rectangle of
//! raster data at a resolution level: a format reader adapter, an
//! in-memory layer, or a filter wrapping another source. Chains are built
//! by value, each filter owning its upstream, and data flows only on
//! demand when a consumer pulls a tile.
//!
//! # Contract
//!
//! - `get_tile` returns an owned tile covering exactly the requested
//!   rectangle, or `None` when the source cannot produce one (level out
//!   of range, unrecoverable upstream failure). Failure is expressed by
//!   degrading, never by panicking across the pull path.
//! - Resolution level `r` halves the pixel space `r` times; a source
//!   advertises how many levels it carries via `decimation_levels`.
//! - Radiometric declarations (`null_value`, `min_value`, `max_value`)
//!   are in the `f64` currency and hold for every tile the source
//!   produces.
//!
//! The `&mut self` receiver on `get_tile` is deliberate: sources may keep
//! internal cursors or scratch state, and the exclusive borrow keeps a
//! chain single-writer without any locking.

pub mod memory;

use crate::geom::IRect;
use crate::pixel::ScalarKind;
use crate::tile::RasterTile;

pub use memory::MemorySource;

/// A pull-driven producer of raster tiles.
pub trait ImageSource: Send {
    /// Produces the tile covering `rect` at resolution level `rlevel`.
    ///
    /// The returned tile's rectangle equals `rect`. Regions the source
    /// does not cover are filled with the band null and reflected in the
    /// tile's status. `None` means the source cannot answer at all.
    fn get_tile(&mut self, rect: IRect, rlevel: u32) -> Option<RasterTile>;

    /// The full extent of this source at `rlevel`, or `None` when the
    /// source has no defined extent there.
    fn bounding_rect(&self, rlevel: u32) -> Option<IRect>;

    /// Number of bands in every produced tile.
    fn band_count(&self) -> u32;

    /// The scalar kind of every produced tile.
    fn scalar_kind(&self) -> ScalarKind;

    /// The null sentinel declared for `band`.
    fn null_value(&self, band: u32) -> f64 {
        let _ = band;
        self.scalar_kind().default_null()
    }

    /// The smallest valid value declared for `band`.
    fn min_value(&self, band: u32) -> f64 {
        let _ = band;
        self.scalar_kind().default_min()
    }

    /// The largest valid value declared for `band`.
    fn max_value(&self, band: u32) -> f64 {
        let _ = band;
        self.scalar_kind().default_max()
    }

    /// Preferred tile width in pixels; 0 means no preference.
    fn tile_width(&self) -> i32 {
        0
    }

    /// Preferred tile height in pixels; 0 means no preference.
    fn tile_height(&self) -> i32 {
        0
    }

    /// Number of resolution levels available, level 0 included.
    fn decimation_levels(&self) -> u32 {
        1
    }
}

impl<S: ImageSource + ?Sized> ImageSource for &mut S {
    fn get_tile(&mut self, rect: IRect, rlevel: u32) -> Option<RasterTile> {
        (**self).get_tile(rect, rlevel)
    }

    fn bounding_rect(&self, rlevel: u32) -> Option<IRect> {
        (**self).bounding_rect(rlevel)
    }

    fn band_count(&self) -> u32 {
        (**self).band_count()
    }

    fn scalar_kind(&self) -> ScalarKind {
        (**self).scalar_kind()
    }

    fn null_value(&self, band: u32) -> f64 {
        (**self).null_value(band)
    }

    fn min_value(&self, band: u32) -> f64 {
        (**self).min_value(band)
    }

    fn max_value(&self, band: u32) -> f64 {
        (**self).max_value(band)
    }

    fn tile_width(&self) -> i32 {
        (**self).tile_width()
    }

    fn tile_height(&self) -> i32 {
        (**self).tile_height()
    }

    fn decimation_levels(&self) -> u32 {
        (**self).decimation_levels()
    }
}

impl<S: ImageSource + ?Sized> ImageSource for Box<S> {
    fn get_tile(&mut self, rect: IRect, rlevel: u32) -> Option<RasterTile> {
        (**self).get_tile(rect, rlevel)
    }

    fn bounding_rect(&self, rlevel: u32) -> Option<IRect> {
        (**self).bounding_rect(rlevel)
    }

    fn band_count(&self) -> u32 {
        (**self).band_count()
    }

    fn scalar_kind(&self) -> ScalarKind {
        (**self).scalar_kind()
    }

    fn null_value(&self, band: u32) -> f64 {
        (**self).null_value(band)
    }

    fn min_value(&self, band: u32) -> f64 {
        (**self).min_value(band)
    }

    fn max_value(&self, band: u32) -> f64 {
        (**self).max_value(band)
    }

    fn tile_width(&self) -> i32 {
        (**self).tile_width()
    }

    fn tile_height(&self) -> i32 {
        (**self).tile_height()
    }

    fn decimation_levels(&self) -> u32 {
        (**self).decimation_levels()
    }
}
