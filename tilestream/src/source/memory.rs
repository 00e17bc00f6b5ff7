//! An in-memory raster layer.
//!
//! [`MemorySource`] owns a single level-0 raster and serves any rectangle
//! of it through the [`ImageSource`] contract, synthesizing coarser
//! resolution levels by power-of-two nearest-neighbor sampling. It stands
//! in for a format reader wherever a chain needs a leaf: synthetic layers
//! in an embedding application, fixtures in tests, or scratch inputs to a
//! mosaic.

use crate::geom::{IPoint, IRect, ISize};
use crate::pixel::ScalarKind;
use crate::tile::pool::TilePool;
use crate::tile::RasterTile;

use super::ImageSource;

/// An [`ImageSource`] backed by one owned raster.
#[derive(Debug)]
pub struct MemorySource {
    image: RasterTile,
    levels: u32,
    tile_hint: ISize,
    pool: TilePool,
}

impl MemorySource {
    /// Creates a blank source covering `rect` with the given band count
    /// and kind, every sample at the band null.
    pub fn new(rect: IRect, bands: u32, kind: ScalarKind) -> Self {
        Self::from_tile(RasterTile::allocated(rect, bands, kind))
    }

    /// Wraps an existing raster; an unallocated tile is allocated blank.
    pub fn from_tile(mut image: RasterTile) -> Self {
        if image.buffer().is_none() {
            image.allocate();
        }
        Self {
            image,
            levels: 1,
            tile_hint: ISize::new(0, 0),
            pool: TilePool::new(),
        }
    }

    /// Declares `levels` synthetic resolution levels (at least 1).
    pub fn with_decimation_levels(mut self, levels: u32) -> Self {
        self.levels = levels.max(1);
        self
    }

    /// Advertises a preferred tile size to consumers.
    pub fn with_tile_hint(mut self, width: i32, height: i32) -> Self {
        self.tile_hint = ISize::new(width, height);
        self
    }

    /// The backing raster.
    pub fn image(&self) -> &RasterTile {
        &self.image
    }

    /// Mutable access to the backing raster, for painting content.
    pub fn image_mut(&mut self) -> &mut RasterTile {
        &mut self.image
    }
}

impl ImageSource for MemorySource {
    fn get_tile(&mut self, rect: IRect, rlevel: u32) -> Option<RasterTile> {
        if rlevel >= self.levels {
            return None;
        }
        let pool = self.pool.clone();
        let mut out = pool.acquire_for(&*self, rect);
        let bounds = self.image.rect().decimated(rlevel);
        let clip = rect.intersection(&bounds);
        if clip.is_degenerate() || out.buffer().is_none() {
            return Some(out);
        }
        if rlevel == 0 {
            out.load_tile(&self.image);
        } else {
            // Nearest neighbor: level-L pixel q reads full-res pixel q*2^L,
            // clamped into the image in case the edge block is short.
            let scale = 1i64 << rlevel.min(62);
            let full = self.image.rect();
            for band in 0..self.image.bands() {
                for y in clip.min.y..=clip.max.y {
                    let sy = (y as i64 * scale).clamp(full.min.y as i64, full.max.y as i64) as i32;
                    for x in clip.min.x..=clip.max.x {
                        let sx =
                            (x as i64 * scale).clamp(full.min.x as i64, full.max.x as i64) as i32;
                        if let Some(v) = self.image.sample(band, IPoint::new(sx, sy)) {
                            out.set_sample(band, IPoint::new(x, y), v);
                        }
                    }
                }
            }
        }
        out.validate();
        Some(out)
    }

    fn bounding_rect(&self, rlevel: u32) -> Option<IRect> {
        if rlevel >= self.levels {
            return None;
        }
        Some(self.image.rect().decimated(rlevel))
    }

    fn band_count(&self) -> u32 {
        self.image.bands()
    }

    fn scalar_kind(&self) -> ScalarKind {
        self.image.kind()
    }

    fn null_value(&self, band: u32) -> f64 {
        self.image.null_value(band)
    }

    fn min_value(&self, band: u32) -> f64 {
        self.image.min_value(band)
    }

    fn max_value(&self, band: u32) -> f64 {
        self.image.max_value(band)
    }

    fn tile_width(&self) -> i32 {
        self.tile_hint.width
    }

    fn tile_height(&self) -> i32 {
        self.tile_hint.height
    }

    fn decimation_levels(&self) -> u32 {
        self.levels
    }
}
