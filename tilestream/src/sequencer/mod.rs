//! Row-major tile iteration over an area of interest.
//!
//! A [`TileSequencer`] partitions its area of interest (AOI) into a grid
//! of uniform tiles, numbered row-major from the upper left, and pulls
//! them from its upstream source one at a time. It is the drive loop
//! behind writers and whole-area statistics: the consumer asks for "the
//! next tile" until the grid is exhausted.
//!
//! # Architecture
//!
//! - The grid is derived lazily: the first query initializes the AOI from
//!   the upstream bounding rectangle and the tile shape from the upstream
//!   hints, unless either was set explicitly.
//! - Edge tiles keep the uniform tile shape, extending past the AOI edge;
//!   the upstream fills uncovered pixels with nulls, so every produced
//!   tile has the same dimensions.
//! - An upstream miss (no tile, or a tile without a buffer) is replaced
//!   by a blank tile carrying the upstream's declared radiometry, so a
//!   drive loop always advances.
//! - Tile origin math runs in `i64` and must land back in `i32`; a grid
//!   tile whose rectangle would overflow is unaddressable and queries for
//!   it return `None` instead of wrapping.
//!
//! The sequencer is itself an [`ImageSource`], so it can sit mid-chain.
//! Its rectangle entry point is a passthrough unless inline histogram
//! collection is enabled, in which case serving a rectangle walks the
//! whole grid once and accumulates every AOI sample on the way (the
//! documented cost of collecting while serving).
//!
//! # Example
//!
//! ```
//! use tilestream::geom::IRect;
//! use tilestream::pixel::ScalarKind;
//! use tilestream::sequencer::TileSequencer;
//! use tilestream::source::MemorySource;
//!
//! let source = MemorySource::new(IRect::from_bounds(0, 0, 99, 99), 1, ScalarKind::U8)
//!     .with_tile_hint(64, 64);
//! let mut seq = TileSequencer::new(source);
//!
//! // 100x100 pixels under 64x64 tiles is a 2x2 grid.
//! assert_eq!(seq.total_tiles(), 4);
//! assert_eq!(seq.tiles().count(), 4);
//! ```

use tracing::debug;

use crate::config::{join_key, keys, Configurable, PropertyList};
use crate::error::PipelineResult;
use crate::geom::{IPoint, IRect, ISize};
use crate::histogram::MultiBandHistogram;
use crate::pixel::ScalarKind;
use crate::source::ImageSource;
use crate::tile::pool::TilePool;
use crate::tile::RasterTile;

/// Rows per strip when the upstream offers no tile-shape hint.
const DEFAULT_STRIP_ROWS: i32 = 64;

/// Drives row-major tile traversal of an AOI over an upstream source.
///
/// The sequencer owns its upstream; recover it with
/// [`TileSequencer::into_source`] when the drive is done.
#[derive(Debug)]
pub struct TileSequencer<S: ImageSource> {
    source: S,
    rlevel: u32,
    aoi: IRect,
    aoi_explicit: bool,
    tile_size: ISize,
    tile_size_explicit: bool,
    tiles_wide: i64,
    tiles_high: i64,
    cursor: i64,
    initialized: bool,
    pool: TilePool,
    collect: Option<MultiBandHistogram>,
}

impl<S: ImageSource> TileSequencer<S> {
    /// Creates a sequencer over `source` at resolution level 0.
    ///
    /// Nothing is pulled from the source yet; the grid forms on the first
    /// query.
    pub fn new(source: S) -> Self {
        Self {
            source,
            rlevel: 0,
            aoi: IRect::empty(),
            aoi_explicit: false,
            tile_size: ISize::new(0, 0),
            tile_size_explicit: false,
            tiles_wide: 0,
            tiles_high: 0,
            cursor: 0,
            initialized: false,
            pool: TilePool::new(),
            collect: None,
        }
    }

    /// Sets the resolution level all pulls happen at; the AOI and grid
    /// re-derive in that level's pixel space.
    pub fn with_rlevel(mut self, rlevel: u32) -> Self {
        self.rlevel = rlevel;
        self.initialized = false;
        self
    }

    /// Sets the AOI explicitly, in the pixel space of the drive level.
    pub fn with_area_of_interest(mut self, aoi: IRect) -> Self {
        self.set_area_of_interest(aoi);
        self
    }

    /// Sets the tile shape explicitly.
    pub fn with_tile_size(mut self, width: i32, height: i32) -> Self {
        self.set_tile_size(width, height);
        self
    }

    /// Replaces the AOI, recomputes the grid and rewinds the cursor.
    pub fn set_area_of_interest(&mut self, aoi: IRect) {
        self.aoi = aoi;
        self.aoi_explicit = true;
        self.recompute_grid();
        self.cursor = 0;
    }

    /// Replaces the tile shape, recomputes the grid and rewinds the
    /// cursor.
    pub fn set_tile_size(&mut self, width: i32, height: i32) {
        self.tile_size = ISize::new(width, height);
        self.tile_size_explicit = true;
        self.recompute_grid();
        self.cursor = 0;
    }

    /// Derives the grid: AOI from the upstream bounding rectangle and
    /// tile shape from the upstream hints, where not set explicitly, then
    /// rewinds.
    ///
    /// Runs implicitly on the first query; call it again to re-derive
    /// after the upstream's extent changed.
    pub fn initialize(&mut self) {
        if !self.aoi_explicit {
            self.aoi = self
                .source
                .bounding_rect(self.rlevel)
                .unwrap_or_else(IRect::empty);
        }
        if !self.tile_size_explicit {
            let hint = ISize::new(self.source.tile_width(), self.source.tile_height());
            self.tile_size = if hint.width > 0 && hint.height > 0 {
                hint
            } else {
                // No preference upstream: strips spanning the AOI.
                ISize::new(self.aoi.size().width.max(1), DEFAULT_STRIP_ROWS)
            };
        }
        self.recompute_grid();
        self.cursor = 0;
        self.initialized = true;
        debug!(
            "sequencer grid {}x{} tiles of {} over {}",
            self.tiles_wide, self.tiles_high, self.tile_size, self.aoi
        );
    }

    /// The AOI the grid covers (deriving it first if needed).
    pub fn area_of_interest(&mut self) -> IRect {
        self.ensure_initialized();
        self.aoi
    }

    /// The uniform tile shape (deriving it first if needed).
    pub fn tile_size(&mut self) -> ISize {
        self.ensure_initialized();
        self.tile_size
    }

    /// Grid width in tiles.
    pub fn tiles_wide(&mut self) -> i64 {
        self.ensure_initialized();
        self.tiles_wide
    }

    /// Grid height in tiles.
    pub fn tiles_high(&mut self) -> i64 {
        self.ensure_initialized();
        self.tiles_high
    }

    /// Total tiles in the grid; zero for a degenerate AOI.
    pub fn total_tiles(&mut self) -> i64 {
        self.ensure_initialized();
        self.tiles_wide * self.tiles_high
    }

    /// The tile id the next [`TileSequencer::get_next_tile`] will pull.
    pub fn current_tile_id(&self) -> i64 {
        self.cursor
    }

    /// Moves the drive back to the first tile.
    pub fn rewind(&mut self) {
        self.ensure_initialized();
        self.cursor = 0;
    }

    /// Upper-left pixel of grid tile `id`, or `None` when the id is out
    /// of the grid or the origin cannot be expressed in `i32`.
    pub fn tile_origin(&mut self, id: i64) -> Option<IPoint> {
        self.ensure_initialized();
        if id < 0 || self.tiles_wide <= 0 || self.tiles_high <= 0 {
            return None;
        }
        let row = id / self.tiles_wide;
        let col = id % self.tiles_wide;
        if row >= self.tiles_high {
            return None;
        }
        let x = self.aoi.min.x as i64 + col * self.tile_size.width as i64;
        let y = self.aoi.min.y as i64 + row * self.tile_size.height as i64;
        let x = i32::try_from(x).ok()?;
        let y = i32::try_from(y).ok()?;
        Some(IPoint::new(x, y))
    }

    /// Full rectangle of grid tile `id`, or `None` when any corner falls
    /// outside `i32` pixel space.
    pub fn tile_rect(&mut self, id: i64) -> Option<IRect> {
        self.ensure_initialized();
        let origin = self.tile_origin(id)?;
        IRect::from_origin_size(origin, self.tile_size)
    }

    /// Pulls the next tile in row-major order.
    ///
    /// Returns `None` once the grid is exhausted, and also for a tile
    /// whose rectangle is unaddressable; the cursor advances either way,
    /// so a manual drive loop may keep pulling past a bad tile while the
    /// [`TileSequencer::tiles`] iterator stops at the first `None`.
    pub fn get_next_tile(&mut self) -> Option<RasterTile> {
        self.ensure_initialized();
        if self.cursor >= self.tiles_wide * self.tiles_high {
            return None;
        }
        let id = self.cursor;
        self.cursor += 1;
        let rect = self.tile_rect(id)?;
        Some(self.fetch_or_blank(rect))
    }

    /// Pulls grid tile `id` without moving the cursor.
    ///
    /// An empty grid re-derives itself once first, so a source that
    /// reported no extent at construction gets a second chance.
    pub fn get_tile_by_id(&mut self, id: i64) -> Option<RasterTile> {
        self.ensure_initialized();
        if self.tiles_wide * self.tiles_high == 0 {
            self.initialize();
        }
        if id >= self.tiles_wide * self.tiles_high {
            return None;
        }
        let rect = self.tile_rect(id)?;
        Some(self.fetch_or_blank(rect))
    }

    /// Iterates the remaining tiles in row-major order.
    pub fn tiles(&mut self) -> Tiles<'_, S> {
        self.ensure_initialized();
        Tiles { seq: self }
    }

    /// Enables inline histogram collection on the rectangle entry point.
    ///
    /// While enabled, every [`ImageSource::get_tile`] call walks the full
    /// grid and accumulates all AOI samples into `hist` before answering;
    /// see the module docs for the cost trade.
    pub fn collect_histogram(&mut self, hist: MultiBandHistogram) {
        self.collect = Some(hist);
    }

    /// The histogram accumulated so far, when collection is enabled.
    pub fn collected_histogram(&self) -> Option<&MultiBandHistogram> {
        self.collect.as_ref()
    }

    /// Takes the accumulated histogram and disables collection.
    pub fn take_collected_histogram(&mut self) -> Option<MultiBandHistogram> {
        self.collect.take()
    }

    /// Consumes the sequencer, returning its upstream.
    pub fn into_source(self) -> S {
        self.source
    }

    /// The upstream source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Mutable access to the upstream source.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    fn ensure_initialized(&mut self) {
        if !self.initialized {
            self.initialize();
        }
    }

    fn recompute_grid(&mut self) {
        if self.aoi.is_degenerate() {
            self.tiles_wide = 0;
            self.tiles_high = 0;
            return;
        }
        let tw = self.tile_size.width.max(1) as i64;
        let th = self.tile_size.height.max(1) as i64;
        self.tiles_wide = (self.aoi.width() + tw - 1) / tw;
        self.tiles_high = (self.aoi.height() + th - 1) / th;
    }

    /// Pulls `rect` from upstream, substituting a blank tile with the
    /// upstream's radiometry when the pull yields nothing usable.
    fn fetch_or_blank(&mut self, rect: IRect) -> RasterTile {
        match self.source.get_tile(rect, self.rlevel) {
            Some(tile) if tile.buffer().is_some() => tile,
            _ => self.pool.acquire_for(&self.source, rect),
        }
    }

    /// Full-grid pass serving `rect` while feeding every AOI sample into
    /// the collection histogram.
    fn collecting_pass(&mut self, rect: IRect) -> Option<RasterTile> {
        self.ensure_initialized();
        let mut out = self.pool.acquire_for(&self.source, rect);
        let total = self.tiles_wide * self.tiles_high;
        let aoi = self.aoi;
        for id in 0..total {
            let tile_rect = match self.tile_rect(id) {
                Some(r) => r,
                None => continue,
            };
            let tile = self.fetch_or_blank(tile_rect);
            if let Some(hist) = self.collect.as_mut() {
                tile.populate_histogram(hist, &aoi);
            }
            out.load_tile(&tile);
        }
        out.validate();
        Some(out)
    }
}

impl<S: ImageSource> ImageSource for TileSequencer<S> {
    /// Serves `rect` from upstream.
    ///
    /// A plain passthrough, unless histogram collection is enabled and
    /// the query is at the drive level, in which case the whole grid is
    /// walked once (accumulating statistics) and the rectangle assembled
    /// from it.
    fn get_tile(&mut self, rect: IRect, rlevel: u32) -> Option<RasterTile> {
        if self.collect.is_some() && rlevel == self.rlevel {
            self.collecting_pass(rect)
        } else {
            self.source.get_tile(rect, rlevel)
        }
    }

    fn bounding_rect(&self, rlevel: u32) -> Option<IRect> {
        if rlevel == self.rlevel && (self.initialized || self.aoi_explicit) {
            Some(self.aoi)
        } else {
            self.source.bounding_rect(rlevel)
        }
    }

    fn band_count(&self) -> u32 {
        self.source.band_count()
    }

    fn scalar_kind(&self) -> ScalarKind {
        self.source.scalar_kind()
    }

    fn null_value(&self, band: u32) -> f64 {
        self.source.null_value(band)
    }

    fn min_value(&self, band: u32) -> f64 {
        self.source.min_value(band)
    }

    fn max_value(&self, band: u32) -> f64 {
        self.source.max_value(band)
    }

    fn tile_width(&self) -> i32 {
        if self.initialized || self.tile_size_explicit {
            self.tile_size.width
        } else {
            self.source.tile_width()
        }
    }

    fn tile_height(&self) -> i32 {
        if self.initialized || self.tile_size_explicit {
            self.tile_size.height
        } else {
            self.source.tile_height()
        }
    }

    fn decimation_levels(&self) -> u32 {
        self.source.decimation_levels()
    }
}

impl<S: ImageSource> Configurable for TileSequencer<S> {
    fn save_state(&self, props: &mut PropertyList, prefix: &str) {
        if self.initialized || self.aoi_explicit {
            props.set(join_key(prefix, keys::AREA_OF_INTEREST), self.aoi);
        }
        if self.initialized || self.tile_size_explicit {
            props.set(join_key(prefix, keys::TILE_WIDTH), self.tile_size.width);
            props.set(join_key(prefix, keys::TILE_HEIGHT), self.tile_size.height);
        }
    }

    fn load_state(&mut self, props: &PropertyList, prefix: &str) -> PipelineResult<()> {
        if let Some(aoi) = props.get_parsed(&join_key(prefix, keys::AREA_OF_INTEREST))? {
            self.set_area_of_interest(aoi);
        }
        let width = props.get_parsed(&join_key(prefix, keys::TILE_WIDTH))?;
        let height = props.get_parsed(&join_key(prefix, keys::TILE_HEIGHT))?;
        if let (Some(w), Some(h)) = (width, height) {
            self.set_tile_size(w, h);
        }
        Ok(())
    }
}

/// Iterator over a sequencer's remaining tiles; see
/// [`TileSequencer::tiles`].
#[derive(Debug)]
pub struct Tiles<'a, S: ImageSource> {
    seq: &'a mut TileSequencer<S>,
}

impl<S: ImageSource> Iterator for Tiles<'_, S> {
    type Item = RasterTile;

    fn next(&mut self) -> Option<Self::Item> {
        self.seq.get_next_tile()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.seq.tiles_wide * self.seq.tiles_high - self.seq.cursor).max(0);
        (0, usize::try_from(remaining).ok())
    }
}
