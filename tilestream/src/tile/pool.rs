//! Buffer recycling for owned tiles.
//!
//! Every tile handed downstream owns its samples, so nothing in a chain
//! ever aliases another stage's storage. The pool keeps allocation cheap
//! anyway: when a pool-acquired tile is dropped, its buffer comes back to
//! a shelf keyed by length and storage type, and the next acquisition of
//! the same shape reuses it instead of touching the allocator.
//!
//! The pool is `Clone` and shares its shelves, so one pool can serve a
//! whole chain of filters.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::geom::IRect;
use crate::pixel::ScalarKind;
use crate::source::ImageSource;

use super::buffer::PixelBuffer;
use super::RasterTile;

/// Buffers kept per (length, storage kind) shelf before further returns
/// are dropped.
const DEFAULT_MAX_IDLE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PoolKey {
    len: usize,
    kind: ScalarKind,
}

/// Shared buffer shelves. Tiles hold a weak reference so a pool that
/// goes away simply stops collecting returns.
#[derive(Debug)]
pub(crate) struct Shelves {
    slots: Mutex<HashMap<PoolKey, Vec<PixelBuffer>>>,
    max_idle: usize,
}

impl Shelves {
    fn take(&self, len: usize, kind: ScalarKind) -> Option<PixelBuffer> {
        let key = PoolKey { len, kind };
        self.slots.lock().get_mut(&key)?.pop()
    }

    pub(crate) fn restore(&self, buf: PixelBuffer) {
        let key = PoolKey {
            len: buf.len(),
            kind: buf.storage_kind(),
        };
        let mut slots = self.slots.lock();
        let shelf = slots.entry(key).or_default();
        if shelf.len() < self.max_idle {
            shelf.push(buf);
        }
    }

    fn idle_count(&self) -> usize {
        self.slots.lock().values().map(Vec::len).sum()
    }
}

/// Allocates owned tiles, recycling buffers returned by dropped tiles.
#[derive(Debug, Clone)]
pub struct TilePool {
    shelves: Arc<Shelves>,
}

impl TilePool {
    /// Creates a pool keeping up to a small fixed number of idle buffers
    /// per shape.
    pub fn new() -> Self {
        Self::with_max_idle(DEFAULT_MAX_IDLE)
    }

    /// Creates a pool keeping up to `max_idle` buffers per shape.
    pub fn with_max_idle(max_idle: usize) -> Self {
        Self {
            shelves: Arc::new(Shelves {
                slots: Mutex::new(HashMap::new()),
                max_idle,
            }),
        }
    }

    /// Produces an allocated, null-filled `Empty` tile of the given
    /// shape, reusing a shelved buffer when one fits.
    ///
    /// A degenerate rectangle or zero band count yields a `Null` tile,
    /// same as [`RasterTile::allocate`].
    pub fn acquire(&self, rect: IRect, bands: u32, kind: ScalarKind) -> RasterTile {
        let mut tile = RasterTile::new(rect, bands, kind);
        self.prime(&mut tile);
        tile
    }

    /// Produces a blank tile shaped and radiometered like `source`.
    ///
    /// Band count, scalar kind and the per-band null/min/max all come
    /// from the source's declarations, so the tile is a faithful stand-in
    /// for output the source failed to deliver.
    pub fn acquire_for<S>(&self, source: &S, rect: IRect) -> RasterTile
    where
        S: ImageSource + ?Sized,
    {
        let bands = source.band_count();
        let mut tile = RasterTile::new(rect, bands, source.scalar_kind());
        for band in 0..bands {
            tile.set_null_value(band, source.null_value(band));
            tile.set_min_value(band, source.min_value(band));
            tile.set_max_value(band, source.max_value(band));
        }
        self.prime(&mut tile);
        tile
    }

    /// Number of buffers currently shelved.
    pub fn idle_count(&self) -> usize {
        self.shelves.idle_count()
    }

    /// Seeds `tile` with a shelved buffer when one fits, finishes the
    /// allocation, and links the tile back to the shelves for return on
    /// drop.
    fn prime(&self, tile: &mut RasterTile) {
        if tile.data.is_none() {
            if let Some(total) = tile.required_samples() {
                if let Some(buf) = self.shelves.take(total, tile.kind().storage()) {
                    tile.data = Some(buf);
                }
            }
        }
        tile.allocate();
        tile.attach_pool(Arc::downgrade(&self.shelves));
    }
}

impl Default for TilePool {
    fn default() -> Self {
        Self::new()
    }
}
