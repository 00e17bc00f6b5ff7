//! The raster tile: the unit of data exchanged by every pipeline stage.
//!
//! A [`RasterTile`] couples a pixel rectangle with band-sequential sample
//! storage and per-band radiometry (null, min, max). Its validity status
//! summarizes the buffer contents so downstream stages can skip work:
//!
//! - [`TileStatus::Null`] - no buffer is attached
//! - [`TileStatus::Empty`] - allocated, every sample is the band null
//! - [`TileStatus::Partial`] - a mix of null and valid samples
//! - [`TileStatus::Full`] - no null samples anywhere
//!
//! A buffer is attached if and only if the status is not `Null`; the
//! allocation paths maintain that invariant and [`RasterTile::validate`]
//! recomputes the status from the actual samples.
//!
//! # Architecture
//!
//! Tiles are plain owned values. Producers hand them downstream by value
//! and every consumer is free to keep one alive; nothing in the pipeline
//! aliases tile storage (see [`pool`] for how buffers still get reused).
//! Single-sample access moves through `f64`; whole-band paths dispatch on
//! the concrete storage type via the [`buffer`] macros.
//!
//! # Example
//!
//! ```
//! use tilestream::geom::IRect;
//! use tilestream::pixel::ScalarKind;
//! use tilestream::tile::{RasterTile, TileStatus};
//!
//! let mut tile = RasterTile::allocated(IRect::from_bounds(0, 0, 63, 63), 1, ScalarKind::U8);
//! assert_eq!(tile.status(), TileStatus::Empty);
//!
//! tile.fill(128.0);
//! assert_eq!(tile.validate(), TileStatus::Full);
//! ```

pub mod buffer;
pub mod pool;

use std::fmt;
use std::sync::Weak;

use tracing::warn;

use crate::geom::{IPoint, IRect};
use crate::histogram::MultiBandHistogram;
use crate::pixel::{Sample, ScalarKind};
use buffer::{per_kind, per_kind_pair, PixelBuffer};
use pool::Shelves;

/// Summary of a tile buffer's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TileStatus {
    /// No buffer attached
    #[default]
    Null,
    /// Allocated, all samples are the band null
    Empty,
    /// A mix of null and valid samples
    Partial,
    /// No null samples
    Full,
}

impl fmt::Display for TileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TileStatus::Null => "null",
            TileStatus::Empty => "empty",
            TileStatus::Partial => "partial",
            TileStatus::Full => "full",
        };
        f.write_str(name)
    }
}

/// One tile of raster data: rectangle, bands, radiometry and samples.
///
/// All bands share one [`ScalarKind`] and one rectangle; nulls, mins and
/// maxs are declared per band in the `f64` currency. The buffer is
/// band-sequential (see [`buffer::PixelBuffer`]).
#[derive(Debug)]
pub struct RasterTile {
    rect: IRect,
    bands: u32,
    kind: ScalarKind,
    nulls: Vec<f64>,
    mins: Vec<f64>,
    maxs: Vec<f64>,
    status: TileStatus,
    data: Option<PixelBuffer>,
    pool: Option<Weak<Shelves>>,
}

impl RasterTile {
    /// Creates an unallocated tile: metadata only, status `Null`.
    ///
    /// Radiometry starts at the kind's defaults for every band.
    pub fn new(rect: IRect, bands: u32, kind: ScalarKind) -> Self {
        let n = bands as usize;
        Self {
            rect,
            bands,
            kind,
            nulls: vec![kind.default_null(); n],
            mins: vec![kind.default_min(); n],
            maxs: vec![kind.default_max(); n],
            status: TileStatus::Null,
            data: None,
            pool: None,
        }
    }

    /// Creates a tile and immediately allocates its buffer.
    pub fn allocated(rect: IRect, bands: u32, kind: ScalarKind) -> Self {
        let mut tile = Self::new(rect, bands, kind);
        tile.allocate();
        tile
    }

    /// Attaches (or reuses) a buffer sized for the current rectangle and
    /// band count, null-filled per band, and sets the status to `Empty`.
    ///
    /// A degenerate rectangle or a zero band count releases any buffer
    /// and leaves the tile `Null`.
    pub fn allocate(&mut self) {
        let total = match self.required_samples() {
            Some(total) => total,
            None => {
                self.data = None;
                self.status = TileStatus::Null;
                return;
            }
        };
        let reusable = match self.data.as_ref() {
            Some(buf) => buf.matches(self.kind) && buf.len() == total,
            None => false,
        };
        if !reusable {
            self.data = Some(PixelBuffer::for_kind(self.kind, total, 0.0));
        }
        self.status = TileStatus::Empty;
        self.write_nulls();
    }

    /// The tile rectangle (inclusive corners).
    #[inline]
    pub fn rect(&self) -> IRect {
        self.rect
    }

    /// Band count.
    #[inline]
    pub fn bands(&self) -> u32 {
        self.bands
    }

    /// The declared scalar kind shared by all bands.
    #[inline]
    pub fn kind(&self) -> ScalarKind {
        self.kind
    }

    /// Current validity status; see [`RasterTile::validate`] to recompute.
    #[inline]
    pub fn status(&self) -> TileStatus {
        self.status
    }

    /// Width of the rectangle in pixels.
    #[inline]
    pub fn width(&self) -> i64 {
        self.rect.width()
    }

    /// Height of the rectangle in pixels.
    #[inline]
    pub fn height(&self) -> i64 {
        self.rect.height()
    }

    /// Samples per band (the rectangle's area).
    #[inline]
    pub fn samples_per_band(&self) -> usize {
        usize::try_from(self.rect.area()).unwrap_or(0)
    }

    /// The attached buffer, if any.
    #[inline]
    pub fn buffer(&self) -> Option<&PixelBuffer> {
        self.data.as_ref()
    }

    #[inline]
    pub(crate) fn buffer_mut(&mut self) -> Option<&mut PixelBuffer> {
        self.data.as_mut()
    }

    pub(crate) fn attach_pool(&mut self, shelves: Weak<Shelves>) {
        self.pool = Some(shelves);
    }

    /// The null sentinel declared for `band`, or the kind default when
    /// the band index is out of range.
    pub fn null_value(&self, band: u32) -> f64 {
        self.nulls
            .get(band as usize)
            .copied()
            .unwrap_or_else(|| self.kind.default_null())
    }

    /// The declared minimum valid value for `band`.
    pub fn min_value(&self, band: u32) -> f64 {
        self.mins
            .get(band as usize)
            .copied()
            .unwrap_or_else(|| self.kind.default_min())
    }

    /// The declared maximum valid value for `band`.
    pub fn max_value(&self, band: u32) -> f64 {
        self.maxs
            .get(band as usize)
            .copied()
            .unwrap_or_else(|| self.kind.default_max())
    }

    /// All per-band null sentinels.
    pub fn nulls(&self) -> &[f64] {
        &self.nulls
    }

    /// Overrides the null sentinel for `band`; out-of-range indices are
    /// ignored.
    pub fn set_null_value(&mut self, band: u32, value: f64) {
        if let Some(slot) = self.nulls.get_mut(band as usize) {
            *slot = value;
        }
    }

    /// Overrides the declared minimum for `band`.
    pub fn set_min_value(&mut self, band: u32, value: f64) {
        if let Some(slot) = self.mins.get_mut(band as usize) {
            *slot = value;
        }
    }

    /// Overrides the declared maximum for `band`.
    pub fn set_max_value(&mut self, band: u32, value: f64) {
        if let Some(slot) = self.maxs.get_mut(band as usize) {
            *slot = value;
        }
    }

    /// Moves the tile to a new rectangle.
    ///
    /// With no buffer attached this only updates the metadata. When the
    /// pixel count stays the same the buffer is kept and reinterpreted at
    /// the new position; when it changes the buffer is reallocated and
    /// null-filled. The status is left untouched either way, so callers
    /// that repositioned an allocated tile revalidate when they next care.
    pub fn set_rect(&mut self, rect: IRect) {
        let old_samples = self.samples_per_band();
        self.rect = rect;
        if self.data.is_none() {
            return;
        }
        if self.samples_per_band() != old_samples {
            match self.required_samples() {
                Some(total) => {
                    self.data = Some(PixelBuffer::for_kind(self.kind, total, 0.0));
                    self.write_nulls();
                }
                None => {
                    self.data = None;
                    self.status = TileStatus::Null;
                }
            }
        }
    }

    /// Resets every sample to its band null and marks the tile `Empty`.
    ///
    /// Does nothing on an unallocated tile.
    pub fn make_blank(&mut self) {
        if self.data.is_none() {
            return;
        }
        self.write_nulls();
        self.status = TileStatus::Empty;
    }

    /// Writes `value` (converted into storage) to every sample of `band`.
    ///
    /// Saturates at the storage limits; does not touch the status, so the
    /// caller revalidates when done mutating.
    pub fn fill_band(&mut self, band: u32, value: f64) {
        let spb = self.samples_per_band();
        if band >= self.bands {
            return;
        }
        let start = band as usize * spb;
        if let Some(buf) = self.data.as_mut() {
            per_kind!(buf, |samples| {
                if let Some(slice) = samples.get_mut(start..start + spb) {
                    slice.fill(Sample::from_f64(value));
                }
            });
        }
    }

    /// Writes `value` to every sample of every band.
    pub fn fill(&mut self, value: f64) {
        for band in 0..self.bands {
            self.fill_band(band, value);
        }
    }

    /// Reads one sample in the `f64` currency.
    ///
    /// Returns `None` when the tile has no buffer, the band is out of
    /// range, or the point lies outside the rectangle.
    pub fn sample(&self, band: u32, point: IPoint) -> Option<f64> {
        let idx = self.sample_index(band, point)?;
        let buf = self.data.as_ref()?;
        per_kind!(buf, |samples| samples.get(idx).map(|s| s.to_f64()))
    }

    /// Writes one sample from the `f64` currency, rounding into storage.
    ///
    /// Returns false when the target does not exist.
    pub fn set_sample(&mut self, band: u32, point: IPoint, value: f64) -> bool {
        let idx = match self.sample_index(band, point) {
            Some(idx) => idx,
            None => return false,
        };
        let buf = match self.data.as_mut() {
            Some(buf) => buf,
            None => return false,
        };
        per_kind!(buf, |samples| {
            match samples.get_mut(idx) {
                Some(slot) => {
                    *slot = Sample::from_f64(value);
                    true
                }
                None => false,
            }
        })
    }

    /// Copies one band into `out` as `f64` values.
    ///
    /// `out` is cleared first. Returns false (leaving `out` empty) when
    /// the tile has no buffer or the band is out of range.
    pub fn band_to_f64(&self, band: u32, out: &mut Vec<f64>) -> bool {
        out.clear();
        let spb = self.samples_per_band();
        if band >= self.bands {
            return false;
        }
        let start = band as usize * spb;
        let buf = match self.data.as_ref() {
            Some(buf) => buf,
            None => return false,
        };
        per_kind!(buf, |samples| {
            match samples.get(start..start + spb) {
                Some(slice) => {
                    out.reserve(slice.len());
                    out.extend(slice.iter().map(|s| s.to_f64()));
                    true
                }
                None => false,
            }
        })
    }

    /// Overwrites one band from `f64` values, rounding into storage.
    ///
    /// `values` must hold exactly one sample per pixel. Conversion
    /// saturates at the storage limits but applies no range clamping;
    /// that responsibility stays with the writing filter. Returns false
    /// when the shapes do not line up.
    pub fn write_band_f64(&mut self, band: u32, values: &[f64]) -> bool {
        let spb = self.samples_per_band();
        if band >= self.bands || values.len() != spb {
            return false;
        }
        let start = band as usize * spb;
        let buf = match self.data.as_mut() {
            Some(buf) => buf,
            None => return false,
        };
        per_kind!(buf, |samples| {
            match samples.get_mut(start..start + spb) {
                Some(slice) => {
                    for (slot, &v) in slice.iter_mut().zip(values) {
                        *slot = Sample::from_f64(v);
                    }
                    true
                }
                None => false,
            }
        })
    }

    /// Copies the overlapping region of `src` into this tile.
    ///
    /// Copies `min(self.bands, src.bands)` bands. The scalar kinds must
    /// match; a mismatch logs a warning and copies nothing. The status is
    /// not updated, the caller revalidates after its last copy.
    pub fn load_tile(&mut self, src: &RasterTile) {
        if self.kind != src.kind {
            warn!(
                "scalar kind mismatch ({} vs {}), skipping tile copy",
                self.kind, src.kind
            );
            return;
        }
        let overlap = self.rect.intersection(&src.rect);
        if overlap.is_degenerate() {
            return;
        }
        let bands = self.bands.min(src.bands);
        for band in 0..bands {
            self.copy_band_region(src, band, band, &overlap);
        }
    }

    /// Copies the overlapping region of one band of `src` into one band
    /// of this tile, under the same rules as [`RasterTile::load_tile`].
    pub fn load_band(&mut self, src: &RasterTile, src_band: u32, dst_band: u32) {
        if self.kind != src.kind {
            warn!(
                "scalar kind mismatch ({} vs {}), skipping band copy",
                self.kind, src.kind
            );
            return;
        }
        if src_band >= src.bands || dst_band >= self.bands {
            return;
        }
        let overlap = self.rect.intersection(&src.rect);
        if overlap.is_degenerate() {
            return;
        }
        self.copy_band_region(src, src_band, dst_band, &overlap);
    }

    /// Rescans the buffer and stores the recomputed status.
    ///
    /// A sample is null when it equals the band's null converted into
    /// storage; `NaN` float samples therefore never match and count as
    /// valid.
    pub fn validate(&mut self) -> TileStatus {
        let spb = self.samples_per_band();
        let status = match self.data.as_ref() {
            None => TileStatus::Null,
            Some(buf) => {
                let mut any_null = false;
                let mut any_valid = false;
                per_kind!(buf, |samples| {
                    for band in 0..self.bands as usize {
                        let start = band * spb;
                        if let Some(slice) = samples.get(start..start + spb) {
                            let (band_null, band_valid) = census(slice, self.nulls[band]);
                            any_null |= band_null;
                            any_valid |= band_valid;
                        }
                        if any_null && any_valid {
                            break;
                        }
                    }
                });
                match (any_null, any_valid) {
                    (_, false) => TileStatus::Empty,
                    (false, true) => TileStatus::Full,
                    (true, true) => TileStatus::Partial,
                }
            }
        };
        self.status = status;
        status
    }

    /// Folds this tile's valid samples into running per-band minima and
    /// maxima.
    ///
    /// The caller seeds `mins`/`maxs` with sentinels (for example
    /// `f64::MAX` / `f64::MIN`) and calls this once per tile; samples
    /// equal to the band null are skipped. Bands beyond the shorter of
    /// the slices are ignored.
    pub fn accumulate_min_max(&self, mins: &mut [f64], maxs: &mut [f64]) {
        let spb = self.samples_per_band();
        let buf = match self.data.as_ref() {
            Some(buf) => buf,
            None => return,
        };
        let bands = (self.bands as usize).min(mins.len()).min(maxs.len());
        per_kind!(buf, |samples| {
            for band in 0..bands {
                let start = band * spb;
                if let Some(slice) = samples.get(start..start + spb) {
                    fold_min_max(slice, self.nulls[band], &mut mins[band], &mut maxs[band]);
                }
            }
        });
    }

    /// Feeds every sample inside `clip` into `hist`.
    ///
    /// Samples pass through raw; the histogram applies its own null and
    /// range tests. Bands beyond the histogram's band count are ignored.
    pub fn populate_histogram(&self, hist: &mut MultiBandHistogram, clip: &IRect) {
        let buf = match self.data.as_ref() {
            Some(buf) => buf,
            None => return,
        };
        let region = self.rect.intersection(clip);
        if region.is_degenerate() {
            return;
        }
        let spb = self.samples_per_band();
        let tile_w = self.rect.width();
        let row_w = usize::try_from(region.width()).unwrap_or(0);
        let bands = (self.bands as usize).min(hist.band_count());
        per_kind!(buf, |samples| {
            for band in 0..bands {
                let band_off = band * spb;
                for y in region.min.y..=region.max.y {
                    let row = band_off
                        + ((y as i64 - self.rect.min.y as i64) * tile_w
                            + (region.min.x as i64 - self.rect.min.x as i64))
                            as usize;
                    if let Some(span) = samples.get(row..row + row_w) {
                        for s in span {
                            hist.record(band as u32, s.to_f64());
                        }
                    }
                }
            }
        });
    }

    /// Samples per band required by the current shape, or `None` when the
    /// shape allocates nothing (degenerate rect, zero bands, or a size
    /// beyond addressable memory).
    fn required_samples(&self) -> Option<usize> {
        if self.rect.is_degenerate() || self.bands == 0 {
            return None;
        }
        let spb = usize::try_from(self.rect.area()).ok()?;
        spb.checked_mul(self.bands as usize)
    }

    /// Null-fills every band with its own sentinel.
    fn write_nulls(&mut self) {
        for band in 0..self.bands {
            let null = self.null_value(band);
            self.fill_band(band, null);
        }
    }

    fn sample_index(&self, band: u32, point: IPoint) -> Option<usize> {
        if band >= self.bands || !self.rect.contains(point) {
            return None;
        }
        let spb = self.samples_per_band();
        let row = (point.y as i64 - self.rect.min.y as i64) * self.rect.width();
        let col = point.x as i64 - self.rect.min.x as i64;
        Some(band as usize * spb + usize::try_from(row + col).ok()?)
    }

    /// Row-span copy of `overlap` from `src_band` of `src` into
    /// `dst_band`. Callers have already checked kinds, bands and overlap.
    fn copy_band_region(&mut self, src: &RasterTile, src_band: u32, dst_band: u32, overlap: &IRect) {
        let dst_rect = self.rect;
        let dst_w = dst_rect.width();
        let src_w = src.rect.width();
        let dst_spb = self.samples_per_band();
        let src_spb = src.samples_per_band();
        let row_w = usize::try_from(overlap.width()).unwrap_or(0);

        let dst_buf = match self.data.as_mut() {
            Some(buf) => buf,
            None => return,
        };
        let src_buf = match src.data.as_ref() {
            Some(buf) => buf,
            None => return,
        };

        per_kind_pair!(
            dst_buf,
            src_buf,
            |dst, srcs| {
                for y in overlap.min.y..=overlap.max.y {
                    let di = dst_band as usize * dst_spb
                        + ((y as i64 - dst_rect.min.y as i64) * dst_w
                            + (overlap.min.x as i64 - dst_rect.min.x as i64))
                            as usize;
                    let si = src_band as usize * src_spb
                        + ((y as i64 - src.rect.min.y as i64) * src_w
                            + (overlap.min.x as i64 - src.rect.min.x as i64))
                            as usize;
                    if let (Some(dspan), Some(sspan)) =
                        (dst.get_mut(di..di + row_w), srcs.get(si..si + row_w))
                    {
                        dspan.copy_from_slice(sspan);
                    }
                }
            },
            // declared kinds matched above, so storage always matches
            ()
        );
    }
}

/// Scans a band slice and reports (any sample is null, any sample is
/// valid). Null equality happens in the storage domain.
fn census<T: Sample>(samples: &[T], null: f64) -> (bool, bool) {
    let null_t = T::from_f64(null);
    let mut any_null = false;
    let mut any_valid = false;
    for &s in samples {
        if s == null_t {
            any_null = true;
        } else {
            any_valid = true;
        }
        if any_null && any_valid {
            break;
        }
    }
    (any_null, any_valid)
}

/// Folds non-null samples of a band slice into a running min/max pair.
fn fold_min_max<T: Sample>(samples: &[T], null: f64, min: &mut f64, max: &mut f64) {
    let null_t = T::from_f64(null);
    for &s in samples {
        if s == null_t {
            continue;
        }
        let v = s.to_f64();
        if v < *min {
            *min = v;
        }
        if v > *max {
            *max = v;
        }
    }
}

impl Clone for RasterTile {
    /// Clones detach from any buffer pool; the copy owns its buffer
    /// outright and frees it normally.
    fn clone(&self) -> Self {
        Self {
            rect: self.rect,
            bands: self.bands,
            kind: self.kind,
            nulls: self.nulls.clone(),
            mins: self.mins.clone(),
            maxs: self.maxs.clone(),
            status: self.status,
            data: self.data.clone(),
            pool: None,
        }
    }
}

impl PartialEq for RasterTile {
    /// Pool attachment is ignored; two tiles are equal when their shape,
    /// radiometry, status and samples agree.
    fn eq(&self, other: &Self) -> bool {
        self.rect == other.rect
            && self.bands == other.bands
            && self.kind == other.kind
            && self.nulls == other.nulls
            && self.mins == other.mins
            && self.maxs == other.maxs
            && self.status == other.status
            && self.data == other.data
    }
}

impl Drop for RasterTile {
    fn drop(&mut self) {
        if let Some(weak) = self.pool.take() {
            if let Some(shelves) = weak.upgrade() {
                if let Some(buf) = self.data.take() {
                    shelves.restore(buf);
                }
            }
        }
    }
}
