//! Priority-ordered combination of overlapping raster layers.
//!
//! A [`MosaicFilter`] owns any number of upstream sources and serves each
//! requested rectangle by filling the output from its inputs in order:
//! earlier inputs win, later inputs only fill samples still null. The
//! per-sample acceptance test is the [`MergePolicy`]:
//!
//! - [`MergePolicy::NullMask`] - a source sample participates unless it
//!   equals that source's band null. The common imagery case.
//! - [`MergePolicy::ValidRange`] - a source sample participates only
//!   inside a closed value range, for layers that carry out-of-range
//!   sentinels a null test cannot see (elevation posts are the classic
//!   case, see [`MergePolicy::elevation`]).
//!
//! Output shape follows the first input: its scalar kind, radiometry and
//! tile hints, with the band count widened to the largest input and
//! missing bands repeating the input's last band. Inputs of a different
//! scalar kind are skipped with a warning; kind reconciliation belongs to
//! the caller.

use tracing::warn;

use crate::config::{join_key, keys, Configurable, PropertyList};
use crate::error::{PipelineError, PipelineResult};
use crate::geom::{IRect, ISize};
use crate::pixel::{Sample, ScalarKind};
use crate::source::ImageSource;
use crate::tile::buffer::per_kind_pair;
use crate::tile::pool::TilePool;
use crate::tile::{RasterTile, TileStatus};

/// Lower bound of [`MergePolicy::elevation`] in meters.
pub const ELEVATION_VALID_MIN: f64 = -500.0;

/// Upper bound of [`MergePolicy::elevation`] in meters.
pub const ELEVATION_VALID_MAX: f64 = 32000.0;

/// Per-sample acceptance test for mosaic inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MergePolicy {
    /// Accept any sample that is not the source's band null
    NullMask,
    /// Accept only samples inside `[min, max]`
    ValidRange {
        /// Smallest accepted value
        min: f64,
        /// Largest accepted value
        max: f64,
    },
}

impl MergePolicy {
    /// The valid-range policy tuned for elevation layers, accepting
    /// plausible terrain heights and rejecting sentinel posts.
    pub fn elevation() -> Self {
        MergePolicy::ValidRange {
            min: ELEVATION_VALID_MIN,
            max: ELEVATION_VALID_MAX,
        }
    }

    fn tag(&self) -> &'static str {
        match self {
            MergePolicy::NullMask => "null_mask",
            MergePolicy::ValidRange { .. } => "valid_range",
        }
    }
}

impl Default for MergePolicy {
    fn default() -> Self {
        MergePolicy::NullMask
    }
}

/// Cached output shape, derived from the inputs on first use and kept
/// after inputs are removed so late pulls still get blanks of the right
/// shape.
#[derive(Debug, Clone)]
struct OutputLayout {
    bands: u32,
    kind: ScalarKind,
    nulls: Vec<f64>,
    mins: Vec<f64>,
    maxs: Vec<f64>,
    tile_hint: ISize,
    levels: u32,
}

/// Combines overlapping sources, earlier inputs taking priority.
pub struct MosaicFilter {
    inputs: Vec<Box<dyn ImageSource>>,
    policy: MergePolicy,
    pool: TilePool,
    layout: Option<OutputLayout>,
}

impl MosaicFilter {
    /// Creates an empty mosaic under the null-mask policy.
    pub fn new() -> Self {
        Self {
            inputs: Vec::new(),
            policy: MergePolicy::NullMask,
            pool: TilePool::new(),
            layout: None,
        }
    }

    /// Sets the merge policy, builder style.
    pub fn with_policy(mut self, policy: MergePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Adds `source`, builder style; see [`MosaicFilter::add_input`].
    pub fn with_input(mut self, source: impl ImageSource + 'static) -> Self {
        self.add_input(source);
        self
    }

    /// Replaces the merge policy.
    pub fn set_policy(&mut self, policy: MergePolicy) {
        self.policy = policy;
    }

    /// The current merge policy.
    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// Appends a source at the lowest priority so far and re-derives the
    /// output shape on the next pull.
    pub fn add_input(&mut self, source: impl ImageSource + 'static) {
        self.inputs.push(Box::new(source));
        self.layout = None;
    }

    /// Number of connected inputs.
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Disconnects every input.
    ///
    /// The derived output shape is kept, so further pulls produce blank
    /// tiles of the established shape rather than failing.
    pub fn clear_inputs(&mut self) {
        self.inputs.clear();
    }

    fn ensure_layout(&mut self) {
        if self.layout.is_some() || self.inputs.is_empty() {
            return;
        }
        let first = &self.inputs[0];
        let first_bands = first.band_count();
        let bands = self
            .inputs
            .iter()
            .map(|s| s.band_count())
            .max()
            .unwrap_or(0);
        let mut nulls = Vec::with_capacity(bands as usize);
        let mut mins = Vec::with_capacity(bands as usize);
        let mut maxs = Vec::with_capacity(bands as usize);
        for band in 0..bands {
            let b = band.min(first_bands.saturating_sub(1));
            nulls.push(first.null_value(b));
            mins.push(first.min_value(b));
            maxs.push(first.max_value(b));
        }
        self.layout = Some(OutputLayout {
            bands,
            kind: first.scalar_kind(),
            nulls,
            mins,
            maxs,
            tile_hint: ISize::new(first.tile_width(), first.tile_height()),
            levels: self
                .inputs
                .iter()
                .map(|s| s.decimation_levels())
                .min()
                .unwrap_or(1),
        });
    }
}

impl Default for MosaicFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageSource for MosaicFilter {
    fn get_tile(&mut self, rect: IRect, rlevel: u32) -> Option<RasterTile> {
        self.ensure_layout();
        let layout = match self.layout.clone() {
            Some(layout) => layout,
            // Never connected: there is no shape to produce.
            None => return None,
        };
        if self.inputs.is_empty() {
            let pool = self.pool.clone();
            return Some(pool.acquire_for(&*self, rect));
        }
        if self.inputs.len() == 1 {
            return self.inputs[0].get_tile(rect, rlevel);
        }

        let pool = self.pool.clone();
        let mut out = pool.acquire_for(&*self, rect);
        if out.buffer().is_none() {
            return Some(out);
        }
        let policy = self.policy;
        for input in &mut self.inputs {
            let tile = match input.get_tile(rect, rlevel) {
                Some(tile) => tile,
                None => continue,
            };
            if tile.buffer().is_none()
                || matches!(tile.status(), TileStatus::Null | TileStatus::Empty)
            {
                continue;
            }
            if tile.kind() != layout.kind {
                warn!(
                    "mosaic input kind {} differs from output kind {}, input skipped",
                    tile.kind(),
                    layout.kind
                );
                continue;
            }
            if tile.bands() == 0 {
                continue;
            }
            // Whole-band copies are safe only under the null-mask policy:
            // a Full tile may still carry out-of-range sentinels that the
            // valid-range test must reject sample by sample.
            let bulk = policy == MergePolicy::NullMask
                && out.status() == TileStatus::Empty
                && tile.status() == TileStatus::Full
                && tile.rect() == out.rect();
            merge_tile(&mut out, &tile, &layout.nulls, policy, bulk);
            out.validate();
            // Both policies only ever fill still-null samples, so a full
            // destination cannot change and the remaining inputs are
            // skipped.
            if out.status() == TileStatus::Full {
                break;
            }
        }
        Some(out)
    }

    fn bounding_rect(&self, rlevel: u32) -> Option<IRect> {
        let mut acc: Option<IRect> = None;
        for input in &self.inputs {
            if let Some(rect) = input.bounding_rect(rlevel) {
                acc = Some(match acc {
                    Some(prev) => prev.combined(&rect),
                    None => rect,
                });
            }
        }
        acc
    }

    fn band_count(&self) -> u32 {
        if self.inputs.is_empty() {
            return self.layout.as_ref().map(|l| l.bands).unwrap_or(0);
        }
        self.inputs
            .iter()
            .map(|s| s.band_count())
            .max()
            .unwrap_or(0)
    }

    fn scalar_kind(&self) -> ScalarKind {
        match self.inputs.first() {
            Some(first) => first.scalar_kind(),
            None => self
                .layout
                .as_ref()
                .map(|l| l.kind)
                .unwrap_or(ScalarKind::U8),
        }
    }

    fn null_value(&self, band: u32) -> f64 {
        match self.inputs.first() {
            Some(first) => first.null_value(band.min(first.band_count().saturating_sub(1))),
            None => match self.layout.as_ref() {
                Some(l) if !l.nulls.is_empty() => {
                    l.nulls[(band as usize).min(l.nulls.len() - 1)]
                }
                _ => self.scalar_kind().default_null(),
            },
        }
    }

    fn min_value(&self, band: u32) -> f64 {
        match self.inputs.first() {
            Some(first) => first.min_value(band.min(first.band_count().saturating_sub(1))),
            None => match self.layout.as_ref() {
                Some(l) if !l.mins.is_empty() => l.mins[(band as usize).min(l.mins.len() - 1)],
                _ => self.scalar_kind().default_min(),
            },
        }
    }

    fn max_value(&self, band: u32) -> f64 {
        match self.inputs.first() {
            Some(first) => first.max_value(band.min(first.band_count().saturating_sub(1))),
            None => match self.layout.as_ref() {
                Some(l) if !l.maxs.is_empty() => l.maxs[(band as usize).min(l.maxs.len() - 1)],
                _ => self.scalar_kind().default_max(),
            },
        }
    }

    fn tile_width(&self) -> i32 {
        match self.inputs.first() {
            Some(first) => first.tile_width(),
            None => self.layout.as_ref().map(|l| l.tile_hint.width).unwrap_or(0),
        }
    }

    fn tile_height(&self) -> i32 {
        match self.inputs.first() {
            Some(first) => first.tile_height(),
            None => self
                .layout
                .as_ref()
                .map(|l| l.tile_hint.height)
                .unwrap_or(0),
        }
    }

    fn decimation_levels(&self) -> u32 {
        if self.inputs.is_empty() {
            return self.layout.as_ref().map(|l| l.levels).unwrap_or(1);
        }
        self.inputs
            .iter()
            .map(|s| s.decimation_levels())
            .min()
            .unwrap_or(1)
    }
}

impl Configurable for MosaicFilter {
    fn save_state(&self, props: &mut PropertyList, prefix: &str) {
        props.set(join_key(prefix, keys::MERGE_POLICY), self.policy.tag());
        if let MergePolicy::ValidRange { min, max } = self.policy {
            props.set(join_key(prefix, keys::VALID_MIN), min);
            props.set(join_key(prefix, keys::VALID_MAX), max);
        }
    }

    fn load_state(&mut self, props: &PropertyList, prefix: &str) -> PipelineResult<()> {
        let tag = match props.get(&join_key(prefix, keys::MERGE_POLICY)) {
            Some(tag) => tag.to_string(),
            None => return Ok(()),
        };
        self.policy = match tag.as_str() {
            "null_mask" => MergePolicy::NullMask,
            "valid_range" => {
                let min = props
                    .get_parsed(&join_key(prefix, keys::VALID_MIN))?
                    .unwrap_or(ELEVATION_VALID_MIN);
                let max = props
                    .get_parsed(&join_key(prefix, keys::VALID_MAX))?
                    .unwrap_or(ELEVATION_VALID_MAX);
                MergePolicy::ValidRange { min, max }
            }
            other => {
                return Err(PipelineError::Config(format!(
                    "unknown merge policy '{}'",
                    other
                )))
            }
        };
        Ok(())
    }
}

/// Merges `src` into `out` band by band. Missing source bands repeat the
/// source's last band; `bulk` requests whole-band copies instead of the
/// per-sample test.
fn merge_tile(
    out: &mut RasterTile,
    src: &RasterTile,
    dest_nulls: &[f64],
    policy: MergePolicy,
    bulk: bool,
) {
    let out_spb = out.samples_per_band();
    let src_spb = src.samples_per_band();
    if out_spb != src_spb || out_spb == 0 {
        return;
    }
    let out_bands = out.bands() as usize;
    let src_bands = src.bands() as usize;
    let src_nulls: Vec<f64> = (0..src.bands()).map(|b| src.null_value(b)).collect();

    let dst_buf = match out.buffer_mut() {
        Some(buf) => buf,
        None => return,
    };
    let src_buf = match src.buffer() {
        Some(buf) => buf,
        None => return,
    };

    per_kind_pair!(
        dst_buf,
        src_buf,
        |dst, srcs| {
            for band in 0..out_bands {
                let sb = band.min(src_bands - 1);
                let d_range = band * out_spb..(band + 1) * out_spb;
                let s_range = sb * src_spb..(sb + 1) * src_spb;
                if let (Some(d_slice), Some(s_slice)) =
                    (dst.get_mut(d_range), srcs.get(s_range))
                {
                    if bulk {
                        d_slice.copy_from_slice(s_slice);
                    } else {
                        match policy {
                            MergePolicy::NullMask => merge_null_mask(
                                d_slice,
                                s_slice,
                                dest_nulls.get(band).copied().unwrap_or(0.0),
                                src_nulls.get(sb).copied().unwrap_or(0.0),
                            ),
                            MergePolicy::ValidRange { min, max } => merge_valid_range(
                                d_slice,
                                s_slice,
                                dest_nulls.get(band).copied().unwrap_or(0.0),
                                min,
                                max,
                            ),
                        }
                    }
                }
            }
        },
        // layout kind equality was checked by the caller
        ()
    );
}

/// Fills still-null destination samples from non-null source samples.
fn merge_null_mask<T: Sample>(dst: &mut [T], src: &[T], dst_null: f64, src_null: f64) {
    let dn = T::from_f64(dst_null);
    let sn = T::from_f64(src_null);
    for (d, &s) in dst.iter_mut().zip(src) {
        if *d == dn && s != sn {
            *d = s;
        }
    }
}

/// Fills still-null destination samples from source samples inside the
/// closed `[min, max]` range.
fn merge_valid_range<T: Sample>(dst: &mut [T], src: &[T], dst_null: f64, min: f64, max: f64) {
    let dn = T::from_f64(dst_null);
    for (d, &s) in dst.iter_mut().zip(src) {
        if *d == dn {
            let v = s.to_f64();
            if v >= min && v <= max {
                *d = s;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::IPoint;
    use crate::source::MemorySource;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// A source filled with one constant value per band.
    fn flat_source(rect: IRect, bands: u32, kind: ScalarKind, values: &[f64]) -> MemorySource {
        let mut source = MemorySource::new(rect, bands, kind);
        for (band, &v) in values.iter().enumerate() {
            source.image_mut().fill_band(band as u32, v);
        }
        source.image_mut().validate();
        source
    }

    /// A 1-band source valid only where `x < split`.
    fn half_source(rect: IRect, split: i32, value: f64) -> MemorySource {
        let mut source = MemorySource::new(rect, 1, ScalarKind::U8);
        for y in rect.min.y..=rect.max.y {
            for x in rect.min.x..split.min(rect.max.x + 1) {
                source.image_mut().set_sample(0, IPoint::new(x, y), value);
            }
        }
        source.image_mut().validate();
        source
    }

    /// Wraps a source and counts how often a tile is pulled from it.
    struct CountingSource {
        inner: MemorySource,
        calls: Arc<AtomicUsize>,
    }

    impl ImageSource for CountingSource {
        fn get_tile(&mut self, rect: IRect, rlevel: u32) -> Option<RasterTile> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.inner.get_tile(rect, rlevel)
        }

        fn bounding_rect(&self, rlevel: u32) -> Option<IRect> {
            self.inner.bounding_rect(rlevel)
        }

        fn band_count(&self) -> u32 {
            self.inner.band_count()
        }

        fn scalar_kind(&self) -> ScalarKind {
            self.inner.scalar_kind()
        }
    }

    #[test]
    fn test_never_connected_yields_none() {
        let mut mosaic = MosaicFilter::new();
        assert!(mosaic.get_tile(IRect::from_bounds(0, 0, 3, 3), 0).is_none());
        assert!(mosaic.bounding_rect(0).is_none());
        assert_eq!(mosaic.band_count(), 0);
    }

    #[test]
    fn test_single_input_is_passthrough() {
        let rect = IRect::from_bounds(0, 0, 7, 7);
        let mut reference = flat_source(rect, 2, ScalarKind::U16, &[300.0, 700.0]);
        let expected = reference.get_tile(rect, 0).unwrap();

        let mut mosaic =
            MosaicFilter::new().with_input(flat_source(rect, 2, ScalarKind::U16, &[300.0, 700.0]));
        let got = mosaic.get_tile(rect, 0).unwrap();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_band_count_reconciliation_duplicates_last() {
        let rect = IRect::from_bounds(0, 0, 3, 3);
        // First input: one band, valid on the left half only.
        let narrow = half_source(rect, 2, 50.0);
        // Second input: three bands, valid everywhere.
        let wide = flat_source(rect, 3, ScalarKind::U8, &[10.0, 20.0, 30.0]);

        let mut mosaic = MosaicFilter::new().with_input(narrow).with_input(wide);
        assert_eq!(mosaic.band_count(), 3);

        let tile = mosaic.get_tile(rect, 0).unwrap();
        assert_eq!(tile.bands(), 3);
        // Left half: the single first-input band repeated into all three.
        for band in 0..3 {
            assert_eq!(tile.sample(band, IPoint::new(1, 1)), Some(50.0));
        }
        // Right half: per-band fill from the second input.
        assert_eq!(tile.sample(0, IPoint::new(3, 1)), Some(10.0));
        assert_eq!(tile.sample(1, IPoint::new(3, 1)), Some(20.0));
        assert_eq!(tile.sample(2, IPoint::new(3, 1)), Some(30.0));
    }

    #[test]
    fn test_priority_earlier_input_wins() {
        let rect = IRect::from_bounds(0, 0, 3, 3);
        let mut mosaic = MosaicFilter::new()
            .with_input(half_source(rect, 2, 100.0))
            .with_input(flat_source(rect, 1, ScalarKind::U8, &[55.0]));

        let tile = mosaic.get_tile(rect, 0).unwrap();
        assert_eq!(tile.sample(0, IPoint::new(0, 0)), Some(100.0));
        assert_eq!(tile.sample(0, IPoint::new(3, 0)), Some(55.0));
        assert_eq!(tile.status(), TileStatus::Full);
    }

    #[test]
    fn test_clear_inputs_degrades_to_blanks() {
        let rect = IRect::from_bounds(0, 0, 3, 3);
        let mut mosaic = MosaicFilter::new()
            .with_input(flat_source(rect, 2, ScalarKind::U16, &[5.0, 6.0]))
            .with_input(flat_source(rect, 1, ScalarKind::U16, &[9.0]));

        // Establish the layout, then disconnect.
        assert!(mosaic.get_tile(rect, 0).is_some());
        mosaic.clear_inputs();

        let tile = mosaic.get_tile(rect, 0).unwrap();
        assert_eq!(tile.status(), TileStatus::Empty);
        assert_eq!(tile.bands(), 2);
        assert_eq!(tile.kind(), ScalarKind::U16);
    }

    #[test]
    fn test_valid_range_rejects_sentinels_in_full_tile() {
        let rect = IRect::from_bounds(0, 0, 3, 0);
        // Every sample non-null, but two carry the -9999 sentinel; the
        // tile validates Full, so only the per-sample range test can
        // reject them.
        let mut first = MemorySource::new(rect, 1, ScalarKind::S16);
        first
            .image_mut()
            .write_band_f64(0, &[120.0, -9999.0, 345.0, -9999.0]);
        first.image_mut().validate();
        assert_eq!(first.image().status(), TileStatus::Full);

        let second = flat_source(rect, 1, ScalarKind::S16, &[7.0]);

        let mut mosaic = MosaicFilter::new()
            .with_policy(MergePolicy::elevation())
            .with_input(first)
            .with_input(second);

        let tile = mosaic.get_tile(rect, 0).unwrap();
        assert_eq!(tile.sample(0, IPoint::new(0, 0)), Some(120.0));
        assert_eq!(tile.sample(0, IPoint::new(1, 0)), Some(7.0));
        assert_eq!(tile.sample(0, IPoint::new(2, 0)), Some(345.0));
        assert_eq!(tile.sample(0, IPoint::new(3, 0)), Some(7.0));
    }

    #[test]
    fn test_kind_mismatch_input_skipped() {
        let rect = IRect::from_bounds(0, 0, 3, 3);
        let mut mosaic = MosaicFilter::new()
            .with_input(half_source(rect, 2, 80.0))
            .with_input(flat_source(rect, 1, ScalarKind::U16, &[999.0]));

        let tile = mosaic.get_tile(rect, 0).unwrap();
        assert_eq!(tile.kind(), ScalarKind::U8);
        // The mismatched second input contributed nothing.
        assert_eq!(tile.sample(0, IPoint::new(3, 0)), Some(0.0));
        assert_eq!(tile.status(), TileStatus::Partial);
    }

    #[test]
    fn test_full_first_input_stops_the_scan() {
        let rect = IRect::from_bounds(0, 0, 3, 3);
        let calls = Arc::new(AtomicUsize::new(0));
        let second = CountingSource {
            inner: flat_source(rect, 1, ScalarKind::U8, &[9.0]),
            calls: Arc::clone(&calls),
        };

        let mut mosaic = MosaicFilter::new()
            .with_input(flat_source(rect, 1, ScalarKind::U8, &[200.0]))
            .with_input(second);

        let tile = mosaic.get_tile(rect, 0).unwrap();
        assert_eq!(tile.status(), TileStatus::Full);
        assert_eq!(calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_valid_range_full_destination_stops_the_scan() {
        let rect = IRect::from_bounds(0, 0, 3, 3);
        let calls = Arc::new(AtomicUsize::new(0));
        let second = CountingSource {
            inner: flat_source(rect, 1, ScalarKind::S16, &[1200.0]),
            calls: Arc::clone(&calls),
        };

        // The first input covers the rect with in-range terrain, so the
        // destination is full before the second input is consulted.
        let mut mosaic = MosaicFilter::new()
            .with_policy(MergePolicy::elevation())
            .with_input(flat_source(rect, 1, ScalarKind::S16, &[500.0]))
            .with_input(second);

        let tile = mosaic.get_tile(rect, 0).unwrap();
        assert_eq!(tile.status(), TileStatus::Full);
        assert_eq!(tile.sample(0, IPoint::new(2, 2)), Some(500.0));
        assert_eq!(calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_metadata_union_and_level_minimum() {
        let a = MemorySource::new(IRect::from_bounds(0, 0, 9, 9), 1, ScalarKind::U8)
            .with_decimation_levels(4);
        let b = MemorySource::new(IRect::from_bounds(20, 0, 29, 9), 1, ScalarKind::U8)
            .with_decimation_levels(2);

        let mosaic = MosaicFilter::new().with_input(a).with_input(b);
        assert_eq!(
            mosaic.bounding_rect(0),
            Some(IRect::from_bounds(0, 0, 29, 9))
        );
        assert_eq!(mosaic.decimation_levels(), 2);
    }

    #[test]
    fn test_policy_state_round_trip() {
        let mosaic = MosaicFilter::new().with_policy(MergePolicy::ValidRange {
            min: -100.0,
            max: 9000.0,
        });
        let mut props = PropertyList::new();
        mosaic.save_state(&mut props, "mosaic");

        let mut restored = MosaicFilter::new();
        restored.load_state(&props, "mosaic").unwrap();
        assert_eq!(
            restored.policy(),
            MergePolicy::ValidRange {
                min: -100.0,
                max: 9000.0
            }
        );

        let mut bad = PropertyList::new();
        bad.set("m.merge_policy", "sum");
        assert!(restored.load_state(&bad, "m").is_err());
    }
}
