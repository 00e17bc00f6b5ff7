//! Whole-image histogram computation.
//!
//! A [`HistogramSource`] owns an upstream source and computes a
//! [`MultiResHistogram`](crate::histogram::MultiResHistogram) over its
//! area of interest on demand. Recomputation is dirty-gated: settings
//! changes arm the builder, [`HistogramSource::execute`] runs at most one
//! pass per arming, and the result stays cached until the next change.
//!
//! Two modes trade accuracy against cost:
//!
//! - [`HistogramMode::Normal`] walks every tile of every requested
//!   resolution level through a private
//!   [`TileSequencer`](crate::sequencer::TileSequencer), counting every
//!   AOI sample.
//! - [`HistogramMode::Fast`] samples at most an 11x11 grid of fixed
//!   32x32-pixel tiles spread evenly across the boundary-stretched AOI at
//!   level 0, pulling straight from the upstream. The fetch count is
//!   bounded by a constant, so the cost does not grow with the raster.
//!
//! A pass reports progress once per tile through an optional callback and
//! polls a [`CancelToken`] between tiles. An aborted pass keeps the
//! partial result, drives progress to completion and clears the dirty
//! flag; the partial stack answers
//! [`is_complete`](crate::histogram::MultiResHistogram::is_complete) with
//! false.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::config::{join_key, keys, Configurable, PropertyList};
use crate::error::{PipelineError, PipelineResult};
use crate::geom::{IPoint, IRect, ISize};
use crate::histogram::{default_bin_count, BandHistogram, MultiBandHistogram, MultiResHistogram};
use crate::progress::{ProgressCallback, ProgressTracker};
use crate::sequencer::TileSequencer;
use crate::source::ImageSource;

/// Edge length of the fixed sample tiles pulled in fast mode.
const FAST_TILE_SIZE: i32 = 32;

/// Most sample tiles per axis in fast mode (at most 121 fetches total).
const FAST_MAX_SPAN: i64 = 11;

/// How a histogram pass visits the raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistogramMode {
    /// Count every sample of every requested resolution level
    #[default]
    Normal,
    /// Count a bounded, evenly spread sample of level 0
    Fast,
}

impl HistogramMode {
    fn tag(&self) -> &'static str {
        match self {
            HistogramMode::Normal => "normal",
            HistogramMode::Fast => "fast",
        }
    }
}

/// Computes histograms over an upstream source, dirty-gated.
pub struct HistogramSource<S: ImageSource> {
    source: S,
    aoi: Option<IRect>,
    max_levels: u32,
    mode: HistogramMode,
    bins_override: Option<usize>,
    min_override: Option<f64>,
    max_override: Option<f64>,
    dirty: bool,
    result: Option<MultiResHistogram>,
    progress: Option<ProgressCallback>,
    tracker: Arc<ProgressTracker>,
    cancel: CancelToken,
    warned_level_shortfall: bool,
}

impl<S: ImageSource> HistogramSource<S> {
    /// Creates an armed builder over `source` in normal mode, covering
    /// the upstream bounding rectangle at one resolution level.
    pub fn new(source: S) -> Self {
        Self {
            source,
            aoi: None,
            max_levels: 1,
            mode: HistogramMode::Normal,
            bins_override: None,
            min_override: None,
            max_override: None,
            dirty: true,
            result: None,
            progress: None,
            tracker: Arc::new(ProgressTracker::new()),
            cancel: CancelToken::new(),
            warned_level_shortfall: false,
        }
    }

    /// Sets the AOI in level-0 pixel space, builder style.
    pub fn with_area_of_interest(mut self, aoi: IRect) -> Self {
        self.set_area_of_interest(aoi);
        self
    }

    /// Sets the computation mode, builder style.
    pub fn with_mode(mut self, mode: HistogramMode) -> Self {
        self.set_mode(mode);
        self
    }

    /// Sets the resolution-level cap, builder style.
    pub fn with_max_levels(mut self, levels: u32) -> Self {
        self.set_max_levels(levels);
        self
    }

    /// Overrides the per-band bin count, builder style.
    pub fn with_bin_count(mut self, bins: usize) -> Self {
        self.set_bin_count(bins);
        self
    }

    /// Overrides the counted value range for every band, builder style.
    pub fn with_value_range(mut self, min: f64, max: f64) -> Self {
        self.set_value_range(min, max);
        self
    }

    /// Replaces the AOI (level-0 pixel space) and arms recomputation.
    pub fn set_area_of_interest(&mut self, aoi: IRect) {
        self.aoi = Some(aoi);
        self.dirty = true;
    }

    /// Replaces the mode and arms recomputation.
    pub fn set_mode(&mut self, mode: HistogramMode) {
        self.mode = mode;
        self.dirty = true;
    }

    /// Replaces the resolution-level cap (at least 1) and arms
    /// recomputation. Fast mode always works at level 0 only.
    pub fn set_max_levels(&mut self, levels: u32) {
        self.max_levels = levels.max(1);
        self.dirty = true;
    }

    /// Overrides the bin count for every band and arms recomputation.
    pub fn set_bin_count(&mut self, bins: usize) {
        self.bins_override = Some(bins);
        self.dirty = true;
    }

    /// Overrides the counted `[min, max]` range for every band and arms
    /// recomputation.
    pub fn set_value_range(&mut self, min: f64, max: f64) {
        self.min_override = Some(min);
        self.max_override = Some(max);
        self.dirty = true;
    }

    /// The current mode.
    pub fn mode(&self) -> HistogramMode {
        self.mode
    }

    /// The current resolution-level cap.
    pub fn max_levels(&self) -> u32 {
        self.max_levels
    }

    /// Installs a progress callback, invoked once per tile with the
    /// percent complete.
    pub fn set_progress_callback(&mut self, callback: ProgressCallback) {
        self.progress = Some(callback);
    }

    /// The shared tracker behind progress reporting, for polling from
    /// another thread.
    pub fn progress_tracker(&self) -> Arc<ProgressTracker> {
        Arc::clone(&self.tracker)
    }

    /// A handle that cancels the pass currently running (or the next
    /// one); the token is re-armed at the start of every pass.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Forces the next [`HistogramSource::execute`] to recompute.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// True when the next execute will recompute.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Runs a pass if one is armed.
    ///
    /// Returns true when a pass ran (even one that was cancelled), false
    /// when the cached result was still fresh. A cancelled pass leaves an
    /// incomplete result and does not re-arm itself.
    pub fn execute(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        self.cancel.reset();
        let result = match self.mode {
            HistogramMode::Normal => self.normal_pass(),
            HistogramMode::Fast => self.fast_pass(),
        };
        if !result.is_complete() {
            // Aborted: force progress to completion so drive loops
            // waiting on 100 percent do not hang.
            let tracker = &self.tracker;
            tracker.advance(tracker.total().saturating_sub(tracker.done()));
            if let Some(callback) = &self.progress {
                callback(100.0);
            }
        }
        self.result = Some(result);
        self.dirty = false;
        true
    }

    /// The most recently computed stack.
    pub fn histogram(&self) -> Option<&MultiResHistogram> {
        self.result.as_ref()
    }

    /// Takes the computed stack, leaving nothing cached.
    pub fn take_histogram(&mut self) -> Option<MultiResHistogram> {
        self.result.take()
    }

    /// Consumes the builder, returning its upstream.
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

    /// Full pass: every tile of every level through a private sequencer.
    fn normal_pass(&mut self) -> MultiResHistogram {
        let available = self.source.decimation_levels().max(1);
        let levels = self.max_levels.min(available);
        if levels < self.max_levels && !self.warned_level_shortfall {
            warn!(
                "histogram asked for {} resolution levels but the source carries {}, computing {}",
                self.max_levels, available, levels
            );
            self.warned_level_shortfall = true;
        }

        let aoi = self.aoi;
        let bins = self.bins_override;
        let vmin = self.min_override;
        let vmax = self.max_override;
        let cancel = self.cancel.clone();
        let tracker = Arc::clone(&self.tracker);
        let progress = self.progress.as_ref();
        let source = &mut self.source;

        // Size the whole job first so the per-tile percent is monotonic
        // across levels.
        let mut level_tiles: Vec<i64> = Vec::with_capacity(levels as usize);
        let mut total: u64 = 0;
        for level in 0..levels {
            let mut seq = TileSequencer::new(&mut *source).with_rlevel(level);
            if let Some(aoi) = aoi {
                seq.set_area_of_interest(aoi.decimated(level));
            }
            let tiles = seq.total_tiles();
            level_tiles.push(tiles);
            total += tiles.max(0) as u64;
        }
        tracker.reset(total);
        debug!("histogram pass over {} tiles in {} levels", total, levels);

        let mut stack: Vec<MultiBandHistogram> = Vec::with_capacity(levels as usize);
        let mut complete = true;
        'levels: for level in 0..levels {
            if cancel.is_cancelled() {
                complete = false;
                break;
            }
            let mut seq = TileSequencer::new(&mut *source).with_rlevel(level);
            if let Some(aoi) = aoi {
                seq.set_area_of_interest(aoi.decimated(level));
            }
            let clip = seq.area_of_interest();
            let mut hist = shaped_histogram(seq.source(), bins, vmin, vmax);
            for _ in 0..level_tiles[level as usize] {
                if cancel.is_cancelled() {
                    complete = false;
                    stack.push(hist);
                    break 'levels;
                }
                if let Some(tile) = seq.get_next_tile() {
                    tile.populate_histogram(&mut hist, &clip);
                }
                let percent = tracker.advance(1);
                if let Some(callback) = progress {
                    callback(percent);
                }
            }
            stack.push(hist);
        }
        MultiResHistogram::new(stack, complete)
    }

    /// Bounded pass: a strided grid of fixed-size tiles at level 0.
    fn fast_pass(&mut self) -> MultiResHistogram {
        let cancel = self.cancel.clone();
        let tracker = Arc::clone(&self.tracker);
        let progress = self.progress.as_ref();
        let source = &mut self.source;

        let mut hist = shaped_histogram(
            &*source,
            self.bins_override,
            self.min_override,
            self.max_override,
        );
        let aoi = match self.aoi {
            Some(aoi) => aoi,
            None => source.bounding_rect(0).unwrap_or_else(IRect::empty),
        };
        if aoi.is_degenerate() {
            tracker.reset(0);
            return MultiResHistogram::new(vec![hist], true);
        }

        let grid = aoi.stretched_to_grid(FAST_TILE_SIZE);
        let tiles_x = (grid.width() / FAST_TILE_SIZE as i64).max(1);
        let tiles_y = (grid.height() / FAST_TILE_SIZE as i64).max(1);
        let step_x = ((tiles_x + FAST_MAX_SPAN - 1) / FAST_MAX_SPAN).max(1);
        let step_y = ((tiles_y + FAST_MAX_SPAN - 1) / FAST_MAX_SPAN).max(1);
        let samples_x = (tiles_x + step_x - 1) / step_x;
        let samples_y = (tiles_y + step_y - 1) / step_y;
        tracker.reset((samples_x * samples_y) as u64);
        debug!(
            "fast histogram sampling {}x{} of {}x{} grid tiles",
            samples_x, samples_y, tiles_x, tiles_y
        );

        let size = ISize::new(FAST_TILE_SIZE, FAST_TILE_SIZE);
        let mut complete = true;
        'scan: for ty in (0..tiles_y).step_by(step_y as usize) {
            for tx in (0..tiles_x).step_by(step_x as usize) {
                if cancel.is_cancelled() {
                    complete = false;
                    break 'scan;
                }
                let x = grid.min.x as i64 + tx * FAST_TILE_SIZE as i64;
                let y = grid.min.y as i64 + ty * FAST_TILE_SIZE as i64;
                let rect = match (i32::try_from(x), i32::try_from(y)) {
                    (Ok(x), Ok(y)) => IRect::from_origin_size(IPoint::new(x, y), size),
                    _ => None,
                };
                if let Some(rect) = rect {
                    if let Some(tile) = source.get_tile(rect, 0) {
                        tile.populate_histogram(&mut hist, &grid);
                    }
                }
                let percent = tracker.advance(1);
                if let Some(callback) = progress {
                    callback(percent);
                }
            }
        }
        MultiResHistogram::new(vec![hist], complete)
    }
}

impl<S: ImageSource> Configurable for HistogramSource<S> {
    fn save_state(&self, props: &mut PropertyList, prefix: &str) {
        props.set(join_key(prefix, keys::MODE), self.mode.tag());
        props.set(join_key(prefix, keys::MAX_LEVELS), self.max_levels);
        if let Some(aoi) = self.aoi {
            props.set(join_key(prefix, keys::AREA_OF_INTEREST), aoi);
        }
        if let Some(bins) = self.bins_override {
            props.set(join_key(prefix, keys::BINS), bins);
        }
        if let Some(min) = self.min_override {
            props.set(join_key(prefix, keys::MIN_VALUE), min);
        }
        if let Some(max) = self.max_override {
            props.set(join_key(prefix, keys::MAX_VALUE), max);
        }
    }

    fn load_state(&mut self, props: &PropertyList, prefix: &str) -> PipelineResult<()> {
        if let Some(tag) = props.get(&join_key(prefix, keys::MODE)) {
            let mode = match tag {
                "normal" => HistogramMode::Normal,
                "fast" => HistogramMode::Fast,
                other => {
                    return Err(PipelineError::Config(format!(
                        "unknown histogram mode '{}'",
                        other
                    )))
                }
            };
            self.set_mode(mode);
        }
        if let Some(levels) = props.get_parsed(&join_key(prefix, keys::MAX_LEVELS))? {
            self.set_max_levels(levels);
        }
        if let Some(aoi) = props.get_parsed(&join_key(prefix, keys::AREA_OF_INTEREST))? {
            self.set_area_of_interest(aoi);
        }
        if let Some(bins) = props.get_parsed(&join_key(prefix, keys::BINS))? {
            self.set_bin_count(bins);
        }
        let min = props.get_parsed(&join_key(prefix, keys::MIN_VALUE))?;
        let max = props.get_parsed(&join_key(prefix, keys::MAX_VALUE))?;
        if let (Some(min), Some(max)) = (min, max) {
            self.set_value_range(min, max);
        }
        Ok(())
    }
}

/// One table per band, shaped from the source's declared radiometry with
/// any overrides applied uniformly.
fn shaped_histogram<S>(
    source: &S,
    bins: Option<usize>,
    min: Option<f64>,
    max: Option<f64>,
) -> MultiBandHistogram
where
    S: ImageSource + ?Sized,
{
    let bin_count = bins.unwrap_or_else(|| default_bin_count(source.scalar_kind()));
    let bands = (0..source.band_count())
        .map(|b| {
            BandHistogram::new(
                bin_count,
                min.unwrap_or_else(|| source.min_value(b)),
                max.unwrap_or_else(|| source.max_value(b)),
                source.null_value(b),
            )
        })
        .collect();
    MultiBandHistogram::new(bands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::ScalarKind;
    use crate::source::MemorySource;
    use crate::tile::RasterTile;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 64x64 raster where each value 1..=8 covers exactly 512 pixels.
    fn striped_source() -> MemorySource {
        let rect = IRect::from_bounds(0, 0, 63, 63);
        let mut source = MemorySource::new(rect, 1, ScalarKind::U8);
        for y in 0..64 {
            for x in 0..64 {
                let v = (x % 8 + 1) as f64;
                source.image_mut().set_sample(0, IPoint::new(x, y), v);
            }
        }
        source.image_mut().validate();
        source
    }

    /// A synthetic source of arbitrary extent that fabricates constant
    /// tiles on demand, so huge rasters cost nothing to back.
    struct ConstSource {
        rect: IRect,
        value: f64,
        calls: Arc<AtomicUsize>,
        last_size: Arc<Mutex<Option<ISize>>>,
    }

    impl ConstSource {
        fn new(rect: IRect, value: f64) -> Self {
            Self {
                rect,
                value,
                calls: Arc::new(AtomicUsize::new(0)),
                last_size: Arc::new(Mutex::new(None)),
            }
        }
    }

    impl ImageSource for ConstSource {
        fn get_tile(&mut self, rect: IRect, _rlevel: u32) -> Option<RasterTile> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            *self.last_size.lock() = Some(rect.size());
            let mut tile = RasterTile::allocated(rect, 1, ScalarKind::U8);
            let clip = rect.intersection(&self.rect);
            for y in clip.min.y..=clip.max.y {
                for x in clip.min.x..=clip.max.x {
                    tile.set_sample(0, IPoint::new(x, y), self.value);
                }
            }
            tile.validate();
            Some(tile)
        }

        fn bounding_rect(&self, _rlevel: u32) -> Option<IRect> {
            Some(self.rect)
        }

        fn band_count(&self) -> u32 {
            1
        }

        fn scalar_kind(&self) -> ScalarKind {
            ScalarKind::U8
        }
    }

    #[test]
    fn test_normal_mode_exact_counts() {
        let mut hist = HistogramSource::new(striped_source());
        assert!(hist.execute());

        let stack = hist.histogram().unwrap();
        assert!(stack.is_complete());
        assert_eq!(stack.level_count(), 1);

        let band = stack.level(0).unwrap().band(0).unwrap();
        assert_eq!(band.count(), 64 * 64);
        let hot: Vec<u64> = band.counts().iter().copied().filter(|&c| c > 0).collect();
        assert_eq!(hot, vec![512; 8]);
    }

    #[test]
    fn test_execute_is_dirty_gated() {
        let mut hist = HistogramSource::new(striped_source());
        assert!(hist.is_dirty());
        assert!(hist.execute());
        assert!(!hist.is_dirty());
        assert!(!hist.execute());

        hist.set_mode(HistogramMode::Fast);
        assert!(hist.execute());
        assert!(!hist.execute());

        hist.mark_dirty();
        assert!(hist.execute());
    }

    #[test]
    fn test_fast_mode_fetches_are_bounded() {
        // A raster far too large to walk: 100,000 pixels on a side. The
        // fast pass must stay at 11x11 fixed-size fetches.
        let source = ConstSource::new(IRect::from_bounds(0, 0, 99_999, 99_999), 42.0);
        let calls = Arc::clone(&source.calls);
        let last_size = Arc::clone(&source.last_size);

        let mut hist = HistogramSource::new(source).with_mode(HistogramMode::Fast);
        assert!(hist.execute());

        assert_eq!(calls.load(Ordering::Relaxed), 121);
        assert_eq!(
            *last_size.lock(),
            Some(ISize::new(FAST_TILE_SIZE, FAST_TILE_SIZE))
        );

        let stack = hist.histogram().unwrap();
        assert!(stack.is_complete());
        assert_eq!(stack.level_count(), 1);
        let band = stack.level(0).unwrap().band(0).unwrap();
        assert_eq!(band.count(), 121 * 32 * 32);
    }

    #[test]
    fn test_fast_equals_normal_when_grid_is_small() {
        // 128x128 under 32-pixel sampling is a 4x4 grid, inside the 11x11
        // cap, so the fast pass happens to see every pixel.
        let rect = IRect::from_bounds(0, 0, 127, 127);
        let mut normal = HistogramSource::new(ConstSource::new(rect, 7.0));
        assert!(normal.execute());
        let mut fast =
            HistogramSource::new(ConstSource::new(rect, 7.0)).with_mode(HistogramMode::Fast);
        assert!(fast.execute());

        let normal_band = normal.histogram().unwrap().level(0).unwrap().band(0).unwrap().clone();
        let fast_band = fast.histogram().unwrap().level(0).unwrap().band(0).unwrap().clone();
        assert_eq!(normal_band, fast_band);
        assert_eq!(normal_band.count(), 128 * 128);
    }

    #[test]
    fn test_level_cap_follows_the_source() {
        let source = striped_source().with_decimation_levels(2);
        let mut hist = HistogramSource::new(source).with_max_levels(5);
        assert!(hist.execute());

        let stack = hist.histogram().unwrap();
        assert_eq!(stack.level_count(), 2);
        assert!(stack.level(1).unwrap().band(0).unwrap().count() > 0);
    }

    #[test]
    fn test_cancel_keeps_partial_and_finishes_progress() {
        let source = striped_source().with_tile_hint(16, 16); // 16 tiles
        let mut hist = HistogramSource::new(source);
        let token = hist.cancel_token();
        hist.set_progress_callback(Box::new(move |_| token.cancel()));

        assert!(hist.execute());
        let stack = hist.histogram().unwrap();
        assert!(!stack.is_complete());
        // One tile landed before the token tripped.
        let band = stack.level(0).unwrap().band(0).unwrap();
        assert_eq!(band.count(), 16 * 16);
        assert_eq!(hist.progress_tracker().percent(), 100.0);
        // An aborted pass is not retried on its own.
        assert!(!hist.is_dirty());
        assert!(!hist.execute());
    }

    #[test]
    fn test_progress_is_monotonic_and_reaches_100() {
        let source = striped_source().with_tile_hint(16, 16);
        let mut hist = HistogramSource::new(source);
        let seen: Arc<Mutex<Vec<f64>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        hist.set_progress_callback(Box::new(move |pct| sink.lock().push(pct)));

        assert!(hist.execute());
        let seen = seen.lock();
        assert_eq!(seen.len(), 16);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*seen.last().unwrap(), 100.0);
    }

    #[test]
    fn test_overrides_shape_every_band() {
        let mut hist = HistogramSource::new(striped_source())
            .with_bin_count(10)
            .with_value_range(0.0, 100.0);
        assert!(hist.execute());

        let band = hist.histogram().unwrap().level(0).unwrap().band(0).unwrap();
        assert_eq!(band.bin_count(), 10);
        assert_eq!(band.min(), 0.0);
        assert_eq!(band.max(), 100.0);
    }

    #[test]
    fn test_explicit_aoi_limits_the_count() {
        let mut hist = HistogramSource::new(striped_source())
            .with_area_of_interest(IRect::from_bounds(0, 0, 31, 31));
        assert!(hist.execute());

        let band = hist.histogram().unwrap().level(0).unwrap().band(0).unwrap();
        assert_eq!(band.count(), 32 * 32);
    }

    #[test]
    fn test_state_round_trip() {
        let hist = HistogramSource::new(striped_source())
            .with_mode(HistogramMode::Fast)
            .with_max_levels(3)
            .with_bin_count(12)
            .with_value_range(-5.0, 5.0)
            .with_area_of_interest(IRect::from_bounds(0, 0, 9, 9));
        let mut props = PropertyList::new();
        hist.save_state(&mut props, "hist");

        let mut restored = HistogramSource::new(striped_source());
        restored.load_state(&props, "hist").unwrap();
        assert_eq!(restored.mode(), HistogramMode::Fast);
        assert_eq!(restored.max_levels(), 3);

        let mut saved_again = PropertyList::new();
        restored.save_state(&mut saved_again, "hist");
        assert_eq!(saved_again, props);

        let mut bad = PropertyList::new();
        bad.set("h.mode", "turbo");
        assert!(restored.load_state(&bad, "h").is_err());
    }
}
