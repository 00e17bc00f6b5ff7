//! Integration tests for the tile pipeline.
//!
//! These tests verify complete chains rather than single stages:
//! - Scene sources → mosaic → remap → sequencer drive
//! - Histogram statistics pulled through mid-chain filters
//! - State persistence of a configured chain through an INI file
//! - Tile ownership and coordinate-extreme behavior end to end
//!
//! Run with: `cargo test --test pipeline_integration`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tilestream::config::{Configurable, PropertyList};
use tilestream::geom::{IPoint, IRect};
use tilestream::histogram::{HistogramMode, HistogramSource};
use tilestream::lut::{BandLutFilter, IndexToRgbLutFilter, LutMode, RgbEntry, RgbLutMode};
use tilestream::mosaic::{MergePolicy, MosaicFilter};
use tilestream::pixel::ScalarKind;
use tilestream::sequencer::TileSequencer;
use tilestream::source::{ImageSource, MemorySource};
use tilestream::tile::{RasterTile, TileStatus};

// ============================================================================
// Helper Functions
// ============================================================================

/// A solid scene covering `rect` with every sample at `value`.
fn scene(rect: IRect, kind: ScalarKind, value: f64) -> MemorySource {
    let mut source = MemorySource::new(rect, 1, kind);
    source.image_mut().fill(value);
    source.image_mut().validate();
    source
}

/// A synthetic source far too large to materialize. It fabricates a
/// constant tile for any rectangle and counts how many it was asked for.
struct CountingSource {
    extent: IRect,
    value: f64,
    calls: Arc<AtomicUsize>,
}

impl ImageSource for CountingSource {
    fn get_tile(&mut self, rect: IRect, _rlevel: u32) -> Option<RasterTile> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut tile = RasterTile::allocated(rect, 1, ScalarKind::U8);
        tile.fill(self.value);
        tile.validate();
        Some(tile)
    }

    fn bounding_rect(&self, _rlevel: u32) -> Option<IRect> {
        Some(self.extent)
    }

    fn band_count(&self) -> u32 {
        1
    }

    fn scalar_kind(&self) -> ScalarKind {
        ScalarKind::U8
    }
}

/// Finds the pulled tile covering `p` and reads band `band` there.
fn sample_at(tiles: &[RasterTile], band: u32, p: IPoint) -> Option<f64> {
    tiles
        .iter()
        .find(|t| t.rect().contains(p))
        .and_then(|t| t.sample(band, p))
}

// ============================================================================
// Integration Tests
// ============================================================================

/// Two overlapping scenes flow through mosaic, remap and sequencer:
/// 1. The west scene fills [0,63]^2 with 40, the east [32,95]x[0,63] with 200
/// 2. The mosaic prefers the earlier input where they overlap
/// 3. A remap table stretches {40 -> 400, 200 -> 2000} onto U16 storage
/// 4. The sequencer drives the union as a 3x2 grid of 32x32 tiles
#[test]
fn test_scenes_mosaic_remap_drive_flow() {
    let mut mosaic = MosaicFilter::new();
    mosaic.add_input(scene(IRect::from_bounds(0, 0, 63, 63), ScalarKind::U8, 40.0));
    mosaic.add_input(scene(IRect::from_bounds(32, 0, 95, 63), ScalarKind::U8, 200.0));

    let remap = BandLutFilter::new(mosaic)
        .with_table(vec![(40.0, 400.0), (200.0, 2000.0)])
        .with_mode(LutMode::Interpolated)
        .with_output_kind(ScalarKind::U16);

    let mut seq = TileSequencer::new(remap).with_tile_size(32, 32);
    assert_eq!(seq.total_tiles(), 6);

    let mut produced = Vec::new();
    while let Some(tile) = seq.get_next_tile() {
        assert_eq!(tile.kind(), ScalarKind::U16);
        assert_eq!(tile.status(), TileStatus::Full);
        produced.push(tile);
    }
    assert_eq!(produced.len(), 6);

    // West-only, overlap (west wins) and east-only pixels after remap.
    assert_eq!(sample_at(&produced, 0, IPoint::new(10, 10)), Some(400.0));
    assert_eq!(sample_at(&produced, 0, IPoint::new(40, 40)), Some(400.0));
    assert_eq!(sample_at(&produced, 0, IPoint::new(80, 10)), Some(2000.0));
}

/// Tiles pulled from a chain own their storage: writing into one pulled
/// tile never shows through another, even when both are alive.
#[test]
fn test_pulled_tiles_do_not_alias() {
    let mut mosaic = MosaicFilter::new();
    mosaic.add_input(scene(IRect::from_bounds(0, 0, 63, 63), ScalarKind::U8, 9.0));

    let mut seq = TileSequencer::new(mosaic).with_tile_size(32, 32);
    let first = seq.get_next_tile().unwrap();
    let mut second = seq.get_next_tile().unwrap();

    let probe = first.rect().min;
    assert_eq!(first.sample(0, probe), Some(9.0));

    second.fill_band(0, 200.0);
    assert_eq!(
        first.sample(0, probe),
        Some(9.0),
        "mutating the second tile must not leak into the first"
    );
}

/// The fast histogram keeps its fetch bound with a mosaic mid-chain:
/// 1. A synthetic 100000x100000 source sits behind a single-input mosaic
/// 2. Fast mode samples at most an 11x11 grid of 32x32 probe tiles
/// 3. Every probe passes through the mosaic to the backing source
#[test]
fn test_fast_histogram_stays_bounded_through_mosaic() {
    let calls = Arc::new(AtomicUsize::new(0));
    let backing = CountingSource {
        extent: IRect::from_bounds(0, 0, 99_999, 99_999),
        value: 17.0,
        calls: Arc::clone(&calls),
    };
    let mut mosaic = MosaicFilter::new();
    mosaic.add_input(backing);

    let mut pass = HistogramSource::new(mosaic).with_mode(HistogramMode::Fast);
    assert!(pass.execute());

    assert_eq!(calls.load(Ordering::SeqCst), 121);
    let hist = pass.histogram().unwrap();
    assert!(hist.is_complete());
    assert_eq!(hist.level(0).unwrap().total_count(), 121 * 32 * 32);
}

/// A mosaic union larger than its inputs leaves null blanks that the
/// histogram never counts:
/// 1. Two disjoint scenes form an L-shaped union inside a 96x64 box
/// 2. The normal pass drives the mosaic tile by tile
/// 3. Only covered pixels are counted, the void quadrant contributes nothing
#[test]
fn test_histogram_counts_only_covered_pixels() {
    let mut mosaic = MosaicFilter::new();
    mosaic.add_input(scene(IRect::from_bounds(0, 0, 63, 63), ScalarKind::U8, 30.0));
    mosaic.add_input(scene(IRect::from_bounds(64, 0, 95, 31), ScalarKind::U8, 90.0));

    let mut pass = HistogramSource::new(mosaic);
    assert!(pass.execute());
    let hist = pass.histogram().unwrap();
    let band = hist.level(0).unwrap().band(0).unwrap();

    assert_eq!(band.count(), 64 * 64 + 32 * 32);

    // Bin placement mirrors the default U8 range [1, 255] over 256 bins.
    let bin_of = |v: f64| ((v - 1.0) / 254.0 * 256.0) as usize;
    assert_eq!(band.counts()[bin_of(30.0)], 64 * 64);
    assert_eq!(band.counts()[bin_of(90.0)], 32 * 32);
}

/// Class indices colorize into three-band RGB tiles mid-chain:
/// 1. A single-band map holds classes 1..=3 with one null pixel
/// 2. The literal table colors each class exactly
/// 3. The null pixel comes out as the black null triple
#[test]
fn test_index_colors_flow_to_rgb_tiles() {
    let rect = IRect::from_bounds(0, 0, 31, 31);
    let mut map = MemorySource::new(rect, 1, ScalarKind::U8);
    {
        let image = map.image_mut();
        image.fill(1.0);
        for y in 0..=31 {
            for x in 0..=15 {
                image.set_sample(0, IPoint::new(x, y), 2.0);
            }
            image.set_sample(0, IPoint::new(16, y), 3.0);
        }
        image.set_sample(0, IPoint::new(30, 30), 0.0);
        image.validate();
    }

    let colorized = IndexToRgbLutFilter::new(map)
        .with_mode(RgbLutMode::Literal)
        .with_entries(vec![
            RgbEntry {
                index: 1.0,
                rgb: [255, 0, 0],
            },
            RgbEntry {
                index: 2.0,
                rgb: [0, 255, 0],
            },
            RgbEntry {
                index: 3.0,
                rgb: [0, 0, 255],
            },
        ]);

    let mut seq = TileSequencer::new(colorized).with_tile_size(32, 32);
    let tile = seq.get_next_tile().unwrap();

    assert_eq!(tile.bands(), 3);
    assert_eq!(tile.kind(), ScalarKind::U8);
    let rgb = |p: IPoint| {
        [
            tile.sample(0, p).unwrap(),
            tile.sample(1, p).unwrap(),
            tile.sample(2, p).unwrap(),
        ]
    };
    assert_eq!(rgb(IPoint::new(4, 4)), [0.0, 255.0, 0.0]);
    assert_eq!(rgb(IPoint::new(16, 8)), [0.0, 0.0, 255.0]);
    assert_eq!(rgb(IPoint::new(20, 8)), [255.0, 0.0, 0.0]);
    assert_eq!(rgb(IPoint::new(30, 30)), [0.0, 0.0, 0.0]);
    assert_eq!(tile.status(), TileStatus::Partial);
}

/// A grid whose interior tiles would overflow pixel space degrades to
/// `None` per tile instead of wrapping:
/// 1. A 100x100 scene sits flush against the i32 coordinate limit
/// 2. Only the upper-left 64x64 grid tile has an addressable rectangle
/// 3. Queries for the other three return None and the drive terminates
#[test]
fn test_sequencer_survives_coordinate_extremes() {
    let lo = i32::MAX - 99;
    let aoi = IRect::from_bounds(lo, lo, i32::MAX, i32::MAX);

    let mut seq = TileSequencer::new(scene(aoi, ScalarKind::U8, 3.0)).with_tile_size(64, 64);
    assert_eq!(seq.total_tiles(), 4);

    let addressable: Vec<bool> = (0..4).map(|id| seq.get_tile_by_id(id).is_some()).collect();
    assert_eq!(addressable, vec![true, false, false, false]);

    seq.rewind();
    let mut pulled = 0;
    while let Some(_tile) = seq.get_next_tile() {
        pulled += 1;
    }
    assert_eq!(pulled, 1, "the drive stops at the first unaddressable tile");
}

/// A configured chain writes its state to an INI file and fresh stages
/// restore it:
/// 1. Sequencer, mosaic, histogram and remap settings save under distinct
///    prefixes in one property tree
/// 2. The tree survives the file round trip
/// 3. Freshly built stages load the tree and save an identical one
#[test]
fn test_chain_state_round_trips_through_ini_file() {
    let aoi = IRect::from_bounds(0, 0, 299, 199);
    let backing = || scene(aoi, ScalarKind::U8, 5.0);

    let seq = TileSequencer::new(backing())
        .with_area_of_interest(IRect::from_bounds(10, 10, 199, 149))
        .with_tile_size(50, 40);
    let mosaic = MosaicFilter::new().with_policy(MergePolicy::elevation());
    let hist = HistogramSource::new(backing())
        .with_mode(HistogramMode::Fast)
        .with_bin_count(64);
    let remap = BandLutFilter::new(backing())
        .with_table(vec![(1.0, 10.0), (9.0, 90.0)])
        .with_mode(LutMode::Interpolated);

    let mut props = PropertyList::new();
    seq.save_state(&mut props, "sequencer");
    mosaic.save_state(&mut props, "mosaic");
    hist.save_state(&mut props, "histogram");
    remap.save_state(&mut props, "remap");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline.ini");
    props.to_ini_file(&path).unwrap();
    let restored = PropertyList::from_ini_file(&path).unwrap();

    let mut seq2 = TileSequencer::new(backing());
    let mut mosaic2 = MosaicFilter::new();
    let mut hist2 = HistogramSource::new(backing());
    let mut remap2 = BandLutFilter::new(backing());
    seq2.load_state(&restored, "sequencer").unwrap();
    mosaic2.load_state(&restored, "mosaic").unwrap();
    hist2.load_state(&restored, "histogram").unwrap();
    remap2.load_state(&restored, "remap").unwrap();

    let mut saved_again = PropertyList::new();
    seq2.save_state(&mut saved_again, "sequencer");
    mosaic2.save_state(&mut saved_again, "mosaic");
    hist2.save_state(&mut saved_again, "histogram");
    remap2.save_state(&mut saved_again, "remap");
    assert_eq!(saved_again, props);
}

/// A random scene's histogram matches counts tallied while painting:
/// 1. Every pixel gets a random value in [1, 255]
/// 2. Expected bin counts are tallied during painting
/// 3. The normal pass over the source reproduces them exactly
#[test]
fn test_histogram_matches_tally_on_random_scene() {
    use rand::Rng;

    let rect = IRect::from_bounds(0, 0, 63, 63);
    let mut source = MemorySource::new(rect, 1, ScalarKind::U8);
    let mut rng = rand::rng();
    let mut expected = vec![0u64; 256];
    {
        let image = source.image_mut();
        for y in 0..=63 {
            for x in 0..=63 {
                let value = f64::from(rng.random_range(1..=255u8));
                image.set_sample(0, IPoint::new(x, y), value);
                expected[(((value - 1.0) / 254.0 * 256.0) as usize).min(255)] += 1;
            }
        }
        image.validate();
    }

    let mut pass = HistogramSource::new(source);
    assert!(pass.execute());
    let band = pass.histogram().unwrap().level(0).unwrap().band(0).unwrap();
    assert_eq!(band.count(), 64 * 64);
    assert_eq!(band.counts(), expected.as_slice());
}

/// Progress and cancellation work through a full chain:
/// 1. A histogram pass over a mosaic reports monotonic progress
/// 2. Cancelling from the callback keeps the partial result
/// 3. The pass still lands on 100 percent and does not re-arm
#[test]
fn test_chain_progress_and_cancellation() {
    let mut mosaic = MosaicFilter::new();
    mosaic.add_input(
        scene(IRect::from_bounds(0, 0, 127, 127), ScalarKind::U8, 12.0).with_tile_hint(32, 32),
    );

    let mut pass = HistogramSource::new(mosaic);
    let cancel = pass.cancel_token();
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let seen_cb = Arc::clone(&seen);
    pass.set_progress_callback(Box::new(move |pct| {
        seen_cb.lock().push(pct);
        if pct >= 50.0 {
            cancel.cancel();
        }
    }));

    assert!(pass.execute());

    let history = seen.lock().clone();
    assert!(history.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(history.last().copied(), Some(100.0));

    let hist = pass.histogram().unwrap();
    assert!(!hist.is_complete(), "a cancelled pass keeps a partial stack");
    assert!(!pass.is_dirty(), "a cancelled pass is not retried");
}
