//! Multi-threaded drivers for stripe-partitioned areas.
//!
//! Every tile produced by this pipeline owns its pixel storage, so
//! independent chains over disjoint stripes of one area can run on worker
//! threads without sharing mutable state. This module provides the stripe
//! partitioner and two [rayon] drivers built on it: a histogram collector
//! and a generic tile visitor.
//!
//! # Architecture
//!
//! - [`partition_aoi`] cuts an area of interest into horizontal stripes of
//!   near-equal height that cover it exactly.
//! - Each worker builds its own source through a caller-supplied factory,
//!   typically by reopening a dataset or cloning a cheap handle, so no
//!   source is ever shared across threads.
//! - Partial results are plain values merged on the calling thread.
//!
//! # Example
//!
//! ```
//! use tilestream::geom::IRect;
//! use tilestream::parallel::{parallel_histogram, partition_aoi};
//! use tilestream::pixel::ScalarKind;
//! use tilestream::source::MemorySource;
//!
//! let aoi = IRect::from_bounds(0, 0, 63, 63);
//! let stripes = partition_aoi(&aoi, 4);
//! assert_eq!(stripes.len(), 4);
//!
//! let hist = parallel_histogram(&aoi, 4, || {
//!     let mut source = MemorySource::new(aoi, 1, ScalarKind::U8);
//!     source.image_mut().fill(9.0);
//!     source.image_mut().validate();
//!     source
//! });
//! let hist = hist.unwrap();
//! assert_eq!(hist.level(0).unwrap().total_count(), 64 * 64);
//! ```

use rayon::prelude::*;
use tracing::warn;

use crate::geom::IRect;
use crate::histogram::{HistogramSource, MultiResHistogram};
use crate::sequencer::TileSequencer;
use crate::source::ImageSource;
use crate::tile::RasterTile;

/// Splits `aoi` into up to `parts` horizontal stripes of near-equal
/// height.
///
/// Stripes cover the area exactly, in top-to-bottom order, and each spans
/// the full width. When the area has fewer rows than `parts`, one stripe
/// per row is returned. A degenerate area yields no stripes and `parts`
/// of zero is treated as one.
pub fn partition_aoi(aoi: &IRect, parts: usize) -> Vec<IRect> {
    if aoi.is_degenerate() {
        return Vec::new();
    }
    let height = aoi.height();
    let parts = (parts.max(1) as i64).min(height);
    let base = height / parts;
    let extra = height % parts;

    let mut stripes = Vec::with_capacity(parts as usize);
    let mut top = aoi.min.y as i64;
    for i in 0..parts {
        let rows = base + i64::from(i < extra);
        let bottom = top + rows - 1;
        // top and bottom stay inside [aoi.min.y, aoi.max.y], so the casts
        // cannot truncate.
        stripes.push(IRect::from_bounds(
            aoi.min.x,
            top as i32,
            aoi.max.x,
            bottom as i32,
        ));
        top = bottom + 1;
    }
    stripes
}

/// Collects a full-resolution histogram over `aoi` by running one pass
/// per stripe on the rayon pool and merging the partial results.
///
/// `make_source` builds an independent source for each worker. Only
/// resolution level zero is collected: a decimated stripe grid would
/// re-read rows that straddle stripe boundaries and skew the counts, so
/// callers that want coarser levels run a sequential
/// [`HistogramSource`] pass instead.
///
/// Returns `None` when the area is degenerate or no stripe produced a
/// histogram. A stripe whose histogram shape differs from the first
/// stripe is dropped with a warning; that only happens when
/// `make_source` does not build identical sources.
pub fn parallel_histogram<S, F>(
    aoi: &IRect,
    stripes: usize,
    make_source: F,
) -> Option<MultiResHistogram>
where
    S: ImageSource,
    F: Fn() -> S + Sync,
{
    let parts = partition_aoi(aoi, stripes);
    if parts.is_empty() {
        return None;
    }

    let partials: Vec<MultiResHistogram> = parts
        .into_par_iter()
        .filter_map(|stripe| {
            let mut pass = HistogramSource::new(make_source())
                .with_area_of_interest(stripe)
                .with_max_levels(1);
            pass.execute();
            pass.take_histogram()
        })
        .collect();

    let mut merged: Option<MultiResHistogram> = None;
    for partial in partials {
        match merged.as_mut() {
            None => merged = Some(partial),
            Some(total) => {
                if !total.merge(&partial) {
                    warn!("stripe histogram shape differs from the first stripe, stripe dropped");
                }
            }
        }
    }
    merged
}

/// Runs one tile sequencer per stripe on the rayon pool and hands every
/// produced tile to `visit`. Returns the number of tiles visited.
///
/// Tiles own their pixel storage, so `visit` may inspect, keep or send
/// them without synchronizing with the other stripes. Tile order within
/// a stripe is row-major; order across stripes follows the rayon
/// schedule.
pub fn drive_stripes<S, F, V>(aoi: &IRect, stripes: usize, make_source: F, visit: V) -> u64
where
    S: ImageSource,
    F: Fn() -> S + Sync,
    V: Fn(RasterTile) + Sync,
{
    partition_aoi(aoi, stripes)
        .into_par_iter()
        .map(|stripe| {
            let mut seq = TileSequencer::new(make_source()).with_area_of_interest(stripe);
            let mut count = 0u64;
            while let Some(tile) = seq.get_next_tile() {
                visit(tile);
                count += 1;
            }
            count
        })
        .sum()
}
