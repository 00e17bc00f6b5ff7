//! Frequency tables over raster sample values.
//!
//! A [`BandHistogram`] is a fixed-bin frequency table for one band with
//! its own null sentinel and value range; samples equal to the null or
//! outside the range are not counted. [`MultiBandHistogram`] groups one
//! table per band, and [`MultiResHistogram`] stacks those per resolution
//! level, which is the shape the histogram builder produces and exports.
//!
//! Histograms of identical shape merge commutatively, so disjoint
//! sub-areas can be accumulated in parallel and combined (see
//! [`crate::parallel`]).

pub mod source;

use serde::{Deserialize, Serialize};

use crate::error::PipelineResult;
use crate::pixel::ScalarKind;
use crate::source::ImageSource;

pub use source::{HistogramMode, HistogramSource};

/// Bin count used for a kind when no override is given: byte kinds get
/// one bin per code, 16-bit kinds likewise, everything wider 1024.
pub fn default_bin_count(kind: ScalarKind) -> usize {
    match kind {
        ScalarKind::U8 | ScalarKind::S8 => 256,
        ScalarKind::U16 | ScalarKind::S16 => 65536,
        _ => 1024,
    }
}

/// A frequency table for one band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandHistogram {
    bins: Vec<u64>,
    min: f64,
    max: f64,
    null: f64,
}

impl BandHistogram {
    /// Creates a table of `bin_count` zeroed bins over `[min, max]`.
    ///
    /// A zero bin count is raised to one.
    pub fn new(bin_count: usize, min: f64, max: f64, null: f64) -> Self {
        Self {
            bins: vec![0; bin_count.max(1)],
            min,
            max,
            null,
        }
    }

    /// Counts one sample.
    ///
    /// Samples equal to the null sentinel or outside `[min, max]` are
    /// dropped. When the range is a single point, everything that passes
    /// the tests lands in bin 0.
    pub fn record(&mut self, value: f64) {
        if value == self.null || value < self.min || value > self.max {
            return;
        }
        let n = self.bins.len();
        let idx = if self.max > self.min {
            let t = (value - self.min) / (self.max - self.min);
            ((t * n as f64) as usize).min(n - 1)
        } else {
            0
        };
        self.bins[idx] += 1;
    }

    /// Number of bins.
    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    /// The raw frequency counts.
    pub fn counts(&self) -> &[u64] {
        &self.bins
    }

    /// Lower edge of the counted range.
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Upper edge of the counted range.
    pub fn max(&self) -> f64 {
        self.max
    }

    /// The null sentinel excluded from counting.
    pub fn null_value(&self) -> f64 {
        self.null
    }

    /// The representative value of bin `i` (its center).
    pub fn bin_center(&self, i: usize) -> f64 {
        if self.max <= self.min {
            return self.min;
        }
        let width = (self.max - self.min) / self.bins.len() as f64;
        self.min + (i as f64 + 0.5) * width
    }

    /// Total counted samples.
    pub fn count(&self) -> u64 {
        self.bins.iter().sum()
    }

    /// Fraction of counted samples in bin `i`, zero when nothing was
    /// counted.
    pub fn bin_fraction(&self, i: usize) -> f64 {
        let total = self.count();
        if total == 0 {
            return 0.0;
        }
        self.bins.get(i).copied().unwrap_or(0) as f64 / total as f64
    }

    /// Mean of the counted samples, estimated from bin centers.
    pub fn mean(&self) -> f64 {
        let total = self.count();
        if total == 0 {
            return 0.0;
        }
        let sum: f64 = self
            .bins
            .iter()
            .enumerate()
            .map(|(i, &c)| self.bin_center(i) * c as f64)
            .sum();
        sum / total as f64
    }

    /// Population standard deviation, estimated from bin centers.
    pub fn stddev(&self) -> f64 {
        let total = self.count();
        if total == 0 {
            return 0.0;
        }
        let mean = self.mean();
        let sum: f64 = self
            .bins
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let d = self.bin_center(i) - mean;
                d * d * c as f64
            })
            .sum();
        (sum / total as f64).sqrt()
    }

    /// Adds another table's counts into this one.
    ///
    /// Requires identical shape (bin count, range and null); returns
    /// false and changes nothing on a mismatch.
    pub fn merge(&mut self, other: &BandHistogram) -> bool {
        if self.bins.len() != other.bins.len()
            || self.min != other.min
            || self.max != other.max
            || self.null != other.null
        {
            return false;
        }
        for (mine, theirs) in self.bins.iter_mut().zip(&other.bins) {
            *mine += theirs;
        }
        true
    }
}

/// One frequency table per band of a raster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiBandHistogram {
    bands: Vec<BandHistogram>,
}

impl MultiBandHistogram {
    /// Creates a group from per-band tables.
    pub fn new(bands: Vec<BandHistogram>) -> Self {
        Self { bands }
    }

    /// Creates a group shaped after `source`: one table per band, default
    /// bin count for the source's kind, range and null from the source's
    /// declarations.
    pub fn for_source<S>(source: &S) -> Self
    where
        S: ImageSource + ?Sized,
    {
        let bins = default_bin_count(source.scalar_kind());
        let bands = (0..source.band_count())
            .map(|b| {
                BandHistogram::new(
                    bins,
                    source.min_value(b),
                    source.max_value(b),
                    source.null_value(b),
                )
            })
            .collect();
        Self { bands }
    }

    /// Counts one sample into band `band`; out-of-range bands are
    /// ignored.
    pub fn record(&mut self, band: u32, value: f64) {
        if let Some(hist) = self.bands.get_mut(band as usize) {
            hist.record(value);
        }
    }

    /// The table for `band`.
    pub fn band(&self, band: u32) -> Option<&BandHistogram> {
        self.bands.get(band as usize)
    }

    /// All per-band tables.
    pub fn bands(&self) -> &[BandHistogram] {
        &self.bands
    }

    /// Number of bands.
    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Counted samples across all bands.
    pub fn total_count(&self) -> u64 {
        self.bands.iter().map(BandHistogram::count).sum()
    }

    /// Merges band-wise under [`BandHistogram::merge`]'s shape rules.
    ///
    /// Returns false and changes nothing when the band counts differ or
    /// any band pair mismatches.
    pub fn merge(&mut self, other: &MultiBandHistogram) -> bool {
        if self.bands.len() != other.bands.len() {
            return false;
        }
        let compatible = self
            .bands
            .iter()
            .zip(&other.bands)
            .all(|(a, b)| {
                a.bins.len() == b.bins.len()
                    && a.min == b.min
                    && a.max == b.max
                    && a.null == b.null
            });
        if !compatible {
            return false;
        }
        for (mine, theirs) in self.bands.iter_mut().zip(&other.bands) {
            mine.merge(theirs);
        }
        true
    }
}

/// Per-band histograms stacked per resolution level, plus whether the
/// producing pass ran to completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiResHistogram {
    levels: Vec<MultiBandHistogram>,
    complete: bool,
}

impl MultiResHistogram {
    /// Wraps per-level groups; `complete` records whether the producing
    /// pass finished or was cancelled partway.
    pub fn new(levels: Vec<MultiBandHistogram>, complete: bool) -> Self {
        Self { levels, complete }
    }

    /// The group for resolution level `level`.
    pub fn level(&self, level: u32) -> Option<&MultiBandHistogram> {
        self.levels.get(level as usize)
    }

    /// All levels, finest first.
    pub fn levels(&self) -> &[MultiBandHistogram] {
        &self.levels
    }

    /// Number of levels carried.
    pub fn level_count(&self) -> u32 {
        self.levels.len() as u32
    }

    /// True when the producing pass visited everything it was asked to.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Merges level-wise; completeness survives only when both sides are
    /// complete. Returns false and changes nothing when the level counts
    /// or any level shapes differ.
    pub fn merge(&mut self, other: &MultiResHistogram) -> bool {
        if self.levels.len() != other.levels.len() {
            return false;
        }
        // Dry-run the shape checks so a late mismatch cannot leave a
        // half-merged stack.
        let compatible = self
            .levels
            .iter()
            .zip(&other.levels)
            .all(|(a, b)| {
                a.bands.len() == b.bands.len()
                    && a.bands.iter().zip(&b.bands).all(|(x, y)| {
                        x.bins.len() == y.bins.len()
                            && x.min == y.min
                            && x.max == y.max
                            && x.null == y.null
                    })
            });
        if !compatible {
            return false;
        }
        for (mine, theirs) in self.levels.iter_mut().zip(&other.levels) {
            mine.merge(theirs);
        }
        self.complete = self.complete && other.complete;
        true
    }

    /// Serializes to JSON for on-disk persistence.
    pub fn to_json(&self) -> PipelineResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Restores a stack serialized with [`MultiResHistogram::to_json`].
    pub fn from_json(json: &str) -> PipelineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
