//! Per-band numeric remapping through an explicit value table.

use tracing::warn;

use crate::config::{join_key, keys, Configurable, PropertyList};
use crate::error::{PipelineError, PipelineResult};
use crate::geom::IRect;
use crate::pixel::ScalarKind;
use crate::source::ImageSource;
use crate::tile::pool::TilePool;
use crate::tile::{RasterTile, TileStatus};

/// How a value is looked up in a band table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LutMode {
    /// Exact key match only; anything else maps to the output null
    #[default]
    Literal,
    /// Exact match, or linear interpolation between the bracketing
    /// entries; values outside the table range map to the output null
    Interpolated,
}

impl LutMode {
    fn tag(&self) -> &'static str {
        match self {
            LutMode::Literal => "literal",
            LutMode::Interpolated => "interpolated",
        }
    }
}

/// Remaps every sample through a per-band value table.
///
/// Bands beyond the last table reuse the last table, mirroring the
/// band-duplication rule of the mosaic. The output scalar kind defaults
/// to the input's and can be overridden; either way the input's null
/// samples stay null in the output, and every mapped value is clamped
/// into the output's declared `[min, max]` before the typed write.
pub struct BandLutFilter<S: ImageSource> {
    source: S,
    tables: Vec<Vec<(f64, f64)>>,
    mode: LutMode,
    output_kind: Option<ScalarKind>,
    pool: TilePool,
}

impl<S: ImageSource> BandLutFilter<S> {
    /// Creates a literal-mode filter with no tables over `source`.
    ///
    /// Without a table every valid sample maps to the output null; load
    /// tables before pulling tiles.
    pub fn new(source: S) -> Self {
        Self {
            source,
            tables: Vec::new(),
            mode: LutMode::Literal,
            output_kind: None,
            pool: TilePool::new(),
        }
    }

    /// Sets one table shared by every band, builder style.
    pub fn with_table(mut self, table: Vec<(f64, f64)>) -> Self {
        self.tables = vec![sorted(table)];
        self
    }

    /// Sets the lookup mode, builder style.
    pub fn with_mode(mut self, mode: LutMode) -> Self {
        self.mode = mode;
        self
    }

    /// Declares the output scalar kind, builder style.
    pub fn with_output_kind(mut self, kind: ScalarKind) -> Self {
        self.output_kind = Some(kind);
        self
    }

    /// Replaces the table for `band`, padding intermediate bands with
    /// empty tables.
    pub fn set_band_table(&mut self, band: usize, table: Vec<(f64, f64)>) {
        if self.tables.len() <= band {
            self.tables.resize(band + 1, Vec::new());
        }
        self.tables[band] = sorted(table);
    }

    /// Replaces the lookup mode.
    pub fn set_mode(&mut self, mode: LutMode) {
        self.mode = mode;
    }

    /// The current lookup mode.
    pub fn mode(&self) -> LutMode {
        self.mode
    }

    /// Declares the output scalar kind; `None` follows the input.
    pub fn set_output_kind(&mut self, kind: Option<ScalarKind>) {
        self.output_kind = kind;
    }

    /// Consumes the filter, returning its upstream.
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

    fn table_for(&self, band: usize) -> &[(f64, f64)] {
        if self.tables.is_empty() {
            return &[];
        }
        &self.tables[band.min(self.tables.len() - 1)]
    }
}

impl<S: ImageSource> ImageSource for BandLutFilter<S> {
    fn get_tile(&mut self, rect: IRect, rlevel: u32) -> Option<RasterTile> {
        let input = self.source.get_tile(rect, rlevel)?;
        if input.buffer().is_none() || input.status() == TileStatus::Null {
            return None;
        }
        let pool = self.pool.clone();
        let mut out = pool.acquire_for(&*self, rect);
        if input.status() == TileStatus::Empty || out.buffer().is_none() {
            return Some(out);
        }

        let mut values: Vec<f64> = Vec::new();
        for band in 0..out.bands() {
            if !input.band_to_f64(band, &mut values) {
                continue;
            }
            let table = self.table_for(band as usize);
            let in_null = input.null_value(band);
            let out_null = out.null_value(band);
            let out_min = out.min_value(band);
            let out_max = out.max_value(band);
            for value in values.iter_mut() {
                *value = if *value == in_null {
                    out_null
                } else {
                    match lookup(table, *value, self.mode) {
                        Some(mapped) => mapped.clamp(out_min, out_max),
                        None => out_null,
                    }
                };
            }
            out.write_band_f64(band, &values);
        }
        out.validate();
        Some(out)
    }

    fn bounding_rect(&self, rlevel: u32) -> Option<IRect> {
        self.source.bounding_rect(rlevel)
    }

    fn band_count(&self) -> u32 {
        self.source.band_count()
    }

    fn scalar_kind(&self) -> ScalarKind {
        self.output_kind.unwrap_or_else(|| self.source.scalar_kind())
    }

    fn null_value(&self, band: u32) -> f64 {
        match self.output_kind {
            Some(kind) => kind.default_null(),
            None => self.source.null_value(band),
        }
    }

    fn min_value(&self, band: u32) -> f64 {
        match self.output_kind {
            Some(kind) => kind.default_min(),
            None => self.source.min_value(band),
        }
    }

    fn max_value(&self, band: u32) -> f64 {
        match self.output_kind {
            Some(kind) => kind.default_max(),
            None => self.source.max_value(band),
        }
    }

    fn tile_width(&self) -> i32 {
        self.source.tile_width()
    }

    fn tile_height(&self) -> i32 {
        self.source.tile_height()
    }

    fn decimation_levels(&self) -> u32 {
        self.source.decimation_levels()
    }
}

impl<S: ImageSource> Configurable for BandLutFilter<S> {
    fn save_state(&self, props: &mut PropertyList, prefix: &str) {
        props.set(join_key(prefix, keys::LUT_MODE), self.mode.tag());
        if let Some(kind) = self.output_kind {
            props.set(join_key(prefix, keys::OUTPUT_KIND), kind);
        }
        for (band, table) in self.tables.iter().enumerate() {
            let band_prefix = join_key(prefix, &keys::band_prefix(band as u32));
            for (n, (input, output)) in table.iter().enumerate() {
                props.set(join_key(&band_prefix, &keys::entry_in(n)), input);
                props.set(join_key(&band_prefix, &keys::entry_out(n)), output);
            }
        }
    }

    fn load_state(&mut self, props: &PropertyList, prefix: &str) -> PipelineResult<()> {
        if let Some(tag) = props.get(&join_key(prefix, keys::LUT_MODE)) {
            self.mode = match tag {
                "literal" => LutMode::Literal,
                "interpolated" => LutMode::Interpolated,
                other => {
                    return Err(PipelineError::Config(format!(
                        "unknown lut mode '{}'",
                        other
                    )))
                }
            };
        }
        if let Some(kind) = props.get_parsed(&join_key(prefix, keys::OUTPUT_KIND))? {
            self.output_kind = Some(kind);
        }

        // Tables are numbered densely per band; the first missing index
        // ends a table, the first band without an entry ends the scan.
        let mut tables: Vec<Vec<(f64, f64)>> = Vec::new();
        for band in 0.. {
            let band_prefix = join_key(prefix, &keys::band_prefix(band));
            let mut table: Vec<(f64, f64)> = Vec::new();
            for n in 0.. {
                let input = props.get_parsed(&join_key(&band_prefix, &keys::entry_in(n)))?;
                let output = props.get_parsed(&join_key(&band_prefix, &keys::entry_out(n)))?;
                match (input, output) {
                    (Some(i), Some(o)) => table.push((i, o)),
                    _ => break,
                }
            }
            if table.is_empty() {
                break;
            }
            tables.push(sorted(table));
        }
        if !tables.is_empty() {
            self.tables = tables;
        }
        Ok(())
    }
}

/// Sorts a table by input value; entries with a NaN input are dropped
/// since no sample can match them.
fn sorted(mut table: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    let before = table.len();
    table.retain(|(input, _)| !input.is_nan());
    if table.len() < before {
        warn!("dropped {} lut entries with NaN inputs", before - table.len());
    }
    table.sort_by(|a, b| a.0.total_cmp(&b.0));
    table
}

/// Looks `value` up in a sorted table under `mode`.
fn lookup(table: &[(f64, f64)], value: f64, mode: LutMode) -> Option<f64> {
    match mode {
        LutMode::Literal => table
            .iter()
            .find(|(input, _)| *input == value)
            .map(|(_, output)| *output),
        LutMode::Interpolated => {
            let (first, last) = match (table.first(), table.last()) {
                (Some(first), Some(last)) => (first, last),
                _ => return None,
            };
            if value.is_nan() || value < first.0 || value > last.0 {
                return None;
            }
            let upper = table.partition_point(|(input, _)| *input < value);
            let (hi_in, hi_out) = table[upper.min(table.len() - 1)];
            if hi_in == value || upper == 0 {
                return Some(hi_out);
            }
            let (lo_in, lo_out) = table[upper - 1];
            if lo_in == value {
                return Some(lo_out);
            }
            let t = (value - lo_in) / (hi_in - lo_in);
            Some(lo_out + t * (hi_out - lo_out))
        }
    }
}
