//! Pseudo-coloring of an index band into 8-bit RGB.

use regex::Regex;

use crate::config::{join_key, keys, Configurable, PropertyList};
use crate::error::{PipelineError, PipelineResult};
use crate::geom::IRect;
use crate::pixel::ScalarKind;
use crate::source::ImageSource;
use crate::tile::pool::TilePool;
use crate::tile::{RasterTile, TileStatus};

/// How an index value picks a color from the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RgbLutMode {
    /// Colors spread evenly across the upstream's declared value range;
    /// the index is clamped into that range before the lookup
    #[default]
    Regular,
    /// Exact index match only; anything else maps to the null color
    Literal,
    /// Piecewise-linear between explicit index breakpoints; indices
    /// outside the breakpoints map to the null color, never clamped
    Vertices,
}

impl RgbLutMode {
    fn tag(&self) -> &'static str {
        match self {
            RgbLutMode::Regular => "regular",
            RgbLutMode::Literal => "literal",
            RgbLutMode::Vertices => "vertices",
        }
    }
}

/// One color table entry.
///
/// The index matters in literal and vertices modes; in regular mode only
/// the entry order does.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RgbEntry {
    /// Input value (literal) or breakpoint (vertices) this entry answers
    pub index: f64,
    /// The color produced
    pub rgb: [u8; 3],
}

/// Colors band 0 of the upstream through a table into three-band U8.
///
/// The output is always three 8-bit bands with null `(0, 0, 0)`; input
/// null samples and table misses produce the null color.
pub struct IndexToRgbLutFilter<S: ImageSource> {
    source: S,
    entries: Vec<RgbEntry>,
    mode: RgbLutMode,
    pool: TilePool,
}

impl<S: ImageSource> IndexToRgbLutFilter<S> {
    /// Creates a regular-mode filter with an empty table over `source`.
    pub fn new(source: S) -> Self {
        Self {
            source,
            entries: Vec::new(),
            mode: RgbLutMode::Regular,
            pool: TilePool::new(),
        }
    }

    /// Sets the lookup mode, builder style.
    pub fn with_mode(mut self, mode: RgbLutMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the table from explicit entries, builder style.
    pub fn with_entries(mut self, entries: Vec<RgbEntry>) -> Self {
        self.set_entries(entries);
        self
    }

    /// Sets an ordered color ramp, indices assigned by position; the
    /// usual way to feed regular mode.
    pub fn with_colors(mut self, colors: &[[u8; 3]]) -> Self {
        self.set_colors(colors);
        self
    }

    /// Replaces the lookup mode.
    pub fn set_mode(&mut self, mode: RgbLutMode) {
        self.mode = mode;
    }

    /// The current lookup mode.
    pub fn mode(&self) -> RgbLutMode {
        self.mode
    }

    /// Replaces the table, kept sorted by index.
    pub fn set_entries(&mut self, mut entries: Vec<RgbEntry>) {
        entries.sort_by(|a, b| a.index.total_cmp(&b.index));
        self.entries = entries;
    }

    /// Replaces the table with an ordered ramp, indices by position.
    pub fn set_colors(&mut self, colors: &[[u8; 3]]) {
        self.entries = colors
            .iter()
            .enumerate()
            .map(|(i, &rgb)| RgbEntry {
                index: i as f64,
                rgb,
            })
            .collect();
    }

    /// The table, sorted by index.
    pub fn entries(&self) -> &[RgbEntry] {
        &self.entries
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

    /// The color for index `value`, or `None` for the null color.
    fn color_for(&self, value: f64, src_min: f64, src_max: f64) -> Option<[f64; 3]> {
        if value.is_nan() {
            return None;
        }
        match self.mode {
            RgbLutMode::Regular => {
                let n = self.entries.len();
                if n == 0 {
                    return None;
                }
                let (lo, hi) = if src_min <= src_max {
                    (src_min, src_max)
                } else {
                    (src_max, src_min)
                };
                let clamped = value.clamp(lo, hi);
                let t = if hi > lo { (clamped - lo) / (hi - lo) } else { 0.0 };
                let pos = t * (n - 1) as f64;
                let first = pos.floor() as usize;
                let second = (first + 1).min(n - 1);
                let frac = pos - first as f64;
                Some(blend(
                    self.entries[first].rgb,
                    self.entries[second].rgb,
                    frac,
                ))
            }
            RgbLutMode::Literal => self
                .entries
                .iter()
                .find(|e| e.index == value)
                .map(|e| to_triple(e.rgb)),
            RgbLutMode::Vertices => {
                let (first, last) = match (self.entries.first(), self.entries.last()) {
                    (Some(first), Some(last)) => (first, last),
                    _ => return None,
                };
                if value < first.index || value > last.index {
                    return None;
                }
                let upper = self.entries.partition_point(|e| e.index < value);
                let hi = &self.entries[upper.min(self.entries.len() - 1)];
                if hi.index == value || upper == 0 {
                    return Some(to_triple(hi.rgb));
                }
                let lo = &self.entries[upper - 1];
                let t = (value - lo.index) / (hi.index - lo.index);
                Some(blend(lo.rgb, hi.rgb, t))
            }
        }
    }
}

fn to_triple(rgb: [u8; 3]) -> [f64; 3] {
    [rgb[0] as f64, rgb[1] as f64, rgb[2] as f64]
}

fn blend(a: [u8; 3], b: [u8; 3], t: f64) -> [f64; 3] {
    let mut out = [0.0; 3];
    for (slot, (&x, &y)) in out.iter_mut().zip(a.iter().zip(&b)) {
        *slot = x as f64 + t * (y as f64 - x as f64);
    }
    out
}

impl<S: ImageSource> ImageSource for IndexToRgbLutFilter<S> {
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

        let mut indices: Vec<f64> = Vec::new();
        if !input.band_to_f64(0, &mut indices) {
            return Some(out);
        }
        let in_null = input.null_value(0);
        let src_min = self.source.min_value(0);
        let src_max = self.source.max_value(0);

        let mut red = vec![0.0f64; indices.len()];
        let mut green = vec![0.0f64; indices.len()];
        let mut blue = vec![0.0f64; indices.len()];
        for (i, &value) in indices.iter().enumerate() {
            if value == in_null {
                continue;
            }
            if let Some([r, g, b]) = self.color_for(value, src_min, src_max) {
                red[i] = r;
                green[i] = g;
                blue[i] = b;
            }
        }
        out.write_band_f64(0, &red);
        out.write_band_f64(1, &green);
        out.write_band_f64(2, &blue);
        out.validate();
        Some(out)
    }

    fn bounding_rect(&self, rlevel: u32) -> Option<IRect> {
        self.source.bounding_rect(rlevel)
    }

    fn band_count(&self) -> u32 {
        3
    }

    fn scalar_kind(&self) -> ScalarKind {
        ScalarKind::U8
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

impl<S: ImageSource> Configurable for IndexToRgbLutFilter<S> {
    fn save_state(&self, props: &mut PropertyList, prefix: &str) {
        props.set(join_key(prefix, keys::LUT_MODE), self.mode.tag());
        for (n, entry) in self.entries.iter().enumerate() {
            props.set(join_key(prefix, &keys::entry_index(n)), entry.index);
            props.set(
                join_key(prefix, &keys::entry_color(n)),
                format!("{} {} {}", entry.rgb[0], entry.rgb[1], entry.rgb[2]),
            );
        }
    }

    fn load_state(&mut self, props: &PropertyList, prefix: &str) -> PipelineResult<()> {
        if let Some(tag) = props.get(&join_key(prefix, keys::LUT_MODE)) {
            self.mode = match tag {
                "regular" => RgbLutMode::Regular,
                "literal" => RgbLutMode::Literal,
                "vertices" => RgbLutMode::Vertices,
                other => {
                    return Err(PipelineError::Config(format!(
                        "unknown rgb lut mode '{}'",
                        other
                    )))
                }
            };
        }

        // Entry numbers may be sparse or unordered in a hand-written
        // file; scan by key shape instead of probing dense indices.
        let color_re = match Regex::new(r"^entry(\d+)\.color$") {
            Ok(re) => re,
            Err(e) => return Err(PipelineError::Config(e.to_string())),
        };
        let entry_prefix = join_key(prefix, "entry");
        let mut found: Vec<(usize, RgbEntry)> = Vec::new();
        for key in props.keys_with_prefix(&entry_prefix) {
            let relative = if prefix.is_empty() {
                key
            } else {
                &key[prefix.len() + 1..]
            };
            let caps = match color_re.captures(relative) {
                Some(caps) => caps,
                None => continue,
            };
            let n: usize = match caps[1].parse() {
                Ok(n) => n,
                Err(_) => {
                    return Err(PipelineError::Parse {
                        key: key.to_string(),
                        message: "entry number out of range".to_string(),
                    })
                }
            };
            let rgb = parse_color(key, props.get(key).unwrap_or(""))?;
            let index = props
                .get_parsed(&join_key(prefix, &keys::entry_index(n)))?
                .unwrap_or(n as f64);
            found.push((n, RgbEntry { index, rgb }));
        }
        if !found.is_empty() {
            found.sort_by_key(|(n, _)| *n);
            self.set_entries(found.into_iter().map(|(_, entry)| entry).collect());
        }
        Ok(())
    }
}

/// Parses `"r g b"` into a color, naming `key` on failure.
fn parse_color(key: &str, raw: &str) -> PipelineResult<[u8; 3]> {
    let fields: Vec<&str> = raw.split_whitespace().collect();
    if fields.len() != 3 {
        return Err(PipelineError::Parse {
            key: key.to_string(),
            message: format!("expected 'r g b', got '{}'", raw),
        });
    }
    let mut rgb = [0u8; 3];
    for (slot, field) in rgb.iter_mut().zip(&fields) {
        *slot = match field.parse() {
            Ok(v) => v,
            Err(e) => {
                return Err(PipelineError::Parse {
                    key: key.to_string(),
                    message: format!("bad channel '{}': {}", field, e),
                })
            }
        };
    }
    Ok(rgb)
}
