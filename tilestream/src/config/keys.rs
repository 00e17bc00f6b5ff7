//! Property keys shared by the configurable pipeline nodes.
//!
//! Keys are relative: nodes join them onto the caller's prefix with
//! [`super::join_key`]. Numbered table entries use the `entry{N}` and
//! `band{B}` helpers so savers and loaders agree on the exact spelling.

/// Area of interest as `"x0 y0 x1 y1"`.
pub const AREA_OF_INTEREST: &str = "area_of_interest";

/// Tile width in pixels.
pub const TILE_WIDTH: &str = "tile_width";

/// Tile height in pixels.
pub const TILE_HEIGHT: &str = "tile_height";

/// Histogram computation mode (`"normal"` or `"fast"`).
pub const MODE: &str = "mode";

/// Cap on resolution levels a histogram pass may visit.
pub const MAX_LEVELS: &str = "max_levels";

/// Bin-count override applied to every band.
pub const BINS: &str = "bins";

/// Range minimum override applied to every band.
pub const MIN_VALUE: &str = "min_value";

/// Range maximum override applied to every band.
pub const MAX_VALUE: &str = "max_value";

/// Mosaic merge policy (`"null_mask"` or `"valid_range"`).
pub const MERGE_POLICY: &str = "merge_policy";

/// Lower bound of the valid-range merge policy.
pub const VALID_MIN: &str = "valid_min";

/// Upper bound of the valid-range merge policy.
pub const VALID_MAX: &str = "valid_max";

/// Remap-table interpolation mode.
pub const LUT_MODE: &str = "lut_mode";

/// Declared output scalar kind of a remap filter.
pub const OUTPUT_KIND: &str = "output_kind";

/// Key for the input value of table entry `n`: `entry{n}.in`.
pub fn entry_in(n: usize) -> String {
    format!("entry{}.in", n)
}

/// Key for the output value of table entry `n`: `entry{n}.out`.
pub fn entry_out(n: usize) -> String {
    format!("entry{}.out", n)
}

/// Key for the index of color table entry `n`: `entry{n}.index`.
pub fn entry_index(n: usize) -> String {
    format!("entry{}.index", n)
}

/// Key for the color of table entry `n` as `"r g b"`: `entry{n}.color`.
pub fn entry_color(n: usize) -> String {
    format!("entry{}.color", n)
}

/// Prefix scoping a per-band table: `band{b}`.
pub fn band_prefix(b: u32) -> String {
    format!("band{}", b)
}
