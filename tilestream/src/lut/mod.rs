//! Table-driven sample remapping filters.
//!
//! Two filters share the shape "pull a tile, map every non-null sample
//! through an explicit table, write at the output kind, validate once":
//!
//! - [`BandLutFilter`] maps numeric values to numeric values, per band,
//!   with exact-match or linear-interpolated lookup. The output scalar
//!   kind may differ from the input's; mapped values are clamped into
//!   the output's declared range on write.
//! - [`IndexToRgbLutFilter`] pseudo-colors a single index band into a
//!   three-band 8-bit RGB product. Its modes differ in how an index
//!   picks a color: evenly spread across the declared input range
//!   (clamping the index first), exact entries only, or piecewise-linear
//!   between explicit breakpoints (never clamping).
//!
//! Both filters persist their tables through [`crate::config`], so a
//! remap chain can be described entirely in an INI file.

pub mod band;
pub mod rgb;

pub use band::{BandLutFilter, LutMode};
pub use rgb::{IndexToRgbLutFilter, RgbEntry, RgbLutMode};
