//! Scalar kind enumeration and per-kind radiometric defaults.

use std::fmt;
use std::str::FromStr;

/// The sample type shared by every band of a raster.
///
/// Integer kinds carry their natural type range; the float kinds reserve
/// the negative extreme as the default null so that real data never
/// collides with it. The normalized kinds store `f32`/`f64` samples but
/// declare a `[0, 1]` value range, which matters to histogram binning and
/// remap tables rather than to storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// Unsigned 8-bit
    U8,
    /// Signed 8-bit
    S8,
    /// Unsigned 16-bit
    U16,
    /// Signed 16-bit
    S16,
    /// Unsigned 32-bit
    U32,
    /// Signed 32-bit
    S32,
    /// Unsigned 64-bit
    U64,
    /// Signed 64-bit
    S64,
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
    /// 32-bit float declared to span [0, 1]
    NormF32,
    /// 64-bit float declared to span [0, 1]
    NormF64,
}

impl ScalarKind {
    /// Every kind, in declaration order.
    pub const ALL: [ScalarKind; 12] = [
        ScalarKind::U8,
        ScalarKind::S8,
        ScalarKind::U16,
        ScalarKind::S16,
        ScalarKind::U32,
        ScalarKind::S32,
        ScalarKind::U64,
        ScalarKind::S64,
        ScalarKind::F32,
        ScalarKind::F64,
        ScalarKind::NormF32,
        ScalarKind::NormF64,
    ];

    /// The sentinel that marks an invalid sample unless a source overrides
    /// it per band.
    ///
    /// Integer kinds use the type minimum (zero for unsigned), floats the
    /// negative type maximum, normalized kinds `0.0`.
    pub fn default_null(self) -> f64 {
        match self {
            ScalarKind::U8 | ScalarKind::U16 | ScalarKind::U32 | ScalarKind::U64 => 0.0,
            ScalarKind::S8 => i8::MIN as f64,
            ScalarKind::S16 => i16::MIN as f64,
            ScalarKind::S32 => i32::MIN as f64,
            ScalarKind::S64 => i64::MIN as f64,
            ScalarKind::F32 => -(f32::MAX as f64),
            ScalarKind::F64 => -f64::MAX,
            ScalarKind::NormF32 | ScalarKind::NormF64 => 0.0,
        }
    }

    /// The smallest sample value considered valid by default.
    pub fn default_min(self) -> f64 {
        match self {
            ScalarKind::U8 | ScalarKind::U16 | ScalarKind::U32 | ScalarKind::U64 => 1.0,
            ScalarKind::S8 => (i8::MIN + 1) as f64,
            ScalarKind::S16 => (i16::MIN + 1) as f64,
            ScalarKind::S32 => (i32::MIN + 1) as f64,
            ScalarKind::S64 => (i64::MIN + 1) as f64,
            ScalarKind::F32 => -1.0e38,
            ScalarKind::F64 => -1.0e308,
            ScalarKind::NormF32 => f32::EPSILON as f64,
            ScalarKind::NormF64 => f64::EPSILON,
        }
    }

    /// The largest sample value considered valid by default.
    pub fn default_max(self) -> f64 {
        match self {
            ScalarKind::U8 => u8::MAX as f64,
            ScalarKind::S8 => i8::MAX as f64,
            ScalarKind::U16 => u16::MAX as f64,
            ScalarKind::S16 => i16::MAX as f64,
            ScalarKind::U32 => u32::MAX as f64,
            ScalarKind::S32 => i32::MAX as f64,
            ScalarKind::U64 => u64::MAX as f64,
            ScalarKind::S64 => i64::MAX as f64,
            ScalarKind::F32 => 1.0e38,
            ScalarKind::F64 => 1.0e308,
            ScalarKind::NormF32 | ScalarKind::NormF64 => 1.0,
        }
    }

    /// Storage bytes per sample.
    pub fn bytes_per_sample(self) -> usize {
        match self {
            ScalarKind::U8 | ScalarKind::S8 => 1,
            ScalarKind::U16 | ScalarKind::S16 => 2,
            ScalarKind::U32 | ScalarKind::S32 | ScalarKind::F32 | ScalarKind::NormF32 => 4,
            ScalarKind::U64
            | ScalarKind::S64
            | ScalarKind::F64
            | ScalarKind::NormF64 => 8,
        }
    }

    /// Whether samples are stored as floating point.
    pub fn is_float(self) -> bool {
        matches!(
            self,
            ScalarKind::F32 | ScalarKind::F64 | ScalarKind::NormF32 | ScalarKind::NormF64
        )
    }

    /// Whether the declared value range is the normalized [0, 1] span.
    pub fn is_normalized(self) -> bool {
        matches!(self, ScalarKind::NormF32 | ScalarKind::NormF64)
    }

    /// The kind describing how samples are stored, collapsing the
    /// normalized kinds onto their float storage.
    pub fn storage(self) -> ScalarKind {
        match self {
            ScalarKind::NormF32 => ScalarKind::F32,
            ScalarKind::NormF64 => ScalarKind::F64,
            other => other,
        }
    }

    /// The stable text name used in property lists and log output.
    pub fn name(self) -> &'static str {
        match self {
            ScalarKind::U8 => "u8",
            ScalarKind::S8 => "s8",
            ScalarKind::U16 => "u16",
            ScalarKind::S16 => "s16",
            ScalarKind::U32 => "u32",
            ScalarKind::S32 => "s32",
            ScalarKind::U64 => "u64",
            ScalarKind::S64 => "s64",
            ScalarKind::F32 => "f32",
            ScalarKind::F64 => "f64",
            ScalarKind::NormF32 => "norm_f32",
            ScalarKind::NormF64 => "norm_f64",
        }
    }
}

impl Default for ScalarKind {
    fn default() -> Self {
        ScalarKind::U8
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for text that does not name a scalar kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindParseError(pub String);

impl fmt::Display for KindParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a scalar kind name", self.0)
    }
}

impl std::error::Error for KindParseError {}

impl FromStr for ScalarKind {
    type Err = KindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScalarKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| KindParseError(s.to_string()))
    }
}
