//! Band-sequential sample storage and closed-set kind dispatch.
//!
//! A [`PixelBuffer`] owns every sample of a tile in one contiguous vector
//! per storage type, band after band. The set of storage types is closed
//! at ten, so whole-band operations are written once as generic code over
//! [`Sample`](crate::pixel::Sample) and dispatched with the [`per_kind`]
//! and [`per_kind_pair`] macros instead of hand-expanded per-type copies.

use crate::pixel::{Sample, ScalarKind};

/// Owned band-sequential sample storage for one tile.
///
/// Band `b` occupies samples `[b * per_band, (b + 1) * per_band)`; within a
/// band, rows run top to bottom and samples left to right. The variant
/// carries the storage type; a tile's declared [`ScalarKind`] maps onto it
/// through [`ScalarKind::storage`].
#[derive(Debug, Clone, PartialEq)]
pub enum PixelBuffer {
    U8(Vec<u8>),
    S8(Vec<i8>),
    U16(Vec<u16>),
    S16(Vec<i16>),
    U32(Vec<u32>),
    S32(Vec<i32>),
    U64(Vec<u64>),
    S64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

/// Runs `$body` with `$slice` bound to the buffer's concrete vector.
///
/// The body is monomorphized once per storage type, so it may use any
/// [`Sample`](crate::pixel::Sample) operation on the element type.
macro_rules! per_kind {
    ($buffer:expr, |$slice:ident| $body:expr) => {
        match $buffer {
            $crate::tile::buffer::PixelBuffer::U8($slice) => $body,
            $crate::tile::buffer::PixelBuffer::S8($slice) => $body,
            $crate::tile::buffer::PixelBuffer::U16($slice) => $body,
            $crate::tile::buffer::PixelBuffer::S16($slice) => $body,
            $crate::tile::buffer::PixelBuffer::U32($slice) => $body,
            $crate::tile::buffer::PixelBuffer::S32($slice) => $body,
            $crate::tile::buffer::PixelBuffer::U64($slice) => $body,
            $crate::tile::buffer::PixelBuffer::S64($slice) => $body,
            $crate::tile::buffer::PixelBuffer::F32($slice) => $body,
            $crate::tile::buffer::PixelBuffer::F64($slice) => $body,
        }
    };
}

/// Runs `$body` with both buffers bound when their storage types match,
/// `$mismatch` otherwise.
macro_rules! per_kind_pair {
    ($a:expr, $b:expr, |$x:ident, $y:ident| $body:expr, $mismatch:expr) => {
        match ($a, $b) {
            (
                $crate::tile::buffer::PixelBuffer::U8($x),
                $crate::tile::buffer::PixelBuffer::U8($y),
            ) => $body,
            (
                $crate::tile::buffer::PixelBuffer::S8($x),
                $crate::tile::buffer::PixelBuffer::S8($y),
            ) => $body,
            (
                $crate::tile::buffer::PixelBuffer::U16($x),
                $crate::tile::buffer::PixelBuffer::U16($y),
            ) => $body,
            (
                $crate::tile::buffer::PixelBuffer::S16($x),
                $crate::tile::buffer::PixelBuffer::S16($y),
            ) => $body,
            (
                $crate::tile::buffer::PixelBuffer::U32($x),
                $crate::tile::buffer::PixelBuffer::U32($y),
            ) => $body,
            (
                $crate::tile::buffer::PixelBuffer::S32($x),
                $crate::tile::buffer::PixelBuffer::S32($y),
            ) => $body,
            (
                $crate::tile::buffer::PixelBuffer::U64($x),
                $crate::tile::buffer::PixelBuffer::U64($y),
            ) => $body,
            (
                $crate::tile::buffer::PixelBuffer::S64($x),
                $crate::tile::buffer::PixelBuffer::S64($y),
            ) => $body,
            (
                $crate::tile::buffer::PixelBuffer::F32($x),
                $crate::tile::buffer::PixelBuffer::F32($y),
            ) => $body,
            (
                $crate::tile::buffer::PixelBuffer::F64($x),
                $crate::tile::buffer::PixelBuffer::F64($y),
            ) => $body,
            _ => $mismatch,
        }
    };
}

pub(crate) use per_kind;
pub(crate) use per_kind_pair;

impl PixelBuffer {
    /// Allocates storage for `len` samples of `kind`, every sample set to
    /// `fill` converted into storage.
    pub fn for_kind(kind: ScalarKind, len: usize, fill: f64) -> PixelBuffer {
        match kind {
            ScalarKind::U8 => PixelBuffer::U8(vec![u8::from_f64(fill); len]),
            ScalarKind::S8 => PixelBuffer::S8(vec![i8::from_f64(fill); len]),
            ScalarKind::U16 => PixelBuffer::U16(vec![u16::from_f64(fill); len]),
            ScalarKind::S16 => PixelBuffer::S16(vec![i16::from_f64(fill); len]),
            ScalarKind::U32 => PixelBuffer::U32(vec![u32::from_f64(fill); len]),
            ScalarKind::S32 => PixelBuffer::S32(vec![i32::from_f64(fill); len]),
            ScalarKind::U64 => PixelBuffer::U64(vec![u64::from_f64(fill); len]),
            ScalarKind::S64 => PixelBuffer::S64(vec![i64::from_f64(fill); len]),
            ScalarKind::F32 | ScalarKind::NormF32 => {
                PixelBuffer::F32(vec![f32::from_f64(fill); len])
            }
            ScalarKind::F64 | ScalarKind::NormF64 => {
                PixelBuffer::F64(vec![f64::from_f64(fill); len])
            }
        }
    }

    /// Number of samples across all bands.
    pub fn len(&self) -> usize {
        per_kind!(self, |samples| samples.len())
    }

    /// True when the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The storage kind of the variant, one of the ten concrete types.
    pub fn storage_kind(&self) -> ScalarKind {
        match self {
            PixelBuffer::U8(_) => ScalarKind::U8,
            PixelBuffer::S8(_) => ScalarKind::S8,
            PixelBuffer::U16(_) => ScalarKind::U16,
            PixelBuffer::S16(_) => ScalarKind::S16,
            PixelBuffer::U32(_) => ScalarKind::U32,
            PixelBuffer::S32(_) => ScalarKind::S32,
            PixelBuffer::U64(_) => ScalarKind::U64,
            PixelBuffer::S64(_) => ScalarKind::S64,
            PixelBuffer::F32(_) => ScalarKind::F32,
            PixelBuffer::F64(_) => ScalarKind::F64,
        }
    }

    /// True when this buffer can store samples of the declared `kind`.
    pub fn matches(&self, kind: ScalarKind) -> bool {
        self.storage_kind() == kind.storage()
    }

    /// Overwrites every sample with `value` converted into storage.
    pub fn fill_with(&mut self, value: f64) {
        per_kind!(self, |samples| {
            let v = Sample::from_f64(value);
            samples.fill(v);
        });
    }

    /// Grows or shrinks the buffer to `len` samples, filling any new
    /// samples with `fill` converted into storage.
    pub fn resize_filled(&mut self, len: usize, fill: f64) {
        per_kind!(self, |samples| {
            let v = Sample::from_f64(fill);
            samples.resize(len, v);
        });
    }
}
