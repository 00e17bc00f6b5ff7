//! Scalar pixel kinds and the numeric sample contract.
//!
//! Every raster in the pipeline declares one [`ScalarKind`] for all of its
//! bands. Twelve kinds are named, backed by exactly ten concrete storage
//! types: the normalized float kinds share storage with `F32`/`F64` and
//! differ only in their declared value range.
//!
//! Filters use `f64` as the lingua franca for single-sample access and
//! radiometric defaults; the [`Sample`] trait converts between a concrete
//! storage type and that common currency. Whole-band operations avoid the
//! round-trip by dispatching on the buffer's concrete type instead (see
//! [`crate::tile::buffer`]).

pub mod kind;
pub mod sample;

pub use kind::{KindParseError, ScalarKind};
pub use sample::Sample;
