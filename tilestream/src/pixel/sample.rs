//! The numeric contract implemented by every buffer storage type.

/// A concrete sample type that converts to and from the `f64` currency.
///
/// Single-sample filter paths move values through `f64`; this trait is the
/// boundary where they re-enter storage. Conversion into an integer type
/// rounds to nearest and saturates at the type limits, so a caller that
/// wants range clamping beyond saturation must apply it before writing.
pub trait Sample: Copy + PartialEq + PartialOrd + Send + Sync + 'static {
    /// Converts from the `f64` currency into storage.
    fn from_f64(v: f64) -> Self;

    /// Widens a stored sample into the `f64` currency.
    ///
    /// `u64`/`i64` samples beyond 2^53 lose precision here; all other
    /// storage types convert exactly.
    fn to_f64(self) -> f64;
}

macro_rules! impl_int_sample {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Sample for $ty {
                #[inline]
                fn from_f64(v: f64) -> Self {
                    // `as` saturates at the type limits and maps NaN to 0.
                    v.round() as $ty
                }

                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

impl_int_sample!(u8, i8, u16, i16, u32, i32, u64, i64);

impl Sample for f32 {
    #[inline]
    fn from_f64(v: f64) -> Self {
        v as f32
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl Sample for f64 {
    #[inline]
    fn from_f64(v: f64) -> Self {
        v
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_rounding() {
        assert_eq!(u8::from_f64(10.4), 10);
        assert_eq!(u8::from_f64(10.5), 11);
        assert_eq!(i16::from_f64(-3.5), -4);
    }

    #[test]
    fn test_integer_saturation() {
        assert_eq!(u8::from_f64(300.0), 255);
        assert_eq!(u8::from_f64(-5.0), 0);
        assert_eq!(i8::from_f64(1e9), 127);
        assert_eq!(u16::from_f64(f64::NAN), 0);
    }

    #[test]
    fn test_float_pass_through() {
        assert_eq!(f64::from_f64(1.25), 1.25);
        assert_eq!(f32::from_f64(1.25), 1.25f32);
        assert_eq!(0.5f32.to_f64(), 0.5);
    }

    #[test]
    fn test_round_trip_exact_for_small_ints() {
        for v in [0u32, 1, 255, 70_000, u32::MAX] {
            assert_eq!(u32::from_f64(v.to_f64()), v);
        }
    }
}
