//! Value restrictions applied after decoding.
//!
//! A restriction wraps a decodable type and rejects decoded values outside
//! its accepted set; rejection surfaces as a validation error naming the
//! column and the raw field. Custom restrictions implement [`Validate`] and
//! wrap themselves in [`Valid`].

use crate::decode::{Decode, DecodeError};

/// A validity check a decoded value must pass.
///
/// `Err` carries the message reported in the validation error.
pub trait Validate {
    fn is_valid(&self) -> Result<(), &'static str>;
}

/// Adapter decoding a `T` and then applying its [`Validate`] impl.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Valid<T>(pub T);

impl<T> Valid<T> {
    #[inline]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<'r, T: Decode<'r> + Validate> Decode<'r> for Valid<T> {
    fn decode(field: &'r [u8]) -> Result<Self, DecodeError> {
        let value = T::decode(field)?;
        value.is_valid().map_err(DecodeError::Validation)?;
        Ok(Valid(value))
    }
}

/// Rejects empty fields.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NonEmpty<T>(pub T);

impl<T> NonEmpty<T> {
    #[inline]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<'r, T> Decode<'r> for NonEmpty<T>
where
    T: Decode<'r> + AsRef<[u8]>,
{
    fn decode(field: &'r [u8]) -> Result<Self, DecodeError> {
        let value = T::decode(field)?;
        if value.as_ref().is_empty() {
            return Err(DecodeError::Validation("empty field"));
        }
        Ok(NonEmpty(value))
    }
}

/// Accepts integers inside the closed range `MIN..=MAX`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InRange<T, const MIN: i128, const MAX: i128>(pub T);

impl<T, const MIN: i128, const MAX: i128> InRange<T, MIN, MAX> {
    #[inline]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<'r, T, const MIN: i128, const MAX: i128> Decode<'r> for InRange<T, MIN, MAX>
where
    T: Decode<'r> + Into<i128> + Copy,
{
    fn decode(field: &'r [u8]) -> Result<Self, DecodeError> {
        let value = T::decode(field)?;
        let n: i128 = value.into();
        if n >= MIN && n <= MAX {
            Ok(InRange(value))
        } else {
            Err(DecodeError::Validation("validation error"))
        }
    }
}

/// Accepts integers outside the closed range `MIN..=MAX`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OutOfRange<T, const MIN: i128, const MAX: i128>(pub T);

impl<T, const MIN: i128, const MAX: i128> OutOfRange<T, MIN, MAX> {
    #[inline]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<'r, T, const MIN: i128, const MAX: i128> Decode<'r> for OutOfRange<T, MIN, MAX>
where
    T: Decode<'r> + Into<i128> + Copy,
{
    fn decode(field: &'r [u8]) -> Result<Self, DecodeError> {
        let value = T::decode(field)?;
        let n: i128 = value.into();
        if n < MIN || n > MAX {
            Ok(OutOfRange(value))
        } else {
            Err(DecodeError::Validation("validation error"))
        }
    }
}

macro_rules! cmp_restriction(($name:ident, $op:tt, $doc:literal) => {
    /// Accepts integers
    #[doc = concat!($doc, " `N`.")]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct $name<T, const N: i128>(pub T);

    impl<T, const N: i128> $name<T, N> {
        #[inline]
        pub fn into_inner(self) -> T {
            self.0
        }
    }

    impl<'r, T, const N: i128> Decode<'r> for $name<T, N>
    where
        T: Decode<'r> + Into<i128> + Copy,
    {
        fn decode(field: &'r [u8]) -> Result<Self, DecodeError> {
            let value = T::decode(field)?;
            if value.into() $op N {
                Ok($name(value))
            } else {
                Err(DecodeError::Validation("validation error"))
            }
        }
    }
});

cmp_restriction!(GreaterThan, >, "strictly greater than");
cmp_restriction!(GreaterOrEqual, >=, "greater than or equal to");
cmp_restriction!(LessThan, <, "strictly less than");
cmp_restriction!(LessOrEqual, <=, "less than or equal to");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty() {
        assert_eq!(
            NonEmpty::<String>::decode(b"x"),
            Ok(NonEmpty("x".to_owned())),
        );
        assert_eq!(
            NonEmpty::<String>::decode(b""),
            Err(DecodeError::Validation("empty field")),
        );
    }

    #[test]
    fn in_range() {
        assert_eq!(InRange::<i32, 0, 10>::decode(b"10"), Ok(InRange(10)));
        assert_eq!(
            InRange::<i32, 0, 10>::decode(b"11"),
            Err(DecodeError::Validation("validation error")),
        );
        // Decode failures are not validation failures.
        assert_eq!(
            InRange::<i32, 0, 10>::decode(b"x"),
            Err(DecodeError::Conversion),
        );
    }

    #[test]
    fn out_of_range() {
        assert_eq!(OutOfRange::<i64, 0, 10>::decode(b"-4"), Ok(OutOfRange(-4)));
        assert_eq!(
            OutOfRange::<i64, 0, 10>::decode(b"5"),
            Err(DecodeError::Validation("validation error")),
        );
    }

    #[test]
    fn comparisons() {
        assert_eq!(GreaterThan::<u8, 4>::decode(b"5"), Ok(GreaterThan(5)));
        assert!(GreaterThan::<u8, 4>::decode(b"4").is_err());
        assert_eq!(GreaterOrEqual::<u8, 4>::decode(b"4"), Ok(GreaterOrEqual(4)));
        assert_eq!(LessThan::<i16, 0>::decode(b"-1"), Ok(LessThan(-1)));
        assert!(LessOrEqual::<i16, 0>::decode(b"1").is_err());
    }

    #[test]
    fn custom_validate() {
        #[derive(Debug, PartialEq)]
        struct Even(i32);

        impl Validate for Even {
            fn is_valid(&self) -> Result<(), &'static str> {
                if self.0 % 2 == 0 {
                    Ok(())
                } else {
                    Err("odd value")
                }
            }
        }

        impl Decode<'_> for Even {
            fn decode(field: &[u8]) -> Result<Self, DecodeError> {
                i32::decode(field).map(Even)
            }
        }

        assert_eq!(Valid::<Even>::decode(b"4"), Ok(Valid(Even(4))));
        assert_eq!(
            Valid::<Even>::decode(b"5"),
            Err(DecodeError::Validation("odd value")),
        );
    }
}
