// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of ssv-rust, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

//! Decoding of a single field into a typed value.
//!
//! A field is the unescaped byte range of one column, with the outermost
//! quotes already stripped. [`Decode`] is implemented for the primitive
//! scalars, owning and borrowing string types, [`Option`] (absent on inner
//! failure), [`Result`] (ordered alternatives), and [`Ignored`]. Custom field
//! types opt in by implementing [`Decode`] themselves.

use bstr::{BStr, BString};
use thiserror::Error;

/// An error from decoding one field.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Hash)]
pub enum DecodeError {
    /// The field bytes do not parse as the requested type.
    #[error("invalid conversion")]
    Conversion,
    /// The field parsed, but a validator rejected the value.
    #[error("{0}")]
    Validation(&'static str),
}

/// A type that can be decoded from one field of a row.
///
/// The lifetime `'r` is the lifetime of the row buffer; borrowing
/// implementations such as `&'r str` are invalidated when the next row is
/// read.
pub trait Decode<'r>: Sized {
    fn decode(field: &'r [u8]) -> Result<Self, DecodeError>;
}

/// Placeholder for a column that is counted but not decoded.
///
/// Use it in a row tuple to skip over a column: the column still contributes
/// to the expected column count, but carries no data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Ignored;

impl Decode<'_> for Ignored {
    #[inline(always)]
    fn decode(_field: &[u8]) -> Result<Self, DecodeError> {
        Ok(Ignored)
    }
}

impl<'r> Decode<'r> for &'r [u8] {
    #[inline(always)]
    fn decode(field: &'r [u8]) -> Result<Self, DecodeError> {
        Ok(field)
    }
}

impl Decode<'_> for Vec<u8> {
    #[inline]
    fn decode(field: &[u8]) -> Result<Self, DecodeError> {
        Ok(field.to_vec())
    }
}

impl<'r> Decode<'r> for &'r BStr {
    #[inline(always)]
    fn decode(field: &'r [u8]) -> Result<Self, DecodeError> {
        Ok(BStr::new(field))
    }
}

impl Decode<'_> for BString {
    #[inline]
    fn decode(field: &[u8]) -> Result<Self, DecodeError> {
        Ok(BString::from(field))
    }
}

impl<'r> Decode<'r> for &'r str {
    #[inline]
    fn decode(field: &'r [u8]) -> Result<Self, DecodeError> {
        std::str::from_utf8(field).map_err(|_| DecodeError::Conversion)
    }
}

impl Decode<'_> for String {
    #[inline]
    fn decode(field: &[u8]) -> Result<Self, DecodeError> {
        <&str>::decode(field).map(str::to_owned)
    }
}

impl Decode<'_> for bool {
    fn decode(field: &[u8]) -> Result<Self, DecodeError> {
        match field {
            b"1" | b"true" => Ok(true),
            b"0" | b"false" => Ok(false),
            _ => Err(DecodeError::Conversion),
        }
    }
}

impl Decode<'_> for char {
    fn decode(field: &[u8]) -> Result<Self, DecodeError> {
        match *field {
            [b] => Ok(b as char),
            _ => Err(DecodeError::Conversion),
        }
    }
}

macro_rules! impl_decode_unsigned(($($ty:ident)*) => {$(
    impl Decode<'_> for $ty {
        fn decode(field: &[u8]) -> Result<Self, DecodeError> {
            if field.is_empty() {
                return Err(DecodeError::Conversion);
            }
            let mut value: $ty = 0;
            for &b in field {
                if !b.is_ascii_digit() {
                    return Err(DecodeError::Conversion);
                }
                value = value
                    .checked_mul(10)
                    .and_then(|value| value.checked_add((b - b'0') as $ty))
                    .ok_or(DecodeError::Conversion)?;
            }
            Ok(value)
        }
    }
)*});

macro_rules! impl_decode_signed(($($ty:ident)*) => {$(
    impl Decode<'_> for $ty {
        fn decode(field: &[u8]) -> Result<Self, DecodeError> {
            let (negative, digits) = match field.split_first() {
                Some((&b'-', digits)) => (true, digits),
                _ => (false, field),
            };
            if digits.is_empty() {
                return Err(DecodeError::Conversion);
            }
            // Accumulate negatively so that MIN round-trips.
            let mut value: $ty = 0;
            for &b in digits {
                if !b.is_ascii_digit() {
                    return Err(DecodeError::Conversion);
                }
                value = value
                    .checked_mul(10)
                    .and_then(|value| value.checked_sub((b - b'0') as $ty))
                    .ok_or(DecodeError::Conversion)?;
            }
            if negative {
                Ok(value)
            } else {
                value.checked_neg().ok_or(DecodeError::Conversion)
            }
        }
    }
)*});

impl_decode_unsigned!(u8 u16 u32 u64 usize);
impl_decode_signed!(i8 i16 i32 i64 isize);

macro_rules! impl_decode_float(($($ty:ident)*) => {$(
    impl Decode<'_> for $ty {
        #[inline]
        fn decode(field: &[u8]) -> Result<Self, DecodeError> {
            fast_float2::parse(field).map_err(|_| DecodeError::Conversion)
        }
    }
)*});

impl_decode_float!(f32 f64);

/// Succeeds unconditionally; an inner decode failure yields `None`.
impl<'r, T: Decode<'r>> Decode<'r> for Option<T> {
    #[inline]
    fn decode(field: &'r [u8]) -> Result<Self, DecodeError> {
        Ok(T::decode(field).ok())
    }
}

/// Ordered alternatives: tries `T` first, then `U`. Nest the `U` side for
/// more than two alternatives. Fails only when every alternative fails.
impl<'r, T: Decode<'r>, U: Decode<'r>> Decode<'r> for Result<T, U> {
    fn decode(field: &'r [u8]) -> Result<Self, DecodeError> {
        match T::decode(field) {
            Ok(value) => Ok(Ok(value)),
            Err(_) => U::decode(field).map(Err),
        }
    }
}
