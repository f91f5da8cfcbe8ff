// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of ssv-rust, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

use bstr::BString;

use crate::{
    decode::{Decode, DecodeError},
    parse::Span,
};

/// A borrowed view of one split row.
///
/// Fields are addressed by logical index: when a column mapping is active,
/// logical index `i` reads physical column `mapping[i]`. The view, and every
/// field borrowed from it, is invalidated when the next row is read.
pub struct Row<'a, 'r> {
    buf: &'r [u8],
    spans: &'a [Span],
    mapping: Option<&'a [usize]>,
}

impl<'a, 'r> Row<'a, 'r> {
    pub(crate) fn new(buf: &'r [u8], spans: &'a [Span], mapping: Option<&'a [usize]>) -> Self {
        Row { buf, spans, mapping }
    }

    /// The number of logical fields.
    pub fn len(&self) -> usize {
        match self.mapping {
            Some(mapping) => mapping.len(),
            None => self.spans.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The unescaped bytes of the field at logical index `index`.
    pub fn field(&self, index: usize) -> &'r [u8] {
        let physical = match self.mapping {
            Some(mapping) => mapping[index],
            None => index,
        };
        self.spans[physical].slice(self.buf)
    }
}

/// An error from decoding one field of a row, positioned by column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    /// Zero-based logical column index.
    pub(crate) column: usize,
    /// The raw field bytes the decode was attempted on.
    pub(crate) raw: BString,
    pub(crate) kind: DecodeError,
}

impl FieldError {
    pub fn new(column: usize, raw: impl Into<BString>, kind: DecodeError) -> Self {
        FieldError {
            column,
            raw: raw.into(),
            kind,
        }
    }
}

/// A row shape that can be decoded from a split row.
///
/// Implemented for tuples of up to twelve [`Decode`] elements. `COLUMNS` is
/// the number of columns the shape consumes, [`Ignored`](crate::Ignored)
/// elements included.
pub trait FromRow<'r>: Sized {
    const COLUMNS: usize;

    fn from_row(row: &Row<'_, 'r>) -> Result<Self, FieldError>;
}

fn decode_field<'r, T: Decode<'r>>(row: &Row<'_, 'r>, index: usize) -> Result<T, FieldError> {
    let raw = row.field(index);
    T::decode(raw).map_err(|kind| FieldError {
        column: index,
        raw: BString::from(raw),
        kind,
    })
}

macro_rules! impl_from_row(($($n:literal: ($($T:ident $idx:tt),+))+) => {$(
    impl<'r, $($T: Decode<'r>),+> FromRow<'r> for ($($T,)+) {
        const COLUMNS: usize = $n;

        fn from_row(row: &Row<'_, 'r>) -> Result<Self, FieldError> {
            Ok(($(decode_field::<$T>(row, $idx)?,)+))
        }
    }
)+});

impl_from_row! {
    1: (A 0)
    2: (A 0, B 1)
    3: (A 0, B 1, C 2)
    4: (A 0, B 1, C 2, D 3)
    5: (A 0, B 1, C 2, D 3, E 4)
    6: (A 0, B 1, C 2, D 3, E 4, F 5)
    7: (A 0, B 1, C 2, D 3, E 4, F 5, G 6)
    8: (A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7)
    9: (A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8)
    10: (A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8, J 9)
    11: (A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8, J 9, K 10)
    12: (A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8, J 9, K 10, L 11)
}
