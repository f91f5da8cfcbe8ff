// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of ssv-rust, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

use std::{
    fmt::{self, Debug, Formatter},
    ops::Range,
};

/// Converts the type to a byte slice for slicing with a `Span`.
pub(crate) trait Sliceable<'a> {
    fn as_slice(&'a self) -> &'a [u8];
}

/// A range of bytes within the current row buffer.
///
/// This is used instead of directly slicing the buffer so that ranges stay
/// valid while the buffer is still being grown or rewritten in place. Once a
/// row has been fully split, the buffer does not change until the next row is
/// requested, and slices can be made and returned to the caller.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Span {
    pub(crate) start: usize,
    pub(crate) end: usize,
}

impl<'a> Sliceable<'a> for [u8] {
    #[inline(always)]
    fn as_slice(&'a self) -> &'a [u8] {
        self
    }
}

impl<'a> Sliceable<'a> for Vec<u8> {
    #[inline(always)]
    fn as_slice(&'a self) -> &'a [u8] {
        self
    }
}

impl Span {
    #[cfg(debug_assertions)]
    #[inline(always)]
    pub(crate) fn slice<'a, S: Sliceable<'a> + ?Sized>(&self, bytes: &'a S) -> &'a [u8] {
        &bytes.as_slice()[Range::from(*self)]
    }

    #[cfg(not(debug_assertions))]
    #[inline(always)]
    pub(crate) fn slice<'a, S: Sliceable<'a> + ?Sized>(&self, bytes: &'a S) -> &'a [u8] {
        // SAFETY: It is up to the caller to ensure that spans are in bounds.
        //
        // All spans point into the row buffer of the splitter that emitted
        // them. The buffer only grows within a row (multiline continuation
        // appends to it), so as long as a span is used with the buffer it was
        // emitted for, only its construction is relevant. Spans do not leak
        // into the public API except through `Row`, which pairs them with the
        // right buffer.
        unsafe { bytes.as_slice().get_unchecked(Range::from(*self)) }
    }

}

impl From<Range<usize>> for Span {
    #[inline(always)]
    fn from(range: Range<usize>) -> Self {
        Span {
            start: range.start,
            end: range.end,
        }
    }
}

impl From<Span> for Range<usize> {
    #[inline(always)]
    fn from(span: Span) -> Self {
        span.start..span.end
    }
}

impl Debug for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}
