// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of ssv-rust, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

//! Parser configuration.
//!
//! An [`Options`] value is fixed at parser construction and selects the
//! matcher characters and behavior flags of the splitter. The invariants
//! between matchers are checked once, when the parser is built, and reported
//! as [`OptionsError`].

use enumflags2::{bitflags, BitFlags};
use paste::paste;
use thiserror::Error;

/// The delimiter used when none is given explicitly.
pub const DEFAULT_DELIMITER: &str = ",";

/// Boolean parser options.
#[bitflags]
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParserFlag {
    /// Treat the first row as a data row rather than a header. The header
    /// API is unavailable when this is set.
    IgnoreHeader,
    /// Skip physical lines whose payload is empty.
    IgnoreEmpty,
}

/// An invalid combination of parser options.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Hash)]
pub enum OptionsError {
    #[error("cannot have the same match character in multiple matchers")]
    MatchersIntersect,
    #[error("string terminator cannot be used as a match character")]
    NulMatcher,
    #[error("to enable multiline either quote or escape needs to be enabled")]
    MultilineRequiresQuoteOrEscape,
    #[error("ambiguous trim setup")]
    AmbiguousTrim,
}

/// Configuration for a [`Parser`](crate::Parser).
///
/// All matchers are disabled by default, which parses plain rows with no
/// quoting, escaping, or trimming.
#[derive(Clone, Debug, Default)]
pub struct Options {
    pub(crate) quote: Option<u8>,
    pub(crate) escape: Option<u8>,
    trim: Vec<u8>,
    trim_left: Vec<u8>,
    trim_right: Vec<u8>,
    pub(crate) multiline: Option<u32>,
    pub(crate) flags: BitFlags<ParserFlag>,
}

macro_rules! trim_setter(($side:ident, $doc:literal) => {
    paste! {
        /// Sets the characters stripped from
        #[doc = concat!($doc, " of each unquoted field.")]
        /// Cannot be combined with [`Options::trim`].
        #[must_use]
        pub fn [<trim_ $side>](mut self, set: &[u8]) -> Self {
            self.[<trim_ $side>] = set.to_vec();
            self
        }
    }
});

impl Options {
    /// Creates options with every matcher and flag disabled.
    #[inline]
    pub fn new() -> Self {
        Options::default()
    }

    /// Enables quoted fields delimited by `quote`. A doubled quote inside a
    /// quoted field denotes a literal quote character.
    #[must_use]
    pub fn quote(mut self, quote: u8) -> Self {
        self.quote = Some(quote);
        self
    }

    /// Enables escape sequences: `escape` followed by any byte emits that
    /// byte literally, consuming both.
    #[must_use]
    pub fn escape(mut self, escape: u8) -> Self {
        self.escape = Some(escape);
        self
    }

    /// Sets the characters stripped from both sides of each unquoted field.
    /// Cannot be combined with [`Options::trim_left`] or
    /// [`Options::trim_right`].
    #[must_use]
    pub fn trim(mut self, set: &[u8]) -> Self {
        self.trim = set.to_vec();
        self
    }

    trim_setter!(left, "the left side");
    trim_setter!(right, "the right side");

    /// Enables multiline continuation: a row whose field ends mid-quote or
    /// on a trailing escape is extended with the next physical line. `limit`
    /// caps the number of continuation lines per row; 0 means unlimited.
    ///
    /// Requires quote or escape to be enabled.
    #[must_use]
    pub fn multiline(mut self, limit: u32) -> Self {
        self.multiline = Some(limit);
        self
    }

    /// Sets the boolean parser flags.
    #[must_use]
    pub fn flags(mut self, flags: impl Into<BitFlags<ParserFlag>>) -> Self {
        self.flags = flags.into();
        self
    }

    /// The characters stripped from the left of unquoted fields.
    #[inline]
    pub(crate) fn trim_left_set(&self) -> &[u8] {
        if !self.trim.is_empty() {
            &self.trim
        } else {
            &self.trim_left
        }
    }

    /// The characters stripped from the right of unquoted fields.
    #[inline]
    pub(crate) fn trim_right_set(&self) -> &[u8] {
        if !self.trim.is_empty() {
            &self.trim
        } else {
            &self.trim_right
        }
    }

    pub(crate) fn validate(&self) -> Result<(), OptionsError> {
        if !self.trim.is_empty() && (!self.trim_left.is_empty() || !self.trim_right.is_empty()) {
            return Err(OptionsError::AmbiguousTrim);
        }

        let trims = self.trim_left_set().iter().chain(self.trim_right_set());
        let mut matchers = self.quote.iter().chain(self.escape.iter()).chain(trims);
        if matchers.any(|&b| b == b'\0') {
            return Err(OptionsError::NulMatcher);
        }

        if let (Some(quote), Some(escape)) = (self.quote, self.escape) {
            if quote == escape {
                return Err(OptionsError::MatchersIntersect);
            }
        }
        for matcher in self.quote.iter().chain(self.escape.iter()) {
            if self.trim_left_set().contains(matcher) || self.trim_right_set().contains(matcher) {
                return Err(OptionsError::MatchersIntersect);
            }
        }

        if self.multiline.is_some() && self.quote.is_none() && self.escape.is_none() {
            return Err(OptionsError::MultilineRequiresQuoteOrEscape);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_are_valid() {
        assert_eq!(Options::new().validate(), Ok(()));
    }

    #[test]
    fn matchers_must_be_disjoint() {
        let intersecting = [
            Options::new().quote(b'"').escape(b'"'),
            Options::new().quote(b'"').trim(b" \""),
            Options::new().escape(b'\\').trim_right(b"\\"),
        ];
        for options in intersecting {
            assert_eq!(options.validate(), Err(OptionsError::MatchersIntersect));
        }
    }

    #[test]
    fn nul_is_not_a_matcher() {
        let options = Options::new().quote(b'"').trim(b" \0");
        assert_eq!(options.validate(), Err(OptionsError::NulMatcher));
    }

    #[test]
    fn multiline_needs_a_trigger() {
        assert_eq!(
            Options::new().multiline(0).validate(),
            Err(OptionsError::MultilineRequiresQuoteOrEscape),
        );
        assert_eq!(Options::new().quote(b'"').multiline(0).validate(), Ok(()));
        assert_eq!(Options::new().escape(b'\\').multiline(3).validate(), Ok(()));
    }

    #[test]
    fn trim_cannot_mix_with_sided_trim() {
        let options = Options::new().trim(b" ").trim_left(b"\t");
        assert_eq!(options.validate(), Err(OptionsError::AmbiguousTrim));
    }

    #[test]
    fn sided_trim_sets_resolve() {
        let options = Options::new().trim_left(b"\t").trim_right(b" ");
        assert_eq!(options.trim_left_set(), b"\t");
        assert_eq!(options.trim_right_set(), b" ");

        let options = Options::new().trim(b" ");
        assert_eq!(options.trim_left_set(), b" ");
        assert_eq!(options.trim_right_set(), b" ");
    }
}
