// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of ssv-rust, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

use memchr::memchr_iter;
use thiserror::Error;

use crate::{options::Options, parse::Span};

/// An error from splitting one row into columns.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Hash)]
pub enum SplitError {
    #[error("empty delimiter")]
    EmptyDelimiter,
    /// Non-trim bytes between a closing quote and the next delimiter. The
    /// position is the byte offset of the closing quote within the row.
    #[error("mismatched quote at position: {0}")]
    MismatchedQuote(usize),
    #[error("unterminated quote")]
    UnterminatedQuote,
    #[error("unterminated escape at the end of the line")]
    UnterminatedEscape,
    #[error("invalid resplit, new line must be longer than the end of the last slice")]
    InvalidResplit,
}

/// Splits one row into columns, in place.
///
/// The splitter owns no buffer: [`Splitter::split`] tokenizes the caller's
/// buffer, collapsing escape sequences and doubled quotes by shifting the
/// remaining bytes left, and records each column as a [`Span`] into that same
/// buffer. Spans are valid until the next call to `split`.
///
/// When multiline is enabled and a row ends inside a quoted field, `split`
/// returns with [`Splitter::unterminated_quote`] set instead of failing; the
/// caller appends the next physical line to the buffer and continues the row
/// with [`Splitter::resplit`].
pub(crate) struct Splitter {
    quote: Option<u8>,
    escape: Option<u8>,
    trim_left: Vec<u8>,
    trim_right: Vec<u8>,
    multiline: bool,

    spans: Vec<Span>,
    unterminated_quote: bool,
    done: bool,
    resplitting: bool,
    /// Number of collapsed bytes in the current column: the write head lags
    /// the read head by exactly this amount.
    escaped: usize,

    begin: usize,
    curr: usize,
    end: usize,
}

impl Splitter {
    pub(crate) fn new(options: &Options, multiline: bool) -> Self {
        Splitter {
            quote: options.quote,
            escape: options.escape,
            trim_left: options.trim_left_set().to_vec(),
            trim_right: options.trim_right_set().to_vec(),
            multiline: multiline && options.multiline.is_some(),
            spans: Vec::new(),
            unterminated_quote: false,
            done: true,
            resplitting: false,
            escaped: 0,
            begin: 0,
            curr: 0,
            end: 0,
        }
    }

    #[inline(always)]
    pub(crate) fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub(crate) fn clear(&mut self) {
        self.spans.clear();
        self.unterminated_quote = false;
    }

    #[inline(always)]
    pub(crate) fn unterminated_quote(&self) -> bool {
        self.unterminated_quote
    }

    /// Number of bytes the end of the row has been shifted backwards by
    /// collapsing escapes and doubled quotes in the current column.
    #[inline(always)]
    pub(crate) fn size_shifted(&self) -> usize {
        self.escaped
    }

    /// Splits `buf` into columns on `delim`, rewriting it in place. An empty
    /// buffer is a row of one empty column.
    pub(crate) fn split(&mut self, buf: &mut [u8], delim: &[u8]) -> Result<(), SplitError> {
        self.spans.clear();
        self.unterminated_quote = false;
        self.resplitting = false;
        self.begin = 0;
        if self.is_plain() && delim.len() == 1 {
            return self.split_fast(buf, delim[0]);
        }
        self.split_from(buf, delim)
    }

    /// Continues splitting after the caller extended the buffer past an
    /// unterminated quote. The last, partial column is discarded and scanning
    /// resumes inside the quoted field.
    pub(crate) fn resplit(&mut self, buf: &mut [u8], delim: &[u8]) -> Result<(), SplitError> {
        if self.quote.is_none() || !self.multiline || self.spans.is_empty() || !self.unterminated_quote
        {
            return Err(SplitError::InvalidResplit);
        }

        // The partial column's span marks where the quoted field began.
        let marker = self.spans.pop().unwrap();
        let begin = marker.end - 1;
        if buf.len() < begin {
            return Err(SplitError::InvalidResplit);
        }

        self.begin = begin;
        self.end = self.curr;
        self.unterminated_quote = false;
        self.resplitting = true;
        self.split_from(buf, delim)
    }

    #[inline]
    fn is_plain(&self) -> bool {
        self.quote.is_none()
            && self.escape.is_none()
            && self.trim_left.is_empty()
            && self.trim_right.is_empty()
    }

    /// No quoting, escaping, or trimming: columns are exactly the spans
    /// between delimiters and nothing is rewritten.
    fn split_fast(&mut self, buf: &[u8], delim: u8) -> Result<(), SplitError> {
        let mut start = 0;
        for pos in memchr_iter(delim, buf) {
            self.spans.push(Span::from(start..pos));
            start = pos + 1;
        }
        self.spans.push(Span::from(start..buf.len()));
        Ok(())
    }

    fn split_from(&mut self, buf: &mut [u8], delim: &[u8]) -> Result<(), SplitError> {
        if delim.is_empty() {
            return Err(SplitError::EmptyDelimiter);
        }
        while self.begin < buf.len() && self.trim_left.contains(&buf[self.begin]) {
            self.begin += 1;
        }
        self.done = false;
        while !self.done {
            self.read(buf, delim)?;
        }
        Ok(())
    }

    /// Reads one column.
    fn read(&mut self, buf: &mut [u8], delim: &[u8]) -> Result<(), SplitError> {
        self.escaped = 0;
        if let Some(quote) = self.quote {
            if self.multiline && self.resplitting {
                self.resplitting = false;
                self.begin += 1;
                return self.read_quoted(buf, delim);
            }
            if self.begin < buf.len() && buf[self.begin] == quote {
                self.begin += 1;
                self.curr = self.begin;
                self.end = self.begin;
                return self.read_quoted(buf, delim);
            }
        }
        self.curr = self.begin;
        self.end = self.begin;
        self.read_normal(buf, delim)
    }

    fn read_normal(&mut self, buf: &mut [u8], delim: &[u8]) -> Result<(), SplitError> {
        loop {
            let (width, is_delim) = self.match_delimiter(buf, self.end, delim)?;
            if is_delim {
                self.shift_push_and_start_next(buf, width);
                return Ok(());
            }
            if width == 0 {
                // eol
                self.shift_and_push(buf);
                self.done = true;
                return Ok(());
            }
            self.end += width;
        }
    }

    fn read_quoted(&mut self, buf: &mut [u8], delim: &[u8]) -> Result<(), SplitError> {
        let quote = self.quote.unwrap_or(b'"');
        loop {
            if self.end < buf.len() && buf[self.end] != quote {
                if let Some(escape) = self.escape {
                    if buf[self.end] == escape {
                        if self.end + 1 >= buf.len() {
                            // eol on an escape
                            // eg: ..."hel\
                            if !self.multiline {
                                return Err(SplitError::UnterminatedEscape);
                            }
                            self.done = true;
                            return Ok(());
                        }
                        self.shift_and_jump_escape(buf);
                        self.end += 1;
                        continue;
                    }
                }
                self.end += 1;
                continue;
            }

            if self.end >= buf.len() {
                // eol inside the quoted field
                // eg: ..."hell
                self.shift_and_set_current(buf);
                self.unterminated_quote = true;
                self.spans.push(Span::from(0..self.begin));
                self.done = true;
                if !self.multiline {
                    return Err(SplitError::UnterminatedQuote);
                }
                return Ok(());
            }

            // quote found
            let (width, is_delim) = self.match_delimiter(buf, self.end + 1, delim)?;

            if is_delim {
                self.shift_push_and_start_next(buf, width + 1);
                return Ok(());
            }

            // double quote
            // eg: ...,"hel""lo",... -> hel"lo
            if self.end + 1 < buf.len() && buf[self.end + 1] == quote {
                self.shift_and_jump_escape(buf);
                self.end += 1;
                continue;
            }

            if width == 0 {
                // eol after the closing quote
                // eg: ...,"hello"   <eol> -> hello
                self.shift_and_push(buf);
                self.done = true;
                return Ok(());
            }

            // eg: ...,"hel"lo,... -> error
            self.spans.push(Span::from(0..self.begin));
            self.done = true;
            return Err(SplitError::MismatchedQuote(self.end));
        }
    }

    /// Looks for the delimiter at `begin`, skipping right-trim bytes before
    /// it and left-trim bytes after it. Returns the matched width and whether
    /// it was a delimiter; width 0 means only trim bytes remained before the
    /// end of the buffer. A non-delimiter escape byte is collapsed here.
    fn match_delimiter(
        &mut self,
        buf: &mut [u8],
        begin: usize,
        delim: &[u8],
    ) -> Result<(usize, bool), SplitError> {
        let mut end = begin;
        while end < buf.len() && self.trim_right.contains(&buf[end]) {
            end += 1;
        }

        // just spacing
        if end >= buf.len() {
            return Ok((0, false));
        }

        // not a delimiter
        if !buf[end..].starts_with(delim) {
            self.shift_if_escaped(buf, end)?;
            return Ok((1 + end - begin, false));
        }

        end += delim.len();
        while end < buf.len() && self.trim_left.contains(&buf[end]) {
            end += 1;
        }

        // delimiter
        Ok((end - begin, true))
    }

    fn shift_if_escaped(&mut self, buf: &mut [u8], at: usize) -> Result<(), SplitError> {
        if let Some(escape) = self.escape {
            if buf[at] == escape {
                if at + 1 >= buf.len() {
                    if !self.multiline {
                        return Err(SplitError::UnterminatedEscape);
                    }
                    self.done = true;
                    return Ok(());
                }
                self.shift_and_jump_escape(buf);
            }
        }
        Ok(())
    }

    /// Collapses one escape or doubled-quote byte: everything pending is
    /// shifted left by the previous lag, then the byte at the read head is
    /// skipped by growing the lag.
    fn shift_and_jump_escape(&mut self, buf: &mut [u8]) {
        self.shift_and_set_current(buf);
        self.escaped += 1;
        self.end += 1;
    }

    fn shift_push_and_start_next(&mut self, buf: &mut [u8], n: usize) {
        self.shift_and_push(buf);
        self.begin = self.end + n;
    }

    fn shift_and_push(&mut self, buf: &mut [u8]) {
        self.shift_and_set_current(buf);
        self.spans.push(Span::from(self.begin..self.curr));
    }

    /// Moves the bytes between the write head and the read head left by the
    /// accumulated lag, bringing the write head up to date.
    fn shift_and_set_current(&mut self, buf: &mut [u8]) {
        if self.escaped > 0 {
            buf.copy_within(self.curr + self.escaped..self.end, self.curr);
            self.curr = self.end - self.escaped;
            return;
        }
        self.curr = self.end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;

    fn split(options: &Options, line: &[u8], delim: &[u8]) -> Result<Vec<Vec<u8>>, SplitError> {
        let mut splitter = Splitter::new(options, true);
        let mut buf = line.to_vec();
        splitter.split(&mut buf, delim)?;
        if splitter.unterminated_quote() {
            return Err(SplitError::UnterminatedQuote);
        }
        Ok(collect(&splitter, &buf))
    }

    fn collect(splitter: &Splitter, buf: &[u8]) -> Vec<Vec<u8>> {
        splitter
            .spans()
            .iter()
            .map(|span| span.slice(buf).to_vec())
            .collect()
    }

    fn fields<const N: usize>(cols: [&[u8]; N]) -> Vec<Vec<u8>> {
        cols.iter().map(|c| c.to_vec()).collect()
    }

    #[test]
    fn plain_rows() {
        let options = Options::new();
        assert_eq!(
            split(&options, b"1,2,x", b","),
            Ok(fields([b"1", b"2", b"x"])),
        );
        // A row containing only the delimiter produces two empty fields.
        assert_eq!(split(&options, b",", b","), Ok(fields([b"", b""])));
        assert_eq!(split(&options, b"a,,b", b","), Ok(fields([b"a", b"", b"b"])));
        assert_eq!(split(&options, b"single", b","), Ok(fields([b"single"])));
        // An empty row is one empty field, not zero fields.
        assert_eq!(split(&options, b"", b","), Ok(fields([b""])));
    }

    #[test]
    fn plain_rows_match_with_any_option_disabled() {
        // A row without quote, escape, or trim bytes splits identically
        // whether the fast path or the state machine runs.
        let plain = Options::new();
        let full = Options::new().quote(b'"').escape(b'\\').trim(b"\t");
        for line in [&b"1,2,x"[..], b"a,,b", b",", b"", b"ab"] {
            assert_eq!(
                split(&plain, line, b","),
                split(&full, line, b","),
                "line: {line:?}",
            );
        }
    }

    #[test]
    fn multibyte_delimiter() {
        let options = Options::new();
        assert_eq!(
            split(&options, b"1::2::x", b"::"),
            Ok(fields([b"1", b"2", b"x"])),
        );
        assert_eq!(split(&options, b"1:2", b"::"), Ok(fields([b"1:2"])));
    }

    #[test]
    fn empty_delimiter_is_rejected() {
        // The fast path never sees an empty delimiter.
        let options = Options::new().quote(b'"');
        assert_eq!(split(&options, b"a,b", b""), Err(SplitError::EmptyDelimiter));
    }

    #[test]
    fn quoted_fields() {
        let options = Options::new().quote(b'"');
        assert_eq!(
            split(&options, b"7,8,\"a,b\"", b","),
            Ok(fields([b"7", b"8", b"a,b"])),
        );
        // Doubled quote collapses to one literal quote.
        assert_eq!(
            split(&options, b"7,8,\"a,\"\"b\"\"\"", b","),
            Ok(fields([b"7", b"8", b"a,\"b\""])),
        );
        assert_eq!(split(&options, b"\"\"", b","), Ok(fields([b""])));
    }

    #[test]
    fn mismatched_quote() {
        let options = Options::new().quote(b'"');
        assert_eq!(
            split(&options, b"\"hel\"lo,x", b","),
            Err(SplitError::MismatchedQuote(4)),
        );
    }

    #[test]
    fn unterminated_quote() {
        let options = Options::new().quote(b'"');
        let mut splitter = Splitter::new(&options, false);
        let mut buf = b"1,\"x".to_vec();
        assert_eq!(
            splitter.split(&mut buf, b","),
            Err(SplitError::UnterminatedQuote),
        );
        assert!(splitter.unterminated_quote());

        // A single quote character as a field is already unterminated.
        let mut buf = b"\"".to_vec();
        assert_eq!(
            splitter.split(&mut buf, b","),
            Err(SplitError::UnterminatedQuote),
        );
    }

    #[test]
    fn escapes() {
        let options = Options::new().escape(b'\\');
        assert_eq!(
            split(&options, b"a\\,b,c", b","),
            Ok(fields([b"a,b", b"c"])),
        );
        assert_eq!(split(&options, b"a\\\\,b", b","), Ok(fields([b"a\\", b"b"])));
        // Escape of an ordinary byte is the byte itself.
        assert_eq!(split(&options, b"a\\bc", b","), Ok(fields([b"abc"])));
    }

    #[test]
    fn trailing_escape_without_multiline() {
        let options = Options::new().escape(b'\\');
        let mut splitter = Splitter::new(&options, false);
        let mut buf = b"ab\\".to_vec();
        assert_eq!(
            splitter.split(&mut buf, b","),
            Err(SplitError::UnterminatedEscape),
        );
    }

    #[test]
    fn escape_inside_quotes() {
        let options = Options::new().quote(b'"').escape(b'\\');
        assert_eq!(
            split(&options, b"\"a\\\"b\",c", b","),
            Ok(fields([b"a\"b", b"c"])),
        );
        assert_eq!(
            split(&options, b"\"a\\,b\"", b","),
            Ok(fields([b"a,b"])),
        );
    }

    #[test]
    fn trimming() {
        let options = Options::new().trim(b" ");
        assert_eq!(
            split(&options, b"  a , b ,c", b","),
            Ok(fields([b"a", b"b", b"c"])),
        );
        // Interior spacing is preserved.
        assert_eq!(split(&options, b"a b,c", b","), Ok(fields([b"a b", b"c"])));
        // A row of only trim bytes and delimiters yields empty fields.
        assert_eq!(
            split(&options, b"  ,  ,  ", b","),
            Ok(fields([b"", b"", b""])),
        );
    }

    #[test]
    fn trim_outside_quotes() {
        let options = Options::new().quote(b'"').trim(b" ");
        // Trim bytes outside the quotes are discarded, bytes inside kept.
        assert_eq!(
            split(&options, b"  \" a \"  ,x", b","),
            Ok(fields([b" a ", b"x"])),
        );
    }

    #[test]
    fn one_sided_trim() {
        let options = Options::new().trim_left(b" ");
        assert_eq!(
            split(&options, b" a , b", b","),
            Ok(fields([b"a ", b"b"])),
        );
        let options = Options::new().trim_right(b" ");
        assert_eq!(
            split(&options, b" a , b", b","),
            Ok(fields([b" a", b" b"])),
        );
    }

    #[test]
    fn resplit_continues_a_quoted_field() {
        let options = Options::new().quote(b'"').multiline(0);
        let mut splitter = Splitter::new(&options, true);
        let mut buf = b"1,\"a".to_vec();
        splitter.split(&mut buf, b",").unwrap();
        assert!(splitter.unterminated_quote());

        buf.extend_from_slice(b"\nb\",2");
        splitter.resplit(&mut buf, b",").unwrap();
        assert!(!splitter.unterminated_quote());
        assert_eq!(collect(&splitter, &buf), fields([b"1", b"a\nb", b"2"]));
    }

    #[test]
    fn resplit_requires_an_unterminated_quote() {
        let options = Options::new().quote(b'"').multiline(0);
        let mut splitter = Splitter::new(&options, true);
        let mut buf = b"1,2".to_vec();
        splitter.split(&mut buf, b",").unwrap();
        assert_eq!(
            splitter.resplit(&mut buf, b","),
            Err(SplitError::InvalidResplit),
        );
    }

    #[test]
    fn spans_stay_in_bounds_after_rewriting() {
        let options = Options::new().quote(b'"').escape(b'\\');
        let mut splitter = Splitter::new(&options, false);
        let mut buf = b"\"a\"\"b\",c\\,d,e".to_vec();
        splitter.split(&mut buf, b",").unwrap();
        let len = buf.len();
        let mut last_end = 0;
        for span in splitter.spans() {
            assert!(span.start >= last_end, "spans overlap");
            assert!(span.end <= len, "span out of bounds");
            last_end = span.end;
        }
        assert_eq!(collect(&splitter, &buf), fields([b"a\"b", b"c,d", b"e"]));
    }
}
