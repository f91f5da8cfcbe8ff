// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of ssv-rust, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

use std::io::{self, BufRead};
use std::mem;

use crate::{
    options::{Options, ParserFlag},
    parse::{Input, SplitError, Splitter},
};

/// An error from assembling one logical row.
#[derive(Debug)]
pub(crate) enum RowError {
    Split(SplitError),
    MultilineLimitReached,
    Io(io::Error),
}

impl From<SplitError> for RowError {
    #[inline]
    fn from(err: SplitError) -> Self {
        RowError::Split(err)
    }
}

impl From<io::Error> for RowError {
    #[inline]
    fn from(err: io::Error) -> Self {
        RowError::Io(err)
    }
}

impl Clone for RowError {
    fn clone(&self) -> Self {
        match self {
            RowError::Split(err) => RowError::Split(*err),
            RowError::MultilineLimitReached => RowError::MultilineLimitReached,
            RowError::Io(err) => RowError::Io(io::Error::from(err.kind())),
        }
    }
}

impl PartialEq for RowError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RowError::Split(a), RowError::Split(b)) => a == b,
            (RowError::MultilineLimitReached, RowError::MultilineLimitReached) => true,
            (RowError::Io(a), RowError::Io(b)) => a.kind() == b.kind(),
            _ => false,
        }
    }
}

impl Eq for RowError {}

/// Delivers logical rows to the splitter.
///
/// The reader owns two (buffer, splitter) pairs: the current row, which the
/// converter reads, and the prefetched next row. [`Reader::read_next`] fills
/// the next-row buffer with one physical line, [`Reader::parse`] extends it
/// with continuation lines and splits it, and [`Reader::update`] swaps it in
/// as the current row. Prefetching one row ahead is what detects EOF before
/// the last row is consumed.
pub(crate) struct Reader<R> {
    pub(crate) input: Input<R>,
    delim: Vec<u8>,

    /// The current row.
    pub(crate) buf: Vec<u8>,
    pub(crate) splitter: Splitter,

    /// The prefetched next row.
    pub(crate) next_buf: Vec<u8>,
    next_splitter: Splitter,
    helper_buf: Vec<u8>,

    /// Whether the EOL just stripped from the next-row buffer was CRLF, so
    /// that multiline continuation can restore the original bytes.
    crlf: bool,

    quote: Option<u8>,
    escape: Option<u8>,
    multiline: Option<u32>,
    ignore_empty: bool,
}

impl<R: BufRead> Reader<R> {
    pub(crate) fn new(input: R, delim: Vec<u8>, options: &Options) -> Self {
        Reader {
            input: Input::new(input),
            delim,
            buf: Vec::new(),
            splitter: Splitter::new(options, true),
            next_buf: Vec::new(),
            next_splitter: Splitter::new(options, true),
            helper_buf: Vec::new(),
            crlf: false,
            quote: options.quote,
            escape: options.escape,
            multiline: options.multiline,
            ignore_empty: options.flags.contains(ParserFlag::IgnoreEmpty),
        }
    }

    #[inline(always)]
    pub(crate) fn delim(&self) -> &[u8] {
        &self.delim
    }

    /// Reads the next physical line into the next-row buffer, stripping the
    /// EOL and skipping empty lines when configured. Returns `false` at EOF.
    pub(crate) fn read_next(&mut self) -> io::Result<bool> {
        loop {
            self.next_buf.clear();
            if !self.input.read_line(&mut self.next_buf)? {
                return Ok(false);
            }
            self.crlf = strip_eol(&mut self.next_buf);
            if !(self.ignore_empty && self.next_buf.is_empty()) {
                return Ok(true);
            }
        }
    }

    /// Splits the prefetched row, appending continuation lines while the row
    /// ends on an odd escape run or inside a quoted field.
    pub(crate) fn parse(&mut self) -> Result<(), RowError> {
        let mut continuations = 0u32;

        if self.escaped_multiline() {
            while self.ends_on_odd_escape() {
                self.bump_limit(&mut continuations)?;
                if !self.append_next_line()? {
                    return Err(SplitError::UnterminatedEscape.into());
                }
            }
        }

        self.next_splitter.split(&mut self.next_buf, &self.delim)?;

        if self.quoted_multiline() {
            while self.next_splitter.unterminated_quote() {
                // Discard the write-head lag of the partial column before
                // appending, so the continuation lands at the write head.
                let len = self.next_buf.len() - self.next_splitter.size_shifted();
                self.next_buf.truncate(len);

                self.bump_limit(&mut continuations)?;
                if !self.append_next_line()? {
                    return Err(SplitError::UnterminatedQuote.into());
                }

                if self.escaped_multiline() {
                    while self.ends_on_odd_escape() {
                        self.bump_limit(&mut continuations)?;
                        if !self.append_next_line()? {
                            return Err(SplitError::UnterminatedEscape.into());
                        }
                    }
                }

                self.next_splitter.resplit(&mut self.next_buf, &self.delim)?;
            }
        }
        Ok(())
    }

    /// Makes the freshly parsed row the current one.
    pub(crate) fn update(&mut self) {
        mem::swap(&mut self.buf, &mut self.next_buf);
        mem::swap(&mut self.splitter, &mut self.next_splitter);
    }

    /// Restores the EOL stripped from the next-row buffer and appends the
    /// following physical line to it. Returns `false` at EOF.
    fn append_next_line(&mut self) -> io::Result<bool> {
        restore_eol(&mut self.next_buf, self.crlf);
        self.helper_buf.clear();
        if !self.input.read_line(&mut self.helper_buf)? {
            return Ok(false);
        }
        self.crlf = strip_eol(&mut self.helper_buf);
        self.next_buf.extend_from_slice(&self.helper_buf);
        Ok(true)
    }

    fn bump_limit(&self, continuations: &mut u32) -> Result<(), RowError> {
        if let Some(limit) = self.multiline {
            if limit > 0 {
                if *continuations >= limit {
                    return Err(RowError::MultilineLimitReached);
                }
                *continuations += 1;
            }
        }
        Ok(())
    }

    /// A row continues on the next physical line iff it ends with an odd run
    /// of escape characters: the last escape escapes the newline itself.
    fn ends_on_odd_escape(&self) -> bool {
        let escape = self.escape.unwrap_or(b'\0');
        let run = self.next_buf.iter().rev().take_while(|&&b| b == escape);
        run.count() % 2 == 1
    }

    #[inline]
    fn escaped_multiline(&self) -> bool {
        self.multiline.is_some() && self.escape.is_some()
    }

    #[inline]
    fn quoted_multiline(&self) -> bool {
        self.multiline.is_some() && self.quote.is_some()
    }
}

/// Strips a trailing LF or CRLF; returns whether it was CRLF.
fn strip_eol(buf: &mut Vec<u8>) -> bool {
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
            return true;
        }
    }
    false
}

fn restore_eol(buf: &mut Vec<u8>, crlf: bool) {
    if crlf {
        buf.extend_from_slice(b"\r\n");
    } else {
        buf.push(b'\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{Options, ParserFlag};

    fn reader<'a>(data: &'a [u8], options: &Options) -> Reader<&'a [u8]> {
        Reader::new(data, b",".to_vec(), options)
    }

    fn columns(reader: &Reader<&[u8]>) -> Vec<Vec<u8>> {
        reader
            .splitter
            .spans()
            .iter()
            .map(|span| span.slice(&reader.buf).to_vec())
            .collect()
    }

    fn next_parsed(r: &mut Reader<&[u8]>) -> Result<(), RowError> {
        assert!(r.read_next().unwrap());
        let parsed = r.parse();
        r.update();
        parsed
    }

    #[test]
    fn crlf_is_stripped() {
        let options = Options::new();
        let mut r = reader(b"a,b\r\nc,d\n", &options);
        next_parsed(&mut r).unwrap();
        assert_eq!(columns(&r), [b"a", b"b"]);
        next_parsed(&mut r).unwrap();
        assert_eq!(columns(&r), [b"c", b"d"]);
        assert!(!r.read_next().unwrap());
    }

    #[test]
    fn last_row_without_newline() {
        let options = Options::new();
        let mut r = reader(b"a,b", &options);
        next_parsed(&mut r).unwrap();
        assert_eq!(columns(&r), [b"a", b"b"]);
        assert!(!r.read_next().unwrap());
    }

    #[test]
    fn empty_lines_are_skipped_when_configured() {
        let options = Options::new().flags(ParserFlag::IgnoreEmpty);
        let mut r = reader(b"a\n\n\nb\n", &options);
        next_parsed(&mut r).unwrap();
        assert_eq!(columns(&r), [b"a"]);
        next_parsed(&mut r).unwrap();
        assert_eq!(columns(&r), [b"b"]);
        assert!(!r.read_next().unwrap());
    }

    #[test]
    fn escaped_newline_joins_lines() {
        let options = Options::new().escape(b'\\').multiline(0);
        let mut r = reader(b"1,2,hello\\\nworld\n", &options);
        next_parsed(&mut r).unwrap();
        assert_eq!(columns(&r), [&b"1"[..], b"2", b"hello\nworld"]);
    }

    #[test]
    fn even_escape_run_does_not_join() {
        let options = Options::new().escape(b'\\').multiline(0);
        let mut r = reader(b"a\\\\\nb\n", &options);
        next_parsed(&mut r).unwrap();
        assert_eq!(columns(&r), [b"a\\"]);
        next_parsed(&mut r).unwrap();
        assert_eq!(columns(&r), [b"b"]);
    }

    #[test]
    fn quoted_newline_joins_lines() {
        let options = Options::new().quote(b'"').multiline(3);
        let mut r = reader(b"1,2,\"a\nb\nc\"\n", &options);
        next_parsed(&mut r).unwrap();
        assert_eq!(columns(&r), [&b"1"[..], b"2", b"a\nb\nc"]);
        assert_eq!(r.input.line(), 3);
    }

    #[test]
    fn quoted_continuation_restores_crlf() {
        let options = Options::new().quote(b'"').multiline(0);
        let mut r = reader(b"\"a\r\nb\"\n", &options);
        next_parsed(&mut r).unwrap();
        assert_eq!(columns(&r), [b"a\r\nb"]);
    }

    #[test]
    fn multiline_limit() {
        let options = Options::new().quote(b'"').multiline(1);
        let mut r = reader(b"1,2,\"a\nb\nc\"\n", &options);
        assert_eq!(next_parsed(&mut r), Err(RowError::MultilineLimitReached));
    }

    #[test]
    fn eof_inside_quoted_continuation() {
        let options = Options::new().quote(b'"').multiline(0);
        let mut r = reader(b"\"a\nb", &options);
        assert_eq!(
            next_parsed(&mut r),
            Err(RowError::Split(SplitError::UnterminatedQuote)),
        );
    }

    #[test]
    fn eof_on_trailing_escape() {
        let options = Options::new().escape(b'\\').multiline(0);
        let mut r = reader(b"a\\", &options);
        assert_eq!(
            next_parsed(&mut r),
            Err(RowError::Split(SplitError::UnterminatedEscape)),
        );
    }

    #[test]
    fn quoted_field_with_escaped_quote_across_lines() {
        let options = Options::new().quote(b'"').escape(b'\\').multiline(0);
        let mut r = reader(b"\"a\\\"b\nc\",x\n", &options);
        next_parsed(&mut r).unwrap();
        assert_eq!(columns(&r), [&b"a\"b\nc"[..], b"x"]);
    }
}
