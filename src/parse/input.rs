// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of ssv-rust, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

use std::io::{self, BufRead};

/// Input for a stream of physical lines.
pub(crate) struct Input<R> {
    /// Reader for the byte source.
    r: R,
    /// Whether the reader has reached EOF.
    eof: bool,
    /// The current physical line number, counting continuations.
    line: u64,
    /// Bytes consumed from the source so far.
    position: u64,
    /// Byte offset at which the most recently read line begins.
    line_start: u64,
}

impl<R: BufRead> Input<R> {
    #[inline(always)]
    pub(crate) fn new(input: R) -> Self {
        Input {
            r: input,
            eof: false,
            line: 0,
            position: 0,
            line_start: 0,
        }
    }

    /// Reads one physical line into `buf`, including its LF if present.
    /// Returns `false` at EOF. A final line without a terminator is still
    /// delivered.
    pub(crate) fn read_line(&mut self, buf: &mut Vec<u8>) -> io::Result<bool> {
        if self.eof {
            return Ok(false);
        }
        self.line_start = self.position;
        let n = self.r.read_until(b'\n', buf)?;
        if n == 0 {
            self.eof = true;
            return Ok(false);
        }
        if buf.last() != Some(&b'\n') {
            // EOF is reached in `read_until` iff the delimiter is missing.
            self.eof = true;
        }
        self.position += n as u64;
        self.line += 1;
        Ok(true)
    }
}

impl<R> Input<R> {
    #[inline(always)]
    pub(crate) fn line(&self) -> u64 {
        self.line
    }

    #[inline(always)]
    pub(crate) fn line_start(&self) -> u64 {
        self.line_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_keep_their_terminator() {
        let mut input = Input::new(&b"ab\ncd\r\nef"[..]);
        let mut buf = Vec::new();
        assert!(input.read_line(&mut buf).unwrap());
        assert_eq!(buf, b"ab\n");
        buf.clear();
        assert!(input.read_line(&mut buf).unwrap());
        assert_eq!(buf, b"cd\r\n");
        buf.clear();
        // The final line has no terminator but is still delivered.
        assert!(input.read_line(&mut buf).unwrap());
        assert_eq!(buf, b"ef");
        buf.clear();
        assert!(!input.read_line(&mut buf).unwrap());
        assert_eq!(input.line(), 3);
    }

    #[test]
    fn empty_input_is_immediate_eof() {
        let mut input = Input::new(&b""[..]);
        let mut buf = Vec::new();
        assert!(!input.read_line(&mut buf).unwrap());
        assert_eq!(input.line(), 0);
    }

    #[test]
    fn positions_track_line_starts() {
        let mut input = Input::new(&b"ab\ncde\nf"[..]);
        let mut buf = Vec::new();
        input.read_line(&mut buf).unwrap();
        assert_eq!(input.line_start(), 0);
        buf.clear();
        input.read_line(&mut buf).unwrap();
        assert_eq!(input.line_start(), 3);
        buf.clear();
        input.read_line(&mut buf).unwrap();
        assert_eq!(input.line_start(), 7);
    }
}
