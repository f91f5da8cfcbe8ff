// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of ssv-rust, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

use std::{
    fmt::{self, Debug, Display, Formatter},
    fs::File,
    io::{self, BufRead, BufReader},
    marker::PhantomData,
    path::Path,
};

use bstr::{BStr, BString, ByteSlice};
use static_assertions::{assert_impl_all, assert_not_impl_any};
use thiserror::Error;

use crate::{
    decode::DecodeError,
    options::{Options, OptionsError, ParserFlag, DEFAULT_DELIMITER},
    parse::{
        reader::{Reader, RowError},
        row::{FieldError, FromRow, Row},
        Composite, SplitError, Splitter,
    },
};

/// The name rows from a borrowed memory buffer are reported under.
const BUFFER_SOURCE_NAME: &str = "CSV data buffer";

/// An error from the parser, annotated with the source name and, for
/// row-level errors, the line number.
#[derive(Debug)]
pub struct Error {
    source_name: String,
    line: Option<u64>,
    kind: ErrorKind,
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

/// A kind of parser error.
#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("could not be opened: {0}")]
    FileNotOpen(io::Error),
    #[error("read on end of file")]
    EofReached,
    #[error("failed header parsing: {0}")]
    InvalidHeaderSplit(SplitError),
    #[error("header contains duplicate: {0}")]
    DuplicateHeaderField(BString),
    #[error("header contains empty field")]
    EmptyHeaderField,
    /// `use_fields` referenced a column that is not in the header.
    #[error("header does not contain given field: {0}")]
    UnknownField(BString),
    #[error("given field used multiple times: {0}")]
    FieldUsedMultipleTimes(BString),
    #[error("received invalid argument for 'use_fields'")]
    EmptyFieldList,
    /// The header API was used while `IgnoreHeader` is active.
    #[error("cannot use this method when 'ignore_header' is defined")]
    IgnoredHeader,
    #[error("invalid number of columns, expected: {expected}, got: {actual}")]
    InvalidNumberOfColumns { expected: usize, actual: usize },
    #[error("number of arguments does not match mapping, expected: {mapping}, got: {arguments}")]
    IncompatibleMapping { mapping: usize, arguments: usize },
    /// Columns are reported one-based.
    #[error("invalid conversion for parameter at column {column}: '{raw}'")]
    InvalidConversion { column: usize, raw: BString },
    #[error("{reason} at column {column}: '{raw}'")]
    ValidationFailed {
        reason: &'static str,
        column: usize,
        raw: BString,
    },
    #[error("multiline limit reached")]
    MultilineLimitReached,
    /// A composite callback rejected an otherwise valid row.
    #[error("failed check")]
    FailedCheck,
    #[error(transparent)]
    Split(#[from] SplitError),
    #[error(transparent)]
    Options(#[from] OptionsError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    #[inline]
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    #[inline]
    pub fn into_kind(self) -> ErrorKind {
        self.kind
    }

    /// The physical line number the error occurred on, for row-level errors.
    #[inline]
    pub fn line(&self) -> Option<u64> {
        self.line
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{} {}: {}", self.source_name, line, self.kind),
            None => write!(f, "{}: {}", self.source_name, self.kind),
        }
    }
}

impl From<FieldError> for ErrorKind {
    fn from(err: FieldError) -> Self {
        match err.kind {
            DecodeError::Conversion => ErrorKind::InvalidConversion {
                column: err.column + 1,
                raw: err.raw,
            },
            DecodeError::Validation(reason) => ErrorKind::ValidationFailed {
                reason,
                column: err.column + 1,
                raw: err.raw,
            },
        }
    }
}

impl From<RowError> for ErrorKind {
    fn from(err: RowError) -> Self {
        match err {
            RowError::Split(err) => ErrorKind::Split(err),
            RowError::MultilineLimitReached => ErrorKind::MultilineLimitReached,
            RowError::Io(err) => ErrorKind::Io(err),
        }
    }
}

/// A streaming parser of delimiter-separated rows.
///
/// Rows are decoded in strict input order as tuples of [`Decode`] types; see
/// [`Parser::next_row`]. The parser prefetches one physical line, so EOF is
/// known before the last row is consumed. It exclusively owns its buffers and
/// byte source and cannot be cloned.
///
/// [`Decode`]: crate::Decode
pub struct Parser<R> {
    source_name: String,
    options: Options,
    reader: Reader<R>,
    raw_header: BString,
    /// Split and validated header fields; empty until first needed.
    header: Vec<BString>,
    /// Projection from logical to physical columns set by
    /// [`Parser::use_fields`], with the header width it was built against.
    mapping: Option<Vec<usize>>,
    header_width: usize,
    /// Why the current row failed to assemble, for composite retries.
    row_bad: Option<RowError>,
    eof: bool,
}

assert_impl_all!(Parser<BufReader<File>>: Send);
// The parser exclusively owns its buffers and source handle.
assert_not_impl_any!(Parser<BufReader<File>>: Clone);

impl Parser<BufReader<File>> {
    /// Opens the file at `path` with the default delimiter and options.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::open_with(path, DEFAULT_DELIMITER, Options::new())
    }

    pub fn open_with<P: AsRef<Path>>(
        path: P,
        delim: &str,
        options: Options,
    ) -> Result<Self, Error> {
        let source_name = path.as_ref().display().to_string();
        let file = File::open(path.as_ref()).map_err(|err| Error {
            source_name: source_name.clone(),
            line: None,
            kind: ErrorKind::FileNotOpen(err),
        })?;
        Self::new(BufReader::new(file), source_name, delim, options)
    }
}

impl<'a> Parser<&'a [u8]> {
    /// Parses a borrowed memory buffer with the default delimiter and
    /// options.
    pub fn from_slice(data: &'a [u8]) -> Result<Self, Error> {
        Self::from_slice_with(data, DEFAULT_DELIMITER, Options::new())
    }

    pub fn from_slice_with(data: &'a [u8], delim: &str, options: Options) -> Result<Self, Error> {
        Self::new(data, BUFFER_SOURCE_NAME.to_owned(), delim, options)
    }
}

impl<R: BufRead> Parser<R> {
    fn new(input: R, source_name: String, delim: &str, options: Options) -> Result<Self, Error> {
        let mut parser = Parser {
            reader: Reader::new(input, delim.as_bytes().to_vec(), &options),
            source_name,
            options,
            raw_header: BString::from(""),
            header: Vec::new(),
            mapping: None,
            header_width: 0,
            row_bad: None,
            eof: false,
        };
        if let Err(err) = parser.options.validate() {
            return Err(parser.error(None, ErrorKind::Options(err)));
        }
        if delim.is_empty() {
            return Err(parser.error(None, ErrorKind::Split(SplitError::EmptyDelimiter)));
        }

        parser.read_line()?;
        if parser.options.flags.contains(ParserFlag::IgnoreHeader) {
            // The header line is dropped entirely.
            if !parser.eof {
                parser.read_line()?;
            }
        } else {
            parser.raw_header = BString::from(&parser.reader.next_buf[..]);
        }
        Ok(parser)
    }

    /// Whether all rows have been consumed.
    #[inline]
    pub fn eof(&self) -> bool {
        self.eof
    }

    /// The physical line number of the most recently returned row, counting
    /// continuation lines. 0 while still on the header line.
    pub fn line(&self) -> u64 {
        self.reader.input.line().saturating_sub(1)
    }

    /// Byte offset at which the most recently read physical line begins.
    pub fn position(&self) -> u64 {
        self.reader.input.line_start()
    }

    /// Reads the next row and decodes it as `T`.
    ///
    /// Errors are local to the row: the failing row is consumed, and the
    /// next call proceeds with the following row. Past the last row, every
    /// call reports [`ErrorKind::EofReached`].
    pub fn next_row<'p, T: FromRow<'p>>(&'p mut self) -> Result<T, Error> {
        let parsed = if self.eof {
            Ok(())
        } else {
            self.reader.parse()
        };
        self.reader.update();
        self.row_bad = parsed.err();

        if let Some(err) = self.row_bad.clone() {
            let line = self.reader.input.line();
            self.read_line()?;
            return Err(self.error(Some(line), err.into()));
        }
        if self.eof {
            // The swap left stale spans from two rows ago paired with a
            // cleared buffer; drop them so a composite retry cannot read
            // out of bounds.
            self.reader.splitter.clear();
            return Err(self.error(None, ErrorKind::EofReached));
        }

        let line = self.reader.input.line();
        self.read_line()?;
        self.convert_current().map_err(|kind| Error {
            source_name: self.source_name.clone(),
            line: Some(line),
            kind,
        })
    }

    /// Reads the next row and decodes it as `T`, then converts it into `U`.
    pub fn next_object<'p, U, T>(&'p mut self) -> Result<U, Error>
    where
        T: FromRow<'p>,
        U: From<T>,
    {
        self.next_row::<T>().map(U::from)
    }

    /// Skips the next row without parsing it. Returns `false` at EOF.
    pub fn skip_row(&mut self) -> Result<bool, Error> {
        self.read_line()?;
        Ok(!self.eof)
    }

    /// A single-pass iterator over rows decoded as `T`, ending at EOF.
    /// Row-level failures are yielded as `Err` and iteration continues.
    pub fn rows<T>(&mut self) -> Rows<'_, R, T>
    where
        T: for<'r> FromRow<'r>,
    {
        Rows {
            parser: self,
            _marker: PhantomData,
        }
    }

    /// Like [`Parser::rows`], but converts each row into `U`.
    pub fn objects<U, T>(&mut self) -> Objects<'_, R, U, T>
    where
        T: for<'r> FromRow<'r>,
        U: From<T>,
    {
        Objects {
            parser: self,
            _marker: PhantomData,
        }
    }

    /// Attempts to decode the next row as `T`, returning a composite that
    /// can retry the same row as other shapes on failure.
    pub fn try_row<T>(&mut self) -> Composite<'_, R, (Option<T>,)>
    where
        T: for<'r> FromRow<'r>,
    {
        self.try_row_with(|_: &T| true)
    }

    /// Like [`Parser::try_row`], with a callback invoked on success; a
    /// `false` return discards the value and fails the attempt.
    pub fn try_row_with<T, F>(&mut self, check: F) -> Composite<'_, R, (Option<T>,)>
    where
        T: for<'r> FromRow<'r>,
        F: FnOnce(&T) -> bool,
    {
        let (value, error) = match self.next_row::<T>() {
            Ok(value) => {
                if check(&value) {
                    (Some(value), None)
                } else {
                    (None, Some(self.error(None, ErrorKind::FailedCheck)))
                }
            }
            Err(err) => (None, Some(err)),
        };
        Composite::new(self, (value,), error)
    }

    /// Attempts to decode the next row as `T` converted into `U`.
    pub fn try_object<U, T>(&mut self) -> Composite<'_, R, (Option<U>,)>
    where
        T: for<'r> FromRow<'r>,
        U: From<T>,
    {
        let (value, error) = match self.next_row::<T>() {
            Ok(value) => (Some(U::from(value)), None),
            Err(err) => (None, Some(err)),
        };
        Composite::new(self, (value,), error)
    }

    /// The raw bytes of the header line.
    pub fn raw_header(&self) -> Result<&BStr, Error> {
        self.assert_header_not_ignored()?;
        Ok(self.raw_header.as_bstr())
    }

    /// The header fields, split with the parser's own matcher configuration
    /// but without multiline continuation.
    pub fn header(&self) -> Result<Vec<BString>, Error> {
        self.assert_header_not_ignored()?;
        let (fields, _) = self.split_header()?;
        Ok(fields)
    }

    /// Whether `field` appears in the header.
    pub fn field_exists<S: AsRef<[u8]>>(&mut self, field: S) -> Result<bool, Error> {
        self.assert_header_not_ignored()?;
        self.cache_header()?;
        Ok(self.header.iter().any(|h| h == field.as_ref()))
    }

    /// Restricts subsequent rows to the named header columns, in the given
    /// order. Rows must still carry the full header width; decoded tuples
    /// take the projected columns. If the parser is still on the header
    /// line, it advances past it so the next row is the first data row.
    pub fn use_fields<I, S>(&mut self, fields: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        self.assert_header_not_ignored()?;
        if !self.eof {
            self.cache_header()?;
        }

        let fields: Vec<BString> = fields
            .into_iter()
            .map(|f| BString::from(f.as_ref()))
            .collect();
        if fields.is_empty() {
            return Err(self.error(None, ErrorKind::EmptyFieldList));
        }

        let mut mapping = Vec::with_capacity(fields.len());
        for field in &fields {
            if fields.iter().filter(|f| *f == field).count() != 1 {
                let kind = ErrorKind::FieldUsedMultipleTimes(field.clone());
                return Err(self.error(None, kind));
            }
            let Some(index) = self.header.iter().position(|h| h == field) else {
                return Err(self.error(None, ErrorKind::UnknownField(field.clone())));
            };
            mapping.push(index);
        }

        self.header_width = self.header.len();
        self.mapping = Some(mapping);
        if self.line() == 0 {
            self.skip_row()?;
        }
        Ok(())
    }

    /// Decodes the current, already split row, applying the column count
    /// policy and the active mapping.
    pub(crate) fn convert_current<'p, T: FromRow<'p>>(&'p self) -> Result<T, ErrorKind> {
        if let Some(err) = self.row_bad.clone() {
            return Err(err.into());
        }

        let spans = self.reader.splitter.spans();
        match &self.mapping {
            None => {
                if T::COLUMNS != spans.len() {
                    return Err(ErrorKind::InvalidNumberOfColumns {
                        expected: T::COLUMNS,
                        actual: spans.len(),
                    });
                }
            }
            Some(mapping) => {
                if T::COLUMNS != mapping.len() {
                    return Err(ErrorKind::IncompatibleMapping {
                        mapping: mapping.len(),
                        arguments: T::COLUMNS,
                    });
                }
                if spans.len() != self.header_width {
                    return Err(ErrorKind::InvalidNumberOfColumns {
                        expected: self.header_width,
                        actual: spans.len(),
                    });
                }
            }
        }

        let row = Row::new(&self.reader.buf, spans, self.mapping.as_deref());
        T::from_row(&row).map_err(ErrorKind::from)
    }

    pub(crate) fn decorate(&self, kind: ErrorKind) -> Error {
        self.error(Some(self.reader.input.line()), kind)
    }

    pub(crate) fn error(&self, line: Option<u64>, kind: ErrorKind) -> Error {
        Error {
            source_name: self.source_name.clone(),
            line,
            kind,
        }
    }

    fn read_line(&mut self) -> Result<(), Error> {
        match self.reader.read_next() {
            Ok(more) => {
                self.eof = !more;
                Ok(())
            }
            Err(err) => {
                // Treat the source as exhausted so iteration terminates.
                self.eof = true;
                Err(self.error(None, ErrorKind::Io(err)))
            }
        }
    }

    fn assert_header_not_ignored(&self) -> Result<(), Error> {
        if self.options.flags.contains(ParserFlag::IgnoreHeader) {
            return Err(self.error(None, ErrorKind::IgnoredHeader));
        }
        Ok(())
    }

    /// Splits a copy of the raw header. Returns the fields and the index of
    /// the first empty or duplicate one, if any.
    fn split_header(&self) -> Result<(Vec<BString>, Option<usize>), Error> {
        let mut splitter = Splitter::new(&self.options, false);
        let mut buf = self.raw_header.to_vec();
        splitter
            .split(&mut buf, self.reader.delim())
            .map_err(|err| self.error(None, ErrorKind::InvalidHeaderSplit(err)))?;

        let mut fields = Vec::with_capacity(splitter.spans().len());
        let mut invalid = None;
        for (i, span) in splitter.spans().iter().enumerate() {
            let field = BString::from(span.slice(&buf));
            if invalid.is_none() && (field.is_empty() || fields.contains(&field)) {
                invalid = Some(i);
            }
            fields.push(field);
        }
        Ok((fields, invalid))
    }

    /// Splits and validates the header into `self.header`, once.
    fn cache_header(&mut self) -> Result<(), Error> {
        if !self.header.is_empty() {
            return Ok(());
        }
        let (fields, invalid) = self.split_header()?;
        if let Some(i) = invalid {
            let kind = if fields[i].is_empty() {
                ErrorKind::EmptyHeaderField
            } else {
                ErrorKind::DuplicateHeaderField(fields[i].clone())
            };
            return Err(self.error(None, kind));
        }
        self.header = fields;
        Ok(())
    }
}

impl<R: Debug> Debug for Parser<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("source_name", &self.source_name)
            .field("raw_header", &self.raw_header)
            .field("mapping", &self.mapping)
            .field("line", &self.reader.input.line())
            .field("eof", &self.eof)
            .finish()
    }
}

/// A single-pass iterator over rows decoded as `T`. See [`Parser::rows`].
pub struct Rows<'p, R, T> {
    parser: &'p mut Parser<R>,
    _marker: PhantomData<fn() -> T>,
}

impl<R: BufRead, T: for<'r> FromRow<'r>> Iterator for Rows<'_, R, T> {
    type Item = Result<T, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.parser.eof() {
            return None;
        }
        Some(self.parser.next_row())
    }
}

/// A single-pass iterator converting each row into `U`. See
/// [`Parser::objects`].
pub struct Objects<'p, R, U, T> {
    parser: &'p mut Parser<R>,
    _marker: PhantomData<fn() -> (U, T)>,
}

impl<R: BufRead, U: From<T>, T: for<'r> FromRow<'r>> Iterator for Objects<'_, R, U, T> {
    type Item = Result<U, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.parser.eof() {
            return None;
        }
        Some(self.parser.next_object::<U, T>())
    }
}
