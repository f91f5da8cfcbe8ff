// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of ssv-rust, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

//! Library for reading delimiter-separated values as typed rows, built
//! around a streaming splitter that tokenizes each row in place.

mod decode;
pub mod options;
pub mod parse;
mod restrict;

pub use decode::{Decode, DecodeError, Ignored};
pub use options::{Options, OptionsError, ParserFlag};
pub use parse::{Composite, Error, ErrorKind, FieldError, FromRow, Parser, Row, SplitError};
pub use restrict::{
    GreaterOrEqual, GreaterThan, InRange, LessOrEqual, LessThan, NonEmpty, OutOfRange, Valid,
    Validate,
};
