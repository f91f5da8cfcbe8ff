// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of ssv-rust, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

mod composite;
mod input;
mod parser;
mod reader;
mod row;
mod span;
mod splitter;

pub use composite::*;
pub use parser::*;
pub use row::{FieldError, FromRow, Row};
pub use span::Span;
pub use splitter::SplitError;

pub(self) use input::*;
pub(self) use splitter::Splitter;
