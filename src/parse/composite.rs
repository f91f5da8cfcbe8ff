// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of ssv-rust, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

use std::io::BufRead;

use crate::parse::{row::FromRow, Error, ErrorKind, Parser};

/// Appends an element to a tuple at the type level.
pub trait Push: Sized {
    type Output<T>;

    fn push<T>(self, value: T) -> Self::Output<T>;
}

macro_rules! impl_push(($(($($V:ident $idx:tt),*))+) => {$(
    impl<$($V),*> Push for ($($V,)*) {
        type Output<T> = ($($V,)* T,);

        #[inline]
        fn push<T>(self, value: T) -> Self::Output<T> {
            ($(self.$idx,)* value,)
        }
    }
)+});

impl_push! {
    ()
    (A 0)
    (A 0, B 1)
    (A 0, B 1, C 2)
    (A 0, B 1, C 2, D 3)
    (A 0, B 1, C 2, D 3, E 4)
    (A 0, B 1, C 2, D 3, E 4, F 5)
    (A 0, B 1, C 2, D 3, E 4, F 5, G 6)
}

/// The result of attempting one row as several alternative shapes.
///
/// Built by [`Parser::try_row`]; each [`Composite::or_else`] retries the
/// *same* row as another shape, only when every prior attempt failed. The
/// accumulated value is a tuple with one `Option` per attempt: on overall
/// success exactly one is present, on overall failure all are absent and
/// [`Composite::on_error`] exposes the last error.
#[must_use]
pub struct Composite<'p, R, V> {
    parser: &'p mut Parser<R>,
    values: V,
    error: Option<Error>,
}

impl<'p, R: BufRead, V> Composite<'p, R, V> {
    pub(crate) fn new(parser: &'p mut Parser<R>, values: V, error: Option<Error>) -> Self {
        Composite {
            parser,
            values,
            error,
        }
    }

    /// Retries the current row decoded as `T`, if every prior attempt
    /// failed.
    pub fn or_else<T>(self) -> Composite<'p, R, V::Output<Option<T>>>
    where
        V: Push,
        T: for<'r> FromRow<'r>,
    {
        self.or_else_with(|_: &T| true)
    }

    /// Like [`Composite::or_else`], with a callback invoked on a successful
    /// decode; a `false` return discards the value and fails the attempt,
    /// so the next alternative runs.
    pub fn or_else_with<T, F>(self, check: F) -> Composite<'p, R, V::Output<Option<T>>>
    where
        V: Push,
        T: for<'r> FromRow<'r>,
        F: FnOnce(&T) -> bool,
    {
        let (value, error) = match self.error {
            None => (None, None),
            Some(_) => match self.parser.convert_current::<T>() {
                Ok(value) => {
                    if check(&value) {
                        (Some(value), None)
                    } else {
                        (None, Some(self.parser.error(None, ErrorKind::FailedCheck)))
                    }
                }
                Err(kind) => (None, Some(self.parser.decorate(kind))),
            },
        };
        Composite {
            values: self.values.push(value),
            parser: self.parser,
            error,
        }
    }

    /// Like [`Composite::or_else`], but converts the decoded tuple into `U`.
    pub fn or_object<U, T>(self) -> Composite<'p, R, V::Output<Option<U>>>
    where
        V: Push,
        T: for<'r> FromRow<'r>,
        U: From<T>,
    {
        self.or_object_with::<U, T, _>(|_| true)
    }

    /// Like [`Composite::or_object`], with a callback invoked on the
    /// converted value; a `false` return discards it and fails the attempt.
    pub fn or_object_with<U, T, F>(self, check: F) -> Composite<'p, R, V::Output<Option<U>>>
    where
        V: Push,
        T: for<'r> FromRow<'r>,
        U: From<T>,
        F: FnOnce(&U) -> bool,
    {
        let (value, error) = match self.error {
            None => (None, None),
            Some(_) => match self.parser.convert_current::<T>() {
                Ok(value) => {
                    let value = U::from(value);
                    if check(&value) {
                        (Some(value), None)
                    } else {
                        (None, Some(self.parser.error(None, ErrorKind::FailedCheck)))
                    }
                }
                Err(kind) => (None, Some(self.parser.decorate(kind))),
            },
        };
        Composite {
            values: self.values.push(value),
            parser: self.parser,
            error,
        }
    }

    /// Invokes `handler` if every attempt so far has failed.
    pub fn on_error<F: FnOnce(&Error)>(self, handler: F) -> Self {
        if let Some(err) = &self.error {
            handler(err);
        }
        self
    }

    /// Finalizes to the tuple of per-attempt options.
    pub fn values(self) -> V {
        self.values
    }
}
