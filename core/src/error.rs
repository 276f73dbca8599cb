//! This module aggregates errors that may emerge from the library.
use std::num::{ParseFloatError, ParseIntError};
use std::result;

use snafu::{Backtrace, Snafu};

use crate::header::Tag;
use crate::value::ValueType;

/// Type alias for a result from this library.
pub type Result<T, E = Error> = result::Result<T, E>;

/// The main data type for errors in the library.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// Raised when the obtained data element was not the one expected.
    #[snafu(display("Unexpected DICOM tag {}", tag))]
    UnexpectedTag { tag: Tag, backtrace: Backtrace },

    /// Raised when the obtained length is inconsistent.
    #[snafu(display("Inconsistent data value length in data element"))]
    UnexpectedDataValueLength { backtrace: Backtrace },

    /// Error related to an invalid value read.
    #[snafu(display("Invalid value read: {}", source))]
    ReadValue {
        source: InvalidValueReadError,
        backtrace: Backtrace,
    },

    /// A failed attempt to cast a value to an inappropriate format.
    #[snafu(display("Failed value cast: {}", source))]
    CastValue {
        source: CastValueError,
        backtrace: Backtrace,
    },
}

/// Triggered when a value parsing attempt fails.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum InvalidValueReadError {
    /// The value cannot be read as a primitive value.
    #[snafu(display("attempted to retrieve complex value as primitive"))]
    NonPrimitiveType { backtrace: Backtrace },

    /// The value's effective length cannot be resolved.
    #[snafu(display("value length could not be resolved"))]
    UnresolvedValueLength { backtrace: Backtrace },

    /// The value does not have the expected format.
    #[snafu(display("invalid token: expected {} but got {:?}", expected, got))]
    InvalidToken {
        got: u8,
        expected: &'static str,
        backtrace: Backtrace,
    },

    /// The value does not have the expected length.
    #[snafu(display("invalid length: expected {} but got {}", expected, got))]
    InvalidLength {
        got: usize,
        expected: &'static str,
        backtrace: Backtrace,
    },

    /// Invalid date or time component.
    #[snafu(display("invalid date/time component: expected {} but got {}", expected, got))]
    ParseDateTime {
        got: u32,
        expected: &'static str,
        backtrace: Backtrace,
    },

    /// Invalid or ambiguous combination of date with time.
    #[snafu(display("invalid or ambiguous combination of date with time"))]
    DateTimeZone { backtrace: Backtrace },

    /// chrono error when parsing a date or time.
    #[snafu(display("failed to parse date/time: {}", source))]
    Chrono {
        source: chrono::ParseError,
        backtrace: Backtrace,
    },

    /// The value cannot be parsed to a floating point number.
    #[snafu(display("failed to parse text value as a floating point number: {}", source))]
    ParseFloat {
        source: ParseFloatError,
        backtrace: Backtrace,
    },

    /// The value cannot be parsed to an integer.
    #[snafu(display("failed to parse text value as an integer: {}", source))]
    ParseInteger {
        source: ParseIntError,
        backtrace: Backtrace,
    },

    /// An attempt of reading more than the number of bytes in the length
    /// attribute was made.
    #[snafu(display("unexpected end of element"))]
    UnexpectedEndOfElement { backtrace: Backtrace },
}

/// An error during an attempt to convert (parse) a primitive value into
/// a richer, specific type (such as a date or a tag).
#[derive(Debug, Snafu)]
#[snafu(display("could not convert {} value into {}", original, requested))]
pub struct ConvertValueError {
    /// The value format requested
    pub requested: &'static str,
    /// The value's actual representation
    pub original: ValueType,
    /// the specific cause of the conversion failure, if known
    pub cause: Option<crate::value::deserialize::Error>,
}

/// An error type for an attempt of accessing a value
/// in an inappropriate format.
#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(display("bad value cast: requested {} but value is {:?}", requested, got))]
pub struct CastValueError {
    /// The value format requested
    pub requested: &'static str,
    /// The value's actual representation
    pub got: ValueType,
}
