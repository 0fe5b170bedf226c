//! Typed payload decoders
//!
//! Each decoder is handed the exact payload bytes of a request and either
//! produces a typed [`Value`] or a [`DecodeError`]. Numeric decoders refuse
//! buffers longer than the longest literal they accept before looking at the
//! content.

use std::borrow::Cow;

use thiserror::Error;

use super::models::{Value, ValueKind};

/// Longest accepted textual float64 literal
pub const FLOAT64_STR_MAXLEN: usize = 24;
/// Longest accepted textual int32 literal ("-2147483648")
pub const INT32_STR_MAXLEN: usize = 11;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid {kind} of len {len}; too long")]
    TooLong { kind: ValueKind, len: usize },
    #[error("invalid {kind} of len {len}")]
    Invalid { kind: ValueKind, len: usize },
    #[error("{kind} out of range")]
    OutOfRange { kind: ValueKind },
}

/// The decoders wired up for declared resource kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decoder {
    Float64,
    Int32,
    String,
}

impl Decoder {
    /// Selects the decoder for a declared kind, or `None` for kinds that
    /// have no decoder yet.
    pub fn for_kind(kind: ValueKind) -> Option<Decoder> {
        match kind {
            ValueKind::Float64 => Some(Decoder::Float64),
            ValueKind::Int32 => Some(Decoder::Int32),
            ValueKind::String => Some(Decoder::String),
            ValueKind::Bool
            | ValueKind::Uint8
            | ValueKind::Uint16
            | ValueKind::Uint32
            | ValueKind::Uint64
            | ValueKind::Int8
            | ValueKind::Int16
            | ValueKind::Int64
            | ValueKind::Float32
            | ValueKind::Binary => None,
        }
    }

    pub fn decode(&self, data: &[u8]) -> Result<Value, DecodeError> {
        match self {
            Decoder::Float64 => read_float64(data).map(Value::Float64),
            Decoder::Int32 => read_int32(data).map(Value::Int32),
            Decoder::String => Ok(Value::String(read_string(data))),
        }
    }
}

/// Parse a complete decimal floating-point literal.
pub fn read_float64(data: &[u8]) -> Result<f64, DecodeError> {
    let kind = ValueKind::Float64;
    let len = data.len();
    if len > FLOAT64_STR_MAXLEN {
        return Err(DecodeError::TooLong { kind, len });
    }
    let text = numeric_text(data).ok_or(DecodeError::Invalid { kind, len })?;

    // Restrict to decimal notation; this keeps "inf" and "nan" out.
    if !text
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
    {
        return Err(DecodeError::Invalid { kind, len });
    }
    let value = text
        .parse::<f64>()
        .map_err(|_| DecodeError::Invalid { kind, len })?;

    if value.is_infinite() {
        return Err(DecodeError::OutOfRange { kind });
    }
    if (value == 0.0 && has_nonzero_mantissa(text)) || value.is_subnormal() {
        return Err(DecodeError::OutOfRange { kind });
    }
    Ok(value)
}

/// Parse a complete base-10 integer that fits in an `i32`.
pub fn read_int32(data: &[u8]) -> Result<i32, DecodeError> {
    let kind = ValueKind::Int32;
    let len = data.len();
    if len > INT32_STR_MAXLEN {
        return Err(DecodeError::TooLong { kind, len });
    }
    let text = numeric_text(data).ok_or(DecodeError::Invalid { kind, len })?;

    let wide = text
        .parse::<i64>()
        .map_err(|_| DecodeError::Invalid { kind, len })?;
    i32::try_from(wide).map_err(|_| DecodeError::OutOfRange { kind })
}

/// Copy the payload into an owned string. Never fails; invalid UTF-8
/// sequences are replaced with U+FFFD.
pub fn read_string(data: &[u8]) -> String {
    let text = String::from_utf8_lossy(data);
    if let Cow::Owned(_) = text {
        log::debug!("replaced invalid UTF-8 in string of len {}", data.len());
    }
    text.into_owned()
}

// Leading whitespace is skipped the way C's strtod/strtol do; trailing
// whitespace is left in place and fails the parse.
fn numeric_text(data: &[u8]) -> Option<&str> {
    std::str::from_utf8(data)
        .ok()
        .map(|s| s.trim_start_matches(is_c_space))
}

// isspace() in the C locale, which also counts vertical tab
fn is_c_space(c: char) -> bool {
    c.is_ascii_whitespace() || c == '\x0B'
}

fn has_nonzero_mantissa(text: &str) -> bool {
    text.split(['e', 'E'])
        .next()
        .is_some_and(|mantissa| mantissa.bytes().any(|b| matches!(b, b'1'..=b'9')))
}
