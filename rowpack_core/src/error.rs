use thiserror::Error;

use crate::type_codec::TypeCodec;

/// Failures raised by cursors, codecs, the CSV tokenizer and row layout.
///
/// File-level plumbing (writer, reader, block codecs) reports through
/// `anyhow`; everything below it reports one of these so callers can match
/// on the failure kind.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// `get()` past the window limit.
    #[error("read past limit (pos {pos}, limit {limit})")]
    OutOfRange { pos: usize, limit: usize },

    #[error("cursor underflow: position is already 0")]
    Underflow,

    #[error("cursor overflow: position {pos} is at the limit")]
    Overflow { pos: usize },

    #[error("invalid boolean: {0:?}")]
    InvalidBoolean(String),

    #[error("malformed number {text:?}: {reason}")]
    MalformedNumber { text: String, reason: &'static str },

    /// A CSV data line does not have as many fields as the header.
    #[error("row {row} at byte {offset} has {found} fields, expected {expected}")]
    ColumnCountMismatch {
        row: usize,
        offset: i64,
        expected: usize,
        found: usize,
    },

    #[error("cannot pack {width_a}+{width_b} bits into a 64-bit word")]
    TooWide { width_a: u32, width_b: u32 },

    #[error("internal invariant violated: {0}")]
    AssertionViolated(String),

    #[error("{codec} needs {expected} bytes, got {found}")]
    ShortBuffer {
        codec: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("{codec} cannot encode a {found} value")]
    TypeMismatch {
        codec: TypeCodec,
        found: &'static str,
    },

    #[error("invalid UTF-8 sequence at byte {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("U+{code_point:X} is outside the Basic Multilingual Plane")]
    NonBmp { code_point: u32 },

    #[error("invalid {kind}: {text:?}")]
    InvalidTemporal { kind: &'static str, text: String },

    #[error("unknown type codec {0:?}")]
    UnknownCodec(String),

    #[error("no column named {0:?}")]
    UnknownColumn(String),

    #[error("column index {index} out of range for {width} columns")]
    ColumnIndex { index: usize, width: usize },

    #[error("row index {index} out of range for {rows} rows")]
    RowIndex { index: usize, rows: usize },

    #[error("column {name:?} encodes to {needed} bytes but its slot holds {slot}")]
    SlotOverflow {
        name: String,
        needed: usize,
        slot: usize,
    },

    #[error("column {0:?} has no binary position")]
    Unpositioned(String),

    #[error("invalid descriptor for column {name:?}: {reason}")]
    InvalidDescriptor { name: String, reason: String },

    /// Any failure while converting one cell, tagged with where it happened.
    #[error("row {row}, column {column} ({name:?}), bytes {begin}..{end}: {source}")]
    Cell {
        row: usize,
        column: usize,
        name: String,
        begin: i64,
        end: i64,
        #[source]
        source: Box<Error>,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn malformed(text: &[char], reason: &'static str) -> Self {
        Error::MalformedNumber {
            text: text.iter().collect(),
            reason,
        }
    }
}
