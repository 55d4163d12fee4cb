//! Frame layout shared by the encoder and decoder.
//!
//! ```text
//! frame    := NULL | VALUE header body | SHARED id header body | BACKREF id
//! header   := category:u8 type_name:string
//! body     := text:string                      (text)
//!           | variant:string                   (enum)
//!           | count:varint frame*count         (array, list)
//!           | (name:string frame)* "END"       (record)
//! string   := len:varint utf8-bytes
//! ```
//!
//! Integers are LEB128 varints.

use std::fmt;

use serde::Serialize;

use crate::error::{CodecError, CodecResult};

/// Name written in place of a field name to close a record.
pub const END_MARKER: &str = "END";

/// Maximum frame nesting accepted by the encoder and decoder.
pub const MAX_DEPTH: usize = 256;

/// Leading byte of every frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Absent value.
    Null,
    /// Owned value: header and body follow.
    Value,
    /// First occurrence of a shared node: id, header and body follow.
    Shared,
    /// Repeat occurrence of a shared node: only the id follows.
    BackRef,
}

impl Tag {
    /// Wire byte for this tag.
    pub fn type_byte(self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Value => 1,
            Self::Shared => 2,
            Self::BackRef => 3,
        }
    }

    /// Parse a wire byte.
    pub fn from_type_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Null),
            1 => Some(Self::Value),
            2 => Some(Self::Shared),
            3 => Some(Self::BackRef),
            _ => None,
        }
    }
}

/// Shape of a frame body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Primitive rendered as locale-invariant text.
    Text,
    /// Symbolic enum variant name.
    Enum,
    /// Fixed-size sequence.
    Array,
    /// Variable-size ordered collection.
    List,
    /// Named fields closed by [`END_MARKER`].
    Record,
}

impl Category {
    /// Wire byte for this category.
    pub fn type_byte(self) -> u8 {
        match self {
            Self::Text => 0,
            Self::Enum => 1,
            Self::Array => 2,
            Self::List => 3,
            Self::Record => 4,
        }
    }

    /// Parse a wire byte.
    pub fn from_type_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Text),
            1 => Some(Self::Enum),
            2 => Some(Self::Array),
            3 => Some(Self::List),
            4 => Some(Self::Record),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Enum => write!(f, "enum"),
            Self::Array => write!(f, "array"),
            Self::List => write!(f, "list"),
            Self::Record => write!(f, "record"),
        }
    }
}

/// Type descriptor read from a frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    pub category: Category,
    pub type_name: String,
}

/// Encode a u64 as a variable-length integer.
pub(crate) fn encode_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value > 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Decode a variable-length integer starting at `data[0]`, where `data`
/// begins at absolute `offset`. Returns (value, bytes_consumed).
pub(crate) fn decode_varint(data: &[u8], offset: usize) -> CodecResult<(u64, usize)> {
    let mut value: u64 = 0;
    let mut shift = 0;
    for (i, &byte) in data.iter().enumerate() {
        if shift >= 64 {
            return Err(CodecError::VarintOverflow { offset });
        }
        value |= ((byte & 0x7F) as u64) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(CodecError::UnexpectedEof {
        offset: offset + data.len(),
    })
}
