//! Schema-less view of a payload.
//!
//! Every frame names its category and type, so any payload can be walked
//! without knowing the Rust types that wrote it. Unknown fields are skipped
//! this way, and tools use it to inspect stored records.

use serde::Serialize;

use crate::decoder::Decoder;
use crate::error::CodecResult;
use crate::wire::{Category, FrameHeader, Tag, END_MARKER};

/// A decoded frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Value {
    Null,
    Text {
        type_name: String,
        text: String,
    },
    Enum {
        type_name: String,
        variant: String,
    },
    Array {
        type_name: String,
        items: Vec<Value>,
    },
    List {
        type_name: String,
        items: Vec<Value>,
    },
    Record {
        type_name: String,
        fields: Vec<(String, Value)>,
        /// The input ended before the record's end marker.
        truncated: bool,
    },
    /// First occurrence of a shared node.
    Shared { id: u32, value: Box<Value> },
    /// Later occurrence of shared node `id`.
    BackRef { id: u32 },
}

impl Value {
    /// Stored type name, looking through shared nodes.
    pub fn type_name(&self) -> Option<&str> {
        match self {
            Self::Text { type_name, .. }
            | Self::Enum { type_name, .. }
            | Self::Array { type_name, .. }
            | Self::List { type_name, .. }
            | Self::Record { type_name, .. } => Some(type_name),
            Self::Shared { value, .. } => value.type_name(),
            Self::Null | Self::BackRef { .. } => None,
        }
    }

    /// First field called `name`, if this is a record.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Record { fields, .. } => fields
                .iter()
                .find(|(field, _)| field == name)
                .map(|(_, value)| value),
            Self::Shared { value, .. } => value.field(name),
            _ => None,
        }
    }

    /// Text payload of a primitive or the variant name of an enum.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text, .. } => Some(text),
            Self::Enum { variant, .. } => Some(variant),
            Self::Shared { value, .. } => value.as_text(),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

pub(crate) fn read_value(dec: &mut Decoder<'_>) -> CodecResult<Value> {
    dec.enter()?;
    let result = read_frame(dec);
    dec.leave();
    result
}

fn read_frame(dec: &mut Decoder<'_>) -> CodecResult<Value> {
    match dec.read_tag()? {
        Tag::Null => Ok(Value::Null),
        Tag::Value => {
            let header = dec.read_header()?;
            read_body_value(dec, header)
        }
        Tag::Shared => {
            let id = dec.read_shared_id()?;
            let header = dec.read_header()?;
            let value = read_body_value(dec, header)?;
            Ok(Value::Shared {
                id,
                value: Box::new(value),
            })
        }
        Tag::BackRef => Ok(Value::BackRef {
            id: dec.read_shared_id()?,
        }),
    }
}

/// Read a body whose header has already been consumed.
pub(crate) fn read_body_value(dec: &mut Decoder<'_>, header: FrameHeader) -> CodecResult<Value> {
    let FrameHeader {
        category,
        type_name,
    } = header;
    let value = match category {
        Category::Text => Value::Text {
            type_name,
            text: dec.read_str()?,
        },
        Category::Enum => Value::Enum {
            type_name,
            variant: dec.read_str()?,
        },
        Category::Array | Category::List => {
            let count = dec.read_count()?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(read_value(dec)?);
            }
            if category == Category::Array {
                Value::Array { type_name, items }
            } else {
                Value::List { type_name, items }
            }
        }
        Category::Record => {
            let (fields, truncated) = read_fields(dec)?;
            Value::Record {
                type_name,
                fields,
                truncated,
            }
        }
    };
    Ok(value)
}

fn read_fields(dec: &mut Decoder<'_>) -> CodecResult<(Vec<(String, Value)>, bool)> {
    let mut fields = Vec::new();
    loop {
        if dec.is_at_end() {
            return Ok((fields, true));
        }
        let name = match dec.read_str() {
            Ok(name) => name,
            Err(e) if e.is_eof() => return Ok((fields, true)),
            Err(e) => return Err(e),
        };
        if name == END_MARKER {
            return Ok((fields, false));
        }
        match read_value(dec) {
            Ok(value) => fields.push((name, value)),
            Err(e) if e.is_eof() => return Ok((fields, true)),
            Err(e) => return Err(e),
        }
    }
}
