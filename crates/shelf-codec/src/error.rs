use crate::wire::{Category, Tag};

/// Errors from encoding or decoding an object graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The input ended in the middle of a frame.
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEof { offset: usize },

    /// A frame started with a byte that is not a known tag.
    #[error("invalid frame tag {tag:#04x} at offset {offset}")]
    InvalidTag { tag: u8, offset: usize },

    /// A frame header carried an unknown category byte.
    #[error("invalid category byte {byte:#04x} at offset {offset}")]
    InvalidCategory { byte: u8, offset: usize },

    /// A length-prefixed string was not valid UTF-8.
    #[error("invalid UTF-8 string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    /// A varint ran past 64 bits.
    #[error("varint overflow at offset {offset}")]
    VarintOverflow { offset: usize },

    /// A shared-node id does not fit in 32 bits.
    #[error("shared id {id} at offset {offset} is out of range")]
    InvalidSharedId { id: u64, offset: usize },

    /// Text payload could not be parsed as the expected primitive.
    #[error("cannot parse {text:?} as {type_name}: {reason}")]
    Parse {
        type_name: String,
        text: String,
        reason: String,
    },

    /// Enum payload named a variant the type does not have.
    #[error("unknown variant {variant:?} for enum {type_name}")]
    UnknownVariant { type_name: String, variant: String },

    /// The stored frame is of a different shape than the expected type.
    #[error("expected {expected} frame for {type_name}, found {found} frame of {stored}")]
    CategoryMismatch {
        type_name: String,
        expected: Category,
        found: Category,
        stored: String,
    },

    /// The root frame of a payload is null.
    #[error("root frame of {type_name} is null")]
    NullRoot { type_name: String },

    /// A back-reference named a shared id that was never defined.
    #[error("back-reference to unknown shared id {0}")]
    DanglingBackRef(u32),

    /// A back-reference resolved to a node of another type.
    #[error("shared id {id} does not hold a {expected}")]
    SharedTypeMismatch { id: u32, expected: String },

    /// A frame tag that the expected type cannot accept (e.g. a back-reference
    /// where an owned value is required).
    #[error("unexpected {tag:?} frame for {type_name}")]
    UnexpectedTag { tag: Tag, type_name: String },

    /// A fixed-size array payload had the wrong number of elements.
    #[error("array {type_name} expects {expected} elements, found {found}")]
    ArrayLength {
        type_name: String,
        expected: usize,
        found: usize,
    },

    /// A shared node could not be borrowed because it is mutably borrowed.
    #[error("shared {type_name} is already mutably borrowed")]
    Borrow { type_name: String },

    /// A field accessor reported a failure.
    #[error("field {field}: {reason}")]
    Field { field: String, reason: String },

    /// Nesting exceeded the configured limit.
    #[error("nesting exceeds maximum depth of {max}")]
    DepthExceeded { max: usize },
}

impl CodecError {
    /// Returns `true` if the input ran out mid-frame.
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::UnexpectedEof { .. })
    }

    /// Returns `true` if the error concerns the content of one frame rather
    /// than the byte stream, so the enclosing record can skip that field.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. }
                | Self::UnknownVariant { .. }
                | Self::CategoryMismatch { .. }
                | Self::DanglingBackRef(_)
                | Self::SharedTypeMismatch { .. }
                | Self::UnexpectedTag { .. }
                | Self::ArrayLength { .. }
                | Self::Field { .. }
        )
    }
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
