use std::fmt;

use serde::Serialize;

/// What kind of degradation a [`CodecWarning`] records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// A field accessor failed during encoding; the field was written as null.
    FieldEncodeFailed,
    /// A field could not be decoded; it keeps its default value.
    FieldSkipped,
    /// The payload named a field the type does not declare; its value was discarded.
    UnknownField,
    /// The payload carried a value for a read-only field; it was discarded.
    ReadOnlyField,
    /// The stored type name did not resolve; the expected type was used instead.
    TypeFallback,
    /// The input ended before a record's end marker.
    Truncated,
    /// A null element inside a non-nullable sequence was dropped.
    NullElement,
    /// A shared-node frame was decoded into an owned value.
    UnexpectedShared,
    /// Bytes remained after the root frame.
    TrailingBytes,
}

/// A non-fatal problem recorded while encoding or decoding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CodecWarning {
    pub kind: WarningKind,
    /// Dotted field path from the root (empty for the root itself).
    pub path: String,
    pub message: String,
}

impl fmt::Display for CodecWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Output of a successful encode: the bytes plus any swallowed field failures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub warnings: Vec<CodecWarning>,
}

impl Encoded {
    /// Returns `true` if every field encoded without failure.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Output of a successful decode: the best-effort value plus warnings.
#[derive(Clone, Debug, PartialEq)]
pub struct Decoded<T> {
    pub value: T,
    pub warnings: Vec<CodecWarning>,
}

impl<T> Decoded<T> {
    /// Returns `true` if the payload decoded without any degradation.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Discard the warnings.
    pub fn into_value(self) -> T {
        self.value
    }

    /// Returns `true` if any warning of `kind` was recorded.
    pub fn has_warning(&self, kind: WarningKind) -> bool {
        self.warnings.iter().any(|w| w.kind == kind)
    }
}

/// Field path stack used to label warnings.
#[derive(Debug, Default)]
pub(crate) struct Trail {
    segments: Vec<String>,
    warnings: Vec<CodecWarning>,
}

impl Trail {
    pub(crate) fn push(&mut self, segment: &str) {
        self.segments.push(segment.to_string());
    }

    pub(crate) fn pop(&mut self) {
        self.segments.pop();
    }

    pub(crate) fn warn(&mut self, kind: WarningKind, message: String) {
        self.warnings.push(CodecWarning {
            kind,
            path: self.segments.join("."),
            message,
        });
    }

    pub(crate) fn into_warnings(self) -> Vec<CodecWarning> {
        self.warnings
    }
}
