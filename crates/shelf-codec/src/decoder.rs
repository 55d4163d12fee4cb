use std::any::Any;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{CodecError, CodecResult};
use crate::persist::Persist;
use crate::report::{Decoded, Trail, WarningKind};
use crate::value::{read_body_value, read_value, Value};
use crate::wire::{decode_varint, Category, FrameHeader, Tag, MAX_DEPTH};

/// Reads frames from a byte slice.
///
/// One decoder is used per top-level decode call. Its arena holds every
/// shared node constructed so far, keyed by the id the encoder assigned, so
/// back-references (including cyclic ones) resolve to the same `Rc`.
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
    depth: usize,
    arena: HashMap<u32, Rc<dyn Any>>,
    trail: Trail,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            depth: 0,
            arena: HashMap::new(),
            trail: Trail::default(),
        }
    }

    /// Current read offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Read one frame as `T`. `Ok(None)` means the frame was null.
    pub fn read<T: Persist>(&mut self) -> CodecResult<Option<T>> {
        self.enter()?;
        let result = T::decode_frame(self);
        self.leave();
        result
    }

    /// Read and discard one frame of any shape.
    pub fn skip_frame(&mut self) -> CodecResult<()> {
        read_value(self).map(drop)
    }

    /// Read one frame schema-lessly.
    pub fn read_value(&mut self) -> CodecResult<Value> {
        read_value(self)
    }

    pub fn read_byte(&mut self) -> CodecResult<u8> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or(CodecError::UnexpectedEof { offset: self.pos })?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_tag(&mut self) -> CodecResult<Tag> {
        let offset = self.pos;
        let byte = self.read_byte()?;
        Tag::from_type_byte(byte).ok_or(CodecError::InvalidTag { tag: byte, offset })
    }

    pub fn read_header(&mut self) -> CodecResult<FrameHeader> {
        let offset = self.pos;
        let byte = self.read_byte()?;
        let category =
            Category::from_type_byte(byte).ok_or(CodecError::InvalidCategory { byte, offset })?;
        let type_name = self.read_str()?;
        Ok(FrameHeader {
            category,
            type_name,
        })
    }

    pub fn read_varint(&mut self) -> CodecResult<u64> {
        let (value, consumed) = decode_varint(&self.data[self.pos..], self.pos)?;
        self.pos += consumed;
        Ok(value)
    }

    /// Read an element count. Every element occupies at least one byte, so a
    /// count larger than the remaining input means the payload is truncated.
    pub fn read_count(&mut self) -> CodecResult<usize> {
        let count = self.read_varint()?;
        if count > self.remaining() as u64 {
            return Err(CodecError::UnexpectedEof {
                offset: self.data.len(),
            });
        }
        Ok(count as usize)
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn read_str(&mut self) -> CodecResult<String> {
        let len = self.read_varint()?;
        if len > self.remaining() as u64 {
            return Err(CodecError::UnexpectedEof {
                offset: self.data.len(),
            });
        }
        let start = self.pos;
        let end = start + len as usize;
        self.pos = end;
        String::from_utf8(self.data[start..end].to_vec())
            .map_err(|_| CodecError::InvalidUtf8 { offset: start })
    }

    /// Move the read offset back to an earlier position.
    pub(crate) fn rewind(&mut self, pos: usize) {
        debug_assert!(pos <= self.pos);
        self.pos = pos;
    }

    pub(crate) fn read_shared_id(&mut self) -> CodecResult<u32> {
        let offset = self.pos;
        let id = self.read_varint()?;
        u32::try_from(id).map_err(|_| CodecError::InvalidSharedId { id, offset })
    }

    /// Decode the body of a frame whose header was already read, checking
    /// the stored descriptor against `T`.
    ///
    /// A category mismatch consumes the body before failing, so the error is
    /// recoverable. A name mismatch falls back to `T` with a warning.
    pub fn read_body<T: Persist>(&mut self, header: &FrameHeader) -> CodecResult<T> {
        let expected = T::category();
        if header.category != expected {
            read_body_value(self, header.clone())?;
            return Err(CodecError::CategoryMismatch {
                type_name: T::type_name().into_owned(),
                expected,
                found: header.category,
                stored: header.type_name.clone(),
            });
        }
        if !T::resolves(&header.type_name) {
            let message = format!(
                "stored type {} does not resolve; decoding as {}",
                header.type_name,
                T::type_name()
            );
            tracing::debug!(
                stored = %header.type_name,
                expected = %T::type_name(),
                "type fallback"
            );
            self.warn(WarningKind::TypeFallback, message);
        }
        T::decode_body(header, self)
    }

    /// Default frame handling for owned (non-shared) types.
    pub(crate) fn read_owned_frame<T: Persist>(&mut self) -> CodecResult<Option<T>> {
        match self.read_tag()? {
            Tag::Null => Ok(None),
            Tag::Value => {
                let header = self.read_header()?;
                self.read_body(&header).map(Some)
            }
            Tag::Shared => {
                let id = self.read_shared_id()?;
                let header = self.read_header()?;
                self.warn(
                    WarningKind::UnexpectedShared,
                    format!("shared node {id} decoded as owned {}", T::type_name()),
                );
                self.read_body(&header).map(Some)
            }
            Tag::BackRef => {
                self.read_shared_id()?;
                Err(CodecError::UnexpectedTag {
                    tag: Tag::BackRef,
                    type_name: T::type_name().into_owned(),
                })
            }
        }
    }

    pub(crate) fn register_shared(&mut self, id: u32, node: Rc<dyn Any>) {
        self.arena.insert(id, node);
    }

    pub(crate) fn resolve_shared<N: Any>(&self, id: u32, type_name: &str) -> CodecResult<Rc<N>> {
        let node = self
            .arena
            .get(&id)
            .cloned()
            .ok_or(CodecError::DanglingBackRef(id))?;
        node.downcast::<N>()
            .map_err(|_| CodecError::SharedTypeMismatch {
                id,
                expected: type_name.to_string(),
            })
    }

    /// Record a warning at the current field path.
    pub fn warn(&mut self, kind: WarningKind, message: String) {
        self.trail.warn(kind, message);
    }

    pub(crate) fn push_path(&mut self, segment: &str) {
        self.trail.push(segment);
    }

    pub(crate) fn pop_path(&mut self) {
        self.trail.pop();
    }

    pub(crate) fn enter(&mut self) -> CodecResult<()> {
        if self.depth >= MAX_DEPTH {
            return Err(CodecError::DepthExceeded { max: MAX_DEPTH });
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Consume the decoder, pairing `value` with the collected warnings.
    pub fn finish<T>(mut self, value: T) -> Decoded<T> {
        if !self.is_at_end() {
            let trailing = self.remaining();
            self.warn(
                WarningKind::TrailingBytes,
                format!("{trailing} bytes after the root frame"),
            );
        }
        Decoded {
            value,
            warnings: self.trail.into_warnings(),
        }
    }
}

impl std::fmt::Debug for Decoder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("pos", &self.pos)
            .field("len", &self.data.len())
            .field("shared_nodes", &self.arena.len())
            .finish()
    }
}
