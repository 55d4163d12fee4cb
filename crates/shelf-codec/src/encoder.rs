use std::collections::HashMap;

use crate::error::{CodecError, CodecResult};
use crate::persist::Persist;
use crate::report::{Encoded, Trail, WarningKind};
use crate::wire::{encode_varint, Category, Tag, MAX_DEPTH};

/// Outcome of looking up a shared node in the identity table.
pub(crate) enum SharedSlot {
    /// First visit; the node was assigned this id.
    Fresh(u32),
    /// Already written under this id.
    Seen(u32),
}

/// Restore point used to undo a failed field.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Checkpoint {
    len: usize,
    next_shared: u32,
}

/// Writes frames into an in-memory buffer.
///
/// One encoder is used per top-level encode call; its identity table maps
/// shared-node addresses to sequential ids and is never reused.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
    shared: HashMap<usize, u32>,
    next_shared: u32,
    depth: usize,
    trail: Trail,
}

impl Encoder {
    /// Create an empty encoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Write a complete frame for `value`.
    pub fn write_value<T: Persist>(&mut self, value: &T) -> CodecResult<()> {
        if self.depth >= MAX_DEPTH {
            return Err(CodecError::DepthExceeded { max: MAX_DEPTH });
        }
        self.depth += 1;
        let result = value.encode_frame(self);
        self.depth -= 1;
        result
    }

    /// Write a null frame.
    pub fn write_null(&mut self) {
        self.write_tag(Tag::Null);
    }

    pub fn write_tag(&mut self, tag: Tag) {
        self.buf.push(tag.type_byte());
    }

    pub fn write_header(&mut self, category: Category, type_name: &str) {
        self.buf.push(category.type_byte());
        self.write_str(type_name);
    }

    pub fn write_varint(&mut self, value: u64) {
        encode_varint(&mut self.buf, value);
    }

    /// Write a length-prefixed UTF-8 string.
    pub fn write_str(&mut self, value: &str) {
        self.write_varint(value.len() as u64);
        self.buf.extend_from_slice(value.as_bytes());
    }

    /// Record a warning at the current field path.
    pub fn warn(&mut self, kind: WarningKind, message: String) {
        self.trail.warn(kind, message);
    }

    /// Consume the encoder.
    pub fn finish(self) -> Encoded {
        Encoded {
            bytes: self.buf,
            warnings: self.trail.into_warnings(),
        }
    }

    pub(crate) fn shared_slot(&mut self, addr: usize) -> SharedSlot {
        if let Some(&id) = self.shared.get(&addr) {
            return SharedSlot::Seen(id);
        }
        let id = self.next_shared;
        self.next_shared += 1;
        self.shared.insert(addr, id);
        SharedSlot::Fresh(id)
    }

    pub(crate) fn push_path(&mut self, segment: &str) {
        self.trail.push(segment);
    }

    pub(crate) fn pop_path(&mut self) {
        self.trail.pop();
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            len: self.buf.len(),
            next_shared: self.next_shared,
        }
    }

    /// Drop bytes and shared ids produced after `checkpoint`.
    pub(crate) fn rollback(&mut self, checkpoint: Checkpoint) {
        self.buf.truncate(checkpoint.len);
        self.shared.retain(|_, id| *id < checkpoint.next_shared);
        self.next_shared = checkpoint.next_shared;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_str_is_length_prefixed() {
        let mut enc = Encoder::new();
        enc.write_str("END");
        assert_eq!(enc.finish().bytes, vec![3, b'E', b'N', b'D']);
    }

    #[test]
    fn header_layout() {
        let mut enc = Encoder::new();
        enc.write_tag(Tag::Value);
        enc.write_header(Category::Text, "i32");
        assert_eq!(enc.finish().bytes, vec![1, 0, 3, b'i', b'3', b'2']);
    }

    #[test]
    fn shared_slots_are_sequential() {
        let mut enc = Encoder::new();
        assert!(matches!(enc.shared_slot(0x10), SharedSlot::Fresh(0)));
        assert!(matches!(enc.shared_slot(0x20), SharedSlot::Fresh(1)));
        assert!(matches!(enc.shared_slot(0x10), SharedSlot::Seen(0)));
    }

    #[test]
    fn rollback_discards_bytes_and_ids() {
        let mut enc = Encoder::new();
        enc.write_str("keep");
        let _ = enc.shared_slot(0x10);
        let cp = enc.checkpoint();

        enc.write_str("drop me");
        let _ = enc.shared_slot(0x20);
        enc.rollback(cp);

        assert_eq!(enc.len(), 5);
        assert!(matches!(enc.shared_slot(0x20), SharedSlot::Fresh(1)));
        assert!(matches!(enc.shared_slot(0x10), SharedSlot::Seen(0)));
    }
}
