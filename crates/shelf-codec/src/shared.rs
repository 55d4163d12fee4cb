//! Identity-preserving encoding for shared nodes.
//!
//! `Rc<RefCell<T>>` is the only way for a value graph to alias or cycle, so
//! it is the only type tracked by identity. The first visit writes a
//! `SHARED` frame with a fresh id; every later visit writes a `BACKREF` to
//! it. Decoding registers the node in the arena before its body is read, so
//! a back-reference from inside the body resolves to the node itself.

use std::any::Any;
use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::decoder::Decoder;
use crate::encoder::{Encoder, SharedSlot};
use crate::error::{CodecError, CodecResult};
use crate::persist::Persist;
use crate::wire::{Category, FrameHeader, Tag};

impl<T: Persist + Default + 'static> Persist for Rc<RefCell<T>> {
    fn type_name() -> Cow<'static, str> {
        T::type_name()
    }

    fn category() -> Category {
        T::category()
    }

    fn resolves(type_name: &str) -> bool {
        T::resolves(type_name)
    }

    fn descriptor(&self) -> Cow<'static, str> {
        match self.try_borrow() {
            Ok(value) => value.descriptor(),
            Err(_) => T::type_name(),
        }
    }

    fn encode_body(&self, enc: &mut Encoder) -> CodecResult<()> {
        borrow_node(self)?.encode_body(enc)
    }

    fn decode_body(header: &FrameHeader, dec: &mut Decoder<'_>) -> CodecResult<Self> {
        T::decode_body(header, dec).map(|value| Rc::new(RefCell::new(value)))
    }

    fn encode_frame(&self, enc: &mut Encoder) -> CodecResult<()> {
        let value = borrow_node(self)?;
        match enc.shared_slot(Rc::as_ptr(self) as *const () as usize) {
            SharedSlot::Seen(id) => {
                enc.write_tag(Tag::BackRef);
                enc.write_varint(u64::from(id));
                Ok(())
            }
            SharedSlot::Fresh(id) => {
                enc.write_tag(Tag::Shared);
                enc.write_varint(u64::from(id));
                enc.write_header(T::category(), &value.descriptor());
                value.encode_body(enc)
            }
        }
    }

    fn decode_frame(dec: &mut Decoder<'_>) -> CodecResult<Option<Self>> {
        match dec.read_tag()? {
            Tag::Null => Ok(None),
            Tag::Value => {
                let header = dec.read_header()?;
                let value = dec.read_body::<T>(&header)?;
                Ok(Some(Rc::new(RefCell::new(value))))
            }
            Tag::Shared => {
                let id = dec.read_shared_id()?;
                let header = dec.read_header()?;
                let node = Rc::new(RefCell::new(T::default()));
                dec.register_shared(id, Rc::clone(&node) as Rc<dyn Any>);
                let value = dec.read_body::<T>(&header)?;
                node.replace(value);
                Ok(Some(node))
            }
            Tag::BackRef => {
                let id = dec.read_shared_id()?;
                dec.resolve_shared::<RefCell<T>>(id, &T::type_name())
                    .map(Some)
            }
        }
    }
}

/// A dead `Weak` encodes as null. A live one is written exactly like the
/// `Rc` it points to, so it shares that node's id.
///
/// A decoded `Weak` only stays alive if some strong reference in the same
/// graph owns its target.
impl<T: Persist + Default + 'static> Persist for Weak<RefCell<T>> {
    fn type_name() -> Cow<'static, str> {
        T::type_name()
    }

    fn category() -> Category {
        T::category()
    }

    fn resolves(type_name: &str) -> bool {
        T::resolves(type_name)
    }

    fn descriptor(&self) -> Cow<'static, str> {
        match self.upgrade() {
            Some(node) => node.descriptor(),
            None => T::type_name(),
        }
    }

    fn encode_body(&self, enc: &mut Encoder) -> CodecResult<()> {
        match self.upgrade() {
            Some(node) => node.encode_body(enc),
            None => Ok(()),
        }
    }

    fn decode_body(header: &FrameHeader, dec: &mut Decoder<'_>) -> CodecResult<Self> {
        Rc::<RefCell<T>>::decode_body(header, dec).map(|node| Rc::downgrade(&node))
    }

    fn encode_frame(&self, enc: &mut Encoder) -> CodecResult<()> {
        match self.upgrade() {
            Some(node) => node.encode_frame(enc),
            None => {
                enc.write_null();
                Ok(())
            }
        }
    }

    fn decode_frame(dec: &mut Decoder<'_>) -> CodecResult<Option<Self>> {
        Rc::<RefCell<T>>::decode_frame(dec).map(|node| node.map(|n| Rc::downgrade(&n)))
    }
}

fn borrow_node<T: Persist>(node: &RefCell<T>) -> CodecResult<std::cell::Ref<'_, T>> {
    node.try_borrow().map_err(|_| CodecError::Borrow {
        type_name: T::type_name().into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Holder, Node};
    use crate::report::WarningKind;
    use crate::{decode, decode_value, encode, Value};

    fn node(label: &str) -> Rc<RefCell<Node>> {
        Rc::new(RefCell::new(Node {
            label: label.into(),
            ..Default::default()
        }))
    }

    // -----------------------------------------------------------------------
    // Aliasing
    // -----------------------------------------------------------------------

    #[test]
    fn aliased_node_is_written_once() {
        let shared = node("shared");
        let list = vec![Rc::clone(&shared), Rc::clone(&shared)];

        let encoded = encode(&list).unwrap();
        let Value::List { items, .. } = decode_value(&encoded.bytes).unwrap() else {
            panic!("expected list");
        };
        assert!(matches!(items[0], Value::Shared { id: 0, .. }));
        assert_eq!(items[1], Value::BackRef { id: 0 });
    }

    #[test]
    fn aliasing_survives_roundtrip() {
        let shared = node("shared");
        let list = vec![Rc::clone(&shared), node("other"), Rc::clone(&shared)];

        let decoded = decode::<Vec<Rc<RefCell<Node>>>>(&encode(&list).unwrap().bytes)
            .unwrap()
            .into_value();
        assert!(Rc::ptr_eq(&decoded[0], &decoded[2]));
        assert!(!Rc::ptr_eq(&decoded[0], &decoded[1]));

        decoded[0].borrow_mut().label = "changed".into();
        assert_eq!(decoded[2].borrow().label, "changed");
    }

    // -----------------------------------------------------------------------
    // Cycles
    // -----------------------------------------------------------------------

    #[test]
    fn self_cycle_terminates_and_reconstructs() {
        let a = node("a");
        a.borrow_mut().next = Some(Rc::clone(&a));

        let encoded = encode(&a).unwrap();
        assert!(encoded.is_clean());

        let decoded = decode::<Rc<RefCell<Node>>>(&encoded.bytes).unwrap().into_value();
        let next = decoded.borrow().next.clone().unwrap();
        assert!(Rc::ptr_eq(&decoded, &next));
        assert_eq!(decoded.borrow().label, "a");

        decoded.borrow_mut().next = None;
        a.borrow_mut().next = None;
    }

    #[test]
    fn doubly_linked_list_roundtrip() {
        let a = node("a");
        let b = node("b");
        a.borrow_mut().next = Some(Rc::clone(&b));
        b.borrow_mut().prev = Some(Rc::downgrade(&a));

        let decoded = decode::<Rc<RefCell<Node>>>(&encode(&a).unwrap().bytes)
            .unwrap()
            .into_value();
        let b2 = decoded.borrow().next.clone().unwrap();
        assert_eq!(b2.borrow().label, "b");
        let back = b2.borrow().prev.as_ref().and_then(Weak::upgrade).unwrap();
        assert!(Rc::ptr_eq(&back, &decoded));
    }

    // -----------------------------------------------------------------------
    // Weak and borrow edge cases
    // -----------------------------------------------------------------------

    #[test]
    fn dead_weak_encodes_as_null() {
        let weak = Rc::downgrade(&node("gone"));
        assert_eq!(encode(&weak).unwrap().bytes, vec![0]);
    }

    #[test]
    fn mutably_borrowed_root_fails() {
        let a = node("a");
        let _guard = a.borrow_mut();
        assert!(matches!(
            encode(&a).unwrap_err(),
            CodecError::Borrow { .. }
        ));
    }

    #[test]
    fn mutably_borrowed_field_becomes_null() {
        let target = node("busy");
        let holder = Holder {
            name: "h".into(),
            node: Some(Rc::clone(&target)),
        };
        let guard = target.borrow_mut();
        let encoded = encode(&holder).unwrap();
        drop(guard);

        assert_eq!(encoded.warnings.len(), 1);
        assert_eq!(encoded.warnings[0].kind, WarningKind::FieldEncodeFailed);
        assert_eq!(encoded.warnings[0].path, "node");

        let decoded = decode::<Holder>(&encoded.bytes).unwrap();
        assert!(decoded.is_clean());
        assert_eq!(decoded.value.name, "h");
        assert!(decoded.value.node.is_none());
    }

    #[test]
    fn back_reference_to_wrong_type_is_recoverable() {
        // SHARED 0 as a string, then a BACKREF 0 read as a Node.
        let mut enc = Encoder::new();
        enc.write_tag(Tag::Shared);
        enc.write_varint(0);
        enc.write_header(Category::Text, "string");
        enc.write_str("x");
        enc.write_tag(Tag::BackRef);
        enc.write_varint(0);
        let bytes = enc.finish().bytes;

        let mut dec = Decoder::new(&bytes);
        let first = dec.read::<Rc<RefCell<String>>>().unwrap().unwrap();
        assert_eq!(*first.borrow(), "x");
        let err = dec.read::<Rc<RefCell<Node>>>().unwrap_err();
        assert!(err.is_recoverable());
        assert!(matches!(err, CodecError::SharedTypeMismatch { id: 0, .. }));
    }
}
