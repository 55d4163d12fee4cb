//! # shelf-codec
//!
//! Schema-less binary codec for Rust object graphs.
//!
//! Every frame carries its own descriptor (a category byte and a type name),
//! so payloads decode without an external schema and tolerate added, removed
//! or renamed fields. Shared `Rc<RefCell<T>>` nodes are written once and
//! referenced by id afterwards, so aliasing and cycles survive a round trip.
//!
//! Types opt in by implementing [`Persist`]: primitives and std containers
//! are covered here, records use [`persist_record!`], fieldless enums use
//! [`persist_enum!`] and polymorphic record families use [`persist_union!`].

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod persist;
pub mod record;
pub mod report;
mod shared;
pub mod value;
pub mod wire;

#[cfg(test)]
mod fixtures;

pub use decoder::Decoder;
pub use encoder::Encoder;
pub use error::{CodecError, CodecResult};
pub use persist::Persist;
pub use record::{Field, Record};
pub use report::{CodecWarning, Decoded, Encoded, WarningKind};
pub use value::Value;
pub use wire::{Category, FrameHeader, Tag, END_MARKER, MAX_DEPTH};

/// Encode `value` as a single root frame.
///
/// Field-level failures are reported in [`Encoded::warnings`]; an error is
/// returned only when the root itself cannot be written.
pub fn encode<T: Persist>(value: &T) -> CodecResult<Encoded> {
    let mut enc = Encoder::new();
    enc.write_value(value)?;
    Ok(enc.finish())
}

/// Decode a root frame as `T`.
///
/// Unknown fields, truncated records and renamed types degrade into
/// [`Decoded::warnings`]. A null root is an error since there is no value to
/// return.
pub fn decode<T: Persist>(bytes: &[u8]) -> CodecResult<Decoded<T>> {
    let mut dec = Decoder::new(bytes);
    match dec.read::<T>()? {
        Some(value) => Ok(dec.finish(value)),
        None => Err(CodecError::NullRoot {
            type_name: T::type_name().into_owned(),
        }),
    }
}

/// Decode a root frame without knowing its type.
pub fn decode_value(bytes: &[u8]) -> CodecResult<Value> {
    Decoder::new(bytes).read_value()
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use proptest::prelude::*;

    use super::*;
    use crate::fixtures::{Address, Node, Person, Tier};

    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    #[test]
    fn null_root_is_an_error() {
        let bytes = encode(&None::<Person>).unwrap().bytes;
        assert!(matches!(
            decode::<Person>(&bytes).unwrap_err(),
            CodecError::NullRoot { .. }
        ));
        assert_eq!(decode::<Option<Person>>(&bytes).unwrap().value, None);
    }

    #[test]
    fn empty_input_is_eof() {
        assert!(decode::<Person>(&[]).unwrap_err().is_eof());
        assert!(decode_value(&[]).unwrap_err().is_eof());
    }

    #[test]
    fn trailing_bytes_are_reported() {
        let mut bytes = encode(&5u8).unwrap().bytes;
        bytes.extend_from_slice(&[0, 0]);
        let decoded = decode::<u8>(&bytes).unwrap();
        assert_eq!(decoded.value, 5);
        assert!(decoded.has_warning(WarningKind::TrailingBytes));
    }

    #[test]
    fn category_mismatch_at_root_propagates() {
        let bytes = encode(&vec![1u8]).unwrap().bytes;
        let err = decode::<Person>(&bytes).unwrap_err();
        assert!(matches!(
            err,
            CodecError::CategoryMismatch {
                expected: Category::Record,
                found: Category::List,
                ..
            }
        ));
    }

    #[test]
    fn deeply_linked_chain_exceeds_depth() {
        let head = Rc::new(RefCell::new(Node::default()));
        let mut tail = Rc::clone(&head);
        for i in 0..MAX_DEPTH {
            let next = Rc::new(RefCell::new(Node {
                label: i.to_string(),
                ..Default::default()
            }));
            tail.borrow_mut().next = Some(Rc::clone(&next));
            tail = next;
        }
        assert!(matches!(
            encode(&head).unwrap_err(),
            CodecError::DepthExceeded { .. }
        ));
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    fn tier() -> impl Strategy<Value = Tier> {
        prop_oneof![Just(Tier::Free), Just(Tier::Pro)]
    }

    fn address() -> impl Strategy<Value = Address> {
        (".*", any::<u32>()).prop_map(|(street, zip)| Address { street, zip })
    }

    fn person() -> impl Strategy<Value = Person> {
        (
            "[a-z0-9]{0,12}",
            ".*",
            any::<u8>(),
            tier(),
            proptest::option::of(address()),
            proptest::collection::vec(".*", 0..4),
        )
            .prop_map(|(id, name, age, tier, address, tags)| Person {
                id,
                name,
                age,
                tier,
                address,
                tags,
            })
    }

    proptest! {
        #[test]
        fn person_roundtrip(p in person()) {
            let encoded = encode(&p).unwrap();
            prop_assert!(encoded.is_clean());
            let decoded = decode::<Person>(&encoded.bytes).unwrap();
            prop_assert!(decoded.is_clean());
            prop_assert_eq!(decoded.value, p);
        }

        #[test]
        fn numbers_roundtrip(a in any::<i64>(), b in any::<u128>(), c in any::<f64>()) {
            let value = (a, b, c);
            let back = decode::<i64>(&encode(&value.0).unwrap().bytes).unwrap().value;
            prop_assert_eq!(back, a);
            let back = decode::<u128>(&encode(&value.1).unwrap().bytes).unwrap().value;
            prop_assert_eq!(back, b);
            let back = decode::<f64>(&encode(&value.2).unwrap().bytes).unwrap().value;
            prop_assert!(back == c || (back.is_nan() && c.is_nan()));
        }

        #[test]
        fn any_prefix_decodes_or_fails_cleanly(p in person(), cut in 0usize..200) {
            let bytes = encode(&p).unwrap().bytes;
            let cut = cut.min(bytes.len());
            // Must terminate without panicking.
            let _ = decode::<Person>(&bytes[..cut]);
            let _ = decode_value(&bytes[..cut]);
        }

        #[test]
        fn arbitrary_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let _ = decode::<Person>(&bytes);
            let _ = decode::<Vec<Rc<RefCell<Node>>>>(&bytes);
            let _ = decode_value(&bytes);
        }
    }
}
