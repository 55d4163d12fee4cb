//! The [`Persist`] trait and its implementations for primitives and
//! standard containers.
//!
//! Primitives are rendered with `Display` and parsed with `FromStr`. Neither
//! consults a locale, and floats print in shortest round-trip form, so text
//! payloads decode to the same value on every platform.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::{CodecError, CodecResult};
use crate::report::WarningKind;
use crate::wire::{Category, FrameHeader, Tag};

/// A value the codec can write and read back without an external schema.
///
/// Implementations describe the value's category and globally resolvable
/// type name, and how to write/read the frame body. Frame handling (tags,
/// headers, identity tracking) has defaults that only `Option`, `Box` and
/// the shared-node impls override.
pub trait Persist: Sized {
    /// Type name written in frame headers and expected on read.
    fn type_name() -> Cow<'static, str>;

    /// Body shape.
    fn category() -> Category;

    /// Returns `true` if a stored type name denotes this type. Sum types
    /// accept the names of all their variants.
    fn resolves(type_name: &str) -> bool {
        type_name == Self::type_name()
    }

    /// Concrete type name of this particular value.
    fn descriptor(&self) -> Cow<'static, str> {
        Self::type_name()
    }

    fn encode_body(&self, enc: &mut Encoder) -> CodecResult<()>;

    fn decode_body(header: &FrameHeader, dec: &mut Decoder<'_>) -> CodecResult<Self>;

    fn encode_frame(&self, enc: &mut Encoder) -> CodecResult<()> {
        enc.write_tag(Tag::Value);
        enc.write_header(Self::category(), &self.descriptor());
        self.encode_body(enc)
    }

    fn decode_frame(dec: &mut Decoder<'_>) -> CodecResult<Option<Self>> {
        dec.read_owned_frame()
    }
}

fn parse_text<T>(text: String, type_name: &str) -> CodecResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    text.parse().map_err(|e: T::Err| CodecError::Parse {
        type_name: type_name.to_string(),
        reason: e.to_string(),
        text,
    })
}

macro_rules! text_persist {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl Persist for $ty {
                fn type_name() -> Cow<'static, str> {
                    Cow::Borrowed($name)
                }

                fn category() -> Category {
                    Category::Text
                }

                fn encode_body(&self, enc: &mut Encoder) -> CodecResult<()> {
                    enc.write_str(&self.to_string());
                    Ok(())
                }

                fn decode_body(_header: &FrameHeader, dec: &mut Decoder<'_>) -> CodecResult<Self> {
                    parse_text(dec.read_str()?, $name)
                }
            }
        )*
    };
}

text_persist! {
    bool => "bool",
    char => "char",
    i8 => "i8",
    i16 => "i16",
    i32 => "i32",
    i64 => "i64",
    i128 => "i128",
    isize => "isize",
    u8 => "u8",
    u16 => "u16",
    u32 => "u32",
    u64 => "u64",
    u128 => "u128",
    usize => "usize",
    f32 => "f32",
    f64 => "f64",
    Uuid => "uuid",
}

impl Persist for String {
    fn type_name() -> Cow<'static, str> {
        Cow::Borrowed("string")
    }

    fn category() -> Category {
        Category::Text
    }

    fn encode_body(&self, enc: &mut Encoder) -> CodecResult<()> {
        enc.write_str(self);
        Ok(())
    }

    fn decode_body(_header: &FrameHeader, dec: &mut Decoder<'_>) -> CodecResult<Self> {
        dec.read_str()
    }
}

impl Persist for DateTime<Utc> {
    fn type_name() -> Cow<'static, str> {
        Cow::Borrowed("datetime")
    }

    fn category() -> Category {
        Category::Text
    }

    fn encode_body(&self, enc: &mut Encoder) -> CodecResult<()> {
        enc.write_str(&self.to_rfc3339_opts(SecondsFormat::AutoSi, true));
        Ok(())
    }

    fn decode_body(_header: &FrameHeader, dec: &mut Decoder<'_>) -> CodecResult<Self> {
        let text = dec.read_str()?;
        match DateTime::parse_from_rfc3339(&text) {
            Ok(parsed) => Ok(parsed.with_timezone(&Utc)),
            Err(e) => Err(CodecError::Parse {
                type_name: "datetime".into(),
                reason: e.to_string(),
                text,
            }),
        }
    }
}

impl<T: Persist> Persist for Option<T> {
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
        match self {
            Some(value) => value.descriptor(),
            None => T::type_name(),
        }
    }

    fn encode_body(&self, enc: &mut Encoder) -> CodecResult<()> {
        match self {
            Some(value) => value.encode_body(enc),
            None => Ok(()),
        }
    }

    fn decode_body(header: &FrameHeader, dec: &mut Decoder<'_>) -> CodecResult<Self> {
        T::decode_body(header, dec).map(Some)
    }

    fn encode_frame(&self, enc: &mut Encoder) -> CodecResult<()> {
        match self {
            Some(value) => value.encode_frame(enc),
            None => {
                enc.write_null();
                Ok(())
            }
        }
    }

    fn decode_frame(dec: &mut Decoder<'_>) -> CodecResult<Option<Self>> {
        T::decode_frame(dec).map(Some)
    }
}

impl<T: Persist> Persist for Box<T> {
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
        (**self).descriptor()
    }

    fn encode_body(&self, enc: &mut Encoder) -> CodecResult<()> {
        (**self).encode_body(enc)
    }

    fn decode_body(header: &FrameHeader, dec: &mut Decoder<'_>) -> CodecResult<Self> {
        T::decode_body(header, dec).map(Box::new)
    }

    fn encode_frame(&self, enc: &mut Encoder) -> CodecResult<()> {
        (**self).encode_frame(enc)
    }

    fn decode_frame(dec: &mut Decoder<'_>) -> CodecResult<Option<Self>> {
        T::decode_frame(dec).map(|value| value.map(Box::new))
    }
}

/// Write `count` then one frame per item.
fn encode_items<'a, T, I>(enc: &mut Encoder, count: usize, items: I) -> CodecResult<()>
where
    T: Persist + 'a,
    I: IntoIterator<Item = &'a T>,
{
    enc.write_varint(count as u64);
    for item in items {
        enc.write_value(item)?;
    }
    Ok(())
}

/// Read a count then that many frames. Null elements cannot be stored in a
/// non-nullable `T` and are dropped with a warning.
fn decode_items<T: Persist>(dec: &mut Decoder<'_>) -> CodecResult<(usize, Vec<T>)> {
    let count = dec.read_count()?;
    let mut items = Vec::with_capacity(count);
    for index in 0..count {
        match dec.read::<T>()? {
            Some(item) => items.push(item),
            None => dec.warn(
                WarningKind::NullElement,
                format!("null element {index} of {} dropped", T::type_name()),
            ),
        }
    }
    Ok((count, items))
}

impl<T: Persist> Persist for Vec<T> {
    fn type_name() -> Cow<'static, str> {
        Cow::Owned(format!("list<{}>", T::type_name()))
    }

    fn category() -> Category {
        Category::List
    }

    fn encode_body(&self, enc: &mut Encoder) -> CodecResult<()> {
        encode_items(enc, self.len(), self)
    }

    fn decode_body(_header: &FrameHeader, dec: &mut Decoder<'_>) -> CodecResult<Self> {
        decode_items(dec).map(|(_, items)| items)
    }
}

impl<T: Persist> Persist for VecDeque<T> {
    fn type_name() -> Cow<'static, str> {
        Vec::<T>::type_name()
    }

    fn category() -> Category {
        Category::List
    }

    fn encode_body(&self, enc: &mut Encoder) -> CodecResult<()> {
        encode_items(enc, self.len(), self)
    }

    fn decode_body(_header: &FrameHeader, dec: &mut Decoder<'_>) -> CodecResult<Self> {
        decode_items(dec).map(|(_, items)| items.into())
    }
}

impl<T: Persist, const N: usize> Persist for [T; N] {
    fn type_name() -> Cow<'static, str> {
        Cow::Owned(format!("array<{}>", T::type_name()))
    }

    fn category() -> Category {
        Category::Array
    }

    fn encode_body(&self, enc: &mut Encoder) -> CodecResult<()> {
        encode_items(enc, N, self)
    }

    fn decode_body(_header: &FrameHeader, dec: &mut Decoder<'_>) -> CodecResult<Self> {
        let (count, items) = decode_items::<T>(dec)?;
        let found = items.len();
        if count != N {
            return Err(CodecError::ArrayLength {
                type_name: Self::type_name().into_owned(),
                expected: N,
                found: count,
            });
        }
        items.try_into().map_err(|_| CodecError::ArrayLength {
            type_name: Self::type_name().into_owned(),
            expected: N,
            found,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{decode, encode};

    fn roundtrip<T: Persist + PartialEq + std::fmt::Debug>(value: T) {
        let encoded = encode(&value).unwrap();
        let decoded = decode::<T>(&encoded.bytes).unwrap();
        assert!(decoded.is_clean(), "warnings: {:?}", decoded.warnings);
        assert_eq!(decoded.value, value);
    }

    // -----------------------------------------------------------------------
    // Primitives
    // -----------------------------------------------------------------------

    #[test]
    fn integers_roundtrip() {
        roundtrip(0i32);
        roundtrip(-17i64);
        roundtrip(u64::MAX);
        roundtrip(i128::MIN);
        roundtrip(255u8);
    }

    #[test]
    fn text_payload_is_canonical_rendering() {
        let encoded = encode(&1234567i32).unwrap();
        // tag, category, "i32", then "1234567" with no grouping separators
        assert_eq!(&encoded.bytes[..6], &[1, 0, 3, b'i', b'3', b'2']);
        assert_eq!(&encoded.bytes[6..], b"\x071234567");
    }

    #[test]
    fn floats_use_invariant_format() {
        let encoded = encode(&1.5f64).unwrap();
        assert!(encoded.bytes.ends_with(b"1.5"));
        roundtrip(0.1f64);
        roundtrip(-2.5e-300f64);
        roundtrip(f64::MAX);
        roundtrip(f32::MIN_POSITIVE);
        roundtrip(f64::INFINITY);
    }

    #[test]
    fn nan_roundtrips() {
        let encoded = encode(&f64::NAN).unwrap();
        let decoded = decode::<f64>(&encoded.bytes).unwrap();
        assert!(decoded.value.is_nan());
    }

    #[test]
    fn bool_char_string_roundtrip() {
        roundtrip(true);
        roundtrip('λ');
        roundtrip(String::from("hello, wörld"));
        roundtrip(String::new());
    }

    #[test]
    fn uuid_and_datetime_roundtrip() {
        roundtrip(Uuid::from_u128(0x1234_5678_9abc_def0_1234_5678_9abc_def0));
        let at = DateTime::parse_from_rfc3339("2024-02-29T12:30:45.123Z")
            .unwrap()
            .with_timezone(&Utc);
        roundtrip(at);
    }

    #[test]
    fn parse_failure_is_reported() {
        let encoded = encode(&String::from("twelve")).unwrap();
        let err = decode::<i32>(&encoded.bytes).unwrap_err();
        assert!(matches!(err, CodecError::Parse { ref text, .. } if text == "twelve"));
    }

    #[test]
    fn renamed_primitive_falls_back_to_expected_type() {
        let encoded = encode(&42i32).unwrap();
        let decoded = decode::<i64>(&encoded.bytes).unwrap();
        assert_eq!(decoded.value, 42);
        assert!(decoded.has_warning(WarningKind::TypeFallback));
    }

    // -----------------------------------------------------------------------
    // Containers
    // -----------------------------------------------------------------------

    #[test]
    fn option_roundtrip() {
        roundtrip(Some(5u16));
        roundtrip(None::<u16>);
        roundtrip(vec![Some(1i8), None, Some(3)]);
    }

    #[test]
    fn none_is_single_null_byte() {
        assert_eq!(encode(&None::<String>).unwrap().bytes, vec![0]);
    }

    #[test]
    fn vec_and_deque_roundtrip() {
        roundtrip(vec![String::from("a"), String::from("b")]);
        roundtrip(Vec::<u32>::new());
        roundtrip(VecDeque::from(vec![1u8, 2, 3]));
        roundtrip(vec![vec![1i32], vec![], vec![2, 3]]);
    }

    #[test]
    fn deque_reads_vec_payload() {
        let encoded = encode(&vec![7u32, 8]).unwrap();
        let decoded = decode::<VecDeque<u32>>(&encoded.bytes).unwrap();
        assert!(decoded.is_clean());
        assert_eq!(decoded.value, VecDeque::from(vec![7, 8]));
    }

    #[test]
    fn arrays_roundtrip() {
        roundtrip([1u8, 2, 3, 4]);
        roundtrip([[0i32; 2]; 3]);
        roundtrip::<[String; 0]>([]);
    }

    #[test]
    fn array_length_mismatch() {
        let encoded = encode(&[1u8, 2, 3]).unwrap();
        let err = decode::<[u8; 4]>(&encoded.bytes).unwrap_err();
        assert!(matches!(
            err,
            CodecError::ArrayLength { expected: 4, found: 3, .. }
        ));
    }

    #[test]
    fn null_elements_are_dropped_from_plain_vec() {
        let encoded = encode(&vec![Some(1u8), None, Some(3)]).unwrap();
        let decoded = decode::<Vec<u8>>(&encoded.bytes).unwrap();
        assert_eq!(decoded.value, vec![1, 3]);
        assert!(decoded.has_warning(WarningKind::NullElement));
    }

    #[test]
    fn boxed_values_are_transparent() {
        let encoded = encode(&Box::new(9u32)).unwrap();
        assert_eq!(encoded.bytes, encode(&9u32).unwrap().bytes);
        roundtrip(Box::new(String::from("boxed")));
    }

    #[test]
    fn list_type_names_nest() {
        assert_eq!(Vec::<Vec<i32>>::type_name(), "list<list<i32>>");
        assert_eq!(<[u8; 3]>::type_name(), "array<u8>");
        assert_eq!(Option::<String>::type_name(), "string");
    }
}
