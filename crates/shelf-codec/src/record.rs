//! Record capability tables.
//!
//! A record type lists its fields once, in a static table of [`Field`]
//! descriptors. The encoder walks the table in declaration order and the
//! decoder looks fields up by name, so payloads with extra, missing or
//! reordered fields still decode.
//!
//! Most types use [`persist_record!`](crate::persist_record). Types with
//! computed or validated fields implement [`Record`] by hand and then call
//! [`persist_via_record!`](crate::persist_via_record).

use tracing::warn;

use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::{CodecError, CodecResult};
use crate::persist::Persist;
use crate::report::WarningKind;
use crate::wire::END_MARKER;

pub type EncodeFn<T> = fn(&T, &mut Encoder) -> CodecResult<()>;
pub type DecodeFn<T> = fn(&mut T, &mut Decoder<'_>) -> CodecResult<()>;

/// One named attribute of a record.
pub struct Field<T> {
    name: &'static str,
    encode: EncodeFn<T>,
    decode: Option<DecodeFn<T>>,
}

impl<T> Field<T> {
    /// A field that is written and read back.
    pub const fn new(name: &'static str, encode: EncodeFn<T>, decode: DecodeFn<T>) -> Self {
        Self {
            name,
            encode,
            decode: Some(decode),
        }
    }

    /// A computed field: written, but ignored on decode.
    pub const fn read_only(name: &'static str, encode: EncodeFn<T>) -> Self {
        Self {
            name,
            encode,
            decode: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_writable(&self) -> bool {
        self.decode.is_some()
    }
}

impl<T> std::fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("writable", &self.is_writable())
            .finish()
    }
}

/// A type encoded as named fields.
///
/// Field names must be unique and must not be `"END"`.
pub trait Record: Default + 'static {
    const TYPE_NAME: &'static str;

    fn fields() -> &'static [Field<Self>];
}

/// Decode one frame into `slot`. A null frame leaves it untouched.
pub fn read_into<T: Persist>(slot: &mut T, dec: &mut Decoder<'_>) -> CodecResult<()> {
    if let Some(value) = dec.read::<T>()? {
        *slot = value;
    }
    Ok(())
}

/// Write every field of `value` followed by the end marker.
///
/// A field whose encoder fails is rolled back and written as null.
pub fn encode_record<T: Record>(value: &T, enc: &mut Encoder) -> CodecResult<()> {
    for field in T::fields() {
        enc.write_str(field.name);
        enc.push_path(field.name);
        let checkpoint = enc.checkpoint();
        let result = (field.encode)(value, enc);
        if let Err(e) = result {
            if matches!(e, CodecError::DepthExceeded { .. }) {
                enc.pop_path();
                return Err(e);
            }
            enc.rollback(checkpoint);
            enc.write_null();
            warn!(
                record = T::TYPE_NAME,
                field = field.name,
                error = %e,
                "field encode failed, written as null"
            );
            enc.warn(WarningKind::FieldEncodeFailed, e.to_string());
        }
        enc.pop_path();
    }
    enc.write_str(END_MARKER);
    Ok(())
}

/// What happened to one name/value pair.
enum Step {
    Next,
    End,
    Truncated,
}

/// Build a `T` from its default, then apply fields until the end marker.
///
/// Running out of input ends the record early with a warning instead of an
/// error, so payloads cut short by an older writer still decode.
pub fn decode_record<T: Record>(dec: &mut Decoder<'_>) -> CodecResult<T> {
    let mut value = T::default();
    loop {
        match decode_field(&mut value, dec)? {
            Step::Next => {}
            Step::End => break,
            Step::Truncated => {
                dec.warn(
                    WarningKind::Truncated,
                    format!("input ended before the end of {}", T::TYPE_NAME),
                );
                break;
            }
        }
    }
    Ok(value)
}

fn decode_field<T: Record>(value: &mut T, dec: &mut Decoder<'_>) -> CodecResult<Step> {
    if dec.is_at_end() {
        return Ok(Step::Truncated);
    }
    let name = match dec.read_str() {
        Ok(name) => name,
        Err(e) if e.is_eof() => return Ok(Step::Truncated),
        Err(e) => return Err(e),
    };
    if name == END_MARKER {
        return Ok(Step::End);
    }

    dec.push_path(&name);
    let start = dec.position();
    let result = match T::fields().iter().find(|f| f.name == name) {
        Some(Field {
            decode: Some(decode),
            ..
        }) => decode(value, dec),
        Some(_) => dec.skip_frame().map(|()| {
            dec.warn(
                WarningKind::ReadOnlyField,
                format!("value for read-only field of {} discarded", T::TYPE_NAME),
            );
        }),
        None => dec.skip_frame().map(|()| {
            dec.warn(
                WarningKind::UnknownField,
                format!("{} has no field {name}; value discarded", T::TYPE_NAME),
            );
        }),
    };
    let step = match result {
        Ok(()) => Ok(Step::Next),
        Err(e) if e.is_eof() => Ok(Step::Truncated),
        Err(e) if e.is_recoverable() => {
            // The error may come from deep inside a list, so resynchronise on
            // the frame boundary before moving on.
            dec.rewind(start);
            match dec.skip_frame() {
                Ok(()) => {
                    warn!(record = T::TYPE_NAME, field = %name, error = %e, "field skipped");
                    dec.warn(WarningKind::FieldSkipped, e.to_string());
                    Ok(Step::Next)
                }
                Err(skip) if skip.is_eof() => Ok(Step::Truncated),
                Err(skip) => Err(skip),
            }
        }
        Err(e) => Err(e),
    };
    dec.pop_path();
    step
}

/// Implement [`Record`] and [`Persist`](crate::Persist) for a struct whose
/// fields all implement `Persist`.
///
/// ```
/// #[derive(Default)]
/// struct User {
///     id: String,
///     name: String,
/// }
///
/// shelf_codec::persist_record!(User as "User" { id, name });
///
/// let bytes = shelf_codec::encode(&User { id: "u1".into(), name: "Ann".into() })
///     .unwrap()
///     .bytes;
/// let user = shelf_codec::decode::<User>(&bytes).unwrap().into_value();
/// assert_eq!(user.name, "Ann");
/// ```
#[macro_export]
macro_rules! persist_record {
    (@impl $ty:ty, $name:expr, $($field:ident),*) => {
        impl $crate::Record for $ty {
            const TYPE_NAME: &'static str = $name;

            fn fields() -> &'static [$crate::Field<Self>] {
                const FIELDS: &[$crate::Field<$ty>] = &[
                    $(
                        $crate::Field::<$ty>::new(
                            stringify!($field),
                            |value, enc| enc.write_value(&value.$field),
                            |value, dec| $crate::record::read_into(&mut value.$field, dec),
                        ),
                    )*
                ];
                FIELDS
            }
        }

        $crate::persist_via_record!($ty);
    };
    ($ty:ident { $($field:ident),* $(,)? }) => {
        $crate::persist_record!(@impl $ty, stringify!($ty), $($field),*);
    };
    ($ty:ty as $name:literal { $($field:ident),* $(,)? }) => {
        $crate::persist_record!(@impl $ty, $name, $($field),*);
    };
}

/// Implement [`Persist`](crate::Persist) for a type with a hand-written
/// [`Record`] impl.
#[macro_export]
macro_rules! persist_via_record {
    ($ty:ty) => {
        impl $crate::Persist for $ty {
            fn type_name() -> ::std::borrow::Cow<'static, str> {
                ::std::borrow::Cow::Borrowed(<$ty as $crate::Record>::TYPE_NAME)
            }

            fn category() -> $crate::Category {
                $crate::Category::Record
            }

            fn encode_body(&self, enc: &mut $crate::Encoder) -> $crate::CodecResult<()> {
                $crate::record::encode_record(self, enc)
            }

            fn decode_body(
                _header: &$crate::FrameHeader,
                dec: &mut $crate::Decoder<'_>,
            ) -> $crate::CodecResult<Self> {
                $crate::record::decode_record(dec)
            }
        }
    };
}

/// Implement [`Persist`](crate::Persist) for a fieldless enum, stored by
/// variant name.
#[macro_export]
macro_rules! persist_enum {
    ($ty:ty as $name:literal { $($variant:ident),+ $(,)? }) => {
        impl $crate::Persist for $ty {
            fn type_name() -> ::std::borrow::Cow<'static, str> {
                ::std::borrow::Cow::Borrowed($name)
            }

            fn category() -> $crate::Category {
                $crate::Category::Enum
            }

            fn encode_body(&self, enc: &mut $crate::Encoder) -> $crate::CodecResult<()> {
                let variant = match self {
                    $(Self::$variant => stringify!($variant),)+
                };
                enc.write_str(variant);
                Ok(())
            }

            fn decode_body(
                _header: &$crate::FrameHeader,
                dec: &mut $crate::Decoder<'_>,
            ) -> $crate::CodecResult<Self> {
                let variant = dec.read_str()?;
                match variant.as_str() {
                    $(stringify!($variant) => Ok(Self::$variant),)+
                    _ => Err($crate::CodecError::UnknownVariant {
                        type_name: ::std::string::String::from($name),
                        variant,
                    }),
                }
            }
        }
    };
}

/// Implement [`Persist`](crate::Persist) for an enum whose variants each wrap
/// one record type.
///
/// Values are stored under the wrapped record's own type name, and decoding
/// picks the variant whose record resolves the stored name. An unknown name
/// falls back to the first variant. This is how a collection holds several
/// concrete record types behind one static type.
#[macro_export]
macro_rules! persist_union {
    (
        $ty:ty as $name:literal {
            $first:ident($first_inner:ty) $(, $variant:ident($inner:ty))* $(,)?
        }
    ) => {
        impl $crate::Persist for $ty {
            fn type_name() -> ::std::borrow::Cow<'static, str> {
                ::std::borrow::Cow::Borrowed($name)
            }

            fn category() -> $crate::Category {
                $crate::Category::Record
            }

            fn resolves(type_name: &str) -> bool {
                type_name == $name
                    || <$first_inner as $crate::Persist>::resolves(type_name)
                    $(|| <$inner as $crate::Persist>::resolves(type_name))*
            }

            fn descriptor(&self) -> ::std::borrow::Cow<'static, str> {
                match self {
                    Self::$first(value) => $crate::Persist::descriptor(value),
                    $(Self::$variant(value) => $crate::Persist::descriptor(value),)*
                }
            }

            fn encode_body(&self, enc: &mut $crate::Encoder) -> $crate::CodecResult<()> {
                match self {
                    Self::$first(value) => $crate::Persist::encode_body(value, enc),
                    $(Self::$variant(value) => $crate::Persist::encode_body(value, enc),)*
                }
            }

            fn decode_body(
                header: &$crate::FrameHeader,
                dec: &mut $crate::Decoder<'_>,
            ) -> $crate::CodecResult<Self> {
                $(
                    if <$inner as $crate::Persist>::resolves(&header.type_name) {
                        return <$inner as $crate::Persist>::decode_body(header, dec)
                            .map(Self::$variant);
                    }
                )*
                <$first_inner as $crate::Persist>::decode_body(header, dec).map(Self::$first)
            }
        }
    };
}
