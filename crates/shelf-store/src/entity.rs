use std::borrow::Cow;

use shelf_codec::Persist;
use uuid::Uuid;

/// A record type stored by the document store.
///
/// Each entity exposes exactly one identity value, used as its blob name.
/// Uniqueness within a session and type is by convention: writing a second
/// entity with the same identity overwrites the first.
pub trait Entity: Persist + Default + Clone + 'static {
    /// Name of the container holding entities of this type.
    fn entity_type() -> Cow<'static, str> {
        Self::type_name()
    }

    /// Identity of this entity, or `None` if it has none yet.
    fn entity_id(&self) -> Option<String>;
}

/// A field type usable as an entity identity.
pub trait IdentityValue {
    /// String form of the identity; `None` if absent.
    fn to_identity(&self) -> Option<String>;
}

impl IdentityValue for String {
    fn to_identity(&self) -> Option<String> {
        self.as_str().to_identity()
    }
}

/// Empty strings count as absent.
impl IdentityValue for str {
    fn to_identity(&self) -> Option<String> {
        (!self.is_empty()).then(|| self.to_string())
    }
}

impl IdentityValue for Uuid {
    fn to_identity(&self) -> Option<String> {
        (!self.is_nil()).then(|| self.to_string())
    }
}

impl<T: IdentityValue> IdentityValue for Option<T> {
    fn to_identity(&self) -> Option<String> {
        self.as_ref().and_then(IdentityValue::to_identity)
    }
}

macro_rules! integer_identity {
    ($($ty:ty),*) => {
        $(
            impl IdentityValue for $ty {
                fn to_identity(&self) -> Option<String> {
                    Some(self.to_string())
                }
            }
        )*
    };
}

integer_identity!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

/// Implement [`Entity`] for a record type, using `$field` as its identity.
///
/// ```
/// use shelf_codec::persist_record;
/// use shelf_store::impl_entity;
///
/// #[derive(Clone, Default)]
/// struct User {
///     id: String,
///     name: String,
/// }
///
/// persist_record!(User { id, name });
/// impl_entity!(User, id);
/// ```
#[macro_export]
macro_rules! impl_entity {
    ($ty:ty, $field:ident) => {
        impl $crate::Entity for $ty {
            fn entity_id(&self) -> Option<String> {
                $crate::IdentityValue::to_identity(&self.$field)
            }
        }
    };
}
