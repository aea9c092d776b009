//! Bridge between Rust types and shapes.
//!
//! [`Reflect`] describes a Rust type as a [`Shape`] and moves values in and
//! out of the dynamic [`Value`] model. Records and enums are reflected with the
//! [`reflect_record!`](crate::reflect_record) and
//! [`reflect_enum!`](crate::reflect_enum) macros.

use crate::error::{MapError, Result};
use crate::shape::{Capability, CollectionDef, Scalar, Shape};
use crate::value::Value;
use rust_decimal::Decimal;
use std::collections::VecDeque;

/// A Rust type with a shape.
pub trait Reflect: Sized + Send + Sync + 'static {
    fn shape() -> Shape;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self>;
}

/// Integer types usable as the underlying representation of an enum.
pub trait Integral: Reflect {
    const SCALAR: Scalar;
}

macro_rules! reflect_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Reflect for $ty {
                fn shape() -> Shape {
                    Shape::scalar(Scalar::$variant)
                }

                fn to_value(&self) -> Value {
                    Value::$variant(*self)
                }

                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(MapError::mismatch(Scalar::$variant.name(), &other)),
                    }
                }
            }
        )*
    };
}

reflect_scalar!(
    bool => Bool,
    char => Char,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Decimal => Decimal,
);

macro_rules! integral {
    ($($ty:ty => $variant:ident),*) => {
        $(impl Integral for $ty { const SCALAR: Scalar = Scalar::$variant; })*
    };
}

integral!(i8 => I8, i16 => I16, i32 => I32, i64 => I64, u8 => U8, u16 => U16, u32 => U32, u64 => U64);

/// Null text reads back as the empty string.
impl Reflect for String {
    fn shape() -> Shape {
        Shape::text()
    }

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Text(s) => Ok(s),
            Value::Null => Ok(String::new()),
            other => Err(MapError::mismatch("text", &other)),
        }
    }
}

impl<T: Reflect> Reflect for Option<T> {
    fn shape() -> Shape {
        Shape::optional(T::shape())
    }

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Boxes are transparent, so recursive records can be reflected.
impl<T: Reflect> Reflect for Box<T> {
    fn shape() -> Shape {
        T::shape()
    }

    fn to_value(&self) -> Value {
        (**self).to_value()
    }

    fn from_value(value: Value) -> Result<Self> {
        T::from_value(value).map(Box::new)
    }
}

fn elements<T: Reflect>(expected: &Shape, value: Value) -> Result<Vec<T>> {
    match value {
        Value::Seq(items) => items.into_iter().map(T::from_value).collect(),
        Value::Null => Ok(Vec::new()),
        other => Err(MapError::mismatch(expected, &other)),
    }
}

/// Growable list: exposes every capability and builds from a sequence.
impl<T: Reflect> Reflect for Vec<T> {
    fn shape() -> Shape {
        let element = T::shape();
        Shape::collection(
            CollectionDef::new(format!("Vec<{}>", element.name()), element)
                .capability(Capability::Collection)
                .capability(Capability::List)
                .from_sequence(|items| Ok(Value::Seq(items))),
        )
    }

    fn to_value(&self) -> Value {
        Value::Seq(self.iter().map(Reflect::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self> {
        elements(&Self::shape(), value)
    }
}

/// Built by default construction plus append.
impl<T: Reflect> Reflect for VecDeque<T> {
    fn shape() -> Shape {
        let element = T::shape();
        Shape::collection(
            CollectionDef::new(format!("VecDeque<{}>", element.name()), element)
                .capability(Capability::Collection)
                .default_append(
                    || Value::Seq(Vec::new()),
                    |target, item| match target {
                        Value::Seq(items) => {
                            items.push(item);
                            Ok(())
                        }
                        other => Err(MapError::mismatch("VecDeque", &*other)),
                    },
                ),
        )
    }

    fn to_value(&self) -> Value {
        Value::Seq(self.iter().map(Reflect::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self> {
        elements(&Self::shape(), value).map(VecDeque::from)
    }
}

impl<T: Reflect, const N: usize> Reflect for [T; N] {
    fn shape() -> Shape {
        Shape::array(T::shape())
    }

    fn to_value(&self) -> Value {
        Value::Seq(self.iter().map(Reflect::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self> {
        let expected = format!("[{}; {}]", T::shape().name(), N);
        let items = match value {
            Value::Seq(items) if items.len() == N => items,
            other => return Err(MapError::mismatch(expected, &other)),
        };
        let items = items
            .into_iter()
            .map(T::from_value)
            .collect::<Result<Vec<T>>>()?;
        items.try_into().map_err(|_| MapError::configuration(expected))
    }
}

/// Implement [`Reflect`] for a struct with named fields.
///
/// The struct must implement `Default`; members absent from a source record
/// keep their default. An optional `: Base` declares the base shape used for
/// ancestry and polymorphic dispatch.
///
/// ```
/// use metamorph::reflect_record;
///
/// #[derive(Debug, Default, Clone, PartialEq)]
/// struct Point {
///     x: i32,
///     y: i32,
/// }
///
/// reflect_record!(Point { x: i32, y: i32 });
/// ```
#[macro_export]
macro_rules! reflect_record {
    (@impl $ty:ident, $base:expr, { $($field:ident : $fty:ty),* }) => {
        impl $crate::Reflect for $ty {
            fn shape() -> $crate::Shape {
                static SHAPE: ::std::sync::OnceLock<$crate::Shape> = ::std::sync::OnceLock::new();
                SHAPE
                    .get_or_init(|| {
                        let mut def = $crate::RecordDef::new(concat!(module_path!(), "::", stringify!($ty)))
                            .members_with(|| {
                                vec![$(
                                    $crate::MemberDescriptor::new(
                                        stringify!($field),
                                        <$fty as $crate::Reflect>::shape(),
                                    )
                                ),*]
                            })
                            .constructor(|| {
                                $crate::Reflect::to_value(&<$ty as ::core::default::Default>::default())
                            });
                        let base: ::core::option::Option<$crate::Shape> = $base;
                        if let ::core::option::Option::Some(base) = base {
                            def = def.base(base);
                        }
                        $crate::Shape::record(def)
                    })
                    .clone()
            }

            #[allow(unused_mut)]
            fn to_value(&self) -> $crate::Value {
                let mut record = $crate::Record::new(<Self as $crate::Reflect>::shape());
                $(record.set(stringify!($field), $crate::Reflect::to_value(&self.$field));)*
                $crate::Value::Record(record)
            }

            #[allow(unused_mut, unused_variables)]
            fn from_value(value: $crate::Value) -> $crate::Result<Self> {
                match value {
                    $crate::Value::Null => Ok(<Self as ::core::default::Default>::default()),
                    $crate::Value::Record(mut record) => {
                        let mut out = <Self as ::core::default::Default>::default();
                        $(
                            if let ::core::option::Option::Some(v) = record.take(stringify!($field)) {
                                out.$field = <$fty as $crate::Reflect>::from_value(v)
                                    .map_err(|e| e.in_member(stringify!($field)))?;
                            }
                        )*
                        Ok(out)
                    }
                    other => Err($crate::MapError::mismatch(
                        concat!(module_path!(), "::", stringify!($ty)),
                        &other,
                    )),
                }
            }
        }
    };
    ($ty:ident { $($field:ident : $fty:ty),* $(,)? }) => {
        $crate::reflect_record!(@impl $ty, ::core::option::Option::None, { $($field : $fty),* });
    };
    ($ty:ident : $base:ty { $($field:ident : $fty:ty),* $(,)? }) => {
        $crate::reflect_record!(
            @impl $ty,
            ::core::option::Option::Some(<$base as $crate::Reflect>::shape()),
            { $($field : $fty),* }
        );
    };
}

/// Implement [`Reflect`] for a fieldless enum with explicit discriminants.
///
/// ```
/// use metamorph::reflect_enum;
///
/// #[derive(Debug, Clone, Copy, PartialEq)]
/// enum Level {
///     Low = 1,
///     High = 2,
/// }
///
/// reflect_enum!(Level: u8 { Low = 1, High = 2 });
/// ```
#[macro_export]
macro_rules! reflect_enum {
    ($ty:ident : $repr:ty { $($variant:ident = $ordinal:expr),* $(,)? }) => {
        impl $crate::Reflect for $ty {
            fn shape() -> $crate::Shape {
                static SHAPE: ::std::sync::OnceLock<$crate::Shape> = ::std::sync::OnceLock::new();
                SHAPE
                    .get_or_init(|| {
                        $crate::Shape::enumeration(
                            $crate::EnumDef::new(
                                concat!(module_path!(), "::", stringify!($ty)),
                                <$repr as $crate::Integral>::SCALAR,
                            )
                            $(.variant(stringify!($variant), ($ordinal) as i64))*
                        )
                    })
                    .clone()
            }

            fn to_value(&self) -> $crate::Value {
                let ordinal: i64 = match self {
                    $(Self::$variant => ($ordinal) as i64,)*
                };
                $crate::Value::ordinal(&<Self as $crate::Reflect>::shape(), ordinal)
            }

            fn from_value(value: $crate::Value) -> $crate::Result<Self> {
                let name = concat!(module_path!(), "::", stringify!($ty));
                match value {
                    $crate::Value::Enum(e) => match e.ordinal() {
                        $(o if o == ($ordinal) as i64 => Ok(Self::$variant),)*
                        other => Err($crate::MapError::conversion(
                            e.def().name(),
                            name,
                            format!("{other} is not a declared variant"),
                        )),
                    },
                    other => Err($crate::MapError::mismatch(name, &other)),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::ShapeKind;
    use std::sync::Arc;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Address {
        city: String,
        zip: Option<u32>,
    }

    crate::reflect_record!(Address { city: String, zip: Option<u32> });

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Contact {
        name: String,
        address: Address,
        tags: Vec<String>,
    }

    crate::reflect_record!(Contact { name: String, address: Address, tags: Vec<String> });

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Tier {
        Free = 0,
        Pro = 5,
    }

    crate::reflect_enum!(Tier: i16 { Free = 0, Pro = 5 });

    #[test]
    fn test_record_round_trip() {
        let contact = Contact {
            name: "Ada".into(),
            address: Address {
                city: "London".into(),
                zip: Some(1815),
            },
            tags: vec!["math".into()],
        };
        let value = contact.to_value();
        let record = value.as_record().expect("record value");
        assert_eq!(record.shape(), &Contact::shape());
        assert_eq!(record.get("name"), Some(&Value::from("Ada")));
        assert_eq!(Contact::from_value(value).expect("should read back"), contact);
    }

    #[test]
    fn test_record_shape_members() {
        let shape = Contact::shape();
        let def = shape.as_record().expect("record shape");
        let names: Vec<_> = def.members().map(|m| m.name().to_string()).collect();
        assert_eq!(names, ["name", "address", "tags"]);
        assert!(shape.name().ends_with("::Contact"));
        assert_eq!(shape.short_name(), "Contact");
    }

    #[test]
    fn test_shape_is_built_once() {
        let (a, b) = (Contact::shape(), Contact::shape());
        let (a, b) = (a.as_record().expect("record"), b.as_record().expect("record"));
        assert!(Arc::ptr_eq(a, b));

        let first = Contact::default().to_value();
        let second = Contact::default().to_value();
        let defs = [&first, &second].map(|v| {
            v.as_record()
                .and_then(|r| r.shape().as_record())
                .cloned()
                .expect("record value")
        });
        assert!(Arc::ptr_eq(&defs[0], &defs[1]));

        let (x, y) = (Tier::shape(), Tier::shape());
        match (x.kind(), y.kind()) {
            (ShapeKind::Enum(x), ShapeKind::Enum(y)) => assert!(Arc::ptr_eq(x, y)),
            _ => panic!("expected enum shapes"),
        }
    }

    #[test]
    fn test_enum_reflection() {
        let shape = Tier::shape();
        let def = shape.as_enum().expect("enum shape");
        assert_eq!(def.underlying(), Scalar::I16);
        assert_eq!(Tier::Pro.to_value().as_integer(), Some(5));
        assert_eq!(Tier::from_value(Tier::Pro.to_value()).expect("variant"), Tier::Pro);

        let undeclared = Value::ordinal(&shape, 3);
        assert!(Tier::from_value(undeclared).is_err());
    }

    #[test]
    fn test_collection_shapes() {
        assert!(matches!(Vec::<i32>::shape().kind(), ShapeKind::Collection(_)));
        assert!(matches!(<[i32; 3]>::shape().kind(), ShapeKind::Array(_)));
        let deque = VecDeque::<u8>::shape();
        let def = deque.as_collection().expect("collection");
        assert!(def.from_sequence_fn().is_none());
        assert!(def.default_append_fns().is_some());
    }

    #[test]
    fn test_fixed_array_length_checked() {
        let value = Value::Seq(vec![Value::I32(1), Value::I32(2)]);
        assert!(<[i32; 3]>::from_value(value.clone()).is_err());
        assert_eq!(<[i32; 2]>::from_value(value).expect("two elements"), [1, 2]);
    }

    #[test]
    fn test_null_text_reads_as_empty() {
        assert_eq!(String::from_value(Value::Null).expect("null text"), "");
        assert_eq!(Option::<String>::from_value(Value::Null).expect("none"), None);
    }
}
