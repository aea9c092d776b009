//! Dynamic values: the data model every procedure consumes and produces.
//!
//! A `Value` carries enough runtime identity (enum definitions, record shapes)
//! for dispatch by runtime shape. Scalars are tagged by their exact width.

use crate::shape::{EnumDef, Scalar, Shape};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A runtime value of some shape.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Char(char),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    Text(String),
    Enum(EnumValue),
    Seq(Vec<Value>),
    Record(Record),
    Native(NativeValue),
}

impl Value {
    /// Enum value of the given shape, or a bare `I64` when the shape is not an enum.
    pub fn ordinal(shape: &Shape, ordinal: i64) -> Value {
        match shape.as_enum() {
            Some(def) => Value::Enum(EnumValue::new(Arc::clone(def), ordinal)),
            None => Value::I64(ordinal),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The scalar kind of this value, if it is a native scalar.
    pub fn scalar(&self) -> Option<Scalar> {
        Some(match self {
            Value::Bool(_) => Scalar::Bool,
            Value::Char(_) => Scalar::Char,
            Value::I8(_) => Scalar::I8,
            Value::I16(_) => Scalar::I16,
            Value::I32(_) => Scalar::I32,
            Value::I64(_) => Scalar::I64,
            Value::U8(_) => Scalar::U8,
            Value::U16(_) => Scalar::U16,
            Value::U32(_) => Scalar::U32,
            Value::U64(_) => Scalar::U64,
            Value::F32(_) => Scalar::F32,
            Value::F64(_) => Scalar::F64,
            Value::Decimal(_) => Scalar::Decimal,
            _ => return None,
        })
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integral value widened to `i128`; enums yield their ordinal.
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            Value::I8(n) => Some(*n as i128),
            Value::I16(n) => Some(*n as i128),
            Value::I32(n) => Some(*n as i128),
            Value::I64(n) => Some(*n as i128),
            Value::U8(n) => Some(*n as i128),
            Value::U16(n) => Some(*n as i128),
            Value::U32(n) => Some(*n as i128),
            Value::U64(n) => Some(*n as i128),
            Value::Enum(e) => Some(e.ordinal() as i128),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumValue> {
        match self {
            Value::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_record_mut(&mut self) -> Option<&mut Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_native(&self) -> Option<&NativeValue> {
        match self {
            Value::Native(n) => Some(n),
            _ => None,
        }
    }

    /// Shape carried by the value itself, when it has one.
    pub fn runtime_shape(&self) -> Option<Shape> {
        match self {
            Value::Enum(e) => Some(Shape::from_enum_def(Arc::clone(&e.def))),
            Value::Record(r) => Some(r.shape.clone()),
            Value::Native(n) => Some(n.shape.clone()),
            Value::Text(_) => Some(Shape::text()),
            other => other.scalar().map(Shape::scalar),
        }
    }

    /// Short human description, used in mismatch errors.
    pub fn describe(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Seq(items) => format!("a sequence of {} elements", items.len()),
            Value::Text(_) => "text".to_string(),
            Value::Enum(e) => format!("enum `{}`", e.def.name()),
            Value::Record(r) => format!("record `{}`", r.shape),
            Value::Native(n) => format!("native `{}`", n.shape),
            other => match other.scalar() {
                Some(scalar) => format!("{} value", scalar.name()),
                None => "value".to_string(),
            },
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::I8(a), Value::I8(b)) => a == b,
            (Value::I16(a), Value::I16(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::U8(a), Value::U8(b)) => a == b,
            (Value::U16(a), Value::U16(b)) => a == b,
            (Value::U32(a), Value::U32(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::Seq(a), Value::Seq(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Native(a), Value::Native(b)) => Arc::ptr_eq(&a.inner, &b.inner),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Char(c) => write!(f, "{c}"),
            Value::I8(n) => write!(f, "{n}"),
            Value::I16(n) => write!(f, "{n}"),
            Value::I32(n) => write!(f, "{n}"),
            Value::I64(n) => write!(f, "{n}"),
            Value::U8(n) => write!(f, "{n}"),
            Value::U16(n) => write!(f, "{n}"),
            Value::U32(n) => write!(f, "{n}"),
            Value::U64(n) => write!(f, "{n}"),
            Value::F32(n) => write!(f, "{n}"),
            Value::F64(n) => write!(f, "{n}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Text(s) => f.write_str(s),
            Value::Enum(e) => match e.name() {
                Some(name) => f.write_str(name),
                None => write!(f, "{}", e.ordinal),
            },
            Value::Seq(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Record(r) => f.write_str(r.shape.name()),
            Value::Native(n) => f.write_str(n.shape.name()),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from!(
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
    String => Text,
    Record => Record,
);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Seq(items)
    }
}

/// A value of an enumerated shape.
#[derive(Debug, Clone)]
pub struct EnumValue {
    def: Arc<EnumDef>,
    ordinal: i64,
}

impl EnumValue {
    pub fn new(def: Arc<EnumDef>, ordinal: i64) -> Self {
        Self { def, ordinal }
    }

    pub fn def(&self) -> &Arc<EnumDef> {
        &self.def
    }

    pub fn ordinal(&self) -> i64 {
        self.ordinal
    }

    /// Declared variant name; `None` for undeclared ordinals.
    pub fn name(&self) -> Option<&str> {
        self.def.name_of(self.ordinal)
    }
}

impl PartialEq for EnumValue {
    fn eq(&self, other: &Self) -> bool {
        self.ordinal == other.ordinal && self.def.name() == other.def.name()
    }
}

/// A structured value: its runtime shape plus member values in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    shape: Shape,
    fields: IndexMap<String, Value>,
}

impl Record {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            fields: IndexMap::new(),
        }
    }

    /// A record whose writable members hold their shape's zero value.
    pub fn with_defaults(shape: Shape) -> Self {
        let mut fields = IndexMap::new();
        if let Some(def) = shape.as_record() {
            for member in def.members().filter(|m| m.is_writable()) {
                fields.insert(member.name().to_string(), member.shape().zero_value());
            }
        }
        Self { shape, fields }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields.get_mut(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn take(&mut self, name: &str) -> Option<Value> {
        self.fields.shift_remove(name)
    }

    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// An opaque host value carried through procedures untouched.
#[derive(Clone)]
pub struct NativeValue {
    shape: Shape,
    inner: Arc<dyn Any + Send + Sync>,
}

impl NativeValue {
    pub fn new<T: Any + Send + Sync>(shape: Shape, value: T) -> Self {
        Self {
            shape,
            inner: Arc::new(value),
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Extract the inner value, cloning only when it is shared.
    pub fn into_inner<T: Any + Send + Sync + Clone>(self) -> Option<T> {
        let arc = self.inner.downcast::<T>().ok()?;
        Some(Arc::try_unwrap(arc).unwrap_or_else(|shared| (*shared).clone()))
    }
}

impl fmt::Debug for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeValue({})", self.shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::RecordDef;

    #[test]
    fn test_runtime_shape() {
        assert_eq!(Value::I32(4).runtime_shape(), Some(Shape::scalar(Scalar::I32)));
        assert_eq!(Value::from("x").runtime_shape(), Some(Shape::text()));
        assert_eq!(Value::Null.runtime_shape(), None);
    }

    #[test]
    fn test_record_defaults() {
        let shape = Shape::record(
            RecordDef::new("Point")
                .member("x", Shape::scalar(Scalar::F64))
                .member("label", Shape::text()),
        );
        let record = Record::with_defaults(shape);
        assert_eq!(record.get("x"), Some(&Value::F64(0.0)));
        assert_eq!(record.get("label"), Some(&Value::Null));
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::U8(7).to_string(), "7");
        assert_eq!(
            Value::Seq(vec![Value::Bool(true), Value::from("a")]).to_string(),
            "[true, a]"
        );
    }

    #[test]
    fn test_native_into_inner() {
        let shape = Shape::text();
        let native = NativeValue::new(shape, vec![1u8, 2, 3]);
        let copy = native.clone();
        assert_eq!(native.into_inner::<Vec<u8>>(), Some(vec![1, 2, 3]));
        assert_eq!(copy.downcast_ref::<String>(), None);
    }

    #[test]
    fn test_width_sensitive_equality() {
        assert_ne!(Value::I32(1), Value::I64(1));
        assert_eq!(Value::Decimal(Decimal::ONE), Value::Decimal(Decimal::new(10, 1)));
    }
}
