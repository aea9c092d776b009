//! Shapes: runtime descriptions of the types a mapper converts between.
//!
//! A shape is identified by its canonical name. Two shapes with the same
//! name are the same shape, regardless of how they were constructed.

use crate::error::{MapError, Result};
use crate::reflect::Reflect;
use crate::value::Value;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

/// Builds a default instance of a structured or collection shape.
pub type Constructor = Arc<dyn Fn() -> Value + Send + Sync>;
/// Parses text into a value of the owning shape.
pub type ParseFn = Arc<dyn Fn(&str) -> std::result::Result<Value, String> + Send + Sync>;
/// Renders a value of the owning shape as text.
pub type FormatFn = Arc<dyn Fn(&Value) -> String + Send + Sync>;
/// A value-to-value conversion.
pub type ConvertFn = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;
/// Builds a collection from already converted elements.
pub type SequenceCtor = Arc<dyn Fn(Vec<Value>) -> Result<Value> + Send + Sync>;
/// Appends one element to a collection built by a [`Constructor`].
pub type AppendFn = Arc<dyn Fn(&mut Value, Value) -> Result<()> + Send + Sync>;
/// Lists the elements of a collection value that is not a plain `Value::Seq`.
pub type IterateFn = Arc<dyn Fn(&Value) -> Result<Vec<Value>> + Send + Sync>;

/// Native scalar kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scalar {
    Bool,
    Char,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Decimal,
}

impl Scalar {
    pub const ALL: [Scalar; 13] = [
        Scalar::Bool,
        Scalar::Char,
        Scalar::I8,
        Scalar::I16,
        Scalar::I32,
        Scalar::I64,
        Scalar::U8,
        Scalar::U16,
        Scalar::U32,
        Scalar::U64,
        Scalar::F32,
        Scalar::F64,
        Scalar::Decimal,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Scalar::Bool => "bool",
            Scalar::Char => "char",
            Scalar::I8 => "i8",
            Scalar::I16 => "i16",
            Scalar::I32 => "i32",
            Scalar::I64 => "i64",
            Scalar::U8 => "u8",
            Scalar::U16 => "u16",
            Scalar::U32 => "u32",
            Scalar::U64 => "u64",
            Scalar::F32 => "f32",
            Scalar::F64 => "f64",
            Scalar::Decimal => "decimal",
        }
    }

    pub fn is_integral(self) -> bool {
        matches!(
            self,
            Scalar::I8
                | Scalar::I16
                | Scalar::I32
                | Scalar::I64
                | Scalar::U8
                | Scalar::U16
                | Scalar::U32
                | Scalar::U64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, Scalar::F32 | Scalar::F64)
    }

    /// The zero value of this scalar.
    pub fn zero(self) -> Value {
        match self {
            Scalar::Bool => Value::Bool(false),
            Scalar::Char => Value::Char('\0'),
            Scalar::I8 => Value::I8(0),
            Scalar::I16 => Value::I16(0),
            Scalar::I32 => Value::I32(0),
            Scalar::I64 => Value::I64(0),
            Scalar::U8 => Value::U8(0),
            Scalar::U16 => Value::U16(0),
            Scalar::U32 => Value::U32(0),
            Scalar::U64 => Value::U64(0),
            Scalar::F32 => Value::F32(0.0),
            Scalar::F64 => Value::F64(0.0),
            Scalar::Decimal => Value::Decimal(Decimal::ZERO),
        }
    }

    /// Parse already trimmed text.
    pub fn parse(self, text: &str) -> std::result::Result<Value, String> {
        fn num<T>(text: &str) -> std::result::Result<T, String>
        where
            T: FromStr,
            T::Err: fmt::Display,
        {
            text.parse::<T>().map_err(|e| e.to_string())
        }

        Ok(match self {
            Scalar::Bool => {
                if text.eq_ignore_ascii_case("true") {
                    Value::Bool(true)
                } else if text.eq_ignore_ascii_case("false") {
                    Value::Bool(false)
                } else {
                    return Err("expected `true` or `false`".into());
                }
            }
            Scalar::Char => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Value::Char(c),
                    _ => return Err("expected exactly one character".into()),
                }
            }
            Scalar::I8 => Value::I8(num(text)?),
            Scalar::I16 => Value::I16(num(text)?),
            Scalar::I32 => Value::I32(num(text)?),
            Scalar::I64 => Value::I64(num(text)?),
            Scalar::U8 => Value::U8(num(text)?),
            Scalar::U16 => Value::U16(num(text)?),
            Scalar::U32 => Value::U32(num(text)?),
            Scalar::U64 => Value::U64(num(text)?),
            Scalar::F32 => Value::F32(num(text)?),
            Scalar::F64 => Value::F64(num(text)?),
            Scalar::Decimal => Value::Decimal(
                Decimal::from_str(text)
                    .or_else(|_| Decimal::from_scientific(text))
                    .map_err(|e| e.to_string())?,
            ),
        })
    }
}

/// Sequence capabilities a shape may expose.
///
/// `List` implies `Collection`, which implies `Sequence`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Sequence,
    Collection,
    List,
}

impl Capability {
    pub fn name(self) -> &'static str {
        match self {
            Capability::Sequence => "Sequence",
            Capability::Collection => "Collection",
            Capability::List => "List",
        }
    }

    /// This capability plus every capability it implies.
    pub fn implied(self) -> &'static [Capability] {
        match self {
            Capability::Sequence => &[Capability::Sequence],
            Capability::Collection => &[Capability::Collection, Capability::Sequence],
            Capability::List => &[Capability::List, Capability::Collection, Capability::Sequence],
        }
    }
}

/// An enumerated type backed by an integral scalar.
#[derive(Debug, Clone)]
pub struct EnumDef {
    name: String,
    underlying: Scalar,
    variants: Vec<(String, i64)>,
}

impl EnumDef {
    pub fn new(name: impl Into<String>, underlying: Scalar) -> Self {
        Self {
            name: name.into(),
            underlying,
            variants: Vec::new(),
        }
    }

    pub fn variant(mut self, name: impl Into<String>, ordinal: i64) -> Self {
        self.variants.push((name.into(), ordinal));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn underlying(&self) -> Scalar {
        self.underlying
    }

    pub fn variants(&self) -> &[(String, i64)] {
        &self.variants
    }

    pub fn name_of(&self, ordinal: i64) -> Option<&str> {
        self.variants
            .iter()
            .find(|(_, o)| *o == ordinal)
            .map(|(name, _)| name.as_str())
    }

    /// Look up a variant by name, exact match first.
    pub fn ordinal_of(&self, name: &str) -> Option<i64> {
        self.variants
            .iter()
            .find(|(n, _)| n == name)
            .or_else(|| self.variants.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)))
            .map(|(_, o)| *o)
    }

    /// Parse a variant name or a bare ordinal.
    pub fn parse(&self, text: &str) -> std::result::Result<i64, String> {
        self.ordinal_of(text)
            .or_else(|| text.parse::<i64>().ok())
            .ok_or_else(|| format!("`{}` is not a variant of `{}`", text, self.name))
    }
}

/// Whether a conversion operator may be applied silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    /// Infallible conversion, the analogue of `From`.
    Implicit,
    /// Fallible conversion, the analogue of `TryFrom`.
    Explicit,
}

/// A user-declared conversion between two shapes, attached to one of them.
#[derive(Clone)]
pub struct Operator {
    from: Shape,
    to: Shape,
    kind: OperatorKind,
    func: ConvertFn,
}

impl Operator {
    pub fn new(
        from: Shape,
        to: Shape,
        kind: OperatorKind,
        func: impl Fn(Value) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            from,
            to,
            kind,
            func: Arc::new(func),
        }
    }

    /// Operator backed by a `From` implementation.
    pub fn implicit<S, T>() -> Self
    where
        S: Reflect,
        T: Reflect + From<S>,
    {
        Self::new(S::shape(), T::shape(), OperatorKind::Implicit, |value| {
            S::from_value(value).map(|s| T::from(s).to_value())
        })
    }

    /// Operator backed by a `TryFrom` implementation.
    pub fn explicit<S, T>() -> Self
    where
        S: Reflect,
        T: Reflect + TryFrom<S>,
        <T as TryFrom<S>>::Error: fmt::Display,
    {
        Self::new(S::shape(), T::shape(), OperatorKind::Explicit, |value| {
            let source = S::from_value(value)?;
            T::try_from(source)
                .map(|t| t.to_value())
                .map_err(|e| MapError::conversion(S::shape(), T::shape(), e.to_string()))
        })
    }

    pub fn from(&self) -> &Shape {
        &self.from
    }

    pub fn to(&self) -> &Shape {
        &self.to
    }

    pub fn kind(&self) -> OperatorKind {
        self.kind
    }

    pub fn func(&self) -> &ConvertFn {
        &self.func
    }
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operator")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("kind", &self.kind)
            .finish()
    }
}

/// A member of a structured shape.
#[derive(Debug, Clone)]
pub struct MemberDescriptor {
    name: String,
    shape: Shape,
    readable: bool,
    writable: bool,
}

impl MemberDescriptor {
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            readable: true,
            writable: true,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.readable = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn is_readable(&self) -> bool {
        self.readable
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }
}

/// Evaluated on first access; lets self-referential shapes be described.
struct Lazy<T> {
    cell: OnceLock<T>,
    init: Box<dyn Fn() -> T + Send + Sync>,
}

impl<T> Lazy<T> {
    fn new(init: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self {
            cell: OnceLock::new(),
            init: Box::new(init),
        }
    }

    fn get(&self) -> &T {
        self.cell.get_or_init(|| (self.init)())
    }
}

/// A structured (record-like) shape: named members, an optional base shape,
/// and optional construction, parsing, formatting and conversion operators.
#[derive(Default)]
pub struct RecordDef {
    name: String,
    base: Option<Shape>,
    members: Vec<MemberDescriptor>,
    lazy_members: Option<Lazy<Vec<MemberDescriptor>>>,
    operators: Vec<Operator>,
    lazy_operators: Option<Lazy<Vec<Operator>>>,
    constructor: Option<Constructor>,
    parser: Option<ParseFn>,
    formatter: Option<FormatFn>,
}

impl RecordDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Declare the base shape this record derives from.
    pub fn base(mut self, base: Shape) -> Self {
        self.base = Some(base);
        self
    }

    pub fn member(mut self, name: impl Into<String>, shape: Shape) -> Self {
        self.members.push(MemberDescriptor::new(name, shape));
        self
    }

    pub fn member_descriptor(mut self, member: MemberDescriptor) -> Self {
        self.members.push(member);
        self
    }

    /// Members computed on first access, after the eagerly declared ones.
    pub fn members_with(
        mut self,
        members: impl Fn() -> Vec<MemberDescriptor> + Send + Sync + 'static,
    ) -> Self {
        self.lazy_members = Some(Lazy::new(members));
        self
    }

    pub fn operator(mut self, operator: Operator) -> Self {
        self.operators.push(operator);
        self
    }

    pub fn operators_with(
        mut self,
        operators: impl Fn() -> Vec<Operator> + Send + Sync + 'static,
    ) -> Self {
        self.lazy_operators = Some(Lazy::new(operators));
        self
    }

    pub fn constructor(mut self, constructor: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.constructor = Some(Arc::new(constructor));
        self
    }

    pub fn parser(
        mut self,
        parser: impl Fn(&str) -> std::result::Result<Value, String> + Send + Sync + 'static,
    ) -> Self {
        self.parser = Some(Arc::new(parser));
        self
    }

    pub fn formatter(mut self, formatter: impl Fn(&Value) -> String + Send + Sync + 'static) -> Self {
        self.formatter = Some(Arc::new(formatter));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_shape(&self) -> Option<&Shape> {
        self.base.as_ref()
    }

    pub fn members(&self) -> impl Iterator<Item = &MemberDescriptor> {
        self.members
            .iter()
            .chain(self.lazy_members.iter().flat_map(|lazy| lazy.get().iter()))
    }

    pub fn find_member(&self, name: &str) -> Option<&MemberDescriptor> {
        self.members().find(|m| m.name() == name)
    }

    pub fn operators(&self) -> impl Iterator<Item = &Operator> {
        self.operators
            .iter()
            .chain(self.lazy_operators.iter().flat_map(|lazy| lazy.get().iter()))
    }

    pub fn constructor_fn(&self) -> Option<&Constructor> {
        self.constructor.as_ref()
    }

    pub fn parser_fn(&self) -> Option<&ParseFn> {
        self.parser.as_ref()
    }

    pub fn formatter_fn(&self) -> Option<&FormatFn> {
        self.formatter.as_ref()
    }
}

/// A concrete sequence type and the ways it can be built.
pub struct CollectionDef {
    name: String,
    element: Shape,
    capabilities: Vec<Capability>,
    from_sequence: Option<SequenceCtor>,
    create: Option<Constructor>,
    append: Option<AppendFn>,
    iterate: Option<IterateFn>,
}

impl CollectionDef {
    /// A collection exposing only the `Sequence` capability.
    pub fn new(name: impl Into<String>, element: Shape) -> Self {
        Self {
            name: name.into(),
            element,
            capabilities: vec![Capability::Sequence],
            from_sequence: None,
            create: None,
            append: None,
            iterate: None,
        }
    }

    pub fn capability(mut self, capability: Capability) -> Self {
        if !self.capabilities.contains(&capability) {
            self.capabilities.push(capability);
        }
        self
    }

    /// Constructor accepting the converted elements in order.
    pub fn from_sequence(
        mut self,
        ctor: impl Fn(Vec<Value>) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.from_sequence = Some(Arc::new(ctor));
        self
    }

    /// Empty constructor plus an append operation.
    pub fn default_append(
        mut self,
        create: impl Fn() -> Value + Send + Sync + 'static,
        append: impl Fn(&mut Value, Value) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.create = Some(Arc::new(create));
        self.append = Some(Arc::new(append));
        self
    }

    /// Element listing for values that are not a plain `Value::Seq`.
    pub fn iterate(
        mut self,
        iterate: impl Fn(&Value) -> Result<Vec<Value>> + Send + Sync + 'static,
    ) -> Self {
        self.iterate = Some(Arc::new(iterate));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn element(&self) -> &Shape {
        &self.element
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    pub fn from_sequence_fn(&self) -> Option<&SequenceCtor> {
        self.from_sequence.as_ref()
    }

    pub fn default_append_fns(&self) -> Option<(&Constructor, &AppendFn)> {
        self.create.as_ref().zip(self.append.as_ref())
    }

    pub fn iterate_fn(&self) -> Option<&IterateFn> {
        self.iterate.as_ref()
    }
}

/// The structure of a shape.
pub enum ShapeKind {
    /// Universal root every shape derives from.
    Any,
    /// Common ancestor of scalars, optionals and enums.
    ValueType,
    /// Common ancestor of enums.
    EnumBase,
    /// Common ancestor of arrays.
    ArrayBase,
    Scalar(Scalar),
    Text,
    Optional(Shape),
    Enum(Arc<EnumDef>),
    /// Fixed-size sequence.
    Array(Shape),
    /// Abstract sequence capability of an element shape.
    Capability(Capability, Shape),
    Collection(Arc<CollectionDef>),
    Record(Arc<RecordDef>),
}

/// A cheaply clonable shape handle. Equality and hashing use the name.
#[derive(Clone)]
pub struct Shape {
    name: Arc<str>,
    kind: Arc<ShapeKind>,
}

impl Shape {
    fn from_kind(name: impl Into<Arc<str>>, kind: ShapeKind) -> Self {
        Self {
            name: name.into(),
            kind: Arc::new(kind),
        }
    }

    pub fn any() -> Self {
        Self::from_kind("any", ShapeKind::Any)
    }

    fn value_type() -> Self {
        Self::from_kind("value", ShapeKind::ValueType)
    }

    fn enum_base() -> Self {
        Self::from_kind("enum", ShapeKind::EnumBase)
    }

    fn array_base() -> Self {
        Self::from_kind("array", ShapeKind::ArrayBase)
    }

    pub fn scalar(scalar: Scalar) -> Self {
        Self::from_kind(scalar.name(), ShapeKind::Scalar(scalar))
    }

    pub fn text() -> Self {
        Self::from_kind("text", ShapeKind::Text)
    }

    pub fn optional(inner: Shape) -> Self {
        Self::from_kind(format!("Option<{}>", inner.name), ShapeKind::Optional(inner))
    }

    pub fn array(element: Shape) -> Self {
        Self::from_kind(format!("[{}]", element.name), ShapeKind::Array(element))
    }

    pub fn capability(capability: Capability, element: Shape) -> Self {
        Self::from_kind(
            format!("{}<{}>", capability.name(), element.name),
            ShapeKind::Capability(capability, element),
        )
    }

    pub fn sequence(element: Shape) -> Self {
        Self::capability(Capability::Sequence, element)
    }

    pub fn enumeration(def: EnumDef) -> Self {
        Self::from_enum_def(Arc::new(def))
    }

    pub fn from_enum_def(def: Arc<EnumDef>) -> Self {
        let name = def.name().to_string();
        Self::from_kind(name, ShapeKind::Enum(def))
    }

    pub fn record(def: RecordDef) -> Self {
        let name = def.name().to_string();
        Self::from_kind(name, ShapeKind::Record(Arc::new(def)))
    }

    pub fn collection(def: CollectionDef) -> Self {
        let name = def.name().to_string();
        Self::from_kind(name, ShapeKind::Collection(Arc::new(def)))
    }

    /// Shape of a reflected Rust type.
    pub fn of<T: Reflect>() -> Self {
        T::shape()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name without its module path, for non-generic names.
    pub fn short_name(&self) -> &str {
        if self.name.contains('<') {
            &self.name
        } else {
            self.name.rsplit("::").next().unwrap_or(&self.name)
        }
    }

    pub fn kind(&self) -> &ShapeKind {
        &self.kind
    }

    /// The next ancestor towards the universal root.
    pub fn parent(&self) -> Option<Shape> {
        match self.kind() {
            ShapeKind::Any => None,
            ShapeKind::ValueType | ShapeKind::ArrayBase => Some(Shape::any()),
            ShapeKind::EnumBase => Some(Shape::value_type()),
            ShapeKind::Scalar(_) | ShapeKind::Optional(_) => Some(Shape::value_type()),
            ShapeKind::Enum(_) => Some(Shape::enum_base()),
            ShapeKind::Array(_) => Some(Shape::array_base()),
            ShapeKind::Record(def) => Some(def.base_shape().cloned().unwrap_or_else(Shape::any)),
            ShapeKind::Text | ShapeKind::Capability(..) | ShapeKind::Collection(_) => {
                Some(Shape::any())
            }
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self.kind(), ShapeKind::Optional(_))
    }

    pub fn optional_inner(&self) -> Option<&Shape> {
        match self.kind() {
            ShapeKind::Optional(inner) => Some(inner),
            _ => None,
        }
    }

    /// This shape with every optional layer removed.
    pub fn strip_optional(&self) -> &Shape {
        let mut current = self;
        while let Some(inner) = current.optional_inner() {
            current = inner;
        }
        current
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind(), ShapeKind::Text)
    }

    pub fn is_record(&self) -> bool {
        matches!(self.kind(), ShapeKind::Record(_))
    }

    pub fn as_scalar(&self) -> Option<Scalar> {
        match self.kind() {
            ShapeKind::Scalar(scalar) => Some(*scalar),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&Arc<EnumDef>> {
        match self.kind() {
            ShapeKind::Enum(def) => Some(def),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Arc<RecordDef>> {
        match self.kind() {
            ShapeKind::Record(def) => Some(def),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&Arc<CollectionDef>> {
        match self.kind() {
            ShapeKind::Collection(def) => Some(def),
            _ => None,
        }
    }

    /// Element shape, for shapes that expose a sequence capability.
    pub fn element(&self) -> Option<&Shape> {
        match self.kind() {
            ShapeKind::Array(element) | ShapeKind::Capability(_, element) => Some(element),
            ShapeKind::Collection(def) => Some(def.element()),
            _ => None,
        }
    }

    /// Capability shapes this shape implements, excluding itself.
    pub fn capabilities(&self) -> Vec<Shape> {
        let (caps, element): (Vec<Capability>, &Shape) = match self.kind() {
            ShapeKind::Array(element) => (
                vec![Capability::List, Capability::Collection, Capability::Sequence],
                element,
            ),
            ShapeKind::Capability(cap, element) => (
                cap.implied().iter().copied().filter(|c| c != cap).collect(),
                element,
            ),
            ShapeKind::Collection(def) => {
                let mut caps = Vec::new();
                for cap in def.capabilities() {
                    for implied in cap.implied() {
                        if !caps.contains(implied) {
                            caps.push(*implied);
                        }
                    }
                }
                (caps, def.element())
            }
            _ => return Vec::new(),
        };
        caps.into_iter()
            .map(|cap| Shape::capability(cap, element.clone()))
            .collect()
    }

    /// Conversion operators declared on this shape.
    pub fn operators(&self) -> Vec<&Operator> {
        match self.kind() {
            ShapeKind::Record(def) => def.operators().collect(),
            _ => Vec::new(),
        }
    }

    /// The value a freshly initialized slot of this shape holds.
    pub fn zero_value(&self) -> Value {
        match self.kind() {
            ShapeKind::Scalar(scalar) => scalar.zero(),
            ShapeKind::Enum(def) => Value::Enum(crate::value::EnumValue::new(Arc::clone(def), 0)),
            _ => Value::Null,
        }
    }
}

impl PartialEq for Shape {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Shape {}

impl Hash for Shape {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shape({})", self.name)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> Shape {
        Shape::record(
            RecordDef::new("Person")
                .member("name", Shape::text())
                .member("age", Shape::scalar(Scalar::I32)),
        )
    }

    #[test]
    fn test_identity_by_name() {
        assert_eq!(person(), person());
        assert_eq!(
            Shape::optional(Shape::scalar(Scalar::I32)).name(),
            "Option<i32>"
        );
        assert_ne!(Shape::scalar(Scalar::I32), Shape::scalar(Scalar::I64));
    }

    #[test]
    fn test_definition_name_names_the_shape() {
        let color = Shape::enumeration(EnumDef::new("Color", Scalar::U8).variant("Red", 0));
        assert_eq!(color.name(), "Color");
        assert!(matches!(color.kind(), ShapeKind::Enum(_)));

        let bag = Shape::collection(CollectionDef::new("Bag", Shape::text()));
        assert_eq!(bag.name(), "Bag");
        assert_eq!(bag.element(), Some(&Shape::text()));

        assert_eq!(person().name(), "Person");
        assert_eq!(person().as_record().map(|def| def.name()), Some("Person"));
    }

    #[test]
    fn test_parent_chain() {
        let int = Shape::scalar(Scalar::I32);
        assert_eq!(int.parent().map(|p| p.name().to_string()), Some("value".into()));

        let employee = Shape::record(RecordDef::new("Employee").base(person()));
        assert_eq!(employee.parent(), Some(person()));
        assert_eq!(person().parent(), Some(Shape::any()));
        assert!(Shape::any().parent().is_none());
    }

    #[test]
    fn test_array_capabilities() {
        let array = Shape::array(Shape::text());
        let caps = array.capabilities();
        assert_eq!(caps.len(), 3);
        assert!(caps.contains(&Shape::sequence(Shape::text())));
    }

    #[test]
    fn test_list_capability_implies_sequence() {
        let list = Shape::capability(Capability::List, Shape::text());
        let caps = list.capabilities();
        assert!(caps.contains(&Shape::sequence(Shape::text())));
        assert!(!caps.contains(&list));
    }

    #[test]
    fn test_lazy_members_allow_recursion() {
        fn node() -> Shape {
            Shape::record(
                RecordDef::new("Node").members_with(|| {
                    vec![MemberDescriptor::new("children", Shape::array(node()))]
                }),
            )
        }

        let shape = node();
        let def = shape.as_record().expect("record");
        let children = def.find_member("children").expect("member");
        assert_eq!(children.shape().element(), Some(&node()));
    }

    #[test]
    fn test_enum_parse() {
        let def = EnumDef::new("Color", Scalar::U8)
            .variant("Red", 0)
            .variant("Green", 1)
            .variant("Blue", 2);

        assert_eq!(def.parse("Blue"), Ok(2));
        assert_eq!(def.parse("green"), Ok(1));
        assert_eq!(def.parse("7"), Ok(7));
        assert!(def.parse("Purple").is_err());
    }

    #[test]
    fn test_scalar_parse() {
        assert_eq!(Scalar::I16.parse("20"), Ok(Value::I16(20)));
        assert_eq!(Scalar::Bool.parse("TRUE"), Ok(Value::Bool(true)));
        assert!(Scalar::U8.parse("300").is_err());
        assert!(Scalar::Char.parse("ab").is_err());
    }
}
