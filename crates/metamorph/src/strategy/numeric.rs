//! Numeric, nullable and enum conversions.
//!
//! Scoring and synthesis share one route tree, so the procedure always
//! performs exactly the conversion that was scored.

use super::{ConversionRequest, Strategy, Synthesizer, synthesize};
use crate::error::{MapError, Result};
use crate::oracle::find_conversion_operator;
use crate::procedure::Procedure;
use crate::registry::Resolver;
use crate::shape::{ConvertFn, EnumDef, Operator, Scalar, Shape};
use crate::value::{EnumValue, Value};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use std::sync::Arc;

/// Set on nested requests so this strategy does not answer them itself.
pub const NESTED_FLAG: &str = "numeric.nested";

/// Built-in strategy for scalars, optionals, enums and conversion operators.
#[derive(Debug, Default)]
pub struct NumericStrategy;

impl NumericStrategy {
    pub fn new() -> Self {
        Self
    }
}

enum Route {
    Identity,
    BothOptional(Box<Route>),
    UnwrapSource { zero: Value, inner: Box<Route> },
    WrapTarget(Box<Route>),
    FromEnum { underlying: Scalar, inner: Box<Route> },
    ToEnum { def: Arc<EnumDef>, inner: Box<Route> },
    Native { to: Scalar },
    Operator(Operator),
    Nested(ConversionRequest),
}

fn plan(source: &Shape, target: &Shape, depth: u32, resolver: &Resolver) -> Option<(Route, u32)> {
    if source == target {
        return Some((Route::Identity, 0));
    }

    match (source.optional_inner(), target.optional_inner()) {
        (Some(s), Some(t)) => {
            let (inner, score) = plan(s, t, depth + 1, resolver)?;
            return Some((Route::BothOptional(Box::new(inner)), score + 2));
        }
        (Some(s), None) => {
            let (inner, score) = plan(s, target, depth + 1, resolver)?;
            let route = Route::UnwrapSource {
                zero: target.zero_value(),
                inner: Box::new(inner),
            };
            return Some((route, score + 1));
        }
        (None, Some(t)) => {
            let (inner, score) = plan(source, t, depth + 1, resolver)?;
            return Some((Route::WrapTarget(Box::new(inner)), score + 1));
        }
        (None, None) => {}
    }

    if let Some(def) = source.as_enum() {
        let underlying = def.underlying();
        let (inner, score) = plan(&Shape::scalar(underlying), target, depth + 1, resolver)?;
        let route = Route::FromEnum {
            underlying,
            inner: Box::new(inner),
        };
        return Some((route, score + 1));
    }
    if let Some(def) = target.as_enum() {
        let (inner, score) = plan(source, &Shape::scalar(def.underlying()), depth + 1, resolver)?;
        let route = Route::ToEnum {
            def: Arc::clone(def),
            inner: Box::new(inner),
        };
        return Some((route, score + 1));
    }

    if let (Some(_), Some(to)) = (source.as_scalar(), target.as_scalar()) {
        return Some((Route::Native { to }, 1));
    }
    if let Some(op) = find_conversion_operator(source, target) {
        return Some((Route::Operator(op), 1));
    }

    if depth == 0 {
        return None;
    }
    let nested = ConversionRequest::new(source.clone(), target.clone()).with_flag(NESTED_FLAG);
    let resolution = resolver.resolve(&nested)?;
    Some((Route::Nested(nested), resolution.score() + 1))
}

fn compile(route: Route, source: &Shape, target: &Shape, synth: &dyn Synthesizer) -> Result<ConvertFn> {
    let body: ConvertFn = match route {
        Route::Identity => Arc::new(|value| Ok(value)),
        Route::BothOptional(inner) => {
            let f = compile(*inner, source, target, synth)?;
            Arc::new(move |value| match value {
                Value::Null => Ok(Value::Null),
                other => f(other),
            })
        }
        Route::UnwrapSource { zero, inner } => {
            let f = compile(*inner, source, target, synth)?;
            Arc::new(move |value| match value {
                Value::Null => Ok(zero.clone()),
                other => f(other),
            })
        }
        Route::WrapTarget(inner) => compile(*inner, source, target, synth)?,
        Route::FromEnum { underlying, inner } => {
            let f = compile(*inner, source, target, synth)?;
            let (from, to) = (source.clone(), target.clone());
            Arc::new(move |value| match value {
                Value::Enum(e) => {
                    let raw = cast_scalar(&Value::I64(e.ordinal()), underlying)
                        .map_err(|message| MapError::conversion(&from, &to, message))?;
                    f(raw)
                }
                other => f(other),
            })
        }
        Route::ToEnum { def, inner } => {
            let f = compile(*inner, source, target, synth)?;
            Arc::new(move |value| {
                let raw = f(value)?;
                let ordinal = raw
                    .as_integer()
                    .ok_or_else(|| MapError::mismatch(def.underlying().name(), &raw))?;
                Ok(Value::Enum(EnumValue::new(Arc::clone(&def), ordinal as i64)))
            })
        }
        Route::Native { to } => {
            let (from, target) = (source.clone(), target.clone());
            Arc::new(move |value| {
                if value.scalar().is_none() {
                    return Err(MapError::mismatch(&from, &value));
                }
                cast_scalar(&value, to).map_err(|message| MapError::conversion(&from, &target, message))
            })
        }
        Route::Operator(op) => Arc::clone(op.func()),
        Route::Nested(request) => {
            let procedure = synthesize(&request, synth)?;
            Arc::new(move |value| procedure.call(value))
        }
    };
    Ok(body)
}

impl Strategy for NumericStrategy {
    fn name(&self) -> &str {
        "numeric"
    }

    fn score(&self, request: &mut ConversionRequest, resolver: &Resolver) -> Option<u32> {
        if request.flag(NESTED_FLAG) {
            return None;
        }
        plan(request.source(), request.target(), 0, resolver).map(|(_, score)| score)
    }

    fn emit(&self, request: &ConversionRequest, synth: &dyn Synthesizer) -> Result<Procedure> {
        let (source, target) = (request.source(), request.target());
        let (route, _) = plan(source, target, 0, synth.resolver())
            .ok_or_else(|| MapError::unsupported(source, target, "not a numeric conversion"))?;
        let body = compile(route, source, target, synth)?;
        Ok(Procedure::from_fn(source.clone(), target.clone(), body))
    }
}

enum Num {
    I(i128),
    F32(f32),
    F64(f64),
    D(Decimal),
}

fn to_num(value: &Value) -> Option<Num> {
    Some(match value {
        Value::Bool(b) => Num::I(*b as i128),
        Value::Char(c) => Num::I(*c as u32 as i128),
        Value::F32(f) => Num::F32(*f),
        Value::F64(f) => Num::F64(*f),
        Value::Decimal(d) => Num::D(*d),
        other => Num::I(other.as_integer()?),
    })
}

macro_rules! cast_int {
    ($num:expr, $ty:ty, $to:expr) => {
        match $num {
            Num::I(n) => n as $ty,
            Num::F32(f) => f as $ty,
            Num::F64(f) => f as $ty,
            Num::D(d) => d
                .trunc()
                .to_i128()
                .and_then(|n| <$ty>::try_from(n).ok())
                .ok_or_else(|| format!("{d} is out of range for {}", $to.name()))?,
        }
    };
}

/// Convert a native scalar value to another scalar kind.
///
/// Integer narrowing truncates, widening extends per the source's signedness,
/// and floats convert towards zero with saturation, all as Rust `as` casts do.
/// Decimals convert numerically and fail when out of range.
pub fn cast_scalar(value: &Value, to: Scalar) -> std::result::Result<Value, String> {
    let num = to_num(value).ok_or_else(|| format!("{} is not numeric", value.describe()))?;
    Ok(match to {
        Scalar::Bool => Value::Bool(match num {
            Num::I(n) => n != 0,
            Num::F32(f) => f != 0.0,
            Num::F64(f) => f != 0.0,
            Num::D(d) => !d.is_zero(),
        }),
        Scalar::Char => {
            let code = cast_int!(num, u32, to);
            Value::Char(char::from_u32(code).ok_or_else(|| format!("{code:#x} is not a valid code point"))?)
        }
        Scalar::I8 => Value::I8(cast_int!(num, i8, to)),
        Scalar::I16 => Value::I16(cast_int!(num, i16, to)),
        Scalar::I32 => Value::I32(cast_int!(num, i32, to)),
        Scalar::I64 => Value::I64(cast_int!(num, i64, to)),
        Scalar::U8 => Value::U8(cast_int!(num, u8, to)),
        Scalar::U16 => Value::U16(cast_int!(num, u16, to)),
        Scalar::U32 => Value::U32(cast_int!(num, u32, to)),
        Scalar::U64 => Value::U64(cast_int!(num, u64, to)),
        Scalar::F32 => Value::F32(match num {
            Num::I(n) => n as f32,
            Num::F32(f) => f,
            Num::F64(f) => f as f32,
            Num::D(d) => d.to_f32().ok_or_else(|| format!("{d} is not representable as f32"))?,
        }),
        Scalar::F64 => Value::F64(match num {
            Num::I(n) => n as f64,
            Num::F32(f) => f as f64,
            Num::F64(f) => f,
            Num::D(d) => d.to_f64().ok_or_else(|| format!("{d} is not representable as f64"))?,
        }),
        Scalar::Decimal => Value::Decimal(match num {
            Num::I(n) => Decimal::from_i128(n),
            Num::F32(f) => Decimal::from_f32(f),
            Num::F64(f) => Decimal::from_f64(f),
            Num::D(d) => Some(d),
        }
        .ok_or_else(|| "value is not representable as a decimal".to_string())?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::shape::{OperatorKind, RecordDef};
    use crate::strategy::Strategy;
    use proptest::prelude::*;

    fn resolver() -> Arc<Resolver> {
        Registry::with_intrinsics().seal()
    }

    fn scalar(s: Scalar) -> Shape {
        Shape::scalar(s)
    }

    fn score(source: Shape, target: Shape) -> Option<u32> {
        let resolver = resolver();
        let mut request = ConversionRequest::new(source, target);
        NumericStrategy.score(&mut request, &resolver)
    }

    fn convert(source: Shape, target: Shape, value: Value) -> Result<Value> {
        let resolver = resolver();
        let request = ConversionRequest::new(source, target);
        NumericStrategy.emit(&request, resolver.as_ref())?.call(value)
    }

    fn color() -> Shape {
        Shape::enumeration(
            EnumDef::new("Color", Scalar::U8)
                .variant("Red", 0)
                .variant("Green", 1),
        )
    }

    #[test]
    fn test_scores() {
        let int = scalar(Scalar::I32);
        assert_eq!(score(int.clone(), int.clone()), Some(0));
        assert_eq!(score(int.clone(), scalar(Scalar::I64)), Some(1));
        assert_eq!(score(Shape::optional(int.clone()), int.clone()), Some(1));
        assert_eq!(
            score(Shape::optional(int.clone()), Shape::optional(scalar(Scalar::U8))),
            Some(3)
        );
        assert_eq!(score(color(), int.clone()), Some(2));
        assert_eq!(score(Shape::optional(color()), int.clone()), Some(3));
        assert_eq!(score(Shape::text(), int), None);
    }

    #[test]
    fn test_absent_optional_yields_zero() {
        let int = scalar(Scalar::I32);
        let value = convert(Shape::optional(int.clone()), int.clone(), Value::Null).expect("zero");
        assert_eq!(value, Value::I32(0));

        let value = convert(Shape::optional(int.clone()), Shape::optional(int), Value::Null)
            .expect("null stays null");
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn test_enum_round_trip() {
        let value = convert(color(), scalar(Scalar::I64), Value::ordinal(&color(), 1))
            .expect("enum to int");
        assert_eq!(value, Value::I64(1));

        let value = convert(scalar(Scalar::I64), color(), Value::I64(1)).expect("int to enum");
        assert_eq!(value.as_enum().and_then(|e| e.name()), Some("Green"));
    }

    #[test]
    fn test_bool_and_char() {
        assert_eq!(cast_scalar(&Value::Bool(true), Scalar::U8), Ok(Value::U8(1)));
        assert_eq!(cast_scalar(&Value::I32(0), Scalar::Bool), Ok(Value::Bool(false)));
        assert_eq!(cast_scalar(&Value::Char('A'), Scalar::U16), Ok(Value::U16(65)));
        assert_eq!(cast_scalar(&Value::U32(97), Scalar::Char), Ok(Value::Char('a')));
        assert!(cast_scalar(&Value::U32(0xD800), Scalar::Char).is_err());
    }

    #[test]
    fn test_decimal_conversions() {
        let d = Decimal::new(12345, 2);
        assert_eq!(cast_scalar(&Value::Decimal(d), Scalar::I32), Ok(Value::I32(123)));
        assert_eq!(cast_scalar(&Value::I16(-7), Scalar::Decimal), Ok(Value::Decimal(Decimal::from(-7))));
        assert!(cast_scalar(&Value::Decimal(Decimal::from(300)), Scalar::U8).is_err());
        assert!(cast_scalar(&Value::F64(f64::NAN), Scalar::Decimal).is_err());
    }

    #[test]
    fn test_operator_route() {
        let meters = Shape::record(RecordDef::new("Meters"));
        let feet = Shape::record(RecordDef::new("Feet").operator(Operator::new(
            meters.clone(),
            Shape::record(RecordDef::new("Feet")),
            OperatorKind::Explicit,
            |_| Ok(Value::from("converted")),
        )));
        assert_eq!(score(meters.clone(), feet.clone()), Some(1));
        assert_eq!(
            convert(meters, feet, Value::Null).expect("operator"),
            Value::from("converted")
        );
    }

    #[test]
    fn test_nested_flag_disables_strategy() {
        let resolver = resolver();
        let mut request = ConversionRequest::new(scalar(Scalar::I8), scalar(Scalar::I16))
            .with_flag(NESTED_FLAG);
        assert_eq!(NumericStrategy.score(&mut request, &resolver), None);
    }

    proptest! {
        #[test]
        fn prop_integer_narrowing_matches_as(n in any::<i64>()) {
            prop_assert_eq!(cast_scalar(&Value::I64(n), Scalar::I8), Ok(Value::I8(n as i8)));
            prop_assert_eq!(cast_scalar(&Value::I64(n), Scalar::U16), Ok(Value::U16(n as u16)));
            prop_assert_eq!(cast_scalar(&Value::I64(n), Scalar::U64), Ok(Value::U64(n as u64)));
        }

        #[test]
        fn prop_widening_extends_by_source_sign(n in any::<i8>(), m in any::<u8>()) {
            prop_assert_eq!(cast_scalar(&Value::I8(n), Scalar::U32), Ok(Value::U32(n as u32)));
            prop_assert_eq!(cast_scalar(&Value::U8(m), Scalar::I64), Ok(Value::I64(m as i64)));
        }

        #[test]
        fn prop_float_to_int_matches_as(f in any::<f64>()) {
            prop_assert_eq!(cast_scalar(&Value::F64(f), Scalar::I32), Ok(Value::I32(f as i32)));
            prop_assert_eq!(cast_scalar(&Value::F64(f), Scalar::U8), Ok(Value::U8(f as u8)));
        }
    }
}
