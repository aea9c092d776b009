//! Parsing text into parseable shapes.

use super::{ConversionRequest, Strategy, Synthesizer};
use crate::error::{MapError, Result};
use crate::procedure::Procedure;
use crate::registry::Resolver;
use crate::shape::{ParseFn, Shape, ShapeKind};
use crate::value::{EnumValue, Value};
use std::sync::Arc;

/// Converts text (or optional text) to any shape with a parse operation.
///
/// Absent or blank input yields the target's default without calling the parser.
#[derive(Debug, Default)]
pub struct FromTextStrategy;

fn parser_for(target: &Shape) -> Option<ParseFn> {
    match target.kind() {
        ShapeKind::Scalar(scalar) => {
            let scalar = *scalar;
            Some(Arc::new(move |text: &str| scalar.parse(text)))
        }
        ShapeKind::Enum(def) => {
            let def = Arc::clone(def);
            Some(Arc::new(move |text: &str| {
                def.parse(text)
                    .map(|ordinal| Value::Enum(EnumValue::new(Arc::clone(&def), ordinal)))
            }))
        }
        ShapeKind::Record(def) => def.parser_fn().cloned(),
        _ => None,
    }
}

/// The target to parse into and whether the result is optional.
fn parse_target(target: &Shape) -> (&Shape, bool) {
    match target.optional_inner() {
        Some(inner) => (inner, true),
        None => (target, false),
    }
}

impl Strategy for FromTextStrategy {
    fn name(&self) -> &str {
        "from_text"
    }

    fn score(&self, request: &mut ConversionRequest, _resolver: &Resolver) -> Option<u32> {
        let source = request.source();
        if !source.is_text() && !source.optional_inner().is_some_and(Shape::is_text) {
            return None;
        }
        let (target, _) = parse_target(request.target());
        parser_for(target).map(|_| 1)
    }

    fn emit(&self, request: &ConversionRequest, _synth: &dyn Synthesizer) -> Result<Procedure> {
        let (target, optional) = parse_target(request.target());
        let parse = parser_for(target).ok_or_else(|| {
            MapError::unsupported(request.source(), request.target(), "target cannot be parsed")
        })?;
        let default = if optional { Value::Null } else { target.zero_value() };
        let shape_name = target.name().to_string();

        Ok(Procedure::new(
            request.source().clone(),
            request.target().clone(),
            move |value| match value {
                Value::Null => Ok(default.clone()),
                Value::Text(text) => {
                    let trimmed = text.trim();
                    if trimmed.is_empty() {
                        return Ok(default.clone());
                    }
                    parse(trimmed).map_err(|message| MapError::Parse {
                        shape: shape_name.clone(),
                        input: trimmed.to_string(),
                        message,
                    })
                }
                other => Err(MapError::mismatch("text", &other)),
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::shape::{EnumDef, RecordDef, Scalar};
    use crate::strategy::Strategy;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn emit(target: Shape) -> Procedure {
        let resolver = Registry::with_intrinsics().seal();
        let request = ConversionRequest::new(Shape::text(), target);
        FromTextStrategy
            .emit(&request, resolver.as_ref())
            .expect("should emit")
    }

    #[test]
    fn test_twenty_parses_into_every_numeric() {
        let numeric = Scalar::ALL
            .into_iter()
            .filter(|s| !matches!(s, Scalar::Bool | Scalar::Char));
        for scalar in numeric {
            let value = emit(Shape::scalar(scalar))
                .call(Value::from(" 20 "))
                .expect("should parse");
            assert_eq!(value.to_string(), "20", "{}", scalar.name());
            assert_eq!(value.scalar(), Some(scalar));
        }
    }

    #[test]
    fn test_blank_yields_default_without_parsing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let target = Shape::record(RecordDef::new("Token").parser(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::from("token"))
        }));

        let proc = emit(target);
        assert_eq!(proc.call(Value::Null).expect("null"), Value::Null);
        assert_eq!(proc.call(Value::from("   ")).expect("blank"), Value::Null);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(proc.call(Value::from("x")).expect("parsed"), Value::from("token"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_blank_into_scalar_is_zero() {
        let proc = emit(Shape::scalar(Scalar::I32));
        assert_eq!(proc.call(Value::from("")).expect("blank"), Value::I32(0));

        let proc = emit(Shape::optional(Shape::scalar(Scalar::I32)));
        assert_eq!(proc.call(Value::from("")).expect("blank"), Value::Null);
    }

    #[test]
    fn test_parse_failure_surfaces() {
        let err = emit(Shape::scalar(Scalar::U8))
            .call(Value::from("abc"))
            .expect_err("not a number");
        match err {
            MapError::Parse { shape, input, .. } => {
                assert_eq!(shape, "u8");
                assert_eq!(input, "abc");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_enum_by_name_and_ordinal() {
        let def = EnumDef::new("Size", Scalar::I32)
            .variant("Small", 1)
            .variant("Large", 9);
        let proc = emit(Shape::enumeration(def));
        let large = proc.call(Value::from("Large")).expect("by name");
        assert_eq!(large.as_integer(), Some(9));
        let small = proc.call(Value::from("1")).expect("by ordinal");
        assert_eq!(small.as_enum().and_then(|e| e.name()), Some("Small"));
    }

    #[test]
    fn test_not_applicable() {
        let resolver = Registry::with_intrinsics().seal();
        let mut request = ConversionRequest::new(Shape::scalar(Scalar::I32), Shape::scalar(Scalar::I64));
        assert_eq!(FromTextStrategy.score(&mut request, &resolver), None);

        let mut request = ConversionRequest::new(Shape::text(), Shape::text());
        assert_eq!(FromTextStrategy.score(&mut request, &resolver), None);
    }
}
