//! Sequence and collection materialization.

use super::{ConversionRequest, Strategy, Synthesizer};
use crate::error::{MapError, Result};
use crate::oracle::distance;
use crate::procedure::Procedure;
use crate::registry::Resolver;
use crate::shape::{SequenceCtor, Shape, ShapeKind};
use crate::value::Value;
use std::sync::Arc;

/// Converts between any two shapes exposing `Sequence<element>`.
///
/// Elements convert through the full mapper, so structured elements work.
#[derive(Debug, Default)]
pub struct SequenceStrategy;

fn sequence_distance(shape: &Shape) -> Option<u32> {
    let element = shape.element()?;
    distance(shape, &Shape::sequence(element.clone()))
}

/// How the converted elements become a target value.
fn materializer(source: &Shape, target: &Shape) -> Result<SequenceCtor> {
    match target.kind() {
        ShapeKind::Capability(..) | ShapeKind::Array(_) => Ok(Arc::new(|items| Ok(Value::Seq(items)))),
        ShapeKind::Collection(def) => {
            if let Some(ctor) = def.from_sequence_fn() {
                return Ok(Arc::clone(ctor));
            }
            if let Some((create, append)) = def.default_append_fns() {
                let (create, append) = (Arc::clone(create), Arc::clone(append));
                return Ok(Arc::new(move |items| {
                    let mut out = create();
                    for item in items {
                        append(&mut out, item)?;
                    }
                    Ok(out)
                }));
            }
            Err(MapError::unsupported(
                source,
                target,
                "collection declares neither a from-sequence constructor nor default construction with append",
            ))
        }
        _ => Err(MapError::unsupported(source, target, "target is not a sequence")),
    }
}

/// Convert every element in order, in parallel past `threshold` when enabled.
pub(crate) fn convert_elements(items: Vec<Value>, element: &Procedure, threshold: usize) -> Result<Vec<Value>> {
    let convert = |(index, item): (usize, Value)| {
        element
            .call(item)
            .map_err(|e| e.in_member(format!("[{index}]")))
    };

    #[cfg(feature = "parallel")]
    if items.len() >= threshold {
        use rayon::prelude::*;
        return items.into_par_iter().enumerate().map(convert).collect();
    }
    #[cfg(not(feature = "parallel"))]
    let _ = threshold;

    items.into_iter().enumerate().map(convert).collect()
}

impl Strategy for SequenceStrategy {
    fn name(&self) -> &str {
        "sequence"
    }

    fn score(&self, request: &mut ConversionRequest, _resolver: &Resolver) -> Option<u32> {
        Some(sequence_distance(request.source())? + sequence_distance(request.target())?)
    }

    fn emit(&self, request: &ConversionRequest, synth: &dyn Synthesizer) -> Result<Procedure> {
        let (source, target) = (request.source(), request.target());
        let (Some(source_element), Some(target_element)) = (source.element(), target.element()) else {
            return Err(MapError::unsupported(source, target, "not a sequence pair"));
        };

        let materialize = materializer(source, target)?;
        let element = synth.compile(source_element, target_element)?;
        let iterate = source.as_collection().and_then(|def| def.iterate_fn().cloned());
        let threshold = synth.parallel_threshold();
        let source_name = source.clone();

        Ok(Procedure::new(source.clone(), target.clone(), move |value| {
            let items = match value {
                Value::Null => return Ok(Value::Null),
                Value::Seq(items) => items,
                other => match &iterate {
                    Some(iterate) => iterate(&other)?,
                    None => return Err(MapError::mismatch(&source_name, &other)),
                },
            };
            materialize(convert_elements(items, &element, threshold)?)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::shape::{Capability, CollectionDef, Scalar};
    use crate::strategy::Strategy;

    fn int() -> Shape {
        Shape::scalar(Scalar::I32)
    }

    fn score(source: Shape, target: Shape) -> Option<u32> {
        let resolver = Registry::with_intrinsics().seal();
        SequenceStrategy.score(&mut ConversionRequest::new(source, target), &resolver)
    }

    #[test]
    fn test_scores() {
        let seq = Shape::sequence(int());
        assert_eq!(score(seq.clone(), seq.clone()), Some(0));
        assert_eq!(score(Shape::array(int()), seq.clone()), Some(1));
        assert_eq!(score(Shape::array(int()), Shape::array(Shape::text())), Some(2));
        assert_eq!(score(int(), seq), None);
        assert_eq!(score(Shape::text(), Shape::array(int())), None);
    }

    #[test]
    fn test_element_conversion_preserves_order() {
        let resolver = Registry::with_intrinsics().seal();
        let request = ConversionRequest::new(
            Shape::array(int()),
            Shape::capability(Capability::List, Shape::text()),
        );
        let proc = SequenceStrategy
            .emit(&request, resolver.as_ref())
            .expect("should emit");
        let out = proc
            .call(Value::Seq(vec![Value::I32(3), Value::I32(1), Value::I32(2)]))
            .expect("should convert");
        assert_eq!(
            out,
            Value::Seq(vec![Value::from("3"), Value::from("1"), Value::from("2")])
        );
    }

    #[test]
    fn test_unbuildable_collection_is_unsupported() {
        let resolver = Registry::with_intrinsics().seal();
        let bag = Shape::collection(CollectionDef::new("Bag<i32>", int()));
        let request = ConversionRequest::new(Shape::array(int()), bag);
        let err = SequenceStrategy
            .emit(&request, resolver.as_ref())
            .expect_err("cannot materialize");
        assert!(matches!(err, MapError::Unsupported { .. }));
    }

    #[test]
    fn test_element_failure_names_index() {
        let resolver = Registry::with_intrinsics().seal();
        let request = ConversionRequest::new(Shape::array(Shape::text()), Shape::array(int()));
        let proc = SequenceStrategy
            .emit(&request, resolver.as_ref())
            .expect("should emit");
        let err = proc
            .call(Value::Seq(vec![Value::from("1"), Value::from("x")]))
            .expect_err("second element is not a number");
        match err {
            MapError::Member { member, .. } => assert_eq!(member, "[1]"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
