//! Type-compatibility scoring.
//!
//! `distance` answers "how far is `source` from being usable as `target`";
//! strategies build their scores on top of it.

use crate::shape::{Operator, OperatorKind, Shape, ShapeKind};

/// Ancestor distance from `source` to `target`, or `None` when incompatible.
///
/// For capability targets the answer is 0 when the source is that capability,
/// else the number of matching capability implementations on the source.
/// For concrete targets it is the number of parent steps up to the match.
pub fn distance(source: &Shape, target: &Shape) -> Option<u32> {
    if let ShapeKind::Capability(..) = target.kind() {
        if source == target {
            return Some(0);
        }
        let count = source
            .capabilities()
            .iter()
            .filter(|cap| *cap == target)
            .count() as u32;
        return (count > 0).then_some(count);
    }

    let mut steps = 0;
    let mut current = source.clone();
    loop {
        if &current == target {
            return Some(steps);
        }
        current = current.parent()?;
        steps += 1;
    }
}

/// Whether `source` derives from (or is) `target`.
pub fn derives_from(source: &Shape, target: &Shape) -> bool {
    distance(source, target).is_some()
}

/// Find a declared conversion operator from `source` to `target`.
///
/// Implicit operators win over explicit ones; within a kind the target's
/// declarations are consulted before the source's.
pub fn find_conversion_operator(source: &Shape, target: &Shape) -> Option<Operator> {
    [OperatorKind::Implicit, OperatorKind::Explicit]
        .into_iter()
        .find_map(|kind| {
            [target, source].into_iter().find_map(|owner| {
                owner
                    .operators()
                    .into_iter()
                    .find(|op| op.kind() == kind && op.from() == source && op.to() == target)
                    .cloned()
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::shape::{Capability, EnumDef, RecordDef, Scalar};
    use crate::value::Value;

    fn animal() -> Shape {
        Shape::record(RecordDef::new("Animal"))
    }

    fn dog() -> Shape {
        Shape::record(RecordDef::new("Dog").base(animal()))
    }

    #[test]
    fn test_identical_shapes() {
        assert_eq!(distance(&dog(), &dog()), Some(0));
        assert_eq!(distance(&Shape::text(), &Shape::text()), Some(0));
    }

    #[test]
    fn test_ancestor_steps() {
        assert_eq!(distance(&dog(), &animal()), Some(1));
        assert_eq!(distance(&dog(), &Shape::any()), Some(2));
        assert_eq!(distance(&animal(), &dog()), None);
    }

    #[test]
    fn test_scalar_and_enum_ancestry() {
        let int = Shape::scalar(Scalar::I32);
        assert_eq!(distance(&int, &Shape::any()), Some(2));
        assert_eq!(distance(&Shape::optional(int.clone()), &Shape::any()), Some(2));

        let color = Shape::enumeration(EnumDef::new("Color", Scalar::I32));
        assert_eq!(distance(&color, &Shape::any()), Some(3));
        assert_eq!(distance(&Shape::text(), &Shape::any()), Some(1));
        assert_eq!(distance(&int, &Shape::text()), None);
    }

    #[test]
    fn test_capability_targets() {
        let elem = Shape::scalar(Scalar::U8);
        let seq = Shape::sequence(elem.clone());
        assert_eq!(distance(&seq, &seq), Some(0));
        assert_eq!(distance(&Shape::array(elem.clone()), &seq), Some(1));
        assert_eq!(
            distance(&Shape::capability(Capability::List, elem.clone()), &seq),
            Some(1)
        );
        assert_eq!(distance(&elem, &seq), None);
        assert_eq!(distance(&Shape::array(Shape::text()), &seq), None);
    }

    fn celsius() -> Shape {
        Shape::record(RecordDef::new("Celsius"))
    }

    fn fahrenheit() -> Shape {
        Shape::record(
            RecordDef::new("Fahrenheit")
                .operator(Operator::new(
                    celsius(),
                    Shape::record(RecordDef::new("Fahrenheit")),
                    OperatorKind::Explicit,
                    |_| Ok(Value::from("explicit")),
                ))
                .operator(Operator::new(
                    celsius(),
                    Shape::record(RecordDef::new("Fahrenheit")),
                    OperatorKind::Implicit,
                    |_| Ok(Value::from("implicit")),
                )),
        )
    }

    #[test]
    fn test_implicit_operator_preferred() -> Result<()> {
        let op = find_conversion_operator(&celsius(), &fahrenheit()).expect("should find operator");
        assert_eq!(op.kind(), OperatorKind::Implicit);
        assert_eq!((op.func())(Value::Null)?, Value::from("implicit"));
        assert!(find_conversion_operator(&fahrenheit(), &celsius()).is_none());
        Ok(())
    }
}
