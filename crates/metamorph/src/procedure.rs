//! Compiled procedures.
//!
//! A `Procedure` is the callable a strategy or structured plan synthesizes for
//! one (source, target) pair. It is a composed closure: no strategy lookup
//! happens when it runs.

use crate::error::{MapError, Result};
use crate::shape::{ConvertFn, Shape};
use crate::value::Value;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

/// Populates an existing destination value in place.
pub type IntoFn = Arc<dyn Fn(Value, &mut Value) -> Result<()> + Send + Sync>;

/// Slot a procedure is published into once synthesized.
pub(crate) type Slot = OnceLock<Result<Procedure>>;

/// A synthesized conversion from one shape to another.
#[derive(Clone)]
pub struct Procedure {
    source: Shape,
    target: Shape,
    body: ConvertFn,
    into: Option<IntoFn>,
}

impl Procedure {
    pub fn new(
        source: Shape,
        target: Shape,
        body: impl Fn(Value) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self::from_fn(source, target, Arc::new(body))
    }

    pub fn from_fn(source: Shape, target: Shape, body: ConvertFn) -> Self {
        Self {
            source,
            target,
            body,
            into: None,
        }
    }

    /// Returns the input unchanged.
    pub fn identity(shape: Shape) -> Self {
        Self::new(shape.clone(), shape, Ok)
    }

    /// Attach an in-place population routine used by [`call_into`](Self::call_into).
    pub fn with_into(
        mut self,
        into: impl Fn(Value, &mut Value) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.into = Some(Arc::new(into));
        self
    }

    /// A link to a procedure whose synthesis is still in progress.
    ///
    /// Resolves through the slot on every call, so a recursive shape can refer
    /// to its own procedure before that procedure exists.
    pub(crate) fn deferred(source: Shape, target: Shape, slot: Weak<Slot>) -> Self {
        let into_slot = slot.clone();
        Self::new(source, target, move |value| resolve_slot(&slot)?.call(value)).with_into(
            move |value, dest| resolve_slot(&into_slot)?.call_into(value, dest),
        )
    }

    pub fn source(&self) -> &Shape {
        &self.source
    }

    pub fn target(&self) -> &Shape {
        &self.target
    }

    pub fn call(&self, value: Value) -> Result<Value> {
        (self.body)(value)
    }

    /// Convert into an existing destination, keeping what the conversion does not touch.
    pub fn call_into(&self, value: Value, dest: &mut Value) -> Result<()> {
        match &self.into {
            Some(into) => into(value, dest),
            None => {
                *dest = self.call(value)?;
                Ok(())
            }
        }
    }

    /// Whether both handles share the same compiled body.
    pub fn ptr_eq(&self, other: &Procedure) -> bool {
        Arc::ptr_eq(&self.body, &other.body)
    }
}

fn resolve_slot(slot: &Weak<Slot>) -> Result<Procedure> {
    let slot = slot
        .upgrade()
        .ok_or_else(|| MapError::configuration("procedure cache was dropped"))?;
    match slot.get() {
        Some(result) => result.clone(),
        None => Err(MapError::configuration(
            "procedure invoked before its synthesis completed",
        )),
    }
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Procedure({} -> {})", self.source, self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Scalar;

    #[test]
    fn test_identity() {
        let proc = Procedure::identity(Shape::text());
        assert_eq!(proc.call(Value::from("x")).expect("identity"), Value::from("x"));
        assert!(proc.ptr_eq(&proc.clone()));
        assert!(!proc.ptr_eq(&Procedure::identity(Shape::text())));
    }

    #[test]
    fn test_call_into_default_replaces() {
        let proc = Procedure::new(Shape::text(), Shape::scalar(Scalar::I32), |_| Ok(Value::I32(3)));
        let mut dest = Value::Null;
        proc.call_into(Value::from("3"), &mut dest).expect("should convert");
        assert_eq!(dest, Value::I32(3));
    }

    #[test]
    fn test_deferred_resolves_after_publish() {
        let slot: Arc<Slot> = Arc::new(OnceLock::new());
        let link = Procedure::deferred(Shape::text(), Shape::text(), Arc::downgrade(&slot));

        assert!(matches!(link.call(Value::Null), Err(MapError::Configuration(_))));

        let _ = slot.set(Ok(Procedure::new(Shape::text(), Shape::text(), |_| {
            Ok(Value::from("done"))
        })));
        assert_eq!(link.call(Value::Null).expect("published"), Value::from("done"));

        drop(slot);
        assert!(link.call(Value::Null).is_err());
    }
}
