//! User-supplied conversion functions.

use super::{ConversionRequest, Strategy, Synthesizer};
use crate::error::Result;
use crate::oracle::distance;
use crate::procedure::Procedure;
use crate::reflect::Reflect;
use crate::registry::Resolver;
use crate::shape::{ConvertFn, Shape};
use crate::value::Value;
use std::sync::Arc;

/// A registered function for one exact (source, target) pair.
pub struct FunctionStrategy {
    name: String,
    source: Shape,
    target: Shape,
    func: ConvertFn,
}

impl FunctionStrategy {
    pub fn new(
        source: Shape,
        target: Shape,
        func: impl Fn(Value) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: format!("fn({source} -> {target})"),
            source,
            target,
            func: Arc::new(func),
        }
    }

    /// Wrap a typed function.
    pub fn typed<S, T>(func: impl Fn(S) -> T + Send + Sync + 'static) -> Self
    where
        S: Reflect,
        T: Reflect,
    {
        Self::new(S::shape(), T::shape(), move |value| {
            S::from_value(value).map(|s| func(s).to_value())
        })
    }
}

impl Strategy for FunctionStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_intrinsic(&self) -> bool {
        false
    }

    fn score(&self, request: &mut ConversionRequest, _resolver: &Resolver) -> Option<u32> {
        let exact = distance(request.source(), &self.source) == Some(0)
            && distance(request.target(), &self.target) == Some(0);
        exact.then_some(0)
    }

    fn emit(&self, _request: &ConversionRequest, _synth: &dyn Synthesizer) -> Result<Procedure> {
        Ok(Procedure::from_fn(
            self.source.clone(),
            self.target.clone(),
            Arc::clone(&self.func),
        ))
    }
}
