//! Rendering any value as text.

use super::{ConversionRequest, Strategy, Synthesizer};
use crate::error::Result;
use crate::oracle::distance;
use crate::procedure::Procedure;
use crate::registry::Resolver;
use crate::shape::Shape;
use crate::value::Value;

/// Converts anything to text; more derived sources score higher.
#[derive(Debug, Default)]
pub struct ToTextStrategy;

/// Textual form of a value, honoring record formatters.
pub fn render(value: &Value) -> String {
    if let Value::Record(record) = value {
        if let Some(format) = record.shape().as_record().and_then(|def| def.formatter_fn()) {
            return format(value);
        }
    }
    value.to_string()
}

impl Strategy for ToTextStrategy {
    fn name(&self) -> &str {
        "to_text"
    }

    fn score(&self, request: &mut ConversionRequest, _resolver: &Resolver) -> Option<u32> {
        let target = request.target();
        if !target.is_text() && !target.optional_inner().is_some_and(Shape::is_text) {
            return None;
        }
        distance(request.source(), &Shape::any())
    }

    fn emit(&self, request: &ConversionRequest, _synth: &dyn Synthesizer) -> Result<Procedure> {
        Ok(Procedure::new(
            request.source().clone(),
            request.target().clone(),
            |value| {
                Ok(match value {
                    Value::Null => Value::Null,
                    Value::Text(text) => Value::Text(text),
                    other => Value::Text(render(&other)),
                })
            },
        ))
    }
}
