//! Conversion strategies.
//!
//! A strategy scores how well it handles a (source, target) pair and, when
//! chosen, emits a specialized [`Procedure`] for it. Lower scores win; `None`
//! means the strategy does not apply.

mod from_text;
mod function;
mod numeric;
mod sequence;
mod to_text;

pub use from_text::FromTextStrategy;
pub use function::FunctionStrategy;
pub use numeric::{NumericStrategy, cast_scalar};
pub use sequence::SequenceStrategy;
pub(crate) use sequence::convert_elements;
pub use to_text::ToTextStrategy;

use crate::error::{MapError, Result};
use crate::procedure::Procedure;
use crate::registry::Resolver;
use crate::shape::Shape;
use indexmap::IndexMap;

/// A (source, target) pair plus strategy-private flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    source: Shape,
    target: Shape,
    props: IndexMap<String, bool>,
}

impl ConversionRequest {
    pub fn new(source: Shape, target: Shape) -> Self {
        Self {
            source,
            target,
            props: IndexMap::new(),
        }
    }

    pub fn with_flag(mut self, key: impl Into<String>) -> Self {
        self.set_flag(key);
        self
    }

    pub fn source(&self) -> &Shape {
        &self.source
    }

    pub fn target(&self) -> &Shape {
        &self.target
    }

    pub fn flag(&self, key: &str) -> bool {
        self.props.get(key).copied().unwrap_or(false)
    }

    pub fn set_flag(&mut self, key: impl Into<String>) {
        self.props.insert(key.into(), true);
    }

    /// Set flags in a canonical order.
    pub(crate) fn flags(&self) -> Vec<String> {
        let mut flags: Vec<String> = self
            .props
            .iter()
            .filter(|(_, set)| **set)
            .map(|(key, _)| key.clone())
            .collect();
        flags.sort();
        flags
    }
}

/// A pluggable conversion strategy.
pub trait Strategy: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Built-in strategies lose ties against user-registered ones.
    fn is_intrinsic(&self) -> bool {
        true
    }

    /// One-time setup, run when the owning registry seals.
    fn prepare(&self) {}

    /// Score the request, or `None` when not applicable.
    ///
    /// The request may be annotated with flags that `emit` later reads.
    fn score(&self, request: &mut ConversionRequest, resolver: &Resolver) -> Option<u32>;

    /// Build the procedure for a request this strategy scored.
    fn emit(&self, request: &ConversionRequest, synth: &dyn Synthesizer) -> Result<Procedure>;
}

/// What strategies compile their sub-conversions through.
pub trait Synthesizer {
    /// Compile the full conversion for a pair, as a top-level request would.
    fn compile(&self, source: &Shape, target: &Shape) -> Result<Procedure>;

    fn resolver(&self) -> &Resolver;

    /// Sequence length at which elements convert in parallel.
    fn parallel_threshold(&self) -> usize {
        usize::MAX
    }
}

/// Resolve and emit a flagged request without going through a procedure cache.
pub fn synthesize(request: &ConversionRequest, synth: &dyn Synthesizer) -> Result<Procedure> {
    let resolution = synth.resolver().resolve(request).ok_or_else(|| {
        MapError::unsupported(request.source(), request.target(), "no strategy applies")
    })?;
    resolution.emit(synth)
}
