//! Strategy registry and resolver.
//!
//! A [`Registry`] collects strategies while open. Sealing it yields a shared
//! [`Resolver`] that picks the best strategy per request and caches the answer.

use crate::error::{MapError, Result};
use crate::procedure::Procedure;
use crate::shape::Shape;
use crate::strategy::{
    ConversionRequest, FromTextStrategy, NumericStrategy, SequenceStrategy, Strategy, Synthesizer,
    ToTextStrategy,
};
use dashmap::DashMap;
use std::sync::Arc;

/// Ordered collection of strategies with a one-way sealed transition.
pub struct Registry {
    strategies: Vec<Arc<dyn Strategy>>,
    sealed: Option<Arc<Resolver>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
            sealed: None,
        }
    }

    /// Registry preloaded with the built-in strategies.
    pub fn with_intrinsics() -> Self {
        let mut registry = Self::new();
        registry.strategies = vec![
            Arc::new(NumericStrategy::new()),
            Arc::new(FromTextStrategy),
            Arc::new(ToTextStrategy),
            Arc::new(SequenceStrategy),
        ];
        registry
    }

    /// Append a strategy. Fails once the registry is sealed.
    pub fn register(&mut self, strategy: impl Strategy + 'static) -> Result<()> {
        self.register_arc(Arc::new(strategy))
    }

    pub fn register_arc(&mut self, strategy: Arc<dyn Strategy>) -> Result<()> {
        if self.is_sealed() {
            return Err(MapError::configuration(format!(
                "cannot register strategy `{}`: registry is sealed",
                strategy.name()
            )));
        }
        self.strategies.push(strategy);
        Ok(())
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.is_some()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Seal the registry, preparing every strategy exactly once.
    ///
    /// Idempotent: later calls return the same resolver.
    pub fn seal(&mut self) -> Arc<Resolver> {
        if let Some(resolver) = &self.sealed {
            return Arc::clone(resolver);
        }
        for strategy in &self.strategies {
            strategy.prepare();
        }
        tracing::debug!(strategies = self.strategies.len(), "registry sealed");
        let resolver = Arc::new(Resolver::new(self.strategies.clone()));
        self.sealed = Some(Arc::clone(&resolver));
        resolver
    }

    /// Resolve a request. Before sealing nothing is cached.
    pub fn resolve(&self, request: &ConversionRequest) -> Option<Resolution> {
        match &self.sealed {
            Some(resolver) => resolver.resolve(request),
            None => Resolver::new(self.strategies.clone()).resolve_uncached(request),
        }
    }
}

/// The chosen strategy for a request, with the request as that strategy annotated it.
#[derive(Clone)]
pub struct Resolution {
    strategy: Arc<dyn Strategy>,
    score: u32,
    request: ConversionRequest,
}

impl Resolution {
    pub fn strategy(&self) -> &Arc<dyn Strategy> {
        &self.strategy
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn request(&self) -> &ConversionRequest {
        &self.request
    }

    pub fn emit(&self, synth: &dyn Synthesizer) -> Result<Procedure> {
        self.strategy.emit(&self.request, synth)
    }
}

impl std::fmt::Debug for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolution")
            .field("strategy", &self.strategy.name())
            .field("score", &self.score)
            .finish()
    }
}

type RequestKey = (Shape, Shape, Vec<String>);

/// Sealed, shareable strategy resolver.
pub struct Resolver {
    strategies: Vec<Arc<dyn Strategy>>,
    cache: DashMap<RequestKey, Option<Resolution>>,
}

impl Resolver {
    fn new(strategies: Vec<Arc<dyn Strategy>>) -> Self {
        Self {
            strategies,
            cache: DashMap::new(),
        }
    }

    /// Lowest-scoring applicable strategy; cached per request.
    pub fn resolve(&self, request: &ConversionRequest) -> Option<Resolution> {
        let key = (
            request.source().clone(),
            request.target().clone(),
            request.flags(),
        );
        if let Some(hit) = self.cache.get(&key) {
            tracing::trace!(source = %request.source(), target = %request.target(), "resolution cache hit");
            return hit.clone();
        }
        let resolved = self.resolve_uncached(request);
        self.cache.insert(key, resolved.clone());
        resolved
    }

    /// Score every strategy against the request.
    ///
    /// Ties prefer non-intrinsic strategies, then registration order.
    pub fn resolve_uncached(&self, request: &ConversionRequest) -> Option<Resolution> {
        let mut best: Option<Resolution> = None;
        for strategy in &self.strategies {
            let mut candidate = request.clone();
            let Some(score) = strategy.score(&mut candidate, self) else {
                continue;
            };
            let better = match &best {
                None => true,
                Some(current) => {
                    (score, strategy.is_intrinsic())
                        < (current.score, current.strategy.is_intrinsic())
                }
            };
            if better {
                best = Some(Resolution {
                    strategy: Arc::clone(strategy),
                    score,
                    request: candidate,
                });
            }
        }

        match &best {
            Some(resolution) => tracing::debug!(
                source = %request.source(),
                target = %request.target(),
                strategy = resolution.strategy.name(),
                score = resolution.score,
                "resolved strategy"
            ),
            None => tracing::debug!(
                source = %request.source(),
                target = %request.target(),
                "no applicable strategy"
            ),
        }
        best
    }

    pub fn strategies(&self) -> impl Iterator<Item = &Arc<dyn Strategy>> {
        self.strategies.iter()
    }

    /// Number of cached resolutions.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

/// Compiles through strategies alone, with no structured fallback and no procedure cache.
impl Synthesizer for Resolver {
    fn compile(&self, source: &Shape, target: &Shape) -> Result<Procedure> {
        let request = ConversionRequest::new(source.clone(), target.clone());
        crate::strategy::synthesize(&request, self)
    }

    fn resolver(&self) -> &Resolver {
        self
    }
}
