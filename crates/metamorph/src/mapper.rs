//! The mapper container.
//!
//! A [`MapperBuilder`] collects strategies, conventions, pair configuration
//! and options. Building it seals the strategy registry and yields a
//! [`Mapper`], which synthesizes one procedure per (source, target) pair on
//! first use and reuses it afterwards.

use crate::compiler::ProcedureCache;
use crate::convention::{Convention, Conventions};
use crate::error::{MapError, Result};
use crate::oracle::derives_from;
use crate::plan::{PlanBuilder, PlanConfig, StructuredPlan};
use crate::procedure::Procedure;
use crate::profile::{MapperOptions, PairProfile, Profile};
use crate::reflect::Reflect;
use crate::registry::{Registry, Resolver};
use crate::shape::Shape;
use crate::strategy::{ConversionRequest, FunctionStrategy, Strategy, Synthesizer, convert_elements};
use crate::structured::{build_plan, into_procedure};
use crate::value::Value;
use indexmap::IndexMap;
use std::sync::{Arc, Weak};

/// Shared state behind a [`Mapper`].
pub(crate) struct MapperInner {
    this: Weak<MapperInner>,
    resolver: Arc<Resolver>,
    conventions: Conventions,
    plans: IndexMap<(Shape, Shape), PlanConfig>,
    named_plans: Vec<PairProfile>,
    options: MapperOptions,
    cache: ProcedureCache,
}

impl MapperInner {
    pub(crate) fn options(&self) -> &MapperOptions {
        &self.options
    }

    pub(crate) fn conventions(&self) -> &Conventions {
        &self.conventions
    }

    /// Configuration for a pair, merged across the source's record ancestry.
    ///
    /// Base shapes apply first so a derived pair can override them. Returns
    /// `None` when nothing was configured.
    fn plan_config(&self, source: &Shape, target: &Shape) -> Option<PlanConfig> {
        let mut lineage = Vec::new();
        let mut current = Some(source.clone());
        while let Some(shape) = current {
            if !shape.is_record() && !lineage.is_empty() {
                break;
            }
            current = shape.parent();
            lineage.push(shape);
        }

        let mut merged: Option<PlanConfig> = None;
        for shape in lineage.iter().rev() {
            let named = self
                .named_plans
                .iter()
                .filter(|pair| pair.matches(shape, target))
                .map(PairProfile::to_config);
            let exact = self.plans.get(&(shape.clone(), target.clone())).cloned();
            for config in named.chain(exact) {
                merged.get_or_insert_with(PlanConfig::default).merge(&config);
            }
        }
        merged
    }

    fn structured(&self, source: &Shape, target: &Shape, config: &PlanConfig) -> Result<Procedure> {
        let plan = build_plan(self, source, target, config)?;
        Ok(into_procedure(plan, self.this.clone()))
    }

    fn synthesize(&self, source: &Shape, target: &Shape) -> Result<Procedure> {
        let request = ConversionRequest::new(source.clone(), target.clone());
        let resolution = self.resolver.resolve(&request);

        // User strategies outrank configuration, including configuration
        // inherited from a base pair.
        let (user, builtin) = match resolution {
            Some(r) if !r.strategy().is_intrinsic() => (Some(r), None),
            other => (None, other),
        };
        if let Some(resolution) = user {
            tracing::debug!(
                %source,
                %target,
                kind = "strategy",
                strategy = resolution.strategy().name(),
                "synthesizing procedure"
            );
            return resolution.emit(self);
        }

        let structured = source.is_record() && target.is_record();
        if let Some(config) = self
            .plan_config(source, target)
            .filter(|config| structured || config.custom.is_some())
        {
            tracing::debug!(%source, %target, kind = "configured", "synthesizing procedure");
            return self.structured(source, target, &config);
        }

        if let Some(resolution) = builtin {
            tracing::debug!(
                %source,
                %target,
                kind = "strategy",
                strategy = resolution.strategy().name(),
                "synthesizing procedure"
            );
            return resolution.emit(self);
        }

        if structured {
            tracing::debug!(%source, %target, kind = "structured", "synthesizing procedure");
            return self.structured(source, target, &PlanConfig::default());
        }

        let (inner_source, inner_target) = (source.strip_optional(), target.strip_optional());
        if (source.is_optional() || target.is_optional())
            && inner_source.is_record()
            && inner_target.is_record()
        {
            tracing::debug!(%source, %target, kind = "optional", "synthesizing procedure");
            let inner = self.compile(inner_source, inner_target)?;
            return Ok(Procedure::new(source.clone(), target.clone(), move |value| {
                if value.is_null() {
                    Ok(Value::Null)
                } else {
                    inner.call(value)
                }
            }));
        }

        Err(MapError::unsupported(source, target, "no strategy applies"))
    }
}

impl Synthesizer for MapperInner {
    fn compile(&self, source: &Shape, target: &Shape) -> Result<Procedure> {
        self.cache
            .get_or_synthesize(source, target, || self.synthesize(source, target))
    }

    fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    fn parallel_threshold(&self) -> usize {
        self.options.parallel_threshold
    }
}

/// Collects registrations; [`build`](Self::build) seals them into a [`Mapper`].
pub struct MapperBuilder {
    registry: Registry,
    conventions: Conventions,
    plans: IndexMap<(Shape, Shape), PlanConfig>,
    named_plans: Vec<PairProfile>,
    options: MapperOptions,
    errors: Vec<MapError>,
}

impl Default for MapperBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MapperBuilder {
    /// Builder with the built-in strategies and the default convention.
    pub fn new() -> Self {
        Self {
            registry: Registry::with_intrinsics(),
            conventions: Conventions::default(),
            plans: IndexMap::new(),
            named_plans: Vec::new(),
            options: MapperOptions::default(),
            errors: Vec::new(),
        }
    }

    /// Register a conversion function for an exact pair of shapes.
    ///
    /// User functions win ties against built-in strategies.
    pub fn register_fn(
        &mut self,
        source: Shape,
        target: Shape,
        f: impl Fn(Value) -> Result<Value> + Send + Sync + 'static,
    ) -> &mut Self {
        self.strategy(FunctionStrategy::new(source, target, f))
    }

    /// Register a typed conversion function.
    pub fn register<S, T>(&mut self, f: impl Fn(S) -> T + Send + Sync + 'static) -> &mut Self
    where
        S: Reflect,
        T: Reflect,
    {
        self.strategy(FunctionStrategy::typed(f))
    }

    pub fn strategy(&mut self, strategy: impl Strategy + 'static) -> &mut Self {
        if let Err(e) = self.registry.register(strategy) {
            self.errors.push(e);
        }
        self
    }

    /// Append a convention after the existing ones.
    pub fn convention(&mut self, rule: impl Convention + 'static) -> &mut Self {
        self.conventions.push(rule);
        self
    }

    /// Replace the convention list.
    pub fn conventions(&mut self, conventions: Conventions) -> &mut Self {
        self.conventions = conventions;
        self
    }

    pub fn options(&mut self, options: MapperOptions) -> &mut Self {
        self.options = options;
        self
    }

    /// Configure the structured mapping of one pair.
    ///
    /// Configuring the same pair again adds to the earlier configuration.
    pub fn configure(&mut self, source: Shape, target: Shape) -> PlanBuilder<'_> {
        PlanBuilder::new(self.plans.entry((source, target)).or_default())
    }

    pub fn configure_types<S: Reflect, T: Reflect>(&mut self) -> PlanBuilder<'_> {
        self.configure(S::shape(), T::shape())
    }

    /// Apply a profile: its options, conventions and pair directives.
    pub fn profile(&mut self, profile: &Profile) -> &mut Self {
        if let Some(options) = &profile.options {
            self.options = options.clone();
        }
        for spec in &profile.conventions {
            self.conventions.push_arc(spec.to_convention());
        }
        self.named_plans.extend(profile.pairs.iter().cloned());
        self
    }

    /// Seal the registrations into a mapper.
    ///
    /// Fails with the first registration error, when a configured pair
    /// names target members its target shape does not have, or when a pair
    /// that is not record to record is configured with anything but
    /// `map_with`.
    pub fn build(mut self) -> Result<Mapper> {
        if let Some(error) = self.errors.drain(..).next() {
            return Err(error);
        }
        for ((source, target), config) in &self.plans {
            validate(source, target, config)?;
        }
        Ok(self.assemble())
    }

    fn assemble(mut self) -> Mapper {
        let resolver = self.registry.seal();
        let inner = Arc::new_cyclic(|this| MapperInner {
            this: this.clone(),
            resolver,
            conventions: self.conventions,
            plans: self.plans,
            named_plans: self.named_plans,
            options: self.options,
            cache: ProcedureCache::new(),
        });
        Mapper { inner }
    }
}

fn validate(source: &Shape, target: &Shape, config: &PlanConfig) -> Result<()> {
    if config.custom.is_some() {
        return Ok(());
    }
    let Some(def) = target.as_record().filter(|_| source.is_record()) else {
        if config.is_empty() {
            return Ok(());
        }
        return Err(MapError::configuration(format!(
            "cannot configure `{source}` -> `{target}`: only `map_with` applies unless both sides are records"
        )));
    };
    for name in config.members.keys() {
        match def.find_member(name) {
            Some(member) if member.is_writable() => {}
            Some(_) => {
                return Err(MapError::configuration(format!(
                    "member `{name}` of `{target}` is read-only"
                )));
            }
            None => {
                return Err(MapError::configuration(format!(
                    "`{target}` has no member `{name}`"
                )));
            }
        }
    }
    Ok(())
}

/// Counters describing a mapper's caches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapperStats {
    /// Cached procedures, including cached failures.
    pub procedures: usize,
    /// Completed syntheses.
    pub syntheses: usize,
    /// Cached strategy resolutions.
    pub resolutions: usize,
}

/// A sealed object mapper.
///
/// Cheap to clone; clones share procedures. Independent mappers share nothing.
#[derive(Clone)]
pub struct Mapper {
    inner: Arc<MapperInner>,
}

impl Default for Mapper {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Mapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mapper")
            .field("options", &self.inner.options)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Mapper {
    pub fn builder() -> MapperBuilder {
        MapperBuilder::new()
    }

    /// Mapper with only the built-in strategies and conventions.
    pub fn new() -> Self {
        MapperBuilder::new().assemble()
    }

    /// Map a value into a new target value.
    pub fn map<S: Reflect, T: Reflect>(&self, source: &S) -> Result<T> {
        let value = self.map_value(source.to_value(), &S::shape(), &T::shape())?;
        T::from_value(value)
    }

    /// Map onto an existing target, keeping members the mapping leaves alone.
    pub fn map_into<S: Reflect, T: Reflect>(&self, source: &S, dest: &mut T) -> Result<()> {
        let procedure = self.procedure(&S::shape(), &T::shape())?;
        let mut value = dest.to_value();
        procedure.call_into(source.to_value(), &mut value)?;
        *dest = T::from_value(value)?;
        Ok(())
    }

    /// Map every element, preserving order.
    pub fn map_seq<S: Reflect, T: Reflect>(&self, items: &[S]) -> Result<Vec<T>> {
        let procedure = self.procedure(&S::shape(), &T::shape())?;
        let values = items.iter().map(Reflect::to_value).collect();
        convert_elements(values, &procedure, self.inner.options.parallel_threshold)?
            .into_iter()
            .map(T::from_value)
            .collect()
    }

    /// Map a dynamic value declared as `source`.
    ///
    /// A record whose runtime shape derives from `source` is mapped with the
    /// procedure for its runtime shape.
    pub fn map_value(&self, value: Value, source: &Shape, target: &Shape) -> Result<Value> {
        let runtime = value
            .as_record()
            .map(|record| record.shape())
            .filter(|shape| *shape != source && derives_from(shape, source))
            .cloned();
        let source = runtime.as_ref().unwrap_or(source);
        self.procedure(source, target)?.call(value)
    }

    /// Map a dynamic value using the shape it carries.
    pub fn map_dynamic(&self, value: Value, target: &Shape) -> Result<Value> {
        match value.runtime_shape() {
            Some(source) => self.procedure(&source, target)?.call(value),
            None if value.is_null() => Ok(Value::Null),
            None => Err(MapError::unsupported(
                value.describe(),
                target,
                "value carries no shape",
            )),
        }
    }

    /// The compiled procedure for a pair, synthesized on first request.
    pub fn procedure(&self, source: &Shape, target: &Shape) -> Result<Procedure> {
        self.inner.compile(source, target)
    }

    /// The structured plan a record pair would use, built fresh for inspection.
    pub fn plan(&self, source: &Shape, target: &Shape) -> Result<StructuredPlan> {
        let config = self.inner.plan_config(source, target).unwrap_or_default();
        build_plan(&self.inner, source, target, &config)
    }

    pub fn resolver(&self) -> &Resolver {
        &self.inner.resolver
    }

    pub fn options(&self) -> &MapperOptions {
        &self.inner.options
    }

    pub fn stats(&self) -> MapperStats {
        MapperStats {
            procedures: self.inner.cache.len(),
            syntheses: self.inner.cache.syntheses(),
            resolutions: self.inner.resolver.cached(),
        }
    }
}
