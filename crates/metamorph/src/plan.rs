//! Structured-pair configuration and compiled member plans.

use crate::error::Result;
use crate::procedure::Procedure;
use crate::shape::{Constructor, ConvertFn, Shape};
use crate::value::Value;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Runs before or after the member copies, with the source and destination.
pub type Hook = Arc<dyn Fn(&Value, &mut Value) -> Result<()> + Send + Sync>;

/// Whether record-typed members are mapped member by member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Recursion {
    /// Record-typed members get their own structured plan.
    #[default]
    Hierarchical,
    /// Record-typed members are copied when shapes match and otherwise go
    /// through registered strategies only.
    Flat,
}

/// Per-target-member configuration.
#[derive(Clone, Default)]
pub struct MemberConfig {
    pub(crate) source_member: Option<String>,
    pub(crate) ignore: bool,
    pub(crate) converter: Option<ConvertFn>,
    pub(crate) null_substitute: Option<Value>,
}

/// Configuration for one (source, target) pair.
#[derive(Clone, Default)]
pub struct PlanConfig {
    pub(crate) members: IndexMap<String, MemberConfig>,
    pub(crate) constructor: Option<Constructor>,
    pub(crate) custom: Option<ConvertFn>,
    pub(crate) before: Vec<Hook>,
    pub(crate) after: Vec<Hook>,
    pub(crate) recursion: Option<Recursion>,
}

impl PlanConfig {
    pub(crate) fn member(&self, name: &str) -> Option<&MemberConfig> {
        self.members.get(name)
    }

    /// True when nothing beyond the defaults was configured.
    pub(crate) fn is_empty(&self) -> bool {
        self.members.is_empty()
            && self.constructor.is_none()
            && self.custom.is_none()
            && self.before.is_empty()
            && self.after.is_empty()
            && self.recursion.is_none()
    }

    /// Layer `other` over this configuration; `other` wins on conflicts.
    pub(crate) fn merge(&mut self, other: &PlanConfig) {
        for (name, member) in &other.members {
            let slot = self.members.entry(name.clone()).or_default();
            if member.source_member.is_some() {
                slot.source_member = member.source_member.clone();
            }
            slot.ignore |= member.ignore;
            if member.converter.is_some() {
                slot.converter = member.converter.clone();
            }
            if member.null_substitute.is_some() {
                slot.null_substitute = member.null_substitute.clone();
            }
        }
        if other.constructor.is_some() {
            self.constructor = other.constructor.clone();
        }
        if other.custom.is_some() {
            self.custom = other.custom.clone();
        }
        self.before.extend(other.before.iter().cloned());
        self.after.extend(other.after.iter().cloned());
        if other.recursion.is_some() {
            self.recursion = other.recursion;
        }
    }
}

/// Fluent configuration of one pair, obtained from `MapperBuilder::configure`.
pub struct PlanBuilder<'a> {
    config: &'a mut PlanConfig,
}

impl<'a> PlanBuilder<'a> {
    pub(crate) fn new(config: &'a mut PlanConfig) -> Self {
        Self { config }
    }

    fn member(&mut self, target: impl Into<String>) -> &mut MemberConfig {
        self.config.members.entry(target.into()).or_default()
    }

    /// Feed `target` from the named source member.
    pub fn map_member(&mut self, target: impl Into<String>, source: impl Into<String>) -> &mut Self {
        self.member(target).source_member = Some(source.into());
        self
    }

    /// Leave `target` untouched.
    pub fn ignore(&mut self, target: impl Into<String>) -> &mut Self {
        self.member(target).ignore = true;
        self
    }

    /// Convert the corresponding source member with `f` instead of a compiled procedure.
    pub fn convert_with(
        &mut self,
        target: impl Into<String>,
        f: impl Fn(Value) -> Result<Value> + Send + Sync + 'static,
    ) -> &mut Self {
        self.member(target).converter = Some(Arc::new(f));
        self
    }

    /// Value used when the source member is null.
    pub fn null_substitute(&mut self, target: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.member(target).null_substitute = Some(value.into());
        self
    }

    /// Construct the target with `f` before members are copied.
    pub fn create_with(&mut self, f: impl Fn() -> Value + Send + Sync + 'static) -> &mut Self {
        self.config.constructor = Some(Arc::new(f));
        self
    }

    /// Replace the whole conversion with `f`.
    pub fn map_with(
        &mut self,
        f: impl Fn(Value) -> Result<Value> + Send + Sync + 'static,
    ) -> &mut Self {
        self.config.custom = Some(Arc::new(f));
        self
    }

    pub fn before_map(
        &mut self,
        hook: impl Fn(&Value, &mut Value) -> Result<()> + Send + Sync + 'static,
    ) -> &mut Self {
        self.config.before.push(Arc::new(hook));
        self
    }

    pub fn after_map(
        &mut self,
        hook: impl Fn(&Value, &mut Value) -> Result<()> + Send + Sync + 'static,
    ) -> &mut Self {
        self.config.after.push(Arc::new(hook));
        self
    }

    pub fn with_options(&mut self, recursion: Recursion) -> &mut Self {
        self.config.recursion = Some(recursion);
        self
    }
}

/// How one target member is populated.
#[derive(Clone)]
pub enum Directive {
    Ignore,
    /// Copy the source member, through `converter` when present.
    Convert {
        source_member: String,
        converter: Option<Procedure>,
        null_substitute: Option<Value>,
    },
    /// Map a record-typed member with its own structured plan.
    Nested {
        source_member: String,
        procedure: Procedure,
    },
}

impl fmt::Debug for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::Ignore => f.write_str("Ignore"),
            Directive::Convert {
                source_member,
                converter,
                ..
            } => f
                .debug_struct("Convert")
                .field("source_member", source_member)
                .field("converted", &converter.is_some())
                .finish(),
            Directive::Nested { source_member, .. } => f
                .debug_struct("Nested")
                .field("source_member", source_member)
                .finish(),
        }
    }
}

/// The compiled plan for a structured pair.
#[derive(Clone)]
pub struct StructuredPlan {
    pub(crate) source: Shape,
    pub(crate) target: Shape,
    pub(crate) directives: Vec<(String, Directive)>,
    pub(crate) constructor: Option<Constructor>,
    pub(crate) custom: Option<ConvertFn>,
    pub(crate) before: Vec<Hook>,
    pub(crate) after: Vec<Hook>,
    pub(crate) recursion: Recursion,
}

impl StructuredPlan {
    pub fn source(&self) -> &Shape {
        &self.source
    }

    pub fn target(&self) -> &Shape {
        &self.target
    }

    /// Directives in target member order.
    pub fn directives(&self) -> &[(String, Directive)] {
        &self.directives
    }

    pub fn directive(&self, target_member: &str) -> Option<&Directive> {
        self.directives
            .iter()
            .find(|(name, _)| name == target_member)
            .map(|(_, directive)| directive)
    }

    pub fn recursion(&self) -> Recursion {
        self.recursion
    }

    pub fn is_custom(&self) -> bool {
        self.custom.is_some()
    }
}

impl fmt::Debug for StructuredPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructuredPlan")
            .field("source", &self.source)
            .field("target", &self.target)
            .field("directives", &self.directives)
            .field("recursion", &self.recursion)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_records_members() {
        let mut config = PlanConfig::default();
        PlanBuilder::new(&mut config)
            .map_member("full_name", "name")
            .ignore("secret")
            .null_substitute("nickname", "n/a")
            .with_options(Recursion::Flat);

        assert_eq!(
            config.member("full_name").and_then(|m| m.source_member.as_deref()),
            Some("name")
        );
        assert!(config.member("secret").is_some_and(|m| m.ignore));
        assert_eq!(
            config.member("nickname").and_then(|m| m.null_substitute.clone()),
            Some(Value::from("n/a"))
        );
        assert_eq!(config.recursion, Some(Recursion::Flat));
    }

    #[test]
    fn test_merge_prefers_overlay() {
        let mut base = PlanConfig::default();
        PlanBuilder::new(&mut base)
            .map_member("a", "x")
            .ignore("b");
        let mut overlay = PlanConfig::default();
        PlanBuilder::new(&mut overlay)
            .map_member("a", "y")
            .with_options(Recursion::Flat);

        base.merge(&overlay);
        assert_eq!(
            base.member("a").and_then(|m| m.source_member.as_deref()),
            Some("y")
        );
        assert!(base.member("b").is_some_and(|m| m.ignore));
        assert_eq!(base.recursion, Some(Recursion::Flat));
    }
}
