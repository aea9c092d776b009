//! Member-correspondence conventions.
//!
//! Conventions decide which source member feeds a target member when no
//! explicit directive is configured. They run once per pair, when its plan is
//! built; the first convention that answers for a target member wins.

use crate::procedure::Procedure;
use crate::shape::{Constructor, MemberDescriptor, Shape};
use std::sync::Arc;

/// What a convention sees for one target member.
#[derive(Debug, Clone, Copy)]
pub struct ConventionContext<'a> {
    pub source: &'a Shape,
    pub target: &'a Shape,
    /// Readable members of the source shape.
    pub source_members: &'a [MemberDescriptor],
    pub target_member: &'a MemberDescriptor,
}

impl ConventionContext<'_> {
    /// First source member whose name satisfies the predicate.
    pub fn find_source(&self, matches: impl Fn(&str) -> bool) -> Option<Correspondence> {
        self.source_members
            .iter()
            .find(|m| matches(m.name()))
            .map(|m| Correspondence::member(m.name()))
    }
}

/// A convention's answer for one target member.
#[derive(Debug, Clone)]
pub struct Correspondence {
    pub source_member: String,
    /// Converter to use instead of compiling one through the mapper.
    pub converter: Option<Procedure>,
}

impl Correspondence {
    pub fn member(name: impl Into<String>) -> Self {
        Self {
            source_member: name.into(),
            converter: None,
        }
    }

    pub fn with_converter(mut self, converter: Procedure) -> Self {
        self.converter = Some(converter);
        self
    }
}

/// A member-correspondence rule.
pub trait Convention: Send + Sync {
    fn name(&self) -> &str;

    /// Answer for one target member, or `None` to defer to later conventions.
    fn find(&self, ctx: &ConventionContext<'_>) -> Option<Correspondence>;

    /// Custom constructor for the target of a pair.
    fn constructor(&self, _source: &Shape, _target: &Shape) -> Option<Constructor> {
        None
    }
}

/// Case-insensitive name equality. The default convention.
#[derive(Debug, Default, Clone, Copy)]
pub struct SameName;

impl Convention for SameName {
    fn name(&self) -> &str {
        "same_name"
    }

    fn find(&self, ctx: &ConventionContext<'_>) -> Option<Correspondence> {
        let target = ctx.target_member.name();
        ctx.find_source(|name| name == target)
            .or_else(|| ctx.find_source(|name| name.eq_ignore_ascii_case(target)))
    }
}

/// Case-sensitive name equality.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactName;

impl Convention for ExactName {
    fn name(&self) -> &str {
        "exact_name"
    }

    fn find(&self, ctx: &ConventionContext<'_>) -> Option<Correspondence> {
        let target = ctx.target_member.name();
        ctx.find_source(|name| name == target)
    }
}

/// Lowercased name with `_` and `-` removed.
pub fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Names equal after [`normalize`], so `first_name` matches `FirstName`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NormalizedName;

impl Convention for NormalizedName {
    fn name(&self) -> &str {
        "normalized_name"
    }

    fn find(&self, ctx: &ConventionContext<'_>) -> Option<Correspondence> {
        let target = normalize(ctx.target_member.name());
        ctx.find_source(|name| normalize(name) == target)
    }
}

/// Strips configured prefixes and suffixes from both names, then compares
/// them case-insensitively.
#[derive(Debug, Default, Clone)]
pub struct Affixes {
    prefixes: Vec<String>,
    suffixes: Vec<String>,
}

impl Affixes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffixes.push(suffix.into());
        self
    }

    fn strip<'a>(&self, name: &'a str) -> &'a str {
        let mut name = name;
        if let Some(rest) = self.prefixes.iter().find_map(|p| name.strip_prefix(p.as_str())) {
            name = rest;
        }
        if let Some(rest) = self.suffixes.iter().find_map(|s| name.strip_suffix(s.as_str())) {
            name = rest;
        }
        name
    }
}

impl Convention for Affixes {
    fn name(&self) -> &str {
        "affixes"
    }

    fn find(&self, ctx: &ConventionContext<'_>) -> Option<Correspondence> {
        let target = self.strip(ctx.target_member.name());
        if target.is_empty() {
            return None;
        }
        ctx.find_source(|name| self.strip(name).eq_ignore_ascii_case(target))
    }
}

type NamePredicate = dyn Fn(&str, &str) -> bool + Send + Sync;

/// Matches with a user predicate over (source name, target name).
#[derive(Clone)]
pub struct MatchWith {
    name: String,
    predicate: Arc<NamePredicate>,
}

impl MatchWith {
    pub fn new(
        name: impl Into<String>,
        predicate: impl Fn(&str, &str) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }
}

impl Convention for MatchWith {
    fn name(&self) -> &str {
        &self.name
    }

    fn find(&self, ctx: &ConventionContext<'_>) -> Option<Correspondence> {
        let target = ctx.target_member.name();
        ctx.find_source(|name| (self.predicate)(name, target))
    }
}

/// Ordered list of conventions.
#[derive(Clone)]
pub struct Conventions {
    rules: Vec<Arc<dyn Convention>>,
}

impl Default for Conventions {
    /// Just [`SameName`].
    fn default() -> Self {
        Self {
            rules: vec![Arc::new(SameName)],
        }
    }
}

impl Conventions {
    /// No conventions at all: only explicit directives map members.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn push(&mut self, rule: impl Convention + 'static) {
        self.rules.push(Arc::new(rule));
    }

    pub fn push_arc(&mut self, rule: Arc<dyn Convention>) {
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First answer for the context, with the name of the rule that gave it.
    pub fn find(&self, ctx: &ConventionContext<'_>) -> Option<(Correspondence, &str)> {
        self.rules
            .iter()
            .find_map(|rule| rule.find(ctx).map(|found| (found, rule.name())))
    }

    /// First custom constructor offered for the pair.
    pub fn constructor(&self, source: &Shape, target: &Shape) -> Option<Constructor> {
        self.rules
            .iter()
            .find_map(|rule| rule.constructor(source, target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{RecordDef, Scalar};

    fn members(names: &[&str]) -> Vec<MemberDescriptor> {
        names
            .iter()
            .map(|n| MemberDescriptor::new(*n, Shape::text()))
            .collect()
    }

    fn lookup(rule: &dyn Convention, sources: &[&str], target: &str) -> Option<String> {
        let source = Shape::record(RecordDef::new("Source"));
        let target_shape = Shape::record(RecordDef::new("Target"));
        let source_members = members(sources);
        let target_member = MemberDescriptor::new(target, Shape::scalar(Scalar::I32));
        let ctx = ConventionContext {
            source: &source,
            target: &target_shape,
            source_members: &source_members,
            target_member: &target_member,
        };
        rule.find(&ctx).map(|c| c.source_member)
    }

    #[test]
    fn test_same_name_prefers_exact_case() {
        assert_eq!(lookup(&SameName, &["NAME", "name"], "name"), Some("name".into()));
        assert_eq!(lookup(&SameName, &["Name"], "name"), Some("Name".into()));
        assert_eq!(lookup(&SameName, &["title"], "name"), None);
    }

    #[test]
    fn test_exact_name_is_case_sensitive() {
        assert_eq!(lookup(&ExactName, &["Name"], "name"), None);
        assert_eq!(lookup(&ExactName, &["name"], "name"), Some("name".into()));
    }

    #[test]
    fn test_normalized_name() {
        assert_eq!(
            lookup(&NormalizedName, &["FirstName"], "first_name"),
            Some("FirstName".into())
        );
        assert_eq!(
            lookup(&NormalizedName, &["last-name"], "LastName"),
            Some("last-name".into())
        );
    }

    #[test]
    fn test_affixes() {
        let rule = Affixes::new().prefix("m_").suffix("Field");
        assert_eq!(lookup(&rule, &["m_count"], "countField"), Some("m_count".into()));
        assert_eq!(lookup(&rule, &["m_total"], "count"), None);
    }

    #[test]
    fn test_match_with() {
        let rule = MatchWith::new("src_prefix", |source, target| source == format!("src_{target}"));
        assert_eq!(lookup(&rule, &["src_id", "id"], "id"), Some("src_id".into()));
    }

    #[test]
    fn test_first_rule_wins() {
        let mut conventions = Conventions::default();
        conventions.push(MatchWith::new("always_first", |_, _| true));
        let source = Shape::record(RecordDef::new("S"));
        let target = Shape::record(RecordDef::new("T"));
        let source_members = members(&["other", "id"]);
        let target_member = MemberDescriptor::new("id", Shape::text());
        let ctx = ConventionContext {
            source: &source,
            target: &target,
            source_members: &source_members,
            target_member: &target_member,
        };
        let (found, rule) = conventions.find(&ctx).expect("should match");
        assert_eq!(found.source_member, "id");
        assert_eq!(rule, "same_name");
    }
}
