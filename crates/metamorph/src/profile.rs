//! Serializable mapping profiles.
//!
//! A profile declares mapper options, extra conventions and per-pair member
//! directives in JSON, YAML or TOML. Pairs are named by shape name, either in
//! full (`app::model::Person`) or by the last path segment (`Person`).

use crate::convention::{Affixes, Convention, ExactName, NormalizedName, SameName};
use crate::error::{MapError, Result};
use crate::plan::{PlanConfig, Recursion};
use crate::shape::Shape;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Mapper-wide options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperOptions {
    /// Map record-typed members with their own structured plans.
    pub hierarchical: bool,
    /// Sequence length at which elements convert in parallel
    /// (only with the `parallel` feature).
    pub parallel_threshold: usize,
}

impl Default for MapperOptions {
    fn default() -> Self {
        Self {
            hierarchical: true,
            parallel_threshold: 1024,
        }
    }
}

/// A built-in convention, by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ConventionSpec {
    SameName,
    ExactName,
    NormalizedName,
    Affixes {
        #[serde(default)]
        prefixes: Vec<String>,
        #[serde(default)]
        suffixes: Vec<String>,
    },
}

impl ConventionSpec {
    pub fn to_convention(&self) -> Arc<dyn Convention> {
        match self {
            ConventionSpec::SameName => Arc::new(SameName),
            ConventionSpec::ExactName => Arc::new(ExactName),
            ConventionSpec::NormalizedName => Arc::new(NormalizedName),
            ConventionSpec::Affixes { prefixes, suffixes } => {
                let rule = prefixes.iter().fold(Affixes::new(), |rule, p| rule.prefix(p.clone()));
                Arc::new(suffixes.iter().fold(rule, |rule, s| rule.suffix(s.clone())))
            }
        }
    }
}

/// Member directives for one (source, target) pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairProfile {
    pub source: String,
    pub target: String,

    /// Target members left untouched.
    #[serde(default)]
    pub ignore: Vec<String>,

    /// Target member name to source member name.
    #[serde(default)]
    pub members: IndexMap<String, String>,

    /// Overrides the mapper-wide recursion mode for this pair.
    #[serde(default)]
    pub hierarchical: Option<bool>,
}

impl PairProfile {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            ..Default::default()
        }
    }

    pub fn ignore(mut self, member: impl Into<String>) -> Self {
        self.ignore.push(member.into());
        self
    }

    pub fn member(mut self, target: impl Into<String>, source: impl Into<String>) -> Self {
        self.members.insert(target.into(), source.into());
        self
    }

    /// Whether this pair names the given shapes.
    pub fn matches(&self, source: &Shape, target: &Shape) -> bool {
        names(source, &self.source) && names(target, &self.target)
    }

    pub(crate) fn to_config(&self) -> PlanConfig {
        let mut config = PlanConfig::default();
        let mut builder = crate::plan::PlanBuilder::new(&mut config);
        for member in &self.ignore {
            builder.ignore(member.clone());
        }
        for (target, source) in &self.members {
            builder.map_member(target.clone(), source.clone());
        }
        if let Some(hierarchical) = self.hierarchical {
            builder.with_options(if hierarchical {
                Recursion::Hierarchical
            } else {
                Recursion::Flat
            });
        }
        config
    }
}

fn names(shape: &Shape, name: &str) -> bool {
    shape.name() == name || shape.short_name() == name
}

/// A mapping profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub options: Option<MapperOptions>,

    /// Appended after the mapper's existing conventions.
    #[serde(default)]
    pub conventions: Vec<ConventionSpec>,

    #[serde(default)]
    pub pairs: Vec<PairProfile>,
}

impl Profile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn options(mut self, options: MapperOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn convention(mut self, convention: ConventionSpec) -> Self {
        self.conventions.push(convention);
        self
    }

    pub fn pair(mut self, pair: PairProfile) -> Self {
        self.pairs.push(pair);
        self
    }

    /// Read a profile file, detecting the format from its extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| MapError::Profile(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_bytes(&data, path.to_str())
    }

    /// Parse a profile, detecting the format from `path` (YAML when unknown).
    pub fn from_bytes(data: &[u8], path: Option<&str>) -> Result<Self> {
        let format = path.and_then(detect_format).unwrap_or("yaml");
        Self::from_bytes_format(data, format)
    }

    pub fn from_bytes_format(data: &[u8], format: &str) -> Result<Self> {
        match format {
            "json" => serde_json::from_slice(data).map_err(|e| MapError::Profile(e.to_string())),
            "yaml" | "yml" => {
                serde_yaml::from_slice(data).map_err(|e| MapError::Profile(e.to_string()))
            }
            "toml" => {
                let s = std::str::from_utf8(data)
                    .map_err(|e| MapError::Profile(format!("invalid UTF-8: {}", e)))?;
                toml::from_str(s).map_err(|e| MapError::Profile(e.to_string()))
            }
            _ => Err(MapError::Profile(format!(
                "unsupported profile format: {}",
                format
            ))),
        }
    }

    pub fn to_bytes(&self, format: &str) -> Result<Vec<u8>> {
        match format {
            "json" => serde_json::to_vec_pretty(self).map_err(|e| MapError::Profile(e.to_string())),
            "yaml" | "yml" => serde_yaml::to_string(self)
                .map(String::into_bytes)
                .map_err(|e| MapError::Profile(e.to_string())),
            "toml" => toml::to_string_pretty(self)
                .map(String::into_bytes)
                .map_err(|e| MapError::Profile(e.to_string())),
            _ => Err(MapError::Profile(format!(
                "unsupported profile format: {}",
                format
            ))),
        }
    }
}

fn detect_format(path: &str) -> Option<&'static str> {
    let ext = path.rsplit('.').next()?;
    match ext.to_lowercase().as_str() {
        "json" => Some("json"),
        "yaml" | "yml" => Some("yaml"),
        "toml" => Some("toml"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::RecordDef;

    fn sample() -> Profile {
        Profile::new()
            .options(MapperOptions {
                hierarchical: false,
                parallel_threshold: 16,
            })
            .convention(ConventionSpec::NormalizedName)
            .convention(ConventionSpec::Affixes {
                prefixes: vec!["m_".into()],
                suffixes: vec![],
            })
            .pair(
                PairProfile::new("Person", "app::PersonDto")
                    .ignore("password")
                    .member("full_name", "name"),
            )
    }

    #[test]
    fn test_yaml_profile() {
        let yaml = r#"
options:
  hierarchical: false
conventions:
  - rule: normalized_name
  - rule: affixes
    prefixes: [m_]
pairs:
  - source: Person
    target: app::PersonDto
    ignore: [password]
    members:
      full_name: name
"#;
        let profile = Profile::from_bytes(yaml.as_bytes(), Some("mapping.yaml")).expect("valid yaml");
        assert_eq!(profile.conventions.len(), 2);
        assert_eq!(profile.options.as_ref().map(|o| o.parallel_threshold), Some(1024));
        assert_eq!(profile.pairs[0].members.get("full_name").map(String::as_str), Some("name"));
    }

    #[test]
    fn test_formats_round_trip() {
        let profile = sample();
        for format in ["json", "yaml", "toml"] {
            let bytes = profile.to_bytes(format).expect("should serialize");
            let parsed = Profile::from_bytes_format(&bytes, format).expect("should parse");
            assert_eq!(parsed, profile, "{format}");
        }
    }

    #[test]
    fn test_unknown_format() {
        assert!(matches!(
            Profile::from_bytes_format(b"{}", "ron"),
            Err(MapError::Profile(_))
        ));
    }

    #[test]
    fn test_pair_matches_full_or_short_name() {
        let pair = PairProfile::new("Person", "app::PersonDto");
        let person = Shape::record(RecordDef::new("app::model::Person"));
        let dto = Shape::record(RecordDef::new("app::PersonDto"));
        assert!(pair.matches(&person, &dto));
        assert!(!pair.matches(&dto, &person));
    }

    #[test]
    fn test_pair_config() {
        let pair = PairProfile::new("A", "B").ignore("x").member("y", "z");
        let config = pair.to_config();
        assert!(config.member("x").is_some_and(|m| m.ignore));
        assert_eq!(
            config.member("y").and_then(|m| m.source_member.as_deref()),
            Some("z")
        );
    }
}
