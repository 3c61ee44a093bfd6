//! Material rules and density resolution

use serde::{Deserialize, Serialize};

/// Material label reported when no rule matches
pub const DEFAULT_MATERIAL: &str = "default";

/// A substring-matched density override
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRule {
    /// Substring searched for in part and assembly keys
    pub pattern: String,
    /// Density in kg/m³
    pub density: f64,
    /// Material name for reports (falls back to the pattern)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
}

impl MaterialRule {
    pub fn new(pattern: impl Into<String>, density: f64) -> Self {
        Self {
            pattern: pattern.into(),
            density,
            material: None,
        }
    }

    pub fn with_material(mut self, material: impl Into<String>) -> Self {
        self.material = Some(material.into());
        self
    }

    /// Label used in reports
    pub fn label(&self) -> &str {
        self.material.as_deref().unwrap_or(&self.pattern)
    }

    pub fn matches(&self, key: &str) -> bool {
        key.contains(self.pattern.as_str())
    }
}

/// Density chosen for a key, with the material it came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedDensity<'a> {
    pub density: f64,
    pub material: &'a str,
    /// Whether a rule matched (as opposed to the fallback being used)
    pub matched: bool,
}

/// Ordered material rule list. The first matching rule wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialRules(Vec<MaterialRule>);

impl MaterialRules {
    pub fn new(rules: Vec<MaterialRule>) -> Self {
        Self(rules)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MaterialRule> {
        self.0.iter()
    }

    /// First rule whose pattern occurs in `key`, in declaration order
    pub fn find(&self, key: &str) -> Option<&MaterialRule> {
        self.0.iter().find(|rule| rule.matches(key))
    }

    /// Resolve the density for `key`, using `fallback` when nothing matches
    pub fn resolve(&self, key: &str, fallback: f64) -> ResolvedDensity<'_> {
        match self.find(key) {
            Some(rule) => ResolvedDensity {
                density: rule.density,
                material: rule.label(),
                matched: true,
            },
            None => ResolvedDensity {
                density: fallback,
                material: DEFAULT_MATERIAL,
                matched: false,
            },
        }
    }

    /// Default density to hand down to the descendants of an assembly
    ///
    /// A rule matching the assembly's own key replaces the inherited default
    /// for the whole subtree; otherwise `inherited` passes through unchanged.
    pub fn inherited_density(&self, assembly_key: &str, inherited: f64) -> f64 {
        match self.find(assembly_key) {
            Some(rule) => {
                tracing::debug!(
                    "Assembly '{}' matched '{}', descendants default to {} kg/m³",
                    assembly_key,
                    rule.label(),
                    rule.density
                );
                rule.density
            }
            None => inherited,
        }
    }
}

impl From<Vec<MaterialRule>> for MaterialRules {
    fn from(rules: Vec<MaterialRule>) -> Self {
        Self(rules)
    }
}

impl FromIterator<MaterialRule> for MaterialRules {
    fn from_iter<I: IntoIterator<Item = MaterialRule>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a MaterialRules {
    type Item = &'a MaterialRule;
    type IntoIter = std::slice::Iter<'a, MaterialRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
