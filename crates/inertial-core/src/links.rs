//! Grouping of depth-1 parts into URDF links

use std::collections::HashSet;

use crate::aggregate::{self, DensityPolicy, SolidRecord};
use crate::geometry::GeometryProvider;
use crate::mass::AggregatedProperties;
use crate::tree::PartLookup;

/// Ordered mapping of URDF link names to depth-1 part keys
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkMapping {
    links: Vec<(String, Vec<String>)>,
}

impl LinkMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a link; declaration order is report order
    pub fn add_link<S: Into<String>>(
        &mut self,
        name: impl Into<String>,
        part_keys: impl IntoIterator<Item = S>,
    ) {
        self.links.push((
            name.into(),
            part_keys.into_iter().map(Into::into).collect(),
        ));
    }

    pub fn with_link<S: Into<String>>(
        mut self,
        name: impl Into<String>,
        part_keys: impl IntoIterator<Item = S>,
    ) -> Self {
        self.add_link(name, part_keys);
        self
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.links
            .iter()
            .map(|(name, keys)| (name.as_str(), keys.as_slice()))
    }
}

/// Non-fatal problems found while grouping
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A link lists a key that is not a depth-1 part
    PartNotFound { link: String, key: String },
    /// A link's solids sum to (numerically) zero mass
    NoValidSolids { link: String },
    /// Several depth-1 parts share a key; only the last one can be mapped
    DuplicateKey { key: String },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::PartNotFound { link, key } => {
                write!(f, "Part '{}' (link '{}') not found in assembly", key, link)
            }
            Diagnostic::NoValidSolids { link } => write!(f, "{}: no valid solids", link),
            Diagnostic::DuplicateKey { key } => write!(
                f,
                "Part key '{}' is shared by several parts, earlier ones are reported as unmapped",
                key
            ),
        }
    }
}

/// Contribution of one part to a link
#[derive(Debug, Clone, PartialEq)]
pub struct PartSummary {
    pub key: String,
    pub solid_count: usize,
    /// Materials used, in first-use order, with their densities
    pub materials: Vec<(String, f64)>,
}

impl PartSummary {
    /// Whether any solid used a rule-matched density
    pub fn has_matched_material(&self) -> bool {
        aggregate::has_matched_material(&self.materials)
    }
}

/// Aggregated result for one link
#[derive(Debug, Clone, PartialEq)]
pub struct LinkResult {
    pub name: String,
    pub parts: Vec<PartSummary>,
    /// `None` when the link has no valid solids
    pub properties: Option<AggregatedProperties>,
}

/// A depth-1 part not referenced by any link
#[derive(Debug, Clone, PartialEq)]
pub struct UnmappedPart {
    pub key: String,
    pub solid_count: usize,
    /// Mass in kg
    pub mass: f64,
}

/// Outcome of grouping all links of one root
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkReport {
    pub links: Vec<LinkResult>,
    pub unmapped: Vec<UnmappedPart>,
    pub diagnostics: Vec<Diagnostic>,
}

impl LinkReport {
    /// Links that produced valid properties
    pub fn valid_links(&self) -> impl Iterator<Item = (&str, &AggregatedProperties)> {
        self.links
            .iter()
            .filter_map(|link| link.properties.as_ref().map(|p| (link.name.as_str(), p)))
    }

    /// Sum of all valid link masses (kg)
    pub fn total_mass(&self) -> f64 {
        self.valid_links().map(|(_, p)| p.total_mass).sum()
    }

    /// Sum of unmapped part masses (kg)
    pub fn unmapped_mass(&self) -> f64 {
        self.unmapped.iter().map(|p| p.mass).sum()
    }
}

/// Aggregate each declared link from its depth-1 parts
///
/// All solids of a link are combined once, about the link's own center of
/// mass. Missing keys are reported and skipped. A part hidden by a later
/// part with the same key is listed as unmapped so its mass stays accounted
/// for.
pub fn group_by_links<P: GeometryProvider>(
    provider: &P,
    mapping: &LinkMapping,
    lookup: &PartLookup<'_, P::Label>,
    policy: DensityPolicy<'_>,
) -> LinkReport {
    let mut report = LinkReport::default();
    let mut mapped: HashSet<&str> = HashSet::new();

    for key in lookup.duplicate_keys() {
        tracing::warn!("Part key '{}' is not unique", key);
        report
            .diagnostics
            .push(Diagnostic::DuplicateKey { key: key.to_string() });
    }

    for (link_name, part_keys) in mapping.iter() {
        let mut link_records: Vec<SolidRecord> = Vec::new();
        let mut parts = Vec::new();

        for key in part_keys {
            let Some(node) = lookup.get(key) else {
                tracing::warn!("Part '{}' not found in assembly", key);
                report.diagnostics.push(Diagnostic::PartNotFound {
                    link: link_name.to_string(),
                    key: key.clone(),
                });
                continue;
            };
            mapped.insert(key.as_str());

            let records = aggregate::compute_with_policy(provider, node, policy);
            parts.push(PartSummary {
                key: key.clone(),
                solid_count: records.len(),
                materials: aggregate::materials_used(&records),
            });
            link_records.extend(records);
        }

        let properties = aggregate::combine_records(&link_records);
        match &properties {
            Some(props) => tracing::debug!(
                "Link '{}': {} solids from {} parts, {:.4} kg",
                link_name,
                props.solid_count,
                parts.len(),
                props.total_mass
            ),
            None => {
                tracing::warn!("{}: no valid solids", link_name);
                report.diagnostics.push(Diagnostic::NoValidSolids {
                    link: link_name.to_string(),
                });
            }
        }

        report.links.push(LinkResult {
            name: link_name.to_string(),
            parts,
            properties,
        });
    }

    report.unmapped = lookup
        .parts()
        .iter()
        .filter(|part| lookup.is_shadowed(part) || !mapped.contains(part.key.as_str()))
        .map(|part| UnmappedPart {
            key: part.key.clone(),
            solid_count: part.node.solid_count(),
            mass: aggregate::compute_with_policy(provider, part.node, policy)
                .iter()
                .map(|r| r.properties.mass)
                .sum(),
        })
        .collect();

    report
}

/// Properties of one depth-1 part when no link mapping is given
#[derive(Debug, Clone, PartialEq)]
pub struct PartResult {
    pub key: String,
    pub properties: AggregatedProperties,
}

/// Aggregate every depth-1 part on its own, skipping parts without valid
/// solids
pub fn summarize_parts<P: GeometryProvider>(
    provider: &P,
    lookup: &PartLookup<'_, P::Label>,
    policy: DensityPolicy<'_>,
) -> Vec<PartResult> {
    lookup
        .parts()
        .iter()
        .filter_map(|part| {
            let records = aggregate::compute_with_policy(provider, part.node, policy);
            aggregate::combine_records(&records).map(|properties| PartResult {
                key: part.key.clone(),
                properties,
            })
        })
        .collect()
}
