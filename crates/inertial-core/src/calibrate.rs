//! Effective density calibration
//!
//! Back-calculates the density a component's CAD volume needs to match its
//! datasheet mass. The results feed material maps for bought-in parts
//! (motors, bearings, rails) that are modelled as solid blocks.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::aggregate;
use crate::config::{ConfigError, ConfigResult, read_file};
use crate::geometry::GeometryProvider;
use crate::tree::AssemblyNode;
use crate::units;

/// A component with a known mass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationEntry {
    /// Name substrings leading from the root's children to the component
    pub path: Vec<String>,
    /// Datasheet mass in grams
    pub mass_g: f64,
    /// Component type used to group results
    #[serde(rename = "type")]
    pub component_type: String,
}

impl CalibrationEntry {
    /// Path joined for display
    pub fn label(&self) -> String {
        self.path.join(" > ")
    }
}

/// Parse a calibration file (a list of entries)
pub fn parse_calibration(json: &str) -> ConfigResult<Vec<CalibrationEntry>> {
    let entries: Vec<CalibrationEntry> =
        serde_json::from_str(json).map_err(|e| ConfigError::Parse {
            what: "calibration file",
            reason: e.to_string(),
        })?;
    for entry in &entries {
        if entry.path.is_empty() {
            return Err(ConfigError::Parse {
                what: "calibration file",
                reason: format!("entry '{}' has an empty path", entry.component_type),
            });
        }
    }
    Ok(entries)
}

pub fn load_calibration(path: impl AsRef<Path>) -> ConfigResult<Vec<CalibrationEntry>> {
    parse_calibration(&read_file(path.as_ref())?)
}

/// Measured volume and resulting density of one component
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    pub entry: CalibrationEntry,
    pub solid_count: usize,
    /// Volume in mm³
    pub volume_mm3: f64,
    /// `None` when the component has no volume
    pub effective_density: Option<f64>,
}

/// Per-type averages over all calibrated components
#[derive(Debug, Clone, PartialEq)]
pub struct TypeSummary {
    pub component_type: String,
    pub count: usize,
    /// Average volume in mm³
    pub average_volume_mm3: f64,
    /// Average datasheet mass in grams
    pub average_mass_g: f64,
    /// Average effective density (kg/m³)
    pub average_density: f64,
}

/// Calibrate every entry found below `root`; missing entries are logged and
/// skipped
pub fn calibrate<P: GeometryProvider>(
    provider: &P,
    root: &AssemblyNode<P::Label>,
    entries: &[CalibrationEntry],
) -> Vec<Calibration> {
    entries
        .iter()
        .filter_map(|entry| {
            let Some(node) = root.find_by_path(entry.path.as_slice()) else {
                tracing::warn!("{} not found", entry.label());
                return None;
            };
            let volume_mm3 = aggregate::total_volume(provider, node);
            Some(Calibration {
                entry: entry.clone(),
                solid_count: node.solid_count(),
                volume_mm3,
                effective_density: units::effective_density(entry.mass_g / 1000.0, volume_mm3),
            })
        })
        .collect()
}

/// Group calibrations by component type, in first-seen order
pub fn summarize_by_type(calibrations: &[Calibration]) -> Vec<TypeSummary> {
    let mut groups: Vec<(&str, Vec<&Calibration>)> = Vec::new();
    for calibration in calibrations {
        let component_type = calibration.entry.component_type.as_str();
        match groups.iter_mut().find(|(t, _)| *t == component_type) {
            Some((_, members)) => members.push(calibration),
            None => groups.push((component_type, vec![calibration])),
        }
    }

    groups
        .into_iter()
        .map(|(component_type, members)| {
            let n = members.len() as f64;
            TypeSummary {
                component_type: component_type.to_string(),
                count: members.len(),
                average_volume_mm3: members.iter().map(|c| c.volume_mm3).sum::<f64>() / n,
                average_mass_g: members.iter().map(|c| c.entry.mass_g).sum::<f64>() / n,
                average_density: members
                    .iter()
                    .map(|c| c.effective_density.unwrap_or(0.0))
                    .sum::<f64>()
                    / n,
            }
        })
        .collect()
}
