//! Unit and density conversion
//!
//! Geometry comes in from the kernel in millimeters. Everything leaving this
//! crate is SI: kilograms, meters, kg·m².

use glam::DVec3;

/// mm³ to m³
pub const MM3_TO_M3: f64 = 1e-9;

/// mm to m
pub const MM_TO_M: f64 = 1e-3;

/// mm⁵ to m⁵ (volume-weighted second moment)
pub const MM5_TO_M5: f64 = 1e-15;

/// Convert a volume in mm³ to m³
pub fn volume_to_m3(volume_mm3: f64) -> f64 {
    volume_mm3 * MM3_TO_M3
}

/// Mass in kg of a volume in mm³ at the given density (kg/m³)
pub fn mass_from_volume(volume_mm3: f64, density_kg_m3: f64) -> f64 {
    volume_to_m3(volume_mm3) * density_kg_m3
}

/// Factor turning a volume-weighted inertia in mm⁵ into kg·m²
pub fn inertia_scale(density_kg_m3: f64) -> f64 {
    density_kg_m3 * MM5_TO_M5
}

/// Convert a point in mm to meters
pub fn point_to_meters(point_mm: DVec3) -> DVec3 {
    point_mm * MM_TO_M
}

/// Density (kg/m³) a body of `volume_mm3` must have to weigh `mass_kg`
///
/// Returns `None` for a non-positive volume.
pub fn effective_density(mass_kg: f64, volume_mm3: f64) -> Option<f64> {
    let volume_m3 = volume_to_m3(volume_mm3);
    (volume_m3 > 0.0).then(|| mass_kg / volume_m3)
}
