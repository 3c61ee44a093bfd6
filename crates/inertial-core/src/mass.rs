//! Mass properties and their combination
//!
//! Solids are combined with the parallel-axis theorem: each solid's own
//! centroidal inertia is shifted to the combined center of mass before
//! summing.

use glam::{DMat3, DVec3};
use serde::{Deserialize, Serialize};

use crate::units;

/// Combined mass below this is treated as "no valid solids"
pub const MASS_EPSILON: f64 = 1e-12;

/// Density-independent properties of one solid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeProperties {
    /// Volume in mm³
    pub volume_mm3: f64,
    /// Centroid in meters
    pub centroid: DVec3,
    /// Volume-weighted inertia about the centroid in mm⁵
    pub inertia_raw: DMat3,
}

impl VolumeProperties {
    /// Build from raw kernel output (volume mm³, centroid mm, inertia mm⁵)
    pub fn from_raw(volume_mm3: f64, centroid_mm: DVec3, inertia_mm5: DMat3) -> Self {
        Self {
            volume_mm3,
            centroid: units::point_to_meters(centroid_mm),
            inertia_raw: inertia_mm5,
        }
    }

    /// Mass properties at the given density (kg/m³)
    pub fn with_density(&self, density: f64) -> SolidMassProperties {
        SolidMassProperties {
            volume_mm3: self.volume_mm3,
            mass: units::mass_from_volume(self.volume_mm3, density),
            centroid: self.centroid,
            inertia: self.inertia_raw * units::inertia_scale(density),
        }
    }
}

/// Mass properties of a single solid in SI units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolidMassProperties {
    /// Volume in mm³
    pub volume_mm3: f64,
    /// Mass in kg
    pub mass: f64,
    /// Centroid in meters
    pub centroid: DVec3,
    /// Inertia about the centroid in kg·m²
    pub inertia: DMat3,
}

impl SolidMassProperties {
    pub fn new(volume_mm3: f64, mass: f64, centroid: DVec3, inertia: DMat3) -> Self {
        Self {
            volume_mm3,
            mass,
            centroid,
            inertia,
        }
    }

    /// A point mass (zero inertia about its own centroid)
    pub fn point(mass: f64, centroid: DVec3) -> Self {
        Self::new(0.0, mass, centroid, DMat3::ZERO)
    }

    /// Inertia of this solid about `point`
    pub fn inertia_about(&self, point: DVec3) -> DMat3 {
        self.inertia + parallel_axis_shift(self.mass, self.centroid - point)
    }
}

/// Parallel-axis term `m ((d·d) I₃ - d ⊗ d)`
pub fn parallel_axis_shift(mass: f64, d: DVec3) -> DMat3 {
    let outer = DMat3::from_cols(d * d.x, d * d.y, d * d.z);
    (DMat3::IDENTITY * d.length_squared() - outer) * mass
}

/// Six independent components of a symmetric inertia tensor (kg·m²)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InertiaMatrix {
    pub ixx: f64,
    pub ixy: f64,
    pub ixz: f64,
    pub iyy: f64,
    pub iyz: f64,
    pub izz: f64,
}

impl InertiaMatrix {
    /// Read the upper triangle of `m`
    pub fn from_mat3(m: &DMat3) -> Self {
        Self {
            ixx: m.x_axis.x,
            ixy: m.y_axis.x,
            ixz: m.z_axis.x,
            iyy: m.y_axis.y,
            iyz: m.z_axis.y,
            izz: m.z_axis.z,
        }
    }

    pub fn to_mat3(&self) -> DMat3 {
        DMat3::from_cols(
            DVec3::new(self.ixx, self.ixy, self.ixz),
            DVec3::new(self.ixy, self.iyy, self.iyz),
            DVec3::new(self.ixz, self.iyz, self.izz),
        )
    }
}

/// Combined rigid-body properties of a set of solids
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregatedProperties {
    /// Total volume in mm³
    pub total_volume_mm3: f64,
    /// Total mass in kg
    pub total_mass: f64,
    /// Center of mass in meters
    pub center_of_mass: DVec3,
    /// Inertia about the center of mass in kg·m²
    pub inertia: DMat3,
    pub solid_count: usize,
}

impl AggregatedProperties {
    pub fn volume_m3(&self) -> f64 {
        units::volume_to_m3(self.total_volume_mm3)
    }

    pub fn inertia_matrix(&self) -> InertiaMatrix {
        InertiaMatrix::from_mat3(&self.inertia)
    }
}

/// Combine solids into one rigid body
///
/// Returns `None` when there is nothing to combine or the total mass is
/// below [`MASS_EPSILON`].
pub fn combine<'a, I>(items: I) -> Option<AggregatedProperties>
where
    I: IntoIterator<Item = &'a SolidMassProperties>,
    I::IntoIter: Clone,
{
    let items = items.into_iter();

    let (total_mass, weighted, total_volume_mm3, solid_count) = items.clone().fold(
        (0.0, DVec3::ZERO, 0.0, 0usize),
        |(mass, weighted, volume, count), s| {
            (
                mass + s.mass,
                weighted + s.centroid * s.mass,
                volume + s.volume_mm3,
                count + 1,
            )
        },
    );
    if solid_count == 0 || total_mass < MASS_EPSILON {
        return None;
    }

    let center_of_mass = weighted / total_mass;
    let inertia = items.fold(DMat3::ZERO, |acc, s| acc + s.inertia_about(center_of_mass));

    Some(AggregatedProperties {
        total_volume_mm3,
        total_mass,
        center_of_mass,
        inertia,
        solid_count,
    })
}
