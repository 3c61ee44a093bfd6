//! Geometry provider abstraction
//!
//! The aggregation engine never touches B-Rep data directly. A provider
//! exposes the assembly structure and raw, density-free per-solid properties
//! (volume in mm³, centroid in mm, volume-weighted inertia about the centroid
//! in mm⁵), all in the frame of the root shape. `MemoryGeometry` is a provider
//! backed by a serialized shape table.

use std::path::Path;

use glam::{DAffine3, DMat3, DVec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for loading geometry
#[derive(Debug, Clone, Error)]
pub enum GeometryError {
    #[error("IO error reading {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse geometry: {0}")]
    Parse(String),

    #[error("Shape {shape} references missing shape {index}")]
    ShapeOutOfRange { shape: usize, index: usize },

    #[error("Root references missing shape {0}")]
    RootOutOfRange(usize),

    #[error("Shape {0} is part of a component cycle")]
    Cycle(usize),

    #[error("Component {component} of shape {shape} has a rotation that is not rigid")]
    InvalidLocation { shape: usize, component: usize },
}

/// Result type for geometry loading
pub type GeometryResult<T> = Result<T, GeometryError>;

/// Where a component of an assembly points to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentTarget<L> {
    /// The component instantiates a shared shape definition
    Reference(L),
    /// The component carries its own shape; its label names the node and
    /// the component name is ignored
    Inline(L),
}

/// A component (instance) of an assembly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component<L> {
    /// Name attached to the instance itself (may be empty)
    pub name: String,
    pub target: ComponentTarget<L>,
}

/// Capability the mass property engine consumes from a geometry kernel
///
/// Child order returned by `components` must be stable: it is the order in
/// which parts appear in every report.
pub trait GeometryProvider {
    /// Handle to a shape definition or instance
    type Label: Clone + std::fmt::Debug;
    /// Handle to a single solid body
    type Solid;

    /// Top-level shapes of the document
    fn free_shapes(&self) -> Vec<Self::Label>;

    /// Name stored on the label (empty if none)
    fn label_name(&self, label: &Self::Label) -> String;

    /// Whether the label is an assembly
    fn is_assembly(&self, label: &Self::Label) -> bool;

    /// Components of an assembly in declaration order
    fn components(&self, label: &Self::Label) -> Vec<Component<Self::Label>>;

    /// Whether the label carries a shape at all
    fn has_shape(&self, label: &Self::Label) -> bool;

    /// All solids contained in the label's shape
    fn list_solids(&self, label: &Self::Label) -> Vec<Self::Solid>;

    /// Volume of a solid in mm³
    fn solid_volume(&self, solid: &Self::Solid) -> f64;

    /// Centroid (mm) and volume-weighted inertia about the centroid (mm⁵),
    /// expressed in the root frame
    fn solid_centroid_and_inertia(&self, solid: &Self::Solid) -> (DVec3, DMat3);

    /// Number of solids in the label's shape
    fn count_solids(&self, label: &Self::Label) -> usize {
        if self.has_shape(label) {
            self.list_solids(label).len()
        } else {
            0
        }
    }
}

/// Raw properties of one solid as stored in a geometry dump
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolidDef {
    /// Volume in mm³
    pub volume: f64,
    /// Centroid in mm
    pub centroid: [f64; 3],
    /// Volume-weighted inertia about the centroid in mm⁵ (row-major)
    pub inertia: [[f64; 3]; 3],
}

impl SolidDef {
    pub fn new(volume: f64, centroid: [f64; 3], inertia: [[f64; 3]; 3]) -> Self {
        Self {
            volume,
            centroid,
            inertia,
        }
    }

    /// Solid with a diagonal inertia tensor
    pub fn with_principal(volume: f64, centroid: [f64; 3], diagonal: [f64; 3]) -> Self {
        Self::new(
            volume,
            centroid,
            [
                [diagonal[0], 0.0, 0.0],
                [0.0, diagonal[1], 0.0],
                [0.0, 0.0, diagonal[2]],
            ],
        )
    }

    /// Axis-aligned box of the given edge lengths (mm) centered at `centroid`
    pub fn cuboid(size: [f64; 3], centroid: [f64; 3]) -> Self {
        let [a, b, c] = size;
        let volume = a * b * c;
        Self::with_principal(
            volume,
            centroid,
            [
                volume * (b * b + c * c) / 12.0,
                volume * (a * a + c * c) / 12.0,
                volume * (a * a + b * b) / 12.0,
            ],
        )
    }

    fn inertia_matrix(&self) -> DMat3 {
        DMat3::from_cols_array_2d(&self.inertia).transpose()
    }
}

fn identity_rotation() -> [[f64; 3]; 3] {
    [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]
}

/// Placement of a component in its parent's frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Translation in mm
    #[serde(default)]
    pub translation: [f64; 3],
    /// Rotation matrix (row-major)
    #[serde(default = "identity_rotation")]
    pub rotation: [[f64; 3]; 3],
}

impl Default for Location {
    fn default() -> Self {
        Self {
            translation: [0.0; 3],
            rotation: identity_rotation(),
        }
    }
}

impl Location {
    pub fn new(rotation: [[f64; 3]; 3], translation: [f64; 3]) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    pub fn from_translation(translation: [f64; 3]) -> Self {
        Self {
            translation,
            ..Self::default()
        }
    }

    pub fn rotation_matrix(&self) -> DMat3 {
        DMat3::from_cols_array_2d(&self.rotation).transpose()
    }

    pub fn to_affine(&self) -> DAffine3 {
        DAffine3::from_mat3_translation(
            self.rotation_matrix(),
            DVec3::from_array(self.translation),
        )
    }

    /// Whether the rotation is proper and orthonormal
    pub fn is_rigid(&self) -> bool {
        let r = self.rotation_matrix();
        (r.transpose() * r).abs_diff_eq(DMat3::IDENTITY, 1e-6)
            && (r.determinant() - 1.0).abs() < 1e-6
    }
}

/// A component entry in a shape definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDef {
    /// Instance name
    #[serde(default)]
    pub name: String,
    /// Index of the referenced shape
    pub shape: usize,
    /// Placement in the parent assembly; identity when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl ComponentDef {
    pub fn new(name: impl Into<String>, shape: usize) -> Self {
        Self {
            name: name.into(),
            shape,
            location: None,
        }
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    fn placement(&self) -> DAffine3 {
        self.location
            .map_or(DAffine3::IDENTITY, |location| location.to_affine())
    }
}

/// A shape instance with its accumulated placement in the root frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedShape {
    pub shape: usize,
    pub location: DAffine3,
}

impl PlacedShape {
    /// Shape at the root frame origin
    pub fn new(shape: usize) -> Self {
        Self {
            shape,
            location: DAffine3::IDENTITY,
        }
    }

    fn child(&self, component: &ComponentDef) -> Self {
        Self {
            shape: component.shape,
            location: self.location * component.placement(),
        }
    }
}

/// A solid definition placed in the root frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedSolid {
    pub solid: SolidDef,
    pub location: DAffine3,
}

/// A shape definition: either a part with solids or an assembly of components
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShapeDef {
    #[serde(default)]
    pub name: String,
    /// Solids of a part; `None` when the part has no shape
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solids: Option<Vec<SolidDef>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ComponentDef>,
}

impl ShapeDef {
    pub fn part(name: impl Into<String>, solids: Vec<SolidDef>) -> Self {
        Self {
            name: name.into(),
            solids: Some(solids),
            components: Vec::new(),
        }
    }

    /// A part label without any shape attached
    pub fn empty_part(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            solids: None,
            components: Vec::new(),
        }
    }

    pub fn assembly(name: impl Into<String>, components: Vec<ComponentDef>) -> Self {
        Self {
            name: name.into(),
            solids: None,
            components,
        }
    }
}

/// In-memory geometry provider backed by a shape table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryGeometry {
    /// Indices of the free (top-level) shapes
    pub roots: Vec<usize>,
    pub shapes: Vec<ShapeDef>,
}

impl MemoryGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a shape and return its index
    pub fn add_shape(&mut self, shape: ShapeDef) -> usize {
        self.shapes.push(shape);
        self.shapes.len() - 1
    }

    /// Add a shape and mark it as a free shape
    pub fn add_root(&mut self, shape: ShapeDef) -> usize {
        let index = self.add_shape(shape);
        self.roots.push(index);
        index
    }

    /// Parse and validate a geometry dump
    pub fn from_json_str(json: &str) -> GeometryResult<Self> {
        let geometry: Self =
            serde_json::from_str(json).map_err(|e| GeometryError::Parse(e.to_string()))?;
        geometry.validate()?;
        Ok(geometry)
    }

    /// Load and validate a geometry dump file
    pub fn load(path: impl AsRef<Path>) -> GeometryResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| GeometryError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let geometry = Self::from_json_str(&content)?;
        tracing::info!(
            "Loaded {} shapes ({} roots) from {:?}",
            geometry.shapes.len(),
            geometry.roots.len(),
            path
        );
        Ok(geometry)
    }

    /// Check that all indices are in range and components form no cycle
    pub fn validate(&self) -> GeometryResult<()> {
        for &root in &self.roots {
            if root >= self.shapes.len() {
                return Err(GeometryError::RootOutOfRange(root));
            }
        }
        for (shape, def) in self.shapes.iter().enumerate() {
            for (index, component) in def.components.iter().enumerate() {
                if component.shape >= self.shapes.len() {
                    return Err(GeometryError::ShapeOutOfRange {
                        shape,
                        index: component.shape,
                    });
                }
                if component.location.is_some_and(|l| !l.is_rigid()) {
                    return Err(GeometryError::InvalidLocation {
                        shape,
                        component: index,
                    });
                }
            }
        }

        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        let mut marks = vec![Mark::Unvisited; self.shapes.len()];
        for start in 0..self.shapes.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }
            // Iterative DFS: (shape, next component index)
            let mut stack = vec![(start, 0usize)];
            marks[start] = Mark::InProgress;
            while let Some(frame) = stack.last_mut() {
                let (shape, next) = *frame;
                frame.1 += 1;
                if let Some(component) = self.shapes[shape].components.get(next) {
                    match marks[component.shape] {
                        Mark::InProgress => return Err(GeometryError::Cycle(component.shape)),
                        Mark::Unvisited => {
                            marks[component.shape] = Mark::InProgress;
                            stack.push((component.shape, 0));
                        }
                        Mark::Done => {}
                    }
                } else {
                    marks[shape] = Mark::Done;
                    stack.pop();
                }
            }
        }
        Ok(())
    }

    fn collect_solids(&self, placed: &PlacedShape, out: &mut Vec<PlacedSolid>) {
        let Some(def) = self.shapes.get(placed.shape) else {
            return;
        };
        if let Some(solids) = &def.solids {
            out.extend(solids.iter().map(|&solid| PlacedSolid {
                solid,
                location: placed.location,
            }));
        }
        for component in &def.components {
            self.collect_solids(&placed.child(component), out);
        }
    }
}

impl GeometryProvider for MemoryGeometry {
    type Label = PlacedShape;
    type Solid = PlacedSolid;

    fn free_shapes(&self) -> Vec<PlacedShape> {
        self.roots.iter().map(|&root| PlacedShape::new(root)).collect()
    }

    fn label_name(&self, label: &PlacedShape) -> String {
        self.shapes
            .get(label.shape)
            .map(|s| s.name.clone())
            .unwrap_or_default()
    }

    fn is_assembly(&self, label: &PlacedShape) -> bool {
        self.shapes
            .get(label.shape)
            .is_some_and(|s| !s.components.is_empty())
    }

    fn components(&self, label: &PlacedShape) -> Vec<Component<PlacedShape>> {
        self.shapes
            .get(label.shape)
            .map(|s| {
                s.components
                    .iter()
                    .map(|c| Component {
                        name: c.name.clone(),
                        target: ComponentTarget::Reference(label.child(c)),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn has_shape(&self, label: &PlacedShape) -> bool {
        self.shapes
            .get(label.shape)
            .is_some_and(|s| s.solids.is_some() || !s.components.is_empty())
    }

    fn list_solids(&self, label: &PlacedShape) -> Vec<PlacedSolid> {
        let mut solids = Vec::new();
        self.collect_solids(label, &mut solids);
        solids
    }

    fn solid_volume(&self, placed: &PlacedSolid) -> f64 {
        placed.solid.volume
    }

    fn solid_centroid_and_inertia(&self, placed: &PlacedSolid) -> (DVec3, DMat3) {
        let rotation = placed.location.matrix3;
        (
            placed
                .location
                .transform_point3(DVec3::from_array(placed.solid.centroid)),
            rotation * placed.solid.inertia_matrix() * rotation.transpose(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample() -> MemoryGeometry {
        let mut geometry = MemoryGeometry::new();
        let cube = geometry.add_shape(ShapeDef::part(
            "cube",
            vec![SolidDef::cuboid([10.0, 10.0, 10.0], [0.0, 0.0, 0.0])],
        ));
        let sub = geometry.add_shape(ShapeDef::assembly(
            "sub",
            vec![
                ComponentDef::new("cube:1", cube),
                ComponentDef::new("cube:2", cube),
            ],
        ));
        geometry.add_root(ShapeDef::assembly(
            "root",
            vec![ComponentDef::new("sub:1", sub)],
        ));
        geometry
    }

    /// 90° about +z
    const QUARTER_TURN_Z: [[f64; 3]; 3] = [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];

    #[test]
    fn test_compound_solids() {
        let geometry = sample();
        let root = geometry.free_shapes()[0];
        assert_eq!(geometry.count_solids(&root), 2);
        assert!(geometry.is_assembly(&root));
        assert!(!geometry.is_assembly(&PlacedShape::new(0)));
    }

    #[test]
    fn test_cuboid_inertia() {
        let geometry = MemoryGeometry::new();
        let solid = PlacedSolid {
            solid: SolidDef::cuboid([2.0, 4.0, 6.0], [1.0, 2.0, 3.0]),
            location: DAffine3::IDENTITY,
        };
        let (centroid, inertia) = geometry.solid_centroid_and_inertia(&solid);
        assert_eq!(geometry.solid_volume(&solid), 48.0);
        assert_eq!(centroid, DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(inertia.x_axis.x, 48.0 * (16.0 + 36.0) / 12.0);
        assert_eq!(inertia.z_axis.z, 48.0 * (4.0 + 16.0) / 12.0);
    }

    #[test]
    fn test_row_major_inertia() {
        let solid = SolidDef::new(
            1.0,
            [0.0; 3],
            [[1.0, 2.0, 3.0], [2.0, 4.0, 5.0], [3.0, 5.0, 6.0]],
        );
        let inertia = solid.inertia_matrix();
        // row 0, column 2
        assert_eq!(inertia.z_axis.x, 3.0);
        // row 1, column 2
        assert_eq!(inertia.z_axis.y, 5.0);
    }

    #[test]
    fn test_instances_placed_in_root_frame() {
        let mut geometry = MemoryGeometry::new();
        let motor = geometry.add_shape(ShapeDef::part(
            "motor",
            vec![SolidDef::cuboid([10.0, 10.0, 10.0], [100.0, 0.0, 0.0])],
        ));
        geometry.add_root(ShapeDef::assembly(
            "arm",
            vec![
                ComponentDef::new("motor v1:1", motor),
                ComponentDef::new("motor v1:2", motor)
                    .at(Location::from_translation([0.0, 50.0, 0.0])),
            ],
        ));

        let root = geometry.free_shapes()[0];
        let centroids: Vec<DVec3> = geometry
            .list_solids(&root)
            .iter()
            .map(|solid| geometry.solid_centroid_and_inertia(solid).0)
            .collect();
        assert_eq!(
            centroids,
            vec![DVec3::new(100.0, 0.0, 0.0), DVec3::new(100.0, 50.0, 0.0)]
        );
    }

    #[test]
    fn test_rotated_instance() {
        let mut geometry = MemoryGeometry::new();
        let block = geometry.add_shape(ShapeDef::part(
            "block",
            vec![SolidDef::cuboid([2.0, 4.0, 6.0], [1.0, 2.0, 3.0])],
        ));
        let holder = geometry.add_shape(ShapeDef::assembly(
            "holder",
            vec![ComponentDef::new("block:1", block).at(Location::new(QUARTER_TURN_Z, [10.0, 0.0, 0.0]))],
        ));
        geometry.add_root(ShapeDef::assembly(
            "root",
            vec![ComponentDef::new("holder:1", holder).at(Location::from_translation([0.0, 0.0, 5.0]))],
        ));

        let root = geometry.free_shapes()[0];
        let solids = geometry.list_solids(&root);
        assert_eq!(solids.len(), 1);
        let (centroid, inertia) = geometry.solid_centroid_and_inertia(&solids[0]);

        // (1, 2, 3) turned to (-2, 1, 3), then shifted by (10, 0, 5)
        assert_relative_eq!(centroid.x, 8.0);
        assert_relative_eq!(centroid.y, 1.0);
        assert_relative_eq!(centroid.z, 8.0);

        // Principal moments about x and y swap places
        let (ixx, iyy, izz) = (48.0 * 52.0 / 12.0, 48.0 * 40.0 / 12.0, 48.0 * 20.0 / 12.0);
        assert_relative_eq!(inertia.x_axis.x, iyy, max_relative = 1e-12);
        assert_relative_eq!(inertia.y_axis.y, ixx, max_relative = 1e-12);
        assert_relative_eq!(inertia.z_axis.z, izz, max_relative = 1e-12);
        assert_relative_eq!(inertia.y_axis.x, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_components_carry_placement() {
        let mut geometry = MemoryGeometry::new();
        let part = geometry.add_shape(ShapeDef::part("p", Vec::new()));
        let root = geometry.add_root(ShapeDef::assembly(
            "root",
            vec![ComponentDef::new("p:1", part).at(Location::from_translation([1.0, 2.0, 3.0]))],
        ));
        let components = geometry.components(&PlacedShape::new(root));
        let ComponentTarget::Reference(child) = components[0].target else {
            panic!("expected a reference");
        };
        assert_eq!(child.shape, part);
        assert_eq!(child.location.translation, DVec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "roots": [1],
            "shapes": [
                {"name": "plate", "solids": [{"volume": 100.0, "centroid": [0, 0, 0],
                  "inertia": [[1, 0, 0], [0, 1, 0], [0, 0, 1]]}]},
                {"name": "robot", "components": [
                    {"name": "plate v1:1", "shape": 0},
                    {"name": "plate v1:2", "shape": 0, "location": {"translation": [0, 0, 20]}}
                ]}
            ]
        }"#;
        let geometry = MemoryGeometry::from_json_str(json).unwrap();
        let roots = geometry.free_shapes();
        assert_eq!(roots, vec![PlacedShape::new(1)]);
        assert_eq!(geometry.label_name(&PlacedShape::new(0)), "plate");
        assert_eq!(geometry.components(&roots[0]).len(), 2);
        assert_eq!(geometry.shapes[1].components[0].location, None);
        assert_eq!(
            geometry.shapes[1].components[1].location,
            Some(Location::from_translation([0.0, 0.0, 20.0]))
        );
    }

    #[test]
    fn test_missing_shape_rejected() {
        let json = r#"{"roots": [0], "shapes": [{"name": "a", "components": [{"shape": 3}]}]}"#;
        let result = MemoryGeometry::from_json_str(json);
        assert!(matches!(
            result,
            Err(GeometryError::ShapeOutOfRange { shape: 0, index: 3 })
        ));
    }

    #[test]
    fn test_non_rigid_location_rejected() {
        let json = r#"{"roots": [1], "shapes": [
            {"name": "a", "solids": []},
            {"name": "b", "components": [
                {"shape": 0},
                {"shape": 0, "location": {"rotation": [[2, 0, 0], [0, 1, 0], [0, 0, 1]]}}
            ]}
        ]}"#;
        let result = MemoryGeometry::from_json_str(json);
        assert!(matches!(
            result,
            Err(GeometryError::InvalidLocation {
                shape: 1,
                component: 1
            })
        ));
    }

    #[test]
    fn test_cycle_rejected() {
        let json = r#"{"roots": [0], "shapes": [
            {"name": "a", "components": [{"shape": 1}]},
            {"name": "b", "components": [{"shape": 0}]}
        ]}"#;
        let result = MemoryGeometry::from_json_str(json);
        assert!(matches!(result, Err(GeometryError::Cycle(_))));
    }

    #[test]
    fn test_part_without_shape() {
        let mut geometry = MemoryGeometry::new();
        let label = PlacedShape::new(geometry.add_shape(ShapeDef::empty_part("ghost")));
        assert!(!geometry.has_shape(&label));
        assert_eq!(geometry.count_solids(&label), 0);
    }
}
