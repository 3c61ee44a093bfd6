//! Subtree mass property aggregation
//!
//! Walks an assembly subtree and produces one record per solid. The walk is a
//! pure fold: the effective default density is passed down explicitly and
//! results are concatenated in child order.

use crate::geometry::GeometryProvider;
use crate::mass::{self, AggregatedProperties, SolidMassProperties, VolumeProperties};
use crate::material::{DEFAULT_MATERIAL, MaterialRules};
use crate::tree::AssemblyNode;

/// How densities are assigned while aggregating
#[derive(Debug, Clone, Copy)]
pub enum DensityPolicy<'a> {
    /// One density for every solid
    Uniform(f64),
    /// Per-part rule resolution with inheritance through assemblies
    Rules {
        rules: &'a MaterialRules,
        default_density: f64,
    },
}

impl<'a> DensityPolicy<'a> {
    /// Rule-based when any rules are configured, uniform otherwise
    pub fn new(rules: &'a MaterialRules, default_density: f64) -> Self {
        if rules.is_empty() {
            DensityPolicy::Uniform(default_density)
        } else {
            DensityPolicy::Rules {
                rules,
                default_density,
            }
        }
    }

    pub fn default_density(&self) -> f64 {
        match *self {
            DensityPolicy::Uniform(density) => density,
            DensityPolicy::Rules {
                default_density, ..
            } => default_density,
        }
    }

    pub fn uses_rules(&self) -> bool {
        matches!(self, DensityPolicy::Rules { .. })
    }
}

/// Mass properties of one solid with the part it came from
#[derive(Debug, Clone, PartialEq)]
pub struct SolidRecord {
    /// Key of the originating part
    pub part: String,
    /// Density used (kg/m³)
    pub density: f64,
    /// Material label of the density
    pub material: String,
    pub properties: SolidMassProperties,
}

/// Per-solid mass properties of a subtree, resolving densities from `rules`
///
/// `default_density` is the density in effect above `node`. An assembly whose
/// key matches a rule replaces it for its descendants; a part's own match
/// overrides whatever it inherited.
pub fn compute_subtree_mass_properties<P: GeometryProvider>(
    provider: &P,
    node: &AssemblyNode<P::Label>,
    rules: &MaterialRules,
    default_density: f64,
) -> Vec<SolidRecord> {
    match node {
        AssemblyNode::Assembly(asm) => {
            let inherited = rules.inherited_density(node.key(), default_density);
            asm.children
                .iter()
                .flat_map(|child| compute_subtree_mass_properties(provider, child, rules, inherited))
                .collect()
        }
        AssemblyNode::Part(part) => {
            let key = node.key();
            let Some(handle) = &part.geometry else {
                tracing::trace!("Part '{}' has no geometry", key);
                return Vec::new();
            };
            let resolved = rules.resolve(key, default_density);
            solid_properties(provider, handle)
                .into_iter()
                .map(|props| SolidRecord {
                    part: key.to_string(),
                    density: resolved.density,
                    material: resolved.material.to_string(),
                    properties: props.with_density(resolved.density),
                })
                .collect()
        }
    }
}

/// Per-solid mass properties of a subtree under a density policy
pub fn compute_with_policy<P: GeometryProvider>(
    provider: &P,
    node: &AssemblyNode<P::Label>,
    policy: DensityPolicy<'_>,
) -> Vec<SolidRecord> {
    match policy {
        DensityPolicy::Uniform(density) => {
            compute_subtree_mass_properties(provider, node, &MaterialRules::default(), density)
        }
        DensityPolicy::Rules {
            rules,
            default_density,
        } => compute_subtree_mass_properties(provider, node, rules, default_density),
    }
}

/// Density-independent properties of every solid under a geometry handle
pub fn solid_properties<P: GeometryProvider>(
    provider: &P,
    handle: &P::Label,
) -> Vec<VolumeProperties> {
    provider
        .list_solids(handle)
        .iter()
        .map(|solid| {
            let (centroid, inertia) = provider.solid_centroid_and_inertia(solid);
            VolumeProperties::from_raw(provider.solid_volume(solid), centroid, inertia)
        })
        .collect()
}

/// Total volume (mm³) of all solids beneath `node`
pub fn total_volume<P: GeometryProvider>(provider: &P, node: &AssemblyNode<P::Label>) -> f64 {
    match node {
        AssemblyNode::Assembly(asm) => asm
            .children
            .iter()
            .map(|child| total_volume(provider, child))
            .sum(),
        AssemblyNode::Part(part) => part.geometry.as_ref().map_or(0.0, |handle| {
            provider
                .list_solids(handle)
                .iter()
                .map(|solid| provider.solid_volume(solid))
                .sum()
        }),
    }
}

/// Combine solid records into one rigid body
pub fn combine_records(records: &[SolidRecord]) -> Option<AggregatedProperties> {
    mass::combine(records.iter().map(|r| &r.properties))
}

/// Distinct materials used by `records` in first-use order
pub fn materials_used(records: &[SolidRecord]) -> Vec<(String, f64)> {
    let mut materials: Vec<(String, f64)> = Vec::new();
    for record in records {
        if !materials.iter().any(|(name, _)| *name == record.material) {
            materials.push((record.material.clone(), record.density));
        }
    }
    materials
}

/// Whether any record used a density from a matched rule
pub fn has_matched_material(materials: &[(String, f64)]) -> bool {
    materials.iter().any(|(name, _)| name != DEFAULT_MATERIAL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{ComponentDef, Location, MemoryGeometry, ShapeDef, SolidDef};
    use crate::material::MaterialRule;
    use crate::tree::walk_assembly;
    use approx::assert_relative_eq;

    const CM3: f64 = 1000.0;

    fn component(name: &str, shape: usize) -> ComponentDef {
        ComponentDef::new(name, shape)
    }

    /// Robot with a motor, a gripper sub-assembly (finger + nested pad
    /// assembly), and a shapeless part
    fn robot() -> MemoryGeometry {
        let mut g = MemoryGeometry::new();
        let motor = g.add_shape(ShapeDef::part(
            "DM-J4310",
            vec![SolidDef::cuboid([10.0, 10.0, 10.0], [0.0, 0.0, 0.0])],
        ));
        let finger = g.add_shape(ShapeDef::part(
            "finger",
            vec![
                SolidDef::cuboid([10.0, 10.0, 10.0], [100.0, 0.0, 0.0]),
                SolidDef::cuboid([10.0, 10.0, 10.0], [-100.0, 0.0, 0.0]),
            ],
        ));
        let pad = g.add_shape(ShapeDef::part(
            "TPU pad",
            vec![SolidDef::cuboid([10.0, 10.0, 10.0], [0.0, 50.0, 0.0])],
        ));
        let pad_asm = g.add_shape(ShapeDef::assembly("pad holder", vec![component("", pad)]));
        let ghost = g.add_shape(ShapeDef::empty_part("ghost"));
        let gripper = g.add_shape(ShapeDef::assembly(
            "Gripper",
            vec![
                component("finger v1:1", finger),
                component("pad holder v1:1", pad_asm),
                component("", ghost),
            ],
        ));
        g.add_root(ShapeDef::assembly(
            "Robot",
            vec![
                component("DM-J4310 v4:1", motor),
                component("Gripper v2:1", gripper),
            ],
        ));
        g
    }

    fn gripper_rules() -> MaterialRules {
        MaterialRules::new(vec![
            MaterialRule::new("DM-J4310", 7500.0).with_material("motor"),
            MaterialRule::new("TPU", 1200.0).with_material("TPU"),
            MaterialRule::new("Gripper", 2700.0).with_material("aluminium"),
        ])
    }

    #[test]
    fn test_leaf_records() {
        let g = robot();
        let root = walk_assembly(&g, &g.free_shapes()[0]);
        let motor = &root.children()[0];
        let records = compute_subtree_mass_properties(&g, motor, &gripper_rules(), 1250.0);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].part, "DM-J4310 v4:1");
        assert_eq!(records[0].material, "motor");
        assert_relative_eq!(records[0].properties.mass, CM3 * 1e-9 * 7500.0);
    }

    #[test]
    fn test_density_inheritance_override() {
        let g = robot();
        let root = walk_assembly(&g, &g.free_shapes()[0]);
        let gripper = &root.children()[1];
        let records = compute_subtree_mass_properties(&g, gripper, &gripper_rules(), 1250.0);

        // finger (2 solids), pad (1 solid), ghost contributes nothing
        assert_eq!(records.len(), 3);

        // Unmatched finger inherits the gripper density, not the fallback
        assert_eq!(records[0].part, "finger v1:1");
        assert_eq!(records[0].density, 2700.0);
        assert_eq!(records[0].material, DEFAULT_MATERIAL);

        // Pad matches its own rule below an unmatched intermediate assembly
        assert_eq!(records[2].part, "TPU pad");
        assert_eq!(records[2].density, 1200.0);
        assert_eq!(records[2].material, "TPU");
    }

    #[test]
    fn test_unmatched_assembly_passes_default_through() {
        let g = robot();
        let root = walk_assembly(&g, &g.free_shapes()[0]);
        let rules = MaterialRules::new(vec![MaterialRule::new("DM-J", 7500.0)]);
        let records = compute_subtree_mass_properties(&g, &root, &rules, 1100.0);
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].density, 7500.0);
        assert!(records[1..].iter().all(|r| r.density == 1100.0));
    }

    #[test]
    fn test_child_order_preserved() {
        let g = robot();
        let root = walk_assembly(&g, &g.free_shapes()[0]);
        let records = compute_with_policy(&g, &root, DensityPolicy::Uniform(1000.0));
        let parts: Vec<&str> = records.iter().map(|r| r.part.as_str()).collect();
        assert_eq!(
            parts,
            vec!["DM-J4310 v4:1", "finger v1:1", "finger v1:1", "TPU pad"]
        );
        assert!(records.iter().all(|r| r.material == DEFAULT_MATERIAL));
    }

    #[test]
    fn test_missing_geometry_contributes_nothing() {
        let g = robot();
        let root = walk_assembly(&g, &g.free_shapes()[0]);
        let ghost = &root.children()[1].children()[2];
        assert!(compute_with_policy(&g, ghost, DensityPolicy::Uniform(1000.0)).is_empty());
    }

    #[test]
    fn test_combined_gripper() {
        let g = robot();
        let root = walk_assembly(&g, &g.free_shapes()[0]);
        let gripper = &root.children()[1];
        let records = compute_subtree_mass_properties(&g, gripper, &gripper_rules(), 1250.0);
        let combined = combine_records(&records).unwrap();

        let finger_mass = CM3 * 1e-9 * 2700.0;
        let pad_mass = CM3 * 1e-9 * 1200.0;
        assert_relative_eq!(
            combined.total_mass,
            2.0 * finger_mass + pad_mass,
            max_relative = 1e-12
        );
        // Fingers are symmetric about x = 0, the pad pulls the COM along +y
        assert_relative_eq!(combined.center_of_mass.x, 0.0, epsilon = 1e-15);
        assert_relative_eq!(
            combined.center_of_mass.y,
            0.05 * pad_mass / combined.total_mass,
            max_relative = 1e-12
        );
        assert_eq!(combined.solid_count, 3);
    }

    #[test]
    fn test_policy_selection() {
        let empty = MaterialRules::default();
        assert!(!DensityPolicy::new(&empty, 1250.0).uses_rules());
        let rules = gripper_rules();
        let policy = DensityPolicy::new(&rules, 1250.0);
        assert!(policy.uses_rules());
        assert_eq!(policy.default_density(), 1250.0);
    }

    #[test]
    fn test_total_volume() {
        let g = robot();
        let root = walk_assembly(&g, &g.free_shapes()[0]);
        assert_relative_eq!(total_volume(&g, &root), 4.0 * CM3);
        assert_relative_eq!(total_volume(&g, &root.children()[1]), 3.0 * CM3);
    }

    #[test]
    fn test_materials_used() {
        let g = robot();
        let root = walk_assembly(&g, &g.free_shapes()[0]);
        let records = compute_subtree_mass_properties(&g, &root, &gripper_rules(), 1250.0);
        let materials = materials_used(&records);
        assert_eq!(
            materials,
            vec![
                ("motor".to_string(), 7500.0),
                (DEFAULT_MATERIAL.to_string(), 2700.0),
                ("TPU".to_string(), 1200.0),
            ]
        );
        assert!(has_matched_material(&materials));
        assert!(!has_matched_material(&[(DEFAULT_MATERIAL.to_string(), 1.0)]));
    }

    #[test]
    fn test_nested_assembly_override() {
        let mut g = MemoryGeometry::new();
        let plate = g.add_shape(ShapeDef::part(
            "plate",
            vec![SolidDef::cuboid([10.0, 10.0, 10.0], [0.0, 0.0, 0.0])],
        ));
        let bracket = g.add_shape(ShapeDef::assembly(
            "Steel bracket",
            vec![component("plate v1:1", plate)],
        ));
        let gripper = g.add_shape(ShapeDef::assembly(
            "Gripper",
            vec![
                component("Steel bracket v1:1", bracket),
                component("plate v1:2", plate),
            ],
        ));
        g.add_root(ShapeDef::assembly("Robot", vec![component("Gripper v1:1", gripper)]));

        let rules = MaterialRules::new(vec![
            MaterialRule::new("Gripper", 2700.0),
            MaterialRule::new("Steel", 7800.0),
        ]);
        let root = walk_assembly(&g, &g.free_shapes()[0]);
        let records = compute_subtree_mass_properties(&g, &root, &rules, 1250.0);

        assert_eq!(records.len(), 2);
        // Inner assembly match wins over the outer one for its own subtree
        assert_eq!(records[0].part, "plate v1:1");
        assert_eq!(records[0].density, 7800.0);
        // Sibling outside the bracket keeps the gripper density
        assert_eq!(records[1].part, "plate v1:2");
        assert_eq!(records[1].density, 2700.0);
    }

    #[test]
    fn test_placed_instances_combine() {
        let mut g = MemoryGeometry::new();
        let motor = g.add_shape(ShapeDef::part(
            "motor",
            vec![SolidDef::cuboid([10.0, 10.0, 10.0], [100.0, 0.0, 0.0])],
        ));
        g.add_root(ShapeDef::assembly(
            "arm",
            vec![
                component("motor v1:1", motor),
                component("motor v1:2", motor).at(Location::from_translation([0.0, 60.0, 0.0])),
            ],
        ));
        let root = walk_assembly(&g, &g.free_shapes()[0]);
        let records = compute_with_policy(&g, &root, DensityPolicy::Uniform(1000.0));
        let combined = combine_records(&records).unwrap();

        assert_relative_eq!(combined.center_of_mass.x, 0.1, max_relative = 1e-12);
        assert_relative_eq!(combined.center_of_mass.y, 0.03, max_relative = 1e-12);
        assert_relative_eq!(combined.center_of_mass.z, 0.0, epsilon = 1e-15);

        // Each instance sits 30 mm off the combined COM along y
        let m = CM3 * 1e-9 * 1000.0;
        let own = m * (0.01 * 0.01 + 0.01 * 0.01) / 12.0;
        assert_relative_eq!(combined.inertia.y_axis.y, 2.0 * own, max_relative = 1e-9);
        assert_relative_eq!(
            combined.inertia.x_axis.x,
            2.0 * own + 2.0 * m * 0.03 * 0.03,
            max_relative = 1e-9
        );
    }
}
