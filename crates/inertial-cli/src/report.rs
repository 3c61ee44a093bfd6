//! Console and URDF rendering of aggregation results

use std::path::Path;

use inertial_core::{
    AggregatedProperties, AssemblyNode, Calibration, DensityPolicy, Diagnostic, LinkReport,
    PartLookup, PartResult, summarize_by_type, to_urdf_inertial,
};

const RULE_WIDTH: usize = 110;

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

/// Indented outline of an assembly tree, one line per node
pub fn format_tree<H>(node: &AssemblyNode<H>) -> Vec<String> {
    let mut lines = Vec::new();
    push_tree_lines(node, 0, &mut lines);
    lines
}

fn push_tree_lines<H>(node: &AssemblyNode<H>, indent: usize, lines: &mut Vec<String>) {
    let kind = if node.is_assembly() { "ASM" } else { "PART" };
    let instance = node
        .instance_name()
        .filter(|n| !n.is_empty())
        .map(|n| format!(" [instance: {}]", n))
        .unwrap_or_default();
    lines.push(format!(
        "{}{} {}{} ({} solids)",
        "  ".repeat(indent),
        kind,
        node.display_name(),
        instance,
        node.solid_count()
    ));
    for child in node.children() {
        push_tree_lines(child, indent + 1, lines);
    }
}

pub fn print_tree<H>(node: &AssemblyNode<H>) {
    for line in format_tree(node) {
        println!("{}", line);
    }
}

pub fn print_part_list<H>(lookup: &PartLookup<'_, H>) {
    println!("\n=== Depth-1 Parts ({}) ===", lookup.len());
    println!("Use these instance names in the link mapping JSON file.\n");
    for part in lookup.parts() {
        println!("  {:<60} ({} solids)", part.key, part.node.solid_count());
    }
}

pub fn print_density_header(policy: DensityPolicy<'_>, material_map: Option<&Path>, rules: usize) {
    match (policy, material_map) {
        (DensityPolicy::Rules { default_density, .. }, Some(path)) => {
            println!(
                "\nUsing material map: {} ({} patterns)",
                path.display(),
                rules
            );
            println!("Default density: {} kg/m³", default_density);
        }
        _ => println!("\nUsing uniform density: {} kg/m³", policy.default_density()),
    }
}

/// Volume, mass, CoM and inertia lines for one body
pub fn format_properties(props: &AggregatedProperties) -> Vec<String> {
    let com = props.center_of_mass;
    let i = props.inertia_matrix();
    vec![
        format!(
            "  Volume:  {:.1} mm³  ({:.2} cm³)",
            props.total_volume_mm3,
            props.volume_m3() * 1e6
        ),
        format!(
            "  Mass:    {:.4} kg  ({:.1} g)",
            props.total_mass,
            props.total_mass * 1000.0
        ),
        format!("  CoM (m): ({:.6}, {:.6}, {:.6})", com.x, com.y, com.z),
        "  Inertia (kg·m²) at CoM:".to_string(),
        format!(
            "    Ixx={:.5e}  Iyy={:.5e}  Izz={:.5e}",
            i.ixx, i.iyy, i.izz
        ),
        format!(
            "    Ixy={:.5e}  Ixz={:.5e}  Iyz={:.5e}",
            i.ixy, i.ixz, i.iyz
        ),
    ]
}

/// `value` with `digits` significant digits, switching to exponent notation
/// for very small or large magnitudes and dropping trailing zeros
pub fn format_significant(value: f64, digits: usize) -> String {
    let digits = digits.max(1);
    if value == 0.0 || !value.is_finite() {
        return value.to_string();
    }

    // Round first so that the exponent reflects carries like 9.9999996 -> 10
    let scientific = format!("{:.*e}", digits - 1, value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= digits as i32 {
        format!("{}e{}", trim_fraction(mantissa), exponent)
    } else {
        let decimals = (digits as i32 - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_fraction(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

/// URDF `<inertial>` element for a link
pub fn format_urdf_inertial(props: &AggregatedProperties, name: &str) -> String {
    let inertial = to_urdf_inertial(props);
    let [x, y, z] = inertial.origin.xyz.0;
    let i = &inertial.inertia;
    let header = if name.is_empty() {
        "  <!-- link -->".to_string()
    } else {
        format!("  <!-- {} -->", name)
    };
    [
        header,
        "  <inertial>".to_string(),
        format!(
            "    <origin xyz=\"{} {} {}\" rpy=\"0 0 0\" />",
            format_significant(x, 6),
            format_significant(y, 6),
            format_significant(z, 6)
        ),
        format!("    <mass value=\"{:.4}\" />", inertial.mass.value),
        format!(
            "    <inertia ixx=\"{:.5e}\" ixy=\"{:.5e}\" ixz=\"{:.5e}\" iyy=\"{:.5e}\" iyz=\"{:.5e}\" izz=\"{:.5e}\" />",
            i.ixx, i.ixy, i.ixz, i.iyy, i.iyz, i.izz
        ),
        "  </inertial>".to_string(),
    ]
    .join("\n")
}

fn print_body(name: &str, props: &AggregatedProperties, urdf: bool) {
    for line in format_properties(props) {
        println!("{}", line);
    }
    if urdf {
        println!();
        println!("{}", format_urdf_inertial(props, name));
    }
}

pub fn print_link_report(report: &LinkReport, urdf: bool) {
    println!("{}", rule());

    for diagnostic in &report.diagnostics {
        // Empty links are reported in place below
        if !matches!(diagnostic, Diagnostic::NoValidSolids { .. }) {
            println!("  WARNING: {}", diagnostic);
        }
    }

    for link in &report.links {
        let Some(props) = &link.properties else {
            println!("\n{}: no valid solids", link.name);
            continue;
        };

        println!(
            "\n{} ({} solids from {} parts):",
            link.name,
            props.solid_count,
            link.parts.len()
        );
        for part in &link.parts {
            let materials = if part.has_matched_material() {
                let list: Vec<String> = part
                    .materials
                    .iter()
                    .map(|(name, density)| format!("{}: {}", name, density))
                    .collect();
                format!(" [{} kg/m³]", list.join(", "))
            } else {
                String::new()
            };
            println!("    {} ({} solids){}", part.key, part.solid_count, materials);
        }
        print_body(&link.name, props, urdf);
    }

    if !report.unmapped.is_empty() {
        println!("\n{}", rule());
        println!("Unmapped parts ({}):", report.unmapped.len());
        for part in &report.unmapped {
            println!("  {:<60} ({} solids)", part.key, part.solid_count);
        }
        let mass = report.unmapped_mass();
        println!("  Unmapped mass: {:.4} kg ({:.1} g)", mass, mass * 1000.0);
    }

    let total = report.total_mass();
    println!("\n{}", rule());
    println!("Total mapped mass:   {:.4} kg ({:.1} g)", total, total * 1000.0);

    println!(
        "\n{:<15} | {:>6} | {:>10} | {:>12} | {:>12} | {:>12}",
        "Link", "Solids", "Mass (g)", "CoM X (m)", "CoM Y (m)", "CoM Z (m)"
    );
    println!("{}", "-".repeat(85));
    for (name, props) in report.valid_links() {
        let com = props.center_of_mass;
        println!(
            "  {:<13} | {:>6} | {:>10.1} | {:>12.6} | {:>12.6} | {:>12.6}",
            name,
            props.solid_count,
            props.total_mass * 1000.0,
            com.x,
            com.y,
            com.z
        );
    }
}

pub fn print_part_report(results: &[PartResult], urdf: bool) {
    println!("{}", rule());
    for result in results {
        println!(
            "\n{} ({} solids):",
            result.key, result.properties.solid_count
        );
        print_body(&result.key, &result.properties, urdf);
    }
    let total: f64 = results.iter().map(|r| r.properties.total_mass).sum();
    println!("\n{}", rule());
    println!("Total mass: {:.4} kg ({:.1} g)", total, total * 1000.0);
}

pub fn print_calibration(results: &[Calibration]) {
    println!(
        "\n{:<40} | {:<20} | {:>6} | {:>14} | {:>10} | {:>8} | {:>14}",
        "Component", "Type", "Solids", "Vol (mm³)", "Vol (cm³)", "Mass (g)", "Eff. Density"
    );
    println!("{}", "-".repeat(125));
    for c in results {
        println!(
            "  {:<38} | {:<20} | {:>6} | {:>14.1} | {:>10.2} | {:>8} | {:>11.0} kg/m³",
            c.entry.label(),
            c.entry.component_type,
            c.solid_count,
            c.volume_mm3,
            c.volume_mm3 / 1000.0,
            c.entry.mass_g,
            c.effective_density.unwrap_or(0.0)
        );
    }

    println!("\n\n{}", "=".repeat(90));
    println!("Summary by component type (for material_map.json):");
    println!("{}", "=".repeat(90));
    println!(
        "\n{:<22} | {:>14} | {:>8} | {:>14}",
        "Type", "Avg Vol (cm³)", "Mass (g)", "Eff. Density"
    );
    println!("{}", "-".repeat(74));
    for summary in summarize_by_type(results) {
        println!(
            "  {:<20} | {:>14.2} | {:>8.0} | {:>11.0} kg/m³",
            summary.component_type,
            summary.average_volume_mm3 / 1000.0,
            summary.average_mass_g,
            summary.average_density
        );
    }
}
