//! step-inertia entry point
//!
//! Reads a geometry dump of a CAD assembly and reports URDF link inertials.

mod report;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use inertial_core::{
    DEFAULT_DENSITY, DensityPolicy, GeometryProvider, MaterialMap, MaterialRules, MemoryGeometry,
    PartLookup, calibrate, group_by_links, load_calibration, load_link_map, summarize_parts,
    validate_density, walk_assembly,
};

/// Extract mass properties (volume, CoM, inertia) grouped by URDF links
#[derive(Parser, Debug)]
#[command(name = "step-inertia")]
#[command(about = "Analyze a CAD assembly and extract URDF mass properties", long_about = None)]
#[command(version)]
struct Cli {
    /// Geometry dump of the assembly (JSON, millimeter units)
    geometry: PathBuf,

    /// Material density in kg/m³
    #[arg(long, default_value_t = DEFAULT_DENSITY)]
    density: f64,

    /// Output URDF <inertial> snippets
    #[arg(long)]
    urdf: bool,

    /// Print the full assembly tree
    #[arg(long)]
    tree: bool,

    /// JSON file mapping URDF link names to lists of part instance names
    #[arg(long)]
    link_map: Option<PathBuf>,

    /// JSON file with material density patterns for per-part overrides
    #[arg(long)]
    material_map: Option<PathBuf>,

    /// List all depth-1 part keys (useful for building a link map)
    #[arg(long)]
    list_parts: bool,

    /// JSON file of components with datasheet masses to back-calculate
    /// effective densities
    #[arg(long)]
    calibrate: Option<PathBuf>,
}

fn main() -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inertial_cli=info,inertial_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    run(&Cli::parse())
}

fn run(cli: &Cli) -> Result<()> {
    // Configuration is validated before any geometry is touched
    let density = validate_density(cli.density)?;
    let rules = match &cli.material_map {
        Some(path) => MaterialMap::load(path)
            .with_context(|| format!("loading material map {}", path.display()))?
            .into_rules(),
        None => MaterialRules::default(),
    };
    let link_map = cli
        .link_map
        .as_ref()
        .map(|path| {
            load_link_map(path).with_context(|| format!("loading link map {}", path.display()))
        })
        .transpose()?;
    let calibration = cli
        .calibrate
        .as_ref()
        .map(|path| {
            load_calibration(path)
                .with_context(|| format!("loading calibration file {}", path.display()))
        })
        .transpose()?;

    println!("Reading geometry: {}", cli.geometry.display());
    let geometry = MemoryGeometry::load(&cli.geometry)
        .with_context(|| format!("reading geometry {}", cli.geometry.display()))?;

    let roots = geometry.free_shapes();
    println!("Found {} root shape(s)", roots.len());

    for label in &roots {
        let tree = walk_assembly(&geometry, label);
        tracing::debug!(
            "Root '{}' has {} solids in {} children",
            tree.key(),
            tree.solid_count(),
            tree.children().len()
        );

        if cli.tree {
            println!("\n=== Assembly Tree ===");
            report::print_tree(&tree);
        }

        let lookup = PartLookup::new(&tree);

        if cli.list_parts {
            report::print_part_list(&lookup);
            return Ok(());
        }

        if let Some(entries) = &calibration {
            let results = calibrate(&geometry, &tree, entries);
            report::print_calibration(&results);
            continue;
        }

        let policy = DensityPolicy::new(&rules, density);
        report::print_density_header(policy, cli.material_map.as_deref(), rules.len());

        match &link_map {
            Some(mapping) => {
                println!(
                    "Link mapping: {} ({} links)",
                    cli.link_map
                        .as_deref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default(),
                    mapping.len()
                );
                let link_report = group_by_links(&geometry, mapping, &lookup, policy);
                report::print_link_report(&link_report, cli.urdf);
            }
            None => {
                println!("Found {} depth-1 parts", lookup.len());
                let results = summarize_parts(&geometry, &lookup, policy);
                report::print_part_report(&results, cli.urdf);
            }
        }
    }

    Ok(())
}
