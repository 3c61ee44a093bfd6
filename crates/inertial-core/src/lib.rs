//! URDF Inertial Core
//!
//! This crate derives rigid-body mass properties for robot links from a CAD
//! assembly:
//! - GeometryProvider: raw per-solid volume, centroid and inertia
//! - AssemblyNode: immutable assembly tree built from a provider
//! - MaterialRules: ordered, substring-matched density overrides
//! - Aggregation: per-solid mass properties combined with the parallel-axis
//!   theorem
//! - Link grouping: depth-1 parts merged into URDF links

pub mod aggregate;
pub mod calibrate;
pub mod config;
pub mod geometry;
pub mod links;
pub mod mass;
pub mod material;
pub mod tree;
pub mod units;
pub mod urdf;

pub use aggregate::*;
pub use calibrate::*;
pub use config::*;
pub use geometry::*;
pub use links::*;
pub use mass::*;
pub use material::*;
pub use tree::*;
pub use urdf::*;
