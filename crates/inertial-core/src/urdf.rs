//! Conversion of aggregated properties into URDF inertials

use crate::mass::AggregatedProperties;

/// URDF `<inertial>` with the origin at the center of mass
pub fn to_urdf_inertial(props: &AggregatedProperties) -> urdf_rs::Inertial {
    let com = props.center_of_mass;
    let inertia = props.inertia_matrix();
    urdf_rs::Inertial {
        origin: urdf_rs::Pose {
            xyz: urdf_rs::Vec3([com.x, com.y, com.z]),
            rpy: urdf_rs::Vec3([0.0, 0.0, 0.0]),
        },
        mass: urdf_rs::Mass {
            value: props.total_mass,
        },
        inertia: urdf_rs::Inertia {
            ixx: inertia.ixx,
            ixy: inertia.ixy,
            ixz: inertia.ixz,
            iyy: inertia.iyy,
            iyz: inertia.iyz,
            izz: inertia.izz,
        },
    }
}
