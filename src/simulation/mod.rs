pub mod collision_sphere;
pub mod concurrency;
pub mod error;
pub mod grid_state;
pub mod simulation;
pub mod simulation_parameters;
pub mod spring_topology;
pub mod substep_integrator;

pub type IT = i32;

#[cfg(feature = "double-precision")]
pub mod floating_type_mod {
    pub type FT = f64;
}

#[cfg(not(feature = "double-precision"))]
pub mod floating_type_mod {
    pub type FT = f32;
}

use floating_type_mod::FT;

use nalgebra::SVector;

#[allow(dead_code)]
pub type V<FT, const D: usize> = SVector<FT, D>;

pub type V3 = V<FT, 3>;
pub type V2I = V<IT, 2>;

pub fn vec2i(x: IT, y: IT) -> V2I {
    [x, y].into()
}

pub fn vec3f(x: FT, y: FT, z: FT) -> V<FT, 3> {
    [x, y, z].into()
}

/// Unit vector along `v`, or the zero vector if `v` has zero length.
///
/// Coincident cells and a cell sitting exactly on the sphere center both end up here;
/// the zero vector makes their spring, dashpot and contact terms vanish instead of producing NaN.
#[inline(always)]
pub fn normalize_or_zero(v: V3) -> V3 {
    v.try_normalize(0.).unwrap_or_else(V3::zeros)
}

pub use simulation::*;
