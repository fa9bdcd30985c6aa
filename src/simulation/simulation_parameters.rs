use serde::{Deserialize, Serialize};

use crate::{
    collision_sphere::CollisionSphere,
    error::{ConfigError, Result},
    floating_type_mod::FT,
    spring_topology::SpringTopologyKind,
    vec3f, V3,
};

pub const INIT_GRID_SIZE: usize = 128;
pub const INIT_BASE_HEIGHT: FT = 0.6;
pub const INIT_JITTER_AMPLITUDE: FT = 0.1;

pub const INIT_SPRING_Y: FT = 3e4;
pub const INIT_DASHPOT_DAMPING: FT = 1e4;
pub const INIT_DRAG_DAMPING: FT = 1.;
pub const INIT_MAX_T: FT = 1.5;

/// Wall-clock duration of one rendered frame.
pub const FRAME_TIME: FT = 1. / 60.;

/// Time step shrinks with resolution: `4e-2 / n`.
pub fn dt_for_resolution(n: usize) -> FT {
    4e-2 / n as FT
}

/// Number of substeps per rendered frame that keeps the cloth near real time.
///
/// Never less than one, otherwise a large `dt` would freeze the simulation.
pub fn substeps_per_frame(dt: FT) -> usize {
    let substeps = (FRAME_TIME / dt).floor();
    if substeps.is_finite() && substeps >= 1. {
        substeps as usize
    } else {
        1
    }
}

/// Physical parameters. They may be edited between any two substeps, so the
/// integrator reads them fresh on every call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    pub gravity: V3,
    pub spring_y: FT,
    pub dashpot_damping: FT,
    pub drag_damping: FT,
    pub dt: FT,

    // simulated seconds until the cloth is dropped again
    pub max_t: FT,
}

impl Default for SimulationParams {
    fn default() -> Self {
        SimulationParams {
            gravity: vec3f(0., -9.8, 0.),
            spring_y: INIT_SPRING_Y,
            dashpot_damping: INIT_DASHPOT_DAMPING,
            drag_damping: INIT_DRAG_DAMPING,
            dt: dt_for_resolution(INIT_GRID_SIZE),
            max_t: INIT_MAX_T,
        }
    }
}

impl SimulationParams {
    /// Default parameters with `dt` matched to an `n x n` grid.
    pub fn for_resolution(n: usize) -> SimulationParams {
        SimulationParams {
            dt: dt_for_resolution(n),
            ..Default::default()
        }
    }

    /// Restores the cloth material and the restart timeout. Gravity and `dt` are kept.
    pub fn reset_tunables(&mut self) {
        self.spring_y = INIT_SPRING_Y;
        self.dashpot_damping = INIT_DASHPOT_DAMPING;
        self.drag_damping = INIT_DRAG_DAMPING;
        self.max_t = INIT_MAX_T;
    }

    pub fn substeps_per_frame(&self) -> usize {
        substeps_per_frame(self.dt)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("gravity.x", self.gravity.x),
            ("gravity.y", self.gravity.y),
            ("gravity.z", self.gravity.z),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::invalid_parameter(name, value));
            }
        }
        for (name, value) in [
            ("spring_y", self.spring_y),
            ("dashpot_damping", self.dashpot_damping),
            ("drag_damping", self.drag_damping),
        ] {
            if !value.is_finite() || value < 0. {
                return Err(ConfigError::invalid_parameter(name, value));
            }
        }
        if !self.dt.is_finite() || self.dt <= 0. {
            return Err(ConfigError::invalid_parameter("dt", self.dt));
        }
        if !(self.max_t > 0.) {
            return Err(ConfigError::invalid_parameter("max_t", self.max_t));
        }
        Ok(())
    }
}

fn init_grid_size() -> usize {
    INIT_GRID_SIZE
}

fn init_base_height() -> FT {
    INIT_BASE_HEIGHT
}

fn init_jitter_amplitude() -> FT {
    INIT_JITTER_AMPLITUDE
}

/// Everything that is fixed for the lifetime of one grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    #[serde(default = "init_grid_size")]
    pub n: usize,
    #[serde(default = "init_base_height")]
    pub base_height: FT,
    #[serde(default = "init_jitter_amplitude")]
    pub jitter_amplitude: FT,
    #[serde(default)]
    pub topology: SpringTopologyKind,
    #[serde(default)]
    pub sphere: CollisionSphere,

    // unseeded runs draw their jitter from entropy
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        SceneConfig {
            n: INIT_GRID_SIZE,
            base_height: INIT_BASE_HEIGHT,
            jitter_amplitude: INIT_JITTER_AMPLITUDE,
            topology: SpringTopologyKind::default(),
            sphere: CollisionSphere::default(),
            seed: None,
        }
    }
}

impl SceneConfig {
    pub fn spacing(&self) -> FT {
        1. / self.n as FT
    }
}

#[cfg(test)]
mod tests {
    use super::{dt_for_resolution, substeps_per_frame, SceneConfig, SimulationParams};
    use crate::{error::ConfigError, spring_topology::SpringTopologyKind};

    #[test]
    fn default_resolution_gives_53_substeps() {
        let params = SimulationParams::default();
        assert_eq!(params.dt, dt_for_resolution(128));
        assert_eq!(params.substeps_per_frame(), 53);
    }

    #[test]
    fn large_dt_still_steps_once() {
        assert_eq!(substeps_per_frame(0.1), 1);
        assert_eq!(substeps_per_frame(1. / 60.), 1);
        assert_eq!(substeps_per_frame(0.001), 16);
    }

    #[test]
    fn reset_keeps_gravity() {
        let mut params = SimulationParams::default();
        params.gravity.x = 3.;
        params.spring_y = 10.;
        params.drag_damping = 50.;
        params.max_t = 4.;
        params.reset_tunables();
        assert_eq!(params.gravity.x, 3.);
        assert_eq!(params.spring_y, SimulationParams::default().spring_y);
        assert_eq!(params.drag_damping, SimulationParams::default().drag_damping);
        assert_eq!(params.max_t, SimulationParams::default().max_t);
    }

    #[test]
    fn validation_rejects_bad_values() {
        assert!(SimulationParams::default().validate().is_ok());

        let mut params = SimulationParams::default();
        params.dt = 0.;
        assert_eq!(params.validate(), Err(ConfigError::invalid_parameter("dt", 0.)));

        let mut params = SimulationParams::default();
        params.spring_y = -1.;
        assert_eq!(params.validate(), Err(ConfigError::invalid_parameter("spring_y", -1.)));

        let mut params = SimulationParams::default();
        params.gravity.y = crate::floating_type_mod::FT::INFINITY;
        assert!(params.validate().is_err());
    }

    #[test]
    fn scene_yaml_fills_defaults() {
        let scene: SceneConfig = serde_yaml::from_str("n: 32\ntopology: Bending\nseed: 5\n").unwrap();
        assert_eq!(scene.n, 32);
        assert_eq!(scene.spacing(), 1. / 32.);
        assert_eq!(scene.topology, SpringTopologyKind::Bending);
        assert_eq!(scene.seed, Some(5));
        assert_eq!(scene.base_height, 0.6);
        assert_eq!(scene.sphere.radius, 0.3);
    }

    #[test]
    fn params_yaml_roundtrip() {
        let params = SimulationParams::for_resolution(64);
        let yaml = serde_yaml::to_string(&params).unwrap();
        let parsed: SimulationParams = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, params);
    }
}
