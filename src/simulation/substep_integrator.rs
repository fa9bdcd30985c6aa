use std::mem;

use crate::{
    collision_sphere::CollisionSphere,
    concurrency::{par_iter_mut1, par_iter_mut2},
    floating_type_mod::FT,
    grid_state::{CellVec, GridState},
    normalize_or_zero,
    simulation::PerformanceCounters,
    simulation_parameters::SimulationParams,
    spring_topology::{rest_length, SpringTopology},
    V3,
};

#[inline]
fn debug_assert_finite(v: &V3, name: &str) {
    debug_assert!(
        v.iter().all(|c| c.is_finite()),
        "Assertion '{}.is_finite()' failed: {:?} (time step too large for the spring stiffness?)",
        name,
        v
    );
}

/**
 * Advances a [`GridState`] by one `dt`.
 *
 * A substep consists of three passes over all cells. Each pass finishes for
 * every cell before the next one starts:
 *
 *  1. gravity
 *  2. spring and dashpot forces from the neighbors, reading the velocities left
 *     by pass 1 for every cell
 *  3. drag, then sphere contact, then the position update
 *
 * Within pass 3 drag is applied to every cell before contact is resolved, so a
 * cell touching the sphere keeps no inward velocity after the pass.
 */
pub struct SubstepIntegrator {
    pcounters: PerformanceCounters,
}

impl SubstepIntegrator {
    pub fn new(counters_enabled: bool) -> SubstepIntegrator {
        SubstepIntegrator {
            pcounters: PerformanceCounters::new(counters_enabled),
        }
    }

    pub fn step(
        &mut self,
        grid: &mut GridState,
        topology: &SpringTopology,
        sphere: &CollisionSphere,
        simulation_params: &SimulationParams,
    ) {
        let dt = simulation_params.dt;

        self.pcounters.begin("gravity-pass");
        Self::apply_gravity(&mut grid.cells.velocity, simulation_params.gravity, dt);
        self.pcounters.end("gravity-pass");

        self.pcounters.begin("spring-pass");
        let n = grid.n();
        let spacing = grid.spacing();
        Self::update_velocity_with_spring_forces(&mut grid.cells, n, spacing, topology, simulation_params, dt);
        self.pcounters.end("spring-pass");

        self.pcounters.begin("integration-pass");
        Self::damp_collide_and_advect(
            &mut grid.cells.position,
            &mut grid.cells.velocity,
            sphere,
            simulation_params.drag_damping,
            dt,
        );
        self.pcounters.end("integration-pass");
    }

    pub(crate) fn performance_counters(&self) -> &PerformanceCounters {
        &self.pcounters
    }

    fn apply_gravity(velocity: &mut [V3], gravity: V3, dt: FT) {
        par_iter_mut1(velocity, |_, p_velocity| {
            *p_velocity += gravity * dt;
        });
    }

    /// Sum of spring and dashpot forces acting on cell `idx`.
    ///
    /// Springs whose end points coincide have no direction and contribute nothing.
    #[inline(always)]
    pub fn calculate_cell_spring_force(
        idx: usize,
        n: usize,
        spacing: FT,
        position: &[V3],
        velocity: &[V3],
        topology: &SpringTopology,
        simulation_params: &SimulationParams,
    ) -> V3 {
        let (i, j) = (idx / n, idx % n);
        let mut force = V3::zeros();

        for (ni, nj, offset) in topology.neighbors(n, i, j) {
            let k = ni * n + nj;
            let x_ij = position[idx] - position[k];
            let v_ij = velocity[idx] - velocity[k];
            let d = normalize_or_zero(x_ij);
            let current_dist = x_ij.norm();
            let original_dist = rest_length(spacing, offset.x, offset.y);

            // spring
            force += -simulation_params.spring_y * d * (current_dist / original_dist - 1.);

            // dashpot damping along the spring axis
            force += -v_ij.dot(&d) * d * simulation_params.dashpot_damping * spacing;
        }

        force
    }

    fn update_velocity_with_spring_forces(
        cells: &mut CellVec,
        n: usize,
        spacing: FT,
        topology: &SpringTopology,
        simulation_params: &SimulationParams,
        dt: FT,
    ) {
        {
            let position = &cells.position;
            let velocity = &cells.velocity;
            par_iter_mut1(&mut cells.velocity_temp, |idx, p_velocity_temp| {
                *p_velocity_temp = velocity[idx]
                    + dt * Self::calculate_cell_spring_force(
                        idx,
                        n,
                        spacing,
                        position,
                        velocity,
                        topology,
                        simulation_params,
                    );
            });
        }

        mem::swap(&mut cells.velocity, &mut cells.velocity_temp);
    }

    fn damp_collide_and_advect(
        position: &mut [V3],
        velocity: &mut [V3],
        sphere: &CollisionSphere,
        drag_damping: FT,
        dt: FT,
    ) {
        let drag_factor = FT::exp(-drag_damping * dt);

        par_iter_mut2(position, velocity, |_, p_position, p_velocity| {
            *p_velocity *= drag_factor;
            sphere.resolve_contact(*p_position, p_velocity);
            *p_position += dt * *p_velocity;

            debug_assert_finite(p_velocity, "velocity");
            debug_assert_finite(p_position, "position");
        });
    }
}
