/*!
Mass-spring cloth dropped onto a sphere.

The simulation core lives in [`grid_state`], [`spring_topology`], [`collision_sphere`] and
[`substep_integrator`]; [`ClothSimulation`] batches substeps into rendered frames.
The headless driver behind the binary is [`start`].
*/

mod platform;
mod simulation;

pub use simulation::*;

pub use platform::{start, DriverError, DriverResult};
