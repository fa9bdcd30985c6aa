use std::collections::HashMap;
use std::fmt::{Display, Write};
use std::ops::AddAssign;
use std::time::{Duration, Instant};

use num_traits::Float;
use rand::{rngs::StdRng, SeedableRng};
use tracing::{debug, info};

use crate::{
    collision_sphere::CollisionSphere,
    concurrency::par_map_reduce,
    error::Result,
    floating_type_mod::FT,
    grid_state::GridState,
    simulation_parameters::{SceneConfig, SimulationParams},
    spring_topology::SpringTopology,
    substep_integrator::SubstepIntegrator,
    V3,
};

/// Running aggregate of a labelled value. Only sum, extrema and count are kept, so
/// long runs with statistics enabled stay at constant memory.
#[derive(Clone)]
struct Counter<T> {
    sum: T,
    min: T,
    max: T,
    count: usize,
    last_start: Instant,
}
impl<T: Copy + PartialOrd + AddAssign> Counter<T> {
    fn new(zero: T) -> Self {
        Counter::<T> {
            sum: zero,
            min: zero,
            max: zero,
            count: 0,
            last_start: Instant::now(),
        }
    }
    fn add_value(&mut self, v: T) {
        if self.count == 0 || v < self.min {
            self.min = v;
        }
        if self.count == 0 || v > self.max {
            self.max = v;
        }
        self.sum += v;
        self.count += 1;
    }
    fn len(&self) -> usize {
        self.count
    }
    fn min(&self) -> T {
        self.min
    }
    fn max(&self) -> T {
        self.max
    }
    fn sum(&self) -> T {
        self.sum
    }
}
impl Counter<FT> {
    fn avg(&self) -> FT {
        self.sum / self.count.max(1) as FT
    }
}
impl Counter<Duration> {
    fn begin(&mut self) {
        self.last_start = Instant::now();
    }

    fn end(&mut self) {
        let elapsed = self.last_start.elapsed();
        self.add_value(elapsed);
    }

    fn avg(&self) -> Duration {
        self.sum / self.count.max(1) as u32
    }
}

pub(crate) struct ValueCounters {
    counters: HashMap<String, Counter<FT>>,
    enabled: bool,
}
impl ValueCounters {
    pub(crate) fn new(enabled: bool) -> ValueCounters {
        ValueCounters {
            counters: HashMap::default(),
            enabled,
        }
    }

    pub(crate) fn add_value(&mut self, id: &str, v: FT) {
        if self.enabled {
            self.counters
                .entry(id.to_string())
                .or_insert_with(|| Counter::<FT>::new(0.))
                .add_value(v);
        }
    }
}

/// Wall-clock timings keyed by label. Disabled counters cost one branch.
pub(crate) struct PerformanceCounters {
    counters: HashMap<String, Counter<Duration>>,
    enabled: bool,
}
impl PerformanceCounters {
    pub(crate) fn new(enabled: bool) -> PerformanceCounters {
        PerformanceCounters {
            counters: HashMap::default(),
            enabled,
        }
    }

    pub(crate) fn begin(&mut self, id: &str) {
        if self.enabled {
            self.counters
                .entry(id.to_string())
                .or_insert_with(|| Counter::<Duration>::new(Duration::ZERO))
                .begin();
        }
    }

    pub(crate) fn end(&mut self, id: &str) {
        if let Some(counter) = self.counters.get_mut(id) {
            counter.end();
        }
    }

    fn sorted(&self) -> Vec<(&String, &Counter<Duration>)> {
        let mut v = self.counters.iter().collect::<Vec<_>>();
        v.sort_by(|x, y| x.0.cmp(y.0));
        v
    }
}

/// Cheap per-frame overview of the sheet, for logging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSummary {
    pub min_height: FT,
    pub max_height: FT,
    pub max_speed: FT,
    pub centroid: V3,
}

/**
 * Cloth sheet dropped onto a sphere, advanced one rendered frame at a time.
 *
 * A frame is `substeps_per_frame(dt)` substeps. Once more than `max_t` simulated
 * seconds have passed the sheet is dropped again from a freshly jittered position.
 */
pub struct ClothSimulation {
    pub grid: GridState,
    pub topology: SpringTopology,
    pub sphere: CollisionSphere,
    pub time: FT,

    integrator: SubstepIntegrator,
    rng: StdRng,
    paused: bool,
    frame_number: usize,
    restart_count: usize,

    pcounters: PerformanceCounters,
    vcounters: ValueCounters,
}

impl ClothSimulation {
    pub fn new(scene_config: &SceneConfig, counters_enabled: bool) -> Result<ClothSimulation> {
        let rng = match scene_config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self::from_parts(
            rng,
            scene_config,
            SpringTopology::new(scene_config.topology),
            counters_enabled,
        )
    }

    /// Like [`ClothSimulation::new`] but with a caller-provided topology and random source.
    pub fn from_parts(
        mut rng: StdRng,
        scene_config: &SceneConfig,
        topology: SpringTopology,
        counters_enabled: bool,
    ) -> Result<ClothSimulation> {
        scene_config.sphere.validate()?;
        let grid = GridState::new(
            scene_config.n,
            scene_config.spacing(),
            scene_config.base_height,
            scene_config.jitter_amplitude,
            &mut rng,
        )?;

        info!(
            "INIT {}x{} CLOTH CELLS ({} springs per cell, jitter {:?})",
            grid.n(),
            grid.n(),
            topology.len(),
            grid.jitter()
        );

        Ok(ClothSimulation {
            grid,
            topology,
            sphere: scene_config.sphere,
            time: 0.,
            integrator: SubstepIntegrator::new(counters_enabled),
            rng,
            paused: false,
            frame_number: 0,
            restart_count: 0,
            pcounters: PerformanceCounters::new(counters_enabled),
            vcounters: ValueCounters::new(counters_enabled),
        })
    }

    /// Drops the sheet again: new jitter, zero velocities, time back to zero.
    pub fn restart(&mut self) {
        self.grid.restart(&mut self.rng);
        self.time = 0.;
        self.restart_count += 1;
        info!("restart #{} with jitter {:?}", self.restart_count, self.grid.jitter());
    }

    /// Runs one rendered frame and returns how many substeps were taken.
    pub fn frame(&mut self, simulation_params: &SimulationParams) -> usize {
        if self.time > simulation_params.max_t {
            self.restart();
        }

        if self.paused {
            return 0;
        }

        let substeps = simulation_params.substeps_per_frame();

        let a = Instant::now();
        self.pcounters.begin("frame");
        for _ in 0..substeps {
            self.integrator
                .step(&mut self.grid, &self.topology, &self.sphere, simulation_params);
            self.time += simulation_params.dt;
        }
        self.pcounters.end("frame");
        let b = Instant::now();

        if self.vcounters.enabled {
            let summary = self.summary();
            self.vcounters.add_value("min-height", summary.min_height);
            self.vcounters.add_value("max-speed", summary.max_speed);
        }

        debug!(
            "{:05}: {} substeps in {}msec (t = {:.4}s)",
            self.frame_number,
            substeps,
            (b - a).as_secs_f32() * 1000.,
            self.time
        );

        self.frame_number += 1;
        substeps
    }

    /// Cell positions in `i * n + j` order, as the renderer reads them after a frame.
    pub fn positions(&self) -> &[V3] {
        self.grid.positions()
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn frame_number(&self) -> usize {
        self.frame_number
    }

    pub fn restart_count(&self) -> usize {
        self.restart_count
    }

    pub fn summary(&self) -> FrameSummary {
        let velocity = self.grid.velocities();
        let (min_height, max_height, max_speed, sum) = par_map_reduce(
            self.grid.positions(),
            || -> (FT, FT, FT, V3) { (FT::INFINITY, FT::NEG_INFINITY, 0., V3::zeros()) },
            |a, b| (a.0.min(b.0), a.1.max(b.1), a.2.max(b.2), a.3 + b.3),
            |i, x| (x.y, x.y, velocity[i].norm(), *x),
        );

        FrameSummary {
            min_height,
            max_height,
            max_speed,
            centroid: sum / self.grid.num_cells() as FT,
        }
    }
}

pub fn is_ft_approx_eq<FT: Float>(a: FT, b: FT, tolerance: FT) -> bool {
    assert!(!a.is_nan());
    assert!(!b.is_nan());
    b <= a + tolerance && b >= a - tolerance
}

pub fn assert_ft_approx_eq2<FT: Float + Display>(
    a: FT,
    b: FT,
    tolerance: FT,
    s: impl FnOnce() -> (String, String, String),
) {
    if !is_ft_approx_eq(a, b, tolerance) {
        let (desc, astr, bstr) = s();
        panic!(
            "{} value not equal with a tolerance of {}:\n\t{}={}\n\t{}={}\n",
            desc, tolerance, astr, a, bstr, b
        );
    }
}

/// Human readable timing and value statistics. Empty sections if counters were disabled.
pub fn write_statistics(cloth_simulation: &ClothSimulation) -> String {
    let mut s = String::new();

    let _ = writeln!(
        s,
        "frames: {} restarts: {} simulated-time: {:.4}s",
        cloth_simulation.frame_number, cloth_simulation.restart_count, cloth_simulation.time
    );
    let _ = writeln!(s);

    for (label, pcounter) in cloth_simulation
        .pcounters
        .sorted()
        .into_iter()
        .chain(cloth_simulation.integrator.performance_counters().sorted())
    {
        let _ = writeln!(
            s,
            "{}: avg:{}ms total:{}ms ({} samples)",
            label,
            pcounter.avg().as_secs_f64() * 1000.,
            pcounter.sum().as_secs_f64() * 1000.,
            pcounter.len()
        );
    }
    let _ = writeln!(s);

    let mut v = cloth_simulation.vcounters.counters.iter().collect::<Vec<_>>();
    v.sort_by(|x, y| x.0.cmp(y.0));
    for (label, vcounter) in v {
        let _ = writeln!(
            s,
            "{}: min:{} max:{} avg:{}",
            label,
            vcounter.min(),
            vcounter.max(),
            vcounter.avg()
        );
    }

    s
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rand::{rngs::StdRng, SeedableRng};

    use super::{write_statistics, ClothSimulation, Counter};
    use crate::{
        error::ConfigError,
        floating_type_mod::FT,
        simulation_parameters::{SceneConfig, SimulationParams},
        spring_topology::{SpringTopology, SpringTopologyKind},
        vec3f,
    };

    fn small_scene(seed: u64) -> SceneConfig {
        SceneConfig {
            n: 8,
            seed: Some(seed),
            ..Default::default()
        }
    }

    fn soft_params() -> SimulationParams {
        SimulationParams {
            gravity: vec3f(0., -9.8, 0.),
            spring_y: 100.,
            dashpot_damping: 1.,
            drag_damping: 1.,
            dt: 1e-3,
            max_t: 0.05,
        }
    }

    #[test]
    fn frame_runs_all_substeps() {
        let mut sim = ClothSimulation::new(&small_scene(1), false).unwrap();
        let params = soft_params();
        assert_eq!(sim.frame(&params), 16);
        assert!((sim.time - 0.016).abs() < 1e-5);
        assert_eq!(sim.frame_number(), 1);
        assert!(sim.positions().iter().all(|x| x.y < 0.6));
    }

    #[test]
    fn restarts_after_max_t() {
        let mut sim = ClothSimulation::new(&small_scene(2), false).unwrap();
        let params = soft_params();
        let first_jitter = sim.grid.jitter();
        for _ in 0..4 {
            sim.frame(&params);
        }
        assert_eq!(sim.restart_count(), 0);
        assert!(sim.time > params.max_t);

        sim.frame(&params);
        assert_eq!(sim.restart_count(), 1);
        assert_ne!(sim.grid.jitter(), first_jitter);
        assert!((sim.time - 0.016).abs() < 1e-5);
        // one frame of free fall since the restart
        assert!(sim.summary().max_speed < 0.2);
        assert!(sim.summary().min_height > 0.59);
    }

    #[test]
    fn paused_simulation_does_not_move() {
        let mut sim = ClothSimulation::new(&small_scene(3), false).unwrap();
        let before = sim.positions().to_vec();
        sim.set_paused(true);
        assert!(sim.is_paused());
        assert_eq!(sim.frame(&soft_params()), 0);
        assert_eq!(sim.positions(), &before[..]);
        assert_eq!(sim.time, 0.);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let params = soft_params();
        let mut a = ClothSimulation::new(&small_scene(9), false).unwrap();
        let mut b = ClothSimulation::new(&small_scene(9), false).unwrap();
        for _ in 0..3 {
            a.frame(&params);
            b.frame(&params);
        }
        assert_eq!(a.positions(), b.positions());
    }

    #[test]
    fn sheet_drapes_over_sphere() {
        let scene = SceneConfig {
            n: 8,
            jitter_amplitude: 0.,
            base_height: 0.35,
            seed: Some(0),
            ..Default::default()
        };
        let mut sim = ClothSimulation::new(&scene, false).unwrap();
        let params = SimulationParams { max_t: 10., ..soft_params() };
        for _ in 0..20 {
            sim.frame(&params);
        }

        // cells above the sphere are held up, the free corner keeps falling
        let center = sim.grid.position(4, 4);
        let corner = sim.grid.position(0, 0);
        assert!(center.y > corner.y);
        assert!((center - sim.sphere.center).norm() > 0.25);
        assert!(sim.positions().iter().all(|x| x.iter().all(|c| c.is_finite())));
    }

    #[test]
    fn invalid_scene_is_rejected() {
        let scene = SceneConfig { n: 1, ..Default::default() };
        assert_eq!(
            ClothSimulation::new(&scene, false).err(),
            Some(ConfigError::GridTooSmall(1))
        );

        let mut scene = small_scene(0);
        scene.sphere.radius = 0.;
        assert_eq!(
            ClothSimulation::new(&scene, false).err(),
            Some(ConfigError::NonPositiveRadius(0.))
        );
    }

    #[test]
    fn custom_topology_is_used() {
        let topology = SpringTopology::from_offsets(vec![(1, 0), (0, 1), (-1, 0), (0, -1)]).unwrap();
        let sim = ClothSimulation::from_parts(StdRng::seed_from_u64(0), &small_scene(0), topology, false).unwrap();
        assert_eq!(sim.topology.len(), 4);
        assert_eq!(sim.topology.kind(), None);
        assert_eq!(
            SpringTopology::new(SpringTopologyKind::Bending).kind(),
            Some(SpringTopologyKind::Bending)
        );
    }

    #[test]
    fn summary_matches_flat_sheet() {
        let scene = SceneConfig {
            n: 4,
            jitter_amplitude: 0.,
            seed: Some(0),
            ..Default::default()
        };
        let sim = ClothSimulation::new(&scene, false).unwrap();
        let summary = sim.summary();
        assert_eq!(summary.min_height, 0.6);
        assert_eq!(summary.max_height, 0.6);
        assert_eq!(summary.max_speed, 0.);
        // cells sit at -0.5, -0.25, 0, 0.25 on both axes
        assert!((summary.centroid - vec3f(-0.125, 0.6, -0.125)).norm() < 1e-6);
    }

    #[test]
    fn statistics_list_counters_when_enabled() {
        let mut sim = ClothSimulation::new(&small_scene(4), true).unwrap();
        sim.frame(&soft_params());
        let s = write_statistics(&sim);
        let labels = [
            "frame:",
            "gravity-pass:",
            "spring-pass:",
            "integration-pass:",
            "max-speed:",
            "min-height:",
        ];
        for label in labels {
            assert!(s.contains(label), "missing `{}` in\n{}", label, s);
        }

        let mut quiet = ClothSimulation::new(&small_scene(4), false).unwrap();
        quiet.frame(&soft_params());
        assert!(!write_statistics(&quiet).contains("spring-pass"));
    }

    #[test]
    fn counters_fold_samples_into_aggregates() {
        let mut counter = Counter::<FT>::new(0.);
        for v in [3., 1., 5.] {
            counter.add_value(v);
        }
        assert_eq!(counter.len(), 3);
        assert_eq!(counter.min(), 1.);
        assert_eq!(counter.max(), 5.);
        assert_eq!(counter.avg(), 3.);

        let mut timings = Counter::<Duration>::new(Duration::ZERO);
        timings.add_value(Duration::from_millis(2));
        timings.add_value(Duration::from_millis(4));
        assert_eq!(timings.sum(), Duration::from_millis(6));
        assert_eq!(timings.avg(), Duration::from_millis(3));
        assert_eq!(timings.min(), Duration::from_millis(2));
    }

    #[test]
    fn statistics_count_every_substep() {
        let mut sim = ClothSimulation::new(&small_scene(4), true).unwrap();
        for _ in 0..3 {
            sim.frame(&soft_params());
        }
        // 16 substeps per frame at dt = 1e-3
        let s = write_statistics(&sim);
        assert!(s.contains("spring-pass: "), "{}", s);
        assert!(s.lines().any(|l| l.starts_with("spring-pass:") && l.ends_with("(48 samples)")), "{}", s);
        assert!(s.lines().any(|l| l.starts_with("frame:") && l.ends_with("(3 samples)")), "{}", s);
    }
}
