use std::{collections::HashMap, path::Path, time::Duration};

use clap::{App, AppSettings, Arg, SubCommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    floating_type_mod::FT,
    simulation_parameters::{SceneConfig, SimulationParams, FRAME_TIME},
    write_statistics, ClothSimulation,
};

use super::error::{DriverError, DriverResult};

const CARGO_PKG_AUTHORS: &'static str = env!("CARGO_PKG_AUTHORS");
const CARGO_PKG_VERSION: &'static str = env!("CARGO_PKG_VERSION");
const CARGO_PKG_DESCRIPTION: &'static str = env!("CARGO_PKG_DESCRIPTION");

// one summary line per second of rendered frames
const SUMMARY_EVERY_FRAMES: usize = 60;

pub fn start() -> DriverResult<()> {
    let matches = App::new("Cloth Simulation")
        .version(CARGO_PKG_VERSION)
        .author(CARGO_PKG_AUTHORS)
        .about(CARGO_PKG_DESCRIPTION)
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("v")
                .short("v")
                .multiple(true)
                .help("Sets the level of verbosity"),
        )
        .subcommand(
            SubCommand::with_name("run")
                .about("Run simulation with given config")
                .arg(
                    Arg::with_name("SIMULATION_CONFIG")
                        .help("Sets the simulation paramaters")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::with_name("SCENE_CONFIG")
                        .help("Grid and sphere setup")
                        .required(true)
                        .index(2),
                )
                .arg(
                    Arg::with_name("MAX_SECONDS")
                        .long("max-seconds")
                        .short("s")
                        .required(false)
                        .takes_value(true)
                        .default_value("3")
                        .help("Stop simulation after the given amount of simulated seconds (restarts included)"),
                )
                .arg(
                    Arg::with_name("OVERWRITE_CONFIG_FILE")
                        .long("overwrite-config-file")
                        .short("c")
                        .required(false)
                        .takes_value(true)
                        .help("Overwrite config"),
                )
                .arg(
                    Arg::with_name("STATISTICS_ENABLED")
                        .help("Track performance of individual passes")
                        .short("p")
                        .long("statistics-enabled")
                        .takes_value(false),
                )
                .arg(
                    Arg::with_name("STATISTICS_PATH")
                        .long("statistics-path")
                        .short("w")
                        .required(false)
                        .takes_value(true)
                        .help("Where to write statistics to"),
                ),
        )
        .subcommand(
            SubCommand::with_name("write-default-config")
                .about("Write the default simulation parameters and scene as YAML files.")
                .arg(
                    Arg::with_name("SIMULATION_YAML")
                        .help("YAML file where the simulation parameters are written to")
                        .default_value("./simulation.yaml")
                        .index(1),
                )
                .arg(
                    Arg::with_name("SCENE_YAML")
                        .help("YAML file where the scene is written to")
                        .default_value("./scene.yaml")
                        .index(2),
                ),
        )
        .get_matches();

    init_logging(matches.occurrences_of("v"));

    if let Some(run_matches) = matches.subcommand_matches("run") {
        let parameter_file = run_matches.value_of("SIMULATION_CONFIG").unwrap_or_default();
        let params_yaml = std::fs::read_to_string(parameter_file)?;
        let overwrite_config_str = match run_matches.value_of("OVERWRITE_CONFIG_FILE") {
            Some(path) => Some(std::fs::read_to_string(path)?),
            None => None,
        };
        let simulation_params = parse_simulation_params(&params_yaml, overwrite_config_str.as_deref())?;
        info!("{:?}", simulation_params);

        let scene_file_path = run_matches.value_of("SCENE_CONFIG").unwrap_or_default();
        let scene_config = parse_scene_config(&std::fs::read_to_string(scene_file_path)?)?;
        info!("{:?}", scene_config);

        let max_seconds_str = run_matches.value_of("MAX_SECONDS").unwrap_or("3");
        let max_seconds: FT = max_seconds_str
            .parse()
            .ok()
            .filter(|x: &FT| x.is_finite() && *x >= 0.)
            .ok_or_else(|| DriverError::InvalidArgument {
                name: "--max-seconds",
                value: max_seconds_str.to_string(),
            })?;

        let counters_enabled = run_matches.is_present("STATISTICS_ENABLED");
        let cloth_simulation = cloth_main(&simulation_params, &scene_config, max_seconds, counters_enabled)?;

        if counters_enabled {
            let s = write_statistics(&cloth_simulation);
            print!("{}", s);
            if let Some(statistics_path) = run_matches.value_of("STATISTICS_PATH") {
                std::fs::write(statistics_path, s)?;
            }
        }
    } else if let Some(subcmd_matches) = matches.subcommand_matches("write-default-config") {
        let simulation_yaml = subcmd_matches.value_of("SIMULATION_YAML").unwrap_or("./simulation.yaml");
        let scene_yaml = subcmd_matches.value_of("SCENE_YAML").unwrap_or("./scene.yaml");
        info!("Writing to files `{}` and `{}`...", simulation_yaml, scene_yaml);
        write_default_configs(Path::new(simulation_yaml), Path::new(scene_yaml))?;
        info!("done");
    }

    Ok(())
}

fn init_logging(verbosity: u64) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // a subscriber may already be installed when embedded
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Parses simulation parameters and replaces single top-level keys with the values of `overrides`.
pub(crate) fn parse_simulation_params(params_yaml: &str, overrides: Option<&str>) -> DriverResult<SimulationParams> {
    let mut simulation_params_serde: serde_yaml::Value = serde_yaml::from_str(params_yaml)?;

    if let Some(overwrite_config_str) = overrides {
        let overwrite_config_file: HashMap<String, serde_yaml::Value> = serde_yaml::from_str(overwrite_config_str)?;
        let mapping = simulation_params_serde
            .as_mapping_mut()
            .ok_or_else(|| DriverError::UnknownOverride(String::from("<root>")))?;
        for (k, v) in overwrite_config_file.into_iter() {
            match mapping.get_mut(&serde_yaml::Value::String(k.clone())) {
                Some(slot) => *slot = v,
                None => return Err(DriverError::UnknownOverride(k)),
            }
        }
    }

    let simulation_params: SimulationParams = serde_yaml::from_value(simulation_params_serde)?;
    simulation_params.validate()?;
    Ok(simulation_params)
}

pub(crate) fn parse_scene_config(scene_yaml: &str) -> DriverResult<SceneConfig> {
    let scene_config: SceneConfig = serde_yaml::from_str(scene_yaml)?;
    scene_config.sphere.validate()?;
    Ok(scene_config)
}

pub(crate) fn write_default_configs(simulation_yaml: &Path, scene_yaml: &Path) -> DriverResult<()> {
    std::fs::write(simulation_yaml, serde_yaml::to_string(&SimulationParams::default())?)?;
    std::fs::write(scene_yaml, serde_yaml::to_string(&SceneConfig::default())?)?;
    Ok(())
}

/// Runs frames until `max_seconds` of simulated time (restarts included) have passed.
pub(crate) fn cloth_main(
    simulation_params: &SimulationParams,
    scene_config: &SceneConfig,
    max_seconds: FT,
    counters_enabled: bool,
) -> DriverResult<ClothSimulation> {
    if simulation_params.dt > FRAME_TIME {
        warn!(
            "dt={} is longer than one frame ({}s), running a single substep per frame",
            simulation_params.dt, FRAME_TIME
        );
    }

    let mut cloth_simulation = ClothSimulation::new(scene_config, counters_enabled)?;
    info!("Substeps: {}", simulation_params.substeps_per_frame());

    let mut total_duration: Duration = Duration::from_nanos(0);
    let mut total_time: FT = 0.;

    while total_time < max_seconds {
        let a = std::time::Instant::now();
        let substeps = cloth_simulation.frame(simulation_params);
        total_duration += a.elapsed();
        total_time += substeps as FT * simulation_params.dt;

        let frame_number = cloth_simulation.frame_number();
        let summary = cloth_simulation.summary();
        if !summary.max_speed.is_finite() || !summary.min_height.is_finite() {
            return Err(DriverError::Diverged {
                frame: frame_number,
                time: cloth_simulation.time,
            });
        }

        if frame_number % SUMMARY_EVERY_FRAMES == 0 {
            info!(
                "{:05}: height {:.4}..{:.4} max speed {:.4} centroid {:?} ({}msec AVG per frame)",
                frame_number,
                summary.min_height,
                summary.max_height,
                summary.max_speed,
                summary.centroid.as_slice(),
                (total_duration / frame_number as u32).as_secs_f32() * 1000.
            );
        }
    }

    Ok(cloth_simulation)
}
