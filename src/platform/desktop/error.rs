//! Error types for the headless driver.

use thiserror::Error;

use crate::{error::ConfigError, floating_type_mod::FT};

pub type DriverResult<T> = Result<T, DriverError>;

#[derive(Error, Debug)]
pub enum DriverError {
    /// IO error while reading or writing config and statistics files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The override file names a key the simulation parameters do not have.
    #[error("Not able to find attribute `{0}` in the simulation parameters")]
    UnknownOverride(String),

    #[error("Invalid value `{value}` for argument {name}")]
    InvalidArgument { name: &'static str, value: String },

    #[error("Simulation diverged in frame {frame} (simulated time {time}s)")]
    Diverged { frame: usize, time: FT },
}
