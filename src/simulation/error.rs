//! Configuration errors of the cloth simulation.

use thiserror::Error;

use crate::floating_type_mod::FT;

/// Result type for simulation construction.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Rejected configurations. Stepping itself never fails; everything here is caught at construction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A grid needs at least two cells per side to have any springs.
    #[error("Grid size must be at least 2, got {0}")]
    GridTooSmall(usize),

    #[error("Grid spacing must be positive and finite, got {0}")]
    NonPositiveSpacing(FT),

    #[error("Collision sphere radius must be positive and finite, got {0}")]
    NonPositiveRadius(FT),

    /// A (0, 0) offset would connect a cell to itself with a zero rest length.
    #[error("Spring topology contains the degenerate offset (0, 0)")]
    DegenerateSpringOffset,

    #[error("Spring topology contains the offset ({0}, {1}) twice")]
    DuplicateSpringOffset(i32, i32),

    /// Either component is larger than `spring_topology::MAX_SPRING_OFFSET`.
    #[error("Spring offset ({0}, {1}) reaches too far from its cell")]
    SpringOffsetTooLarge(i32, i32),

    #[error("Invalid value for parameter `{name}`: {value}")]
    InvalidParameter { name: &'static str, value: FT },
}

impl ConfigError {
    pub fn invalid_parameter(name: &'static str, value: FT) -> Self {
        Self::InvalidParameter { name, value }
    }
}
