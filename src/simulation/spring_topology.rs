use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigError, Result},
    floating_type_mod::FT,
    vec2i, V2I,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpringTopologyKind {
    /// Every offset with `|di| + |dj| <= 2`: structural, shear and second-ring springs (12 offsets).
    NonBending,

    /// The 3x3 neighborhood without the center (8 offsets).
    Bending,
}

impl Default for SpringTopologyKind {
    fn default() -> Self {
        SpringTopologyKind::NonBending
    }
}

/// Largest `|di|` or `|dj|` a custom topology may use.
pub const MAX_SPRING_OFFSET: i32 = 1 << 12;

/// Rest length of the spring between a cell and the cell `(di, dj)` away from it.
///
/// Only depends on the integer offset and the spacing, so repeated calls are bit-identical.
#[inline(always)]
pub fn rest_length(spacing: FT, di: i32, dj: i32) -> FT {
    let (di, dj) = (di as FT, dj as FT);
    spacing * (di * di + dj * dj).sqrt()
}

/// Relative neighbor offsets shared by every cell of the grid.
#[derive(Debug, Clone)]
pub struct SpringTopology {
    offsets: Vec<V2I>,
    kind: Option<SpringTopologyKind>,
}

impl SpringTopology {
    pub fn new(kind: SpringTopologyKind) -> SpringTopology {
        let mut offsets = Vec::new();
        match kind {
            SpringTopologyKind::Bending => {
                for di in -1..=1 {
                    for dj in -1..=1 {
                        if (di, dj) != (0, 0) {
                            offsets.push(vec2i(di, dj));
                        }
                    }
                }
            }
            SpringTopologyKind::NonBending => {
                for di in -2..=2i32 {
                    for dj in -2..=2i32 {
                        if (di, dj) != (0, 0) && di.abs() + dj.abs() <= 2 {
                            offsets.push(vec2i(di, dj));
                        }
                    }
                }
            }
        }

        SpringTopology {
            offsets,
            kind: Some(kind),
        }
    }

    /// Builds a custom topology. `(0, 0)` is rejected since its rest length would be zero,
    /// offsets reaching further than [`MAX_SPRING_OFFSET`] cells in either axis are rejected too.
    pub fn from_offsets(offsets: impl IntoIterator<Item = (i32, i32)>) -> Result<SpringTopology> {
        let mut checked: Vec<V2I> = Vec::new();
        for (di, dj) in offsets {
            if (di, dj) == (0, 0) {
                return Err(ConfigError::DegenerateSpringOffset);
            }
            if di.checked_abs().map_or(true, |d| d > MAX_SPRING_OFFSET)
                || dj.checked_abs().map_or(true, |d| d > MAX_SPRING_OFFSET)
            {
                return Err(ConfigError::SpringOffsetTooLarge(di, dj));
            }
            let offset = vec2i(di, dj);
            if checked.contains(&offset) {
                return Err(ConfigError::DuplicateSpringOffset(di, dj));
            }
            checked.push(offset);
        }

        Ok(SpringTopology {
            offsets: checked,
            kind: None,
        })
    }

    /// `None` for topologies built with [`SpringTopology::from_offsets`].
    pub fn kind(&self) -> Option<SpringTopologyKind> {
        self.kind
    }

    pub fn offsets(&self) -> &[V2I] {
        &self.offsets
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Neighbors of cell `(i, j)` on an `n x n` grid together with the offset that reaches them.
    /// Offsets leaving the grid are skipped; nothing wraps around.
    #[inline(always)]
    pub fn neighbors(&self, n: usize, i: usize, j: usize) -> impl Iterator<Item = (usize, usize, V2I)> + '_ {
        self.offsets.iter().filter_map(move |offset| {
            let ni = i.checked_add_signed(offset.x as isize)?;
            let nj = j.checked_add_signed(offset.y as isize)?;
            if ni < n && nj < n {
                Some((ni, nj, *offset))
            } else {
                None
            }
        })
    }
}
