use nalgebra::zero;
use rand::Rng;

use crate::{
    error::{ConfigError, Result},
    floating_type_mod::FT,
    spring_topology, vec3f, V3,
};

macro_rules! decl_cell_vec {
    (pub struct $struct_name:ident { $(pub $field_name:ident: Vec<$field_type:ty> | $default_value:expr),*$(,)?  }) => {
        pub struct $struct_name {
            $(
                pub $field_name : Vec<$field_type>,
            )*
        }

        impl $struct_name {
            pub fn default(len: usize) -> Self {
                Self {
                    $(
                        $field_name: (0..len).map(|_| $default_value).collect::<Vec<$field_type>>(),
                    )*
                }
            }

            pub fn reset(&mut self) {
                $(
                    self.$field_name.iter_mut().for_each(|x| *x = $default_value);
                )*
            }
        }
    }
}

decl_cell_vec! {
    pub struct CellVec {
        pub position: Vec<V3> | zero(),
        pub velocity: Vec<V3> | zero(),

        // written by the spring pass while `velocity` is read, then swapped in
        pub velocity_temp: Vec<V3> | zero(),
    }
}

/**
 * The n x n sheet of point masses. Cell (i, j) lives at index i * n + j.
 *
 * Size, spacing and initial height never change after construction; only
 * positions and velocities do.
 */
pub struct GridState {
    pub cells: CellVec,
    n: usize,
    spacing: FT,
    base_height: FT,
    jitter_amplitude: FT,
    jitter: [FT; 2],
}

impl GridState {
    /// Creates the grid and lays it out with [`GridState::initialize`].
    pub fn new<R: Rng>(
        n: usize,
        spacing: FT,
        base_height: FT,
        jitter_amplitude: FT,
        rng: &mut R,
    ) -> Result<GridState> {
        if n <= 1 {
            return Err(ConfigError::GridTooSmall(n));
        }
        if !(spacing > 0.) || !spacing.is_finite() {
            return Err(ConfigError::NonPositiveSpacing(spacing));
        }
        if !base_height.is_finite() {
            return Err(ConfigError::invalid_parameter("base_height", base_height));
        }
        if !(jitter_amplitude >= 0.) || !jitter_amplitude.is_finite() {
            return Err(ConfigError::invalid_parameter("jitter_amplitude", jitter_amplitude));
        }

        let mut grid = GridState {
            cells: CellVec::default(n * n),
            n,
            spacing,
            base_height,
            jitter_amplitude,
            jitter: [0., 0.],
        };
        grid.initialize(rng);
        Ok(grid)
    }

    /// Flat sheet at `base_height`, shifted as a whole by one random offset, at rest.
    ///
    /// The offset is drawn once per call and shared by every cell so the sheet stays rectangular.
    pub fn initialize<R: Rng>(&mut self, rng: &mut R) {
        let jitter_x = (rng.gen::<FT>() - 0.5) * self.jitter_amplitude;
        let jitter_y = (rng.gen::<FT>() - 0.5) * self.jitter_amplitude;
        self.jitter = [jitter_x, jitter_y];

        let n = self.n;
        let spacing = self.spacing;
        let base_height = self.base_height;

        self.cells.reset();
        for (idx, x) in self.cells.position.iter_mut().enumerate() {
            let (i, j) = (idx / n, idx % n);
            *x = vec3f(
                i as FT * spacing - 0.5 + jitter_x,
                base_height,
                j as FT * spacing - 0.5 + jitter_y,
            );
        }
    }

    /// Same as [`GridState::initialize`]: new jitter, zero velocities.
    pub fn restart<R: Rng>(&mut self, rng: &mut R) {
        self.initialize(rng);
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn spacing(&self) -> FT {
        self.spacing
    }

    pub fn base_height(&self) -> FT {
        self.base_height
    }

    pub fn jitter_amplitude(&self) -> FT {
        self.jitter_amplitude
    }

    /// Offset drawn by the last initialization.
    pub fn jitter(&self) -> [FT; 2] {
        self.jitter
    }

    pub fn num_cells(&self) -> usize {
        self.n * self.n
    }

    #[inline(always)]
    pub fn cell_index(&self, i: usize, j: usize) -> usize {
        debug_assert!(i < self.n && j < self.n);
        i * self.n + j
    }

    pub fn positions(&self) -> &[V3] {
        &self.cells.position
    }

    pub fn velocities(&self) -> &[V3] {
        &self.cells.velocity
    }

    pub fn positions_mut(&mut self) -> &mut [V3] {
        &mut self.cells.position
    }

    pub fn velocities_mut(&mut self) -> &mut [V3] {
        &mut self.cells.velocity
    }

    pub fn position(&self, i: usize, j: usize) -> V3 {
        self.cells.position[self.cell_index(i, j)]
    }

    pub fn velocity(&self, i: usize, j: usize) -> V3 {
        self.cells.velocity[self.cell_index(i, j)]
    }

    /// Undeformed length of the spring from `(i, j)` to `(i + di, j + dj)`.
    ///
    /// The cell itself does not matter, the grid is uniform.
    pub fn rest_length(&self, _i: usize, _j: usize, di: i32, dj: i32) -> FT {
        spring_topology::rest_length(self.spacing, di, dj)
    }
}
