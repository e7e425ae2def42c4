use crate::error::{SolverError, SolverResult};
use ndarray::{Array2, ShapeBuilder};

/// Structured 2D grid: node coordinates and bed elevation indexed by `(i, j)`.
///
/// All arrays have shape `(size_i, size_j)`. Node `(i, j)` is flattened to
/// `i + j * size_i` whenever the grid or a field on it crosses an I/O
/// boundary.
#[derive(Debug, Clone)]
pub struct StructuredGrid {
    coordinate_x: Array2<f64>,
    coordinate_y: Array2<f64>,
    elevation: Array2<f64>,
}

impl StructuredGrid {
    pub fn new(
        coordinate_x: Array2<f64>,
        coordinate_y: Array2<f64>,
        elevation: Array2<f64>,
    ) -> SolverResult<Self> {
        let shape = coordinate_x.dim();
        if coordinate_y.dim() != shape || elevation.dim() != shape {
            return Err(SolverError::invalid_grid(format!(
                "array shapes differ: x {:?}, y {:?}, elevation {:?}",
                shape,
                coordinate_y.dim(),
                elevation.dim()
            )));
        }
        let (size_i, size_j) = shape;
        if size_i < 2 || size_j < 2 {
            return Err(SolverError::invalid_grid(format!(
                "grid must have at least 2 nodes along each axis, got {} x {}",
                size_i, size_j
            )));
        }
        for (name, values) in [
            ("coordinate_x", &coordinate_x),
            ("coordinate_y", &coordinate_y),
            ("elevation", &elevation),
        ] {
            if let Some(((i, j), v)) = values.indexed_iter().find(|(_, v)| !v.is_finite()) {
                return Err(SolverError::invalid_grid(format!(
                    "{} is not finite at node ({}, {}): {}",
                    name, i, j, v
                )));
            }
        }

        Ok(StructuredGrid {
            coordinate_x,
            coordinate_y,
            elevation,
        })
    }

    /// Builds a grid from flattened node arrays in `i + j * size_i` order.
    pub fn from_flat(
        size_i: usize,
        size_j: usize,
        x: Vec<f64>,
        y: Vec<f64>,
        elevation: Vec<f64>,
    ) -> SolverResult<Self> {
        let to_array = |name: &str, values: Vec<f64>| {
            // Fortran order puts i on the fast axis
            Array2::from_shape_vec((size_i, size_j).f(), values).map_err(
                |e| SolverError::invalid_grid(format!("{} has the wrong node count: {}", name, e)),
            )
        };
        Self::new(
            to_array("coordinate_x", x)?,
            to_array("coordinate_y", y)?,
            to_array("elevation", elevation)?,
        )
    }

    pub fn size_i(&self) -> usize {
        self.coordinate_x.nrows()
    }

    pub fn size_j(&self) -> usize {
        self.coordinate_x.ncols()
    }

    pub fn node_count(&self) -> usize {
        self.coordinate_x.len()
    }

    pub fn coordinate_x(&self) -> &Array2<f64> {
        &self.coordinate_x
    }

    pub fn coordinate_y(&self) -> &Array2<f64> {
        &self.coordinate_y
    }

    pub fn elevation(&self) -> &Array2<f64> {
        &self.elevation
    }

    /// Normalized computational spacing along i, `1 / (size_i - 1)`.
    pub fn grid_interval_xi(&self) -> f64 {
        1.0 / (self.size_i() - 1) as f64
    }

    /// Normalized computational spacing along j, `1 / (size_j - 1)`.
    pub fn grid_interval_eta(&self) -> f64 {
        1.0 / (self.size_j() - 1) as f64
    }

    #[cfg(test)]
    pub fn node_index(&self, i: usize, j: usize) -> usize {
        i + j * self.size_i()
    }
}

/// Flattens a node field with i varying fastest.
pub fn flatten_nodes(field: &Array2<f64>) -> Vec<f64> {
    field.t().iter().copied().collect()
}
