use crate::grid::StructuredGrid;
use ndarray::{Array2, ArrayView2, Axis, Zip};

/// Forward Jacobian of the map from normalized computational coordinates
/// (xi, eta) in [0, 1]^2 to physical (x, y), sampled at every grid node.
#[derive(Debug, Clone, PartialEq)]
pub struct JacobianField {
    pub dx_dxi: Array2<f64>,
    pub dx_deta: Array2<f64>,
    pub dy_dxi: Array2<f64>,
    pub dy_deta: Array2<f64>,
}

impl JacobianField {
    pub fn build(grid: &StructuredGrid) -> Self {
        let h_xi = grid.grid_interval_xi();
        let h_eta = grid.grid_interval_eta();
        let x = grid.coordinate_x().view();
        let y = grid.coordinate_y().view();

        JacobianField {
            dx_dxi: gradient(x, h_xi, Axis(0)),
            dx_deta: gradient(x, h_eta, Axis(1)),
            dy_dxi: gradient(y, h_xi, Axis(0)),
            dy_deta: gradient(y, h_eta, Axis(1)),
        }
    }

    #[cfg(test)]
    pub fn dim(&self) -> (usize, usize) {
        self.dx_dxi.dim()
    }
}

/// Finite-difference derivative along `axis` with uniform spacing `h`.
///
/// Central differences in the interior, first-order one-sided differences
/// on the two end nodes. Lanes must hold at least two nodes.
pub fn gradient(field: ArrayView2<f64>, h: f64, axis: Axis) -> Array2<f64> {
    let mut out = Array2::<f64>::zeros(field.raw_dim());

    Zip::from(out.lanes_mut(axis))
        .and(field.lanes(axis))
        .for_each(|mut d, f| {
            let n = f.len();
            d[0] = (f[1] - f[0]) / h;
            for k in 1..n - 1 {
                d[k] = (f[k + 1] - f[k - 1]) / (2.0 * h);
            }
            d[n - 1] = (f[n - 1] - f[n - 2]) / h;
        });

    out
}
