use crate::grid::StructuredGrid;
use crate::jacobian::JacobianField;
use crate::schedule::{FlowConditions, FlowSchedule};
use crate::state::NodeSolution;
use ndarray::{Array1, Zip};

/// Cross-channel weighting of the eta velocity: +1 before the index-j
/// midpoint, -1 after it, and 0 on the midpoint itself when `size_j` is odd.
pub fn sign_field(size_j: usize) -> Array1<f64> {
    let center = size_j / 2;
    Array1::from_shape_fn(size_j, |j| {
        if j < center {
            1.0
        } else if j == center && size_j % 2 == 1 {
            0.0
        } else {
            -1.0
        }
    })
}

/// Combines the precomputed grid transform with the flow schedule to produce
/// the node fields for any time step.
pub struct FieldComputer<'a> {
    grid: &'a StructuredGrid,
    jacobian: JacobianField,
    sign_eta: Array1<f64>,
    schedule: &'a FlowSchedule,
}

impl<'a> FieldComputer<'a> {
    pub fn new(grid: &'a StructuredGrid, schedule: &'a FlowSchedule) -> Self {
        FieldComputer {
            grid,
            jacobian: JacobianField::build(grid),
            sign_eta: sign_field(grid.size_j()),
            schedule,
        }
    }

    pub fn grid(&self) -> &StructuredGrid {
        self.grid
    }

    #[cfg(test)]
    pub fn jacobian(&self) -> &JacobianField {
        &self.jacobian
    }

    #[cfg(test)]
    pub fn sign_eta(&self) -> &Array1<f64> {
        &self.sign_eta
    }

    pub fn new_solution(&self) -> NodeSolution {
        NodeSolution::new(self.grid.size_i(), self.grid.size_j())
    }

    /// Fills `solution` with the fields at time `t`.
    pub fn compute_into(&self, t: f64, solution: &mut NodeSolution) -> FlowConditions {
        let conditions = self.schedule.conditions_at(t);
        let water_level = conditions.water_level;

        solution.water_level.fill(water_level);
        Zip::from(&mut solution.depth)
            .and(self.grid.elevation())
            .for_each(|depth, &z| *depth = (water_level - z).max(0.0));

        let velocity_xi = self.grid.grid_interval_xi() * conditions.velocity_xi_coefficient;
        let velocity_eta = self.grid.grid_interval_eta() * conditions.velocity_eta_coefficient;
        let sign_eta = &self.sign_eta;
        let jac = &self.jacobian;

        Zip::indexed(&mut solution.velocity_x)
            .and(&jac.dx_dxi)
            .and(&jac.dx_deta)
            .for_each(|(_, j), u, &dx_dxi, &dx_deta| {
                *u = velocity_xi * dx_dxi + sign_eta[j] * velocity_eta * dx_deta;
            });
        Zip::indexed(&mut solution.velocity_y)
            .and(&jac.dy_dxi)
            .and(&jac.dy_deta)
            .for_each(|(_, j), v, &dy_dxi, &dy_deta| {
                *v = velocity_xi * dy_dxi + sign_eta[j] * velocity_eta * dy_deta;
            });

        conditions
    }

    #[cfg(test)]
    pub fn compute(&self, t: f64) -> NodeSolution {
        let mut solution = self.new_solution();
        self.compute_into(t, &mut solution);
        solution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn sloped_grid(size_i: usize, size_j: usize, dx: f64, dy: f64) -> StructuredGrid {
        let x = Array2::from_shape_fn((size_i, size_j), |(i, _)| i as f64 * dx);
        let y = Array2::from_shape_fn((size_i, size_j), |(_, j)| j as f64 * dy);
        // bed rises along j from 0.0 to 3.0
        let z = Array2::from_shape_fn((size_i, size_j), |(_, j)| j as f64);
        StructuredGrid::new(x, y, z).unwrap()
    }

    fn ramp_schedule() -> FlowSchedule {
        FlowSchedule::new(
            vec![0.0, 10.0],
            vec![0.5, 2.5],
            vec![1.0, 3.0],
            vec![2.0, 2.0],
        )
        .unwrap()
    }

    #[test]
    fn test_sign_field_odd_and_even() {
        assert_eq!(sign_field(5).to_vec(), vec![1.0, 1.0, 0.0, -1.0, -1.0]);
        assert_eq!(sign_field(4).to_vec(), vec![1.0, 1.0, -1.0, -1.0]);
        assert_eq!(sign_field(2).to_vec(), vec![1.0, -1.0]);
        assert_eq!(sign_field(3).to_vec(), vec![1.0, 0.0, -1.0]);
    }

    #[test]
    fn test_depth_is_never_negative() {
        let grid = sloped_grid(3, 4, 1.0, 1.0);
        let schedule = ramp_schedule();
        let computer = FieldComputer::new(&grid, &schedule);

        for t in 0..=12 {
            let sol = computer.compute(t as f64);
            let wl = schedule.water_level(t as f64);
            Zip::from(&sol.depth)
                .and(grid.elevation())
                .and(&sol.water_level)
                .for_each(|&d, &z, &w| {
                    assert_eq!(w, wl);
                    assert!(d >= 0.0);
                    assert_eq!(d == 0.0, z >= wl);
                });
        }
    }

    #[test]
    fn test_axis_aligned_velocity_has_no_eta_term_in_x() {
        let (size_i, size_j) = (5, 4);
        let grid = sloped_grid(size_i, size_j, 2.0, 0.5);
        let schedule = ramp_schedule();
        let computer = FieldComputer::new(&grid, &schedule);
        assert!(computer.jacobian().dx_deta.iter().all(|&v| v == 0.0));

        let t = 5.0;
        let sol = computer.compute(t);
        let c = schedule.conditions_at(t);
        let dx_dxi = 2.0 * (size_i - 1) as f64;
        let expected_u = c.velocity_xi_coefficient * grid.grid_interval_xi() * dx_dxi;
        for &u in sol.velocity_x.iter() {
            assert!((u - expected_u).abs() < 1e-12);
        }

        // y picks up only the signed eta term
        let dy_deta = 0.5 * (size_j - 1) as f64;
        let v_eta = c.velocity_eta_coefficient * grid.grid_interval_eta() * dy_deta;
        let sign = computer.sign_eta();
        for ((_, j), &v) in sol.velocity_y.indexed_iter() {
            assert!((v - sign[j] * v_eta).abs() < 1e-12);
        }
    }

    #[test]
    fn test_centerline_has_no_cross_flow() {
        // x = i + j couples the axes; centre row j = 2 still drops the eta term
        let x = Array2::from_shape_fn((3, 5), |(i, j)| (i + j) as f64);
        let y = Array2::from_shape_fn((3, 5), |(_, j)| j as f64);
        let grid = StructuredGrid::new(x, y, Array2::zeros((3, 5))).unwrap();
        let schedule = ramp_schedule();
        let computer = FieldComputer::new(&grid, &schedule);
        let sol = computer.compute(0.0);

        let velocity_xi = grid.grid_interval_xi() * 1.0;
        for i in 0..3 {
            let expected = velocity_xi * computer.jacobian().dx_dxi[[i, 2]];
            assert!((sol.velocity_x[[i, 2]] - expected).abs() < 1e-12);
            assert!(sol.velocity_y[[i, 2]].abs() < 1e-12);
        }
        assert!(sol.velocity_y[[0, 0]] > 0.0);
        assert!(sol.velocity_y[[0, 4]] < 0.0);
    }

    #[test]
    fn test_compute_into_overwrites_previous_step() {
        let grid = sloped_grid(3, 3, 1.0, 1.0);
        let schedule = ramp_schedule();
        let computer = FieldComputer::new(&grid, &schedule);
        let mut sol = computer.new_solution();
        computer.compute_into(10.0, &mut sol);
        computer.compute_into(0.0, &mut sol);
        let fresh = computer.compute(0.0);
        assert_eq!(sol.depth, fresh.depth);
        assert_eq!(sol.velocity_x, fresh.velocity_x);
        assert_eq!(sol.velocity_y, fresh.velocity_y);
        assert_eq!(sol.water_level, fresh.water_level);
    }
}
