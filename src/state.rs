use ndarray::Array2;

// Per-node solution for the current time step, overwritten every step
#[derive(Debug, Clone)]
pub struct NodeSolution {
    pub depth: Array2<f64>,
    pub water_level: Array2<f64>,
    pub velocity_x: Array2<f64>,
    pub velocity_y: Array2<f64>,
}

impl NodeSolution {
    pub fn new(size_i: usize, size_j: usize) -> Self {
        NodeSolution {
            depth: Array2::zeros((size_i, size_j)),
            water_level: Array2::zeros((size_i, size_j)),
            velocity_x: Array2::zeros((size_i, size_j)),
            velocity_y: Array2::zeros((size_i, size_j)),
        }
    }
}
