use crate::error::{SolverError, SolverResult};

/// Time series driving water level and the two velocity coefficients.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowSchedule {
    time: Vec<f64>,
    water_level: Vec<f64>,
    velocity_xi_coefficient: Vec<f64>,
    velocity_eta_coefficient: Vec<f64>,
}

/// Flow coefficients interpolated at one query time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowConditions {
    pub water_level: f64,
    pub velocity_xi_coefficient: f64,
    pub velocity_eta_coefficient: f64,
}

impl FlowSchedule {
    pub fn new(
        time: Vec<f64>,
        water_level: Vec<f64>,
        velocity_xi_coefficient: Vec<f64>,
        velocity_eta_coefficient: Vec<f64>,
    ) -> SolverResult<Self> {
        let n = time.len();
        if n == 0 {
            return Err(SolverError::configuration("flow schedule has no samples"));
        }
        if water_level.len() != n
            || velocity_xi_coefficient.len() != n
            || velocity_eta_coefficient.len() != n
        {
            return Err(SolverError::configuration(format!(
                "flow schedule series lengths differ: time {}, water_level {}, velocity_xi_coefficient {}, velocity_eta_coefficient {}",
                n,
                water_level.len(),
                velocity_xi_coefficient.len(),
                velocity_eta_coefficient.len()
            )));
        }
        let all = [
            ("time", &time),
            ("water_level", &water_level),
            ("velocity_xi_coefficient", &velocity_xi_coefficient),
            ("velocity_eta_coefficient", &velocity_eta_coefficient),
        ];
        for (name, series) in all {
            if let Some(k) = series.iter().position(|v| !v.is_finite()) {
                return Err(SolverError::configuration(format!(
                    "flow schedule {} sample {} is not finite",
                    name, k
                )));
            }
        }
        if let Some(k) = time.windows(2).position(|w| w[1] < w[0]) {
            return Err(SolverError::configuration(format!(
                "flow schedule times must be ascending: sample {} ({}) follows {}",
                k + 1,
                time[k + 1],
                time[k]
            )));
        }

        Ok(FlowSchedule {
            time,
            water_level,
            velocity_xi_coefficient,
            velocity_eta_coefficient,
        })
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn start_time(&self) -> f64 {
        self.time[0]
    }

    pub fn end_time(&self) -> f64 {
        self.time[self.time.len() - 1]
    }

    pub fn water_level(&self, t: f64) -> f64 {
        interp(t, &self.time, &self.water_level)
    }

    pub fn velocity_xi_coefficient(&self, t: f64) -> f64 {
        interp(t, &self.time, &self.velocity_xi_coefficient)
    }

    pub fn velocity_eta_coefficient(&self, t: f64) -> f64 {
        interp(t, &self.time, &self.velocity_eta_coefficient)
    }

    pub fn conditions_at(&self, t: f64) -> FlowConditions {
        FlowConditions {
            water_level: self.water_level(t),
            velocity_xi_coefficient: self.velocity_xi_coefficient(t),
            velocity_eta_coefficient: self.velocity_eta_coefficient(t),
        }
    }
}

/// Piecewise-linear interpolation of `(xs, ys)` at `t`, clamped to the end
/// values outside `[xs[0], xs[n-1]]`.
///
/// `xs` must be non-empty, ascending and the same length as `ys`.
pub fn interp(t: f64, xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len();
    if t <= xs[0] {
        return ys[0];
    }
    if t >= xs[n - 1] {
        return ys[n - 1];
    }

    // first sample strictly after t; xs[hi - 1] <= t < xs[hi]
    let hi = xs.partition_point(|&x| x <= t);
    let lo = hi - 1;
    let alpha = (t - xs[lo]) / (xs[hi] - xs[lo]);
    ys[lo] + alpha * (ys[hi] - ys[lo])
}
