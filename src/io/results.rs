use crate::config::OutputField;
use crate::error::SolverResult;
use crate::grid::{StructuredGrid, flatten_nodes};
use crate::state::NodeSolution;

/// Destination for per-step node arrays.
///
/// Every step is written as `begin_step`, `write_time`, one
/// `write_node_real` per output field, then `end_step`. Arrays are flattened
/// with i varying fastest.
pub trait SolutionSink {
    fn name(&self) -> &'static str;

    fn begin_step(&mut self) -> SolverResult<()>;

    fn write_time(&mut self, time: f64) -> SolverResult<()>;

    fn write_node_real(&mut self, field: OutputField, values: &[f64]) -> SolverResult<()>;

    fn end_step(&mut self) -> SolverResult<()>;

    /// Flushes anything buffered once the run is over.
    fn finish(&mut self) -> SolverResult<()> {
        Ok(())
    }
}

// Fans each call out to every registered sink, in registration order
#[derive(Default)]
pub struct SinkSet {
    sinks: Vec<Box<dyn SolutionSink>>,
}

impl SinkSet {
    pub fn new() -> Self {
        SinkSet { sinks: Vec::new() }
    }

    pub fn push(&mut self, sink: Box<dyn SolutionSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl SolutionSink for SinkSet {
    fn name(&self) -> &'static str {
        "sink set"
    }

    fn begin_step(&mut self) -> SolverResult<()> {
        self.sinks.iter_mut().try_for_each(|s| s.begin_step())
    }

    fn write_time(&mut self, time: f64) -> SolverResult<()> {
        self.sinks.iter_mut().try_for_each(|s| s.write_time(time))
    }

    fn write_node_real(&mut self, field: OutputField, values: &[f64]) -> SolverResult<()> {
        self.sinks
            .iter_mut()
            .try_for_each(|s| s.write_node_real(field, values))
    }

    fn end_step(&mut self) -> SolverResult<()> {
        self.sinks.iter_mut().try_for_each(|s| s.end_step())
    }

    fn finish(&mut self) -> SolverResult<()> {
        self.sinks.iter_mut().try_for_each(|s| s.finish())
    }
}

/// Writes one complete step: the time value followed by every output field.
pub fn persist_step(
    sink: &mut dyn SolutionSink,
    time: f64,
    grid: &StructuredGrid,
    solution: &NodeSolution,
) -> SolverResult<()> {
    sink.begin_step()?;
    sink.write_time(time)?;
    for field in OutputField::ALL {
        let values = match field {
            OutputField::Elevation => flatten_nodes(grid.elevation()),
            OutputField::VelocityX => flatten_nodes(&solution.velocity_x),
            OutputField::VelocityY => flatten_nodes(&solution.velocity_y),
            OutputField::WaterLevel => flatten_nodes(&solution.water_level),
            OutputField::Depth => flatten_nodes(&solution.depth),
        };
        sink.write_node_real(field, &values)?;
    }
    sink.end_step()
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSink;
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_persist_step_brackets_writes() {
        let z = Array2::zeros((2, 3));
        let grid = StructuredGrid::new(z.clone(), z.clone(), z).unwrap();
        let solution = NodeSolution::new(2, 3);
        let mut sink = RecordingSink::default();

        persist_step(&mut sink, 4.0, &grid, &solution).unwrap();

        assert_eq!(
            sink.calls,
            vec![
                "begin",
                "time 4",
                "Elevation 6",
                "velocityX 6",
                "velocityY 6",
                "waterLevel 6",
                "depth 6",
                "end"
            ]
        );
    }

    #[test]
    fn test_sink_set_fans_out() {
        let z = Array2::zeros((2, 2));
        let grid = StructuredGrid::new(z.clone(), z.clone(), z).unwrap();
        let solution = NodeSolution::new(2, 2);

        let mut set = SinkSet::new();
        assert!(set.is_empty());
        set.push(Box::new(RecordingSink::default()));
        set.push(Box::new(RecordingSink::default()));
        assert_eq!(set.len(), 2);

        persist_step(&mut set, 0.0, &grid, &solution).unwrap();
        persist_step(&mut set, 1.0, &grid, &solution).unwrap();
        set.finish().unwrap();
    }

    #[test]
    fn test_sink_set_stops_on_first_failure() {
        let z = Array2::zeros((2, 2));
        let grid = StructuredGrid::new(z.clone(), z.clone(), z).unwrap();
        let solution = NodeSolution::new(2, 2);

        let mut set = SinkSet::new();
        set.push(Box::new(RecordingSink::failing_at(0)));
        let err = persist_step(&mut set, 0.0, &grid, &solution).unwrap_err();
        assert!(err.to_string().contains("disk full"));
    }
}
