use crate::config::OutputField;
use crate::error::{SolverError, SolverResult};
use crate::grid::StructuredGrid;
use crate::io::results::SolutionSink;
use crate::schedule::FlowSchedule;
use csv::{ReaderBuilder, Writer, WriterBuilder};
use serde::Deserialize;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

const SINK: &str = "csv";

// One flow schedule sample from CSV
#[derive(Debug, Deserialize)]
struct FlowRecord {
    time: f64,
    water_level: f64,
    velocity_xi_coefficient: f64,
    velocity_eta_coefficient: f64,
}

/// Loads a flow schedule from a headered CSV file.
pub fn load_flow_schedule(csv_file: &Path) -> SolverResult<FlowSchedule> {
    let csv_err = |e: csv::Error| {
        SolverError::configuration(format!("failed to read flow schedule {:?}: {}", csv_file, e))
    };

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(b',')
        .trim(csv::Trim::All)
        .from_path(csv_file)
        .map_err(csv_err)?;

    let mut time = Vec::new();
    let mut water_level = Vec::new();
    let mut xi = Vec::new();
    let mut eta = Vec::new();
    for result in rdr.deserialize() {
        let record: FlowRecord = result.map_err(csv_err)?;
        time.push(record.time);
        water_level.push(record.water_level);
        xi.push(record.velocity_xi_coefficient);
        eta.push(record.velocity_eta_coefficient);
    }

    info!("Loaded {} flow schedule records from {:?}", time.len(), csv_file);
    FlowSchedule::new(time, water_level, xi, eta)
}

// Writes one row per node per step; arrays are buffered until the step ends
pub struct CsvSink {
    writer: Writer<File>,
    size_i: usize,
    node_count: usize,
    step: usize,
    time: Option<f64>,
    columns: Vec<Option<Vec<f64>>>,
    open: bool,
}

impl CsvSink {
    pub fn create(path: &Path, grid: &StructuredGrid) -> SolverResult<Self> {
        let mut writer = WriterBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(|e| SolverError::persistence(SINK, e))?;

        let mut header = vec!["step", "time", "node", "i", "j"];
        header.extend(OutputField::ALL.iter().map(|f| f.name()));
        writer
            .write_record(&header)
            .map_err(|e| SolverError::persistence(SINK, e))?;

        info!("Writing CSV output to {:?}", path);
        Ok(CsvSink {
            writer,
            size_i: grid.size_i(),
            node_count: grid.node_count(),
            step: 0,
            time: None,
            columns: vec![None; OutputField::ALL.len()],
            open: false,
        })
    }
}

impl SolutionSink for CsvSink {
    fn name(&self) -> &'static str {
        SINK
    }

    fn begin_step(&mut self) -> SolverResult<()> {
        if self.open {
            return Err(SolverError::persistence(SINK, "previous step is still open"));
        }
        self.open = true;
        self.time = None;
        self.columns.iter_mut().for_each(|c| *c = None);
        Ok(())
    }

    fn write_time(&mut self, time: f64) -> SolverResult<()> {
        self.time = Some(time);
        Ok(())
    }

    fn write_node_real(&mut self, field: OutputField, values: &[f64]) -> SolverResult<()> {
        if values.len() != self.node_count {
            return Err(SolverError::persistence(
                SINK,
                format!(
                    "{} has {} values for {} nodes",
                    field.name(),
                    values.len(),
                    self.node_count
                ),
            ));
        }
        self.columns[field.index()] = Some(values.to_vec());
        Ok(())
    }

    fn end_step(&mut self) -> SolverResult<()> {
        if !self.open {
            return Err(SolverError::persistence(SINK, "no step is open"));
        }
        let time = self
            .time
            .ok_or_else(|| SolverError::persistence(SINK, "step has no time value"))?;

        for node in 0..self.node_count {
            let mut record = vec![
                self.step.to_string(),
                time.to_string(),
                node.to_string(),
                (node % self.size_i).to_string(),
                (node / self.size_i).to_string(),
            ];
            // Fields never written this step are left empty
            record.extend(self.columns.iter().map(|c| match c {
                Some(values) => values[node].to_string(),
                None => String::new(),
            }));
            self.writer
                .write_record(&record)
                .map_err(|e| SolverError::persistence(SINK, e))?;
        }

        self.open = false;
        self.step += 1;
        debug!("CSV step {} written", self.step - 1);
        Ok(())
    }

    fn finish(&mut self) -> SolverResult<()> {
        self.writer
            .flush()
            .map_err(|e| SolverError::persistence(SINK, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::results::persist_step;
    use crate::state::NodeSolution;
    use ndarray::Array2;
    use std::io::Write;
    use tempfile::{NamedTempFile, tempdir};

    #[test]
    fn test_load_flow_schedule() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"time, water_level, velocity_xi_coefficient, velocity_eta_coefficient
0, 1.0, 0.5, 0.0
10, 5.0, 1.5, 1.0"#
        )
        .unwrap();

        let schedule = load_flow_schedule(file.path()).unwrap();
        assert_eq!(schedule.len(), 2);
        assert!((schedule.water_level(5.0) - 3.0).abs() < 1e-12);
        assert!((schedule.velocity_xi_coefficient(5.0) - 1.0).abs() < 1e-12);
        assert!((schedule.velocity_eta_coefficient(20.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_load_flow_schedule_rejects_bad_rows() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "time,water_level,velocity_xi_coefficient,velocity_eta_coefficient\n0,abc,1,1"
        )
        .unwrap();
        assert!(matches!(
            load_flow_schedule(file.path()),
            Err(SolverError::Configuration(_))
        ));
    }

    #[test]
    fn test_writes_one_row_per_node() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let z = Array2::from_shape_fn((2, 2), |(i, j)| (i + 2 * j) as f64);
        let grid = StructuredGrid::new(z.clone(), z.clone(), z).unwrap();
        let mut solution = NodeSolution::new(2, 2);
        solution.depth.fill(0.5);

        let mut sink = CsvSink::create(&path, &grid).unwrap();
        persist_step(&mut sink, 0.0, &grid, &solution).unwrap();
        persist_step(&mut sink, 1.0, &grid, &solution).unwrap();
        sink.finish().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "step,time,node,i,j,Elevation,velocityX,velocityY,waterLevel,depth"
        );
        assert_eq!(lines.len(), 1 + 2 * 4);
        assert_eq!(lines[4], "0,0,3,1,1,3,0,0,0,0.5");
        assert_eq!(lines[5], "1,1,0,0,0,0,0,0,0,0.5");
    }
}
