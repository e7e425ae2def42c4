use crate::config::OutputField;
use crate::error::{SolverError, SolverResult};
use crate::grid::{StructuredGrid, flatten_nodes};
use crate::io::results::SolutionSink;
use chrono::{DateTime, Local};
use netcdf::FileMut;
use std::path::Path;
use tracing::info;

const FILL_VALUE: f64 = -9999.0;
const SINK: &str = "netcdf";

fn nc_err(e: netcdf::Error) -> SolverError {
    SolverError::persistence(SINK, e)
}

fn add_variable(
    file: &mut FileMut,
    name: &str,
    dims: &[&str],
    long_name: &str,
    units: &str,
    fill_value: Option<f64>,
) -> SolverResult<()> {
    let mut var = file.add_variable::<f64>(name, dims).map_err(nc_err)?;
    if let Some(fill) = fill_value {
        var.put_attribute("_FillValue", fill).map_err(nc_err)?;
        var.put_attribute("missing_value", fill).map_err(nc_err)?;
    }
    var.put_attribute("long_name", long_name).map_err(nc_err)?;
    var.put_attribute("units", units).map_err(nc_err)?;
    Ok(())
}

// Streams each step into a NetCDF file along an unlimited time dimension
pub struct NetCdfSink {
    file: FileMut,
    step: usize,
    open: bool,
}

impl NetCdfSink {
    pub fn create(
        filename: &Path,
        grid: &StructuredGrid,
        reference_time: &DateTime<Local>,
    ) -> SolverResult<Self> {
        let mut file = netcdf::create(filename).map_err(nc_err)?;

        file.add_unlimited_dimension("time").map_err(nc_err)?;
        file.add_dimension("node", grid.node_count())
            .map_err(nc_err)?;

        add_variable(&mut file, "time", &["time"], "time step index", "steps", None)?;
        add_variable(&mut file, "x", &["node"], "Node x coordinate", "m", None)?;
        add_variable(&mut file, "y", &["node"], "Node y coordinate", "m", None)?;
        for field in OutputField::ALL {
            add_variable(
                &mut file,
                field.name(),
                &["time", "node"],
                field.long_name(),
                field.units(),
                Some(FILL_VALUE),
            )?;
        }

        // Static node coordinates
        for (name, values) in [("x", grid.coordinate_x()), ("y", grid.coordinate_y())] {
            let mut var = file
                .variable_mut(name)
                .ok_or_else(|| SolverError::persistence(SINK, format!("missing variable {}", name)))?;
            var.put_values(&flatten_nodes(values), ..).map_err(nc_err)?;
        }

        // Global attributes
        file.add_attribute("TITLE", "OUTPUT FROM GRIDFLOW_RS")
            .map_err(nc_err)?;
        file.add_attribute(
            "file_reference_time",
            reference_time.format("%Y-%m-%d_%H:%M:%S").to_string(),
        )
        .map_err(nc_err)?;
        file.add_attribute("size_i", grid.size_i() as i64)
            .map_err(nc_err)?;
        file.add_attribute("size_j", grid.size_j() as i64)
            .map_err(nc_err)?;

        info!("Writing NetCDF output to {:?}", filename);
        Ok(NetCdfSink {
            file,
            step: 0,
            open: false,
        })
    }

    fn variable(&mut self, name: &str) -> SolverResult<netcdf::VariableMut<'_>> {
        self.file
            .variable_mut(name)
            .ok_or_else(|| SolverError::persistence(SINK, format!("missing variable {}", name)))
    }
}

impl SolutionSink for NetCdfSink {
    fn name(&self) -> &'static str {
        SINK
    }

    fn begin_step(&mut self) -> SolverResult<()> {
        if self.open {
            return Err(SolverError::persistence(SINK, "previous step is still open"));
        }
        self.open = true;
        Ok(())
    }

    fn write_time(&mut self, time: f64) -> SolverResult<()> {
        let step = self.step;
        let mut var = self.variable("time")?;
        var.put_value(time, [step]).map_err(nc_err)
    }

    fn write_node_real(&mut self, field: OutputField, values: &[f64]) -> SolverResult<()> {
        let step = self.step;
        let mut var = self.variable(field.name())?;
        var.put_values(values, (step, ..)).map_err(nc_err)
    }

    fn end_step(&mut self) -> SolverResult<()> {
        if !self.open {
            return Err(SolverError::persistence(SINK, "no step is open"));
        }
        self.open = false;
        self.step += 1;
        Ok(())
    }
}
