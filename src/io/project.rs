use crate::config::{OutputField, ProjectSchema};
use crate::error::{SolverError, SolverResult};
use crate::grid::StructuredGrid;
use crate::io::results::SolutionSink;
use crate::schedule::FlowSchedule;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const SOLUTION_TABLES: &str = "
    CREATE TABLE IF NOT EXISTS solution_steps (
        step INTEGER PRIMARY KEY,
        time REAL NOT NULL
    );
    CREATE TABLE IF NOT EXISTS solution_node_values (
        step INTEGER NOT NULL,
        name TEXT NOT NULL,
        node INTEGER NOT NULL,
        value REAL NOT NULL,
        PRIMARY KEY (step, name, node)
    );
";

/// Simulation project database: grid, calculation conditions and flow
/// schedule on the way in, per-step node solutions on the way out.
///
/// Each step is written inside its own transaction; a step that never
/// reaches `end_step` is rolled back when the connection closes.
pub struct ProjectFile {
    conn: Connection,
    path: PathBuf,
    schema: ProjectSchema,
    step: Option<i64>,
    next_step: i64,
}

impl ProjectFile {
    pub fn open(path: &Path, schema: ProjectSchema) -> SolverResult<Self> {
        if !path.is_file() {
            return Err(SolverError::configuration(format!(
                "project file not found: {:?}",
                path
            )));
        }
        let open_err = |source: rusqlite::Error| SolverError::ProjectOpen {
            path: path.to_path_buf(),
            source,
        };
        let conn = Connection::open(path).map_err(open_err)?;
        conn.execute_batch(SOLUTION_TABLES).map_err(open_err)?;
        info!("Opened project {:?}", path);

        Ok(ProjectFile {
            conn,
            path: path.to_path_buf(),
            schema,
            step: None,
            next_step: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes results left behind by a previous run.
    pub fn clear_solutions(&mut self) -> SolverResult<()> {
        self.conn
            .execute_batch("DELETE FROM solution_node_values; DELETE FROM solution_steps;")
            .map_err(|e| SolverError::persistence(self.name(), e))?;
        self.next_step = 0;
        debug!("Cleared previous solutions from {:?}", self.path);
        Ok(())
    }

    pub fn read_time_end(&self) -> SolverResult<u32> {
        let s = &self.schema;
        let query = format!(
            "SELECT value FROM '{}' WHERE name = ?1",
            s.conditions_table
        );
        let value = self
            .conn
            .query_row(&query, params![s.time_end], |row| row.get::<_, i64>(0))
            .optional()
            .map_err(|e| {
                SolverError::configuration(format!("failed to read {}: {}", s.time_end, e))
            })?
            .ok_or_else(|| {
                SolverError::configuration(format!(
                    "{} is missing from {}",
                    s.time_end, s.conditions_table
                ))
            })?;

        u32::try_from(value).map_err(|_| {
            SolverError::configuration(format!(
                "{} must be a non-negative integer, got {}",
                s.time_end, value
            ))
        })
    }

    pub fn read_flow_schedule(&self) -> SolverResult<FlowSchedule> {
        let s = &self.schema;
        let query = format!(
            "SELECT {}, {}, {}, {} FROM '{}' ORDER BY rowid",
            s.flow_time, s.water_level, s.velocity_xi_coefficient, s.velocity_eta_coefficient,
            s.flow_table
        );
        let flow_err = |e: rusqlite::Error| {
            SolverError::configuration(format!("failed to read {}: {}", s.flow_table, e))
        };

        let mut stmt = self.conn.prepare(&query).map_err(flow_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, f64>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                ))
            })
            .map_err(flow_err)?;

        let mut time = Vec::new();
        let mut water_level = Vec::new();
        let mut xi = Vec::new();
        let mut eta = Vec::new();
        for row in rows {
            let (t, wl, cxi, ceta) = row.map_err(flow_err)?;
            time.push(t);
            water_level.push(wl);
            xi.push(cxi);
            eta.push(ceta);
        }
        debug!("Read {} flow schedule samples", time.len());

        FlowSchedule::new(time, water_level, xi, eta)
    }

    pub fn read_grid(&self) -> SolverResult<StructuredGrid> {
        let s = &self.schema;
        let grid_err = |e: rusqlite::Error| SolverError::invalid_grid(e.to_string());

        let size_query = format!("SELECT {}, {} FROM '{}'", s.size_i, s.size_j, s.grid_table);
        let (size_i, size_j) = self
            .conn
            .query_row(&size_query, [], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(grid_err)?;
        if size_i < 2 || size_j < 2 {
            return Err(SolverError::invalid_grid(format!(
                "grid must have at least 2 nodes along each axis, got {} x {}",
                size_i, size_j
            )));
        }
        let too_large = || {
            SolverError::invalid_grid(format!("grid size {} x {} is too large", size_i, size_j))
        };
        let size_i = usize::try_from(size_i).map_err(|_| too_large())?;
        let size_j = usize::try_from(size_j).map_err(|_| too_large())?;
        let node_count = size_i.checked_mul(size_j).ok_or_else(too_large)?;

        // Declared size must match the stored node rows before allocating
        let count_query = format!("SELECT COUNT(*) FROM '{}'", s.nodes_table);
        let rows_present = self
            .conn
            .query_row(&count_query, [], |row| row.get::<_, i64>(0))
            .map_err(grid_err)?;
        if usize::try_from(rows_present).ok() != Some(node_count) {
            return Err(SolverError::invalid_grid(format!(
                "{} holds {} nodes, expected {} x {} = {}",
                s.nodes_table, rows_present, size_i, size_j, node_count
            )));
        }

        let mut x = vec![f64::NAN; node_count];
        let mut y = vec![f64::NAN; node_count];
        let mut elevation = vec![f64::NAN; node_count];
        let mut seen = vec![false; node_count];

        let node_query = format!(
            "SELECT {}, {}, {}, {}, {} FROM '{}'",
            s.node_i, s.node_j, s.x, s.y, s.elevation, s.nodes_table
        );
        let mut stmt = self.conn.prepare(&node_query).map_err(grid_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, f64>(4)?,
                ))
            })
            .map_err(grid_err)?;

        for row in rows {
            let (i, j, nx, ny, nz) = row.map_err(grid_err)?;
            if i < 0 || j < 0 || i as usize >= size_i || j as usize >= size_j {
                return Err(SolverError::invalid_grid(format!(
                    "node ({}, {}) lies outside the {} x {} grid",
                    i, j, size_i, size_j
                )));
            }
            let k = i as usize + j as usize * size_i;
            if seen[k] {
                return Err(SolverError::invalid_grid(format!(
                    "node ({}, {}) is defined more than once",
                    i, j
                )));
            }
            seen[k] = true;
            x[k] = nx;
            y[k] = ny;
            elevation[k] = nz;
        }

        let missing = seen.iter().filter(|&&present| !present).count();
        if missing > 0 {
            return Err(SolverError::invalid_grid(format!(
                "{} of {} nodes are missing from {}",
                missing, node_count, s.nodes_table
            )));
        }

        StructuredGrid::from_flat(size_i, size_j, x, y, elevation)
    }

    fn current_step(&self) -> SolverResult<i64> {
        self.step
            .ok_or_else(|| SolverError::persistence(self.name(), "write outside of a step"))
    }
}

impl SolutionSink for ProjectFile {
    fn name(&self) -> &'static str {
        "project"
    }

    fn begin_step(&mut self) -> SolverResult<()> {
        if self.step.is_some() {
            return Err(SolverError::persistence(self.name(), "previous step is still open"));
        }
        self.conn
            .execute_batch("BEGIN")
            .map_err(|e| SolverError::persistence(self.name(), e))?;
        self.step = Some(self.next_step);
        Ok(())
    }

    fn write_time(&mut self, time: f64) -> SolverResult<()> {
        let step = self.current_step()?;
        self.conn
            .execute(
                "INSERT INTO solution_steps (step, time) VALUES (?1, ?2)",
                params![step, time],
            )
            .map_err(|e| SolverError::persistence(self.name(), e))?;
        Ok(())
    }

    fn write_node_real(&mut self, field: OutputField, values: &[f64]) -> SolverResult<()> {
        let step = self.current_step()?;
        let sink = self.name();
        let mut stmt = self
            .conn
            .prepare_cached(
                "INSERT INTO solution_node_values (step, name, node, value) VALUES (?1, ?2, ?3, ?4)",
            )
            .map_err(|e| SolverError::persistence(sink, e))?;
        for (node, value) in values.iter().enumerate() {
            stmt.execute(params![step, field.name(), node as i64, *value])
                .map_err(|e| SolverError::persistence(sink, e))?;
        }
        Ok(())
    }

    fn end_step(&mut self) -> SolverResult<()> {
        let step = self.current_step()?;
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| SolverError::persistence(self.name(), e))?;
        self.step = None;
        self.next_step = step + 1;
        Ok(())
    }
}

impl Drop for ProjectFile {
    fn drop(&mut self) {
        if self.step.is_some() {
            // Leave only fully written steps behind
            let _ = self.conn.execute_batch("ROLLBACK");
        }
        debug!("Closed project {:?}", self.path);
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use crate::grid::flatten_nodes;

    /// Creates a project database holding the given inputs.
    pub fn write_project(
        path: &Path,
        grid: &StructuredGrid,
        time_end: Option<i64>,
        flow: &[(f64, f64, f64, f64)],
    ) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE grid (size_i INTEGER, size_j INTEGER);
             CREATE TABLE grid_nodes (i INTEGER, j INTEGER, x REAL, y REAL, elevation REAL);
             CREATE TABLE calculation_conditions (name TEXT PRIMARY KEY, value);
             CREATE TABLE flow_info (time REAL, water_level REAL,
                 velocity_xi_coefficient REAL, velocity_eta_coefficient REAL);",
        )
        .unwrap();
        conn.execute(
            "INSERT INTO grid VALUES (?1, ?2)",
            params![grid.size_i() as i64, grid.size_j() as i64],
        )
        .unwrap();

        let x = flatten_nodes(grid.coordinate_x());
        let y = flatten_nodes(grid.coordinate_y());
        let z = flatten_nodes(grid.elevation());
        for j in 0..grid.size_j() {
            for i in 0..grid.size_i() {
                let k = grid.node_index(i, j);
                conn.execute(
                    "INSERT INTO grid_nodes VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![i as i64, j as i64, x[k], y[k], z[k]],
                )
                .unwrap();
            }
        }
        if let Some(time_end) = time_end {
            conn.execute(
                "INSERT INTO calculation_conditions VALUES ('time_end', ?1)",
                params![time_end],
            )
            .unwrap();
        }
        for row in flow {
            conn.execute(
                "INSERT INTO flow_info VALUES (?1, ?2, ?3, ?4)",
                params![row.0, row.1, row.2, row.3],
            )
            .unwrap();
        }
    }

    pub fn stored_steps(path: &Path) -> Vec<(i64, f64)> {
        let conn = Connection::open(path).unwrap();
        let mut stmt = conn
            .prepare("SELECT step, time FROM solution_steps ORDER BY step")
            .unwrap();
        let steps = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        steps
    }

    pub fn stored_field(path: &Path, step: i64, name: &str) -> Vec<f64> {
        let conn = Connection::open(path).unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT value FROM solution_node_values WHERE step = ?1 AND name = ?2 ORDER BY node",
            )
            .unwrap();
        let values = stmt
            .query_map(params![step, name], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        values
    }
}
