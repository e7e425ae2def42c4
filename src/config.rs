use std::path::PathBuf;

// Configuration structure for project database table and column names
#[derive(Debug, Clone)]
pub struct ProjectSchema {
    pub grid_table: String,
    pub size_i: String,
    pub size_j: String,
    pub nodes_table: String,
    pub node_i: String,
    pub node_j: String,
    pub x: String,
    pub y: String,
    pub elevation: String,
    pub conditions_table: String,
    pub time_end: String,
    pub flow_table: String,
    pub flow_time: String,
    pub water_level: String,
    pub velocity_xi_coefficient: String,
    pub velocity_eta_coefficient: String,
}

impl ProjectSchema {
    pub fn new() -> Self {
        ProjectSchema {
            grid_table: "grid".to_string(),
            size_i: "size_i".to_string(),
            size_j: "size_j".to_string(),
            nodes_table: "grid_nodes".to_string(),
            node_i: "i".to_string(),
            node_j: "j".to_string(),
            x: "x".to_string(),
            y: "y".to_string(),
            elevation: "elevation".to_string(),
            conditions_table: "calculation_conditions".to_string(),
            time_end: "time_end".to_string(),
            flow_table: "flow_info".to_string(),
            flow_time: "time".to_string(),
            water_level: "water_level".to_string(),
            velocity_xi_coefficient: "velocity_xi_coefficient".to_string(),
            velocity_eta_coefficient: "velocity_eta_coefficient".to_string(),
        }
    }
}

impl Default for ProjectSchema {
    fn default() -> Self {
        Self::new()
    }
}

// Extra export formats written alongside the project database
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    None,
    Csv,
    #[value(name = "netcdf")]
    NetCdf,
    Both,
}

impl ExportFormat {
    pub fn csv(self) -> bool {
        matches!(self, ExportFormat::Csv | ExportFormat::Both)
    }

    pub fn netcdf(self) -> bool {
        matches!(self, ExportFormat::NetCdf | ExportFormat::Both)
    }
}

/// Named per-node arrays written for every time step, in write order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputField {
    Elevation,
    VelocityX,
    VelocityY,
    WaterLevel,
    Depth,
}

impl OutputField {
    pub const ALL: [OutputField; 5] = [
        OutputField::Elevation,
        OutputField::VelocityX,
        OutputField::VelocityY,
        OutputField::WaterLevel,
        OutputField::Depth,
    ];

    /// Position in `ALL`.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            OutputField::Elevation => "Elevation",
            OutputField::VelocityX => "velocityX",
            OutputField::VelocityY => "velocityY",
            OutputField::WaterLevel => "waterLevel",
            OutputField::Depth => "depth",
        }
    }

    pub fn long_name(self) -> &'static str {
        match self {
            OutputField::Elevation => "Bed elevation",
            OutputField::VelocityX => "Velocity (x component)",
            OutputField::VelocityY => "Velocity (y component)",
            OutputField::WaterLevel => "Water level",
            OutputField::Depth => "Depth",
        }
    }

    pub fn units(self) -> &'static str {
        match self {
            OutputField::Elevation | OutputField::WaterLevel | OutputField::Depth => "m",
            OutputField::VelocityX | OutputField::VelocityY => "m/s",
        }
    }
}

// Run parameters resolved from the CLI and the project file
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub project_path: PathBuf,
    pub time_end: u32,
    pub export: ExportFormat,
    pub output_dir: PathBuf,
}

impl RunConfig {
    /// Number of steps produced by a complete run, `time_end` inclusive.
    pub fn step_count(&self) -> u64 {
        u64::from(self.time_end) + 1
    }

    pub fn output_path(&self, suffix: &str) -> PathBuf {
        let stem = self
            .project_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string());
        self.output_dir.join(format!("{}_solution.{}", stem, suffix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_paths_follow_project_stem() {
        let config = RunConfig {
            project_path: PathBuf::from("/data/case1.db"),
            time_end: 4,
            export: ExportFormat::Both,
            output_dir: PathBuf::from("/out"),
        };
        assert_eq!(config.step_count(), 5);
        assert_eq!(
            config.output_path("nc"),
            PathBuf::from("/out/case1_solution.nc")
        );
        assert!(config.export.csv() && config.export.netcdf());
        assert!(!ExportFormat::None.csv());
    }

    #[test]
    fn output_field_names_are_stable() {
        let names: Vec<_> = OutputField::ALL.iter().map(|f| f.name()).collect();
        assert_eq!(
            names,
            ["Elevation", "velocityX", "velocityY", "waterLevel", "depth"]
        );
        for (k, field) in OutputField::ALL.iter().enumerate() {
            assert_eq!(field.index(), k);
        }
    }
}
