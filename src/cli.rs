use crate::config::ExportFormat;
use clap::Parser;
use std::path::PathBuf;
use tracing::Level;

/// Prescribed velocity, depth and water level on a curvilinear grid
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Simulation project database
    pub project: Option<PathBuf>,

    /// Additional export written alongside the project
    #[arg(short, long, value_enum, default_value_t = ExportFormat::None)]
    pub export: ExportFormat,

    /// Directory for exported files (defaults to the project's directory)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// CSV flow schedule used instead of the project's flow_info table
    #[arg(long)]
    pub flow_info: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Print plain step lines instead of a progress bar
    #[arg(long)]
    pub no_progress: bool,
}

impl Args {
    pub fn level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    /// Where exports go: `--output-dir`, else the directory holding the project.
    pub fn output_dir_for(&self, project: &std::path::Path) -> PathBuf {
        match &self.output_dir {
            Some(dir) => dir.clone(),
            None => project
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

pub fn get_args() -> Args {
    Args::parse()
}
