use anyhow::{Context, Result};
use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

mod cancel;
mod cli;
mod config;
mod driver;
mod error;
mod field;
mod grid;
mod io;
mod jacobian;
mod schedule;
mod state;

use cancel::CancelFile;
use cli::{Args, get_args};
use config::{ProjectSchema, RunConfig};
use driver::{RunContext, RunOutcome, RunReport, TimeStepDriver, format_elapsed};
use io::csv::{CsvSink, load_flow_schedule};
use io::netcdf::NetCdfSink;
use io::project::ProjectFile;
use io::results::{SinkSet, SolutionSink};

fn main() -> Result<()> {
    let args = get_args();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.level())
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    println!("----------Start----------");

    let Some(project_path) = args.project.clone() else {
        println!("Error: project file name not specified.");
        std::process::exit(1);
    };
    println!("Project file name: {}", project_path.display());

    // Includes project loading
    let started_at = Local::now();
    let report = run(&args, &project_path)?;

    if let RunOutcome::Cancelled { at_step } = report.outcome {
        info!("Stopped after t={}", at_step);
        println!("Cancel requested. Calculation is finishing...");
    }
    println!("----------Finish----------");
    println!("Steps written: {}", report.steps_written);
    info!("Time stepping took {}", format_elapsed(report.elapsed()));
    println!(
        "Elapsed time: {}",
        format_elapsed(report.finished_at - started_at)
    );
    Ok(())
}

fn run(args: &Args, project_path: &Path) -> Result<RunReport> {
    let mut project = ProjectFile::open(project_path, ProjectSchema::new())
        .with_context(|| format!("Failed to open project: {:?}", project_path))?;
    project
        .clear_solutions()
        .with_context(|| format!("Failed to clear previous results in {:?}", project.path()))?;

    // Calculation conditions
    let time_end = project.read_time_end()?;
    let schedule = match &args.flow_info {
        Some(csv_file) => load_flow_schedule(csv_file)?,
        None => project.read_flow_schedule()?,
    };
    info!(
        "Flow schedule: {} samples from t={} to t={}",
        schedule.len(),
        schedule.start_time(),
        schedule.end_time()
    );

    // Grid
    let grid = project.read_grid()?;
    println!("Grid size:");
    println!("    node_size_i= {}", grid.size_i());
    println!("    node_size_j= {}", grid.size_j());

    let config = RunConfig {
        project_path: project_path.to_path_buf(),
        time_end,
        export: args.export,
        output_dir: args.output_dir_for(project_path),
    };

    // Output sinks, released on every exit path when `sinks` drops
    let mut sinks = SinkSet::new();
    sinks.push(Box::new(project));
    if config.export.netcdf() {
        let nc_path = config.output_path("nc");
        sinks.push(Box::new(NetCdfSink::create(&nc_path, &grid, &Local::now())?));
    }
    if config.export.csv() {
        let csv_path = config.output_path("csv");
        sinks.push(Box::new(CsvSink::create(&csv_path, &grid)?));
    }
    info!("Writing to {} output sink(s)", sinks.len());

    let cancel = CancelFile::for_project(project_path);
    if cancel
        .clear_stale()
        .with_context(|| format!("Failed to remove {:?}", cancel.path()))?
    {
        warn!("Removed stale cancel request {:?}", cancel.path());
    }

    let pb = if args.no_progress {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(config.step_count());
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} steps ({eta})")?
                .progress_chars("#>-"),
        );
        pb
    };

    println!("----------mainloop start----------");
    let driver = TimeStepDriver::new(&grid, &schedule, config.time_end);
    let mut ctx = RunContext {
        sink: &mut sinks,
        cancel: &cancel,
        progress: &pb,
    };
    let report = driver.run(&mut ctx)?;
    pb.finish_and_clear();

    sinks.finish().context("Failed to flush output")?;
    if config.export.netcdf() {
        println!("NetCDF results saved to {}", config.output_path("nc").display());
    }
    if config.export.csv() {
        println!("CSV results saved to {}", config.output_path("csv").display());
    }

    Ok(report)
}
