use crate::cancel::CancelCheck;
use crate::error::SolverResult;
use crate::field::FieldComputer;
use crate::grid::StructuredGrid;
use crate::io::results::{SolutionSink, persist_step};
use crate::schedule::FlowSchedule;
use chrono::{DateTime, Duration, Local};
use indicatif::ProgressBar;
use tracing::{debug, info, warn};

/// Collaborators a run talks to: where steps go, how cancellation is polled
/// and where progress is shown.
pub struct RunContext<'a> {
    pub sink: &'a mut dyn SolutionSink,
    pub cancel: &'a dyn CancelCheck,
    pub progress: &'a ProgressBar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// Stopped after persisting `at_step`
    Cancelled { at_step: u32 },
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub steps_written: u64,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
}

impl RunReport {
    pub fn elapsed(&self) -> Duration {
        self.finished_at - self.started_at
    }
}

/// Formats a duration as `HH:MM:SS.mmm`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let millis = elapsed.num_milliseconds().max(0);
    let secs = millis / 1000;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        millis % 1000
    )
}

// Steps t = 0..=time_end in order: compute, persist, then poll cancellation
pub struct TimeStepDriver<'a> {
    computer: FieldComputer<'a>,
    schedule: &'a FlowSchedule,
    time_end: u32,
}

impl<'a> TimeStepDriver<'a> {
    pub fn new(grid: &'a StructuredGrid, schedule: &'a FlowSchedule, time_end: u32) -> Self {
        TimeStepDriver {
            computer: FieldComputer::new(grid, schedule),
            schedule,
            time_end,
        }
    }

    #[cfg(test)]
    pub fn computer(&self) -> &FieldComputer<'a> {
        &self.computer
    }

    pub fn run(&self, ctx: &mut RunContext<'_>) -> SolverResult<RunReport> {
        let started_at = Local::now();
        for message in self.schedule_range_warnings() {
            warn!("{}", message);
        }

        let grid = self.computer.grid();
        let mut solution = self.computer.new_solution();
        let mut steps_written = 0u64;
        let mut outcome = RunOutcome::Completed;

        for t in 0..=self.time_end {
            let time = f64::from(t);
            let conditions = self.computer.compute_into(time, &mut solution);
            debug!(
                "t={} water_level={} velocity_xi_coefficient={} velocity_eta_coefficient={}",
                t,
                conditions.water_level,
                conditions.velocity_xi_coefficient,
                conditions.velocity_eta_coefficient
            );

            persist_step(&mut *ctx.sink, time, grid, &solution)?;
            steps_written += 1;

            if ctx.progress.is_hidden() {
                println!("t= {}", t);
            } else {
                ctx.progress.println(format!("t= {}", t));
            }
            ctx.progress.inc(1);

            if ctx.cancel.is_cancelled() {
                info!("Cancellation observed after step {}", t);
                outcome = RunOutcome::Cancelled { at_step: t };
                break;
            }
        }

        Ok(RunReport {
            outcome,
            steps_written,
            started_at,
            finished_at: Local::now(),
        })
    }

    /// Messages for query times the schedule will clamp; out-of-range times
    /// are never rejected.
    pub fn schedule_range_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.schedule.start_time() > 0.0 {
            warnings.push(format!(
                "Flow schedule starts at {}; earlier steps use its first sample",
                self.schedule.start_time()
            ));
        }
        if f64::from(self.time_end) > self.schedule.end_time() {
            warnings.push(format!(
                "time_end {} is past the last flow sample at {}; later steps use its last sample",
                self.time_end,
                self.schedule.end_time()
            ));
        }
        warnings
    }
}
