//! Terminal progress of a running batch.

use std::io::{self, Write};
use std::time::Duration;

use spinring_track::ProgressReport;
use tracing::debug;

/// Time between two progress reports.
pub const INTERVAL: Duration = Duration::from_millis(250);

const BAR_WIDTH: usize = 40;

/// Logs batch progress and optionally draws a bar on stderr.
pub struct ProgressDisplay {
    bar: bool,
    last_percent: Option<u32>,
    done: bool,
}

impl ProgressDisplay {
    pub fn new(bar: bool) -> Self {
        Self {
            bar,
            last_percent: None,
            done: false,
        }
    }

    pub fn update(&mut self, report: &ProgressReport) {
        if self.done {
            return;
        }
        let percent = percent(report);
        let finished = report.finished == report.total;
        if self.last_percent == Some(percent) && !finished {
            return;
        }
        self.last_percent = Some(percent);
        self.done = finished;
        debug!(
            finished = report.finished,
            total = report.total,
            failed = report.failed,
            percent,
            "progress"
        );
        if self.bar {
            let mut err = io::stderr().lock();
            // A broken stderr must not abort the run.
            let _ = write!(err, "\r{}", render_bar(report, BAR_WIDTH));
            if finished {
                let _ = writeln!(err);
            }
            let _ = err.flush();
        }
    }
}

fn percent(report: &ProgressReport) -> u32 {
    (report.fraction() * 100.0).floor() as u32
}

/// `[####----]  NN% f/t done, k failed`
pub fn render_bar(report: &ProgressReport, width: usize) -> String {
    let filled = ((report.fraction() * width as f64).round() as usize).min(width);
    format!(
        "[{}{}] {:3}% {}/{} done, {} failed",
        "#".repeat(filled),
        "-".repeat(width - filled),
        percent(report),
        report.finished,
        report.total,
        report.failed
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn bar_counts_partial_progress_of_running_tasks() {
        let report = ProgressReport {
            total: 4,
            finished: 1,
            failed: 0,
            running: BTreeMap::from([(2, 0.5)]),
        };
        assert_eq!(render_bar(&report, 8), "[###-----]  37% 1/4 done, 0 failed");
    }

    #[test]
    fn finished_batch_fills_the_bar() {
        let report = ProgressReport {
            total: 3,
            finished: 3,
            failed: 1,
            running: BTreeMap::new(),
        };
        assert_eq!(render_bar(&report, 4), "[####] 100% 3/3 done, 1 failed");
    }

    #[test]
    fn display_stops_after_the_final_report() {
        let mut display = ProgressDisplay::new(false);
        let done = ProgressReport {
            total: 1,
            finished: 1,
            failed: 0,
            running: BTreeMap::new(),
        };
        display.update(&done);
        assert!(display.done);
        assert_eq!(display.last_percent, Some(100));
    }
}
