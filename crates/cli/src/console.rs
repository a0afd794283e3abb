//! Terminal collaborators for a load test run.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use stampede_runner::{
    CompletionSink, DisplayCollaborator, ProgressSink, ResultReporter, RunSummary, Worker,
    NOT_ATTEMPTED,
};
use tracing::{debug, info, warn, Level};

const BAR_WIDTH: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Succeeded,
    Failed,
    Rejected,
}

#[derive(Debug, Serialize)]
pub struct ResultLine<'a> {
    pub index: usize,
    pub task: &'a str,
    pub outcome: Outcome,
    pub elapsed_ms: Option<i64>,
    pub at: DateTime<Utc>,
}

impl ResultLine<'_> {
    pub fn to_text(&self) -> String {
        let outcome = match self.outcome {
            Outcome::Succeeded => "ok",
            Outcome::Failed => "FAIL",
            Outcome::Rejected => "REJECTED",
        };
        let elapsed = self
            .elapsed_ms
            .map(|ms| format!("{ms} ms"))
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{} [{:>4}] {:<8} {:>9}  {}",
            self.at.format("%H:%M:%S%.3f"),
            self.index,
            outcome,
            elapsed,
            self.task
        )
    }
}

/// Prints one line per result to stdout.
pub struct ConsoleReporter {
    labels: Vec<String>,
    json: bool,
}

impl ConsoleReporter {
    /// `labels[i]` names the task added with index `i`.
    pub fn new(labels: Vec<String>, json: bool) -> Self {
        Self { labels, json }
    }

    fn emit(&self, index: usize, outcome: Outcome, elapsed_ms: Option<i64>) {
        let line = ResultLine {
            index,
            task: self.labels.get(index).map(String::as_str).unwrap_or("task"),
            outcome,
            elapsed_ms,
            at: Utc::now(),
        };
        if self.json {
            match serde_json::to_string(&line) {
                Ok(json) => println!("{json}"),
                Err(e) => warn!(error = %e, index, "failed to encode result"),
            }
        } else {
            println!("{}", line.to_text());
        }
    }
}

impl ResultReporter for ConsoleReporter {
    fn succeeded(&self, index: usize, elapsed_ms: i64) {
        self.emit(index, Outcome::Succeeded, Some(elapsed_ms));
    }

    fn failed(&self, index: usize, elapsed_ms: i64) {
        if elapsed_ms == NOT_ATTEMPTED {
            self.emit(index, Outcome::Rejected, None);
        } else {
            self.emit(index, Outcome::Failed, Some(elapsed_ms));
        }
    }
}

/// Logs progress each time it crosses a 10% boundary.
#[derive(Default)]
pub struct ConsoleProgress {
    last_decile: AtomicU8,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for ConsoleProgress {
    fn percent_complete(&self, percent: u8) {
        let decile = percent.min(100) / 10;
        let previous = self.last_decile.fetch_max(decile, Ordering::SeqCst);
        if decile > previous {
            info!(percent = decile * 10, "progress");
        }
    }
}

/// Logs worker creation and, at debug level, renders per-worker bars for
/// the running, last and previous task durations.
pub struct ConsoleDisplay {
    scale_ms: u64,
}

impl ConsoleDisplay {
    pub fn new(scale_ms: u64) -> Self {
        Self { scale_ms }
    }
}

/// `ms` as a fixed-width bar where `scale_ms` fills it completely.
pub fn bar(ms: u64, scale_ms: u64) -> String {
    let filled = if scale_ms == 0 {
        BAR_WIDTH
    } else {
        (ms.saturating_mul(BAR_WIDTH as u64) / scale_ms).min(BAR_WIDTH as u64) as usize
    };
    format!("{}{}", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled))
}

impl DisplayCollaborator for ConsoleDisplay {
    fn attach_worker_view(&self, worker: &Worker) {
        info!(slot = worker.slot(), "worker attached");
    }

    fn tick(&self, worker: &Worker) {
        if !tracing::enabled!(Level::DEBUG) {
            return;
        }
        let snap = worker.snapshot();
        debug!(
            slot = snap.slot,
            task = ?snap.task_index,
            this = %bar(snap.current_ms, self.scale_ms),
            last = %bar(snap.last_ms, self.scale_ms),
            before = %bar(snap.previous_ms, self.scale_ms),
            "worker"
        );
    }
}

/// Wakes the main thread when the run has finished.
pub struct ChannelCompletion {
    tx: Mutex<Sender<()>>,
}

impl ChannelCompletion {
    pub fn new(tx: Sender<()>) -> Self {
        Self { tx: Mutex::new(tx) }
    }
}

impl CompletionSink for ChannelCompletion {
    fn work_finished(&self) {
        let tx = self.tx.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if tx.send(()).is_err() {
            debug!("completion receiver already gone");
        }
    }
}

/// Final summary, as text or pretty JSON.
pub fn render_summary(summary: &RunSummary, json: bool) -> anyhow::Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(summary)?);
    }
    let mut out = format!(
        "tasks: {}  succeeded: {}  failed: {}  rejected: {}",
        summary.total(),
        summary.succeeded,
        summary.failed,
        summary.rejected
    );
    if let (Some(min), Some(max)) = (summary.min_elapsed_ms, summary.max_elapsed_ms) {
        out.push_str(&format!(
            "\nelapsed: min {min} ms  mean {:.1} ms  max {max} ms",
            summary.mean_elapsed_ms
        ));
    }
    if let (Some(first), Some(last)) = (summary.first_result_at, summary.last_result_at) {
        out.push_str(&format!(
            "\nwall: {} ms",
            (last - first).num_milliseconds()
        ));
    }
    Ok(out)
}
