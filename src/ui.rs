//! Loading indicator for the command-line tools.
//!
//! A stage shows a spinner (or a `==>` line when stderr is not a terminal)
//! while a request is in flight and ends with a one-line summary of what the
//! service answered.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        Self { mode, is_tty }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty)
    }

    fn spinner_enabled(&self) -> bool {
        match self.mode {
            UiMode::Plain => false,
            UiMode::Pretty => true,
            UiMode::Auto => self.is_tty,
        }
    }

    /// Start a stage. The indicator stays up until the guard drops.
    pub fn stage(&self, name: &str) -> StageGuard {
        let spinner = if self.spinner_enabled() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            Some(spinner)
        } else {
            eprintln!("==> {name}");
            None
        };
        StageGuard {
            name: name.to_string(),
            start: Instant::now(),
            spinner,
            result: None,
        }
    }
}

/// How a stage ended, as reported on its closing line.
#[derive(Clone, Debug, PartialEq, Eq)]
enum StageResult {
    Done(String),
    Failed(String),
}

/// Clears the indicator on drop and prints the stage summary.
///
/// A guard dropped without `done` or `failed` being called reports the stage
/// as interrupted.
pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
    result: Option<StageResult>,
}

impl StageGuard {
    /// Update the spinner text while the stage is running.
    pub fn progress(&self, detail: &str) {
        if let Some(spinner) = &self.spinner {
            spinner.set_message(format!("{}: {detail}", self.name));
        }
    }

    pub fn done(&mut self, summary: impl Into<String>) {
        self.result = Some(StageResult::Done(summary.into()));
    }

    pub fn failed(&mut self, reason: impl Into<String>) {
        self.result = Some(StageResult::Failed(reason.into()));
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        if let Some(spinner) = &self.spinner {
            spinner.finish_and_clear();
        }
        eprintln!(
            "{}",
            closing_line(&self.name, self.result.as_ref(), self.start.elapsed())
        );
    }
}

fn closing_line(name: &str, result: Option<&StageResult>, elapsed: Duration) -> String {
    let took = format_duration(elapsed);
    match result {
        Some(StageResult::Done(summary)) => format!("✔ {name}: {summary} ({took})"),
        Some(StageResult::Failed(reason)) => format!("✘ {name}: {reason} ({took})"),
        None => format!("✘ {name}: interrupted ({took})"),
    }
}

/// Summary line for a finished detection run.
pub fn detection_summary(rendered: usize, skipped: usize, via_fallback: bool) -> String {
    let mut summary = match rendered {
        0 => "no detections".to_string(),
        1 => "1 detection".to_string(),
        n => format!("{n} detections"),
    };
    if skipped > 0 {
        summary.push_str(&format!(", {skipped} skipped"));
    }
    if via_fallback {
        summary.push_str(" via legacy endpoint");
    }
    summary
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
