//! Indicatif-based progress display for the CLI.
//!
//! One bar for the whole cross-product, plus a line per finished cell with
//! its tokens, latency and throughput (or the error that ended it).

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use stratbench_core::reporter::{ProgressEvent, ProgressReporter};

pub struct ProgressDisplay {
    bar: Mutex<Option<ProgressBar>>,
    start_time: Mutex<Option<Instant>>,
    passed: AtomicU64,
    failed: AtomicU64,
}

impl Default for ProgressDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressDisplay {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
            start_time: Mutex::new(None),
            passed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    fn elapsed(&self) -> String {
        let start = *self.start_time.lock();
        let elapsed = start.map(|t| t.elapsed().as_secs()).unwrap_or(0);
        if elapsed >= 60 {
            format!("{}m{}s", elapsed / 60, elapsed % 60)
        } else {
            format!("{elapsed}s")
        }
    }

    fn update_message(&self, bar: &ProgressBar) {
        let msg = format!(
            "{} {} {} {} {}",
            style("✓").green(),
            style(self.passed.load(Ordering::Relaxed)).green().bold(),
            style("✗").red(),
            style(self.failed.load(Ordering::Relaxed)).red().bold(),
            style(self.elapsed()).dim(),
        );
        bar.set_message(msg);
    }

    /// Print above the bar, or straight to stdout when the bar is not drawn.
    fn line(&self, text: String) {
        match self.bar.lock().as_ref() {
            Some(bar) if !bar.is_hidden() => bar.println(text),
            _ => println!("{text}"),
        }
    }
}

impl ProgressReporter for ProgressDisplay {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::RunStarted {
                run_id,
                total_cells,
                strategies,
                models,
                tasks,
                concurrency,
            } => {
                *self.start_time.lock() = Some(Instant::now());
                println!(
                    "{} Starting {} ({total_cells} cells = {} strategies x {} models x {} tasks, concurrency {concurrency})",
                    style("→").cyan().bold(),
                    style(&run_id).bold(),
                    strategies.len(),
                    models.len(),
                    tasks.len(),
                );

                let bar = ProgressBar::new(total_cells);
                if let Ok(bar_style) = ProgressStyle::with_template(
                    "{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}",
                ) {
                    bar.set_style(bar_style.progress_chars("█▓▒░  "));
                }
                self.update_message(&bar);
                bar.enable_steady_tick(std::time::Duration::from_millis(100));
                *self.bar.lock() = Some(bar);
            }

            ProgressEvent::CellCompleted {
                completed,
                total_cells,
                strategy,
                model,
                task_id,
                success,
                tokens,
                latency_ms,
                throughput,
                error,
            } => {
                let counter = if success { &self.passed } else { &self.failed };
                counter.fetch_add(1, Ordering::Relaxed);

                let prefix = format!("[{completed}/{total_cells}] {strategy} / {model} / {task_id}");
                let text = if success {
                    format!(
                        "  {prefix} {} {tokens} tokens, {latency_ms:.0}ms, {throughput:.1} tok/s",
                        style("✓").green()
                    )
                } else {
                    format!(
                        "  {prefix} {} Error: {}",
                        style("✗").red(),
                        error.unwrap_or_default()
                    )
                };
                self.line(text);

                if let Some(bar) = self.bar.lock().as_ref() {
                    bar.inc(1);
                    self.update_message(bar);
                }
            }

            ProgressEvent::RunCompleted {
                run_id,
                total_runs,
                successful_runs,
                failed_runs,
            } => {
                if let Some(bar) = self.bar.lock().take() {
                    bar.finish_and_clear();
                }
                println!(
                    "{} Completed {}: {}/{total_runs} succeeded, {} failed ({})",
                    style("✓").green().bold(),
                    style(&run_id).bold(),
                    style(successful_runs).green().bold(),
                    style(failed_runs).red().bold(),
                    self.elapsed(),
                );
            }
        }
    }
}
