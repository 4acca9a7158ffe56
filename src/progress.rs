//! Progress indicators for greenlake CLI.
//!
//! A spinner on stderr while a control-plane task is polled.

use declarative::{PollObserver, TaskResult, TaskStatus};
use indicatif::{ProgressBar, ProgressStyle};
use std::cell::OnceCell;
use std::time::Duration;

/// Spinner shown while a task is awaited. Hidden when `quiet`.
pub struct TaskSpinner {
    label: String,
    quiet: bool,
    bar: OnceCell<ProgressBar>,
}

impl TaskSpinner {
    pub fn new(label: impl Into<String>, quiet: bool) -> Self {
        Self {
            label: label.into(),
            quiet,
            bar: OnceCell::new(),
        }
    }

    fn bar(&self) -> &ProgressBar {
        self.bar.get_or_init(|| {
            if self.quiet {
                return ProgressBar::hidden();
            }
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{spinner:.green} {msg} {elapsed:.dim}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        })
    }
}

impl PollObserver for TaskSpinner {
    fn on_poll(&self, attempt: u32, status: &TaskStatus) {
        self.bar()
            .set_message(format!("{}: task {} (poll {})", self.label, status, attempt));
    }

    fn on_complete(&self, _result: &TaskResult) {
        if let Some(bar) = self.bar.get() {
            bar.finish_and_clear();
        }
    }
}

impl Drop for TaskSpinner {
    fn drop(&mut self) {
        if let Some(bar) = self.bar.get()
            && !bar.is_finished()
        {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quiet_spinner_is_hidden() {
        let spinner = TaskSpinner::new("volume", true);
        spinner.on_poll(1, &TaskStatus::Running);
        assert!(spinner.bar.get().unwrap().is_hidden());
    }

    #[test]
    fn test_complete_without_poll_creates_nothing() {
        let spinner = TaskSpinner::new("host", true);
        spinner.on_complete(&TaskResult {
            error: false,
            message: String::new(),
            response: json!({}),
        });
        assert!(spinner.bar.get().is_none());
    }
}
