//! Progress reporting for review runs

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use reviewer_application::ReviewProgressNotifier;
use reviewer_domain::{AgentTask, ReviewResult};

/// Progress bar over every (agent, pass) task of a run
pub struct ProgressReporter {
    bar: ProgressBar,
    passes: u32,
}

impl ProgressReporter {
    pub fn new(total_tasks: usize, passes: u32) -> Self {
        let bar = ProgressBar::new(total_tasks as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar.set_prefix("Reviewing");
        bar.set_message("Starting...");
        Self { bar, passes }
    }

    fn label(&self, task: &AgentTask) -> String {
        if self.passes > 1 {
            format!("{} (pass {})", task.agent().display_name(), task.pass())
        } else {
            task.agent().display_name().to_string()
        }
    }

    pub fn finish(&self) {
        self.bar.finish_with_message(format!("{}", "done".green()));
    }
}

impl ReviewProgressNotifier for ProgressReporter {
    fn on_task_start(&self, task: &AgentTask) {
        self.bar.set_message(self.label(task));
    }

    fn on_attempt_failed(&self, task: &AgentTask, attempt: u32, max_attempts: u32, error: &str) {
        self.bar.println(format!(
            "  {} {} attempt {}/{}: {}",
            "!".yellow(),
            self.label(task),
            attempt,
            max_attempts,
            error
        ));
    }

    fn on_task_complete(&self, task: &AgentTask, result: &ReviewResult) {
        let status = if result.is_success() {
            format!("{} {}", "v".green(), self.label(task))
        } else {
            format!("{} {}", "x".red(), self.label(task))
        };
        self.bar.set_message(status);
        self.bar.inc(1);
    }
}

/// Plain line-per-event progress for quiet terminals and log files
pub struct SimpleProgress;

impl ReviewProgressNotifier for SimpleProgress {
    fn on_task_complete(&self, task: &AgentTask, result: &ReviewResult) {
        if result.is_success() {
            println!("  {} {}", "v".green(), task.agent().display_name());
        } else {
            println!(
                "  {} {} ({})",
                "x".red(),
                task.agent().display_name(),
                result.error_message().unwrap_or("failed")
            );
        }
    }
}
