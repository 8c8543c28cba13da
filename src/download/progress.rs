use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress bar for a counted stage (observation pages, leaves)
pub struct StageProgress {
    bar: ProgressBar,
}

impl StageProgress {
    pub fn new(total: u64, prefix: &str) -> Self {
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{prefix:>12.cyan.bold} [{elapsed_precise}] [{wide_bar:.cyan/blue}] \
                     {pos}/{len} ({eta}) {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        bar.set_prefix(prefix.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));

        StageProgress { bar }
    }

    pub fn set_position(&self, position: u64) {
        self.bar.set_position(position);
    }

    pub fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    pub fn finish_with_message(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    pub fn is_finished(&self) -> bool {
        self.bar.is_finished()
    }
}

impl Drop for StageProgress {
    fn drop(&mut self) {
        if !self.is_finished() {
            self.bar.abandon();
        }
    }
}

pub fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}
