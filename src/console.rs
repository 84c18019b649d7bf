// Terminal presentation: one progress bar per job

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

use crate::downloader::{JobState, JobView, Presenter};

fn waiting_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} {prefix} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn transfer_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix} [{bar:40.green/white}] {pos:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

fn state_message(state: JobState) -> &'static str {
    match state {
        JobState::Created => "queued",
        JobState::Resolving => "looking up video",
        JobState::Selecting => "choosing streams",
        JobState::Downloading => "downloading",
        JobState::Completed => "done",
        JobState::Failed => "failed",
    }
}

pub struct ConsoleView {
    bar: ProgressBar,
}

impl ConsoleView {
    fn new(multi: &MultiProgress, url: &str) -> Self {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.set_style(waiting_style());
        bar.set_prefix(url.to_string());
        Self { bar }
    }
}

impl JobView for ConsoleView {
    fn start_progress(&self) {
        self.bar.disable_steady_tick();
        self.bar.set_style(transfer_style());
        self.bar.set_length(100);
        self.bar.set_position(0);
    }

    fn set_progress(&self, percent: u8) {
        self.bar.set_position(percent as u64);
    }

    fn reset_progress(&self) {
        self.bar.set_style(waiting_style());
        self.bar.reset();
        self.bar.set_message(state_message(JobState::Created));
        self.bar.enable_steady_tick(Duration::from_millis(120));
    }

    fn show_error(&self, message: &str) {
        self.bar.abandon_with_message(message.to_string());
    }

    fn on_state(&self, state: JobState) {
        match state {
            JobState::Completed => self.bar.finish_with_message(state_message(state)),
            // the error text set by show_error stays visible
            JobState::Failed => {}
            _ => self.bar.set_message(state_message(state)),
        }
    }
}

/// Creates a bar for every job started from the command line
pub struct ConsolePresenter {
    multi: MultiProgress,
}

impl ConsolePresenter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
        }
    }
}

impl Presenter for ConsolePresenter {
    fn add_view(&mut self, url: &str) -> Arc<dyn JobView> {
        Arc::new(ConsoleView::new(&self.multi, url))
    }
}
