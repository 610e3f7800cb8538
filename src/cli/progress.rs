//! Progress display for video acquisition.

use indicatif::{ProgressBar, ProgressStyle};

use crate::services::{AcquisitionEvent, TaskState};

/// Single bar over all eligible records, with the current record as message.
pub struct AcquisitionProgress {
    bar: ProgressBar,
}

impl AcquisitionProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Self { bar }
    }

    pub fn handle(&self, event: &AcquisitionEvent) {
        match event {
            AcquisitionEvent::Queued { total } => self.bar.set_length(*total as u64),
            AcquisitionEvent::Transition { state: TaskState::Pending, .. } => {}
            AcquisitionEvent::Transition { url, state, .. } => {
                if state.is_terminal() {
                    self.bar.inc(1);
                    if *state != TaskState::StoreUpdated {
                        self.bar.println(format!("  {} {}", state, url));
                    }
                } else {
                    self.bar.set_message(format!("{} {}", state, url));
                }
            }
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
