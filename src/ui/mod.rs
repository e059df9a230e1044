use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use rfd::{MessageButtons, MessageDialog, MessageDialogResult, MessageLevel};

use crate::engine::state::{FailurePrompt, LaunchFailure, Phase, RetryChoice};

const PROGRESS_TEMPLATE: &str = "{msg} [{bar:40}] {percent}%";

/// Modal Retry/Cancel error box, the launcher's only window.
pub struct DialogPrompt {
    product: String,
}

impl DialogPrompt {
    pub fn new(product: String) -> Self {
        Self { product }
    }
}

impl FailurePrompt for DialogPrompt {
    fn decide(&self, failure: &LaunchFailure) -> RetryChoice {
        let description = format!(
            "An error occurred while getting the latest version of {}.\n\n{}\n\nRetry?",
            self.product, failure
        );
        let choice = MessageDialog::new()
            .set_level(MessageLevel::Error)
            .set_title(&format!("Unable to update {}", self.product))
            .set_description(&description)
            .set_buttons(MessageButtons::OkCancelCustom(
                "Retry".to_owned(),
                "Cancel".to_owned(),
            ))
            .show();
        match choice {
            MessageDialogResult::Ok => RetryChoice::Retry,
            MessageDialogResult::Custom(label) if label == "Retry" => RetryChoice::Retry,
            _ => RetryChoice::Cancel,
        }
    }
}

/// Fixed prompt answer for runs without anyone to ask.
pub struct AutoPrompt {
    choice: RetryChoice,
}

impl AutoPrompt {
    pub fn cancel() -> Self {
        Self {
            choice: RetryChoice::Cancel,
        }
    }
}

impl FailurePrompt for AutoPrompt {
    fn decide(&self, failure: &LaunchFailure) -> RetryChoice {
        info!("prompt: answering {:?} without asking after: {failure}", self.choice);
        self.choice
    }
}

/// Renders engine phases as log lines plus a terminal progress bar while a
/// download is running.
#[derive(Default)]
pub struct PhaseRenderer {
    bar: Option<ProgressBar>,
}

impl PhaseRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, phase: Phase) {
        match phase {
            Phase::Checking => {
                self.clear_bar();
                info!("phase: checking for updates");
            }
            Phase::Downloading {
                file,
                progress,
                speed,
            } => {
                let bar = self.bar.get_or_insert_with(|| {
                    let bar = ProgressBar::new(100);
                    bar.set_style(
                        ProgressStyle::with_template(PROGRESS_TEMPLATE)
                            .unwrap_or_else(|_| ProgressStyle::default_bar()),
                    );
                    bar
                });
                bar.set_message(format!("{file} {speed}"));
                bar.set_position(progress.clamp(0.0, 100.0) as u64);
            }
            Phase::Launching { file } => {
                self.clear_bar();
                info!("phase: launching {file}");
            }
            Phase::PromptingOnError | Phase::Done => {
                self.clear_bar();
            }
        }
    }

    fn clear_bar(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}
