use std::fmt;

// What the launcher is doing right now, for the UI layer to render.
#[derive(Clone, Debug)]
pub enum Phase {
    Checking,
    Downloading {
        file: String,
        progress: f32,
        speed: String,
    },
    Launching {
        file: String,
    },
    PromptingOnError,
    Done,
}

/// A failed update-and-launch attempt. The retry loop treats every kind the
/// same way; the kind only shapes log and dialog text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LaunchFailure {
    Fetch(String),
    Download(String),
    Launch(String),
}

impl LaunchFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "fetch",
            Self::Download(_) => "download",
            Self::Launch(_) => "launch",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Fetch(message) | Self::Download(message) | Self::Launch(message) => message,
        }
    }
}

impl fmt::Display for LaunchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind(), self.message())
    }
}

// The operator's answer to a failed attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryChoice {
    Retry,
    Cancel,
}

/// Decides whether a failed attempt gets retried. Implementations range
/// from a modal dialog to a fixed answer; the engine never knows which.
pub trait FailurePrompt {
    fn decide(&self, failure: &LaunchFailure) -> RetryChoice;
}
