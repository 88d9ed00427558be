use std::io;

use async_trait::async_trait;

use super::WizardStep;
use super::execute::Headline;
use super::review::{ReviewDecision, ReviewSummary};
use crate::error::ExecutionError;
use crate::model::ExecutionProgressEvent;

/// Severity of a message shown to the user outside the progress list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Info,
    Success,
    Warning,
    Error,
}

/// Presentation surface the wizard drives. Implementations own all I/O.
#[async_trait]
pub trait WizardFrontend: Send + Sync {
    /// Render the step indicator for the step being entered.
    async fn show_step(&self, step: WizardStep) -> io::Result<()>;

    /// Explain that a wallet connection is required.
    async fn show_connect(&self) -> io::Result<()>;

    async fn notify(&self, notice: Notice, message: &str) -> io::Result<()>;

    /// Pick one of `options`, returning its index.
    async fn select(&self, prompt: &str, options: &[String]) -> io::Result<usize>;

    async fn input(&self, prompt: &str) -> io::Result<String>;

    async fn confirm(&self, prompt: &str, default: bool) -> io::Result<bool>;

    /// Show the review summary and wait for Back or Confirm.
    async fn review(&self, summary: &ReviewSummary) -> io::Result<ReviewDecision>;

    /// Replace the execution view with the latest snapshot.
    async fn show_progress(
        &self,
        headline: Headline,
        events: &[ExecutionProgressEvent],
        error: Option<&str>,
    ) -> io::Result<()>;
}

/// Embedding application callbacks. Each is invoked once per terminal
/// execution attempt.
pub trait BridgeHost: Send + Sync {
    fn on_success(&self);

    fn on_error(&self, error: &ExecutionError);
}
