use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Quote;

/// Kind of on-chain process a route step goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessKind {
    TokenAllowance,
    SwitchChain,
    Swap,
    CrossChain,
    ReceivingChain,
}

impl ProcessKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TokenAllowance => "TOKEN_ALLOWANCE",
            Self::SwitchChain => "SWITCH_CHAIN",
            Self::Swap => "SWAP",
            Self::CrossChain => "CROSS_CHAIN",
            Self::ReceivingChain => "RECEIVING_CHAIN",
        }
    }
}

/// Status vocabulary shared by processes and step executions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessStatus {
    Pending,
    Started,
    ActionRequired,
    MessageRequired,
    Done,
    Failed,
    Cancelled,
    ResetRequired,
}

/// How a status is presented to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    InProgress,
    Error,
    /// Error family, rendered distinctly (e.g. yellow instead of red).
    Warning,
}

impl ProcessStatus {
    pub fn severity(self) -> Severity {
        match self {
            Self::Done => Severity::Success,
            Self::Pending | Self::Started | Self::ActionRequired | Self::MessageRequired => {
                Severity::InProgress
            }
            Self::Failed | Self::Cancelled => Severity::Error,
            Self::ResetRequired => Severity::Warning,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Started => "started",
            Self::ActionRequired => "action-required",
            Self::MessageRequired => "message-required",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::ResetRequired => "reset-required",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Done | Self::Failed | Self::Cancelled | Self::ResetRequired
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    #[serde(rename = "type")]
    pub kind: ProcessKind,
    pub status: ProcessStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_at: Option<DateTime<Utc>>,
}

impl Process {
    pub fn new(kind: ProcessKind, status: ProcessStatus) -> Self {
        Self {
            kind,
            status,
            tx_hash: None,
            tx_link: None,
            message: None,
            started_at: Utc::now(),
            done_at: None,
        }
    }

    pub fn set_status(&mut self, status: ProcessStatus) {
        self.status = status;
        if status.is_terminal() {
            self.done_at = Some(Utc::now());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepExecution {
    pub status: ProcessStatus,
    #[serde(default)]
    pub process: Vec<Process>,
}

impl Default for StepExecution {
    fn default() -> Self {
        Self {
            status: ProcessStatus::Pending,
            process: Vec::new(),
        }
    }
}

impl StepExecution {
    /// Find the process of `kind`, creating it in `Started` state if absent.
    pub fn process_mut(&mut self, kind: ProcessKind) -> &mut Process {
        let index = match self.process.iter().position(|p| p.kind == kind) {
            Some(index) => index,
            None => {
                self.process.push(Process::new(kind, ProcessStatus::Started));
                self.process.len() - 1
            }
        };
        &mut self.process[index]
    }

    /// Fail the most recent unfinished process, or the step itself.
    pub fn fail_current(&mut self, status: ProcessStatus, message: impl Into<String>) {
        let message = message.into();
        if let Some(process) = self
            .process
            .iter_mut()
            .rev()
            .find(|p| !p.status.is_terminal())
        {
            process.set_status(status);
            process.message = Some(message);
        }
        self.status = status;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStep {
    pub step: Quote,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution: Option<StepExecution>,
}

/// The executable form of a quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: String,
    pub from_chain_id: u64,
    pub to_chain_id: u64,
    pub from_amount: String,
    pub to_amount: String,
    pub steps: Vec<RouteStep>,
}

impl Route {
    /// A quote executes as a single-step route.
    pub fn from_quote(quote: &Quote) -> Self {
        Self {
            id: quote.id.clone(),
            from_chain_id: quote.action.from_chain_id,
            to_chain_id: quote.action.to_chain_id,
            from_amount: quote.action.from_amount.clone(),
            to_amount: quote.to_amount().unwrap_or_default().to_string(),
            steps: vec![RouteStep {
                step: quote.clone(),
                execution: None,
            }],
        }
    }

    /// Flatten the route into one display row per emitted process.
    pub fn progress_events(&self) -> Vec<ExecutionProgressEvent> {
        self.steps
            .iter()
            .flat_map(|step| {
                let tool = step.step.tool_name().to_string();
                step.execution
                    .iter()
                    .flat_map(|execution| execution.process.iter())
                    .map(move |process| ExecutionProgressEvent {
                        label: format!("{} - {}", tool, process.kind.as_str()),
                        status: process.status,
                        tx_hash: process.tx_hash.clone(),
                        tx_link: process.tx_link.clone(),
                        message: process.message.clone(),
                    })
            })
            .collect()
    }

    pub fn is_done(&self) -> bool {
        !self.steps.is_empty()
            && self.steps.iter().all(|step| {
                step.execution
                    .as_ref()
                    .is_some_and(|e| e.status == ProcessStatus::Done)
            })
    }
}

/// One rendered row of execution progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionProgressEvent {
    pub label: String,
    pub status: ProcessStatus,
    pub tx_hash: Option<String>,
    pub tx_link: Option<String>,
    pub message: Option<String>,
}

impl ExecutionProgressEvent {
    pub fn severity(&self) -> Severity {
        self.status.severity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{QuoteAction, TokenDescriptor, ToolDetails};

    fn sample_quote() -> Quote {
        Quote::new(
            "q-1",
            ToolDetails {
                key: "stargate".into(),
                name: "Stargate".into(),
                logo_url: None,
            },
            QuoteAction {
                from_chain_id: 1,
                to_chain_id: 999,
                from_token: TokenDescriptor::new(1, "0xA", "USDC", 6),
                to_token: TokenDescriptor::new(999, "0xB", "USDC", 6),
                from_amount: "10000000".into(),
                slippage: None,
                from_address: None,
                to_address: None,
            },
        )
    }

    #[test]
    fn severity_mapping_covers_vocabulary() {
        assert_eq!(ProcessStatus::Done.severity(), Severity::Success);
        for status in [
            ProcessStatus::Pending,
            ProcessStatus::Started,
            ProcessStatus::ActionRequired,
            ProcessStatus::MessageRequired,
        ] {
            assert_eq!(status.severity(), Severity::InProgress);
        }
        assert_eq!(ProcessStatus::Failed.severity(), Severity::Error);
        assert_eq!(ProcessStatus::Cancelled.severity(), Severity::Error);
        assert_eq!(ProcessStatus::ResetRequired.severity(), Severity::Warning);
    }

    #[test]
    fn status_serializes_screaming_snake_case() {
        let value = serde_json::to_value(ProcessStatus::ActionRequired).unwrap();
        assert_eq!(value, "ACTION_REQUIRED");
        let kind: ProcessKind = serde_json::from_value("CROSS_CHAIN".into()).unwrap();
        assert_eq!(kind, ProcessKind::CrossChain);
    }

    #[test]
    fn progress_rows_follow_process_order() {
        let mut route = Route::from_quote(&sample_quote());
        assert!(route.progress_events().is_empty());

        let execution = route.steps[0].execution.get_or_insert_with(StepExecution::default);
        execution.process_mut(ProcessKind::TokenAllowance).set_status(ProcessStatus::Done);
        let cross = execution.process_mut(ProcessKind::CrossChain);
        cross.set_status(ProcessStatus::Pending);
        cross.tx_hash = Some("0xfeed".into());

        let rows = route.progress_events();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].label, "Stargate - TOKEN_ALLOWANCE");
        assert_eq!(rows[0].severity(), Severity::Success);
        assert_eq!(rows[1].label, "Stargate - CROSS_CHAIN");
        assert_eq!(rows[1].tx_hash.as_deref(), Some("0xfeed"));
    }

    #[test]
    fn fail_current_marks_latest_open_process() {
        let mut execution = StepExecution::default();
        execution.process_mut(ProcessKind::TokenAllowance).set_status(ProcessStatus::Done);
        execution.process_mut(ProcessKind::CrossChain);

        execution.fail_current(ProcessStatus::Failed, "bridge reverted");

        assert_eq!(execution.status, ProcessStatus::Failed);
        assert_eq!(execution.process[0].status, ProcessStatus::Done);
        assert_eq!(execution.process[1].status, ProcessStatus::Failed);
        assert_eq!(execution.process[1].message.as_deref(), Some("bridge reverted"));
        assert!(execution.process[1].done_at.is_some());
    }
}
