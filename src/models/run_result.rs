use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::history::ActionRecord;
use super::replay_action::PlaywrightAction;
use crate::browser::IndexedElement;

/// Terminal state of an agent run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    DoneSuccess,
    /// The navigator declared the task finished but unsuccessful
    DoneFailure,
    DoneMaxSteps,
    NeedsHumanHelp,
    Cancelled,
    Error,
}

/// Page context handed to a human after escalation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanHelpContext {
    pub url: String,
    pub title: String,
    pub elements: Vec<IndexedElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_next_step: Option<String>,
    pub consecutive_failures: usize,
}

/// Result of one agent run. Every terminal path returns this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRunResult {
    pub session_id: String,
    pub goal: String,
    pub outcome: RunOutcome,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub history: Vec<ActionRecord>,
    pub actions: Vec<PlaywrightAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_screenshot: Option<String>,
    pub steps_taken: usize,
    pub llm_calls: usize,
    pub elapsed_ms: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub needs_human_help: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub human_help: Option<HumanHelpContext>,
}

impl AgentRunResult {
    pub fn new(session_id: String, goal: String) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            goal,
            outcome: RunOutcome::Error,
            success: false,
            result: None,
            error: None,
            history: Vec::new(),
            actions: Vec::new(),
            final_screenshot: None,
            steps_taken: 0,
            llm_calls: 0,
            elapsed_ms: 0,
            started_at: now,
            finished_at: now,
            needs_human_help: false,
            human_help: None,
        }
    }

    pub fn succeed(&mut self, result: Option<String>) {
        self.outcome = RunOutcome::DoneSuccess;
        self.success = true;
        self.result = result;
        self.error = None;
    }

    pub fn fail(&mut self, outcome: RunOutcome, error: impl Into<String>) {
        self.outcome = outcome;
        self.success = false;
        self.error = Some(error.into());
    }

    pub fn escalate(&mut self, context: HumanHelpContext) {
        self.outcome = RunOutcome::NeedsHumanHelp;
        self.success = false;
        self.needs_human_help = true;
        self.error = Some(format!(
            "No progress after {} consecutive steps; human help needed",
            context.consecutive_failures
        ));
        self.human_help = Some(context);
    }

    pub fn finish(&mut self) {
        self.finished_at = Utc::now();
        self.elapsed_ms = (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64;
    }
}
