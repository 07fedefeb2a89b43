use anyhow::Result;
use std::sync::Arc;

use super::message_builder::UserMessageBuilder;
use crate::browser::ElementSnapshot;
use crate::llm::prompts::PLANNER_SYSTEM_PROMPT;
use crate::llm::{parse_lenient, ChatModel, PromptMessage};
use crate::models::{ActionRecord, PlannerOutput};

/// Whether the loop should consult the planner at `step` (1-based).
///
/// Runs on the first step, every `interval` steps after it, and again right
/// after a plan that reported done without the run ending.
pub fn should_plan(step: usize, interval: usize, last_plan: Option<&PlannerOutput>) -> bool {
    let interval = interval.max(1);
    step == 1 || (step - 1) % interval == 0 || last_plan.map(|p| p.done).unwrap_or(false)
}

/// Strategic layer: judges completion and sets the navigator's directive
pub struct Planner {
    model: Arc<dyn ChatModel>,
    history_window: usize,
}

impl Planner {
    pub fn new(model: Arc<dyn ChatModel>, history_window: usize) -> Self {
        Self {
            model,
            history_window,
        }
    }

    /// One model call. Transport errors propagate; unparseable output
    /// becomes [`PlannerOutput::fallback`].
    pub async fn plan(
        &self,
        goal: &str,
        url: &str,
        title: &str,
        snapshot: &ElementSnapshot,
        history: &[ActionRecord],
    ) -> Result<PlannerOutput> {
        let user = UserMessageBuilder::new(goal)
            .with_history(history, self.history_window)
            .with_browser_state(url, title, snapshot)
            .build();

        let response = self
            .model
            .chat(vec![
                PromptMessage::system(PLANNER_SYSTEM_PROMPT),
                PromptMessage::user(user),
            ])
            .await?;

        Ok(parse_output(&response))
    }
}

pub fn parse_output(text: &str) -> PlannerOutput {
    match parse_lenient::<PlannerOutput>(text) {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!("Planner output unparseable, using fallback: {}", e);
            PlannerOutput::fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planning_cadence() {
        let plans: Vec<usize> = (1..=10).filter(|&s| should_plan(s, 3, None)).collect();
        assert_eq!(plans, vec![1, 4, 7, 10]);
    }

    #[test]
    fn test_replans_after_unacted_done() {
        let mut last = PlannerOutput::fallback();
        assert!(!should_plan(2, 3, Some(&last)));
        last.done = true;
        assert!(should_plan(2, 3, Some(&last)));
    }

    #[test]
    fn test_zero_interval_plans_every_step() {
        assert!((1..=5).all(|s| should_plan(s, 0, None)));
    }

    #[test]
    fn test_parse_output_fenced() {
        let out = parse_output(
            "```json\n{\"observation\": \"title visible\", \"done\": true, \"next_steps\": \"\", \"final_answer\": \"Example Domain\"}\n```",
        );
        assert!(out.done);
        assert_eq!(out.final_answer.as_deref(), Some("Example Domain"));
    }

    #[test]
    fn test_parse_output_fallback() {
        let out = parse_output("I think we are nearly there.");
        assert_eq!(out, PlannerOutput::fallback());
        assert!(!out.done);
    }
}
