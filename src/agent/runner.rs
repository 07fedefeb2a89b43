use anyhow::{anyhow, Result};
use futures_util::FutureExt;
use rand::Rng;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::executor::{ActionExecutor, ActionResult};
use super::navigator::{Navigator, NavigatorRequest};
use super::planner::{should_plan, Planner};
use crate::browser::{
    index_elements, screenshot_with_highlights, ElementSnapshot, PageDriver, SessionProvider,
};
use crate::config::AgentConfig;
use crate::llm::ChatModel;
use crate::models::{
    ActionRecord, AgentRunResult, HumanCorrection, HumanHelpContext, PlannerOutput,
    ResumeContext, RunOutcome,
};
use crate::replay::ReplayExecutor;

/// How the loop ended, before it is folded into the result
enum Exit {
    Done { success: bool, text: Option<String> },
    MaxSteps,
    Escalated(Box<HumanHelpContext>),
    Cancelled,
    TimedOut(Duration),
    Fatal(String),
}

/// Page state observed at the start of a step
struct Observation {
    url: String,
    title: String,
    snapshot: ElementSnapshot,
    screenshot: Option<String>,
}

/// Mutable state owned by one run
struct LoopState {
    consecutive_no_progress: usize,
    last_error: Option<String>,
    last_plan: Option<PlannerOutput>,
    pending_instruction: Option<String>,
    acquire_attempted: bool,
    page: Option<Arc<dyn PageDriver>>,
}

/// The autonomous execution loop: index, plan, navigate, execute, record
pub struct AgentRunner {
    sessions: Arc<dyn SessionProvider>,
    planner: Planner,
    navigator: Navigator,
    executor: ActionExecutor,
    config: AgentConfig,
    cancel_token: CancellationToken,
}

impl AgentRunner {
    pub fn new(
        sessions: Arc<dyn SessionProvider>,
        model: Arc<dyn ChatModel>,
        mut config: AgentConfig,
    ) -> Self {
        config.normalize();
        Self {
            sessions,
            planner: Planner::new(Arc::clone(&model), config.history_window),
            navigator: Navigator::new(model, config.history_window),
            executor: ActionExecutor::new(config.executor_config()),
            config,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Get the cancellation token for external cancellation
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run the agent to a terminal outcome. Never fails: errors, panics and
    /// cancellation are reported in the result, and the session is closed
    /// exactly once if it was acquired.
    pub async fn run(
        &self,
        goal: &str,
        start_url: Option<&str>,
        session_id: &str,
        resume: Option<ResumeContext>,
    ) -> AgentRunResult {
        self.execute(goal, start_url, session_id, resume, None).await
    }

    /// Like [`run`](Self::run), ending with `Cancelled` once `limit` elapses
    pub async fn run_with_timeout(
        &self,
        goal: &str,
        start_url: Option<&str>,
        session_id: &str,
        resume: Option<ResumeContext>,
        limit: Duration,
    ) -> AgentRunResult {
        self.execute(goal, start_url, session_id, resume, Some(limit))
            .await
    }

    #[instrument(skip(self, start_url, resume, limit), fields(session_id = %session_id))]
    async fn execute(
        &self,
        goal: &str,
        start_url: Option<&str>,
        session_id: &str,
        resume: Option<ResumeContext>,
        limit: Option<Duration>,
    ) -> AgentRunResult {
        let mut result = AgentRunResult::new(session_id.to_string(), goal.to_string());
        let mut state = LoopState {
            consecutive_no_progress: 0,
            last_error: None,
            last_plan: None,
            pending_instruction: None,
            acquire_attempted: false,
            page: None,
        };

        tracing::info!("Starting agent run: {}", goal);

        let exit = {
            let guarded =
                AssertUnwindSafe(self.run_loop(goal, start_url, session_id, resume, &mut result, &mut state))
                    .catch_unwind();
            let deadline = async {
                match limit {
                    Some(limit) => tokio::time::sleep(limit).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => Exit::Cancelled,
                _ = deadline => Exit::TimedOut(limit.unwrap_or_default()),
                outcome = guarded => match outcome {
                    Ok(Ok(exit)) => exit,
                    Ok(Err(e)) => Exit::Fatal(e.to_string()),
                    Err(panic) => Exit::Fatal(format!("Agent loop panicked: {}", panic_message(&panic))),
                },
            }
        };

        let persist = matches!(exit, Exit::Done { success: true, .. }) && self.config.persist_cookies;
        self.conclude(&mut result, exit);

        if let Some(page) = state.page.take() {
            match page.screenshot(self.config.action_timeout_ms).await {
                Ok(shot) => result.final_screenshot = Some(shot),
                Err(e) => tracing::debug!("Final screenshot unavailable: {}", e),
            }
        }

        if state.acquire_attempted {
            if let Err(e) = self.sessions.close(session_id, persist).await {
                tracing::warn!("Failed to close session {}: {}", session_id, e);
            }
        }

        result.finish();
        tracing::info!(
            "Agent run finished: {:?} after {} steps, {} model calls, {} replay actions ({}ms)",
            result.outcome,
            result.steps_taken,
            result.llm_calls,
            result.actions.len(),
            result.elapsed_ms
        );
        result
    }

    fn conclude(&self, result: &mut AgentRunResult, exit: Exit) {
        match exit {
            Exit::Done { success: true, text } => result.succeed(text),
            Exit::Done {
                success: false,
                text,
            } => {
                result.result = text.clone();
                result.fail(
                    RunOutcome::DoneFailure,
                    text.unwrap_or_else(|| "Task reported as not achievable".to_string()),
                );
            }
            Exit::MaxSteps => result.fail(
                RunOutcome::DoneMaxSteps,
                format!("Max steps reached ({})", self.config.max_steps),
            ),
            Exit::Escalated(context) => {
                tracing::warn!(
                    "Escalating to a human after {} steps without progress",
                    context.consecutive_failures
                );
                result.escalate(*context);
            }
            Exit::Cancelled => result.fail(RunOutcome::Cancelled, "Run cancelled"),
            Exit::TimedOut(limit) => result.fail(
                RunOutcome::Cancelled,
                format!("Run timed out after {}s", limit.as_secs_f64()),
            ),
            Exit::Fatal(message) => {
                tracing::error!("Agent run failed: {}", message);
                result.fail(RunOutcome::Error, message);
            }
        }
    }

    async fn run_loop(
        &self,
        goal: &str,
        start_url: Option<&str>,
        session_id: &str,
        resume: Option<ResumeContext>,
        result: &mut AgentRunResult,
        state: &mut LoopState,
    ) -> Result<Exit> {
        let timeout_ms = self.config.action_timeout_ms;

        state.acquire_attempted = true;
        let page = self
            .sessions
            .acquire(session_id, &self.config.launch_options(None))
            .await
            .map_err(|e| anyhow!("Failed to acquire browser session: {}", e))?;
        state.page = Some(Arc::clone(&page));
        let page = page.as_ref();

        let resume = resume.unwrap_or_default();
        if let Some(url) = resume.resume_url.as_deref().or(start_url) {
            page.navigate(url, timeout_ms)
                .await
                .map_err(|e| anyhow!("Failed to open {}: {}", url, e))?;
        }

        if let Some(exit) = self.apply_resume(page, resume, result, state).await? {
            return Ok(exit);
        }

        let max_steps = self.config.max_steps;
        let mut last_observation: Option<Observation> = None;

        for step in 1..=max_steps {
            result.steps_taken = step;

            let observation = self.observe(page).await?;
            tracing::info!(
                "Step {}/{}: {} elements at {}",
                step,
                max_steps,
                observation.snapshot.len(),
                observation.url
            );

            if state.consecutive_no_progress >= self.config.escalation_threshold {
                return Ok(self.escalation(page, observation, state).await);
            }

            if should_plan(step, self.config.planning_interval, state.last_plan.as_ref()) {
                result.llm_calls += 1;
                let plan = self
                    .planner
                    .plan(
                        goal,
                        &observation.url,
                        &observation.title,
                        &observation.snapshot,
                        &result.history,
                    )
                    .await
                    .map_err(|e| anyhow!("Planner call failed: {}", e))?;

                tracing::info!("Planner: done={} next: {}", plan.done, plan.next_steps);

                if plan.done {
                    let text = plan
                        .final_answer
                        .clone()
                        .or_else(|| Some(plan.observation.clone()).filter(|o| !o.is_empty()));
                    return Ok(Exit::Done {
                        success: true,
                        text,
                    });
                }
                state.last_plan = Some(plan);
            }

            result.llm_calls += 1;
            let instruction = state.pending_instruction.take();
            let output = self
                .navigator
                .navigate(NavigatorRequest {
                    goal,
                    directive: state.last_plan.as_ref().map(|p| p.next_steps.as_str()),
                    url: &observation.url,
                    title: &observation.title,
                    snapshot: &observation.snapshot,
                    history: &result.history,
                    screenshot: observation.screenshot.clone(),
                    max_actions: self.config.max_actions,
                    instruction: instruction.as_deref(),
                    step,
                    max_steps,
                })
                .await
                .map_err(|e| anyhow!("Navigator call failed: {}", e))?;

            tracing::info!(
                "Navigator: {} actions, next goal: {}",
                output.action.len(),
                output.current_state.next_goal
            );

            let batch = self
                .executor
                .execute_batch(page, &output.action, &observation.snapshot)
                .await;

            for action_result in &batch.results {
                record(step, action_result, result);
            }

            if let Some(done) = batch.done() {
                return Ok(Exit::Done {
                    success: done.done_success,
                    text: done.content.clone(),
                });
            }

            if batch.success_count() == 0 {
                state.consecutive_no_progress += 1;
                state.last_error = Some(
                    batch
                        .last_error()
                        .unwrap_or("No action succeeded")
                        .to_string(),
                );
                tracing::warn!(
                    "No progress in step {} ({} in a row)",
                    step,
                    state.consecutive_no_progress
                );
            } else {
                state.consecutive_no_progress = 0;
            }

            last_observation = Some(observation);

            if step < max_steps {
                self.human_delay().await;
            }
        }

        if state.consecutive_no_progress >= self.config.escalation_threshold {
            let observation = match self.observe(page).await {
                Ok(obs) => obs,
                Err(e) => {
                    tracing::warn!("Could not re-observe page for escalation: {}", e);
                    last_observation.unwrap_or(Observation {
                        url: String::new(),
                        title: String::new(),
                        snapshot: ElementSnapshot::default(),
                        screenshot: None,
                    })
                }
            };
            return Ok(self.escalation(page, observation, state).await);
        }

        Ok(Exit::MaxSteps)
    }

    /// Seed history and the replay log from earlier work, then apply the
    /// human correction
    async fn apply_resume(
        &self,
        page: &dyn PageDriver,
        resume: ResumeContext,
        result: &mut AgentRunResult,
        state: &mut LoopState,
    ) -> Result<Option<Exit>> {
        if !resume.previous_actions.is_empty() {
            tracing::info!(
                "Resuming with {} previously executed actions",
                resume.previous_actions.len()
            );
        }
        for action in resume.previous_actions {
            result.history.push(ActionRecord::from_replayed(0, &action, None));
            result.actions.push(action);
        }

        match resume.correction {
            None => {}
            Some(HumanCorrection::Instruction { text }) => {
                tracing::info!("Human instruction queued for the navigator");
                state.pending_instruction = Some(text);
            }
            Some(HumanCorrection::Action { action }) => {
                let replay = ReplayExecutor::new(self.config.action_timeout_ms);
                match replay.execute_action(page, &action).await {
                    Ok(()) => {
                        tracing::info!("Applied human correction: {}", action.to_hint_string());
                        result.history.push(ActionRecord::from_replayed(0, &action, None));
                        result.actions.push(action);
                    }
                    Err(e) => {
                        tracing::warn!("Human correction failed: {}", e);
                        result
                            .history
                            .push(ActionRecord::from_replayed(0, &action, Some(e.to_string())));
                        state.last_error = Some(e.to_string());
                    }
                }
            }
            Some(HumanCorrection::ElementAction { action }) => {
                let snapshot = index_elements(page, self.config.action_timeout_ms).await?;
                let action_result = self.executor.execute_action(page, &action, &snapshot).await;
                record(0, &action_result, result);
                if action_result.is_done {
                    return Ok(Some(Exit::Done {
                        success: action_result.done_success,
                        text: action_result.content,
                    }));
                }
                if let Some(e) = action_result.error {
                    state.last_error = Some(e);
                }
            }
        }

        Ok(None)
    }

    async fn observe(&self, page: &dyn PageDriver) -> Result<Observation> {
        let timeout_ms = self.config.action_timeout_ms;
        let snapshot = index_elements(page, timeout_ms)
            .await
            .map_err(|e| anyhow!("Failed to index page elements: {}", e))?;

        let url = page.current_url().await.unwrap_or_default();
        let title = page.title().await.unwrap_or_default();

        let screenshot = if self.config.use_vision {
            match screenshot_with_highlights(page, &snapshot.elements, timeout_ms).await {
                Ok(shot) => Some(shot),
                Err(e) => {
                    tracing::warn!("Highlighted screenshot failed: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(Observation {
            url,
            title,
            snapshot,
            screenshot,
        })
    }

    async fn escalation(
        &self,
        page: &dyn PageDriver,
        observation: Observation,
        state: &LoopState,
    ) -> Exit {
        let screenshot = match observation.screenshot {
            Some(shot) => Some(shot),
            None => page.screenshot(self.config.action_timeout_ms).await.ok(),
        };

        Exit::Escalated(Box::new(HumanHelpContext {
            url: observation.url,
            title: observation.title,
            elements: observation.snapshot.elements,
            screenshot,
            last_error: state.last_error.clone(),
            suggested_next_step: state
                .last_plan
                .as_ref()
                .map(|p| p.next_steps.clone())
                .filter(|s| !s.is_empty()),
            consecutive_failures: state.consecutive_no_progress,
        }))
    }

    async fn human_delay(&self) {
        let (min, max) = (self.config.delay_min_ms, self.config.delay_max_ms);
        if max == 0 {
            return;
        }
        let ms = rand::thread_rng().gen_range(min..=max.max(min));
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

/// Append one action outcome to the history, and to the replay log on success
fn record(step: usize, action_result: &ActionResult, result: &mut AgentRunResult) {
    result.history.push(ActionRecord::from_action(
        step,
        &action_result.action,
        action_result.selector.clone(),
        action_result.success,
        action_result.error.clone(),
    ));
    if action_result.success {
        if let Some(ref replay) = action_result.replay {
            result.actions.push(replay.clone());
        }
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
