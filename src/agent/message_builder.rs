use crate::browser::ElementSnapshot;
use crate::llm::prompts::format_history;
use crate::models::ActionRecord;

/// Builds the user message for planner and navigator turns
pub struct UserMessageBuilder {
    goal: String,
    directive: Option<String>,
    instruction: Option<String>,
    history: String,
    step: Option<(usize, usize)>,
    max_actions: Option<usize>,
    url: String,
    title: String,
    elements_repr: String,
}

impl UserMessageBuilder {
    pub fn new(goal: &str) -> Self {
        Self {
            goal: goal.to_string(),
            directive: None,
            instruction: None,
            history: format_history(&[], 0),
            step: None,
            max_actions: None,
            url: String::new(),
            title: String::new(),
            elements_repr: String::new(),
        }
    }

    /// Standing directive from the last planner call
    pub fn with_directive(mut self, directive: Option<&str>) -> Self {
        self.directive = directive
            .filter(|d| !d.trim().is_empty())
            .map(|d| d.to_string());
        self
    }

    /// Free-text correction supplied by a human operator
    pub fn with_instruction(mut self, instruction: Option<&str>) -> Self {
        self.instruction = instruction
            .filter(|i| !i.trim().is_empty())
            .map(|i| i.to_string());
        self
    }

    pub fn with_history(mut self, history: &[ActionRecord], window: usize) -> Self {
        self.history = format_history(history, window);
        self
    }

    pub fn with_step(mut self, step: usize, max_steps: usize) -> Self {
        self.step = Some((step, max_steps));
        self
    }

    pub fn with_max_actions(mut self, max_actions: usize) -> Self {
        self.max_actions = Some(max_actions);
        self
    }

    pub fn with_browser_state(mut self, url: &str, title: &str, snapshot: &ElementSnapshot) -> Self {
        self.url = url.to_string();
        self.title = title.to_string();
        self.elements_repr = snapshot.format_for_llm();
        self
    }

    /// Build the user message text (the screenshot is attached separately)
    pub fn build(&self) -> String {
        let mut parts = Vec::new();

        parts.push(format!("<user_goal>\n{}\n</user_goal>", self.goal));

        if let Some(ref directive) = self.directive {
            parts.push(format!(
                "<planner_directive>\n{}\n</planner_directive>",
                directive
            ));
        }

        if let Some(ref instruction) = self.instruction {
            parts.push(format!(
                "<human_instruction>\nA human operator reviewed the previous attempt and says:\n{}\n</human_instruction>",
                instruction
            ));
        }

        parts.push(format!("<action_history>\n{}\n</action_history>", self.history));

        if let Some((step, max_steps)) = self.step {
            let mut info = format!("Step {} of {}", step, max_steps);
            if let Some(max_actions) = self.max_actions {
                info.push_str(&format!(". Return at most {} actions.", max_actions));
            }
            parts.push(format!("<step_info>\n{}\n</step_info>", info));
        }

        parts.push(format_browser_state(
            &self.url,
            &self.title,
            &self.elements_repr,
        ));

        parts.join("\n\n")
    }
}

fn format_browser_state(url: &str, title: &str, elements_repr: &str) -> String {
    format!(
        "<browser_state>\nURL: {}\nTitle: {}\n\nInteractive Elements:\n{}\n</browser_state>",
        url, title, elements_repr
    )
}
