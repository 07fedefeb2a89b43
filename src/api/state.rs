use dashmap::DashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::browser::SessionPool;
use crate::config::AgentConfig;

/// Shared application state
pub struct AppState {
    /// Defaults for runs started over HTTP; request fields override them
    pub agent_config: AgentConfig,

    /// Live browser sessions, shared by agent runs and replays
    pub sessions: Arc<SessionPool>,

    /// Cancellation handles of running agent runs: session_id -> token
    pub active_runs: DashMap<String, CancellationToken>,
}

impl AppState {
    pub fn new(agent_config: AgentConfig, sessions: Arc<SessionPool>) -> Self {
        Self {
            agent_config,
            sessions,
            active_runs: DashMap::new(),
        }
    }

    /// Register a run; `None` when the session already has one
    pub fn begin_run(self: &Arc<Self>, session_id: &str, token: CancellationToken) -> Option<RunGuard> {
        use dashmap::mapref::entry::Entry;
        match self.active_runs.entry(session_id.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(token);
                Some(RunGuard {
                    state: Arc::clone(self),
                    session_id: session_id.to_string(),
                })
            }
        }
    }

    pub fn cancel_run(&self, session_id: &str) -> bool {
        match self.active_runs.get(session_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(
            AgentConfig::from_env(),
            Arc::new(SessionPool::with_default_cookie_dir()),
        )
    }
}

/// Removes the run registration when dropped
pub struct RunGuard {
    state: Arc<AppState>,
    session_id: String,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.state.active_runs.remove(&self.session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_run_per_session() {
        let state = Arc::new(AppState::new(
            AgentConfig::default(),
            Arc::new(SessionPool::new(None)),
        ));
        let guard = state.begin_run("s1", CancellationToken::new());
        assert!(guard.is_some());
        assert!(state.begin_run("s1", CancellationToken::new()).is_none());
        assert!(state.cancel_run("s1"));

        drop(guard);
        assert!(!state.cancel_run("s1"));
        assert!(state.begin_run("s1", CancellationToken::new()).is_some());
    }
}
