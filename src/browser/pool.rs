use anyhow::{anyhow, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::manager::{ChromeSession, LaunchOptions};
use super::page::{Cookie, PageDriver};

/// Source of browser pages for agent runs, keyed by session id
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Return the page for `session_id`, launching a browser if needed
    async fn acquire(&self, session_id: &str, options: &LaunchOptions) -> Result<Arc<dyn PageDriver>>;

    /// Close the session, saving its cookies first when asked
    async fn close(&self, session_id: &str, persist_cookies: bool) -> Result<()>;
}

/// Pool of live Chrome sessions
pub struct SessionPool {
    sessions: DashMap<String, Arc<ChromeSession>>,
    cookie_dir: Option<PathBuf>,
    /// One lock per id so an id never gets two browsers while launches for
    /// different ids run in parallel
    launch_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SessionPool {
    pub fn new(cookie_dir: Option<PathBuf>) -> Self {
        Self {
            sessions: DashMap::new(),
            cookie_dir,
            launch_locks: DashMap::new(),
        }
    }

    /// Pool storing cookies under the user data directory
    pub fn with_default_cookie_dir() -> Self {
        Self::new(default_cookie_dir())
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn launch_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.launch_locks
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    fn cookie_file(&self, session_id: &str) -> Option<PathBuf> {
        self.cookie_dir
            .as_ref()
            .map(|dir| cookie_path(dir, session_id))
    }

    /// Close every session (used on shutdown)
    pub async fn close_all(&self) {
        for id in self.list() {
            if let Err(e) = self.close(&id, false).await {
                tracing::warn!("Failed to close session {}: {}", id, e);
            }
        }
    }
}

#[async_trait]
impl SessionProvider for SessionPool {
    async fn acquire(&self, session_id: &str, options: &LaunchOptions) -> Result<Arc<dyn PageDriver>> {
        if let Some(existing) = self.sessions.get(session_id) {
            tracing::debug!("Reusing browser session {}", session_id);
            return Ok(existing.clone() as Arc<dyn PageDriver>);
        }

        let lock = self.launch_lock(session_id);
        let _guard = lock.lock().await;
        if let Some(existing) = self.sessions.get(session_id) {
            return Ok(existing.clone() as Arc<dyn PageDriver>);
        }

        let session = Arc::new(ChromeSession::launch(options).await?);

        if let Some(path) = self.cookie_file(session_id) {
            match load_cookies(&path).await {
                Ok(cookies) if !cookies.is_empty() => {
                    if let Err(e) = session.set_cookies(&cookies).await {
                        tracing::warn!("Failed to restore cookies for {}: {}", session_id, e);
                    } else {
                        tracing::info!("Restored {} cookies for session {}", cookies.len(), session_id);
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Failed to read cookies for {}: {}", session_id, e),
            }
        }

        self.sessions.insert(session_id.to_string(), Arc::clone(&session));
        tracing::info!("Opened browser session {}", session_id);
        Ok(session as Arc<dyn PageDriver>)
    }

    async fn close(&self, session_id: &str, persist_cookies: bool) -> Result<()> {
        let (_, session) = self
            .sessions
            .remove(session_id)
            .ok_or_else(|| anyhow!("Session not found: {}", session_id))?;
        self.launch_locks.remove(session_id);

        if persist_cookies {
            if let Some(path) = self.cookie_file(session_id) {
                match session.cookies().await {
                    Ok(cookies) => {
                        if let Err(e) = save_cookies(&path, &cookies).await {
                            tracing::warn!("Failed to save cookies for {}: {}", session_id, e);
                        }
                    }
                    Err(e) => tracing::warn!("Failed to read cookies for {}: {}", session_id, e),
                }
            }
        }

        session.close().await?;
        tracing::info!("Closed browser session {}", session_id);
        Ok(())
    }
}

pub fn default_cookie_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("browser-autopilot").join("cookies"))
}

/// Cookie file for a session; the id is reduced to filename-safe characters
pub fn cookie_path(dir: &Path, session_id: &str) -> PathBuf {
    let safe: String = session_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    dir.join(format!("{}.json", safe))
}

pub async fn save_cookies(path: &Path, cookies: &[Cookie]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(cookies)?;
    tokio::fs::write(path, json).await?;
    tracing::debug!("Saved {} cookies to {:?}", cookies.len(), path);
    Ok(())
}

/// Missing files yield no cookies
pub async fn load_cookies(path: &Path) -> Result<Vec<Cookie>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}
