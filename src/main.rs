use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use browser_autopilot::agent::AgentRunner;
use browser_autopilot::api::{create_router, AppState};
use browser_autopilot::browser::SessionPool;
use browser_autopilot::config::{llm_config_from_env, AgentConfig, Config};
use browser_autopilot::llm::LLMClient;

#[derive(Parser)]
#[command(name = "browser-autopilot", about = "Autonomous browser agent and replay sidecar")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API (default)
    Serve,
    /// Run the agent once and print the result as JSON
    Run {
        /// Natural-language goal
        #[arg(long)]
        goal: String,

        /// Page to open before the first step
        #[arg(long)]
        start_url: Option<String>,

        #[arg(long)]
        max_steps: Option<usize>,

        /// Show the browser window
        #[arg(long)]
        headed: bool,

        /// Reuse or name the browser session
        #[arg(long)]
        session_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::Run {
            goal,
            start_url,
            max_steps,
            headed,
            session_id,
        } => run_once(goal, start_url, max_steps, headed, session_id).await,
    }
}

async fn serve() -> Result<()> {
    let config = Config::from_env();
    let sessions = Arc::new(SessionPool::with_default_cookie_dir());
    let state = Arc::new(AppState::new(AgentConfig::from_env(), Arc::clone(&sessions)));
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| anyhow!("Invalid listen address {}:{}: {}", config.host, config.port, e))?;
    tracing::info!("Browser autopilot listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    sessions.close_all().await;
    Ok(())
}

async fn run_once(
    goal: String,
    start_url: Option<String>,
    max_steps: Option<usize>,
    headed: bool,
    session_id: Option<String>,
) -> Result<()> {
    let mut config = AgentConfig::from_env();
    if let Some(steps) = max_steps {
        config.max_steps = steps;
    }
    if headed {
        config.headless = false;
    }

    let client = LLMClient::new(llm_config_from_env()?)?;
    let sessions = Arc::new(SessionPool::with_default_cookie_dir());
    let runner = AgentRunner::new(sessions, Arc::new(client), config);

    let cancel = runner.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling run");
            cancel.cancel();
        }
    });

    let session_id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let result = runner
        .run(&goal, start_url.as_deref(), &session_id, None)
        .await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
