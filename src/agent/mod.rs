pub mod executor;
pub mod field_inference;
pub mod message_builder;
pub mod navigator;
pub mod planner;
pub mod runner;

pub use executor::{ActionExecutor, ActionResult, BatchOutcome, BatchStop, ExecutorConfig};
pub use navigator::{Navigator, NavigatorRequest, MAX_ACTIONS_CEILING};
pub use planner::Planner;
pub use runner::AgentRunner;
