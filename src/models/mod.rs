pub mod action;
pub mod agent_output;
pub mod history;
pub mod replay_action;
pub mod requests;
pub mod responses;
pub mod resume;
pub mod run_result;

pub use action::*;
pub use agent_output::*;
pub use history::*;
pub use replay_action::*;
pub use requests::*;
pub use responses::*;
pub use resume::*;
pub use run_result::*;
