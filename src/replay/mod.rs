pub mod executor;

pub use executor::{resolve_template, ReplayExecutor, ReplayReport, ReplayStepResult};
