pub mod agent;
pub mod health;
pub mod replay;
pub mod sessions;
