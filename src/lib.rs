pub mod agent;
pub mod api;
pub mod browser;
pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod replay;
