pub mod client;
pub mod prompts;
pub mod sanitize;

pub use client::{ChatModel, LLMClient, LLMConfig, LLMProvider, PromptMessage, PromptRole};
pub use sanitize::parse_lenient;
