//! LLM gateway: concurrency- and rate-limited chat completions over
//! `reqwest`.

pub mod error;
pub mod gateway;
pub mod ratelimit;

pub use error::LlmError;
pub use gateway::{ChatMessage, ChatRequest, ChatResponse, HttpLlmGateway, LlmGateway};
