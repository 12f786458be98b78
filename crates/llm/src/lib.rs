mod adapter;
mod client;
mod local;

pub use adapter::{AdapterError, AnsweringAdapter, GenerateRequest, Generation};
pub use client::{LlmClient, LlmProvider};
pub use local::{synthesize_local_answer, CONTEXT_END, CONTEXT_START};
