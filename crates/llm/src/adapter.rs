use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl Generation {
    pub fn total_tokens(&self) -> u32 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AdapterError {
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
    #[error("provider error: {0}")]
    Provider(String),
}

/// A black-box text generator. Implementations must honour
/// `GenerateRequest::timeout` and report whitespace-only output as a
/// provider error.
#[async_trait]
pub trait AnsweringAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerateRequest) -> Result<Generation, AdapterError>;
}
