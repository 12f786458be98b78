use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(format!("req-{}", hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single user question. Construction is the only validation point: a
/// `Query` that exists always carries non-blank text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    id: RequestId,
    text: String,
    conversation_id: Option<String>,
}

impl Query {
    pub fn new(text: impl Into<String>, conversation_id: Option<String>) -> Result<Self> {
        Self::with_id(RequestId::generate(), text, conversation_id)
    }

    pub fn with_id(
        id: RequestId,
        text: impl Into<String>,
        conversation_id: Option<String>,
    ) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(CoreError::MalformedQuery("query text is empty"));
        }
        if text.chars().any(|c| c == '\0') {
            return Err(CoreError::MalformedQuery("query text contains NUL bytes"));
        }
        let conversation_id = conversation_id.filter(|id| !id.trim().is_empty());
        Ok(Self {
            id,
            text,
            conversation_id,
        })
    }

    pub fn id(&self) -> &RequestId {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }
}
