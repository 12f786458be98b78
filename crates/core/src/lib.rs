mod embedding;
mod error;
mod passage;
mod query;

pub use embedding::{cosine_similarity, HashEmbedder, HashEmbedderConfig};
pub use error::{CoreError, Result};
pub use passage::{passage_size, ContextWindow, PassageCandidate};
pub use query::{Query, RequestId};
