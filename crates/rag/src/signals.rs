//! Async seams for the retrieval collaborators. The in-process indices from
//! `asklegal_index` implement them directly; remote backends plug in the same way.

use anyhow::Result;
use async_trait::async_trait;
use rustc_hash::FxHashSet;

use asklegal_core::HashEmbedder;
use asklegal_index::{FilterSpec, KeywordIndex, MetadataCache, ScoredPassage, VectorIndex};

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// True when embedding sends text off the machine.
    fn is_remote(&self) -> bool {
        false
    }
}

#[async_trait]
pub trait VectorSearch: Send + Sync {
    async fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredPassage>>;
}

#[async_trait]
pub trait KeywordSearch: Send + Sync {
    async fn search(&self, text: &str, k: usize) -> Result<Vec<ScoredPassage>>;
}

#[async_trait]
pub trait MetadataFilter: Send + Sync {
    /// Every passage id admitted by `spec`.
    async fn eligible(&self, spec: &FilterSpec) -> Result<FxHashSet<String>>;
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }
}

#[async_trait]
impl VectorSearch for VectorIndex {
    async fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredPassage>> {
        VectorIndex::search(self, embedding, k)
    }
}

#[async_trait]
impl KeywordSearch for KeywordIndex {
    async fn search(&self, text: &str, k: usize) -> Result<Vec<ScoredPassage>> {
        Ok(KeywordIndex::search(self, text, k))
    }
}

#[async_trait]
impl MetadataFilter for MetadataCache {
    async fn eligible(&self, spec: &FilterSpec) -> Result<FxHashSet<String>> {
        Ok(MetadataCache::eligible(self, spec))
    }
}
