mod corpus;
mod keyword;
mod metadata;
mod vector;

pub use corpus::{Corpus, JsonlReader, PassageRecord};
pub use keyword::{tokenize, KeywordIndex};
pub use metadata::{FilterSpec, MetadataCache, PassageMeta};
pub use vector::VectorIndex;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPassage {
    pub passage_id: String,
    pub score: f32,
}
