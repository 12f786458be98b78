use std::cmp::Ordering;

use anyhow::{anyhow, Result};
use asklegal_core::cosine_similarity;

use crate::corpus::Corpus;
use crate::ScoredPassage;

/// Exhaustive cosine search over precomputed passage embeddings.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    ids: Vec<String>,
    vectors: Vec<Vec<f32>>,
    dimensions: usize,
}

impl VectorIndex {
    pub fn build<F>(corpus: &Corpus, mut embed: F) -> Result<Self>
    where
        F: FnMut(&str) -> Result<Vec<f32>>,
    {
        let mut index = Self::default();
        for passage in corpus.passages() {
            let vector = embed(&passage.text)?;
            index.insert(passage.passage_id.clone(), vector)?;
        }
        Ok(index)
    }

    pub fn insert(&mut self, passage_id: String, vector: Vec<f32>) -> Result<()> {
        if self.dimensions == 0 {
            self.dimensions = vector.len();
        } else if vector.len() != self.dimensions {
            return Err(anyhow!(
                "embedding for {passage_id} has {} dimensions, index expects {}",
                vector.len(),
                self.dimensions
            ));
        }
        self.ids.push(passage_id);
        self.vectors.push(vector);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredPassage>> {
        if !self.is_empty() && query.len() != self.dimensions {
            return Err(anyhow!(
                "query embedding has {} dimensions, index expects {}",
                query.len(),
                self.dimensions
            ));
        }
        let mut hits: Vec<ScoredPassage> = self
            .ids
            .iter()
            .zip(self.vectors.iter())
            .map(|(id, vector)| ScoredPassage {
                passage_id: id.clone(),
                score: cosine_similarity(query, vector),
            })
            .filter(|hit| hit.score > 0.0)
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.passage_id.cmp(&b.passage_id))
        });
        hits.truncate(k);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::PassageRecord;
    use asklegal_core::HashEmbedder;

    fn corpus() -> Corpus {
        let texts = [
            ("p1", "GST registration threshold for service providers"),
            ("p2", "Udyam registration for micro small and medium enterprises"),
            ("p3", "Notice period under the employment contract"),
        ];
        Corpus::from_records(
            texts
                .iter()
                .map(|(id, text)| PassageRecord {
                    passage_id: id.to_string(),
                    document_id: format!("doc-{id}"),
                    text: text.to_string(),
                    ..Default::default()
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn nearest_passage_ranks_first() {
        let embedder = HashEmbedder::default();
        let index = VectorIndex::build(&corpus(), |t| Ok(embedder.embed_text(t))).unwrap();
        let hits = index
            .search(&embedder.embed_text("udyam registration enterprises"), 2)
            .unwrap();
        assert_eq!(hits[0].passage_id, "p2");
        assert!(hits.len() <= 2);
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        let mut index = VectorIndex::default();
        index.insert("p1".into(), vec![1.0, 0.0]).unwrap();
        assert!(index.insert("p2".into(), vec![1.0]).is_err());
        assert!(index.search(&[1.0, 0.0, 0.0], 1).is_err());
    }
}
