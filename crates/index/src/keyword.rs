use std::cmp::Ordering;

use rustc_hash::FxHashMap;
use unicode_segmentation::UnicodeSegmentation;

use crate::corpus::Corpus;
use crate::ScoredPassage;

const K1: f32 = 1.2;
const B: f32 = 0.75;

static STOPWORDS: [&str; 24] = [
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "i", "in", "is", "it", "my",
    "of", "on", "or", "the", "to", "what", "which", "with", "do",
];

/// BM25 over lowercased unicode words.
#[derive(Debug, Clone, Default)]
pub struct KeywordIndex {
    ids: Vec<String>,
    lengths: Vec<u32>,
    postings: FxHashMap<String, Vec<(u32, u32)>>,
    avg_len: f32,
}

impl KeywordIndex {
    pub fn build(corpus: &Corpus) -> Self {
        let mut index = Self::default();
        for passage in corpus.passages() {
            let doc = index.ids.len() as u32;
            let terms = tokenize(&passage.text);
            let mut tf: FxHashMap<String, u32> = FxHashMap::default();
            for term in &terms {
                *tf.entry(term.clone()).or_default() += 1;
            }
            for (term, count) in tf {
                index.postings.entry(term).or_default().push((doc, count));
            }
            index.ids.push(passage.passage_id.clone());
            index.lengths.push(terms.len() as u32);
        }
        let total: u64 = index.lengths.iter().map(|l| *l as u64).sum();
        index.avg_len = if index.ids.is_empty() {
            0.0
        } else {
            total as f32 / index.ids.len() as f32
        };
        index
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn search(&self, text: &str, k: usize) -> Vec<ScoredPassage> {
        let n = self.ids.len() as f32;
        let mut scores: FxHashMap<u32, f32> = FxHashMap::default();
        let mut terms = tokenize(text);
        terms.sort();
        terms.dedup();
        for term in &terms {
            let Some(postings) = self.postings.get(term) else {
                continue;
            };
            let df = postings.len() as f32;
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
            for (doc, tf) in postings {
                let tf = *tf as f32;
                let len = self.lengths[*doc as usize] as f32;
                let norm = if self.avg_len > 0.0 {
                    1.0 - B + B * len / self.avg_len
                } else {
                    1.0
                };
                *scores.entry(*doc).or_default() += idf * tf * (K1 + 1.0) / (tf + K1 * norm);
            }
        }
        let mut hits: Vec<ScoredPassage> = scores
            .into_iter()
            .filter(|(_, score)| *score > 0.0)
            .map(|(doc, score)| ScoredPassage {
                passage_id: self.ids[doc as usize].clone(),
                score,
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.passage_id.cmp(&b.passage_id))
        });
        hits.truncate(k);
        hits
    }
}

pub fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words()
        .map(|w| w.to_lowercase())
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::PassageRecord;

    fn index() -> KeywordIndex {
        let texts = [
            ("p1", "Professional tax is levied by the state on every employee."),
            ("p2", "GST registration is mandatory above the turnover threshold."),
            ("p3", "A partnership deed records the profit sharing ratio."),
        ];
        let corpus = Corpus::from_records(
            texts
                .iter()
                .map(|(id, text)| PassageRecord {
                    passage_id: id.to_string(),
                    document_id: id.to_string(),
                    text: text.to_string(),
                    ..Default::default()
                })
                .collect(),
        )
        .unwrap();
        KeywordIndex::build(&corpus)
    }

    #[test]
    fn matching_terms_score_positive() {
        let hits = index().search("GST turnover threshold", 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].passage_id, "p2");
        assert!(hits[0].score > 0.0);
    }

    #[test]
    fn stopwords_alone_match_nothing() {
        assert!(index().search("what is the", 5).is_empty());
    }

    #[test]
    fn tokenizer_lowercases_words() {
        assert_eq!(tokenize("Udyam Registration!"), vec!["udyam", "registration"]);
    }
}
