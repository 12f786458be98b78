use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::corpus::Corpus;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassageMeta {
    pub document_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub jurisdiction: Option<String>,
    pub doc_type: Option<String>,
    pub year: Option<u16>,
}

/// Hard filter over passage metadata. Every non-empty clause must hold;
/// an empty spec admits everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    pub required_tags: Vec<String>,
    pub jurisdictions: Vec<String>,
    pub doc_types: Vec<String>,
    pub min_year: Option<u16>,
}

impl FilterSpec {
    pub fn is_empty(&self) -> bool {
        self.required_tags.is_empty()
            && self.jurisdictions.is_empty()
            && self.doc_types.is_empty()
            && self.min_year.is_none()
    }

    pub fn matches(&self, meta: &PassageMeta) -> bool {
        let tags_ok = self
            .required_tags
            .iter()
            .all(|tag| meta.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)));
        let jurisdiction_ok = self.jurisdictions.is_empty()
            || meta
                .jurisdiction
                .as_deref()
                .map(|j| self.jurisdictions.iter().any(|x| x.eq_ignore_ascii_case(j)))
                .unwrap_or(false);
        let doc_type_ok = self.doc_types.is_empty()
            || meta
                .doc_type
                .as_deref()
                .map(|d| self.doc_types.iter().any(|x| x.eq_ignore_ascii_case(d)))
                .unwrap_or(false);
        let year_ok = match self.min_year {
            Some(min) => meta.year.map(|y| y >= min).unwrap_or(false),
            None => true,
        };
        tags_ok && jurisdiction_ok && doc_type_ok && year_ok
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetadataCache {
    entries: FxHashMap<String, PassageMeta>,
}

impl MetadataCache {
    pub fn build(corpus: &Corpus) -> Self {
        let entries = corpus
            .passages()
            .iter()
            .map(|p| {
                (
                    p.passage_id.clone(),
                    PassageMeta {
                        document_id: p.document_id.clone(),
                        tags: p.tags.clone(),
                        jurisdiction: p.jurisdiction.clone(),
                        doc_type: p.doc_type.clone(),
                        year: p.year,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    pub fn eligible(&self, spec: &FilterSpec) -> FxHashSet<String> {
        self.entries
            .iter()
            .filter(|(_, meta)| spec.matches(meta))
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::PassageRecord;

    fn cache() -> MetadataCache {
        let corpus = Corpus::from_records(vec![
            PassageRecord {
                passage_id: "p1".into(),
                document_id: "msmed-act".into(),
                text: "MSMED Act".into(),
                tags: vec!["MSME".into()],
                jurisdiction: Some("IN".into()),
                doc_type: Some("statute".into()),
                year: Some(2006),
                ..Default::default()
            },
            PassageRecord {
                passage_id: "p2".into(),
                document_id: "blog".into(),
                text: "A blog post".into(),
                year: Some(2023),
                ..Default::default()
            },
        ])
        .unwrap();
        MetadataCache::build(&corpus)
    }

    #[test]
    fn tag_filter_is_case_insensitive() {
        let spec = FilterSpec {
            required_tags: vec!["msme".into()],
            ..Default::default()
        };
        let eligible = cache().eligible(&spec);
        assert!(eligible.contains("p1"));
        assert!(!eligible.contains("p2"));
        assert!(!eligible.contains("missing"));
        assert_eq!(eligible.len(), 1);
    }

    #[test]
    fn min_year_requires_a_year() {
        let spec = FilterSpec {
            min_year: Some(2010),
            ..Default::default()
        };
        let eligible = cache().eligible(&spec);
        assert!(!eligible.contains("p1"));
        assert!(eligible.contains("p2"));
    }

    #[test]
    fn empty_filter_admits_everything() {
        assert_eq!(cache().eligible(&FilterSpec::default()).len(), 2);
        assert!(FilterSpec::default().is_empty());
    }
}
