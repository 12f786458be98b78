//! Score normalization, weighted fusion, ranking and windowing.

use std::cmp::Ordering;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use asklegal_core::{ContextWindow, PassageCandidate};
use asklegal_index::ScoredPassage;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub vector: f32,
    pub keyword: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            vector: 0.6,
            keyword: 0.4,
        }
    }
}

impl FusionWeights {
    pub fn new(vector: f32, keyword: f32) -> Self {
        Self { vector, keyword }
    }

    /// Moves the weight of a dead signal onto the live one. `None` when
    /// neither ranking signal is live.
    pub fn redistribute(self, vector_live: bool, keyword_live: bool) -> Option<Self> {
        let total = self.vector + self.keyword;
        match (vector_live, keyword_live) {
            (true, true) => Some(self),
            (true, false) => Some(Self::new(total, 0.0)),
            (false, true) => Some(Self::new(0.0, total)),
            (false, false) => None,
        }
    }
}

/// Min-max normalizes one signal's scores to `[0, 1]` within this result set.
/// A set whose scores are all equal maps every entry to `1.0`.
pub fn min_max_normalize(hits: &[ScoredPassage]) -> FxHashMap<String, f32> {
    let finite: Vec<&ScoredPassage> = hits.iter().filter(|h| h.score.is_finite()).collect();
    let (min, max) = finite
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), h| {
            (lo.min(h.score), hi.max(h.score))
        });
    let span = max - min;
    let mut out = FxHashMap::default();
    for hit in finite {
        let value = if span > 0.0 {
            ((hit.score - min) / span).clamp(0.0, 1.0)
        } else {
            1.0
        };
        // Keep the best score if a backend reports a passage twice.
        let entry = out.entry(hit.passage_id.clone()).or_insert(value);
        if value > *entry {
            *entry = value;
        }
    }
    out
}

/// Weighted sum of normalized signals. Failing the metadata filter zeroes the
/// score outright.
pub fn fuse(candidate: &PassageCandidate, weights: FusionWeights) -> f32 {
    if !candidate.metadata_pass {
        return 0.0;
    }
    weights.vector * candidate.vector_score.unwrap_or(0.0)
        + weights.keyword * candidate.keyword_score.unwrap_or(0.0)
}

/// Orders by fused score, then shorter passage, then passage id.
pub fn compare_ranked(a: &PassageCandidate, b: &PassageCandidate) -> Ordering {
    b.fused_score
        .total_cmp(&a.fused_score)
        .then_with(|| a.size().cmp(&b.size()))
        .then_with(|| a.passage_id.cmp(&b.passage_id))
}

pub fn rank(candidates: &mut [PassageCandidate], weights: FusionWeights) {
    for candidate in candidates.iter_mut() {
        candidate.fused_score = fuse(candidate, weights);
    }
    candidates.sort_by(compare_ranked);
}

/// Picks up to `top_k` ranked candidates, one per source document. Only when
/// fewer than `top_k` documents survive the metadata filter are extra passages
/// from already-chosen documents admitted. Filtered-out candidates never
/// survive.
pub fn select(ranked: &[PassageCandidate], top_k: usize) -> Vec<PassageCandidate> {
    let eligible: Vec<&PassageCandidate> = ranked.iter().filter(|c| c.metadata_pass).collect();
    let mut chosen = vec![false; eligible.len()];
    let mut seen_docs: FxHashSet<&str> = FxHashSet::default();
    let mut count = 0;

    for (idx, candidate) in eligible.iter().enumerate() {
        if count == top_k {
            break;
        }
        if seen_docs.insert(candidate.document_id.as_str()) {
            chosen[idx] = true;
            count += 1;
        }
    }
    if count < top_k {
        for flag in chosen.iter_mut() {
            if count == top_k {
                break;
            }
            if !*flag {
                *flag = true;
                count += 1;
            }
        }
    }

    eligible
        .into_iter()
        .zip(chosen)
        .filter(|(_, keep)| *keep)
        .map(|(candidate, _)| candidate.clone())
        .collect()
}

/// Appends passages in order until the first one that would overflow `budget`.
pub fn assemble_window(selected: Vec<PassageCandidate>, budget: usize) -> ContextWindow {
    let mut window = ContextWindow::empty(budget);
    for candidate in selected {
        if !window.try_push(candidate) {
            break;
        }
    }
    window
}
