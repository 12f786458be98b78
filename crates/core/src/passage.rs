use serde::{Deserialize, Serialize};

/// One retrieved passage with the raw signal scores it was ranked by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassageCandidate {
    pub passage_id: String,
    pub document_id: String,
    pub text: String,
    /// Normalized vector similarity in `[0, 1]`, `None` when the vector signal
    /// did not return this passage.
    pub vector_score: Option<f32>,
    /// Normalized lexical score in `[0, 1]`.
    pub keyword_score: Option<f32>,
    pub metadata_pass: bool,
    pub fused_score: f32,
}

impl PassageCandidate {
    pub fn new(
        passage_id: impl Into<String>,
        document_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            passage_id: passage_id.into(),
            document_id: document_id.into(),
            text: text.into(),
            vector_score: None,
            keyword_score: None,
            metadata_pass: true,
            fused_score: 0.0,
        }
    }

    pub fn size(&self) -> usize {
        passage_size(&self.text)
    }
}

pub fn passage_size(text: &str) -> usize {
    text.chars().count()
}

/// Ordered passages, highest fused score first, whose summed size never
/// exceeds `budget`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextWindow {
    passages: Vec<PassageCandidate>,
    budget: usize,
    used: usize,
}

impl ContextWindow {
    pub fn empty(budget: usize) -> Self {
        Self {
            passages: Vec::new(),
            budget,
            used: 0,
        }
    }

    /// Appends the passage if it fits in the remaining budget. Passages are
    /// never split.
    pub fn try_push(&mut self, passage: PassageCandidate) -> bool {
        let size = passage.size();
        if self.used + size > self.budget {
            return false;
        }
        self.used += size;
        self.passages.push(passage);
        true
    }

    pub fn passages(&self) -> &[PassageCandidate] {
        &self.passages
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn total_size(&self) -> usize {
        self.used
    }

    pub fn passage_ids(&self) -> Vec<String> {
        self.passages.iter().map(|p| p.passage_id.clone()).collect()
    }

    /// Leading passages that fit a smaller budget and passage count.
    pub fn reduced(&self, budget: usize, max_passages: usize) -> ContextWindow {
        let mut window = ContextWindow::empty(budget.min(self.budget));
        for passage in self.passages.iter().take(max_passages) {
            if !window.try_push(passage.clone()) {
                break;
            }
        }
        window
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for passage in &self.passages {
            out.push_str(&format!(
                "[SOURCE: {}, passage {}]\n{}\n\n",
                passage.document_id,
                passage.passage_id,
                passage.text.trim()
            ));
        }
        out
    }
}
