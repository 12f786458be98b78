use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use asklegal_core::{CoreError, Result};

use crate::config::PrivacyConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiCategory {
    Email,
    IdNumber,
    Phone,
    Account,
    Address,
    Name,
}

impl PiiCategory {
    pub fn placeholder(&self) -> &'static str {
        match self {
            PiiCategory::Email => "[EMAIL]",
            PiiCategory::IdNumber => "[ID_NUMBER]",
            PiiCategory::Phone => "[PHONE]",
            PiiCategory::Account => "[ACCOUNT]",
            PiiCategory::Address => "[ADDRESS]",
            PiiCategory::Name => "[NAME]",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PiiCategory::Email => "email",
            PiiCategory::IdNumber => "id_number",
            PiiCategory::Phone => "phone",
            PiiCategory::Account => "account",
            PiiCategory::Address => "address",
            PiiCategory::Name => "name",
        }
    }
}

impl fmt::Display for PiiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct PiiPattern {
    category: PiiCategory,
    regex: Regex,
}

fn pattern(category: PiiCategory, raw: &str) -> PiiPattern {
    PiiPattern {
        category,
        regex: Regex::new(raw).expect("static pii pattern"),
    }
}

// Listed in priority order; earlier categories win ties on identical spans.
// A capture group 1, when present, narrows the redacted span.
static PII_PATTERNS: Lazy<Vec<PiiPattern>> = Lazy::new(|| {
    vec![
        pattern(
            PiiCategory::Email,
            r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
        ),
        // Aadhaar, PAN, GSTIN
        pattern(PiiCategory::IdNumber, r"\b\d{4}\s?\d{4}\s?\d{4}\b"),
        pattern(PiiCategory::IdNumber, r"\b[A-Z]{5}\d{4}[A-Z]\b"),
        pattern(
            PiiCategory::IdNumber,
            r"\b\d{2}[A-Z]{5}\d{4}[A-Z][A-Z0-9]Z[A-Z0-9]\b",
        ),
        pattern(PiiCategory::Phone, r"(?:\+91[\s-]?|\b)[6-9]\d{9}\b"),
        pattern(PiiCategory::Phone, r"\b\d{3}-\d{3}-\d{4}\b"),
        pattern(PiiCategory::Account, r"\b\d{10,16}\b"),
        pattern(
            PiiCategory::Address,
            r"(?i)\b\d{1,5},?\s+(?:[a-z]+\s+){0,3}(?:road|rd|street|marg|lane|nagar|colony|avenue)\b",
        ),
        pattern(PiiCategory::Address, r"(?i)\bpin\s*(?:code)?\s*[:\-]?\s*\d{6}\b"),
        pattern(
            PiiCategory::Name,
            r"\b(?:Mr|Mrs|Ms|Dr|Shri|Smt)\.?\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)?)\b",
        ),
        pattern(
            PiiCategory::Name,
            r"(?i:\bmy name is)\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)?)\b",
        ),
    ]
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PiiSpan {
    start: usize,
    end: usize,
    priority: usize,
    category: PiiCategory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redaction {
    pub text: String,
    pub categories: Vec<PiiCategory>,
}

/// Replaces every personal-data span with its category placeholder.
/// Overlapping matches resolve to the earliest, then longest, span.
pub fn redact(text: &str) -> Redaction {
    let mut spans = Vec::new();
    for (priority, pii) in PII_PATTERNS.iter().enumerate() {
        for caps in pii.regex.captures_iter(text) {
            let Some(m) = caps.get(1).or_else(|| caps.get(0)) else {
                continue;
            };
            if m.start() == m.end() {
                continue;
            }
            spans.push(PiiSpan {
                start: m.start(),
                end: m.end(),
                priority,
                category: pii.category,
            });
        }
    }
    spans.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then(b.end.cmp(&a.end))
            .then(a.priority.cmp(&b.priority))
    });

    let mut out = String::with_capacity(text.len());
    let mut categories = Vec::new();
    let mut cursor = 0;
    for span in spans {
        if span.start < cursor {
            continue;
        }
        out.push_str(&text[cursor..span.start]);
        out.push_str(span.category.placeholder());
        cursor = span.end;
        if !categories.contains(&span.category) {
            categories.push(span.category);
        }
    }
    out.push_str(&text[cursor..]);
    categories.sort();
    Redaction {
        text: out,
        categories,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensitivity {
    Public,
    Sensitive,
}

impl Sensitivity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sensitivity::Public => "public",
            Sensitivity::Sensitive => "sensitive",
        }
    }
}

impl fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensitivityVerdict {
    pub sensitivity: Sensitivity,
    /// Equal to the query text for PUBLIC queries and for SENSITIVE queries
    /// flagged only by topic.
    pub redacted_text: String,
    pub categories: Vec<PiiCategory>,
    pub topics: Vec<String>,
}

impl SensitivityVerdict {
    pub fn public(text: &str) -> Self {
        Self {
            sensitivity: Sensitivity::Public,
            redacted_text: text.to_string(),
            categories: Vec::new(),
            topics: Vec::new(),
        }
    }

    pub fn is_sensitive(&self) -> bool {
        self.sensitivity == Sensitivity::Sensitive
    }

    /// The only form of the query allowed to leave the process.
    pub fn outbound_text(&self) -> &str {
        &self.redacted_text
    }
}

#[derive(Debug, Clone)]
pub struct PrivacyClassifier {
    topics: Option<Regex>,
}

impl PrivacyClassifier {
    pub fn new(config: &PrivacyConfig) -> Result<Self> {
        let keywords: Vec<String> = config
            .sensitivity_keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(regex::escape)
            .collect();
        let topics = if keywords.is_empty() {
            None
        } else {
            let raw = format!(r"(?i)\b(?:{})\b", keywords.join("|"));
            Some(
                Regex::new(&raw)
                    .map_err(|err| CoreError::Config(format!("sensitivity keywords: {err}")))?,
            )
        };
        Ok(Self { topics })
    }

    pub fn classify(&self, text: &str) -> SensitivityVerdict {
        if text.trim().is_empty() {
            return SensitivityVerdict::public(text);
        }
        let redaction = redact(text);
        let mut topics: Vec<String> = self
            .topics
            .as_ref()
            .map(|re| re.find_iter(text).map(|m| m.as_str().to_lowercase()).collect())
            .unwrap_or_default();
        topics.sort();
        topics.dedup();

        if redaction.categories.is_empty() && topics.is_empty() {
            return SensitivityVerdict::public(text);
        }
        SensitivityVerdict {
            sensitivity: Sensitivity::Sensitive,
            redacted_text: redaction.text,
            categories: redaction.categories,
            topics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> PrivacyClassifier {
        PrivacyClassifier::new(&PrivacyConfig::default()).unwrap()
    }

    #[test]
    fn plain_query_is_public_and_unchanged() {
        let verdict = classifier().classify("What is MSME classification?");
        assert_eq!(verdict.sensitivity, Sensitivity::Public);
        assert_eq!(verdict.redacted_text, "What is MSME classification?");
        assert_eq!(classifier().classify("").sensitivity, Sensitivity::Public);
    }

    #[test]
    fn redacts_each_category() {
        let verdict = classifier().classify(
            "I am Mr. Ravi Kumar, PAN ABCDE1234F, call 9876543210 or mail ravi@example.com",
        );
        assert!(verdict.is_sensitive());
        assert_eq!(
            verdict.redacted_text,
            "I am Mr. [NAME], PAN [ID_NUMBER], call [PHONE] or mail [EMAIL]"
        );
        assert_eq!(
            verdict.categories,
            vec![
                PiiCategory::Email,
                PiiCategory::IdNumber,
                PiiCategory::Phone,
                PiiCategory::Name
            ]
        );
    }

    #[test]
    fn aadhaar_beats_account_on_same_span() {
        let red = redact("aadhaar 1234 5678 9012 and account 123456789012345");
        assert_eq!(red.text, "aadhaar [ID_NUMBER] and account [ACCOUNT]");
    }

    #[test]
    fn address_and_pin() {
        let red = redact("office at 42 MG Road, pin 560001");
        assert_eq!(red.text, "office at [ADDRESS], [ADDRESS]");
        assert_eq!(red.categories, vec![PiiCategory::Address]);
    }

    #[test]
    fn topic_keywords_mark_sensitive_without_substitution() {
        let verdict = classifier().classify("Can my employer start litigation over this?");
        assert!(verdict.is_sensitive());
        assert_eq!(verdict.topics, vec!["litigation".to_string()]);
        assert_eq!(verdict.redacted_text, "Can my employer start litigation over this?");
    }

    #[test]
    fn redaction_is_idempotent() {
        let once = redact("Smt. Lata Devi, 9876543210, 12 Nehru Nagar");
        let twice = redact(&once.text);
        assert_eq!(once.text, twice.text);
        assert!(twice.categories.is_empty());

        let glued = redact("Mr Ravi12 road");
        assert_eq!(redact(&glued.text).text, glued.text);
    }
}
