use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

const LENGTH_SATURATION: f32 = 200.0;

const LENGTH_WEIGHT: f32 = 0.3;
const ANALYTICAL_WEIGHT: f32 = 0.3;
const LEGAL_WEIGHT: f32 = 0.25;
const NUMERIC_WEIGHT: f32 = 0.15;

const ANALYTICAL_KEYWORDS: &[&str] = &[
    "analyze",
    "analyse",
    "evaluate",
    "compare",
    "detailed",
    "comprehensive",
    "complex",
    "intricate",
    "nuanced",
    "interpret",
    "assess",
    "implications",
    "difference between",
    "pros and cons",
];

const LEGAL_KEYWORDS: &[&str] = &[
    "contract",
    "litigation",
    "compliance",
    "regulation",
    "jurisdiction",
    "precedent",
    "statute",
    "tort",
    "liability",
    "damages",
    "arbitration",
    "indemnity",
];

static NUMERIC_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\d[\d,]*(?:\.\d+)?%?|₹|\b(?:rs|inr|crores?|lakhs?|lpa|rupees?|gst|tds|tax(?:es)?|salary|turnover|revenue|profit|loan|interest)\b",
    )
    .expect("static numeric token pattern")
});

/// Query complexity in `[0, 1]` with the components it was built from.
/// A pure function of the query text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComplexityScore {
    pub value: f32,
    pub length: f32,
    pub analytical: f32,
    pub legal: f32,
    pub numeric: f32,
}

impl ComplexityScore {
    pub fn of(text: &str) -> Self {
        let lower = text.to_lowercase();
        let length = (text.chars().count() as f32 / LENGTH_SATURATION).min(1.0);
        let analytical = keyword_factor(&lower, ANALYTICAL_KEYWORDS, 2.0);
        let legal = keyword_factor(&lower, LEGAL_KEYWORDS, 3.0);
        let numeric = (NUMERIC_TOKEN.find_iter(text).count() as f32 / 3.0).min(1.0);
        let value = (length * LENGTH_WEIGHT
            + analytical * ANALYTICAL_WEIGHT
            + legal * LEGAL_WEIGHT
            + numeric * NUMERIC_WEIGHT)
            .clamp(0.0, 1.0);
        Self {
            value,
            length,
            analytical,
            legal,
            numeric,
        }
    }

    pub fn exceeds(&self, threshold: f32) -> bool {
        self.value >= threshold
    }
}

fn keyword_factor(lower: &str, keywords: &[&str], saturation: f32) -> f32 {
    let hits = keywords.iter().filter(|k| lower.contains(*k)).count();
    (hits as f32 / saturation).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_definition_question_is_simple() {
        let score = ComplexityScore::of("What is MSME classification?");
        assert_eq!(score.numeric, 0.0);
        assert_eq!(score.analytical, 0.0);
        assert!(!score.exceeds(0.6));
    }

    #[test]
    fn long_analytical_legal_question_is_complex() {
        let text = "Please analyze and compare the liability and indemnity clauses in this \
                    vendor contract, evaluate compliance with the relevant regulation, and \
                    assess the damages exposure if the supplier breaches delivery timelines \
                    for an order worth 50 lakh rupees.";
        let score = ComplexityScore::of(text);
        assert_eq!(score.analytical, 1.0);
        assert_eq!(score.legal, 1.0);
        assert!(score.exceeds(0.6));
    }

    #[test]
    fn score_is_bounded_and_pure() {
        let text = "contract ".repeat(100);
        let a = ComplexityScore::of(&text);
        let b = ComplexityScore::of(&text);
        assert_eq!(a, b);
        assert!(a.value <= 1.0);
    }
}
