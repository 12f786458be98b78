use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use asklegal_core::{CoreError, Result};

pub const CRORE: i64 = 10_000_000;
pub const LAKH: i64 = 100_000;
pub const THOUSAND: i64 = 1_000;
/// Multiplier for a per-employee `lpa` salary when a headcount is known:
/// "20 employees, 20 lpa salary" books 20 x 20 x 10,000.
pub const LPA_PER_HEAD_UNIT: i64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationKind {
    Tax,
    Gst,
    Salary,
    Loan,
    Profit,
    General,
}

impl CalculationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalculationKind::Tax => "tax",
            CalculationKind::Gst => "gst",
            CalculationKind::Salary => "salary",
            CalculationKind::Loan => "loan",
            CalculationKind::Profit => "profit",
            CalculationKind::General => "general",
        }
    }
}

/// Figures pulled out of a calculation query, all in whole rupees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialFacts {
    pub kind: CalculationKind,
    pub turnover: i64,
    pub headcount: u32,
    pub salary_total: i64,
    pub other_expenses: i64,
}

impl FinancialFacts {
    /// `None` when the expense total does not fit in an `i64`.
    pub fn total_expenses(&self) -> Option<i64> {
        self.salary_total.checked_add(self.other_expenses)
    }

    pub fn validate(&self) -> Result<()> {
        if self.turnover < 0 {
            return Err(CoreError::InvalidFinancialFacts(format!(
                "negative turnover {}",
                self.turnover
            )));
        }
        if self.salary_total < 0 || self.other_expenses < 0 {
            return Err(CoreError::InvalidFinancialFacts(
                "negative expense total".to_string(),
            ));
        }
        if self.headcount == 0 && self.salary_total > 0 {
            return Err(CoreError::InvalidFinancialFacts(format!(
                "salary total {} with zero employees",
                self.salary_total
            )));
        }
        Ok(())
    }
}

const CALC_KEYWORDS: &[&str] = &[
    "calculate",
    "computation",
    "compute",
    "how much",
    "what is the tax",
    "turnover",
    "revenue",
    "expenditure",
    "expenses",
    "profit",
    "salary",
    "cost",
    "amount",
    "tax liability",
    "breakdown",
];

const AMOUNT: &str = r"(?:rs\.?|inr|₹)?\s*(\d[\d,]*(?:\.\d+)?)\s*(crores?|cr|lakhs?|lacs?|lpa|k|thousand)?\b";

fn compile(template: &str) -> Regex {
    Regex::new(&format!("(?i){}", template.replace("{AMOUNT}", AMOUNT)))
        .expect("static calculation pattern")
}

static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d").expect("static digit pattern"));

static TURNOVER: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        compile(r"\b(?:turnover|revenue|sales)\s*(?:of|is|was|:|=)?\s*{AMOUNT}"),
        compile(r"{AMOUNT}\s+(?:annual\s+)?(?:turnover|revenue|sales)\b"),
    ]
});

static HEADCOUNT: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        compile(r"\b(\d[\d,]*)\s+(?:employees?|staff|workers|people)\b"),
        compile(r"\b(?:employees?|staff|headcount|workers)\s*(?:of|is|are|:|=)?\s*(\d[\d,]*)\b"),
    ]
});

static SALARY: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        compile(r"{AMOUNT}\s+(?:salary|salaries|wages|payroll)\b"),
        compile(
            r"\b(?:salary|salaries|wages|payroll)\s*(?:expenditure|expenses?|cost|bill|total)?\s*(?:of|is|are|:|=)?\s*{AMOUNT}",
        ),
    ]
});

static OTHER: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        compile(r"{AMOUNT}\s+(?:resources?|materials?|rent|other\s+expenses?)\b"),
        compile(
            r"\b(?:resources?|materials?|rent|other\s+expenses?)\s*(?:are|is|cost|of|:|=)?\s*{AMOUNT}",
        ),
    ]
});

static REMAINDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:rest|remaining|remainder|balance)\s+(?:is|are|as|goes\s+to|in)?\s*(?:miscellaneous|misc|other)\b",
    )
    .expect("static remainder pattern")
});

/// Classifies a query as a calculation request. Returns `None` when it carries
/// neither a calculation keyword nor any digit.
pub fn detect_calculation(text: &str) -> Option<CalculationKind> {
    let lower = text.to_lowercase();
    let has_keyword = CALC_KEYWORDS.iter().any(|k| lower.contains(k));
    if !has_keyword && !DIGITS.is_match(text) {
        return None;
    }
    let kind = if lower.contains("tax") {
        CalculationKind::Tax
    } else if lower.contains("gst") {
        CalculationKind::Gst
    } else if lower.contains("salary") || lower.contains("employee") {
        CalculationKind::Salary
    } else if lower.contains("loan") || lower.contains("interest") {
        CalculationKind::Loan
    } else if lower.contains("profit") {
        CalculationKind::Profit
    } else {
        CalculationKind::General
    };
    Some(kind)
}

/// Extracts [`FinancialFacts`]. Turnover is the only required figure; without
/// it (or without a calculation intent) extraction yields `None`.
pub fn extract_facts(text: &str) -> Option<FinancialFacts> {
    let kind = detect_calculation(text)?;
    let turnover = first_amount(&TURNOVER, text, None)?;
    let headcount = HEADCOUNT
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| parse_integer(&caps[1]))
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0);
    let per_head = (headcount > 0).then_some(headcount);
    let salary_total = first_amount(&SALARY, text, per_head).unwrap_or(0);
    let other_expenses = first_amount(&OTHER, text, None).unwrap_or(0);

    let mut facts = FinancialFacts {
        kind,
        turnover,
        headcount,
        salary_total,
        other_expenses,
    };
    if REMAINDER.is_match(text) {
        // Totals past the i64 range yield no facts.
        let remainder = turnover.checked_sub(facts.total_expenses()?)?;
        if remainder > 0 {
            facts.other_expenses = facts.other_expenses.checked_add(remainder)?;
        }
    }
    Some(facts)
}

fn first_amount(patterns: &[Regex], text: &str, per_head: Option<u32>) -> Option<i64> {
    patterns
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| amount_from(&caps, per_head))
}

fn amount_from(caps: &Captures<'_>, per_head: Option<u32>) -> Option<i64> {
    let number = caps.get(1)?.as_str();
    let unit = caps.get(2).map(|m| m.as_str().to_lowercase());
    let (multiplier, heads) = match unit.as_deref() {
        Some("crore") | Some("crores") | Some("cr") => (CRORE, 1),
        Some("lakh") | Some("lakhs") | Some("lac") | Some("lacs") => (LAKH, 1),
        Some("lpa") => match per_head {
            Some(heads) => (LPA_PER_HEAD_UNIT, heads as i64),
            None => (LAKH, 1),
        },
        Some("k") | Some("thousand") => (THOUSAND, 1),
        _ => (1, 1),
    };
    scale_decimal(number, multiplier.checked_mul(heads)?)
}

/// Exact `number * multiplier` for a decimal literal, rounded half up to
/// whole rupees.
fn scale_decimal(number: &str, multiplier: i64) -> Option<i64> {
    let cleaned: String = number.chars().filter(|c| *c != ',').collect();
    let (whole, fraction) = match cleaned.split_once('.') {
        Some((w, f)) => (w, f),
        None => (cleaned.as_str(), ""),
    };
    let fraction = &fraction[..fraction.len().min(6)];
    let digits = format!("{whole}{fraction}");
    let scaled: i128 = digits.parse().ok()?;
    let denominator = 10_i128.checked_pow(fraction.len() as u32)?;
    let product = scaled.checked_mul(multiplier as i128)?;
    let rounded = (product + denominator / 2) / denominator;
    i64::try_from(rounded).ok()
}

fn parse_integer(number: &str) -> Option<i64> {
    let cleaned: String = number.chars().filter(|c| *c != ',').collect();
    cleaned.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = "Company with 1 crore turnover, 20 employees, 20 lpa salary, 50 lpa resources. Calculate taxes";

    #[test]
    fn extracts_documented_scenario() {
        let facts = extract_facts(SCENARIO).unwrap();
        assert_eq!(facts.kind, CalculationKind::Tax);
        assert_eq!(facts.turnover, 10_000_000);
        assert_eq!(facts.headcount, 20);
        assert_eq!(facts.salary_total, 4_000_000);
        assert_eq!(facts.other_expenses, 5_000_000);
        facts.validate().unwrap();
    }

    #[test]
    fn no_intent_or_turnover_yields_none() {
        assert!(detect_calculation("What is MSME classification?").is_none());
        assert!(extract_facts("What is MSME classification?").is_none());
        assert!(extract_facts("Calculate tax for 20 employees").is_none());
    }

    #[test]
    fn detects_kinds() {
        assert_eq!(detect_calculation("gst on 5 lakh sales"), Some(CalculationKind::Gst));
        assert_eq!(detect_calculation("interest on a 10 lakh loan"), Some(CalculationKind::Loan));
        assert_eq!(detect_calculation("net profit for 2 cr"), Some(CalculationKind::Profit));
    }

    #[test]
    fn handles_units_and_separators() {
        let facts = extract_facts("Turnover of Rs. 12,50,000 and salary of 3.5 lakh for 2 staff").unwrap();
        assert_eq!(facts.turnover, 1_250_000);
        assert_eq!(facts.headcount, 2);
        assert_eq!(facts.salary_total, 350_000);

        let facts = extract_facts("revenue is ₹2.25 cr, calculate profit").unwrap();
        assert_eq!(facts.turnover, 22_500_000);
    }

    #[test]
    fn lpa_without_headcount_means_lakh() {
        let facts = extract_facts("turnover 1 crore, 20 lpa salary, calculate tax").unwrap();
        assert_eq!(facts.salary_total, 2_000_000);
        assert!(facts.validate().is_err());
    }

    #[test]
    fn remainder_goes_to_other_expenses() {
        let facts = extract_facts(
            "turnover 1 crore, 5 employees, salary of 20 lakh, rest is miscellaneous. Calculate tax",
        )
        .unwrap();
        assert_eq!(facts.salary_total, 2_000_000);
        assert_eq!(facts.other_expenses, 8_000_000);
    }

    #[test]
    fn oversized_amounts_do_not_overflow() {
        let text = "turnover 0, 1 employees, salary of 900000000000 crore, \
                    rent of 900000000000 crore, rest is miscellaneous. Calculate tax";
        assert!(extract_facts(text).is_none());
    }

    #[test]
    fn validation_rejects_bad_facts() {
        let mut facts = extract_facts(SCENARIO).unwrap();
        facts.turnover = -1;
        assert!(matches!(facts.validate(), Err(CoreError::InvalidFinancialFacts(_))));
    }
}
