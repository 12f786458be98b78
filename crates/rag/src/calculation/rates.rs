use serde::{Deserialize, Serialize};

use asklegal_core::{CoreError, Result};

pub const BASIS_POINTS: u32 = 10_000;
pub const DEFAULT_RATE_TABLE: &str = "FY2024-25";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBracket {
    /// Inclusive turnover ceiling in rupees; `None` closes the table.
    pub turnover_upto: Option<i64>,
    pub rate_bp: u32,
}

/// One financial year's rates. Amounts are whole rupees and rates are basis
/// points so every computation stays in integer arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateTable {
    pub version: String,
    pub income_tax_brackets: Vec<TaxBracket>,
    pub gst_rate_bp: u32,
    pub professional_tax_per_employee: i64,
    pub tds_salary_rate_bp: u32,
}

impl RateTable {
    pub fn fy2024_25() -> Self {
        Self {
            version: DEFAULT_RATE_TABLE.to_string(),
            income_tax_brackets: vec![
                TaxBracket {
                    turnover_upto: Some(4_000_000_000),
                    rate_bp: 2_500,
                },
                TaxBracket {
                    turnover_upto: None,
                    rate_bp: 3_000,
                },
            ],
            gst_rate_bp: 1_800,
            professional_tax_per_employee: 2_500,
            tds_salary_rate_bp: 1_000,
        }
    }

    pub fn income_tax_rate_bp(&self, turnover: i64) -> u32 {
        self.income_tax_brackets
            .iter()
            .find(|b| b.turnover_upto.map(|ceiling| turnover <= ceiling).unwrap_or(true))
            .map(|b| b.rate_bp)
            .unwrap_or(0)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| CoreError::Config(format!("rate table {}: {msg}", self.version));
        if self.version.trim().is_empty() {
            return Err(CoreError::Config("rate table with empty version".to_string()));
        }
        if self.income_tax_brackets.is_empty() {
            return Err(invalid("no income tax brackets"));
        }
        let mut previous: Option<i64> = None;
        for (idx, bracket) in self.income_tax_brackets.iter().enumerate() {
            let last = idx + 1 == self.income_tax_brackets.len();
            match (bracket.turnover_upto, last) {
                (None, false) => return Err(invalid("open bracket before the last one")),
                (Some(_), true) => return Err(invalid("last bracket must be open-ended")),
                (Some(ceiling), false) => {
                    if previous.map(|p| ceiling <= p).unwrap_or(false) || ceiling < 0 {
                        return Err(invalid("bracket ceilings must increase"));
                    }
                    previous = Some(ceiling);
                }
                (None, true) => {}
            }
            if bracket.rate_bp > BASIS_POINTS {
                return Err(invalid("income tax rate above 100%"));
            }
        }
        if self.gst_rate_bp > BASIS_POINTS || self.tds_salary_rate_bp > BASIS_POINTS {
            return Err(invalid("flat rate above 100%"));
        }
        if self.professional_tax_per_employee < 0 {
            return Err(invalid("negative professional tax"));
        }
        Ok(())
    }
}

/// `amount * rate_bp / 10_000`, rounded half away from zero.
pub fn apply_rate(amount: i64, rate_bp: u32) -> i64 {
    let scaled = amount as i128 * rate_bp as i128;
    let half = BASIS_POINTS as i128 / 2;
    let rounded = if scaled >= 0 {
        (scaled + half) / BASIS_POINTS as i128
    } else {
        (scaled - half) / BASIS_POINTS as i128
    };
    rounded as i64
}
