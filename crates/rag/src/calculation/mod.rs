//! Deterministic extraction and computation for tax-style queries.
//!
//! Every figure is an `i64` rupee amount and every rate is in basis points, so
//! a breakdown depends only on its facts and the rate table version.

mod extract;
mod rates;

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use asklegal_core::{CoreError, Result};

use crate::config::RatesConfig;

pub use extract::{
    detect_calculation, extract_facts, CalculationKind, FinancialFacts, CRORE, LAKH,
    LPA_PER_HEAD_UNIT,
};
pub use rates::{apply_rate, RateTable, TaxBracket, BASIS_POINTS, DEFAULT_RATE_TABLE};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBreakdown {
    pub rate_table_version: String,
    pub kind: CalculationKind,
    pub turnover: i64,
    pub headcount: u32,
    pub salary_total: i64,
    pub other_expenses: i64,
    pub total_expenses: i64,
    pub profit_before_tax: i64,
    pub income_tax_rate_bp: u32,
    pub income_tax: i64,
    pub gst_rate_bp: u32,
    pub gst: i64,
    pub professional_tax: i64,
    pub tds_rate_bp: u32,
    pub tds: i64,
    /// Income tax plus professional tax. GST and TDS are collected on behalf
    /// of others and stay out of this total.
    pub total_direct_tax: i64,
    pub net_profit: i64,
}

impl TaxBreakdown {
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Tax Calculation ({})", self.rate_table_version);
        let _ = writeln!(out);
        let _ = writeln!(out, "## Financial Summary");
        let _ = writeln!(out, "- **Turnover**: {}", format_inr(self.turnover));
        let _ = writeln!(out, "- **Employees**: {}", self.headcount);
        let _ = writeln!(out, "- **Salary Expenditure**: {}", format_inr(self.salary_total));
        let _ = writeln!(out, "- **Other Expenses**: {}", format_inr(self.other_expenses));
        let _ = writeln!(out, "- **Total Expenses**: {}", format_inr(self.total_expenses));
        let _ = writeln!(out, "- **Profit Before Tax**: {}", format_inr(self.profit_before_tax));
        let _ = writeln!(out);
        let _ = writeln!(out, "## Tax Liability");
        let _ = writeln!(
            out,
            "1. **Income Tax** @ {}: {}",
            format_rate(self.income_tax_rate_bp),
            format_inr(self.income_tax)
        );
        let _ = writeln!(
            out,
            "2. **Professional Tax** ({} employees): {}",
            self.headcount,
            format_inr(self.professional_tax)
        );
        let _ = writeln!(
            out,
            "3. **TDS on Salaries** @ {}: {} (deducted from employee salaries)",
            format_rate(self.tds_rate_bp),
            format_inr(self.tds)
        );
        let _ = writeln!(
            out,
            "4. **GST** @ {}: {} (typically passed on to customers)",
            format_rate(self.gst_rate_bp),
            format_inr(self.gst)
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "**Total Direct Tax**: {}", format_inr(self.total_direct_tax));
        let _ = writeln!(out, "**Net Profit After Tax**: {}", format_inr(self.net_profit));
        let _ = writeln!(out);
        let _ = writeln!(out, "## Compliance Reminders");
        let _ = writeln!(out, "- File the income tax return (ITR-6) by 31 October.");
        let _ = writeln!(out, "- File monthly GSTR-1 and GSTR-3B returns.");
        let _ = writeln!(out, "- File quarterly TDS returns (Form 24Q for salaries).");
        let _ = writeln!(out, "- Professional tax rules vary by state.");
        if self.turnover > 10 * CRORE {
            let _ = writeln!(out, "- A tax audit is mandatory above ₹10 crore turnover.");
        }
        let _ = writeln!(out);
        let _ = write!(
            out,
            "This is a simplified calculation; consult a Chartered Accountant before filing."
        );
        out
    }
}

/// Indian digit grouping: `1234567` renders as `₹12,34,567`.
pub fn format_inr(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let sign = if amount < 0 { "-" } else { "" };
    if digits.len() <= 3 {
        return format!("{sign}₹{digits}");
    }
    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut end = head.len();
    while end > 2 {
        groups.push(&head[end - 2..end]);
        end -= 2;
    }
    groups.push(&head[..end]);
    groups.reverse();
    format!("{sign}₹{},{tail}", groups.join(","))
}

fn format_rate(rate_bp: u32) -> String {
    let whole = rate_bp / 100;
    let frac = rate_bp % 100;
    if frac == 0 {
        format!("{whole}%")
    } else {
        format!("{whole}.{frac:02}%")
    }
}

/// Versioned rate tables plus the pure extract/compute pair.
#[derive(Debug, Clone)]
pub struct CalculationEngine {
    tables: BTreeMap<String, RateTable>,
    default_version: String,
}

impl CalculationEngine {
    pub fn new(config: &RatesConfig) -> Result<Self> {
        let mut tables = BTreeMap::new();
        for table in &config.tables {
            table.validate()?;
            if tables.insert(table.version.clone(), table.clone()).is_some() {
                return Err(CoreError::Config(format!(
                    "duplicate rate table version {}",
                    table.version
                )));
            }
        }
        if !tables.contains_key(&config.default_version) {
            return Err(CoreError::UnknownRateTable(config.default_version.clone()));
        }
        Ok(Self {
            tables,
            default_version: config.default_version.clone(),
        })
    }

    pub fn default_version(&self) -> &str {
        &self.default_version
    }

    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn extract(&self, text: &str) -> Option<FinancialFacts> {
        extract_facts(text)
    }

    pub fn compute(&self, facts: &FinancialFacts, version: &str) -> Result<TaxBreakdown> {
        let table = self
            .tables
            .get(version)
            .ok_or_else(|| CoreError::UnknownRateTable(version.to_string()))?;
        facts.validate()?;

        let total_expenses = facts
            .total_expenses()
            .ok_or_else(|| CoreError::InvalidFinancialFacts("expense total overflows".into()))?;
        let profit_before_tax = facts.turnover - total_expenses;
        let income_tax_rate_bp = table.income_tax_rate_bp(facts.turnover);
        // No income tax on a loss.
        let income_tax = apply_rate(profit_before_tax.max(0), income_tax_rate_bp);
        let gst = apply_rate(facts.turnover, table.gst_rate_bp);
        let professional_tax = table
            .professional_tax_per_employee
            .checked_mul(facts.headcount as i64)
            .ok_or_else(|| CoreError::InvalidFinancialFacts("headcount overflows".into()))?;
        let tds = apply_rate(facts.salary_total, table.tds_salary_rate_bp);

        Ok(TaxBreakdown {
            rate_table_version: table.version.clone(),
            kind: facts.kind,
            turnover: facts.turnover,
            headcount: facts.headcount,
            salary_total: facts.salary_total,
            other_expenses: facts.other_expenses,
            total_expenses,
            profit_before_tax,
            income_tax_rate_bp,
            income_tax,
            gst_rate_bp: table.gst_rate_bp,
            gst,
            professional_tax,
            tds_rate_bp: table.tds_salary_rate_bp,
            tds,
            total_direct_tax: income_tax + professional_tax,
            net_profit: profit_before_tax - income_tax,
        })
    }
}
