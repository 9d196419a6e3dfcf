use serde::{Deserialize, Serialize};

use super::money::Money;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayrollEntry {
    pub employee: String,
    pub base_salary: Money,
    #[serde(default)]
    pub benefits: Money,
    #[serde(default)]
    pub bonuses: Money,
    #[serde(default)]
    pub deductions: Money,
}

impl PayrollEntry {
    pub fn gross(&self) -> Money {
        self.base_salary + self.benefits + self.bonuses
    }

    pub fn net(&self) -> Money {
        self.gross() - self.deductions
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayrollSummary {
    pub headcount: usize,
    pub total_gross: Money,
    pub total_deductions: Money,
    pub total_net: Money,
}

impl PayrollSummary {
    pub fn from_entries(entries: &[PayrollEntry]) -> Self {
        PayrollSummary {
            headcount: entries.len(),
            total_gross: entries.iter().map(PayrollEntry::gross).sum(),
            total_deductions: entries.iter().map(|e| e.deductions).sum(),
            total_net: entries.iter().map(PayrollEntry::net).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, base: i64, benefits: i64, bonuses: i64, deductions: i64) -> PayrollEntry {
        PayrollEntry {
            employee: name.to_string(),
            base_salary: Money::from_cents(base),
            benefits: Money::from_cents(benefits),
            bonuses: Money::from_cents(bonuses),
            deductions: Money::from_cents(deductions),
        }
    }

    #[test]
    fn gross_and_net_per_entry() {
        let e = entry("Ana", 500_000, 60_000, 25_000, 90_000);
        assert_eq!(e.gross(), Money::from_cents(585_000));
        assert_eq!(e.net(), Money::from_cents(495_000));
    }

    #[test]
    fn summary_totals_all_entries() {
        let entries = vec![
            entry("Ana", 500_000, 60_000, 25_000, 90_000),
            entry("Bruno", 320_000, 40_000, 0, 35_000),
        ];
        let s = PayrollSummary::from_entries(&entries);
        assert_eq!(s.headcount, 2);
        assert_eq!(s.total_gross, Money::from_cents(945_000));
        assert_eq!(s.total_deductions, Money::from_cents(125_000));
        assert_eq!(s.total_net, Money::from_cents(820_000));
    }

    #[test]
    fn empty_payroll_is_zero() {
        let s = PayrollSummary::from_entries(&[]);
        assert_eq!(s.headcount, 0);
        assert!(s.total_net.is_zero());
    }

    #[test]
    fn optional_components_default_to_zero() {
        let e: PayrollEntry =
            serde_json::from_str(r#"{"employee":"Caio","base_salary":"2500.00"}"#).unwrap();
        assert_eq!(e.net(), Money::from_cents(250_000));
    }
}
