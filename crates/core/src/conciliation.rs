use serde::{Deserialize, Serialize};

use super::money::Money;
use super::statement::StatementTransaction;

/// Credits minus debits.
pub fn statement_net(transactions: &[StatementTransaction]) -> Money {
    transactions.iter().map(StatementTransaction::signed_amount).sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConciliationStatus {
    Balanced,
    Unbalanced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conciliation {
    pub statement_total: Money,
    pub ledger_total: Money,
    /// `statement_total - ledger_total`
    pub difference: Money,
    pub status: ConciliationStatus,
}

impl Conciliation {
    pub fn compare(statement_total: Money, ledger_total: Money) -> Self {
        let difference = Money::from_decimal((statement_total - ledger_total).as_decimal());
        let status = if difference.is_zero() {
            ConciliationStatus::Balanced
        } else {
            ConciliationStatus::Unbalanced
        };
        Conciliation {
            statement_total,
            ledger_total,
            difference,
            status,
        }
    }

    pub fn for_statement(transactions: &[StatementTransaction], ledger_total: Money) -> Self {
        Self::compare(statement_net(transactions), ledger_total)
    }
}
