use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Credit,
    Debit,
}

impl Direction {
    /// Zero counts as a credit; any amount below zero, however small, is a debit.
    pub fn from_signed(amount: Decimal) -> Self {
        if amount.is_sign_negative() && !amount.is_zero() {
            Direction::Debit
        } else {
            Direction::Credit
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Credit => write!(f, "credit"),
            Direction::Debit => write!(f, "debit"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit" => Ok(Direction::Credit),
            "debit" => Ok(Direction::Debit),
            other => Err(format!("Unknown direction: '{other}'")),
        }
    }
}

/// A posting date as `YYYY-MM-DD`, sliced from the 8-digit statement field.
///
/// The slicing does not check the calendar: `20240132` becomes `2024-01-32`.
/// Ordering is lexical, which is chronological for this fixed-width layout.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostedDate(String);

impl PostedDate {
    /// Accepts exactly eight ASCII digits.
    pub fn from_digits(digits: &str) -> Option<Self> {
        if digits.len() != 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(PostedDate(format!(
            "{}-{}-{}",
            &digits[0..4],
            &digits[4..6],
            &digits[6..8]
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `None` for dates that do not exist on the calendar.
    pub fn to_naive_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.0, "%Y-%m-%d").ok()
    }
}

impl fmt::Display for PostedDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StatementTransactionRecord")]
pub struct StatementTransaction {
    pub date: PostedDate,
    pub description: String,
    /// Magnitude only; the sign lives in `direction`.
    pub amount: Money,
    pub direction: Direction,
    pub document_number: Option<String>,
}

impl StatementTransaction {
    /// The direction is read from the unrounded amount; only the magnitude
    /// is rounded to cents.
    pub fn new(
        date: PostedDate,
        description: String,
        signed_amount: Decimal,
        document_number: Option<String>,
    ) -> Self {
        StatementTransaction {
            date,
            description,
            amount: Money::from_decimal(signed_amount.abs()),
            direction: Direction::from_signed(signed_amount),
            document_number,
        }
    }

    pub fn signed_amount(&self) -> Money {
        match self.direction {
            Direction::Credit => self.amount,
            Direction::Debit => Money::zero() - self.amount,
        }
    }
}

/// Wire shape of a statement row; converted so that a negative `amount`
/// cannot enter through deserialization.
#[derive(Deserialize)]
struct StatementTransactionRecord {
    date: PostedDate,
    description: String,
    amount: Money,
    direction: Direction,
    #[serde(default)]
    document_number: Option<String>,
}

impl TryFrom<StatementTransactionRecord> for StatementTransaction {
    type Error = String;

    fn try_from(r: StatementTransactionRecord) -> Result<Self, Self::Error> {
        if r.amount.as_decimal().is_sign_negative() && !r.amount.is_zero() {
            return Err(format!(
                "amount must not be negative, got {}; use direction for the sign",
                r.amount.as_decimal()
            ));
        }
        Ok(StatementTransaction {
            date: r.date,
            description: r.description,
            amount: r.amount,
            direction: r.direction,
            document_number: r.document_number,
        })
    }
}

/// Outcome of the human review of a staged statement row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Promoted,
    Discarded,
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewStatus::Pending => write!(f, "pending"),
            ReviewStatus::Promoted => write!(f, "promoted"),
            ReviewStatus::Discarded => write!(f, "discarded"),
        }
    }
}

impl std::str::FromStr for ReviewStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReviewStatus::Pending),
            "promoted" => Ok(ReviewStatus::Promoted),
            "discarded" => Ok(ReviewStatus::Discarded),
            other => Err(format!("Unknown review status: '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posted_date_slices_eight_digits() {
        let d = PostedDate::from_digits("20240105").unwrap();
        assert_eq!(d.as_str(), "2024-01-05");
        assert_eq!(
            d.to_naive_date(),
            Some(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap())
        );
    }

    #[test]
    fn posted_date_passes_impossible_days_through() {
        let d = PostedDate::from_digits("20240132").unwrap();
        assert_eq!(d.as_str(), "2024-01-32");
        assert_eq!(d.to_naive_date(), None);
    }

    #[test]
    fn posted_date_rejects_wrong_shape() {
        assert!(PostedDate::from_digits("2024015").is_none());
        assert!(PostedDate::from_digits("2024-1-05").is_none());
        assert!(PostedDate::from_digits("").is_none());
    }

    #[test]
    fn posted_dates_order_chronologically() {
        let a = PostedDate::from_digits("20231231").unwrap();
        let b = PostedDate::from_digits("20240105").unwrap();
        assert!(a < b);
    }

    #[test]
    fn new_transaction_splits_sign_from_magnitude() {
        let date = PostedDate::from_digits("20240105").unwrap();
        let debit = StatementTransaction::new(date.clone(), "x".into(), Decimal::new(-15000, 2), None);
        assert_eq!(debit.amount, Money::from_cents(15000));
        assert_eq!(debit.direction, Direction::Debit);
        assert_eq!(debit.signed_amount(), Money::from_cents(-15000));

        let zero = StatementTransaction::new(date, "x".into(), Decimal::ZERO, None);
        assert_eq!(zero.direction, Direction::Credit);
    }

    #[test]
    fn sub_cent_debit_keeps_its_direction() {
        let date = PostedDate::from_digits("20240105").unwrap();
        let t = StatementTransaction::new(date, "x".into(), Decimal::new(-4, 3), None);
        assert_eq!(t.direction, Direction::Debit);
        assert!(t.amount.is_zero());
    }

    #[test]
    fn magnitude_rounds_half_away_from_zero() {
        let date = PostedDate::from_digits("20240105").unwrap();
        let credit = StatementTransaction::new(date.clone(), "x".into(), Decimal::new(10005, 3), None);
        assert_eq!(credit.amount, Money::from_cents(1001));
        let debit = StatementTransaction::new(date, "x".into(), Decimal::new(-10005, 3), None);
        assert_eq!(debit.amount, Money::from_cents(1001));
        assert_eq!(debit.direction, Direction::Debit);
    }

    #[test]
    fn deserializing_rejects_negative_amount() {
        let ok: StatementTransaction = serde_json::from_str(
            r#"{"date":"2024-01-05","description":"x","amount":"5.00","direction":"debit"}"#,
        )
        .unwrap();
        assert_eq!(ok.signed_amount(), Money::from_cents(-500));
        assert!(ok.document_number.is_none());

        let bad = serde_json::from_str::<StatementTransaction>(
            r#"{"date":"2024-01-05","description":"x","amount":"-5.00","direction":"credit"}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn status_strings_round_trip() {
        for s in ["pending", "promoted", "discarded"] {
            assert_eq!(s.parse::<ReviewStatus>().unwrap().to_string(), s);
        }
        assert!("posted".parse::<ReviewStatus>().is_err());
        assert_eq!("debit".parse::<Direction>(), Ok(Direction::Debit));
    }

    #[test]
    fn direction_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Direction::Credit).unwrap(), "\"credit\"");
    }
}
