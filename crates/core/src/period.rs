use serde::{Deserialize, Serialize};
use std::fmt;

use super::statement::PostedDate;

/// Inclusive date range covered by a set of statement rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodBounds {
    pub start: PostedDate,
    pub end: PostedDate,
}

impl fmt::Display for PeriodBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

impl PeriodBounds {
    fn single(date: PostedDate) -> Self {
        PeriodBounds {
            start: date.clone(),
            end: date,
        }
    }

    /// Widens the range so that it covers `date`.
    fn observe(&mut self, date: &PostedDate) {
        if *date < self.start {
            self.start = date.clone();
        }
        if *date > self.end {
            self.end = date.clone();
        }
    }

    /// Folds a running min/max over `dates`; `None` when there are none.
    pub fn covering<'a, I>(dates: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a PostedDate>,
    {
        let mut iter = dates.into_iter();
        let mut bounds = PeriodBounds::single(iter.next()?.clone());
        for date in iter {
            bounds.observe(date);
        }
        Some(bounds)
    }
}
