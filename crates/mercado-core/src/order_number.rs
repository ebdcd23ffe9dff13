//! # Order Numbers
//!
//! Human-facing order identifiers: `YYMMDD` + 4-digit daily sequence.
//!
//! ```text
//! 2610160001   first order of 2026-10-16
//! 2610160002   second order of the same day
//! 2610170001   sequence restarts on the next calendar day
//! ```
//!
//! This module only formats and parses. Allocation of the sequence is done
//! atomically by the store (see `mercado-db`'s order number counter), never by
//! reading the last number and adding one in application code.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult, ValidationError};

/// Highest sequence a single day can issue.
pub const MAX_DAILY_SEQUENCE: u32 = 9999;

const PREFIX_LEN: usize = 6;
const SEQUENCE_LEN: usize = 4;

/// The `YYMMDD` prefix shared by every order number issued on `date`.
pub fn day_prefix(date: NaiveDate) -> String {
    date.format("%y%m%d").to_string()
}

/// A validated order number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderNumber {
    date: NaiveDate,
    sequence: u32,
}

impl OrderNumber {
    /// Builds the number for the `sequence`-th order of `date`.
    ///
    /// ## Errors
    /// `OrderSequenceExhausted` when `sequence` is past [`MAX_DAILY_SEQUENCE`].
    pub fn new(date: NaiveDate, sequence: u32) -> CoreResult<Self> {
        if sequence > MAX_DAILY_SEQUENCE {
            return Err(CoreError::OrderSequenceExhausted {
                day: day_prefix(date),
            });
        }
        if sequence == 0 {
            return Err(ValidationError::MustBePositive {
                field: "order sequence".to_string(),
            }
            .into());
        }
        Ok(OrderNumber { date, sequence })
    }

    /// First order number of `date`.
    pub fn first_of(date: NaiveDate) -> Self {
        OrderNumber { date, sequence: 1 }
    }

    /// The number following `self` on the same day.
    pub fn successor(&self) -> CoreResult<Self> {
        OrderNumber::new(self.date, self.sequence + 1)
    }

    #[inline]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    #[inline]
    pub fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:04}", day_prefix(self.date), self.sequence)
    }
}

impl FromStr for OrderNumber {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "order_number".to_string(),
            reason: reason.to_string(),
        };

        if s.len() != PREFIX_LEN + SEQUENCE_LEN || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("expected 10 digits YYMMDDNNNN"));
        }

        let (prefix, sequence) = s.split_at(PREFIX_LEN);
        let date = NaiveDate::parse_from_str(prefix, "%y%m%d")
            .map_err(|_| invalid("prefix is not a valid YYMMDD date"))?;
        let sequence: u32 = sequence
            .parse()
            .map_err(|_| invalid("sequence is not numeric"))?;
        if sequence == 0 {
            return Err(invalid("sequence starts at 0001"));
        }

        Ok(OrderNumber { date, sequence })
    }
}

impl TryFrom<String> for OrderNumber {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OrderNumber> for String {
    fn from(value: OrderNumber) -> Self {
        value.to_string()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
