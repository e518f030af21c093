//! Payment history model.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a payment came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Initial,
    Manual,
    Auto,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Initial => "initial",
            PaymentType::Manual => "manual",
            PaymentType::Auto => "auto",
        }
    }
}

/// One payment covering `period_start..period_end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub id: String,
    pub date: DateTime<Utc>,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub payment_type: PaymentType,
    #[serde(default)]
    pub note: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}

impl PaymentRecord {
    pub fn new(
        payment_type: PaymentType,
        date: DateTime<Utc>,
        amount: Decimal,
        note: impl Into<String>,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            date,
            amount,
            payment_type,
            note: note.into(),
            period_start,
            period_end,
        }
    }
}

/// Changes an operator may apply to an existing payment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPatch {
    pub date: Option<DateTime<Utc>>,
    pub amount: Option<Decimal>,
    pub note: Option<String>,
}
