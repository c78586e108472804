use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "royalty_status", rename_all = "snake_case")]
pub enum RoyaltyStatus {
    Due,
    Invoiced,
    Paid,
}

impl RoyaltyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoyaltyStatus::Due => "due",
            RoyaltyStatus::Invoiced => "invoiced",
            RoyaltyStatus::Paid => "paid",
        }
    }
}

impl std::str::FromStr for RoyaltyStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "due" => Ok(RoyaltyStatus::Due),
            "invoiced" => Ok(RoyaltyStatus::Invoiced),
            "paid" => Ok(RoyaltyStatus::Paid),
            _ => Err(()),
        }
    }
}

/// Periodic fee owed to the franchisor: revenue_total x rate / 100 for the
/// covered period, snapshotted at generation time.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Royalty {
    pub id: Uuid,
    pub franchise_id: Uuid,
    pub unit_id: Option<Uuid>,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub revenue_total: Decimal,
    pub rate: Decimal,
    pub amount: Decimal,
    pub status: RoyaltyStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}
