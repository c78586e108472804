use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Verification lifecycle for a reported revenue figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "revenue_status", rename_all = "snake_case")]
pub enum RevenueStatus {
    Pending,
    Verified,
    Disputed,
}

impl RevenueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevenueStatus::Pending => "pending",
            RevenueStatus::Verified => "verified",
            RevenueStatus::Disputed => "disputed",
        }
    }
}

impl std::str::FromStr for RevenueStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RevenueStatus::Pending),
            "verified" => Ok(RevenueStatus::Verified),
            "disputed" => Ok(RevenueStatus::Disputed),
            _ => Err(()),
        }
    }
}

/// Money reported in by a unit. Only verified revenues enter royalty runs.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Revenue {
    pub id: Uuid,
    pub franchise_id: Uuid,
    pub unit_id: Uuid,
    pub amount: Decimal,
    pub category: Option<String>,
    pub status: RevenueStatus,
    pub occurred_on: NaiveDate,
    pub reported_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}
