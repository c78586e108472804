use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "unit_status", rename_all = "snake_case")]
pub enum UnitStatus {
    Pending,
    Active,
    Closed,
}

impl UnitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::Pending => "pending",
            UnitStatus::Active => "active",
            UnitStatus::Closed => "closed",
        }
    }
}

impl std::str::FromStr for UnitStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(UnitStatus::Pending),
            "active" => Ok(UnitStatus::Active),
            "closed" => Ok(UnitStatus::Closed),
            _ => Err(()),
        }
    }
}

/// A physical/operational location belonging to a franchise.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Unit {
    pub id: Uuid,
    pub franchise_id: Uuid,
    pub franchisee_id: Option<Uuid>,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub phone: Option<String>,
    pub opened_on: Option<NaiveDate>,
    pub status: UnitStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}
