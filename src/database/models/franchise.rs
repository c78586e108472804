use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A franchise brand owned by a franchisor. Units, leads, financial records
/// and documents all hang off a franchise; royalty_rate is the percentage of
/// unit revenue owed to the franchisor.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Franchise {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub industry: Option<String>,
    pub description: Option<String>,
    pub royalty_rate: Decimal,
    pub logo_path: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}
