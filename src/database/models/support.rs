use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::task::TaskPriority;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "support_status", rename_all = "snake_case")]
pub enum SupportStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl SupportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupportStatus::Open => "open",
            SupportStatus::InProgress => "in_progress",
            SupportStatus::Resolved => "resolved",
            SupportStatus::Closed => "closed",
        }
    }
}

impl std::str::FromStr for SupportStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(SupportStatus::Open),
            "in_progress" => Ok(SupportStatus::InProgress),
            "resolved" => Ok(SupportStatus::Resolved),
            "closed" => Ok(SupportStatus::Closed),
            _ => Err(()),
        }
    }
}

/// Technical-support ticket opened by any platform user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SupportRequest {
    pub id: Uuid,
    pub opened_by: Uuid,
    pub franchise_id: Option<Uuid>,
    pub subject: String,
    pub body: String,
    pub status: SupportStatus,
    pub priority: TaskPriority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}
