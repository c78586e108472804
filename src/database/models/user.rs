use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Platform roles. Franchisors own franchises; franchisees, brokers and
/// sales staff are scoped to the single franchise on their user row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Franchisor,
    Franchisee,
    Broker,
    Sales,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Franchisor => "franchisor",
            UserRole::Franchisee => "franchisee",
            UserRole::Broker => "broker",
            UserRole::Sales => "sales",
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "franchisor" => Ok(UserRole::Franchisor),
            "franchisee" => Ok(UserRole::Franchisee),
            "broker" => Ok(UserRole::Broker),
            "sales" => Ok(UserRole::Sales),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    pub phone: Option<String>,
    pub avatar_path: Option<String>,
    pub franchise_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn role_round_trips_through_str() {
        for role in [
            UserRole::Admin,
            UserRole::Franchisor,
            UserRole::Franchisee,
            UserRole::Broker,
            UserRole::Sales,
        ] {
            assert_eq!(UserRole::from_str(role.as_str()), Ok(role));
        }
        assert!(UserRole::from_str("superuser").is_err());
    }
}
