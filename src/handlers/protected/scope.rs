//! Tenant scoping shared by every protected resource handler.
//!
//! Rules: a franchise the caller cannot resolve at all answers 404; a record
//! reachable by URL whose franchise falls outside the caller's scope answers
//! 403. Applied uniformly across resources.

use sqlx::PgPool;
use uuid::Uuid;

use crate::database::models::franchise::Franchise;
use crate::database::models::user::UserRole;
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::query::SelectQuery;

/// The set of franchises the caller may touch.
#[derive(Debug, Clone)]
pub enum Scope {
    /// Admins see every tenant.
    All,
    /// Everyone else sees an explicit franchise list (possibly empty).
    Franchises(Vec<Uuid>),
}

impl Scope {
    pub fn contains(&self, franchise_id: Uuid) -> bool {
        match self {
            Scope::All => true,
            Scope::Franchises(ids) => ids.contains(&franchise_id),
        }
    }

    /// Scope filter for aggregate queries: `None` = unrestricted.
    pub fn ids(&self) -> Option<Vec<Uuid>> {
        match self {
            Scope::All => None,
            Scope::Franchises(ids) => Some(ids.clone()),
        }
    }

    /// Constrain a list query's tenant column to this scope.
    pub fn apply(&self, query: &mut SelectQuery, column: &'static str) {
        if let Scope::Franchises(ids) = self {
            query.and_any_uuid(column, ids.clone());
        }
    }
}

/// Resolve the caller's franchise scope.
///
/// Franchisors own franchises by `owner_id`; franchisees, brokers and sales
/// staff carry a single `franchise_id` on their user row.
pub async fn resolve_scope(pool: &PgPool, auth: &AuthUser) -> Result<Scope, ApiError> {
    match auth.role {
        UserRole::Admin => Ok(Scope::All),
        UserRole::Franchisor => {
            let ids: Vec<Uuid> = sqlx::query_scalar(
                "SELECT id FROM franchises WHERE owner_id = $1 AND deleted_at IS NULL",
            )
            .bind(auth.user_id)
            .fetch_all(pool)
            .await?;
            Ok(Scope::Franchises(ids))
        }
        UserRole::Franchisee | UserRole::Broker | UserRole::Sales => {
            Ok(Scope::Franchises(auth.franchise_id.into_iter().collect()))
        }
    }
}

/// Fetch a franchise the caller is allowed to act on: 404 when it does not
/// exist, 403 when it exists outside the caller's scope.
pub async fn require_franchise(
    pool: &PgPool,
    scope: &Scope,
    franchise_id: Uuid,
) -> Result<Franchise, ApiError> {
    let franchise: Option<Franchise> =
        sqlx::query_as("SELECT * FROM franchises WHERE id = $1 AND deleted_at IS NULL")
            .bind(franchise_id)
            .fetch_optional(pool)
            .await?;

    let franchise = franchise.ok_or_else(|| ApiError::not_found("Franchise not found"))?;
    ensure_in_scope(scope, franchise.id)?;
    Ok(franchise)
}

/// 403 unless the franchise is inside the caller's scope.
pub fn ensure_in_scope(scope: &Scope, franchise_id: Uuid) -> Result<(), ApiError> {
    if scope.contains(franchise_id) {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "You do not have access to this franchise",
        ))
    }
}

/// Resolve the franchise a create/import targets: the explicit id when
/// given, else the caller's only franchise. Existence and access are checked
/// separately via [`require_franchise`].
pub fn target_franchise(scope: &Scope, provided: Option<Uuid>) -> Result<Uuid, ApiError> {
    match provided {
        Some(id) => Ok(id),
        None => match scope {
            Scope::Franchises(ids) if ids.len() == 1 => Ok(ids[0]),
            _ => Err(ApiError::bad_request("franchise_id is required")),
        },
    }
}

/// 403 unless the caller holds one of the given roles.
pub fn require_role(auth: &AuthUser, allowed: &[UserRole]) -> Result<(), ApiError> {
    if allowed.contains(&auth.role) {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "Your role does not permit this operation",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_scope_contains_everything() {
        let scope = Scope::All;
        assert!(scope.contains(Uuid::new_v4()));
        assert!(scope.ids().is_none());
    }

    #[test]
    fn franchise_scope_is_exact() {
        let mine = Uuid::new_v4();
        let scope = Scope::Franchises(vec![mine]);
        assert!(scope.contains(mine));
        assert!(!scope.contains(Uuid::new_v4()));
        assert!(ensure_in_scope(&scope, Uuid::new_v4()).is_err());
    }

    #[test]
    fn empty_scope_matches_nothing_in_sql() {
        let scope = Scope::Franchises(vec![]);
        let mut q = SelectQuery::new("leads");
        scope.apply(&mut q, "franchise_id");
        assert!(q.select_sql().contains("\"franchise_id\" = ANY($1)"));
    }

    #[test]
    fn role_gate_returns_forbidden() {
        let auth = AuthUser {
            user_id: Uuid::new_v4(),
            name: "Broker".to_string(),
            role: UserRole::Broker,
            franchise_id: None,
        };
        assert!(require_role(&auth, &[UserRole::Admin, UserRole::Franchisor]).is_err());
        assert!(require_role(&auth, &[UserRole::Broker]).is_ok());
    }
}
