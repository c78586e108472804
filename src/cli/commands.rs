use anyhow::{bail, Context};

use crate::auth::hash_password;
use crate::database::manager::DatabaseManager;
use crate::database::models::user::UserRole;

pub async fn migrate() -> anyhow::Result<()> {
    DatabaseManager::run_migrations()
        .await
        .context("failed to run migrations")?;
    println!("Migrations applied");
    Ok(())
}

pub async fn health() -> anyhow::Result<()> {
    match DatabaseManager::health_check().await {
        Ok(_) => {
            println!("Database: ok");
            Ok(())
        }
        Err(e) => bail!("Database: unavailable ({e})"),
    }
}

pub async fn create_admin(name: &str, email: &str, password: &str) -> anyhow::Result<()> {
    if password.len() < 8 {
        bail!("Password must be at least 8 characters");
    }

    let pool = DatabaseManager::pool().await?;
    let email = email.trim().to_lowercase();

    let taken: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1 AND deleted_at IS NULL)",
    )
    .bind(&email)
    .fetch_one(&pool)
    .await?;
    if taken {
        bail!("Email {email} is already registered");
    }

    let password_hash =
        hash_password(password).map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;

    let id: uuid::Uuid = sqlx::query_scalar(
        "INSERT INTO users (name, email, password_hash, role) \
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(name.trim())
    .bind(&email)
    .bind(&password_hash)
    .bind(UserRole::Admin)
    .fetch_one(&pool)
    .await?;

    println!("Created admin {email} ({id})");
    Ok(())
}
