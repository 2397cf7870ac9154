use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create every table and index. Safe to run repeatedly.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // Create user_profiles table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_profiles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            age INTEGER NOT NULL,
            annual_income REAL NOT NULL,
            city TEXT NOT NULL,
            occupation TEXT NOT NULL,
            dependents INTEGER NOT NULL DEFAULT 0,
            risk_profile TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create financial_goals table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS financial_goals (
            goal_id TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL,
            goal_name TEXT NOT NULL,
            target_amount REAL NOT NULL,
            target_date TEXT NOT NULL,
            priority TEXT NOT NULL CHECK (priority IN ('High', 'Medium', 'Low')),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            FOREIGN KEY (user_id) REFERENCES user_profiles(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_financial_goals_user ON financial_goals(user_id, target_date)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
