//! Financial goals attached to a user profile.
//!
//! Goals are keyed by a UUID v4 and deleted with their profile. Dates are
//! stored as `YYYY-MM-DD` text, timestamps as unix seconds.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::fmt;
use std::str::FromStr;

use crate::db::RecordError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        })
    }
}

impl FromStr for Priority {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "High" => Ok(Priority::High),
            "Medium" => Ok(Priority::Medium),
            "Low" => Ok(Priority::Low),
            other => Err(RecordError::Validation(format!(
                "priority must be High, Medium, or Low, got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialGoal {
    pub goal_id: String,
    pub user_id: i64,
    pub goal_name: String,
    pub target_amount: f64,
    pub target_date: NaiveDate,
    pub priority: Priority,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoalInput {
    pub user_id: i64,
    pub goal_name: String,
    pub target_amount: f64,
    pub target_date: NaiveDate,
    pub priority: Priority,
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoalPatch {
    pub goal_name: Option<String>,
    pub target_amount: Option<f64>,
    pub target_date: Option<NaiveDate>,
    pub priority: Option<Priority>,
}

fn check_name(name: &str) -> Result<(), RecordError> {
    if name.trim().is_empty() {
        return Err(RecordError::Validation(
            "goal_name must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn check_amount(amount: f64) -> Result<(), RecordError> {
    if amount <= 0.0 || !amount.is_finite() {
        return Err(RecordError::Validation(
            "target_amount must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn check_date(date: NaiveDate, today: NaiveDate) -> Result<(), RecordError> {
    if date <= today {
        return Err(RecordError::Validation(
            "target_date must be in the future".to_string(),
        ));
    }
    Ok(())
}

impl GoalInput {
    pub fn validate(&self, today: NaiveDate) -> Result<(), RecordError> {
        check_name(&self.goal_name)?;
        check_amount(self.target_amount)?;
        check_date(self.target_date, today)
    }
}

impl GoalPatch {
    /// Validate only the fields being changed.
    pub fn validate(&self, today: NaiveDate) -> Result<(), RecordError> {
        if let Some(name) = &self.goal_name {
            check_name(name)?;
        }
        if let Some(amount) = self.target_amount {
            check_amount(amount)?;
        }
        if let Some(date) = self.target_date {
            check_date(date, today)?;
        }
        Ok(())
    }
}

/// A stored value that no longer parses is a database fault, not bad input.
fn column_error(column: &str, source: impl Into<sqlx::error::BoxDynError>) -> RecordError {
    RecordError::Database(sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: source.into(),
    })
}

fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<FinancialGoal, RecordError> {
    let target_date: String = row.get("target_date");
    let priority: String = row.get("priority");
    Ok(FinancialGoal {
        goal_id: row.get("goal_id"),
        user_id: row.get("user_id"),
        goal_name: row.get("goal_name"),
        target_amount: row.get("target_amount"),
        target_date: NaiveDate::parse_from_str(&target_date, "%Y-%m-%d")
            .map_err(|e| column_error("target_date", e))?,
        priority: priority
            .parse()
            .map_err(|e: RecordError| column_error("priority", e.to_string()))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

async fn ensure_profile(pool: &SqlitePool, user_id: i64) -> Result<(), RecordError> {
    let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM user_profiles WHERE id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    if !exists {
        return Err(RecordError::NotFound(format!("profile {}", user_id)));
    }
    Ok(())
}

pub async fn get_goal(pool: &SqlitePool, goal_id: &str) -> Result<FinancialGoal, RecordError> {
    let row = sqlx::query("SELECT * FROM financial_goals WHERE goal_id = ?")
        .bind(goal_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| RecordError::NotFound(format!("goal {}", goal_id)))?;
    from_row(&row)
}

/// Goals for `user_id`, soonest target first.
pub async fn list_goals(pool: &SqlitePool, user_id: i64) -> Result<Vec<FinancialGoal>, RecordError> {
    ensure_profile(pool, user_id).await?;
    let rows = sqlx::query(
        "SELECT * FROM financial_goals WHERE user_id = ? ORDER BY target_date, created_at, rowid",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(from_row).collect()
}

pub async fn create_goal(
    pool: &SqlitePool,
    input: &GoalInput,
    today: NaiveDate,
) -> Result<FinancialGoal, RecordError> {
    input.validate(today)?;
    ensure_profile(pool, input.user_id).await?;

    let goal_id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO financial_goals
            (goal_id, user_id, goal_name, target_amount, target_date, priority, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&goal_id)
    .bind(input.user_id)
    .bind(input.goal_name.trim())
    .bind(input.target_amount)
    .bind(input.target_date.format("%Y-%m-%d").to_string())
    .bind(input.priority.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    tracing::info!(goal_id = %goal_id, user_id = input.user_id, "goal created");
    get_goal(pool, &goal_id).await
}

pub async fn update_goal(
    pool: &SqlitePool,
    goal_id: &str,
    patch: &GoalPatch,
    today: NaiveDate,
) -> Result<FinancialGoal, RecordError> {
    patch.validate(today)?;

    // Fields absent from the patch keep whatever is stored at write time.
    let result = sqlx::query(
        r#"
        UPDATE financial_goals SET
            goal_name = COALESCE(?, goal_name),
            target_amount = COALESCE(?, target_amount),
            target_date = COALESCE(?, target_date),
            priority = COALESCE(?, priority),
            updated_at = ?
        WHERE goal_id = ?
        "#,
    )
    .bind(patch.goal_name.as_deref().map(str::trim))
    .bind(patch.target_amount)
    .bind(patch.target_date.map(|d| d.format("%Y-%m-%d").to_string()))
    .bind(patch.priority.map(|p| p.to_string()))
    .bind(Utc::now().timestamp())
    .bind(goal_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RecordError::NotFound(format!("goal {}", goal_id)));
    }
    get_goal(pool, goal_id).await
}

pub async fn delete_goal(pool: &SqlitePool, goal_id: &str) -> Result<(), RecordError> {
    let result = sqlx::query("DELETE FROM financial_goals WHERE goal_id = ?")
        .bind(goal_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(RecordError::NotFound(format!("goal {}", goal_id)));
    }
    Ok(())
}
