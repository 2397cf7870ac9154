//! User profiles: get, create, and full update.

use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

use crate::db::RecordError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub age: i64,
    pub annual_income: f64,
    pub city: String,
    pub occupation: String,
    pub dependents: i64,
    pub risk_profile: String,
}

/// Request body for create and update. Updates replace every field.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileInput {
    pub first_name: String,
    pub last_name: String,
    pub age: i64,
    pub annual_income: f64,
    pub city: String,
    pub occupation: String,
    #[serde(default)]
    pub dependents: i64,
    pub risk_profile: String,
}

impl ProfileInput {
    fn validate(&self) -> Result<(), RecordError> {
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(RecordError::Validation(
                "first_name and last_name must not be empty".to_string(),
            ));
        }
        if self.age < 0 {
            return Err(RecordError::Validation("age must be >= 0".to_string()));
        }
        if self.annual_income < 0.0 || !self.annual_income.is_finite() {
            return Err(RecordError::Validation(
                "annual_income must be >= 0".to_string(),
            ));
        }
        if self.dependents < 0 {
            return Err(RecordError::Validation(
                "dependents must be >= 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn from_row(row: &sqlx::sqlite::SqliteRow) -> UserProfile {
    UserProfile {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        age: row.get("age"),
        annual_income: row.get("annual_income"),
        city: row.get("city"),
        occupation: row.get("occupation"),
        dependents: row.get("dependents"),
        risk_profile: row.get("risk_profile"),
    }
}

pub async fn get_profile(pool: &SqlitePool, id: i64) -> Result<UserProfile, RecordError> {
    let row = sqlx::query("SELECT * FROM user_profiles WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| RecordError::NotFound(format!("profile {}", id)))?;
    Ok(from_row(&row))
}

pub async fn create_profile(
    pool: &SqlitePool,
    input: &ProfileInput,
) -> Result<UserProfile, RecordError> {
    input.validate()?;

    let result = sqlx::query(
        r#"
        INSERT INTO user_profiles
            (first_name, last_name, age, annual_income, city, occupation, dependents, risk_profile)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(input.age)
    .bind(input.annual_income)
    .bind(&input.city)
    .bind(&input.occupation)
    .bind(input.dependents)
    .bind(&input.risk_profile)
    .execute(pool)
    .await?;

    let id = result.last_insert_rowid();
    tracing::info!(profile_id = id, "profile created");
    get_profile(pool, id).await
}

pub async fn update_profile(
    pool: &SqlitePool,
    id: i64,
    input: &ProfileInput,
) -> Result<UserProfile, RecordError> {
    input.validate()?;

    let result = sqlx::query(
        r#"
        UPDATE user_profiles SET
            first_name = ?, last_name = ?, age = ?, annual_income = ?,
            city = ?, occupation = ?, dependents = ?, risk_profile = ?
        WHERE id = ?
        "#,
    )
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(input.age)
    .bind(input.annual_income)
    .bind(&input.city)
    .bind(&input.occupation)
    .bind(input.dependents)
    .bind(&input.risk_profile)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RecordError::NotFound(format!("profile {}", id)));
    }
    get_profile(pool, id).await
}

#[cfg(test)]
pub(crate) fn sample_input() -> ProfileInput {
    ProfileInput {
        first_name: "Asha".to_string(),
        last_name: "Rao".to_string(),
        age: 34,
        annual_income: 85_000.0,
        city: "Pune".to_string(),
        occupation: "Engineer".to_string(),
        dependents: 1,
        risk_profile: "Moderate".to_string(),
    }
}
