//! Happenings (events) managed from fohseriet.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Happening record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Happening {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub takes_registration: bool,
    pub external_registration: bool,
    pub created: DateTime<Utc>,
}

/// Input for creating or updating a happening.
#[derive(Debug, Clone, Deserialize)]
pub struct HappeningInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub takes_registration: bool,
    #[serde(default)]
    pub external_registration: bool,
}

/// Longest accepted name.
pub const MAX_NAME_LEN: usize = 50;

/// Longest accepted description.
pub const MAX_DESCRIPTION_LEN: usize = 300;

impl HappeningInput {
    /// Field-level validation. Returns a message per failed field.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push("name is required".to_string());
        }
        if self.name.chars().count() > MAX_NAME_LEN {
            errors.push(format!("name must be at most {MAX_NAME_LEN} characters"));
        }
        if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            errors.push(format!(
                "description must be at most {MAX_DESCRIPTION_LEN} characters"
            ));
        }
        if self.end_time < self.start_time {
            errors.push("end time is before start time".to_string());
        }
        errors
    }
}

impl Happening {
    pub fn new(input: HappeningInput) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: input.name,
            description: input.description,
            start_time: input.start_time,
            end_time: input.end_time,
            takes_registration: input.takes_registration,
            external_registration: input.external_registration,
            created: Utc::now(),
        }
    }

    pub fn apply(&mut self, input: HappeningInput) {
        self.name = input.name;
        self.description = input.description;
        self.start_time = input.start_time;
        self.end_time = input.end_time;
        self.takes_registration = input.takes_registration;
        self.external_registration = input.external_registration;
    }

    pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let happening = sqlx::query_as::<_, Happening>("SELECT * FROM happenings WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch happening")?;

        Ok(happening)
    }

    /// All happenings, soonest first.
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>> {
        let happenings =
            sqlx::query_as::<_, Happening>("SELECT * FROM happenings ORDER BY start_time")
                .fetch_all(pool)
                .await
                .context("failed to list happenings")?;

        Ok(happenings)
    }

    /// Insert or update.
    pub async fn save(pool: &PgPool, happening: &Happening) -> Result<Self> {
        let saved = sqlx::query_as::<_, Happening>(
            r#"
            INSERT INTO happenings
                (id, name, description, start_time, end_time,
                 takes_registration, external_registration, created)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                start_time = EXCLUDED.start_time,
                end_time = EXCLUDED.end_time,
                takes_registration = EXCLUDED.takes_registration,
                external_registration = EXCLUDED.external_registration
            RETURNING *
            "#,
        )
        .bind(happening.id)
        .bind(&happening.name)
        .bind(&happening.description)
        .bind(happening.start_time)
        .bind(happening.end_time)
        .bind(happening.takes_registration)
        .bind(happening.external_registration)
        .bind(happening.created)
        .fetch_one(pool)
        .await
        .context("failed to save happening")?;

        Ok(saved)
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM happenings WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .context("failed to delete happening")?;

        Ok(result.rows_affected() > 0)
    }
}
