//! User accounts and password hashing.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// User account record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub pass: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub created: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Input for creating a user account.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    /// Plain-text password. `None` creates a CAS-only account.
    pub password: Option<String>,
    pub is_superuser: bool,
}

impl User {
    /// Build an in-memory record with a hashed password.
    pub fn new(input: &CreateUser) -> Result<Self> {
        let pass = match &input.password {
            Some(password) => hash_password(password)?,
            None => String::new(),
        };
        Ok(Self {
            id: Uuid::now_v7(),
            username: input.username.clone(),
            email: input.email.clone(),
            pass,
            is_active: true,
            is_superuser: input.is_superuser,
            created: Utc::now(),
            last_login: None,
        })
    }

    /// Find a user by ID.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch user by id")?;

        Ok(user)
    }

    /// Find a user by username.
    pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(pool)
            .await
            .context("failed to fetch user by username")?;

        Ok(user)
    }

    /// Find a user by username or, failing that, by email (case-insensitive).
    pub async fn find_by_login(pool: &PgPool, identifier: &str) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE username = $1 OR (email <> '' AND lower(email) = lower($1))
            ORDER BY (username = $1) DESC
            LIMIT 1
            "#,
        )
        .bind(identifier)
        .fetch_optional(pool)
        .await
        .context("failed to fetch user by login identifier")?;

        Ok(user)
    }

    /// Record a successful login.
    pub async fn touch_login(pool: &PgPool, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .context("failed to update last login")?;

        Ok(())
    }

    /// Delete a user. Profile and memberships cascade.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .context("failed to delete user")?;

        Ok(result.rows_affected() > 0)
    }

    /// Direct permissions plus those inherited through groups.
    pub async fn permissions(pool: &PgPool, id: Uuid) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT permission FROM user_permissions WHERE user_id = $1
            UNION
            SELECT gp.permission FROM group_permissions gp
            JOIN user_groups ug ON ug.group_id = gp.group_id
            WHERE ug.user_id = $1
            "#,
        )
        .bind(id)
        .fetch_all(pool)
        .await
        .context("failed to fetch user permissions")?;

        Ok(rows.into_iter().map(|(p,)| p).collect())
    }

    /// Verify a password against this user's hash.
    ///
    /// Accounts without a password (CAS-only) still pay for one hash
    /// verification so the response time does not reveal them.
    pub fn verify_password(&self, password: &str) -> bool {
        if self.pass.is_empty() {
            dummy_verify(password);
            return false;
        }

        let Ok(parsed_hash) = PasswordHash::new(&self.pass) else {
            dummy_verify(password);
            return false;
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

/// Hash used to burn equivalent time for unknown identifiers.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("nollesystemet-dummy-password").ok());

/// Run one Argon2 verification whose result is thrown away.
pub fn dummy_verify(password: &str) {
    if let Some(hash) = DUMMY_HASH.as_deref()
        && let Ok(parsed) = PasswordHash::new(hash)
    {
        let _ = Argon2::default().verify_password(password.as_bytes(), &parsed);
    }
}

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;

    Ok(hash.to_string())
}
