//! Member profiles.
//!
//! Every account has exactly one profile. The profile decides which kind of
//! member the account is (nollan, fadder, förfadder, ...) and drives the
//! object-level visibility rules used by the staff pages.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::access::Principal;
use crate::permissions;

/// Kind of member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[repr(i16)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Fadder = 1,
    Nollan = 2,
    Senior = 3,
    External = 4,
    Admin = 5,
    Forfadder = 6,
}

impl UserType {
    pub fn label(self) -> &'static str {
        match self {
            Self::Fadder => "Fadder",
            Self::Nollan => "Nollan",
            Self::Senior => "Senior",
            Self::External => "Extern",
            Self::Admin => "Administratör",
            Self::Forfadder => "Förfadder",
        }
    }
}

impl FromStr for UserType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.to_lowercase().as_str() {
            "fadder" | "1" => Self::Fadder,
            "nollan" | "2" => Self::Nollan,
            "senior" | "3" => Self::Senior,
            "external" | "extern" | "4" => Self::External,
            "admin" | "5" => Self::Admin,
            "forfadder" | "förfadder" | "6" => Self::Forfadder,
            other => bail!("unknown user type '{other}'"),
        })
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Study program.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[repr(i16)]
#[serde(rename_all = "snake_case")]
pub enum Program {
    #[default]
    None = 0,
    Ctfys = 1,
    Ctmat = 2,
}

/// Profile record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub user_type: UserType,
    pub nolle_group_id: Option<Uuid>,
    pub program: Program,
    pub kth_id: String,
    pub phone_number: String,
    pub food_preference: String,
}

/// Editable profile fields.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileInput {
    pub first_name: String,
    pub last_name: String,
    pub user_type: UserType,
    #[serde(default)]
    pub nolle_group_id: Option<Uuid>,
    #[serde(default)]
    pub program: Program,
    #[serde(default)]
    pub kth_id: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub food_preference: String,
}

impl UserProfile {
    pub fn from_input(user_id: Uuid, input: ProfileInput) -> Self {
        Self {
            user_id,
            first_name: input.first_name,
            last_name: input.last_name,
            user_type: input.user_type,
            nolle_group_id: input.nolle_group_id,
            program: input.program,
            kth_id: input.kth_id,
            phone_number: input.phone_number,
            food_preference: input.food_preference,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn is_nollan(&self) -> bool {
        self.user_type == UserType::Nollan
    }

    pub fn is_fadder(&self) -> bool {
        matches!(self.user_type, UserType::Fadder | UserType::Forfadder)
    }

    pub fn is_forfadder(&self) -> bool {
        self.user_type == UserType::Forfadder
    }

    /// Whether `observer` may edit this profile: their own, or with the
    /// user-editing permission.
    pub fn can_edit(&self, observer: &Principal) -> bool {
        observer.user_id() == Some(self.user_id)
            || observer.has_permission(permissions::EDIT_USERS)
    }

    /// Whether `observer` may see this profile. Förfaddrar see the members
    /// of the nolle groups they are responsible for.
    pub fn can_see(&self, observer: &Principal) -> bool {
        if self.can_edit(observer) || observer.has_permission(permissions::SEE_USERS) {
            return true;
        }
        let forfadder = observer.profile().is_some_and(UserProfile::is_forfadder);
        forfadder
            && self
                .nolle_group_id
                .is_some_and(|group| observer.responsible_groups().contains(&group))
    }

    /// Find the profile of a user.
    pub async fn find(pool: &PgPool, user_id: Uuid) -> Result<Option<Self>> {
        let profile =
            sqlx::query_as::<_, UserProfile>("SELECT * FROM user_profiles WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(pool)
                .await
                .context("failed to fetch profile")?;

        Ok(profile)
    }

    /// All profiles, ordered by name.
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>> {
        let profiles = sqlx::query_as::<_, UserProfile>(
            "SELECT * FROM user_profiles ORDER BY first_name, last_name",
        )
        .fetch_all(pool)
        .await
        .context("failed to list profiles")?;

        Ok(profiles)
    }

    /// Insert or replace a profile.
    pub async fn upsert(pool: &PgPool, profile: &UserProfile) -> Result<Self> {
        let profile = sqlx::query_as::<_, UserProfile>(
            r#"
            INSERT INTO user_profiles
                (user_id, first_name, last_name, user_type, nolle_group_id,
                 program, kth_id, phone_number, food_preference)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (user_id) DO UPDATE SET
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                user_type = EXCLUDED.user_type,
                nolle_group_id = EXCLUDED.nolle_group_id,
                program = EXCLUDED.program,
                kth_id = EXCLUDED.kth_id,
                phone_number = EXCLUDED.phone_number,
                food_preference = EXCLUDED.food_preference
            RETURNING *
            "#,
        )
        .bind(profile.user_id)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(profile.user_type)
        .bind(profile.nolle_group_id)
        .bind(profile.program)
        .bind(&profile.kth_id)
        .bind(&profile.phone_number)
        .bind(&profile.food_preference)
        .fetch_one(pool)
        .await
        .context("failed to save profile")?;

        Ok(profile)
    }
}
