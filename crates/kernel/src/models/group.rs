//! Permission groups and nolle groups.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// A permission group. Members inherit every permission granted to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::FromRow)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
}

impl Group {
    /// Groups a user belongs to.
    pub async fn for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>> {
        let groups = sqlx::query_as::<_, Group>(
            r#"
            SELECT g.id, g.name FROM auth_groups g
            JOIN user_groups ug ON ug.group_id = g.id
            WHERE ug.user_id = $1
            ORDER BY g.name
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("failed to fetch user groups")?;

        Ok(groups)
    }
}

/// A nolle group: the group of new students a förfadder is responsible for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct NolleGroup {
    pub id: Uuid,
    pub name: String,
    pub description: String,
}

impl NolleGroup {
    /// All nolle groups, ordered by name.
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>> {
        let groups = sqlx::query_as::<_, NolleGroup>(
            "SELECT id, name, description FROM nolle_groups ORDER BY name",
        )
        .fetch_all(pool)
        .await
        .context("failed to list nolle groups")?;

        Ok(groups)
    }

    /// Ids of the nolle groups `user_id` is listed as förfadder for.
    pub async fn responsible_for(pool: &PgPool, user_id: Uuid) -> Result<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT nolle_group_id FROM nolle_group_forfadders WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("failed to fetch responsible nolle groups")?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
