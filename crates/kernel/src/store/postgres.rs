//! PostgreSQL-backed stores.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{HappeningStore, PrincipalStore};
use crate::access::Principal;
use crate::db;
use crate::models::{
    CreateUser, Group, Happening, NolleGroup, ProfileInput, User, UserProfile,
};

/// Store backed by the application database.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PrincipalStore for PgStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        User::find_by_id(&self.pool, id).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        User::find_by_username(&self.pool, username).await
    }

    async fn find_by_login(&self, identifier: &str) -> Result<Option<User>> {
        User::find_by_login(&self.pool, identifier).await
    }

    async fn load_principal(&self, user_id: Uuid) -> Result<Option<Principal>> {
        let Some(user) = User::find_by_id(&self.pool, user_id).await? else {
            return Ok(None);
        };
        if !user.is_active {
            return Ok(None);
        }

        let permissions = User::permissions(&self.pool, user.id).await?;
        let groups = Group::for_user(&self.pool, user.id).await?;
        let responsible = NolleGroup::responsible_for(&self.pool, user.id).await?;

        let mut builder = Principal::builder(user.id, user.username)
            .superuser(user.is_superuser)
            .permissions(permissions)
            .groups(groups)
            .responsible_groups(responsible);
        if let Some(profile) = UserProfile::find(&self.pool, user.id).await? {
            builder = builder.profile(profile);
        }

        Ok(Some(builder.build()))
    }

    async fn find_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>> {
        UserProfile::find(&self.pool, user_id).await
    }

    async fn list_profiles(&self) -> Result<Vec<UserProfile>> {
        UserProfile::list(&self.pool).await
    }

    async fn create_user(
        &self,
        account: CreateUser,
        profile: ProfileInput,
    ) -> Result<(User, UserProfile)> {
        let prepared = User::new(&account)?;
        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email, pass, is_active, is_superuser, created)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(prepared.id)
        .bind(&prepared.username)
        .bind(&prepared.email)
        .bind(&prepared.pass)
        .bind(prepared.is_active)
        .bind(prepared.is_superuser)
        .bind(prepared.created)
        .fetch_one(&mut *tx)
        .await
        .context("failed to create user")?;

        let profile = UserProfile::from_input(user.id, profile);
        let profile = sqlx::query_as::<_, UserProfile>(
            r#"
            INSERT INTO user_profiles
                (user_id, first_name, last_name, user_type, nolle_group_id,
                 program, kth_id, phone_number, food_preference)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
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
        .fetch_one(&mut *tx)
        .await
        .context("failed to create profile")?;

        tx.commit().await.context("failed to commit new user")?;
        Ok((user, profile))
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        profile: ProfileInput,
    ) -> Result<Option<UserProfile>> {
        if UserProfile::find(&self.pool, user_id).await?.is_none() {
            return Ok(None);
        }
        let profile = UserProfile::from_input(user_id, profile);
        UserProfile::upsert(&self.pool, &profile).await.map(Some)
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<bool> {
        User::delete(&self.pool, user_id).await
    }

    async fn touch_login(&self, user_id: Uuid) -> Result<()> {
        User::touch_login(&self.pool, user_id).await
    }

    async fn list_nolle_groups(&self) -> Result<Vec<NolleGroup>> {
        NolleGroup::list(&self.pool).await
    }

    async fn healthy(&self) -> bool {
        db::check_health(&self.pool).await
    }
}

#[async_trait]
impl HappeningStore for PgStore {
    async fn list_happenings(&self) -> Result<Vec<Happening>> {
        Happening::list(&self.pool).await
    }

    async fn find_happening(&self, id: Uuid) -> Result<Option<Happening>> {
        Happening::find(&self.pool, id).await
    }

    async fn save_happening(&self, happening: Happening) -> Result<Happening> {
        Happening::save(&self.pool, &happening).await
    }

    async fn delete_happening(&self, id: Uuid) -> Result<bool> {
        Happening::delete(&self.pool, id).await
    }
}
