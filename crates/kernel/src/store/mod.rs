//! Persistence seams.
//!
//! Handlers and capabilities talk to storage through these traits so the
//! whole request pipeline can run against [`MemoryStore`] in tests and
//! [`PgStore`] in production.

mod memory;
mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::access::Principal;
use crate::models::{CreateUser, Happening, NolleGroup, ProfileInput, User, UserProfile};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// User, profile and permission persistence.
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    async fn find_user(&self, id: Uuid) -> anyhow::Result<Option<User>>;

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;

    /// Look up by username, then by email.
    async fn find_by_login(&self, identifier: &str) -> anyhow::Result<Option<User>>;

    /// Assemble the principal for an active user. `None` for unknown or
    /// deactivated accounts.
    async fn load_principal(&self, user_id: Uuid) -> anyhow::Result<Option<Principal>>;

    async fn find_profile(&self, user_id: Uuid) -> anyhow::Result<Option<UserProfile>>;

    async fn list_profiles(&self) -> anyhow::Result<Vec<UserProfile>>;

    /// Create an account together with its profile.
    async fn create_user(
        &self,
        account: CreateUser,
        profile: ProfileInput,
    ) -> anyhow::Result<(User, UserProfile)>;

    async fn update_profile(
        &self,
        user_id: Uuid,
        profile: ProfileInput,
    ) -> anyhow::Result<Option<UserProfile>>;

    async fn delete_user(&self, user_id: Uuid) -> anyhow::Result<bool>;

    async fn touch_login(&self, user_id: Uuid) -> anyhow::Result<()>;

    /// Every nolle group, ordered by name.
    async fn list_nolle_groups(&self) -> anyhow::Result<Vec<NolleGroup>>;

    /// Whether the backing storage answers.
    async fn healthy(&self) -> bool;
}

/// Happening persistence.
#[async_trait]
pub trait HappeningStore: Send + Sync {
    async fn list_happenings(&self) -> anyhow::Result<Vec<Happening>>;

    async fn find_happening(&self, id: Uuid) -> anyhow::Result<Option<Happening>>;

    /// Insert or update.
    async fn save_happening(&self, happening: Happening) -> anyhow::Result<Happening>;

    async fn delete_happening(&self, id: Uuid) -> anyhow::Result<bool>;
}
