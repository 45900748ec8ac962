//! Capabilities registered at startup.

use std::sync::Arc;

use async_trait::async_trait;

use super::capability::{Capability, CapabilityRegistry};
use super::principal::Principal;
use crate::models::UserProfile;
use crate::permissions;
use crate::store::PrincipalStore;

pub const CAN_CREATE: &str = "nollesystemet.UserProfile.can_create";
pub const CAN_EDIT_GROUPS: &str = "nollesystemet.UserProfile.can_edit_groups";
pub const CAN_SEE_SOME_USER: &str = "nollesystemet.UserProfile.can_see_some_user";
pub const CAN_EDIT_SOME_USER: &str = "nollesystemet.UserProfile.can_edit_some_user";
pub const IS_NOLLAN: &str = "nollesystemet.UserProfile.is_nollan";
pub const IS_FADDER: &str = "nollesystemet.UserProfile.is_fadder";
pub const IS_FORFADDER: &str = "nollesystemet.UserProfile.is_forfadder";
pub const CAN_ACCESS_FOHSERIET: &str = "nollesystemet.UserProfile.can_access_fohseriet";

/// Which per-profile rule a [`SomeUser`] capability counts.
#[derive(Debug, Clone, Copy)]
enum Visibility {
    See,
    Edit,
}

/// "Can see/edit some user other than themselves."
///
/// Walks every profile and counts those the principal may see (or edit).
/// Everyone may see their own profile, so the count has to exceed
/// `min(1, total - 1)`. This is O(number of profiles) per call.
struct SomeUser {
    store: Arc<dyn PrincipalStore>,
    rule: Visibility,
}

#[async_trait]
impl Capability for SomeUser {
    async fn check(&self, principal: &Principal) -> anyhow::Result<bool> {
        let profiles = self.store.list_profiles().await?;
        let total = profiles.len() as i64;
        let permitted = profiles
            .iter()
            .filter(|profile| match self.rule {
                Visibility::See => profile.can_see(principal),
                Visibility::Edit => profile.can_edit(principal),
            })
            .count() as i64;
        Ok(permitted > 1.min(total - 1))
    }
}

fn profile_is(principal: &Principal, predicate: fn(&UserProfile) -> bool) -> bool {
    principal.profile().is_some_and(predicate)
}

/// Registry with every built-in capability.
pub fn registry(store: Arc<dyn PrincipalStore>) -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();

    registry.register_fn(CAN_CREATE, |p: &Principal| {
        p.has_permission(permissions::EDIT_USERS)
    });
    registry.register_fn(CAN_EDIT_GROUPS, |p: &Principal| {
        p.has_permission(permissions::EDIT_USERS)
    });
    registry.register(
        CAN_SEE_SOME_USER,
        SomeUser {
            store: store.clone(),
            rule: Visibility::See,
        },
    );
    registry.register(
        CAN_EDIT_SOME_USER,
        SomeUser {
            store,
            rule: Visibility::Edit,
        },
    );
    registry.register_fn(IS_NOLLAN, |p: &Principal| {
        profile_is(p, UserProfile::is_nollan)
    });
    registry.register_fn(IS_FADDER, |p: &Principal| {
        profile_is(p, UserProfile::is_fadder)
    });
    registry.register_fn(IS_FORFADDER, |p: &Principal| {
        profile_is(p, UserProfile::is_forfadder)
    });
    // Staff site is closed to nollan; accounts without a profile (created
    // from the command line) are let through.
    registry.register_fn(CAN_ACCESS_FOHSERIET, |p: &Principal| {
        !profile_is(p, UserProfile::is_nollan)
    });

    registry
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::models::{CreateUser, Program, ProfileInput, UserType};
    use crate::store::MemoryStore;

    fn add(store: &MemoryStore, name: &str, user_type: UserType, group: Option<Uuid>) -> Uuid {
        store
            .add_user(
                CreateUser {
                    username: name.to_string(),
                    email: String::new(),
                    password: None,
                    is_superuser: false,
                },
                Some(ProfileInput {
                    first_name: name.to_string(),
                    last_name: String::new(),
                    user_type,
                    nolle_group_id: group,
                    program: Program::None,
                    kth_id: String::new(),
                    phone_number: String::new(),
                    food_preference: String::new(),
                }),
            )
            .unwrap()
            .id
    }

    async fn check(store: &Arc<MemoryStore>, key: &str, user: Uuid) -> bool {
        let registry = registry(store.clone());
        let principal = store.load_principal(user).await.unwrap().unwrap();
        registry
            .resolve(key)
            .unwrap()
            .check(&principal)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn plain_member_cannot_see_some_user() {
        let store = Arc::new(MemoryStore::new());
        let kim = add(&store, "kim", UserType::Fadder, None);
        add(&store, "alex", UserType::Nollan, None);
        add(&store, "sam", UserType::Nollan, None);

        assert!(!check(&store, CAN_SEE_SOME_USER, kim).await);
        assert!(!check(&store, CAN_EDIT_SOME_USER, kim).await);
    }

    #[tokio::test]
    async fn see_users_permission_enables_listing() {
        let store = Arc::new(MemoryStore::new());
        let kim = add(&store, "kim", UserType::Senior, None);
        add(&store, "alex", UserType::Nollan, None);
        store.grant(kim, permissions::SEE_USERS);

        assert!(check(&store, CAN_SEE_SOME_USER, kim).await);
        assert!(!check(&store, CAN_EDIT_SOME_USER, kim).await);
    }

    #[tokio::test]
    async fn forfadder_sees_their_group() {
        let store = Arc::new(MemoryStore::new());
        let group = Uuid::now_v7();
        let kim = add(&store, "kim", UserType::Forfadder, None);
        add(&store, "alex", UserType::Nollan, Some(group));
        store.set_responsible(kim, group);

        assert!(check(&store, CAN_SEE_SOME_USER, kim).await);
    }

    #[tokio::test]
    async fn sole_user_can_see_some_user() {
        // With one profile the threshold is min(1, 0) = 0, and the user
        // sees themselves.
        let store = Arc::new(MemoryStore::new());
        let kim = add(&store, "kim", UserType::Fadder, None);
        assert!(check(&store, CAN_SEE_SOME_USER, kim).await);
    }

    #[tokio::test]
    async fn profile_type_capabilities() {
        let store = Arc::new(MemoryStore::new());
        let nollan = add(&store, "alex", UserType::Nollan, None);
        let forfadder = add(&store, "kim", UserType::Forfadder, None);

        assert!(check(&store, IS_NOLLAN, nollan).await);
        assert!(!check(&store, CAN_ACCESS_FOHSERIET, nollan).await);
        assert!(check(&store, IS_FADDER, forfadder).await);
        assert!(check(&store, IS_FORFADDER, forfadder).await);
        assert!(check(&store, CAN_ACCESS_FOHSERIET, forfadder).await);
    }

    #[test]
    fn every_key_is_registered() {
        let registry = registry(Arc::new(MemoryStore::new()));
        for key in [
            CAN_CREATE,
            CAN_EDIT_GROUPS,
            CAN_SEE_SOME_USER,
            CAN_EDIT_SOME_USER,
            IS_NOLLAN,
            IS_FADDER,
            IS_FORFADDER,
            CAN_ACCESS_FOHSERIET,
        ] {
            assert!(registry.contains(key), "{key}");
        }
    }
}
