//! In-memory stores for tests and local experiments.

use std::collections::{BTreeMap, HashMap, HashSet};

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{HappeningStore, PrincipalStore};
use crate::access::Principal;
use crate::models::{CreateUser, Group, Happening, NolleGroup, ProfileInput, User, UserProfile};

#[derive(Default)]
struct Data {
    users: HashMap<Uuid, User>,
    profiles: HashMap<Uuid, UserProfile>,
    user_permissions: HashMap<Uuid, HashSet<String>>,
    groups: HashMap<Uuid, (Group, HashSet<String>)>,
    memberships: HashMap<Uuid, HashSet<Uuid>>,
    responsible: HashMap<Uuid, HashSet<Uuid>>,
    nolle_groups: HashMap<Uuid, NolleGroup>,
    happenings: BTreeMap<Uuid, Happening>,
}

/// Store holding everything in process memory.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<Data>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an account, optionally with a profile.
    pub fn add_user(&self, account: CreateUser, profile: Option<ProfileInput>) -> Result<User> {
        let user = User::new(&account)?;
        let mut data = self.data.write();
        if data.users.values().any(|u| u.username == user.username) {
            bail!("username '{}' is taken", user.username);
        }
        if let Some(profile) = profile {
            data.profiles
                .insert(user.id, UserProfile::from_input(user.id, profile));
        }
        data.users.insert(user.id, user.clone());
        Ok(user)
    }

    /// Grant a permission directly to a user.
    pub fn grant(&self, user_id: Uuid, codename: &str) {
        self.data
            .write()
            .user_permissions
            .entry(user_id)
            .or_default()
            .insert(codename.to_string());
    }

    /// Create a group carrying `permissions`.
    pub fn add_group(&self, name: &str, permissions: &[&str]) -> Group {
        let group = Group {
            id: Uuid::now_v7(),
            name: name.to_string(),
        };
        let permissions = permissions.iter().map(|p| p.to_string()).collect();
        self.data
            .write()
            .groups
            .insert(group.id, (group.clone(), permissions));
        group
    }

    pub fn add_to_group(&self, user_id: Uuid, group_id: Uuid) {
        self.data
            .write()
            .memberships
            .entry(user_id)
            .or_default()
            .insert(group_id);
    }

    pub fn add_nolle_group(&self, name: &str, description: &str) -> NolleGroup {
        let group = NolleGroup {
            id: Uuid::now_v7(),
            name: name.to_string(),
            description: description.to_string(),
        };
        self.data
            .write()
            .nolle_groups
            .insert(group.id, group.clone());
        group
    }

    /// Make `user_id` förfadder for a nolle group.
    pub fn set_responsible(&self, user_id: Uuid, nolle_group_id: Uuid) {
        self.data
            .write()
            .responsible
            .entry(user_id)
            .or_default()
            .insert(nolle_group_id);
    }

    pub fn deactivate(&self, user_id: Uuid) {
        if let Some(user) = self.data.write().users.get_mut(&user_id) {
            user.is_active = false;
        }
    }

    pub fn user_count(&self) -> usize {
        self.data.read().users.len()
    }
}

impl Data {
    fn permissions_of(&self, user_id: Uuid) -> HashSet<String> {
        let mut permissions = self
            .user_permissions
            .get(&user_id)
            .cloned()
            .unwrap_or_default();
        for group_id in self.memberships.get(&user_id).into_iter().flatten() {
            if let Some((_, granted)) = self.groups.get(group_id) {
                permissions.extend(granted.iter().cloned());
            }
        }
        permissions
    }

    fn groups_of(&self, user_id: Uuid) -> Vec<Group> {
        let mut groups: Vec<Group> = self
            .memberships
            .get(&user_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.groups.get(id).map(|(g, _)| g.clone()))
            .collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        groups
    }
}

#[async_trait]
impl PrincipalStore for MemoryStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.data.read().users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .data
            .read()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_login(&self, identifier: &str) -> Result<Option<User>> {
        let data = self.data.read();
        let by_username = data.users.values().find(|u| u.username == identifier);
        let found = by_username.or_else(|| {
            data.users
                .values()
                .find(|u| !u.email.is_empty() && u.email.eq_ignore_ascii_case(identifier))
        });
        Ok(found.cloned())
    }

    async fn load_principal(&self, user_id: Uuid) -> Result<Option<Principal>> {
        let data = self.data.read();
        let Some(user) = data.users.get(&user_id) else {
            return Ok(None);
        };
        if !user.is_active {
            return Ok(None);
        }

        let mut builder = Principal::builder(user.id, user.username.clone())
            .superuser(user.is_superuser)
            .permissions(data.permissions_of(user.id))
            .groups(data.groups_of(user.id))
            .responsible_groups(
                data.responsible
                    .get(&user.id)
                    .into_iter()
                    .flatten()
                    .copied(),
            );
        if let Some(profile) = data.profiles.get(&user.id) {
            builder = builder.profile(profile.clone());
        }
        Ok(Some(builder.build()))
    }

    async fn find_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>> {
        Ok(self.data.read().profiles.get(&user_id).cloned())
    }

    async fn list_profiles(&self) -> Result<Vec<UserProfile>> {
        let mut profiles: Vec<UserProfile> = self.data.read().profiles.values().cloned().collect();
        profiles.sort_by(|a, b| {
            (&a.first_name, &a.last_name).cmp(&(&b.first_name, &b.last_name))
        });
        Ok(profiles)
    }

    async fn create_user(
        &self,
        account: CreateUser,
        profile: ProfileInput,
    ) -> Result<(User, UserProfile)> {
        let user = self.add_user(account, Some(profile))?;
        let profile = self
            .data
            .read()
            .profiles
            .get(&user.id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("profile vanished after insert"))?;
        Ok((user, profile))
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        profile: ProfileInput,
    ) -> Result<Option<UserProfile>> {
        let mut data = self.data.write();
        let Some(existing) = data.profiles.get_mut(&user_id) else {
            return Ok(None);
        };
        *existing = UserProfile::from_input(user_id, profile);
        Ok(Some(existing.clone()))
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<bool> {
        let mut data = self.data.write();
        let removed = data.users.remove(&user_id).is_some();
        data.profiles.remove(&user_id);
        data.user_permissions.remove(&user_id);
        data.memberships.remove(&user_id);
        data.responsible.remove(&user_id);
        Ok(removed)
    }

    async fn touch_login(&self, user_id: Uuid) -> Result<()> {
        if let Some(user) = self.data.write().users.get_mut(&user_id) {
            user.last_login = Some(Utc::now());
        }
        Ok(())
    }

    async fn list_nolle_groups(&self) -> Result<Vec<NolleGroup>> {
        let mut groups: Vec<NolleGroup> =
            self.data.read().nolle_groups.values().cloned().collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }

    async fn healthy(&self) -> bool {
        true
    }
}

#[async_trait]
impl HappeningStore for MemoryStore {
    async fn list_happenings(&self) -> Result<Vec<Happening>> {
        let mut happenings: Vec<Happening> =
            self.data.read().happenings.values().cloned().collect();
        happenings.sort_by_key(|h| h.start_time);
        Ok(happenings)
    }

    async fn find_happening(&self, id: Uuid) -> Result<Option<Happening>> {
        Ok(self.data.read().happenings.get(&id).cloned())
    }

    async fn save_happening(&self, happening: Happening) -> Result<Happening> {
        let mut data = self.data.write();
        if data
            .happenings
            .values()
            .any(|h| h.name == happening.name && h.id != happening.id)
        {
            bail!("a happening named '{}' already exists", happening.name);
        }
        data.happenings.insert(happening.id, happening.clone());
        Ok(happening)
    }

    async fn delete_happening(&self, id: Uuid) -> Result<bool> {
        Ok(self.data.write().happenings.remove(&id).is_some())
    }
}
