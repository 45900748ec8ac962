//! Permission codenames.
//!
//! Codenames are dotted `app.action` strings. They are granted to users
//! directly or through groups and checked with
//! [`Principal::has_permission`](crate::access::Principal::has_permission).

/// See every user profile.
pub const SEE_USERS: &str = "nollesystemet.see_users";

/// Edit every user profile, create and delete users.
pub const EDIT_USERS: &str = "nollesystemet.edit_users";

/// Edit system-wide settings.
pub const EDIT_SYSTEM: &str = "nollesystemet.edit_system";

/// Create, edit and delete happenings.
pub const EDIT_HAPPENING: &str = "fohseriet.edit_happening";

/// Every codename known to the system with a human-readable description.
pub const CATALOGUE: &[(&str, &str)] = &[
    (SEE_USERS, "Can see any user profile"),
    (EDIT_USERS, "Can edit any user profile"),
    (EDIT_SYSTEM, "Can edit the system itself"),
    (EDIT_HAPPENING, "Can create and edit happenings"),
];

/// Whether `codename` is one the system knows about.
pub fn is_known(codename: &str) -> bool {
    CATALOGUE.iter().any(|(known, _)| *known == codename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_codenames_are_dotted() {
        for (codename, _) in CATALOGUE {
            let (app, action) = codename.split_once('.').unwrap_or_default();
            assert!(!app.is_empty() && !action.is_empty(), "{codename}");
        }
    }

    #[test]
    fn known_codenames() {
        assert!(is_known(EDIT_USERS));
        assert!(!is_known("nollesystemet.fly"));
    }
}
