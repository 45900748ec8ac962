//! Nollesystemet test utilities.
//!
//! Fixture builders shared by unit and integration tests: menu documents,
//! user accounts and form bodies, plus a few assertion helpers.

use uuid::Uuid;

/// Menu document builders.
pub mod menu {
    use serde_json::{Map, Value, json};

    /// A menu document under construction.
    #[derive(Debug, Clone, Default)]
    pub struct MenuDoc {
        order: Vec<Value>,
        items: Map<String, Value>,
    }

    impl MenuDoc {
        pub fn new() -> Self {
            Self::default()
        }

        /// Append a single key to the order.
        pub fn single(mut self, key: &str) -> Self {
            self.order.push(json!(key));
            self
        }

        /// Append a fallback group to the order.
        pub fn group(mut self, keys: &[&str]) -> Self {
            self.order.push(json!(keys));
            self
        }

        pub fn item(mut self, key: &str, item: MenuItemDoc) -> Self {
            self.items.insert(key.to_string(), item.0);
            self
        }

        pub fn to_value(&self) -> Value {
            json!({
                "order": self.order,
                "menu_items": self.items,
            })
        }

        pub fn to_json(&self) -> String {
            self.to_value().to_string()
        }
    }

    /// One entry of `menu_items`.
    #[derive(Debug, Clone)]
    pub struct MenuItemDoc(Value);

    impl MenuItemDoc {
        /// Item with a static label.
        pub fn named(name: &str, url_name: &str, align: &str) -> Self {
            Self(json!({ "name": name, "url_name": url_name, "align": align }))
        }

        /// Item with a template label.
        pub fn templated(template: &str, url_name: &str, align: &str) -> Self {
            Self(json!({ "template_content": template, "url_name": url_name, "align": align }))
        }

        /// Item with no label at all, which loaders must reject.
        pub fn unlabelled(url_name: &str, align: &str) -> Self {
            Self(json!({ "url_name": url_name, "align": align }))
        }

        pub fn logged_in(self, value: &str) -> Self {
            self.condition("logged-in", json!(value))
        }

        pub fn methods_any(self, keys: &[&str]) -> Self {
            self.condition("methods", json!({ "any": keys }))
        }

        pub fn methods_all(self, keys: &[&str]) -> Self {
            self.condition("methods", json!({ "all": keys }))
        }

        pub fn permissions_any(self, codenames: &[&str]) -> Self {
            self.condition("permissions", json!({ "any": codenames }))
        }

        pub fn permissions_all(self, codenames: &[&str]) -> Self {
            self.condition("permissions", json!({ "all": codenames }))
        }

        pub fn selected_url_regex(mut self, pattern: &str) -> Self {
            self.0["selected_url_regex"] = json!(pattern);
            self
        }

        pub fn classes(mut self, classes: &str) -> Self {
            self.0["classes"] = json!(classes);
            self
        }

        fn condition(mut self, facet: &str, value: Value) -> Self {
            if !self.0.get("conditions").is_some_and(Value::is_object) {
                self.0["conditions"] = json!({});
            }
            self.0["conditions"][facet] = value;
            self
        }
    }
}

/// Create a test account with a password and profile defaults.
pub fn test_user(username: &str) -> TestUser {
    TestUser {
        id: Uuid::now_v7(),
        username: username.to_string(),
        email: format!("{username}@kth.se"),
        password: Some(DEFAULT_PASSWORD.to_string()),
        first_name: username.to_string(),
        last_name: "Testsson".to_string(),
        user_type: USER_TYPE_FADDER,
        superuser: false,
        permissions: Vec::new(),
    }
}

/// Create a superuser account.
pub fn admin_user() -> TestUser {
    test_user("admin").superuser()
}

/// Password given to every [`test_user`].
pub const DEFAULT_PASSWORD: &str = "correct horse battery staple";

/// Stored user type codes.
pub const USER_TYPE_FADDER: i16 = 1;
pub const USER_TYPE_NOLLAN: i16 = 2;
pub const USER_TYPE_FORFADDER: i16 = 6;

/// An account fixture.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// `None` for accounts that only log in through CAS.
    pub password: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub user_type: i16,
    pub superuser: bool,
    pub permissions: Vec<String>,
}

impl TestUser {
    pub fn with_permission(mut self, codename: &str) -> Self {
        self.permissions.push(codename.to_string());
        self
    }

    pub fn with_user_type(mut self, user_type: i16) -> Self {
        self.user_type = user_type;
        self
    }

    pub fn nollan(self) -> Self {
        self.with_user_type(USER_TYPE_NOLLAN)
    }

    pub fn forfadder(self) -> Self {
        self.with_user_type(USER_TYPE_FORFADDER)
    }

    pub fn superuser(mut self) -> Self {
        self.superuser = true;
        self
    }

    /// CAS-only account.
    pub fn without_password(mut self) -> Self {
        self.password = None;
        self
    }

    pub fn has_permission(&self, codename: &str) -> bool {
        self.superuser || self.permissions.iter().any(|p| p == codename)
    }
}

/// URL-encoded request bodies.
pub mod form {
    use url::form_urlencoded;

    /// Encode `pairs` as an `application/x-www-form-urlencoded` body.
    pub fn body(pairs: &[(&str, &str)]) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish()
    }

    /// Credential login body.
    pub fn login(identifier: &str, password: &str, csrf_token: &str) -> String {
        body(&[
            ("username", identifier),
            ("password", password),
            ("csrf_token", csrf_token),
        ])
    }
}

/// Assertion helpers for JSON page models.
pub mod assert {
    use serde_json::Value;

    /// Assert that a JSON value has a specific key.
    pub fn has_key(value: &Value, key: &str) {
        assert!(
            value.get(key).is_some(),
            "Expected JSON to have key '{key}', got: {value}"
        );
    }

    /// Keys of the rendered menu items on both sides, left first.
    pub fn menu_keys(page: &Value) -> Vec<String> {
        ["left", "right"]
            .iter()
            .flat_map(|side| {
                page["menu"][side]
                    .as_array()
                    .cloned()
                    .unwrap_or_default()
                    .into_iter()
            })
            .filter_map(|item| item["key"].as_str().map(str::to_string))
            .collect()
    }

    /// Assert that the page menu shows `key`.
    pub fn menu_has(page: &Value, key: &str) {
        let keys = menu_keys(page);
        assert!(
            keys.iter().any(|k| k == key),
            "Expected menu item '{key}', menu has: {keys:?}"
        );
    }

    /// Assert that the page menu does not show `key`.
    pub fn menu_lacks(page: &Value, key: &str) {
        let keys = menu_keys(page);
        assert!(
            !keys.iter().any(|k| k == key),
            "Expected no menu item '{key}', menu has: {keys:?}"
        );
    }
}
