//! Menu configuration documents and their validated form.
//!
//! A document lists the items of one navigation bar and the order they
//! appear in:
//!
//! ```json
//! {
//!     "order": ["index", ["logga-ut", "logga-in"]],
//!     "menu_items": {
//!         "index": { "name": "Start", "url_name": "fadderiet:index", "align": "left" },
//!         "logga-ut": {
//!             "template_content": "Logga ut ({{ request.user }})",
//!             "url_name": "fadderiet:logga-ut",
//!             "align": "right",
//!             "conditions": { "logged-in": "True" }
//!         },
//!         "logga-in": {
//!             "name": "Logga in",
//!             "url_name": "fadderiet:logga-in:index",
//!             "align": "right",
//!             "conditions": { "logged-in": "False" }
//!         }
//!     }
//! }
//! ```
//!
//! A nested list in `order` is a fallback group: only the first item whose
//! condition holds is shown.

use std::collections::HashMap;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::access::{ItemConditions, PermissionExpression};

/// Default selection pattern: any suffix of the item URL.
pub const DEFAULT_SELECTION_PATTERN: &str = ".*";

/// Raw document as written on disk.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MenuDocument {
    pub order: Vec<OrderEntry>,
    pub menu_items: HashMap<String, MenuItemDescriptor>,
}

/// One slot in the menu order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OrderEntry {
    Single(String),
    Group(Vec<String>),
}

impl OrderEntry {
    pub fn keys(&self) -> Vec<String> {
        match self {
            Self::Single(key) => vec![key.clone()],
            Self::Group(keys) => keys.clone(),
        }
    }
}

/// Item as written on disk.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MenuItemDescriptor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub template_content: Option<String>,
    pub url_name: String,
    pub align: Alignment,
    #[serde(default)]
    pub conditions: Option<ItemConditions>,
    #[serde(default)]
    pub selected_url_regex: Option<String>,
    #[serde(default)]
    pub classes: Option<String>,
}

/// Side of the navigation bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    Right,
}

/// How an item's label is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Label {
    Static(String),
    /// Rendered per request from the template registered under the item key.
    Template(String),
}

/// A validated menu item.
#[derive(Debug, Clone)]
pub struct MenuItem {
    pub key: String,
    pub label: Label,
    pub route_name: String,
    /// Resolved at load time.
    pub url: String,
    pub alignment: Alignment,
    pub condition: PermissionExpression,
    pub selection_pattern: String,
    pub classes: Option<String>,
    selection: Regex,
}

impl MenuItem {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        key: String,
        label: Label,
        route_name: String,
        url: String,
        alignment: Alignment,
        condition: PermissionExpression,
        selection_pattern: Option<String>,
        classes: Option<String>,
    ) -> Result<Self, regex::Error> {
        let selection_pattern =
            selection_pattern.unwrap_or_else(|| DEFAULT_SELECTION_PATTERN.to_string());
        let selection = Regex::new(&format!(
            "^{}(?:{selection_pattern})",
            regex::escape(&url)
        ))?;
        Ok(Self {
            key,
            label,
            route_name,
            url,
            alignment,
            condition,
            selection_pattern,
            classes,
            selection,
        })
    }

    /// Whether `request_path` falls under this item.
    pub fn is_selected(&self, request_path: &str) -> bool {
        self.selection.is_match(request_path)
    }
}

/// Compiled label templates of one menu.
#[derive(Clone, Default)]
pub struct LabelTemplates(pub(crate) tera::Tera);

impl fmt::Debug for LabelTemplates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.0.get_template_names().collect();
        names.sort_unstable();
        f.debug_tuple("LabelTemplates").field(&names).finish()
    }
}

/// A fully validated menu, shared read-only between requests.
#[derive(Debug, Clone)]
pub struct MenuDefinition {
    source: String,
    order: Vec<Vec<String>>,
    items: HashMap<String, MenuItem>,
    templates: LabelTemplates,
}

impl MenuDefinition {
    pub(crate) fn new(
        source: String,
        order: Vec<Vec<String>>,
        items: HashMap<String, MenuItem>,
        templates: LabelTemplates,
    ) -> Self {
        Self {
            source,
            order,
            items,
            templates,
        }
    }

    /// Where the definition was loaded from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Order entries; each is one key or a fallback group.
    pub fn order(&self) -> &[Vec<String>] {
        &self.order
    }

    pub fn item(&self, key: &str) -> Option<&MenuItem> {
        self.items.get(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn templates(&self) -> &tera::Tera {
        &self.templates.0
    }
}
