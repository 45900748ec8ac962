//! Per-request menu rendering.

use serde::Serialize;
use thiserror::Error;

use super::definition::{Alignment, Label, MenuDefinition, MenuItem};
use crate::access::{AccessError, ConditionEvaluator, Principal};

/// Class added to the item matching the current path.
pub const SELECTED_CLASS: &str = "selected";

/// What `request.user` renders as for anonymous visitors.
pub const ANONYMOUS_USER: &str = "AnonymousUser";

#[derive(Debug, Error)]
pub enum MenuRenderError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("cannot render label of menu item '{key}'")]
    Label {
        key: String,
        #[source]
        source: tera::Error,
    },
}

/// One visible item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedItem {
    pub key: String,
    pub url: String,
    pub label: String,
    pub classes: String,
    pub selected: bool,
}

/// The navigation bar for one response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Menu {
    pub left: Vec<RenderedItem>,
    pub right: Vec<RenderedItem>,
}

impl Menu {
    /// Keys of all items, left side first.
    pub fn keys(&self) -> Vec<&str> {
        self.left
            .iter()
            .chain(&self.right)
            .map(|item| item.key.as_str())
            .collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.left.iter().chain(&self.right).any(|item| item.key == key)
    }
}

#[derive(Serialize)]
struct RequestContext<'a> {
    path: &'a str,
    user: &'a str,
}

/// Context label templates render against: `request` (path and the
/// username as a string) and `user` (the principal summary).
pub(crate) fn label_context(principal: &Principal, request_path: &str) -> tera::Context {
    let user = if principal.is_authenticated() {
        principal.username()
    } else {
        ANONYMOUS_USER
    };
    let mut context = tera::Context::new();
    context.insert("user", &principal.summary());
    context.insert(
        "request",
        &RequestContext {
            path: request_path,
            user,
        },
    );
    context
}

pub struct MenuRenderer<'a> {
    evaluator: &'a ConditionEvaluator,
}

impl<'a> MenuRenderer<'a> {
    pub fn new(evaluator: &'a ConditionEvaluator) -> Self {
        Self { evaluator }
    }

    /// Filter, order and label `definition` for `principal` at `request_path`.
    pub async fn render(
        &self,
        definition: &MenuDefinition,
        principal: &Principal,
        request_path: &str,
    ) -> Result<Menu, MenuRenderError> {
        let context = label_context(principal, request_path);

        let mut menu = Menu::default();
        for entry in definition.order() {
            let Some(item) = self.first_eligible(definition, entry, principal).await? else {
                continue;
            };
            let rendered = Self::render_item(definition, item, &context, request_path)?;
            match item.alignment {
                Alignment::Left => menu.left.push(rendered),
                Alignment::Right => menu.right.push(rendered),
            }
        }
        Ok(menu)
    }

    async fn first_eligible<'d>(
        &self,
        definition: &'d MenuDefinition,
        keys: &[String],
        principal: &Principal,
    ) -> Result<Option<&'d MenuItem>, MenuRenderError> {
        for key in keys {
            // The loader guarantees every ordered key has an item.
            let Some(item) = definition.item(key) else {
                continue;
            };
            if self.evaluator.evaluate(&item.condition, principal).await? {
                return Ok(Some(item));
            }
        }
        Ok(None)
    }

    fn render_item(
        definition: &MenuDefinition,
        item: &MenuItem,
        context: &tera::Context,
        request_path: &str,
    ) -> Result<RenderedItem, MenuRenderError> {
        let label = match &item.label {
            Label::Static(name) => name.clone(),
            Label::Template(_) => definition
                .templates()
                .render(&item.key, context)
                .map_err(|source| MenuRenderError::Label {
                    key: item.key.clone(),
                    source,
                })?,
        };

        let selected = item.is_selected(request_path);
        let mut classes: Vec<&str> = item
            .classes
            .as_deref()
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default();
        if selected {
            classes.push(SELECTED_CLASS);
        }

        Ok(RenderedItem {
            key: item.key.clone(),
            url: item.url.clone(),
            label,
            classes: classes.join(" "),
            selected,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::Arc;

    use nollesystemet_test_utils::menu::{MenuDoc, MenuItemDoc};
    use uuid::Uuid;

    use super::*;
    use crate::access::CapabilityRegistry;
    use crate::menu::{Format, MenuLoader};
    use crate::permissions::{EDIT_HAPPENING, EDIT_USERS};
    use crate::routes::names::RouteTable;

    fn registry() -> Arc<CapabilityRegistry> {
        let mut registry = CapabilityRegistry::new();
        registry.register_fn("app.Model.never", |_: &Principal| false);
        registry.register_fn("app.Model.always", |_: &Principal| true);
        Arc::new(registry)
    }

    fn definition(doc: MenuDoc) -> MenuDefinition {
        MenuLoader::new(Arc::new(RouteTable::standard()), registry())
            .parse("test.json", &doc.to_json(), Format::Json)
            .unwrap()
    }

    async fn render(doc: MenuDoc, principal: &Principal, path: &str) -> Menu {
        let evaluator = ConditionEvaluator::new(registry());
        MenuRenderer::new(&evaluator)
            .render(&definition(doc), principal, path)
            .await
            .unwrap()
    }

    fn member(perms: &[&str]) -> Principal {
        Principal::builder(Uuid::now_v7(), "kim")
            .permissions(perms.iter().copied())
            .build()
    }

    fn site_menu() -> MenuDoc {
        MenuDoc::new()
            .single("index")
            .single("evenemang")
            .group(&["logga-ut", "logga-in"])
            .item(
                "index",
                MenuItemDoc::named("Start", "fohseriet:index", "left").selected_url_regex("$"),
            )
            .item(
                "evenemang",
                MenuItemDoc::named("Evenemang", "fohseriet:evenemang:lista", "left")
                    .permissions_any(&[EDIT_HAPPENING, EDIT_USERS]),
            )
            .item(
                "logga-ut",
                MenuItemDoc::templated(
                    "Logga ut ({{ request.user }})",
                    "fohseriet:logga-ut",
                    "right",
                )
                .logged_in("True"),
            )
            .item(
                "logga-in",
                MenuItemDoc::named("Logga in", "fohseriet:logga-in:index", "right")
                    .logged_in("False"),
            )
    }

    #[tokio::test]
    async fn logged_in_items_are_hidden_from_anonymous() {
        let menu = render(site_menu(), &Principal::anonymous(), "/fohseriet/").await;
        assert_eq!(menu.keys(), vec!["index", "logga-in"]);
    }

    #[tokio::test]
    async fn permission_facet_any_admits_either_codename() {
        let menu = render(site_menu(), &member(&[EDIT_USERS]), "/fohseriet/").await;
        assert_eq!(menu.keys(), vec!["index", "evenemang", "logga-ut"]);
    }

    #[tokio::test]
    async fn fallback_group_renders_only_the_first_eligible_item() {
        let menu = render(site_menu(), &member(&[]), "/fohseriet/").await;
        assert!(menu.contains("logga-ut"));
        assert!(!menu.contains("logga-in"));
        assert_eq!(menu.right.len(), 1);
    }

    #[tokio::test]
    async fn fallback_group_skips_a_failing_first_item() {
        let doc = MenuDoc::new()
            .group(&["k1", "k2"])
            .item(
                "k1",
                MenuItemDoc::named("Ett", "fadderiet:index", "left").methods_any(&["app.Model.never"]),
            )
            .item(
                "k2",
                MenuItemDoc::named("Två", "fadderiet:index", "left").methods_any(&["app.Model.always"]),
            );
        let menu = render(doc, &member(&[]), "/").await;
        assert_eq!(menu.keys(), vec!["k2"]);
    }

    #[tokio::test]
    async fn sides_keep_the_master_order() {
        let doc = MenuDoc::new()
            .single("a")
            .single("b")
            .single("c")
            .single("d")
            .item("a", MenuItemDoc::named("A", "fadderiet:index", "right"))
            .item("b", MenuItemDoc::named("B", "fadderiet:index", "left"))
            .item("c", MenuItemDoc::named("C", "fadderiet:index", "right"))
            .item("d", MenuItemDoc::named("D", "fadderiet:index", "left"));
        let menu = render(doc, &Principal::anonymous(), "/").await;
        let left: Vec<_> = menu.left.iter().map(|i| i.key.as_str()).collect();
        let right: Vec<_> = menu.right.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(left, vec!["b", "d"]);
        assert_eq!(right, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn default_pattern_selects_nested_paths() {
        let menu = render(
            site_menu(),
            &member(&[EDIT_HAPPENING]),
            "/fohseriet/evenemang/5/redigera/",
        )
        .await;
        let evenemang = menu.left.iter().find(|i| i.key == "evenemang").unwrap();
        assert!(evenemang.selected);
        assert_eq!(evenemang.classes, "selected");
        let index = menu.left.iter().find(|i| i.key == "index").unwrap();
        assert!(!index.selected);
    }

    #[tokio::test]
    async fn template_labels_see_the_request_user() {
        let menu = render(site_menu(), &member(&[]), "/fohseriet/").await;
        assert_eq!(menu.right[0].label, "Logga ut (kim)");
        assert_eq!(menu.right[0].url, "/fohseriet/logga-ut/");
    }

    #[tokio::test]
    async fn anonymous_request_user_renders_as_anonymous_user() {
        let doc = MenuDoc::new().single("vem").item(
            "vem",
            MenuItemDoc::templated("Hej {{ request.user }}{{ user.username }}", "fadderiet:index", "left"),
        );
        let menu = render(doc, &Principal::anonymous(), "/fadderiet/").await;
        assert_eq!(menu.left[0].label, "Hej AnonymousUser");
    }

    #[tokio::test]
    async fn profile_names_are_available_to_labels() {
        let doc = MenuDoc::new().single("vem").item(
            "vem",
            MenuItemDoc::templated(
                "{{ user.first_name }}|{{ request.path }}",
                "fadderiet:index",
                "left",
            ),
        );
        // No profile: the name renders empty rather than failing.
        let menu = render(doc, &member(&[]), "/fadderiet/").await;
        assert_eq!(menu.left[0].label, "|/fadderiet/");
    }

    #[tokio::test]
    async fn configured_classes_are_kept() {
        let doc = MenuDoc::new().single("index").item(
            "index",
            MenuItemDoc::named("Start", "fadderiet:index", "left").classes("brand bold"),
        );
        let menu = render(doc, &Principal::anonymous(), "/fadderiet/").await;
        assert_eq!(menu.left[0].classes, "brand bold selected");
    }

    #[tokio::test]
    async fn unresolvable_capability_surfaces_as_an_error() {
        let doc = MenuDoc::new().single("index").item(
            "index",
            MenuItemDoc::named("Start", "fadderiet:index", "left").methods_any(&["app.Model.never"]),
        );
        let definition = definition(doc);
        // An evaluator whose table lacks the key the menu was validated against.
        let evaluator = ConditionEvaluator::new(Arc::new(CapabilityRegistry::new()));
        let result = MenuRenderer::new(&evaluator)
            .render(&definition, &member(&[]), "/")
            .await;
        assert!(matches!(
            result,
            Err(MenuRenderError::Access(AccessError::UnknownCapability(_)))
        ));
    }
}
