//! Loading and validating menu configuration documents.
//!
//! Every check happens here, at load time: a definition that comes out of
//! [`MenuLoader::load`] renders without configuration surprises.

use std::collections::{HashMap, HashSet};
use std::error::Error as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use super::definition::{
    LabelTemplates, Label, MenuDefinition, MenuDocument, MenuItem, MenuItemDescriptor,
};
use super::render::label_context;
use crate::access::{CapabilityRegistry, ExpressionError, PermissionExpression, Principal};
use crate::permissions;
use crate::routes::names::RouteTable;

/// A menu document that cannot be used. Always fatal.
#[derive(Debug, Error)]
pub enum MenuConfigError {
    #[error("cannot read menu configuration {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported menu configuration format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("malformed menu configuration {source_name}: {message}")]
    Malformed { source_name: String, message: String },

    #[error("invalid menu configuration {source_name}: {problem}")]
    Invalid {
        source_name: String,
        problem: MenuProblem,
    },
}

/// Why a well-formed document was rejected.
#[derive(Debug, Error)]
pub enum MenuProblem {
    #[error("'order' is empty")]
    EmptyOrder,

    #[error("'menu_items' is empty")]
    EmptyItems,

    #[error("an order group is empty")]
    EmptyGroup,

    #[error("order references unknown item '{0}'")]
    UnknownItem(String),

    #[error("item '{0}' has neither 'name' nor 'template_content'")]
    MissingLabel(String),

    #[error("item '{key}' has an invalid label template: {message}")]
    Template { key: String, message: String },

    #[error("item '{key}' has an invalid selected_url_regex")]
    Pattern {
        key: String,
        #[source]
        source: regex::Error,
    },

    #[error("item '{key}' has invalid conditions")]
    Condition {
        key: String,
        #[source]
        source: ExpressionError,
    },

    #[error("item '{key}' refers to unknown capability '{capability}'")]
    UnknownCapability { key: String, capability: String },

    #[error("item '{key}' refers to unknown permission '{codename}'")]
    UnknownPermission { key: String, codename: String },

    #[error("item '{key}' refers to unknown route '{route}'")]
    UnknownRoute { key: String, route: String },

    #[error("item '{key}' refers to route '{route}', which needs parameters")]
    ParameterisedRoute { key: String, route: String },
}

/// Document syntax, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "yml" | "yaml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

/// Turns documents into [`MenuDefinition`]s, checking route names and
/// capability keys against the running application.
#[derive(Debug, Clone)]
pub struct MenuLoader {
    routes: Arc<RouteTable>,
    capabilities: Arc<CapabilityRegistry>,
}

impl MenuLoader {
    pub fn new(routes: Arc<RouteTable>, capabilities: Arc<CapabilityRegistry>) -> Self {
        Self {
            routes,
            capabilities,
        }
    }

    /// Read, parse and validate the document at `path`.
    pub fn load(&self, path: &Path) -> Result<MenuDefinition, MenuConfigError> {
        let format =
            Format::from_path(path).ok_or_else(|| MenuConfigError::UnsupportedFormat(path.into()))?;
        let text = std::fs::read_to_string(path).map_err(|source| MenuConfigError::Read {
            path: path.into(),
            source,
        })?;
        let definition = self.parse(&path.display().to_string(), &text, format)?;
        debug!(source = %path.display(), items = definition.len(), "menu loaded");
        Ok(definition)
    }

    /// Parse and validate document text.
    pub fn parse(
        &self,
        source_name: &str,
        text: &str,
        format: Format,
    ) -> Result<MenuDefinition, MenuConfigError> {
        let document: MenuDocument = match format {
            Format::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
            Format::Yaml => serde_yml::from_str(text).map_err(|e| e.to_string()),
        }
        .map_err(|message| MenuConfigError::Malformed {
            source_name: source_name.to_string(),
            message,
        })?;

        self.build(source_name, document)
            .map_err(|problem| MenuConfigError::Invalid {
                source_name: source_name.to_string(),
                problem,
            })
    }

    fn build(&self, source_name: &str, document: MenuDocument) -> Result<MenuDefinition, MenuProblem> {
        if document.order.is_empty() {
            return Err(MenuProblem::EmptyOrder);
        }
        if document.menu_items.is_empty() {
            return Err(MenuProblem::EmptyItems);
        }

        let order: Vec<Vec<String>> = document.order.iter().map(|e| e.keys()).collect();
        let mut referenced = HashSet::new();
        for group in &order {
            if group.is_empty() {
                return Err(MenuProblem::EmptyGroup);
            }
            for key in group {
                if !document.menu_items.contains_key(key) {
                    return Err(MenuProblem::UnknownItem(key.clone()));
                }
                referenced.insert(key.as_str());
            }
        }

        let samples = [
            label_context(&Principal::anonymous(), "/"),
            label_context(&Principal::builder(Uuid::nil(), "user").build(), "/"),
        ];
        let mut templates = tera::Tera::default();
        let mut items = HashMap::with_capacity(document.menu_items.len());
        for (key, descriptor) in &document.menu_items {
            // Items not in the order are never shown; still validate them so
            // a typo in the order list does not hide a broken item.
            let item = self.build_item(key, descriptor, &mut templates, &samples)?;
            items.insert(key.clone(), item);
        }
        if referenced.len() < items.len() {
            debug!(source = source_name, "menu has items that are not in the order");
        }

        Ok(MenuDefinition::new(
            source_name.to_string(),
            order,
            items,
            LabelTemplates(templates),
        ))
    }

    fn build_item(
        &self,
        key: &str,
        descriptor: &MenuItemDescriptor,
        templates: &mut tera::Tera,
        samples: &[tera::Context],
    ) -> Result<MenuItem, MenuProblem> {
        let template_problem = |e: tera::Error| MenuProblem::Template {
            key: key.to_string(),
            message: error_chain(&e),
        };
        let label = match (&descriptor.template_content, &descriptor.name) {
            (Some(template), _) => {
                templates
                    .add_raw_template(key, template)
                    .map_err(template_problem)?;
                // A template must render for anonymous and logged-in
                // visitors alike, so unknown variables fail here.
                for sample in samples {
                    templates.render(key, sample).map_err(template_problem)?;
                }
                Label::Template(template.clone())
            }
            (None, Some(name)) => Label::Static(name.clone()),
            (None, None) => return Err(MenuProblem::MissingLabel(key.to_string())),
        };

        let condition = match &descriptor.conditions {
            Some(conditions) => {
                conditions
                    .to_expression()
                    .map_err(|source| MenuProblem::Condition {
                        key: key.to_string(),
                        source,
                    })?
            }
            None => PermissionExpression::always(),
        };
        if let Some(capability) = condition
            .capability_keys()
            .into_iter()
            .find(|c| !self.capabilities.contains(c))
        {
            return Err(MenuProblem::UnknownCapability {
                key: key.to_string(),
                capability: capability.to_string(),
            });
        }

        if let Some(codename) = condition
            .permission_codenames()
            .into_iter()
            .find(|c| !permissions::is_known(c))
        {
            return Err(MenuProblem::UnknownPermission {
                key: key.to_string(),
                codename: codename.to_string(),
            });
        }

        let route = &descriptor.url_name;
        if !self.routes.contains(route) {
            return Err(MenuProblem::UnknownRoute {
                key: key.to_string(),
                route: route.clone(),
            });
        }
        let url = self
            .routes
            .reverse(route)
            .filter(|_| self.routes.is_static(route))
            .ok_or_else(|| MenuProblem::ParameterisedRoute {
                key: key.to_string(),
                route: route.clone(),
            })?;

        MenuItem::new(
            key.to_string(),
            label,
            descriptor.url_name.clone(),
            url,
            descriptor.align,
            condition,
            descriptor.selected_url_regex.clone(),
            descriptor.classes.clone(),
        )
        .map_err(|source| MenuProblem::Pattern {
            key: key.to_string(),
            source,
        })
    }
}

/// Flatten an error and its sources into one line.
fn error_chain(error: &tera::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
