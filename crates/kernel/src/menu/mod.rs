//! Navigation menus.
//!
//! A site's menu is declared in a document under the menu directory, loaded
//! and validated once by [`MenuLoader`], cached in [`MenuCache`] and turned
//! into a per-request [`Menu`] by [`MenuRenderer`].

mod cache;
mod definition;
mod loader;
mod render;

pub use cache::MenuCache;
pub use definition::{
    Alignment, DEFAULT_SELECTION_PATTERN, Label, MenuDefinition, MenuDocument, MenuItem,
    MenuItemDescriptor, OrderEntry,
};
pub use loader::{Format, MenuConfigError, MenuLoader, MenuProblem};
pub use render::{
    ANONYMOUS_USER, Menu, MenuRenderError, MenuRenderer, RenderedItem, SELECTED_CLASS,
};
