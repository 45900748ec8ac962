//! Process-wide cache of loaded menu definitions.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::definition::MenuDefinition;
use super::loader::{MenuConfigError, MenuLoader};

/// Menu definitions keyed by source path.
///
/// Filled lazily. Two requests racing on the same cold path may both load
/// the document; the second insert wins and both get a complete definition.
#[derive(Debug)]
pub struct MenuCache {
    loader: MenuLoader,
    entries: DashMap<PathBuf, Arc<MenuDefinition>>,
}

impl MenuCache {
    pub fn new(loader: MenuLoader) -> Self {
        Self {
            loader,
            entries: DashMap::new(),
        }
    }

    pub fn loader(&self) -> &MenuLoader {
        &self.loader
    }

    /// The definition for `path`, loading it on first use.
    pub fn get(&self, path: &Path) -> Result<Arc<MenuDefinition>, MenuConfigError> {
        if let Some(entry) = self.entries.get(path) {
            return Ok(Arc::clone(entry.value()));
        }

        let definition = Arc::new(self.loader.load(path)?);
        self.entries
            .insert(path.to_path_buf(), Arc::clone(&definition));
        debug!(source = %path.display(), "menu cached");
        Ok(definition)
    }

    /// Drop the cached definition for `path`; the next `get` reloads it.
    pub fn invalidate(&self, path: &Path) {
        self.entries.remove(path);
    }

    pub fn invalidate_all(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use nollesystemet_test_utils::menu::{MenuDoc, MenuItemDoc};

    use super::*;
    use crate::access::CapabilityRegistry;
    use crate::routes::names::RouteTable;

    fn cache() -> MenuCache {
        MenuCache::new(MenuLoader::new(
            Arc::new(RouteTable::standard()),
            Arc::new(CapabilityRegistry::new()),
        ))
    }

    fn write_menu(dir: &Path, name: &str, label: &str) -> PathBuf {
        let doc = MenuDoc::new().single("index").item(
            "index",
            MenuItemDoc::named(label, "fadderiet:index", "left"),
        );
        let path = dir.join(name);
        std::fs::write(&path, doc.to_json()).unwrap();
        path
    }

    fn label(definition: &MenuDefinition) -> String {
        match &definition.item("index").unwrap().label {
            crate::menu::Label::Static(name) => name.clone(),
            crate::menu::Label::Template(source) => source.clone(),
        }
    }

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("nollesystemet-menu-{tag}-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn second_get_is_served_from_cache() {
        let dir = scratch_dir("hit");
        let path = write_menu(&dir, "menu.json", "Start");
        let cache = cache();

        let first = cache.get(&path).unwrap();
        write_menu(&dir, "menu.json", "Changed");
        let second = cache.get(&path).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(label(&second), "Start");
        assert_eq!(cache.len(), 1);
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn invalidate_reloads() {
        let dir = scratch_dir("invalidate");
        let path = write_menu(&dir, "menu.json", "Start");
        let cache = cache();
        cache.get(&path).unwrap();

        write_menu(&dir, "menu.json", "Changed");
        cache.invalidate(&path);
        assert!(cache.is_empty());
        assert_eq!(label(&cache.get(&path).unwrap()), "Changed");

        cache.invalidate_all();
        assert!(cache.is_empty());
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn failed_loads_are_not_cached() {
        let dir = scratch_dir("broken");
        let path = dir.join("menu.json");
        std::fs::write(&path, r#"{"order": ["index"]}"#).unwrap();
        let cache = cache();

        assert!(cache.get(&path).is_err());
        assert!(cache.is_empty());
        std::fs::remove_dir_all(dir).unwrap();
    }
}
