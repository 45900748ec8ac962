//! Application state shared across all handlers.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use crate::access::{CapabilityRegistry, ConditionEvaluator, builtin};
use crate::auth::{CasClient, CasVerifier, FakeCasVerifier};
use crate::config::Config;
use crate::db;
use crate::menu::{MenuCache, MenuConfigError, MenuDefinition, MenuLoader};
use crate::routes::names::RouteTable;
use crate::sites::Site;
use crate::store::{HappeningStore, PgStore, PrincipalStore};

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,

    /// Users, profiles and permissions.
    principals: Arc<dyn PrincipalStore>,

    happenings: Arc<dyn HappeningStore>,

    /// Named routes, used by menus and redirects.
    routes: Arc<RouteTable>,

    /// Evaluates menu conditions and view predicates.
    evaluator: ConditionEvaluator,

    /// Loaded menu documents, keyed by path.
    menus: MenuCache,

    /// CAS ticket validation (the fake verifier in development).
    cas: Arc<dyn CasVerifier>,
}

impl AppState {
    /// Connect to PostgreSQL, migrate, and load every site menu.
    pub async fn new(config: &Config) -> Result<Self> {
        let pool = db::create_pool(config)
            .await
            .context("failed to create database pool")?;

        db::run_migrations(&pool)
            .await
            .context("failed to run migrations")?;

        let store = Arc::new(PgStore::new(pool));
        let routes = Arc::new(RouteTable::standard());
        let cas = cas_verifier(config, &routes)?;

        let state = Self::from_parts(config.clone(), routes, store.clone(), store, cas);
        state
            .preload_menus()
            .context("failed to load menu configuration")?;
        Ok(state)
    }

    /// Assemble state from already-built collaborators. `routes` is the
    /// table `cas` was built against.
    pub fn from_parts(
        config: Config,
        routes: Arc<RouteTable>,
        principals: Arc<dyn PrincipalStore>,
        happenings: Arc<dyn HappeningStore>,
        cas: Arc<dyn CasVerifier>,
    ) -> Self {
        let capabilities: Arc<CapabilityRegistry> =
            Arc::new(builtin::registry(Arc::clone(&principals)));
        let evaluator = ConditionEvaluator::new(Arc::clone(&capabilities));
        let menus = MenuCache::new(MenuLoader::new(Arc::clone(&routes), capabilities));

        Self {
            inner: Arc::new(AppStateInner {
                config,
                principals,
                happenings,
                routes,
                evaluator,
                menus,
                cas,
            }),
        }
    }

    /// Load and validate the menu of every site.
    pub fn preload_menus(&self) -> Result<(), MenuConfigError> {
        for site in Site::ALL {
            let menu = self.menu(site)?;
            info!(site = %site, items = menu.len(), "menu ready");
        }
        Ok(())
    }

    /// The cached menu definition of `site`.
    pub fn menu(&self, site: Site) -> Result<Arc<MenuDefinition>, MenuConfigError> {
        self.inner
            .menus
            .get(&site.menu_path(&self.inner.config.menu_dir))
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn principals(&self) -> &dyn PrincipalStore {
        self.inner.principals.as_ref()
    }

    pub fn happenings(&self) -> &dyn HappeningStore {
        self.inner.happenings.as_ref()
    }

    pub fn routes(&self) -> &RouteTable {
        &self.inner.routes
    }

    pub fn evaluator(&self) -> &ConditionEvaluator {
        &self.inner.evaluator
    }

    pub fn menus(&self) -> &MenuCache {
        &self.inner.menus
    }

    pub fn cas(&self) -> &dyn CasVerifier {
        self.inner.cas.as_ref()
    }

    /// Check if the store is reachable.
    pub async fn store_healthy(&self) -> bool {
        self.inner.principals.healthy().await
    }
}

/// The CAS verifier selected by configuration.
pub fn cas_verifier(config: &Config, routes: &RouteTable) -> Result<Arc<dyn CasVerifier>> {
    if config.cas_fake {
        let login_page = routes
            .reverse("autentisering:cas-fake")
            .context("fake CAS route is not registered")?;
        info!("using fake CAS verifier");
        return Ok(Arc::new(FakeCasVerifier::new(format!(
            "{}{login_page}",
            config.site_url
        ))));
    }

    let client = CasClient::new(
        &config.cas_server_url,
        Duration::from_secs(config.cas_timeout_secs),
    )
    .context("failed to build CAS client")?;
    Ok(Arc::new(client))
}
