//! Nollesystemet
//!
//! HTTP server for fadderiet and fohseriet, plus maintenance commands.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method};
use clap::{Parser, Subcommand};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use nollesystemet_kernel::auth::FakeCasVerifier;
use nollesystemet_kernel::config::Config;
use nollesystemet_kernel::models::{CreateUser, ProfileInput, Program, UserType};
use nollesystemet_kernel::routes::names::RouteTable;
use nollesystemet_kernel::state::AppState;
use nollesystemet_kernel::store::{MemoryStore, PgStore, PrincipalStore};
use nollesystemet_kernel::{db, routes, session};

#[derive(Debug, Parser)]
#[command(name = "nollesystemet", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Load and validate the menu of every site.
    CheckMenus {
        /// Directory holding `<site>.json`; defaults to MENU_DIR.
        #[arg(long)]
        menu_dir: Option<PathBuf>,
    },
    /// Create an account with a profile.
    CreateUser {
        username: String,
        email: String,
        /// Leave out for a CAS-only account.
        #[arg(long)]
        password: Option<String>,
        #[arg(long, default_value = "fadder")]
        user_type: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        #[arg(long)]
        superuser: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::CheckMenus { menu_dir } => check_menus(menu_dir),
        Command::CreateUser {
            username,
            email,
            password,
            user_type,
            first_name,
            last_name,
            superuser,
        } => {
            let account = CreateUser {
                username,
                email,
                password,
                is_superuser: superuser,
            };
            let profile = ProfileInput {
                first_name,
                last_name,
                user_type: user_type.parse::<UserType>()?,
                nolle_group_id: None,
                program: Program::None,
                kth_id: String::new(),
                phone_number: String::new(),
                food_preference: String::new(),
            };
            create_user(account, profile).await
        }
    }
}

async fn serve() -> Result<()> {
    info!("Starting nollesystemet");

    let config = Config::from_env().context("failed to load configuration")?;
    info!(port = config.port, "Configuration loaded");

    // Database, migrations and menus
    let state = AppState::new(&config)
        .await
        .context("failed to initialize application state")?;

    let session_layer = session::create_session_layer(&config.redis_url, config.same_site())
        .await
        .context("failed to create session layer")?;

    let cors = build_cors_layer(&config);

    // Layers, outermost last: trace → CORS → session → principal → gate → handler
    let app = routes::app_router(state)
        .layer(session_layer)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind to address")?;

    info!(%addr, "Server listening");

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

/// Validate menus without touching the database.
fn check_menus(menu_dir: Option<PathBuf>) -> Result<()> {
    let mut config = Config::from_env().unwrap_or_default();
    if let Some(menu_dir) = menu_dir {
        config.menu_dir = menu_dir;
    }

    let store = Arc::new(MemoryStore::new());
    let routes = Arc::new(RouteTable::standard());
    let cas = Arc::new(FakeCasVerifier::new(config.site_url.clone()));
    let state = AppState::from_parts(config, routes, store.clone(), store, cas);

    if let Err(e) = state.preload_menus() {
        error!(error = %e, "menu configuration rejected");
        return Err(e.into());
    }
    info!(dir = %state.config().menu_dir.display(), "all menus valid");
    Ok(())
}

async fn create_user(account: CreateUser, profile: ProfileInput) -> Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;
    let pool = db::create_pool(&config).await?;
    db::run_migrations(&pool).await?;
    let store = PgStore::new(pool);

    if store.find_by_username(&account.username).await?.is_some() {
        anyhow::bail!("username '{}' is already taken", account.username);
    }
    let (user, _) = store.create_user(account, profile).await?;
    info!(user_id = %user.id, username = %user.username, "user created");
    Ok(())
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];

    if config.cors_allowed_origins.len() == 1 && config.cors_allowed_origins[0] == "*" {
        CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(methods)
            .allow_headers(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(tower_http::cors::Any)
            .allow_credentials(true)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,nollesystemet_kernel=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
