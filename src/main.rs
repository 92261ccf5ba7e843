use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use std::sync::Arc;
use std::time::Duration;

use studyshelf::auth;
use studyshelf::config::Config;
use studyshelf::db::{create_pool, init_db, queries, AppState};
use studyshelf::gateway::RazorpayClient;
use studyshelf::handlers;
use studyshelf::models::{Availability, CreateProduct, CreateUser};
use studyshelf::storage::ObjectStore;

#[derive(Parser, Debug)]
#[command(name = "studyshelf")]
#[command(about = "Commerce backend for digital study materials")]
struct Cli {
    /// Seed the database with dev data (user, session, sample products)
    #[arg(long)]
    seed: bool,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

/// Seeds the database with dev data for testing: a customer with a session
/// token and a few products in different availability states.
/// Only runs in dev mode and when the database is empty.
fn seed_dev_data(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seeding");

    let existing = queries::list_products(&conn, true).expect("Failed to list products");
    if !existing.is_empty() {
        tracing::info!("Database already has data, skipping seed");
        return;
    }

    tracing::info!("============================================");
    tracing::info!("SEEDING DEV DATA");
    tracing::info!("============================================");

    let user = queries::create_user(
        &conn,
        &CreateUser {
            email: "dev@studyshelf.local".to_string(),
            name: "Dev Customer".to_string(),
        },
    )
    .expect("Failed to create dev user");

    let token = auth::generate_session_token();
    queries::create_session(&conn, &user.id, &auth::hash_token(&token), 30 * 86400)
        .expect("Failed to create dev session");

    let ready = queries::create_product(
        &conn,
        &CreateProduct {
            title: "Class 12 Physics Notes".to_string(),
            category: "notes".to_string(),
            description: Some("Complete chapter-wise notes".to_string()),
            price: 199.0,
            currency: "INR".to_string(),
            asset_key: Some("notes/class12-physics.pdf".to_string()),
            availability: Availability::Available,
        },
    )
    .expect("Failed to create dev product");

    let upcoming = queries::create_product(
        &conn,
        &CreateProduct {
            title: "JEE Mains Mock Series 2026".to_string(),
            category: "mock-tests".to_string(),
            description: None,
            price: 499.0,
            currency: "INR".to_string(),
            asset_key: None,
            availability: Availability::ComingSoon,
        },
    )
    .expect("Failed to create dev product");

    tracing::info!("User: {} ({})", user.email, user.name);
    tracing::info!("Products: {} / {}", ready.id, upcoming.id);

    // Copy-paste friendly output (no log formatting)
    println!();
    println!("--- COPY FROM HERE ---");
    println!("  session_token: {}", token);
    println!("  user_id: {}", user.id);
    println!("  product_id: {}", ready.id);
    println!("  coming_soon_product_id: {}", upcoming.id);
    println!("--- END COPY ---");
    println!();
}

/// Spawns a background task that runs the trash retention sweep and drops
/// stale webhook dedup rows once a day.
fn spawn_sweep_task(state: AppState) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(24 * 60 * 60);

        loop {
            tokio::time::sleep(interval).await;

            match state.db.get() {
                Ok(conn) => {
                    match queries::purge_expired_trash(&conn, state.trash_retention_days) {
                        Ok(count) if count > 0 => {
                            tracing::info!("Sweep purged {} expired trashed products", count);
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!("Trash sweep failed: {}", e);
                        }
                    }
                    // Gateways retry webhooks for a few days at most.
                    match queries::purge_old_webhook_events(&conn, 7) {
                        Ok(count) if count > 0 => {
                            tracing::debug!("Dropped {} old webhook events", count);
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!("Webhook event cleanup failed: {}", e);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to get db connection for sweep: {}", e);
                }
            }
        }
    });

    tracing::info!("Background sweep task started (runs daily)");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studyshelf=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let state = AppState {
        db: db_pool,
        gateway: Arc::new(RazorpayClient::new(
            &config.gateway_key_id,
            &config.gateway_key_secret,
        )),
        store: ObjectStore::new(&config.storage),
        gateway_key_id: config.gateway_key_id.clone(),
        gateway_key_secret: config.gateway_key_secret.clone(),
        webhook_secret: config.webhook_secret.clone(),
        operator_secret: config.operator_secret.clone(),
        download_ttl_secs: config.download_ttl_secs,
        preparation_window_secs: config.preparation_window_secs,
        trash_retention_days: config.trash_retention_days,
    };

    // Seed dev data if --seed flag is passed (only in dev mode)
    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set STUDYSHELF_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    spawn_sweep_task(state.clone());

    // Build the application router
    let app = Router::new()
        // Customer endpoints (session auth, rate limited)
        .merge(handlers::public_router(config.rate_limits))
        // Webhook endpoint (signature auth)
        .merge(handlers::webhook_router())
        // Operator endpoints (bearer secret auth)
        .merge(handlers::admin_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();

    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("StudyShelf server listening on {}", addr);

    // Use into_make_service_with_connect_info to enable IP-based rate limiting
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        } else {
            tracing::info!("Removed {}", db_path);
        }
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
