use axum::http::HeaderValue;
use axum::routing::get;
use axum::Router;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use franchise_api_rust::config;
use franchise_api_rust::database::manager::DatabaseManager;
use franchise_api_rust::middleware::jwt_auth_middleware;

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = config::config();
    tracing::info!("Starting Franchise API in {:?} mode", config.environment);

    if config.database.run_migrations {
        if let Err(e) = DatabaseManager::run_migrations().await {
            // Keep lazy-pool semantics: the server can come up before the
            // database does and report degraded health until it recovers.
            tracing::warn!("Skipping migrations at startup: {}", e);
        }
    }

    let app = app();

    // Allow tests or deployments to override port via env
    let port = std::env::var("FRANCHISE_API_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("Franchise API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}

fn app() -> Router {
    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_public_routes())
        // Protected API behind JWT middleware
        .merge(api_routes())
        // Global middleware
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

fn cors_layer() -> CorsLayer {
    let security = &config::config().security;
    if !security.enable_cors {
        return CorsLayer::new();
    }
    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    if origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

fn auth_public_routes() -> Router {
    use axum::routing::post;
    use franchise_api_rust::handlers::public::auth;

    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
}

fn api_routes() -> Router {
    use axum::routing::{delete, patch, post};
    use franchise_api_rust::handlers::protected::{
        auth, dashboard, documents, franchises, leads, notes, notifications, products, reviews,
        revenues, royalties, support, tasks, transactions, units, users,
    };

    Router::new()
        .route("/api/auth/whoami", get(auth::whoami))
        .route("/api/dashboard", get(dashboard::summary))
        // Franchises
        .route("/api/franchises", get(franchises::list).post(franchises::create))
        .route(
            "/api/franchises/:id",
            get(franchises::get)
                .patch(franchises::update)
                .delete(franchises::delete),
        )
        .route("/api/franchises/:id/stats", get(franchises::stats))
        .route("/api/franchises/:id/logo", post(franchises::upload_logo))
        // Units
        .route("/api/units", get(units::list).post(units::create))
        .route(
            "/api/units/:id",
            get(units::get).patch(units::update).delete(units::delete),
        )
        .route("/api/units/:id/performance", get(units::performance))
        .route(
            "/api/units/:id/reviews",
            get(reviews::list).post(reviews::create),
        )
        // Leads
        .route("/api/leads", get(leads::list).post(leads::create))
        .route("/api/leads/export", get(leads::export))
        .route("/api/leads/import", post(leads::import))
        .route(
            "/api/leads/:id",
            get(leads::get).patch(leads::update).delete(leads::delete),
        )
        .route("/api/leads/:id/status", patch(leads::update_status))
        // Tasks
        .route("/api/tasks", get(tasks::list).post(tasks::create))
        .route(
            "/api/tasks/:id",
            get(tasks::get).patch(tasks::update).delete(tasks::delete),
        )
        .route("/api/tasks/:id/complete", post(tasks::complete))
        // Revenues
        .route("/api/revenues", get(revenues::list).post(revenues::create))
        .route("/api/revenues/summary", get(revenues::summary))
        .route(
            "/api/revenues/:id",
            get(revenues::get)
                .patch(revenues::update)
                .delete(revenues::delete),
        )
        .route("/api/revenues/:id/status", patch(revenues::update_status))
        // Transactions
        .route(
            "/api/transactions",
            get(transactions::list).post(transactions::create),
        )
        .route("/api/transactions/summary", get(transactions::summary))
        .route(
            "/api/transactions/:id",
            get(transactions::get)
                .patch(transactions::update)
                .delete(transactions::delete),
        )
        // Royalties
        .route("/api/royalties", get(royalties::list))
        .route("/api/royalties/summary", get(royalties::summary))
        .route("/api/royalties/generate", post(royalties::generate))
        .route("/api/royalties/:id", get(royalties::get))
        .route("/api/royalties/:id/status", patch(royalties::update_status))
        // Documents
        .route("/api/documents", get(documents::list).post(documents::upload))
        .route(
            "/api/documents/:id",
            get(documents::get).delete(documents::delete),
        )
        .route("/api/documents/:id/download", get(documents::download))
        .route("/api/documents/:id/status", patch(documents::update_status))
        // Products
        .route("/api/products", get(products::list).post(products::create))
        .route("/api/products/export", get(products::export))
        .route(
            "/api/products/:id",
            get(products::get)
                .patch(products::update)
                .delete(products::delete),
        )
        .route("/api/products/:id/image", post(products::upload_image))
        // Notes
        .route("/api/notes", get(notes::list).post(notes::create))
        .route("/api/notes/:id", delete(notes::delete))
        // Reviews (creation/listing lives under /api/units/:id/reviews)
        .route("/api/reviews/:id", delete(reviews::delete))
        // Notifications
        .route("/api/notifications", get(notifications::list))
        .route("/api/notifications/read-all", post(notifications::mark_all_read))
        .route("/api/notifications/unread-count", get(notifications::unread_count))
        .route("/api/notifications/:id/read", post(notifications::mark_read))
        // Support
        .route("/api/support", get(support::list).post(support::create))
        .route(
            "/api/support/:id",
            get(support::get)
                .patch(support::update)
                .delete(support::delete),
        )
        .route("/api/support/:id/status", patch(support::update_status))
        // Users
        .route("/api/users", get(users::list).post(users::create))
        .route(
            "/api/users/:id",
            get(users::get).patch(users::update).delete(users::delete),
        )
        .route("/api/users/:id/avatar", post(users::upload_avatar))
        .layer(axum::middleware::from_fn(jwt_auth_middleware))
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "success": true,
        "data": {
            "name": "Franchise API",
            "version": version,
            "description": "Multi-tenant franchise management backend",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "auth": "/auth/register, /auth/login (public - token acquisition)",
                "dashboard": "/api/dashboard (protected)",
                "franchises": "/api/franchises[/:id] (protected)",
                "units": "/api/units[/:id] (protected)",
                "leads": "/api/leads[/:id] (protected)",
                "tasks": "/api/tasks[/:id] (protected)",
                "revenues": "/api/revenues[/:id] (protected)",
                "transactions": "/api/transactions[/:id] (protected)",
                "royalties": "/api/royalties[/:id] (protected)",
                "documents": "/api/documents[/:id] (protected)",
                "products": "/api/products[/:id] (protected)",
                "notifications": "/api/notifications (protected)",
                "support": "/api/support[/:id] (protected)",
            }
        }
    }))
}

async fn health() -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            axum::response::Json(json!({
                "success": false,
                "message": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}
