//! Portfolio CMS - library for app logic and testing

pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod logging;
pub mod routes;
pub mod state;
pub mod store;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, patch, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    services::ServeDir, trace::TraceLayer,
};

use crate::config::{Config, DEFAULT_JWT_SECRET};
use crate::state::AppState;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Multipart uploads carry up to 5 MB of image plus framing.
const MAX_BODY_SIZE: usize = 8 * 1024 * 1024;

/// Configure CORS from environment variables.
/// Uses ALLOWED_ORIGINS (comma-separated) or FRONTEND_ORIGIN.
/// Falls back to the local dev frontend.
pub fn configure_cors() -> CorsLayer {
    let allowed_origins = std::env::var("ALLOWED_ORIGINS")
        .ok()
        .and_then(|s| {
            let origins: Vec<HeaderValue> = s
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                None
            } else {
                Some(origins)
            }
        })
        .or_else(|| {
            std::env::var("FRONTEND_ORIGIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(|origin| vec![origin])
        })
        .unwrap_or_else(|| {
            vec![
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://127.0.0.1:3000"),
            ]
        });

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
        .allow_credentials(true)
}

/// Create and configure the application router.
pub fn create_app(state: AppState) -> Router {
    let cors = configure_cors();
    let public = ServeDir::new(&state.config.public_dir);

    Router::new()
        // Identity
        .route("/api/auth/login", post(routes::auth::login))
        .route(
            "/api/auth/verify",
            get(routes::auth::verify_token).post(routes::auth::verify_token),
        )
        .route("/api/auth/refresh", post(routes::auth::refresh))
        .route("/api/auth/logout", post(routes::auth::logout))
        // Public content
        .route("/api/blog", get(routes::blog::list_posts))
        .route("/api/blog/{slug}", get(routes::blog::get_post))
        .route("/api/portfolio", get(routes::portfolio::list_items))
        .route("/api/portfolio/{id}", get(routes::portfolio::get_item))
        .route("/api/partners", get(routes::partners::list_partners))
        .route("/api/testimonials", get(routes::site::list_testimonials))
        .route("/api/site/{section}", get(routes::site::get_section))
        .route("/api/contact", post(routes::contact::submit_contact))
        .route("/api/contact/status", get(routes::contact::contact_status))
        .route("/files/{*key}", get(routes::upload::serve_file))
        .route("/rss.xml", get(routes::rss::rss_feed))
        // Admin
        .route(
            "/api/admin/blog",
            get(routes::blog::admin_list_posts).post(routes::blog::create_post),
        )
        .route(
            "/api/admin/blog/{id}",
            get(routes::blog::admin_get_post)
                .patch(routes::blog::update_post)
                .delete(routes::blog::delete_post),
        )
        .route(
            "/api/admin/portfolio",
            get(routes::portfolio::admin_list_items).post(routes::portfolio::create_item),
        )
        .route(
            "/api/admin/portfolio/{id}",
            get(routes::portfolio::admin_get_item)
                .patch(routes::portfolio::update_item)
                .delete(routes::portfolio::delete_item),
        )
        .route(
            "/api/admin/partners",
            get(routes::partners::admin_list_partners).post(routes::partners::create_partner),
        )
        .route(
            "/api/admin/partners/{id}",
            patch(routes::partners::update_partner).delete(routes::partners::delete_partner),
        )
        .route(
            "/api/admin/partners/{id}/move",
            post(routes::partners::move_partner),
        )
        .route("/api/admin/messages", get(routes::messages::list_messages))
        .route(
            "/api/admin/messages/{store}/{id}",
            axum::routing::delete(routes::messages::delete_message),
        )
        .route(
            "/api/admin/messages/{store}/{id}/read",
            patch(routes::messages::mark_read),
        )
        .route("/api/admin/stats", get(routes::dashboard::stats))
        .route(
            "/api/admin/settings/password",
            post(routes::dashboard::change_password),
        )
        .route("/api/admin/site/{section}", patch(routes::site::update_section))
        .route(
            "/api/admin/uploads/{namespace}",
            post(routes::upload::upload_image),
        )
        // Health
        .route("/health", get(routes::health::health_ping))
        .route("/health/detailed", get(routes::health::health_detailed))
        .route("/health/database", get(routes::health::health_database))
        .route("/health/ready", get(routes::health::health_ready))
        // Static site, with /admin pages behind the identity gate
        .fallback_service(public)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            routes::extract::require_admin_page,
        ))
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            logging::middleware::log_request,
        ))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        // Compress responses with gzip/br/zstd automatically
        .layer(CompressionLayer::new())
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(cors)
        .with_state(state)
}

/// Refuse to start in production with the insecure default JWT secret.
fn check_production_config(config: &Config) -> Result<(), BoxError> {
    if !config.is_production() {
        return Ok(());
    }
    if config.jwt_secret.is_empty() || config.jwt_secret == DEFAULT_JWT_SECRET {
        return Err("JWT_SECRET must be set to a secure, unique value in production".into());
    }
    if config.admin_email.is_none() || config.admin_password_hash.is_none() {
        tracing::warn!(
            "SECURITY: ADMIN_EMAIL and ADMIN_PASSWORD_HASH are not both set. \
             Admin login is disabled until a credential is configured."
        );
    }
    Ok(())
}

/// Run the server (used by main).
pub async fn run() -> Result<(), BoxError> {
    dotenvy::dotenv().ok();

    // Dropping the guards shuts down the background log writers
    let _log_guards = logging::init(&logging::LogSettings::from_env());

    let config = Config::from_env();
    if let Err(e) = check_production_config(&config) {
        tracing::error!("FATAL: {}. Refusing to start.", e);
        return Err(e);
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid HOST/PORT configuration: {}", e))?;

    let state = AppState::connect(config).await;
    let app = create_app(state);

    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
