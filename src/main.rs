use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::{App, HttpServer, cookie::Key, middleware, web};
use std::sync::Arc;

use slotbook::auth::{self, rate_limit::RateLimiter};
use slotbook::config::Config;
use slotbook::engine::notify::HttpNotifier;
use slotbook::engine::{Engine, scheduler};
use slotbook::google::GoogleWorkspace;
use slotbook::handlers;
use slotbook::models::form::FormStore;

/// Upper bound for form posts; notes PDFs arrive base64-encoded inside them.
const MAX_BODY_BYTES: usize = 15 * 1024 * 1024;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = Config::from_env();

    // Ensure data directory exists
    std::fs::create_dir_all(&config.data_dir)?;

    if config.master_form_id.is_empty() {
        log::warn!("MASTER_FORM_ID is not set; form creation is disabled");
    }
    if config.gateway.user.is_empty() {
        log::warn!("GATEWAY_USER is not set; reminder messages will be rejected by the gateway");
    }

    // Session key from SESSION_KEY, stable across restarts
    let secret_key = match config.session_key.as_deref() {
        Some(val) if val.len() >= 64 => {
            log::info!("Using SESSION_KEY from environment");
            Key::from(val.as_bytes())
        }
        Some(val) => {
            log::warn!("SESSION_KEY too short ({} bytes, need 64+), generating random key", val.len());
            Key::generate()
        }
        None => {
            log::warn!("No SESSION_KEY set, generating random key (sessions lost on restart)");
            Key::generate()
        }
    };

    let store = Arc::new(FormStore::new(config.forms_file()));
    let workspace = Arc::new(GoogleWorkspace::new(config.identity_file()));
    let notifier = Arc::new(HttpNotifier::new(config.gateway.clone()));
    let engine = Arc::new(Engine::new(store, workspace, notifier, config.gateway.clone()));

    scheduler::spawn_scheduler(engine.clone(), config.worker_interval, config.identity_file());

    let limiter = RateLimiter::default();
    let bind_addr = config.bind_addr.clone();
    let config = web::Data::new(config);
    let engine = web::Data::from(engine);

    log::info!("Starting server at http://{bind_addr}");

    HttpServer::new(move || {
        let session_mw = SessionMiddleware::builder(
            CookieSessionStore::default(),
            secret_key.clone(),
        )
        .cookie_secure(false)
        .cookie_http_only(true)
        .build();

        App::new()
            .wrap(session_mw)
            .wrap(middleware::Logger::default())
            .app_data(config.clone())
            .app_data(engine.clone())
            .app_data(web::Data::new(limiter.clone()))
            .app_data(web::PayloadConfig::new(MAX_BODY_BYTES))
            .app_data(web::FormConfig::default().limit(MAX_BODY_BYTES))
            // Static files
            .service(actix_files::Files::new("/static", "./static"))
            // Public routes
            .route("/login", web::get().to(handlers::auth_handlers::login_page))
            .route("/login", web::post().to(handlers::auth_handlers::login_submit))
            .route("/set-password", web::get().to(handlers::auth_handlers::set_password_page))
            .route("/set-password", web::post().to(handlers::auth_handlers::set_password_submit))
            // Root redirect
            .route("/", web::get().to(|| async {
                actix_web::HttpResponse::SeeOther()
                    .insert_header(("Location", "/dashboard"))
                    .finish()
            }))
            // Protected routes
            .service(
                web::scope("")
                    .wrap(middleware::from_fn(auth::middleware::require_auth))
                    .route("/logout", web::post().to(handlers::auth_handlers::logout))
                    .route("/dashboard", web::get().to(handlers::dashboard::index))
                    // Account
                    .route("/account", web::get().to(handlers::account_handlers::form))
                    .route("/account", web::post().to(handlers::account_handlers::submit))
                    // Cloud identity
                    .route("/identity", web::get().to(handlers::identity_handlers::show))
                    .route("/identity", web::post().to(handlers::identity_handlers::connect))
                    // Forms
                    .route("/forms", web::post().to(handlers::form_handlers::create))
                    .route("/forms/{id}/metadata", web::get().to(handlers::form_handlers::edit_metadata_page))
                    .route("/forms/{id}/metadata", web::post().to(handlers::form_handlers::edit_metadata_submit))
                    .route("/forms/{id}/submissions", web::get().to(handlers::form_handlers::submissions))
                    .route("/forms/{id}/deploy", web::post().to(handlers::form_handlers::deploy))
                    .route("/forms/{id}/refresh", web::post().to(handlers::form_handlers::refresh))
                    .route("/forms/{id}/cancel", web::post().to(handlers::form_handlers::cancel))
                    .route("/forms/{id}/sheet-url", web::post().to(handlers::form_handlers::update_sheet_url))
                    .route("/forms/{id}/delete", web::post().to(handlers::form_handlers::delete))
            )
            // Default 404 handler (must be registered last)
            .default_service(web::to(|| async {
                let html = include_str!("../templates/errors/404.html");
                actix_web::HttpResponse::NotFound()
                    .content_type("text/html; charset=utf-8")
                    .body(html)
            }))
    })
    .bind(bind_addr)?
    .run()
    .await
}
