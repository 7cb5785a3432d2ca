//! Routing and session guard tests against the real handlers.

mod common;

use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::{Cookie, Key};
use actix_web::dev::ServiceResponse;
use actix_web::{App, http::StatusCode, middleware, test, web};

use slotbook::auth::{self, rate_limit::RateLimiter};
use slotbook::config::Config;
use slotbook::handlers;
use slotbook::models::admin;
use slotbook::models::identity::{self, TokenBundle};
use common::*;

const TEST_PASSWORD: &str = "password123";

macro_rules! app {
    ($h:expr) => {
        app!($h, $h.config.clone())
    };
    ($h:expr, $config:expr) => {
        test::init_service(
            App::new()
                .wrap(
                    SessionMiddleware::builder(CookieSessionStore::default(), Key::generate())
                        .cookie_secure(false)
                        .build(),
                )
                .app_data(web::Data::new($config))
                .app_data(web::Data::from($h.engine.clone()))
                .app_data(web::Data::new(RateLimiter::default()))
                .route("/login", web::get().to(handlers::auth_handlers::login_page))
                .route("/login", web::post().to(handlers::auth_handlers::login_submit))
                .route("/set-password", web::get().to(handlers::auth_handlers::set_password_page))
                .service(
                    web::scope("")
                        .wrap(middleware::from_fn(auth::middleware::require_auth))
                        .route("/logout", web::post().to(handlers::auth_handlers::logout))
                        .route("/dashboard", web::get().to(handlers::dashboard::index))
                        .route("/identity", web::get().to(handlers::identity_handlers::show))
                        .route("/forms", web::post().to(handlers::form_handlers::create))
                        .route("/forms/{id}/refresh", web::post().to(handlers::form_handlers::refresh)),
                ),
        )
        .await
    };
}

/// Logged-in administrator session: the session cookie and its CSRF token.
struct SignedIn {
    cookie: Cookie<'static>,
    csrf_token: String,
}

impl SignedIn {
    /// Keep the cookie current when a response rewrites the session.
    fn track(&mut self, resp: &ServiceResponse) {
        if let Some(cookie) = session_cookie(resp) {
            self.cookie = cookie;
        }
    }
}

fn session_cookie(resp: &ServiceResponse) -> Option<Cookie<'static>> {
    resp.response().cookies().find(|c| c.name() == "id").map(|c| c.into_owned())
}

fn csrf_from_html(html: &str) -> String {
    let field = html.find(r#"name="csrf_token""#).expect("csrf field");
    let rest = &html[field..];
    let start = rest.find(r#"value=""#).expect("csrf value") + r#"value=""#.len();
    let end = rest[start..].find('"').expect("closing quote");
    rest[start..start + end].to_string()
}

/// Log in through the real login form.
macro_rules! log_in {
    ($app:expr) => {{
        let resp = test::call_service(&$app, test::TestRequest::get().uri("/login").to_request()).await;
        let cookie = session_cookie(&resp).expect("session cookie");
        let html = String::from_utf8_lossy(&test::read_body(resp).await).into_owned();
        let csrf_token = csrf_from_html(&html);

        let req = test::TestRequest::post()
            .uri("/login")
            .cookie(cookie.clone())
            .set_form([("password", TEST_PASSWORD), ("csrf_token", csrf_token.as_str())])
            .to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&resp), "/dashboard");

        let mut signed_in = SignedIn { cookie, csrf_token };
        signed_in.track(&resp);
        signed_in
    }};
}

fn save_identity(config: &Config) {
    let bundle: TokenBundle = serde_json::from_str(
        r#"{"token": "ya29.x", "refresh_token": "1//r", "client_id": "cid", "client_secret": "sec"}"#,
    )
    .unwrap();
    identity::save(&config.identity_file(), &bundle).unwrap();
}

fn location(resp: &ServiceResponse) -> String {
    resp.headers()
        .get("Location")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[actix_rt::test]
async fn test_login_sends_first_run_to_set_password() {
    let h = setup_engine();
    let app = app!(h);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/login").to_request()).await;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/set-password");
}

#[actix_rt::test]
async fn test_set_password_is_closed_once_set() {
    let h = setup_engine();
    admin::set_password(&h.config.admin_auth_file(), TEST_PASSWORD).unwrap();
    let app = app!(h);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/set-password").to_request()).await;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login");
}

#[actix_rt::test]
async fn test_login_page_renders_with_csrf_field() {
    let h = setup_engine();
    admin::set_password(&h.config.admin_auth_file(), TEST_PASSWORD).unwrap();
    let app = app!(h);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/login").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = test::read_body(resp).await;
    let html = String::from_utf8_lossy(&body);
    assert!(html.contains(r#"name="csrf_token""#));
}

#[actix_rt::test]
async fn test_protected_route_redirects_to_login() {
    let h = setup_engine();
    let app = app!(h);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/dashboard").to_request()).await;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login");
}

#[actix_rt::test]
async fn test_login_post_without_session_token_is_forbidden() {
    let h = setup_engine();
    admin::set_password(&h.config.admin_auth_file(), TEST_PASSWORD).unwrap();
    let app = app!(h);

    let req = test::TestRequest::post()
        .uri("/login")
        .set_form([("password", TEST_PASSWORD), ("csrf_token", "forged")])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_rt::test]
async fn test_form_action_without_identity_redirects_to_identity() {
    let h = setup_engine();
    admin::set_password(&h.config.admin_auth_file(), TEST_PASSWORD).unwrap();
    let app = app!(h);
    let signed_in = log_in!(app);

    let req = test::TestRequest::post()
        .uri("/forms/form-1/refresh")
        .cookie(signed_in.cookie.clone())
        .set_form([("csrf_token", signed_in.csrf_token.as_str())])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/identity");
}

#[actix_rt::test]
async fn test_logout_forgets_identity() {
    let h = setup_engine();
    admin::set_password(&h.config.admin_auth_file(), TEST_PASSWORD).unwrap();
    save_identity(&h.config);
    let app = app!(h);
    let signed_in = log_in!(app);

    let req = test::TestRequest::post()
        .uri("/logout")
        .cookie(signed_in.cookie.clone())
        .set_form([("csrf_token", signed_in.csrf_token.as_str())])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login");
    assert!(!h.config.identity_file().exists());
}

#[actix_rt::test]
async fn test_create_with_only_expired_slot_rerenders_dashboard() {
    let h = setup_engine();
    admin::set_password(&h.config.admin_auth_file(), TEST_PASSWORD).unwrap();
    save_identity(&h.config);
    let mut config = h.config.clone();
    config.master_form_id = MASTER_FORM_ID.to_string();
    let app = app!(h, config);
    let signed_in = log_in!(app);

    let body = serde_urlencoded::to_string([
        ("csrf_token", signed_in.csrf_token.as_str()),
        ("class_name", "Chemistry"),
        ("meet_link", ""),
        ("slot_name[]", "Morning"),
        ("slot_limit[]", "3"),
        ("slot_date[]", "2020-01-01T10:00"),
        ("slot_name[]", ""),
        ("slot_limit[]", ""),
        ("slot_date[]", ""),
    ])
    .unwrap();
    let req = test::TestRequest::post()
        .uri("/forms")
        .cookie(signed_in.cookie.clone())
        .insert_header(("Content-Type", "application/x-www-form-urlencoded"))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let html = String::from_utf8_lossy(&test::read_body(resp).await).into_owned();
    assert!(html.contains("No valid slots available to display."));
    assert!(h.store.load_all().unwrap().is_empty());
    assert!(h.workspace.state.lock().unwrap().forms.is_empty());
}
