use actix_session::Session;
use actix_web::{HttpRequest, HttpResponse, web};
use serde::Deserialize;

use crate::auth::session::{is_admin, mark_admin, set_flash};
use crate::auth::{csrf, password, rate_limit::RateLimiter};
use crate::config::Config;
use crate::engine::Engine;
use crate::errors::{AppError, render, see_other};
use crate::models::{admin, identity};
use crate::templates_structs::{LoginTemplate, SetPasswordTemplate};

#[derive(Deserialize)]
pub struct LoginForm {
    pub password: String,
    pub csrf_token: String,
}

#[derive(Deserialize)]
pub struct SetPasswordForm {
    pub new_password: String,
    pub confirm_password: String,
    pub csrf_token: String,
}

#[derive(Deserialize)]
pub struct CsrfOnly {
    pub csrf_token: String,
}

fn login_error(config: &Config, session: &Session, error: &str) -> Result<HttpResponse, AppError> {
    render(LoginTemplate {
        error: Some(error.to_string()),
        app_name: config.app_name.clone(),
        csrf_token: csrf::get_or_create_token(session),
    })
}

pub async fn login_page(
    config: web::Data<Config>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    if !admin::exists(&config.admin_auth_file()) {
        return Ok(see_other("/set-password"));
    }
    if is_admin(&session) {
        return Ok(see_other("/dashboard"));
    }

    let csrf_token = csrf::get_or_create_token(&session);
    render(LoginTemplate { error: None, app_name: config.app_name.clone(), csrf_token })
}

pub async fn login_submit(
    req: HttpRequest,
    config: web::Data<Config>,
    session: Session,
    form: web::Form<LoginForm>,
    limiter: web::Data<RateLimiter>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;

    let auth_file = config.admin_auth_file();
    if !admin::exists(&auth_file) {
        return Ok(see_other("/set-password"));
    }

    let ip = req
        .peer_addr()
        .map(|addr| addr.ip())
        .unwrap_or(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED));

    if limiter.is_blocked(ip) {
        log::warn!("Login blocked for {ip}: too many failures");
        return login_error(&config, &session, "Too many failed login attempts. Please try again later.");
    }

    if admin::verify(&auth_file, &form.password)? {
        limiter.clear(ip);
        mark_admin(&session);
        log::info!("Administrator logged in from {ip}");
        Ok(see_other("/dashboard"))
    } else {
        limiter.record_failure(ip);
        login_error(&config, &session, "Invalid password")
    }
}

pub async fn set_password_page(
    config: web::Data<Config>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    if admin::exists(&config.admin_auth_file()) {
        return Ok(see_other("/login"));
    }
    render(SetPasswordTemplate {
        errors: vec![],
        app_name: config.app_name.clone(),
        csrf_token: csrf::get_or_create_token(&session),
    })
}

pub async fn set_password_submit(
    config: web::Data<Config>,
    session: Session,
    form: web::Form<SetPasswordForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;

    let auth_file = config.admin_auth_file();
    if admin::exists(&auth_file) {
        return Ok(see_other("/login"));
    }

    let errors = password::check_new_password(&form.new_password, &form.confirm_password);
    if !errors.is_empty() {
        return render(SetPasswordTemplate {
            errors,
            app_name: config.app_name.clone(),
            csrf_token: csrf::get_or_create_token(&session),
        });
    }

    admin::set_password(&auth_file, &form.new_password)?;
    log::info!("Administrator password set");
    mark_admin(&session);
    set_flash(&session, "Password set. Connect the cloud identity to start creating forms.");
    Ok(see_other("/identity"))
}

/// End the session and forget the cloud identity.
pub async fn logout(
    config: web::Data<Config>,
    engine: web::Data<Engine>,
    session: Session,
    form: web::Form<CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    session.purge();
    identity::clear(&config.identity_file())?;
    engine.workspace().forget_identity().await;
    log::info!("Administrator logged out; cloud identity cleared");
    Ok(see_other("/login"))
}
