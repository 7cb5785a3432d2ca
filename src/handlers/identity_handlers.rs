use actix_session::Session;
use actix_web::{HttpResponse, web};
use serde::Deserialize;

use crate::auth::csrf;
use crate::auth::session::set_flash;
use crate::config::Config;
use crate::engine::Engine;
use crate::errors::{AppError, render, see_other};
use crate::models::identity::{self, TokenBundle};
use crate::templates_structs::{IdentityTemplate, PageContext};

#[derive(Deserialize)]
pub struct IdentityForm {
    pub token_json: String,
    pub csrf_token: String,
}

/// Redirect to the identity page when no token bundle is cached.
pub fn require_identity(config: &Config, session: &Session) -> Option<HttpResponse> {
    if config.identity_file().exists() {
        return None;
    }
    set_flash(session, "Connect the cloud identity first.");
    Some(see_other("/identity"))
}

fn page(config: &Config, session: &Session, errors: Vec<String>) -> Result<HttpResponse, AppError> {
    let scopes = identity::load(&config.identity_file())?
        .map(|bundle| bundle.scopes)
        .unwrap_or_default();
    let ctx = PageContext::build(session, config);
    render(IdentityTemplate { ctx, errors, scopes })
}

pub async fn show(
    config: web::Data<Config>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    page(&config, &session, vec![])
}

pub async fn connect(
    config: web::Data<Config>,
    engine: web::Data<Engine>,
    session: Session,
    form: web::Form<IdentityForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;

    let bundle: TokenBundle = match serde_json::from_str(form.token_json.trim()) {
        Ok(bundle) => bundle,
        Err(e) => return page(&config, &session, vec![format!("Token file is not valid JSON: {e}")]),
    };
    let errors = identity::validate(&bundle);
    if !errors.is_empty() {
        return page(&config, &session, errors);
    }

    identity::save(&config.identity_file(), &bundle)?;
    engine.workspace().forget_identity().await;
    log::info!("Cloud identity connected ({} scopes)", bundle.scopes.len());
    set_flash(&session, "Cloud identity connected.");
    Ok(see_other("/dashboard"))
}
