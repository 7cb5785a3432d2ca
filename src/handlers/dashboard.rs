use actix_session::Session;
use actix_web::{HttpResponse, web};

use crate::config::Config;
use crate::engine::{Engine, local_now};
use crate::errors::{AppError, render};
use crate::models::form::EXPIRY_FORMAT;
use crate::templates_structs::{DashboardTemplate, PageContext};

/// Form list plus the creation form. `errors` come from a rejected creation.
pub fn render_dashboard(
    config: &Config,
    engine: &Engine,
    session: &Session,
    errors: Vec<String>,
) -> Result<HttpResponse, AppError> {
    let ctx = PageContext::build(session, config);
    let forms = engine.store().load_all()?;
    render(DashboardTemplate {
        ctx,
        forms,
        errors,
        min_expiry: local_now().format(EXPIRY_FORMAT).to_string(),
        master_configured: !config.master_form_id.is_empty(),
    })
}

pub async fn index(
    config: web::Data<Config>,
    engine: web::Data<Engine>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    render_dashboard(&config, &engine, &session, vec![])
}
