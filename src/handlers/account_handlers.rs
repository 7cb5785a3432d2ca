use actix_session::Session;
use actix_web::{HttpResponse, web};
use serde::Deserialize;

use crate::auth::session::set_flash;
use crate::auth::{csrf, password};
use crate::config::Config;
use crate::errors::{AppError, render, see_other};
use crate::models::admin;
use crate::templates_structs::{AccountTemplate, PageContext};

#[derive(Deserialize)]
pub struct ChangePasswordForm {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
    pub csrf_token: String,
}

pub async fn form(
    config: web::Data<Config>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let ctx = PageContext::build(&session, &config);
    render(AccountTemplate { ctx, errors: vec![] })
}

pub async fn submit(
    config: web::Data<Config>,
    session: Session,
    form: web::Form<ChangePasswordForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;

    let errors = password::check_new_password(&form.new_password, &form.confirm_password);
    if !errors.is_empty() {
        let ctx = PageContext::build(&session, &config);
        return render(AccountTemplate { ctx, errors });
    }

    if !admin::change_password(&config.admin_auth_file(), &form.current_password, &form.new_password)? {
        let ctx = PageContext::build(&session, &config);
        let errors = vec!["Current password is incorrect".to_string()];
        return render(AccountTemplate { ctx, errors });
    }

    log::info!("Administrator password changed");
    set_flash(&session, "Password changed successfully");
    Ok(see_other("/account"))
}
