// Template context structures for Askama templates.

mod common;
mod forms;

pub use common::*;
pub use forms::*;

use actix_session::Session;

use crate::auth::csrf;
use crate::auth::session::take_flash;
use crate::config::Config;

/// Common context shared by all authenticated pages.
/// Templates access these as `ctx.app_name`, `ctx.csrf_token`, etc.
pub struct PageContext {
    pub app_name: String,
    pub csrf_token: String,
    pub flash: Option<String>,
    pub identity_connected: bool,
}

impl PageContext {
    pub fn build(session: &Session, config: &Config) -> Self {
        Self {
            app_name: config.app_name.clone(),
            csrf_token: csrf::get_or_create_token(session),
            flash: take_flash(session),
            identity_connected: config.identity_file().exists(),
        }
    }
}
