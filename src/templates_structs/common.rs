use askama::Template;

use super::PageContext;

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub error: Option<String>,
    pub app_name: String,
    pub csrf_token: String,
}

/// First-run page, shown while no administrator password exists.
#[derive(Template)]
#[template(path = "set_password.html")]
pub struct SetPasswordTemplate {
    pub errors: Vec<String>,
    pub app_name: String,
    pub csrf_token: String,
}

#[derive(Template)]
#[template(path = "account.html")]
pub struct AccountTemplate {
    pub ctx: PageContext,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "identity.html")]
pub struct IdentityTemplate {
    pub ctx: PageContext,
    pub errors: Vec<String>,
    pub scopes: Vec<String>,
}
