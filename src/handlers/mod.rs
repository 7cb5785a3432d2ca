pub mod account_handlers;
pub mod auth_handlers;
pub mod dashboard;
pub mod form_body;
pub mod form_handlers;
pub mod identity_handlers;
