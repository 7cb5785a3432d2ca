pub mod auth;
pub mod config;
pub mod engine;
pub mod errors;
pub mod google;
pub mod handlers;
pub mod models;
pub mod templates_structs;
