pub mod admin;
pub mod form;
pub mod identity;
pub mod submission;
