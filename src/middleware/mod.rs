pub mod access;
pub mod auth_context;
