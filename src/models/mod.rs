pub mod auth_app;
pub mod submission;
pub mod taxpayer;
pub mod upstream_token;
pub mod user;
