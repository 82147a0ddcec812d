//! HTTP route handlers

pub mod health;

pub use health::{health_check, root_info, version_info};
