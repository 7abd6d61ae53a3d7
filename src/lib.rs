//! みんなの平泉 — regional job matching between hosts and helpers.

pub mod accounts;
pub mod app;
pub mod applications;
pub mod auth;
pub mod chat;
pub mod codes;
pub mod config;
pub mod error;
pub mod extract;
pub mod jobs;
pub mod locations;
pub mod logging;
pub mod policy;
pub mod store;
pub mod suggestions;
pub mod validation;

pub use app::{AppState, build_router};
pub use config::AppConfig;
