//! Accounts — users, roles, sessions and onboarding profiles.
//!
//! Every user is either a company (posts listings) or a worker (applies).
//! After registering, a user fills in the profile matching their role;
//! until then `GET /api/me` reports `needs_onboarding`.

pub mod model;
pub mod password;
pub mod routes;
pub mod service;

pub use model::{Profile, Role, User};
pub use routes::account_routes;
pub use service::AccountManager;
