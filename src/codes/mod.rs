//! Generic tag codes (`want_you` / `can_do`) attached to job posts.

pub mod model;
pub mod routes;

pub use model::{Code, CodeType};
pub use routes::code_routes;
