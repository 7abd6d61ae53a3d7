//! Applications — a worker's request to join a job post.
//!
//! Lifecycle is `applied` → `accepted` | `rejected`. Submitting opens a chat
//! room between the applicant and the post owner.

pub mod model;
pub mod routes;
pub mod service;

pub use model::{ApplicationStatus, JobApplication};
pub use routes::application_routes;
pub use service::ApplicationManager;
