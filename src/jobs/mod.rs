//! Job posts — listings companies publish and workers apply to.

pub mod model;
pub mod routes;
pub mod service;

pub use model::{JobFilter, JobPost, JobPostForm, JobPostView, Purpose};
pub use routes::job_routes;
pub use service::JobManager;
