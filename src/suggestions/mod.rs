//! Suggestions — phrases mined from job post details for autocomplete.

pub mod classifier;
pub mod model;
pub mod routes;

pub use classifier::{Classifier, MinedPhrase};
pub use routes::suggestion_routes;
