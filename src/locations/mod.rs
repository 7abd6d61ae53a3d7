//! Prefecture/city reference data, seeded from a bundled CSV.

pub mod model;
pub mod routes;

pub use model::Location;
pub use routes::location_routes;
