//! Chat — one room per application, polled by clients.

pub mod model;
pub mod routes;
pub mod service;

pub use model::{ChatRoom, Message};
pub use routes::chat_routes;
pub use service::ChatManager;
