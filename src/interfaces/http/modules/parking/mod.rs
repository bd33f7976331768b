//! Park / exit endpoints and per-lot read models

pub mod dto;
pub mod handlers;

pub use dto::*;
pub use handlers::*;
