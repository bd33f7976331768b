//! Payment initiation, session detail and manual polling

pub mod dto;
pub mod handlers;

pub use dto::*;
pub use handlers::*;
