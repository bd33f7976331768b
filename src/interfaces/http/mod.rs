//! HTTP REST API
//!
//! - `common`: response envelope, error mapping, validated JSON extractor
//! - `modules`: handlers grouped by resource
//! - `router`: route table and OpenAPI document

pub mod common;
pub mod modules;
pub mod router;

pub use common::{ApiError, ApiResponse};
pub use router::{create_api_router, AppState};
