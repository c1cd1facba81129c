//! Remote API integration module.
//!
//! This module defines the capability set the engine consumes from the
//! cloud provider: role and function operations, and their request types.

mod client;
mod types;

pub use client::{ApiClient, ApiResult};
#[cfg(test)]
pub use client::MockApiClient;
pub use types::{CreateFunctionRequest, UpdateFunctionRequest};
