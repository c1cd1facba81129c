//! Remote API client capability.
//!
//! The deployment engine never talks to the cloud directly. Everything it
//! needs from the remote side goes through [`ApiClient`]; retries and
//! backoff, if any, belong to the implementation.

use serde_json::Value;

use crate::error::ApiError;

use super::types::{CreateFunctionRequest, UpdateFunctionRequest};

/// Result type for client operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Operations the planner and executor need from the remote API.
#[cfg_attr(test, mockall::automock)]
pub trait ApiClient {
    /// Creates a role with an inline policy and returns its ARN.
    fn create_role(&self, name: &str, trust_policy: &Value, policy: &Value) -> ApiResult<String>;

    /// Looks up a role ARN by name.
    ///
    /// Returns [`ApiError::ResourceNotFound`] if the role does not exist.
    fn get_role_arn_for_name(&self, name: &str) -> ApiResult<String>;

    /// Removes an inline policy from a role.
    fn delete_role_policy(&self, role_name: &str, policy_name: &str) -> ApiResult<()>;

    /// Attaches an inline policy to a role.
    fn put_role_policy(
        &self,
        role_name: &str,
        policy_name: &str,
        policy_document: &Value,
    ) -> ApiResult<()>;

    /// Creates a function and returns its ARN.
    fn create_function(&self, request: &CreateFunctionRequest) -> ApiResult<String>;

    /// Updates the code and configuration of an existing function.
    fn update_function(&self, request: &UpdateFunctionRequest) -> ApiResult<()>;

    /// Checks whether a function exists.
    fn lambda_function_exists(&self, name: &str) -> ApiResult<bool>;
}
