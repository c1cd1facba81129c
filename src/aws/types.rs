//! Request types for the function API.

use std::collections::BTreeMap;

/// Parameters for creating a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateFunctionRequest {
    /// Fully-qualified function name.
    pub function_name: String,
    /// ARN of the execution role.
    pub role_arn: String,
    /// Deployment package bytes.
    pub zip_contents: Vec<u8>,
    /// Runtime identifier.
    pub runtime: String,
    /// Entry point.
    pub handler: String,
    /// Environment variables.
    pub environment_variables: BTreeMap<String, String>,
    /// Resource tags.
    pub tags: BTreeMap<String, String>,
    /// Timeout in seconds.
    pub timeout: u32,
    /// Memory size in MB.
    pub memory_size: u32,
}

/// Parameters for updating an existing function.
///
/// The handler cannot be changed by an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateFunctionRequest {
    /// Fully-qualified function name.
    pub function_name: String,
    /// ARN of the execution role.
    pub role_arn: String,
    /// Deployment package bytes.
    pub zip_contents: Vec<u8>,
    /// Runtime identifier.
    pub runtime: String,
    /// Environment variables.
    pub environment_variables: BTreeMap<String, String>,
    /// Resource tags.
    pub tags: BTreeMap<String, String>,
    /// Timeout in seconds.
    pub timeout: u32,
    /// Memory size in MB.
    pub memory_size: u32,
}
