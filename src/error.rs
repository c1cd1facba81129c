//! Error types for the deployment engine.
//!
//! This module provides the error hierarchy for every stage of a deploy:
//! configuration, the remote API client, the local build pass, planning,
//! and plan execution.

use std::path::PathBuf;
use thiserror::Error;

use crate::models::Placeholder;

/// The main error type for the deployment engine.
#[derive(Debug, Error)]
pub enum DeployError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Remote API errors raised outside of plan execution.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Build stage errors.
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// Planning errors.
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    /// Plan execution errors.
    #[error("Execution error: {0}")]
    Execute(#[from] ExecuteError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Duplicate resource definition.
    #[error("Duplicate {resource_type} name: {name}")]
    DuplicateName {
        /// Type of resource (function, role, etc.).
        resource_type: String,
        /// The duplicated name.
        name: String,
    },

    /// Circular dependency detected.
    #[error("Circular dependency detected: {cycle}")]
    CircularDependency {
        /// Description of the cycle.
        cycle: String,
    },
}

/// Errors reported by the remote API client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The requested resource does not exist remotely.
    #[error("{resource_type} not found: {name}")]
    ResourceNotFound {
        /// Kind of resource that was looked up.
        resource_type: String,
        /// Name used for the lookup.
        name: String,
    },

    /// The remote operation failed.
    #[error("{operation} failed: {message}")]
    RequestFailed {
        /// Operation that failed.
        operation: String,
        /// Description of the failure.
        message: String,
    },
}

/// Build stage errors.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The deployment package could not be produced.
    #[error("Failed to create deployment package: {message}")]
    PackagingFailed {
        /// Description of the packaging failure.
        message: String,
    },

    /// The policy document could not be generated.
    #[error("Failed to generate policy: {message}")]
    PolicyGenerationFailed {
        /// Description of the generation failure.
        message: String,
    },

    /// A build-time value was still pending after every step ran.
    #[error("Build stage left {field} of {resource} unresolved")]
    UnresolvedValue {
        /// Resource holding the pending value.
        resource: String,
        /// Field that is still pending.
        field: String,
    },
}

/// Planning errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// A value that must be concrete before planning was still pending.
    #[error("{field} of {resource} is still pending ({placeholder}) at plan time")]
    UnresolvedValue {
        /// Resource holding the pending value.
        resource: String,
        /// Field that is still pending.
        field: String,
        /// The stage the value was waiting on.
        placeholder: Placeholder,
    },

    /// A file referenced by a resource could not be read.
    #[error("Failed to read {path}: {message}")]
    FileReadFailed {
        /// Path that could not be read.
        path: PathBuf,
        /// Description of the read failure.
        message: String,
    },

    /// A file-based policy did not contain a valid JSON document.
    #[error("Invalid policy document in {path}: {message}")]
    InvalidPolicyDocument {
        /// Path of the policy file.
        path: PathBuf,
        /// Description of the parse failure.
        message: String,
    },
}

/// Plan execution errors.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// A deferred value survived until execution.
    #[error("Unresolved value for parameter '{param}' of {method}")]
    UnresolvedValue {
        /// Operation being prepared.
        method: String,
        /// Parameter holding the placeholder.
        param: String,
    },

    /// A variable was referenced before any call stored it.
    #[error("Variable '{name}' referenced by {method} has not been set")]
    MissingVariable {
        /// Operation being prepared.
        method: String,
        /// Name of the missing variable.
        name: String,
    },

    /// A parameter was missing or had the wrong shape for the operation.
    #[error("Parameter '{name}' of {method} must be {expected}")]
    InvalidParameter {
        /// Operation being prepared.
        method: String,
        /// Parameter name.
        name: String,
        /// Description of the expected shape.
        expected: String,
    },

    /// The remote operation failed.
    #[error("{method}({params}) failed: {source}")]
    ApiCallFailed {
        /// Operation that failed.
        method: String,
        /// Rendered parameters the operation was called with.
        params: String,
        /// Underlying client error.
        #[source]
        source: ApiError,
    },
}

/// Result type alias for deployment operations.
pub type Result<T> = std::result::Result<T, DeployError>;

impl DeployError {
    /// Returns true if this error means a stage invariant was violated
    /// upstream rather than a remote or configuration failure.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Build(BuildError::UnresolvedValue { .. })
                | Self::Plan(PlanError::UnresolvedValue { .. })
                | Self::Execute(
                    ExecuteError::UnresolvedValue { .. } | ExecuteError::MissingVariable { .. }
                )
        )
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl ApiError {
    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::ResourceNotFound {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }

    /// Creates a request failure.
    #[must_use]
    pub fn request_failed(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Returns true if the remote resource does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::ResourceNotFound { .. })
    }
}
