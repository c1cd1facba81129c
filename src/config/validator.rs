//! Configuration validation for deployments.
//!
//! This module checks a configuration for one stage before any resource is
//! built, so mistakes surface as configuration errors rather than remote
//! failures halfway through a plan.

use crate::error::{ConfigError, DeployError, Result};
use crate::graph::role_resource_name;
use std::collections::{HashMap, HashSet};
use std::ops::RangeInclusive;
use tracing::debug;

use super::spec::DeployConfig;

/// Accepted function timeouts, in seconds.
const TIMEOUT_RANGE: RangeInclusive<u32> = 1..=900;

/// Accepted function memory sizes, in MB.
const MEMORY_RANGE: RangeInclusive<u32> = 128..=10_240;

/// Validator for deployment configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
    /// Resource type whose name is taken, for name clashes.
    pub duplicate_of: Option<String>,
    /// The clashing name.
    pub name: Option<String>,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a configuration for the given stage.
    ///
    /// # Errors
    ///
    /// Returns the first validation error found.
    pub fn validate(&self, config: &DeployConfig, stage: &str) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        Self::validate_app(config, &mut result);
        Self::validate_functions(config, stage, &mut result);
        Self::validate_stage_overrides(config, &mut result);

        if let Some(first_error) = result.errors.first() {
            return Err(DeployError::Config(first_error.to_config_error()));
        }

        debug!("Configuration validation passed");
        Ok(result)
    }

    fn validate_app(config: &DeployConfig, result: &mut ValidationResult) {
        if config.app_name.is_empty() {
            result.push_error("app_name", "App name cannot be empty");
        } else if !is_valid_name(&config.app_name) {
            result.push_error(
                "app_name",
                format!(
                    "App name '{}' is invalid. Must be alphanumeric with hyphens or underscores.",
                    config.app_name
                ),
            );
        }

        if config.functions.is_empty() {
            result
                .warnings
                .push(String::from("No functions declared, nothing will be deployed"));
        }
    }

    fn validate_functions(config: &DeployConfig, stage: &str, result: &mut ValidationResult) {
        let mut seen = HashSet::new();
        let role_names: HashMap<String, &str> = config
            .functions
            .iter()
            .filter_map(|function| {
                role_resource_name(&config.scope(stage, &function.name), &function.name)
                    .map(|role| (role, function.name.as_str()))
            })
            .collect();

        for (i, function) in config.functions.iter().enumerate() {
            let field = format!("functions[{i}]");

            if !is_valid_name(&function.name) {
                result.push_error(
                    format!("{field}.name"),
                    format!("Function name '{}' is invalid", function.name),
                );
            }
            if !seen.insert(function.name.as_str()) {
                result.push_duplicate(format!("{field}.name"), "function", &function.name);
            }
            if let Some(owner) = role_names.get(&function.name) {
                debug!("Function {} clashes with the role of {owner}", function.name);
                result.push_duplicate(format!("{field}.name"), "resource", &function.name);
            }

            let scoped = config.scope(stage, &function.name);
            if !scoped.manage_iam_role && scoped.iam_role_arn.is_none() {
                result.push_error(
                    format!("stages.{stage}.lambda_functions.{}.iam_role_arn", function.name),
                    format!(
                        "Function '{}' does not manage its role but no iam_role_arn is set",
                        function.name
                    ),
                );
            }
            if let Some(timeout) = scoped.lambda_timeout
                && !TIMEOUT_RANGE.contains(&timeout)
            {
                result.push_error(
                    format!("{field}.lambda_timeout"),
                    format!(
                        "Timeout {timeout}s for '{}' must be between {} and {}",
                        function.name,
                        TIMEOUT_RANGE.start(),
                        TIMEOUT_RANGE.end()
                    ),
                );
            }
            if let Some(memory) = scoped.lambda_memory_size
                && !MEMORY_RANGE.contains(&memory)
            {
                result.push_error(
                    format!("{field}.lambda_memory_size"),
                    format!(
                        "Memory size {memory}MB for '{}' must be between {} and {}",
                        function.name,
                        MEMORY_RANGE.start(),
                        MEMORY_RANGE.end()
                    ),
                );
            }
            if scoped.manage_iam_role && scoped.autogen_policy && scoped.iam_policy_file.is_some() {
                result.warnings.push(format!(
                    "Function '{}' sets iam_policy_file but autogen_policy is enabled; the file is ignored",
                    function.name
                ));
            }
        }
    }

    fn validate_stage_overrides(config: &DeployConfig, result: &mut ValidationResult) {
        let declared: HashSet<&str> = config.function_names().into_iter().collect();
        for (stage, stage_config) in &config.stages {
            for name in stage_config.lambda_functions.keys() {
                if !declared.contains(name.as_str()) {
                    result.warnings.push(format!(
                        "Stage '{stage}' configures undeclared function '{name}'"
                    ));
                }
            }
        }
    }
}

impl ValidationResult {
    fn push_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.into(),
            message: message.into(),
            duplicate_of: None,
            name: None,
        });
    }

    fn push_duplicate(&mut self, field: String, resource_type: &str, name: &str) {
        self.errors.push(ValidationError {
            field,
            message: format!("Duplicate {resource_type} name: {name}"),
            duplicate_of: Some(resource_type.to_string()),
            name: Some(name.to_string()),
        });
    }

    /// Returns true if there are warnings.
    #[must_use]
    pub const fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

impl ValidationError {
    fn to_config_error(&self) -> ConfigError {
        match (&self.duplicate_of, &self.name) {
            (Some(resource_type), Some(name)) => ConfigError::DuplicateName {
                resource_type: resource_type.clone(),
                name: name.clone(),
            },
            _ => ConfigError::validation(self.message.clone(), self.field.clone()),
        }
    }
}

/// Checks that a name is usable as part of a remote resource name.
fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
