//! Configuration module for the deployment engine.
//!
//! This module handles all configuration-related functionality:
//! - Deserializing `deploy.yaml` / `deploy.json`
//! - Resolving per-stage and per-function settings
//! - Validation of configuration values

mod spec;
mod parser;
mod validator;

pub use spec::{
    DeployConfig, FunctionConfig, FunctionSettings, ScopedConfig, StageConfig,
    DEFAULT_LAMBDA_RUNTIME, POLICY_DIR,
};
pub use parser::{ConfigParser, find_config_file, DEFAULT_CONFIG_FILES};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
