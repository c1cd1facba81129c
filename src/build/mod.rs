//! Build stage for the deployment engine.
//!
//! This module resolves every build-time placeholder before planning:
//! - Default function settings
//! - The deployment package
//! - Generated policy documents

mod stage;
mod steps;

pub use stage::BuildStage;
pub use steps::{
    AppPolicyGenerator, DeployStep, DeploymentPackager, InjectDefaults, Packager,
    PolicyGenerator, DEFAULT_LAMBDA_MEMORY_SIZE, DEFAULT_LAMBDA_TIMEOUT,
};
#[cfg(test)]
pub use steps::{MockAppPolicyGenerator, MockPackager};
