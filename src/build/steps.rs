//! Build steps.
//!
//! Each step resolves one kind of build-time value. Steps only act on the
//! resource kinds they care about and leave every other resource alone.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};

use crate::config::DeployConfig;
use crate::error::Result;
use crate::models::{AutoGenIamPolicy, Deferred, DeploymentPackage, LambdaFunction, Resource, Shared};

/// Function timeout applied when none is configured, in seconds.
pub const DEFAULT_LAMBDA_TIMEOUT: u32 = 60;

/// Function memory size applied when none is configured, in MB.
pub const DEFAULT_LAMBDA_MEMORY_SIZE: u32 = 128;

/// Produces the deployment artifact for the project.
#[cfg_attr(test, mockall::automock)]
pub trait Packager {
    /// Builds the package and returns the path of the artifact.
    ///
    /// # Errors
    ///
    /// Returns an error if packaging fails.
    fn create_deployment_package(&self, project_dir: &Path, runtime: &str) -> Result<PathBuf>;
}

/// Generates an access policy by inspecting the application.
#[cfg_attr(test, mockall::automock)]
pub trait AppPolicyGenerator {
    /// Returns the generated policy document.
    ///
    /// # Errors
    ///
    /// Returns an error if the policy cannot be generated.
    fn generate_policy(&self, config: &DeployConfig) -> Result<Value>;
}

/// One pass of the build stage.
///
/// [`DeployStep::handle`] dispatches on the resource kind; implementors
/// override the hooks for the kinds they act on.
pub trait DeployStep {
    /// Applies the step to one resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the step fails for this resource.
    fn handle(&self, config: &DeployConfig, resource: &Resource) -> Result<()> {
        match resource {
            Resource::LambdaFunction(function) => self.handle_lambda_function(config, function),
            Resource::DeploymentPackage(package) => {
                self.handle_deployment_package(config, package)
            }
            Resource::AutoGenIamPolicy(policy) => self.handle_autogen_policy(config, policy),
            Resource::PreCreatedIamRole(_)
            | Resource::ManagedIamRole(_)
            | Resource::FileBasedIamPolicy(_) => Ok(()),
        }
    }

    /// Hook for functions.
    ///
    /// # Errors
    ///
    /// Returns an error if the step fails.
    fn handle_lambda_function(
        &self,
        _config: &DeployConfig,
        _function: &Shared<LambdaFunction>,
    ) -> Result<()> {
        Ok(())
    }

    /// Hook for deployment packages.
    ///
    /// # Errors
    ///
    /// Returns an error if the step fails.
    fn handle_deployment_package(
        &self,
        _config: &DeployConfig,
        _package: &Shared<DeploymentPackage>,
    ) -> Result<()> {
        Ok(())
    }

    /// Hook for generated policies.
    ///
    /// # Errors
    ///
    /// Returns an error if the step fails.
    fn handle_autogen_policy(
        &self,
        _config: &DeployConfig,
        _policy: &Shared<AutoGenIamPolicy>,
    ) -> Result<()> {
        Ok(())
    }
}

/// Fills in function settings the configuration left unset.
#[derive(Debug, Clone, Copy)]
pub struct InjectDefaults {
    lambda_timeout: u32,
    lambda_memory_size: u32,
}

impl InjectDefaults {
    /// Creates the step with explicit defaults.
    #[must_use]
    pub const fn new(lambda_timeout: u32, lambda_memory_size: u32) -> Self {
        Self {
            lambda_timeout,
            lambda_memory_size,
        }
    }
}

impl Default for InjectDefaults {
    fn default() -> Self {
        Self::new(DEFAULT_LAMBDA_TIMEOUT, DEFAULT_LAMBDA_MEMORY_SIZE)
    }
}

impl DeployStep for InjectDefaults {
    fn handle_lambda_function(
        &self,
        _config: &DeployConfig,
        function: &Shared<LambdaFunction>,
    ) -> Result<()> {
        let mut function = function.borrow_mut();
        if function.timeout.is_none() {
            debug!("Defaulting timeout of {} to {}s", function.function_name, self.lambda_timeout);
            function.timeout = Some(self.lambda_timeout);
        }
        if function.memory_size.is_none() {
            debug!(
                "Defaulting memory size of {} to {}MB",
                function.function_name, self.lambda_memory_size
            );
            function.memory_size = Some(self.lambda_memory_size);
        }
        Ok(())
    }
}

/// Builds the deployment package when it has not been built yet.
pub struct DeploymentPackager<'a> {
    packager: &'a dyn Packager,
}

impl<'a> DeploymentPackager<'a> {
    /// Creates the step around a packager.
    #[must_use]
    pub const fn new(packager: &'a dyn Packager) -> Self {
        Self { packager }
    }
}

impl DeployStep for DeploymentPackager<'_> {
    fn handle_deployment_package(
        &self,
        config: &DeployConfig,
        package: &Shared<DeploymentPackage>,
    ) -> Result<()> {
        if !package.borrow().filename.is_pending() {
            return Ok(());
        }
        let filename = self
            .packager
            .create_deployment_package(config.project_dir(), &config.lambda_runtime)?;
        info!("Created deployment package: {}", filename.display());
        package.borrow_mut().filename = Deferred::Resolved(filename);
        Ok(())
    }
}

/// Generates policy documents that have not been supplied.
pub struct PolicyGenerator<'a> {
    generator: &'a dyn AppPolicyGenerator,
}

impl<'a> PolicyGenerator<'a> {
    /// Creates the step around a policy generator.
    #[must_use]
    pub const fn new(generator: &'a dyn AppPolicyGenerator) -> Self {
        Self { generator }
    }
}

impl DeployStep for PolicyGenerator<'_> {
    fn handle_autogen_policy(
        &self,
        config: &DeployConfig,
        policy: &Shared<AutoGenIamPolicy>,
    ) -> Result<()> {
        if !policy.borrow().document.is_pending() {
            return Ok(());
        }
        let document = self.generator.generate_policy(config)?;
        info!("Generated policy for {}", config.app_name);
        policy.borrow_mut().document = Deferred::Resolved(document);
        Ok(())
    }
}
