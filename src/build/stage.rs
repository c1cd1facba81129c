//! The local build stage.
//!
//! Runs every build step over the dependency-ordered resources. No remote
//! calls happen here; the stage only resolves build-time placeholders such
//! as the package filename and generated policy documents.

use tracing::{debug, info};

use crate::config::DeployConfig;
use crate::error::{BuildError, Result};
use crate::models::Resource;

use super::steps::DeployStep;

/// Applies build steps to resources in dependency order.
pub struct BuildStage<'a> {
    steps: Vec<Box<dyn DeployStep + 'a>>,
}

impl<'a> BuildStage<'a> {
    /// Creates a build stage running `steps` in the given order.
    #[must_use]
    pub fn new(steps: Vec<Box<dyn DeployStep + 'a>>) -> Self {
        Self { steps }
    }

    /// Returns the number of steps.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Runs every step on every resource, mutating resources in place.
    ///
    /// # Errors
    ///
    /// Returns an error if a step fails, or if a build-time placeholder is
    /// still present once every step has run.
    pub fn execute(&self, config: &DeployConfig, resources: &[Resource]) -> Result<()> {
        info!(
            "Running {} build steps over {} resources",
            self.steps.len(),
            resources.len()
        );

        for resource in resources {
            debug!("Building {}", resource.label());
            for step in &self.steps {
                step.handle(config, resource)?;
            }
        }

        resources.iter().try_for_each(Self::ensure_built)
    }

    /// Checks that no build-time placeholder survived the stage.
    fn ensure_built(resource: &Resource) -> Result<()> {
        let pending_field = match resource {
            Resource::DeploymentPackage(package) => {
                package.borrow().filename.is_pending().then_some("filename")
            }
            Resource::AutoGenIamPolicy(policy) => {
                policy.borrow().document.is_pending().then_some("document")
            }
            _ => None,
        };

        match pending_field {
            Some(field) => Err(BuildError::UnresolvedValue {
                resource: resource.label(),
                field: field.to_string(),
            }
            .into()),
            None => Ok(()),
        }
    }
}
