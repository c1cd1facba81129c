//! Deploy orchestration.
//!
//! The [`Deployer`] runs the stages in their fixed order: resource graph,
//! dependency order, build, plan, execute.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::aws::ApiClient;
use crate::build::{
    AppPolicyGenerator, BuildStage, DeploymentPackager, InjectDefaults, Packager, PolicyGenerator,
};
use crate::config::{ConfigValidator, DeployConfig};
use crate::error::Result;
use crate::graph::{ApplicationGraphBuilder, DependencyBuilder};
use crate::osutils::FileReader;
use crate::planner::{Executor, Plan, PlanStage, ResourceOutputs};

/// Outputs of a successful deploy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployResult {
    /// Outputs per resource name, each with its `resource_type` tag.
    pub resources: ResourceOutputs,
}

/// Wires the deploy stages together.
pub struct Deployer<'a> {
    application_builder: ApplicationGraphBuilder,
    dependency_builder: DependencyBuilder,
    build_stage: BuildStage<'a>,
    plan_stage: PlanStage<'a>,
    client: &'a dyn ApiClient,
}

impl<'a> Deployer<'a> {
    /// Creates a deployer from explicit stages.
    #[must_use]
    pub const fn new(
        application_builder: ApplicationGraphBuilder,
        dependency_builder: DependencyBuilder,
        build_stage: BuildStage<'a>,
        plan_stage: PlanStage<'a>,
        client: &'a dyn ApiClient,
    ) -> Self {
        Self {
            application_builder,
            dependency_builder,
            build_stage,
            plan_stage,
            client,
        }
    }

    /// Creates a deployer with the standard build steps.
    #[must_use]
    pub fn with_default_steps(
        client: &'a dyn ApiClient,
        packager: &'a dyn Packager,
        policy_generator: &'a dyn AppPolicyGenerator,
        file_reader: &'a dyn FileReader,
    ) -> Self {
        let build_stage = BuildStage::new(vec![
            Box::new(InjectDefaults::default()),
            Box::new(DeploymentPackager::new(packager)),
            Box::new(PolicyGenerator::new(policy_generator)),
        ]);
        Self::new(
            ApplicationGraphBuilder::new(),
            DependencyBuilder::new(),
            build_stage,
            PlanStage::new(client, file_reader),
            client,
        )
    }

    /// Builds resources for a stage and plans them without executing.
    ///
    /// Remote state is only read. Roles that already exist have their ARN
    /// resolved on the built resources.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid for the stage, the
    /// graph cannot be built, a build step fails, or planning fails.
    pub fn plan(&self, config: &DeployConfig, stage_name: &str) -> Result<Plan> {
        let validation = ConfigValidator::new().validate(config, stage_name)?;
        for warning in &validation.warnings {
            warn!("{warning}");
        }

        let application = self.application_builder.build(config, stage_name)?;
        let resources = self.dependency_builder.build_dependencies(&application)?;
        debug!("{} resources in dependency order", resources.len());

        self.build_stage.execute(config, &resources)?;
        self.plan_stage.execute(config, &resources)
    }

    /// Deploys the application to a stage.
    ///
    /// # Errors
    ///
    /// Returns an error if any stage fails. A failed remote call aborts the
    /// remaining plan.
    pub fn deploy(&self, config: &DeployConfig, stage_name: &str) -> Result<DeployResult> {
        info!("Deploying {} to stage {stage_name}", config.app_name);

        let plan = self.plan(config, stage_name)?;
        debug!("{plan}");

        let mut executor = Executor::new(self.client);
        executor.execute(&plan)?;

        let result = DeployResult {
            resources: executor.into_resources(),
        };
        info!("Deployed {} resources", result.resources.len());
        Ok(result)
    }
}

impl DeployResult {
    /// Writes the result as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        info!("Saving deployed resources to: {}", path.display());
        let content = serde_json::to_string_pretty(self).map_err(std::io::Error::from)?;

        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Reads a result written by [`DeployResult::save`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading deployed resources from: {}", path.display());
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content).map_err(std::io::Error::from)?)
    }
}
