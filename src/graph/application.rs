//! Application graph construction.
//!
//! Turns the configuration into the resource graph for one stage. All
//! functions share one deployment package. Roles are assigned per function:
//! - an explicit role ARN gives a pre-created role
//! - autogenerated policies share one `{app}-{stage}` managed role
//! - anything else gets a dedicated `{app}-{stage}-{function}` role with a
//!   file-based policy

use std::rc::Rc;

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::{DeployConfig, FunctionConfig, ScopedConfig};
use crate::error::{ConfigError, Result};
use crate::models::{
    shared, Application, AutoGenIamPolicy, Deferred, DeploymentPackage, FileBasedIamPolicy,
    IamPolicy, IamRole, LambdaFunction, ManagedIamRole, Resource, Shared,
};

/// Resource name of the role shared by autogenerated-policy functions.
pub const SHARED_ROLE_RESOURCE_NAME: &str = "default-role";

/// Assume-role policy letting the function service use a role.
#[must_use]
pub fn lambda_trust_policy() -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Sid": "",
            "Effect": "Allow",
            "Principal": {"Service": "lambda.amazonaws.com"},
            "Action": "sts:AssumeRole"
        }]
    })
}

/// Resource name of the managed role a function is deployed with, or `None`
/// when the function uses a pre-created role.
#[must_use]
pub fn role_resource_name(config: &ScopedConfig, function_name: &str) -> Option<String> {
    if !config.manage_iam_role {
        None
    } else if config.autogen_policy {
        Some(String::from(SHARED_ROLE_RESOURCE_NAME))
    } else {
        Some(dedicated_role_resource_name(function_name))
    }
}

fn dedicated_role_resource_name(function_name: &str) -> String {
    format!("role-{function_name}")
}

/// Builds the resource graph for an application.
#[derive(Debug, Default, Clone, Copy)]
pub struct ApplicationGraphBuilder;

/// State shared across the functions of one build.
struct GraphContext {
    package: Shared<DeploymentPackage>,
    shared_role: Option<Shared<ManagedIamRole>>,
}

impl ApplicationGraphBuilder {
    /// Creates a new graph builder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Builds one function resource per configured function.
    ///
    /// # Errors
    ///
    /// Returns an error if a function opts out of role management without
    /// providing a role ARN.
    pub fn build(&self, config: &DeployConfig, stage_name: &str) -> Result<Application> {
        info!(
            "Building resource graph for {} ({} functions, stage {stage_name})",
            config.app_name,
            config.functions.len()
        );

        let mut context = GraphContext {
            package: shared(DeploymentPackage::pending()),
            shared_role: None,
        };

        let mut resources = Vec::with_capacity(config.functions.len());
        for function in &config.functions {
            let scoped = config.scope(stage_name, &function.name);
            let role = Self::role_reference(&scoped, function, &mut context)?;
            let resource = Self::build_lambda_function(&scoped, function, &context.package, role);
            resources.push(Resource::from(resource));
        }

        Ok(Application::new(stage_name, resources))
    }

    fn role_reference(
        config: &ScopedConfig,
        function: &FunctionConfig,
        context: &mut GraphContext,
    ) -> Result<IamRole> {
        if !config.manage_iam_role {
            let role_arn = config.iam_role_arn.clone().ok_or_else(|| {
                ConfigError::validation(
                    format!(
                        "Function '{}' does not manage its role but no iam_role_arn is set",
                        function.name
                    ),
                    "iam_role_arn",
                )
            })?;
            debug!("Function {} uses pre-created role {role_arn}", function.name);
            return Ok(IamRole::pre_created(role_arn));
        }

        if config.autogen_policy {
            let role = context.shared_role.get_or_insert_with(|| {
                shared(ManagedIamRole {
                    resource_name: String::from(SHARED_ROLE_RESOURCE_NAME),
                    role_arn: Deferred::deploy_stage(),
                    role_name: format!("{}-{}", config.app_name, config.stage),
                    trust_policy: lambda_trust_policy(),
                    policy: IamPolicy::AutoGen(shared(AutoGenIamPolicy {
                        document: Deferred::build_stage(),
                    })),
                })
            });
            debug!("Function {} uses the shared role", function.name);
            return Ok(IamRole::Managed(Rc::clone(role)));
        }

        let filename = config.policy_file_path();
        debug!(
            "Function {} gets a dedicated role with policy {}",
            function.name,
            filename.display()
        );
        Ok(IamRole::Managed(shared(ManagedIamRole {
            resource_name: dedicated_role_resource_name(&function.name),
            role_arn: Deferred::deploy_stage(),
            role_name: config.function_name(&function.name),
            trust_policy: lambda_trust_policy(),
            policy: IamPolicy::FileBased(shared(FileBasedIamPolicy { filename })),
        })))
    }

    fn build_lambda_function(
        config: &ScopedConfig,
        function: &FunctionConfig,
        package: &Shared<DeploymentPackage>,
        role: IamRole,
    ) -> Shared<LambdaFunction> {
        shared(LambdaFunction {
            resource_name: function.name.clone(),
            function_name: config.function_name(&function.name),
            runtime: config.runtime.clone(),
            handler: function.handler_string(),
            environment_variables: config.environment_variables.clone(),
            tags: config.tags.clone(),
            timeout: config.lambda_timeout,
            memory_size: config.lambda_memory_size,
            deployment_package: Rc::clone(package),
            role,
        })
    }
}
