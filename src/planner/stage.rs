//! The plan stage.
//!
//! Compares the built resources against live remote state and produces the
//! ordered list of calls that brings the remote side in line. The only
//! mutation performed here is resolving the ARN of a role that already
//! exists, so later functions in the same pass can reference it directly.

use serde_json::Value;
use tracing::{debug, info};

use crate::aws::ApiClient;
use crate::config::DeployConfig;
use crate::error::{PlanError, Result};
use crate::models::{
    Deferred, DeploymentPackage, IamPolicy, IamRole, LambdaFunction, ManagedIamRole, Placeholder,
    Resource, Shared,
};
use crate::osutils::FileReader;

use super::plan::{ApiCall, ApiMethod, ParamValue, Params, Plan, Variable};

/// Turns dependency-ordered resources into a [`Plan`].
pub struct PlanStage<'a> {
    client: &'a dyn ApiClient,
    file_reader: &'a dyn FileReader,
}

impl<'a> PlanStage<'a> {
    /// Creates a plan stage.
    #[must_use]
    pub const fn new(client: &'a dyn ApiClient, file_reader: &'a dyn FileReader) -> Self {
        Self {
            client,
            file_reader,
        }
    }

    /// Plans every resource in the given order.
    ///
    /// # Errors
    ///
    /// Returns an error if a build-time value is still pending, a referenced
    /// file cannot be read, or a remote lookup fails for any reason other
    /// than the resource not existing.
    pub fn execute(&self, config: &DeployConfig, resources: &[Resource]) -> Result<Plan> {
        info!("Planning {} resources for {}", resources.len(), config.app_name);

        let mut calls = Vec::new();
        for resource in resources {
            let planned = match resource {
                Resource::ManagedIamRole(role) => self.plan_managed_role(resource, role)?,
                Resource::LambdaFunction(function) => {
                    self.plan_lambda_function(resource, function)?
                }
                Resource::DeploymentPackage(_)
                | Resource::PreCreatedIamRole(_)
                | Resource::AutoGenIamPolicy(_)
                | Resource::FileBasedIamPolicy(_) => continue,
            };
            for call in &planned {
                debug!("Planned {call}");
            }
            calls.extend(planned);
        }

        let plan = Plan::new(calls);
        info!("Plan contains {} calls", plan.len());
        Ok(plan)
    }

    fn plan_managed_role(
        &self,
        resource: &Resource,
        role: &Shared<ManagedIamRole>,
    ) -> Result<Vec<ApiCall>> {
        let (role_name, trust_policy, policy) = {
            let role = role.borrow();
            (role.role_name.clone(), role.trust_policy.clone(), role.policy.clone())
        };
        let document = self.policy_document(&policy)?;

        match self.client.get_role_arn_for_name(&role_name) {
            Ok(arn) => {
                debug!("Role {role_name} exists as {arn}");
                role.borrow_mut().role_arn = Deferred::Resolved(arn);
                let delete = Params::new()
                    .with("role_name", role_name.as_str())
                    .with("policy_name", role_name.as_str());
                let put = delete.clone().with("policy_document", document);
                Ok(vec![
                    ApiCall::new(ApiMethod::DeleteRolePolicy, delete)
                        .with_resource(resource.clone()),
                    ApiCall::new(ApiMethod::PutRolePolicy, put).with_resource(resource.clone()),
                ])
            }
            Err(e) if e.is_not_found() => {
                debug!("Role {role_name} does not exist");
                let params = Params::new()
                    .with("name", role_name.as_str())
                    .with("trust_policy", trust_policy)
                    .with("policy", document);
                Ok(vec![
                    ApiCall::new(ApiMethod::CreateRole, params)
                        .with_target(format!("{role_name}_role_arn"))
                        .with_resource(resource.clone()),
                ])
            }
            Err(e) => Err(e.into()),
        }
    }

    fn plan_lambda_function(
        &self,
        resource: &Resource,
        function: &Shared<LambdaFunction>,
    ) -> Result<Vec<ApiCall>> {
        let function = function.borrow();
        let role_arn = Self::role_arn_param(&function.role)?;
        let zip_contents = self.package_contents(&function.deployment_package)?;

        let params = Params::new()
            .with("function_name", function.function_name.as_str())
            .with("role_arn", role_arn)
            .with("zip_contents", zip_contents)
            .with("runtime", function.runtime.as_str())
            .with("environment_variables", &function.environment_variables)
            .with("tags", &function.tags)
            .with("timeout", function.timeout)
            .with("memory_size", function.memory_size);

        let call = if self.client.lambda_function_exists(&function.function_name)? {
            ApiCall::new(ApiMethod::UpdateFunction, params)
        } else {
            ApiCall::new(
                ApiMethod::CreateFunction,
                params.with("handler", function.handler.as_str()),
            )
            .with_target(format!("{}_lambda_arn", function.resource_name))
        };

        Ok(vec![call.with_resource(resource.clone())])
    }

    /// The role ARN as a literal when known, or a reference to the variable
    /// the role's creation call will store it under.
    fn role_arn_param(role: &IamRole) -> Result<ParamValue> {
        match role {
            IamRole::PreCreated(role) => Ok(role.borrow().role_arn.clone().into()),
            IamRole::Managed(role) => {
                let role = role.borrow();
                match &role.role_arn {
                    Deferred::Resolved(arn) => Ok(arn.clone().into()),
                    Deferred::Pending(Placeholder::DeployStage) => {
                        Ok(Variable::new(format!("{}_role_arn", role.role_name)).into())
                    }
                    Deferred::Pending(placeholder @ Placeholder::BuildStage) => {
                        Err(PlanError::UnresolvedValue {
                            resource: format!("iam_role '{}'", role.role_name),
                            field: String::from("role_arn"),
                            placeholder: *placeholder,
                        }
                        .into())
                    }
                }
            }
        }
    }

    fn package_contents(&self, package: &Shared<DeploymentPackage>) -> Result<Vec<u8>> {
        let package = package.borrow();
        match &package.filename {
            Deferred::Resolved(path) => self.file_reader.get_file_contents(path),
            Deferred::Pending(placeholder) => Err(PlanError::UnresolvedValue {
                resource: String::from("deployment_package"),
                field: String::from("filename"),
                placeholder: *placeholder,
            }
            .into()),
        }
    }

    fn policy_document(&self, policy: &IamPolicy) -> Result<Value> {
        match policy {
            IamPolicy::AutoGen(policy) => match &policy.borrow().document {
                Deferred::Resolved(document) => Ok(document.clone()),
                Deferred::Pending(placeholder) => Err(PlanError::UnresolvedValue {
                    resource: String::from("autogen_policy"),
                    field: String::from("document"),
                    placeholder: *placeholder,
                }
                .into()),
            },
            IamPolicy::FileBased(policy) => {
                let path = policy.borrow().filename.clone();
                let contents = self.file_reader.get_file_contents(&path)?;
                serde_json::from_slice(&contents).map_err(|e| {
                    PlanError::InvalidPolicyDocument {
                        path,
                        message: e.to_string(),
                    }
                    .into()
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::MockApiClient;
    use crate::error::{ApiError, DeployError};
    use crate::models::{shared, AutoGenIamPolicy, FileBasedIamPolicy};
    use crate::osutils::MockFileReader;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};
    use std::rc::Rc;

    fn managed_role(policy: IamPolicy) -> Shared<ManagedIamRole> {
        shared(ManagedIamRole {
            resource_name: String::from("default-role"),
            role_arn: Deferred::deploy_stage(),
            role_name: String::from("myrole"),
            trust_policy: json!({"trust": "policy"}),
            policy,
        })
    }

    fn autogen_policy() -> IamPolicy {
        IamPolicy::AutoGen(shared(AutoGenIamPolicy {
            document: Deferred::Resolved(json!({"role": "policy"})),
        }))
    }

    fn function(role: IamRole) -> Shared<LambdaFunction> {
        shared(LambdaFunction {
            resource_name: String::from("foo"),
            function_name: String::from("appname-dev-foo"),
            runtime: String::from("python3.12"),
            handler: String::from("app.app"),
            environment_variables: BTreeMap::from([(String::from("FOO"), String::from("BAR"))]),
            tags: BTreeMap::new(),
            timeout: Some(60),
            memory_size: Some(128),
            deployment_package: shared(DeploymentPackage::from_file("foo.zip")),
            role,
        })
    }

    fn zip_reader() -> MockFileReader {
        let mut reader = MockFileReader::new();
        reader
            .expect_get_file_contents()
            .withf(|path| path == Path::new("foo.zip"))
            .returning(|_| Ok(b"zip contents".to_vec()));
        reader
    }

    fn plan(
        client: &MockApiClient,
        reader: &MockFileReader,
        resources: &[Resource],
    ) -> Result<Plan> {
        PlanStage::new(client, reader).execute(&DeployConfig::new("appname"), resources)
    }

    #[test]
    fn test_can_plan_for_iam_role_creation() {
        let mut client = MockApiClient::new();
        client
            .expect_get_role_arn_for_name()
            .withf(|name| name == "myrole")
            .returning(|name| Err(ApiError::not_found("iam_role", name)));
        let reader = MockFileReader::new();
        let role = managed_role(autogen_policy());

        let plan = plan(&client, &reader, &[Resource::ManagedIamRole(Rc::clone(&role))]).unwrap();

        assert_eq!(plan.len(), 1);
        let call = &plan.calls[0];
        assert_eq!(call.method_name, ApiMethod::CreateRole);
        assert_eq!(call.target_variable.as_deref(), Some("myrole_role_arn"));
        assert_eq!(
            call.params,
            Params::new()
                .with("name", "myrole")
                .with("trust_policy", json!({"trust": "policy"}))
                .with("policy", json!({"role": "policy"}))
        );
        assert_eq!(call.resource, Some(Resource::ManagedIamRole(Rc::clone(&role))));
        assert!(role.borrow().role_arn.is_pending());
    }

    #[test]
    fn test_can_update_existing_role() {
        let mut client = MockApiClient::new();
        client
            .expect_get_role_arn_for_name()
            .returning(|_| Ok(String::from("myrole:arn")));
        let reader = MockFileReader::new();
        let role = managed_role(autogen_policy());

        let plan = plan(&client, &reader, &[Resource::ManagedIamRole(Rc::clone(&role))]).unwrap();

        let methods: Vec<ApiMethod> = plan.iter().map(|c| c.method_name).collect();
        assert_eq!(methods, vec![ApiMethod::DeleteRolePolicy, ApiMethod::PutRolePolicy]);
        assert_eq!(
            plan.calls[1].params,
            Params::new()
                .with("role_name", "myrole")
                .with("policy_name", "myrole")
                .with("policy_document", json!({"role": "policy"}))
        );
        assert!(plan.iter().all(|c| c.target_variable.is_none()));
        assert_eq!(role.borrow().role_arn, Deferred::Resolved(String::from("myrole:arn")));
    }

    #[test]
    fn test_file_based_policy_is_loaded_from_disk() {
        let mut client = MockApiClient::new();
        client
            .expect_get_role_arn_for_name()
            .returning(|name| Err(ApiError::not_found("iam_role", name)));
        let mut reader = MockFileReader::new();
        reader
            .expect_get_file_contents()
            .withf(|path| path == Path::new("/project/.deploy/policy-dev.json"))
            .times(1)
            .returning(|_| Ok(br#"{"iam": "policy"}"#.to_vec()));
        let role = managed_role(IamPolicy::FileBased(shared(FileBasedIamPolicy {
            filename: PathBuf::from("/project/.deploy/policy-dev.json"),
        })));

        let plan = plan(&client, &reader, &[Resource::ManagedIamRole(role)]).unwrap();

        assert_eq!(
            plan.calls[0].params.get("policy"),
            Some(&ParamValue::Literal(json!({"iam": "policy"})))
        );
    }

    #[test]
    fn test_invalid_policy_file_is_rejected() {
        let client = MockApiClient::new();
        let mut reader = MockFileReader::new();
        reader
            .expect_get_file_contents()
            .returning(|_| Ok(b"not json".to_vec()));
        let role = managed_role(IamPolicy::FileBased(shared(FileBasedIamPolicy {
            filename: PathBuf::from("policy.json"),
        })));

        let result = plan(&client, &reader, &[Resource::ManagedIamRole(role)]);
        assert!(matches!(
            result,
            Err(DeployError::Plan(PlanError::InvalidPolicyDocument { .. }))
        ));
    }

    #[test]
    fn test_role_lookup_failure_is_fatal() {
        let mut client = MockApiClient::new();
        client
            .expect_get_role_arn_for_name()
            .returning(|_| Err(ApiError::request_failed("get_role", "throttled")));
        let reader = MockFileReader::new();

        let role = Resource::ManagedIamRole(managed_role(autogen_policy()));

        let result = plan(&client, &reader, &[role]);
        assert!(matches!(result, Err(DeployError::Api(_))));
    }

    #[test]
    fn test_unbuilt_policy_document_is_rejected() {
        let mut client = MockApiClient::new();
        client.expect_get_role_arn_for_name().never();
        let reader = MockFileReader::new();
        let role = managed_role(IamPolicy::AutoGen(shared(AutoGenIamPolicy {
            document: Deferred::build_stage(),
        })));

        let result = plan(&client, &reader, &[Resource::ManagedIamRole(role)]);
        assert!(matches!(
            result,
            Err(DeployError::Plan(PlanError::UnresolvedValue {
                placeholder: Placeholder::BuildStage,
                ..
            }))
        ));
    }

    #[test]
    fn test_can_create_function() {
        let mut client = MockApiClient::new();
        client
            .expect_lambda_function_exists()
            .withf(|name| name == "appname-dev-foo")
            .returning(|_| Ok(false));
        let func = function(IamRole::pre_created("role:arn"));

        let plan = plan(&client, &zip_reader(), &[Resource::from(Rc::clone(&func))]).unwrap();

        assert_eq!(plan.len(), 1);
        let call = &plan.calls[0];
        assert_eq!(call.method_name, ApiMethod::CreateFunction);
        assert_eq!(call.target_variable.as_deref(), Some("foo_lambda_arn"));
        assert_eq!(
            call.params,
            Params::new()
                .with("function_name", "appname-dev-foo")
                .with("role_arn", "role:arn")
                .with("zip_contents", b"zip contents".to_vec())
                .with("runtime", "python3.12")
                .with("handler", "app.app")
                .with("environment_variables", &func.borrow().environment_variables)
                .with("tags", &BTreeMap::<String, String>::new())
                .with("timeout", Some(60_u32))
                .with("memory_size", Some(128_u32))
        );
    }

    #[test]
    fn test_can_update_function_without_handler() {
        let mut client = MockApiClient::new();
        client.expect_lambda_function_exists().returning(|_| Ok(true));
        let func = function(IamRole::pre_created("role:arn"));

        let plan = plan(&client, &zip_reader(), &[Resource::from(func)]).unwrap();

        assert_eq!(plan.len(), 1);
        let call = &plan.calls[0];
        assert_eq!(call.method_name, ApiMethod::UpdateFunction);
        assert!(call.target_variable.is_none());
        assert!(call.params.get("handler").is_none());
        assert_eq!(call.params.len(), 8);
    }

    #[test]
    fn test_function_references_role_created_in_same_plan() {
        let mut client = MockApiClient::new();
        client
            .expect_get_role_arn_for_name()
            .returning(|name| Err(ApiError::not_found("iam_role", name)));
        client.expect_lambda_function_exists().returning(|_| Ok(false));
        let role = managed_role(autogen_policy());
        let func = function(IamRole::Managed(Rc::clone(&role)));

        let plan = plan(
            &client,
            &zip_reader(),
            &[Resource::ManagedIamRole(role), Resource::from(func)],
        )
        .unwrap();

        let methods: Vec<ApiMethod> = plan.iter().map(|c| c.method_name).collect();
        assert_eq!(methods, vec![ApiMethod::CreateRole, ApiMethod::CreateFunction]);
        assert_eq!(
            plan.calls[1].params.get("role_arn"),
            Some(&ParamValue::Variable(Variable::new("myrole_role_arn")))
        );
    }

    #[test]
    fn test_function_uses_arn_of_existing_role() {
        let mut client = MockApiClient::new();
        client
            .expect_get_role_arn_for_name()
            .returning(|_| Ok(String::from("myrole:arn")));
        client.expect_lambda_function_exists().returning(|_| Ok(false));
        let role = managed_role(autogen_policy());
        let func = function(IamRole::Managed(Rc::clone(&role)));

        let plan = plan(
            &client,
            &zip_reader(),
            &[Resource::ManagedIamRole(role), Resource::from(func)],
        )
        .unwrap();

        assert_eq!(plan.len(), 3);
        assert_eq!(
            plan.calls[2].params.get("role_arn"),
            Some(&ParamValue::from("myrole:arn"))
        );
    }

    #[test]
    fn test_pre_created_role_is_never_planned() {
        let mut client = MockApiClient::new();
        client.expect_get_role_arn_for_name().never();
        let reader = MockFileReader::new();

        let role = Resource::from(IamRole::pre_created("role:arn"));

        let plan = plan(&client, &reader, &[role]).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_unbuilt_package_is_rejected() {
        let client = MockApiClient::new();
        let reader = MockFileReader::new();
        let func = function(IamRole::pre_created("role:arn"));
        func.borrow_mut().deployment_package = shared(DeploymentPackage::pending());

        let result = plan(&client, &reader, &[Resource::from(func)]);
        assert!(matches!(
            result,
            Err(DeployError::Plan(PlanError::UnresolvedValue { .. }))
        ));
    }
}
