//! Plan executor.
//!
//! This module runs a [`Plan`] against the API client, one call at a time,
//! resolving variables from the results of earlier calls and recording the
//! outputs each managed resource produced.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, error, info};

use crate::aws::{ApiClient, CreateFunctionRequest, UpdateFunctionRequest};
use crate::error::{ApiError, DeployError, ExecuteError, Result};

use super::plan::{ApiCall, ApiMethod, ParamValue, Plan};

/// Outputs recorded per resource name.
pub type ResourceOutputs = BTreeMap<String, BTreeMap<String, Value>>;

/// Executes plans sequentially.
///
/// The variable and resource stores start empty and belong to this
/// executor only; create a new executor for every deploy.
pub struct Executor<'a> {
    client: &'a dyn ApiClient,
    variables: BTreeMap<String, Value>,
    resources: ResourceOutputs,
}

/// A parameter after variable resolution.
#[derive(Debug)]
enum Resolved {
    Json(Value),
    Bytes(Vec<u8>),
}

/// Resolved parameters of one call, consumed as the request is assembled.
struct ResolvedParams {
    method: ApiMethod,
    values: BTreeMap<String, Resolved>,
}

impl<'a> Executor<'a> {
    /// Creates an executor with empty stores.
    #[must_use]
    pub fn new(client: &'a dyn ApiClient) -> Self {
        Self {
            client,
            variables: BTreeMap::new(),
            resources: BTreeMap::new(),
        }
    }

    /// Executes every call of the plan in order.
    ///
    /// Stops at the first failure; calls after it are not attempted.
    ///
    /// # Errors
    ///
    /// Returns an error if a parameter cannot be resolved or a remote call
    /// fails.
    pub fn execute(&mut self, plan: &Plan) -> Result<()> {
        info!("Executing plan with {} calls", plan.len());

        for (index, call) in plan.iter().enumerate() {
            debug!("Executing call {}: {}", index, call.method_name);
            self.execute_call(call)?;
        }

        info!("Plan executed successfully");
        Ok(())
    }

    /// Values stored so far, by variable name.
    #[must_use]
    pub const fn variables(&self) -> &BTreeMap<String, Value> {
        &self.variables
    }

    /// Outputs recorded so far, by resource name.
    #[must_use]
    pub const fn resources(&self) -> &ResourceOutputs {
        &self.resources
    }

    /// Consumes the executor, returning the recorded resource outputs.
    #[must_use]
    pub fn into_resources(self) -> ResourceOutputs {
        self.resources
    }

    fn execute_call(&mut self, call: &ApiCall) -> Result<()> {
        let params = self.resolve_params(call)?;
        let value = self.invoke(call, params)?;

        let Some(target) = &call.target_variable else {
            return Ok(());
        };
        debug!("Stored {target}");
        self.variables.insert(target.clone(), value.clone());

        if let Some(resource) = &call.resource
            && let (Some(name), Some(kind)) = (resource.resource_name(), resource.resource_type())
        {
            let outputs = self.resources.entry(name).or_default();
            outputs.insert(String::from("resource_type"), Value::from(kind));
            outputs.insert(target.clone(), value);
        }
        Ok(())
    }

    /// Resolves every parameter before anything is sent.
    fn resolve_params(&self, call: &ApiCall) -> Result<ResolvedParams> {
        let values = call
            .params
            .iter()
            .map(|(name, value)| {
                self.resolve(call.method_name, name, value)
                    .map(|resolved| (name.clone(), resolved))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(ResolvedParams {
            method: call.method_name,
            values,
        })
    }

    fn resolve(&self, method: ApiMethod, param: &str, value: &ParamValue) -> Result<Resolved> {
        match value {
            ParamValue::Literal(value) => Ok(Resolved::Json(value.clone())),
            ParamValue::Bytes(bytes) => Ok(Resolved::Bytes(bytes.clone())),
            ParamValue::Variable(variable) => self
                .variables
                .get(&variable.name)
                .cloned()
                .map(Resolved::Json)
                .ok_or_else(|| {
                    ExecuteError::MissingVariable {
                        method: method.to_string(),
                        name: variable.name.clone(),
                    }
                    .into()
                }),
            ParamValue::Placeholder(_) => Err(ExecuteError::UnresolvedValue {
                method: method.to_string(),
                param: param.to_string(),
            }
            .into()),
            ParamValue::List(items) => items
                .iter()
                .map(|item| self.resolve_json(method, param, item))
                .collect::<Result<Vec<_>>>()
                .map(|items| Resolved::Json(Value::Array(items))),
            ParamValue::Map(entries) => entries
                .iter()
                .map(|(key, item)| {
                    self.resolve_json(method, param, item)
                        .map(|value| (key.clone(), value))
                })
                .collect::<Result<serde_json::Map<_, _>>>()
                .map(|map| Resolved::Json(Value::Object(map))),
        }
    }

    /// Resolves a value nested inside a list or map.
    fn resolve_json(&self, method: ApiMethod, param: &str, value: &ParamValue) -> Result<Value> {
        match self.resolve(method, param, value)? {
            Resolved::Json(value) => Ok(value),
            Resolved::Bytes(_) => Err(ExecuteError::InvalidParameter {
                method: method.to_string(),
                name: param.to_string(),
                expected: String::from("JSON when nested"),
            }
            .into()),
        }
    }

    fn invoke(&self, call: &ApiCall, mut params: ResolvedParams) -> Result<Value> {
        let outcome = match call.method_name {
            ApiMethod::CreateRole => {
                let name = params.string("name")?;
                let trust_policy = params.json("trust_policy")?;
                let policy = params.json("policy")?;
                self.client
                    .create_role(&name, &trust_policy, &policy)
                    .map(Value::String)
            }
            ApiMethod::DeleteRolePolicy => {
                let role_name = params.string("role_name")?;
                let policy_name = params.string("policy_name")?;
                self.client
                    .delete_role_policy(&role_name, &policy_name)
                    .map(|()| Value::Null)
            }
            ApiMethod::PutRolePolicy => {
                let role_name = params.string("role_name")?;
                let policy_name = params.string("policy_name")?;
                let document = params.json("policy_document")?;
                self.client
                    .put_role_policy(&role_name, &policy_name, &document)
                    .map(|()| Value::Null)
            }
            ApiMethod::CreateFunction => {
                let request = CreateFunctionRequest {
                    function_name: params.string("function_name")?,
                    role_arn: params.string("role_arn")?,
                    zip_contents: params.bytes("zip_contents")?,
                    runtime: params.string("runtime")?,
                    handler: params.string("handler")?,
                    environment_variables: params.string_map("environment_variables")?,
                    tags: params.string_map("tags")?,
                    timeout: params.number("timeout")?,
                    memory_size: params.number("memory_size")?,
                };
                self.client.create_function(&request).map(Value::String)
            }
            ApiMethod::UpdateFunction => {
                let request = UpdateFunctionRequest {
                    function_name: params.string("function_name")?,
                    role_arn: params.string("role_arn")?,
                    zip_contents: params.bytes("zip_contents")?,
                    runtime: params.string("runtime")?,
                    environment_variables: params.string_map("environment_variables")?,
                    tags: params.string_map("tags")?,
                    timeout: params.number("timeout")?,
                    memory_size: params.number("memory_size")?,
                };
                self.client.update_function(&request).map(|()| Value::Null)
            }
        };

        outcome.map_err(|source: ApiError| {
            error!("{} failed: {}", call.method_name, source);
            ExecuteError::ApiCallFailed {
                method: call.method_name.to_string(),
                params: call.params.to_string(),
                source,
            }
            .into()
        })
    }
}

impl ResolvedParams {
    fn take(&mut self, name: &str) -> Result<Resolved> {
        self.values
            .remove(name)
            .ok_or_else(|| self.invalid(name, "present"))
    }

    fn json(&mut self, name: &str) -> Result<Value> {
        match self.take(name)? {
            Resolved::Json(value) => Ok(value),
            Resolved::Bytes(_) => Err(self.invalid(name, "a JSON value")),
        }
    }

    fn string(&mut self, name: &str) -> Result<String> {
        match self.json(name)? {
            Value::String(value) => Ok(value),
            _ => Err(self.invalid(name, "a string")),
        }
    }

    fn bytes(&mut self, name: &str) -> Result<Vec<u8>> {
        match self.take(name)? {
            Resolved::Bytes(bytes) => Ok(bytes),
            Resolved::Json(_) => Err(self.invalid(name, "binary")),
        }
    }

    fn number(&mut self, name: &str) -> Result<u32> {
        self.json(name)?
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| self.invalid(name, "an unsigned 32-bit integer"))
    }

    fn string_map(&mut self, name: &str) -> Result<BTreeMap<String, String>> {
        let Value::Object(map) = self.json(name)? else {
            return Err(self.invalid(name, "a mapping of strings"));
        };
        map.into_iter()
            .map(|(key, value)| match value {
                Value::String(value) => Ok((key, value)),
                _ => Err(self.invalid(name, "a mapping of strings")),
            })
            .collect()
    }

    fn invalid(&self, name: &str, expected: &str) -> DeployError {
        ExecuteError::InvalidParameter {
            method: self.method.to_string(),
            name: name.to_string(),
            expected: expected.to_string(),
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::MockApiClient;
    use crate::models::{
        shared, AutoGenIamPolicy, Deferred, IamPolicy, ManagedIamRole, Placeholder, Resource,
    };
    use crate::planner::{Params, Variable};
    use mockall::Sequence;
    use serde_json::json;

    fn role_resource() -> Resource {
        Resource::ManagedIamRole(shared(ManagedIamRole {
            resource_name: String::from("default-role"),
            role_arn: Deferred::deploy_stage(),
            role_name: String::from("myrole"),
            trust_policy: json!({}),
            policy: IamPolicy::AutoGen(shared(AutoGenIamPolicy {
                document: Deferred::Resolved(json!({})),
            })),
        }))
    }

    fn create_role_call() -> ApiCall {
        ApiCall::new(
            ApiMethod::CreateRole,
            Params::new()
                .with("name", "myrole")
                .with("trust_policy", json!({"trust": "policy"}))
                .with("policy", json!({"role": "policy"})),
        )
    }

    fn create_function_call(role_arn: impl Into<ParamValue>) -> ApiCall {
        ApiCall::new(
            ApiMethod::CreateFunction,
            Params::new()
                .with("function_name", "appname-dev-foo")
                .with("role_arn", role_arn)
                .with("zip_contents", b"zip".to_vec())
                .with("runtime", "python3.12")
                .with("handler", "app.app")
                .with("environment_variables", json!({"FOO": "BAR"}))
                .with("tags", json!({}))
                .with("timeout", Some(60_u32))
                .with("memory_size", Some(128_u32)),
        )
    }

    #[test]
    fn test_can_call_no_target_variable() {
        let mut client = MockApiClient::new();
        client
            .expect_delete_role_policy()
            .withf(|role_name, policy_name| role_name == "myrole" && policy_name == "myrole")
            .times(1)
            .returning(|_, _| Ok(()));
        let plan = Plan::new(vec![ApiCall::new(
            ApiMethod::DeleteRolePolicy,
            Params::new().with("role_name", "myrole").with("policy_name", "myrole"),
        )]);

        let mut executor = Executor::new(&client);
        executor.execute(&plan).unwrap();

        assert!(executor.variables().is_empty());
        assert!(executor.resources().is_empty());
    }

    #[test]
    fn test_can_store_target_variable() {
        let mut client = MockApiClient::new();
        client
            .expect_create_role()
            .withf(|name, trust, policy| {
                name == "myrole"
                    && *trust == json!({"trust": "policy"})
                    && *policy == json!({"role": "policy"})
            })
            .times(1)
            .returning(|_, _, _| Ok(String::from("myrole:arn")));
        let plan = Plan::new(vec![create_role_call().with_target("myrole_role_arn")]);

        let mut executor = Executor::new(&client);
        executor.execute(&plan).unwrap();

        assert_eq!(executor.variables()["myrole_role_arn"], json!("myrole:arn"));
        assert!(executor.resources().is_empty());
    }

    #[test]
    fn test_can_reference_stored_variables() {
        let mut client = MockApiClient::new();
        let mut seq = Sequence::new();
        client
            .expect_create_role()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(String::from("myrole:arn")));
        client
            .expect_create_function()
            .withf(|request| {
                request.role_arn == "myrole:arn"
                    && request.zip_contents == b"zip"
                    && request.environment_variables["FOO"] == "BAR"
                    && request.timeout == 60
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(String::from("function:arn")));
        let plan = Plan::new(vec![
            create_role_call().with_target("myrole_role_arn"),
            create_function_call(Variable::new("myrole_role_arn")).with_target("foo_lambda_arn"),
        ]);

        let mut executor = Executor::new(&client);
        executor.execute(&plan).unwrap();

        assert_eq!(executor.variables()["foo_lambda_arn"], json!("function:arn"));
    }

    #[test]
    fn test_can_record_results_of_api_calls() {
        let mut client = MockApiClient::new();
        client
            .expect_create_role()
            .returning(|_, _, _| Ok(String::from("myrole:arn")));
        let plan = Plan::new(vec![
            create_role_call()
                .with_target("myrole_role_arn")
                .with_resource(role_resource()),
        ]);

        let mut executor = Executor::new(&client);
        executor.execute(&plan).unwrap();

        let expected = BTreeMap::from([(
            String::from("default-role"),
            BTreeMap::from([
                (String::from("myrole_role_arn"), json!("myrole:arn")),
                (String::from("resource_type"), json!("iam_role")),
            ]),
        )]);
        assert_eq!(executor.into_resources(), expected);
    }

    #[test]
    fn test_placeholder_fails_before_remote_call() {
        let mut client = MockApiClient::new();
        client.expect_create_function().never();
        let plan = Plan::new(vec![create_function_call(Placeholder::DeployStage)]);

        let result = Executor::new(&client).execute(&plan);
        assert!(matches!(
            result,
            Err(DeployError::Execute(ExecuteError::UnresolvedValue { ref param, .. })) if param == "role_arn"
        ));
    }

    #[test]
    fn test_nested_placeholder_is_detected() {
        let mut client = MockApiClient::new();
        client.expect_put_role_policy().never();
        let document = ParamValue::Map(BTreeMap::from([(
            String::from("Statement"),
            ParamValue::List(vec![ParamValue::Placeholder(Placeholder::BuildStage)]),
        )]));
        let plan = Plan::new(vec![ApiCall::new(
            ApiMethod::PutRolePolicy,
            Params::new()
                .with("role_name", "myrole")
                .with("policy_name", "myrole")
                .with("policy_document", document),
        )]);

        let result = Executor::new(&client).execute(&plan);
        assert!(matches!(
            result,
            Err(DeployError::Execute(ExecuteError::UnresolvedValue { .. }))
        ));
    }

    #[test]
    fn test_missing_variable_is_fatal() {
        let mut client = MockApiClient::new();
        client.expect_create_function().never();
        let plan = Plan::new(vec![create_function_call(Variable::new("myrole_role_arn"))]);

        let err = Executor::new(&client).execute(&plan).unwrap_err();
        assert!(err.is_internal());
        assert!(matches!(
            err,
            DeployError::Execute(ExecuteError::MissingVariable { .. })
        ));
    }

    #[test]
    fn test_failed_call_stops_execution() {
        let mut client = MockApiClient::new();
        client
            .expect_create_role()
            .returning(|_, _, _| Err(ApiError::request_failed("create_role", "access denied")));
        client.expect_create_function().never();
        let plan = Plan::new(vec![
            create_role_call().with_target("myrole_role_arn"),
            create_function_call(Variable::new("myrole_role_arn")),
        ]);

        let err = Executor::new(&client).execute(&plan).unwrap_err();
        assert!(matches!(
            &err,
            DeployError::Execute(ExecuteError::ApiCallFailed { method, params, .. })
                if method == "create_role" && params.contains("name=\"myrole\"")
        ));
    }

    #[test]
    fn test_update_function_result_is_not_stored() {
        let mut client = MockApiClient::new();
        client
            .expect_update_function()
            .withf(|request| request.function_name == "appname-dev-foo")
            .times(1)
            .returning(|_| Ok(()));
        let mut call = create_function_call("role:arn");
        call.method_name = ApiMethod::UpdateFunction;
        let plan = Plan::new(vec![call]);

        let mut executor = Executor::new(&client);
        executor.execute(&plan).unwrap();
        assert!(executor.variables().is_empty());
    }

    #[test]
    fn test_wrong_parameter_type_is_rejected() {
        let mut client = MockApiClient::new();
        client.expect_create_function().never();
        let mut call = create_function_call("role:arn");
        call.params = call.params.with("zip_contents", "not bytes");
        let plan = Plan::new(vec![call]);

        let result = Executor::new(&client).execute(&plan);
        assert!(matches!(
            result,
            Err(DeployError::Execute(ExecuteError::InvalidParameter { ref name, .. })) if name == "zip_contents"
        ));
    }
}
