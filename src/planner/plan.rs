//! Plan types.
//!
//! A [`Plan`] is an ordered list of [`ApiCall`]s. Parameters can refer to
//! values produced earlier in the same execution through a [`Variable`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::models::{Placeholder, Resource};

/// A named reference into the executor's variable store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Variable {
    /// Name the value is stored under.
    pub name: String,
}

impl Variable {
    /// Creates a reference to the named variable.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A parameter value of a planned call.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// A JSON literal.
    Literal(Value),
    /// Raw bytes, such as a deployment package.
    Bytes(Vec<u8>),
    /// A value produced by an earlier call.
    Variable(Variable),
    /// A value that was never resolved.
    Placeholder(Placeholder),
    /// A list that may contain variables.
    List(Vec<ParamValue>),
    /// A mapping that may contain variables.
    Map(BTreeMap<String, ParamValue>),
}

/// Named parameters of a planned call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(BTreeMap<String, ParamValue>);

/// The remote operations a plan can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiMethod {
    /// Create a role with an inline policy.
    CreateRole,
    /// Remove the inline policy from a role.
    DeleteRolePolicy,
    /// Attach the inline policy to a role.
    PutRolePolicy,
    /// Create a function.
    CreateFunction,
    /// Update an existing function.
    UpdateFunction,
}

/// One planned remote operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCall {
    /// Operation to invoke.
    pub method_name: ApiMethod,
    /// Parameters of the operation.
    pub params: Params,
    /// Variable the return value is stored under, if any.
    pub target_variable: Option<String>,
    /// Resource the call belongs to, for output recording.
    pub resource: Option<Resource>,
}

/// An ordered sequence of API calls.
#[derive(Debug, Clone)]
pub struct Plan {
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
    /// Calls in execution order.
    pub calls: Vec<ApiCall>,
}

impl ApiMethod {
    /// Operation name as the client knows it.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateRole => "create_role",
            Self::DeleteRolePolicy => "delete_role_policy",
            Self::PutRolePolicy => "put_role_policy",
            Self::CreateFunction => "create_function",
            Self::UpdateFunction => "update_function",
        }
    }
}

impl ApiCall {
    /// Creates a call with no target variable and no owning resource.
    #[must_use]
    pub const fn new(method_name: ApiMethod, params: Params) -> Self {
        Self {
            method_name,
            params,
            target_variable: None,
            resource: None,
        }
    }

    /// Stores the call's return value under `name`.
    #[must_use]
    pub fn with_target(mut self, name: impl Into<String>) -> Self {
        self.target_variable = Some(name.into());
        self
    }

    /// Attaches the owning resource.
    #[must_use]
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resource = Some(resource);
        self
    }
}

impl Params {
    /// Creates an empty parameter set.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    /// Returns a parameter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    /// Iterates over parameters in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    /// Returns the number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Plan {
    /// Creates a plan from calls in execution order.
    #[must_use]
    pub fn new(calls: Vec<ApiCall>) -> Self {
        Self {
            created_at: Utc::now(),
            calls,
        }
    }

    /// Returns true if the plan has no calls.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Iterates over calls in execution order.
    pub fn iter(&self) -> std::slice::Iter<'_, ApiCall> {
        self.calls.iter()
    }

    /// Returns the calls of one method, in plan order.
    #[must_use]
    pub fn calls_for(&self, method: ApiMethod) -> Vec<&ApiCall> {
        self.calls.iter().filter(|c| c.method_name == method).collect()
    }
}

impl<'a> IntoIterator for &'a Plan {
    type Item = &'a ApiCall;
    type IntoIter = std::slice::Iter<'a, ApiCall>;

    fn into_iter(self) -> Self::IntoIter {
        self.calls.iter()
    }
}

/// Short digest used when rendering binary values.
#[must_use]
pub fn short_digest(bytes: &[u8]) -> String {
    let digest = hex::encode(Sha256::digest(bytes));
    digest[..12].to_string()
}

impl From<Value> for ParamValue {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Literal(Value::String(value.to_string()))
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Literal(Value::String(value))
    }
}

impl From<Option<u32>> for ParamValue {
    fn from(value: Option<u32>) -> Self {
        Self::Literal(value.map_or(Value::Null, Value::from))
    }
}

impl From<&BTreeMap<String, String>> for ParamValue {
    fn from(values: &BTreeMap<String, String>) -> Self {
        Self::Literal(Value::Object(
            values
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        ))
    }
}

impl From<Vec<u8>> for ParamValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<Variable> for ParamValue {
    fn from(value: Variable) -> Self {
        Self::Variable(value)
    }
}

impl From<Placeholder> for ParamValue {
    fn from(value: Placeholder) -> Self {
        Self::Placeholder(value)
    }
}

impl std::fmt::Display for ApiMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{value}"),
            Self::Bytes(bytes) => write!(f, "<{} bytes sha256:{}>", bytes.len(), short_digest(bytes)),
            Self::Variable(variable) => write!(f, "${{{}}}", variable.name),
            Self::Placeholder(placeholder) => write!(f, "<{placeholder}>"),
            Self::List(items) => {
                let rendered: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
            Self::Map(entries) => {
                let rendered: Vec<String> =
                    entries.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                write!(f, "{{{}}}", rendered.join(", "))
            }
        }
    }
}

impl std::fmt::Display for Params {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

impl std::fmt::Display for ApiCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.method_name, self.params)?;
        if let Some(target) = &self.target_variable {
            write!(f, " -> ${{{target}}}")?;
        }
        Ok(())
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.calls.is_empty() {
            return write!(f, "No changes required");
        }

        writeln!(f, "Deployment Plan ({} calls):", self.calls.len())?;
        for (i, call) in self.calls.iter().enumerate() {
            writeln!(f, "  {i}. {call}")?;
        }
        Ok(())
    }
}
