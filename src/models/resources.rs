//! Resource model types.
//!
//! These types describe the deployable entities and how they reference each
//! other. They carry no execution logic. Resources that can be referenced
//! from more than one parent are held behind a [`Shared`] handle so every
//! referrer observes the values written by the build and plan stages.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::rc::Rc;

use serde_json::Value;

use super::placeholder::Deferred;

/// Shared, mutable handle to a resource.
pub type Shared<T> = Rc<RefCell<T>>;

/// Wraps a resource in a [`Shared`] handle.
#[must_use]
pub fn shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}

/// Root aggregate of one deploy: every top-level resource for a stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Application {
    /// Stage the application is built for.
    pub stage: String,
    /// Top-level resources in declared order.
    pub resources: Vec<Resource>,
}

/// A serverless function.
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaFunction {
    /// Name the function is recorded under in the deploy result.
    pub resource_name: String,
    /// Fully-qualified remote name, `{app}-{stage}-{name}`.
    pub function_name: String,
    /// Runtime identifier.
    pub runtime: String,
    /// Entry point.
    pub handler: String,
    /// Environment variables.
    pub environment_variables: BTreeMap<String, String>,
    /// Resource tags.
    pub tags: BTreeMap<String, String>,
    /// Timeout in seconds, unset until configured or defaulted.
    pub timeout: Option<u32>,
    /// Memory size in MB, unset until configured or defaulted.
    pub memory_size: Option<u32>,
    /// Code artifact, shared by every function of the application.
    pub deployment_package: Shared<DeploymentPackage>,
    /// Execution role.
    pub role: IamRole,
}

/// The code artifact uploaded for functions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentPackage {
    /// Path of the built artifact.
    pub filename: Deferred<PathBuf>,
}

/// A role supplied and owned outside of this system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreCreatedIamRole {
    /// ARN of the existing role.
    pub role_arn: String,
}

/// A role this system creates and keeps up to date.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedIamRole {
    /// Name the role is recorded under in the deploy result.
    pub resource_name: String,
    /// Remote ARN, known once the role is looked up or created.
    pub role_arn: Deferred<String>,
    /// Remote role name.
    pub role_name: String,
    /// Assume-role policy document.
    pub trust_policy: Value,
    /// Inline permissions policy.
    pub policy: IamPolicy,
}

/// An inline policy generated from the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoGenIamPolicy {
    /// Generated policy document.
    pub document: Deferred<Value>,
}

/// An inline policy read from a file in the project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBasedIamPolicy {
    /// Path of the policy document.
    pub filename: PathBuf,
}

/// The role a function runs as.
#[derive(Debug, Clone, PartialEq)]
pub enum IamRole {
    /// Externally managed role.
    PreCreated(Shared<PreCreatedIamRole>),
    /// Role created and updated by the deployer.
    Managed(Shared<ManagedIamRole>),
}

/// The inline policy attached to a managed role.
#[derive(Debug, Clone, PartialEq)]
pub enum IamPolicy {
    /// Generated during the build stage.
    AutoGen(Shared<AutoGenIamPolicy>),
    /// Loaded from the project at plan time.
    FileBased(Shared<FileBasedIamPolicy>),
}

/// Any deployable entity.
///
/// Cloning a `Resource` clones the handle, not the resource.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    /// A serverless function.
    LambdaFunction(Shared<LambdaFunction>),
    /// A code artifact.
    DeploymentPackage(Shared<DeploymentPackage>),
    /// An externally managed role.
    PreCreatedIamRole(Shared<PreCreatedIamRole>),
    /// A deployer-managed role.
    ManagedIamRole(Shared<ManagedIamRole>),
    /// A generated inline policy.
    AutoGenIamPolicy(Shared<AutoGenIamPolicy>),
    /// A file-based inline policy.
    FileBasedIamPolicy(Shared<FileBasedIamPolicy>),
}

/// Identity of a resource handle, independent of its contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId(*const ());

fn id_of<T>(handle: &Shared<T>) -> ResourceId {
    ResourceId(Rc::as_ptr(handle).cast::<()>())
}

impl Application {
    /// Creates an application for a stage.
    #[must_use]
    pub fn new(stage: impl Into<String>, resources: Vec<Resource>) -> Self {
        Self {
            stage: stage.into(),
            resources,
        }
    }

    /// The application depends on each of its top-level resources.
    #[must_use]
    pub fn dependencies(&self) -> Vec<Resource> {
        self.resources.clone()
    }
}

impl Resource {
    /// Resources that must be handled before this one.
    #[must_use]
    pub fn dependencies(&self) -> Vec<Self> {
        match self {
            Self::LambdaFunction(function) => {
                let function = function.borrow();
                vec![
                    Self::DeploymentPackage(Rc::clone(&function.deployment_package)),
                    Self::from(function.role.clone()),
                ]
            }
            Self::ManagedIamRole(role) => vec![Self::from(role.borrow().policy.clone())],
            Self::DeploymentPackage(_)
            | Self::PreCreatedIamRole(_)
            | Self::AutoGenIamPolicy(_)
            | Self::FileBasedIamPolicy(_) => vec![],
        }
    }

    /// Identity of the underlying handle.
    #[must_use]
    pub fn id(&self) -> ResourceId {
        match self {
            Self::LambdaFunction(r) => id_of(r),
            Self::DeploymentPackage(r) => id_of(r),
            Self::PreCreatedIamRole(r) => id_of(r),
            Self::ManagedIamRole(r) => id_of(r),
            Self::AutoGenIamPolicy(r) => id_of(r),
            Self::FileBasedIamPolicy(r) => id_of(r),
        }
    }

    /// Kind tag recorded in the deploy result, for resources the deployer owns.
    #[must_use]
    pub const fn resource_type(&self) -> Option<&'static str> {
        match self {
            Self::LambdaFunction(_) => Some("lambda_function"),
            Self::ManagedIamRole(_) => Some("iam_role"),
            _ => None,
        }
    }

    /// Name recorded in the deploy result, for resources the deployer owns.
    #[must_use]
    pub fn resource_name(&self) -> Option<String> {
        match self {
            Self::LambdaFunction(function) => Some(function.borrow().resource_name.clone()),
            Self::ManagedIamRole(role) => Some(role.borrow().resource_name.clone()),
            _ => None,
        }
    }

    /// Short human-readable label for logs and errors.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::LambdaFunction(function) => {
                format!("lambda_function '{}'", function.borrow().function_name)
            }
            Self::DeploymentPackage(_) => String::from("deployment_package"),
            Self::PreCreatedIamRole(role) => {
                format!("pre-created role '{}'", role.borrow().role_arn)
            }
            Self::ManagedIamRole(role) => format!("iam_role '{}'", role.borrow().role_name),
            Self::AutoGenIamPolicy(_) => String::from("autogen_policy"),
            Self::FileBasedIamPolicy(policy) => {
                format!("policy file '{}'", policy.borrow().filename.display())
            }
        }
    }
}

impl From<IamRole> for Resource {
    fn from(role: IamRole) -> Self {
        match role {
            IamRole::PreCreated(r) => Self::PreCreatedIamRole(r),
            IamRole::Managed(r) => Self::ManagedIamRole(r),
        }
    }
}

impl From<IamPolicy> for Resource {
    fn from(policy: IamPolicy) -> Self {
        match policy {
            IamPolicy::AutoGen(p) => Self::AutoGenIamPolicy(p),
            IamPolicy::FileBased(p) => Self::FileBasedIamPolicy(p),
        }
    }
}

impl From<Shared<LambdaFunction>> for Resource {
    fn from(function: Shared<LambdaFunction>) -> Self {
        Self::LambdaFunction(function)
    }
}

impl IamRole {
    /// Wraps an externally managed role ARN.
    #[must_use]
    pub fn pre_created(role_arn: impl Into<String>) -> Self {
        Self::PreCreated(shared(PreCreatedIamRole {
            role_arn: role_arn.into(),
        }))
    }
}

impl DeploymentPackage {
    /// A package the build stage still has to produce.
    #[must_use]
    pub const fn pending() -> Self {
        Self {
            filename: Deferred::build_stage(),
        }
    }

    /// A package that already exists on disk.
    #[must_use]
    pub fn from_file(filename: impl Into<PathBuf>) -> Self {
        Self {
            filename: Deferred::Resolved(filename.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn managed_role() -> Shared<ManagedIamRole> {
        shared(ManagedIamRole {
            resource_name: String::from("default-role"),
            role_arn: Deferred::deploy_stage(),
            role_name: String::from("app-dev"),
            trust_policy: json!({}),
            policy: IamPolicy::AutoGen(shared(AutoGenIamPolicy {
                document: Deferred::build_stage(),
            })),
        })
    }

    fn function(role: IamRole) -> Shared<LambdaFunction> {
        shared(LambdaFunction {
            resource_name: String::from("foo"),
            function_name: String::from("app-dev-foo"),
            runtime: String::from("python3.12"),
            handler: String::from("app.foo"),
            environment_variables: BTreeMap::new(),
            tags: BTreeMap::new(),
            timeout: None,
            memory_size: None,
            deployment_package: shared(DeploymentPackage::pending()),
            role,
        })
    }

    #[test]
    fn test_function_depends_on_package_then_role() {
        let role = IamRole::pre_created("role:arn");
        let func = function(role.clone());
        let deps = Resource::from(Rc::clone(&func)).dependencies();

        assert_eq!(deps.len(), 2);
        assert!(matches!(deps[0], Resource::DeploymentPackage(_)));
        assert_eq!(deps[1], Resource::from(role));
    }

    #[test]
    fn test_managed_role_depends_on_policy() {
        let role = managed_role();
        let deps = Resource::ManagedIamRole(Rc::clone(&role)).dependencies();
        assert_eq!(deps, vec![Resource::from(role.borrow().policy.clone())]);
    }

    #[test]
    fn test_identity_differs_from_equality() {
        let first = Resource::ManagedIamRole(managed_role());
        let second = Resource::ManagedIamRole(managed_role());

        assert_eq!(first, second);
        assert_ne!(first.id(), second.id());
        assert_eq!(first.id(), first.clone().id());
    }

    #[test]
    fn test_resource_type_only_for_owned_resources() {
        let role = Resource::ManagedIamRole(managed_role());
        assert_eq!(role.resource_type(), Some("iam_role"));
        assert_eq!(role.resource_name().as_deref(), Some("default-role"));

        let pre_created = Resource::from(IamRole::pre_created("role:arn"));
        assert_eq!(pre_created.resource_type(), None);
        assert!(pre_created.dependencies().is_empty());
    }
}
