//! Resource model for the deployment engine.
//!
//! This module defines the value objects that describe what gets deployed:
//! - Functions, roles, policies and deployment packages
//! - Deferred values that later stages resolve

mod placeholder;
mod resources;

pub use placeholder::{Deferred, Placeholder};
pub use resources::{
    shared, Application, AutoGenIamPolicy, DeploymentPackage, FileBasedIamPolicy, IamPolicy,
    IamRole, LambdaFunction, ManagedIamRole, PreCreatedIamRole, Resource, ResourceId, Shared,
};
