//! Resource graph construction and ordering.
//!
//! This module turns configuration into the resource graph for a stage and
//! flattens that graph into dependency order for the later stages.

mod application;
mod dependencies;

pub use application::{
    lambda_trust_policy, role_resource_name, ApplicationGraphBuilder, SHARED_ROLE_RESOURCE_NAME,
};
pub use dependencies::DependencyBuilder;
