//! Dependency ordering for the resource graph.
//!
//! Flattens everything reachable from an [`Application`] into a list where
//! every resource appears after all of its dependencies.

use std::collections::HashSet;
use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::models::{Application, Resource, ResourceId};

/// Orders resources leaves first.
#[derive(Debug, Default, Clone, Copy)]
pub struct DependencyBuilder;

/// Traversal bookkeeping for one call to [`DependencyBuilder::build_dependencies`].
#[derive(Default)]
struct Walk {
    ordered: Vec<Resource>,
    emitted: HashSet<ResourceId>,
    /// Resources on the current DFS path. The current resource kinds cannot
    /// form a cycle (functions are never dependencies, policies and packages
    /// are leaves); this guards resource kinds that add new edges.
    path: Vec<Resource>,
}

impl DependencyBuilder {
    /// Creates a new dependency builder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Returns every resource reachable from the application exactly once,
    /// each after its own dependencies.
    ///
    /// Resources are deduplicated by handle identity, so a resource shared by
    /// several parents is emitted once, before the first of them. Output
    /// order follows the declared order of top-level resources and of each
    /// resource's dependencies.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::CircularDependency`] if a resource is reachable
    /// from itself. No current resource kind can produce such a graph.
    pub fn build_dependencies(&self, application: &Application) -> Result<Vec<Resource>> {
        let mut walk = Walk::default();
        for resource in application.dependencies() {
            walk.visit(&resource)?;
        }
        debug!(
            "Resolved {} resources for stage {}",
            walk.ordered.len(),
            application.stage
        );
        Ok(walk.ordered)
    }
}

impl Walk {
    fn visit(&mut self, resource: &Resource) -> Result<()> {
        let id = resource.id();
        if self.emitted.contains(&id) {
            return Ok(());
        }
        if let Some(start) = self.path.iter().position(|r| r.id() == id) {
            let cycle = self.path[start..]
                .iter()
                .chain(std::iter::once(resource))
                .map(Resource::label)
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(ConfigError::CircularDependency { cycle }.into());
        }

        self.path.push(resource.clone());
        for dependency in resource.dependencies() {
            self.visit(&dependency)?;
        }
        self.path.pop();

        self.emitted.insert(id);
        self.ordered.push(resource.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        shared, AutoGenIamPolicy, Deferred, DeploymentPackage, IamPolicy, IamRole,
        LambdaFunction, ManagedIamRole, Shared,
    };
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    fn function(name: &str, package: &Shared<DeploymentPackage>, role: IamRole) -> Resource {
        Resource::from(shared(LambdaFunction {
            resource_name: name.to_string(),
            function_name: format!("app-dev-{name}"),
            runtime: String::from("python3.12"),
            handler: format!("app.{name}"),
            environment_variables: BTreeMap::new(),
            tags: BTreeMap::new(),
            timeout: None,
            memory_size: None,
            deployment_package: Rc::clone(package),
            role,
        }))
    }

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

    #[test]
    fn test_single_resource_without_dependencies() {
        let role = Resource::from(IamRole::pre_created("foo"));
        let app = Application::new("dev", vec![role.clone()]);

        let deps = DependencyBuilder::new().build_dependencies(&app).unwrap();
        assert_eq!(deps, vec![role]);
    }

    #[test]
    fn test_shared_leaf_appears_once_before_parents() {
        let package = shared(DeploymentPackage::pending());
        let first_role = IamRole::pre_created("role:first");
        let second_role = IamRole::pre_created("role:second");
        let first = function("first", &package, first_role.clone());
        let second = function("second", &package, second_role.clone());
        let app = Application::new("dev", vec![first.clone(), second.clone()]);

        let deps = DependencyBuilder::new().build_dependencies(&app).unwrap();
        assert_eq!(
            deps,
            vec![
                Resource::DeploymentPackage(Rc::clone(&package)),
                Resource::from(first_role),
                first,
                Resource::from(second_role),
                second,
            ]
        );
    }

    #[test]
    fn test_shared_role_chain_is_ordered_leaves_first() {
        let package = shared(DeploymentPackage::pending());
        let role = managed_role();
        let policy = Resource::from(role.borrow().policy.clone());
        let first = function("first", &package, IamRole::Managed(Rc::clone(&role)));
        let second = function("second", &package, IamRole::Managed(Rc::clone(&role)));
        let app = Application::new("dev", vec![first.clone(), second.clone()]);

        let deps = DependencyBuilder::new().build_dependencies(&app).unwrap();
        let ids: Vec<_> = deps.iter().map(Resource::id).collect();
        assert_eq!(
            ids,
            vec![
                Resource::DeploymentPackage(Rc::clone(&package)).id(),
                policy.id(),
                Resource::ManagedIamRole(Rc::clone(&role)).id(),
                first.id(),
                second.id(),
            ]
        );
    }

    #[test]
    fn test_equal_but_distinct_resources_are_both_kept() {
        let first = Resource::from(IamRole::pre_created("role:arn"));
        let second = Resource::from(IamRole::pre_created("role:arn"));
        let app = Application::new("dev", vec![first, second]);

        let deps = DependencyBuilder::new().build_dependencies(&app).unwrap();
        assert_eq!(deps.len(), 2);
    }

    #[test]
    fn test_order_is_stable_across_calls() {
        let package = shared(DeploymentPackage::pending());
        let role = IamRole::Managed(managed_role());
        let app = Application::new(
            "dev",
            vec![
                function("a", &package, role.clone()),
                function("b", &package, role),
            ],
        );

        let builder = DependencyBuilder::new();
        let first: Vec<_> = builder
            .build_dependencies(&app)
            .unwrap()
            .iter()
            .map(Resource::id)
            .collect();
        let second: Vec<_> = builder
            .build_dependencies(&app)
            .unwrap()
            .iter()
            .map(Resource::id)
            .collect();
        assert_eq!(first, second);
    }
}
