//! Configuration specification types for the deployment engine.
//!
//! This module defines the structs that map to the project's `deploy.yaml`
//! (or `deploy.json`) file, and the scoping rules that turn the global,
//! per-stage and per-function layers into one resolved view.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Runtime used when none is configured.
pub const DEFAULT_LAMBDA_RUNTIME: &str = "python3.12";

/// Directory under the project that holds file-based policies.
pub const POLICY_DIR: &str = ".deploy";

/// The root configuration structure for a deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeployConfig {
    /// Application name, the prefix of every remote name.
    pub app_name: String,
    /// Project root. Filled from the configuration file location when unset.
    #[serde(default)]
    pub project_dir: Option<PathBuf>,
    /// Runtime for every function.
    #[serde(default = "default_runtime")]
    pub lambda_runtime: String,
    /// Functions to deploy, in declared order.
    #[serde(default)]
    pub functions: Vec<FunctionConfig>,
    /// Settings applied to every stage and function.
    #[serde(flatten)]
    pub settings: FunctionSettings,
    /// Per-stage overrides.
    #[serde(default)]
    pub stages: BTreeMap<String, StageConfig>,
}

/// A function declared by the application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionConfig {
    /// Function name, unique within the application.
    pub name: String,
    /// Entry point. Defaults to `app.{name}`.
    #[serde(default)]
    pub handler: Option<String>,
}

/// Settings that can be given globally, per stage, or per function.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FunctionSettings {
    /// Whether the deployer creates and manages the execution role.
    pub manage_iam_role: Option<bool>,
    /// ARN of an existing role to use instead of a managed one.
    pub iam_role_arn: Option<String>,
    /// Whether the role policy is generated from the application.
    pub autogen_policy: Option<bool>,
    /// Policy file name under the project policy directory.
    pub iam_policy_file: Option<String>,
    /// Environment variables, merged across layers.
    pub environment_variables: Option<BTreeMap<String, String>>,
    /// Tags, merged across layers.
    pub tags: Option<BTreeMap<String, String>>,
    /// Timeout in seconds.
    pub lambda_timeout: Option<u32>,
    /// Memory size in MB.
    pub lambda_memory_size: Option<u32>,
}

/// Per-stage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageConfig {
    /// Settings for every function in this stage.
    #[serde(flatten)]
    pub settings: FunctionSettings,
    /// Settings for individual functions in this stage.
    #[serde(default)]
    pub lambda_functions: BTreeMap<String, FunctionSettings>,
}

/// Configuration resolved for one function in one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedConfig {
    /// Application name.
    pub app_name: String,
    /// Stage name.
    pub stage: String,
    /// Project root.
    pub project_dir: PathBuf,
    /// Runtime identifier.
    pub runtime: String,
    /// Whether the role is managed by the deployer.
    pub manage_iam_role: bool,
    /// Existing role ARN, if configured.
    pub iam_role_arn: Option<String>,
    /// Whether the role policy is generated.
    pub autogen_policy: bool,
    /// Explicit policy file, if configured.
    pub iam_policy_file: Option<String>,
    /// Merged environment variables.
    pub environment_variables: BTreeMap<String, String>,
    /// Merged tags.
    pub tags: BTreeMap<String, String>,
    /// Configured timeout.
    pub lambda_timeout: Option<u32>,
    /// Configured memory size.
    pub lambda_memory_size: Option<u32>,
}

fn default_runtime() -> String {
    String::from(DEFAULT_LAMBDA_RUNTIME)
}

impl DeployConfig {
    /// Creates an empty configuration for an application.
    #[must_use]
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            project_dir: None,
            lambda_runtime: default_runtime(),
            functions: Vec::new(),
            settings: FunctionSettings::default(),
            stages: BTreeMap::new(),
        }
    }

    /// Adds a function with the default handler.
    #[must_use]
    pub fn with_function(mut self, name: impl Into<String>) -> Self {
        self.functions.push(FunctionConfig {
            name: name.into(),
            handler: None,
        });
        self
    }

    /// Sets the project root.
    #[must_use]
    pub fn with_project_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_dir = Some(path.into());
        self
    }

    /// Project root, the current directory when unset.
    #[must_use]
    pub fn project_dir(&self) -> &Path {
        self.project_dir.as_deref().unwrap_or_else(|| Path::new("."))
    }

    /// Directory holding file-based policies.
    #[must_use]
    pub fn policy_dir(&self) -> PathBuf {
        self.project_dir().join(POLICY_DIR)
    }

    /// Mutable settings for one function in one stage, created on demand.
    pub fn stage_function_mut(&mut self, stage: &str, function: &str) -> &mut FunctionSettings {
        self.stages
            .entry(stage.to_string())
            .or_default()
            .lambda_functions
            .entry(function.to_string())
            .or_default()
    }

    /// Returns the declared function names.
    #[must_use]
    pub fn function_names(&self) -> Vec<&str> {
        self.functions.iter().map(|f| f.name.as_str()).collect()
    }

    /// Resolves the configuration for one function in one stage.
    ///
    /// Scalar settings are taken from the most specific layer that sets
    /// them (function in stage, then stage, then global). Maps are merged
    /// with the more specific layer winning per key.
    #[must_use]
    pub fn scope(&self, stage: &str, function: &str) -> ScopedConfig {
        let layers = self.layers(stage, function);

        let lookup = |pick: fn(&FunctionSettings) -> Option<&String>| {
            layers.iter().rev().find_map(|s| pick(s)).cloned()
        };
        let lookup_u32 = |pick: fn(&FunctionSettings) -> Option<u32>| {
            layers.iter().rev().find_map(|s| pick(s))
        };
        let lookup_bool = |pick: fn(&FunctionSettings) -> Option<bool>| {
            layers.iter().rev().find_map(|s| pick(s))
        };
        let merge = |pick: fn(&FunctionSettings) -> Option<&BTreeMap<String, String>>| {
            let mut merged = BTreeMap::new();
            for layer in &layers {
                if let Some(values) = pick(layer) {
                    merged.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            }
            merged
        };

        let iam_role_arn = lookup(|s| s.iam_role_arn.as_ref());
        let manage_iam_role =
            lookup_bool(|s| s.manage_iam_role).unwrap_or(iam_role_arn.is_none());

        ScopedConfig {
            app_name: self.app_name.clone(),
            stage: stage.to_string(),
            project_dir: self.project_dir().to_path_buf(),
            runtime: self.lambda_runtime.clone(),
            manage_iam_role,
            iam_role_arn,
            autogen_policy: lookup_bool(|s| s.autogen_policy).unwrap_or(true),
            iam_policy_file: lookup(|s| s.iam_policy_file.as_ref()),
            environment_variables: merge(|s| s.environment_variables.as_ref()),
            tags: merge(|s| s.tags.as_ref()),
            lambda_timeout: lookup_u32(|s| s.lambda_timeout),
            lambda_memory_size: lookup_u32(|s| s.lambda_memory_size),
        }
    }

    /// Settings layers from least to most specific.
    fn layers(&self, stage: &str, function: &str) -> Vec<&FunctionSettings> {
        let mut layers = vec![&self.settings];
        if let Some(stage_config) = self.stages.get(stage) {
            layers.push(&stage_config.settings);
            if let Some(function_settings) = stage_config.lambda_functions.get(function) {
                layers.push(function_settings);
            }
        }
        layers
    }
}

impl FunctionConfig {
    /// Creates a function with the default handler.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handler: None,
        }
    }

    /// Returns the entry point, `app.{name}` unless configured.
    #[must_use]
    pub fn handler_string(&self) -> String {
        self.handler
            .clone()
            .unwrap_or_else(|| format!("app.{}", self.name))
    }
}

impl ScopedConfig {
    /// Fully-qualified remote function name.
    #[must_use]
    pub fn function_name(&self, function: &str) -> String {
        format!("{}-{}-{}", self.app_name, self.stage, function)
    }

    /// Path of the policy file for a dedicated role.
    #[must_use]
    pub fn policy_file_path(&self) -> PathBuf {
        let filename = self
            .iam_policy_file
            .clone()
            .unwrap_or_else(|| format!("policy-{}.json", self.stage));
        self.project_dir.join(POLICY_DIR).join(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layered_config() -> DeployConfig {
        let mut config = DeployConfig::new("appname").with_function("a").with_function("b");
        config.settings.lambda_timeout = Some(30);
        config.settings.environment_variables = Some(BTreeMap::from([
            (String::from("LEVEL"), String::from("global")),
            (String::from("GLOBAL_ONLY"), String::from("1")),
        ]));
        let stage = config.stages.entry(String::from("dev")).or_default();
        stage.settings.lambda_timeout = Some(45);
        stage.settings.environment_variables = Some(BTreeMap::from([(
            String::from("LEVEL"),
            String::from("stage"),
        )]));
        let a = config.stage_function_mut("dev", "a");
        a.lambda_memory_size = Some(512);
        a.environment_variables = Some(BTreeMap::from([(
            String::from("LEVEL"),
            String::from("function"),
        )]));
        config
    }

    #[test]
    fn test_scope_prefers_most_specific_layer() {
        let config = layered_config();

        let a = config.scope("dev", "a");
        assert_eq!(a.lambda_timeout, Some(45));
        assert_eq!(a.lambda_memory_size, Some(512));
        assert_eq!(a.environment_variables["LEVEL"], "function");
        assert_eq!(a.environment_variables["GLOBAL_ONLY"], "1");

        let b = config.scope("dev", "b");
        assert_eq!(b.lambda_memory_size, None);
        assert_eq!(b.environment_variables["LEVEL"], "stage");

        let prod = config.scope("prod", "a");
        assert_eq!(prod.lambda_timeout, Some(30));
        assert_eq!(prod.environment_variables["LEVEL"], "global");
    }

    #[test]
    fn test_scope_role_defaults() {
        let mut config = DeployConfig::new("appname").with_function("a");
        let scoped = config.scope("dev", "a");
        assert!(scoped.manage_iam_role);
        assert!(scoped.autogen_policy);

        config.stage_function_mut("dev", "a").iam_role_arn = Some(String::from("role:arn"));
        let scoped = config.scope("dev", "a");
        assert!(!scoped.manage_iam_role);
        assert_eq!(scoped.iam_role_arn.as_deref(), Some("role:arn"));
    }

    #[test]
    fn test_policy_file_path() {
        let mut config = DeployConfig::new("appname")
            .with_function("a")
            .with_project_dir("/project");
        let scoped = config.scope("dev", "a");
        assert_eq!(
            scoped.policy_file_path(),
            PathBuf::from("/project/.deploy/policy-dev.json")
        );

        config.stage_function_mut("dev", "a").iam_policy_file = Some(String::from("a.json"));
        let scoped = config.scope("dev", "a");
        assert_eq!(scoped.policy_file_path(), PathBuf::from("/project/.deploy/a.json"));
    }

    #[test]
    fn test_handler_and_function_name() {
        let function = FunctionConfig::new("foo");
        assert_eq!(function.handler_string(), "app.foo");

        let config = DeployConfig::new("lambda-only").with_function("foo");
        assert_eq!(config.scope("dev", "foo").function_name("foo"), "lambda-only-dev-foo");
    }
}
