// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Lambda Deploy
//!
//! A deployment engine for serverless functions and their execution roles.
//!
//! ## Overview
//!
//! A deploy turns the project configuration into remote functions and roles:
//!
//! - Build the resource graph for a stage from `deploy.yaml`
//! - Order the resources so dependencies come first
//! - Resolve build-time values (deployment package, generated policies)
//! - Compare against live remote state and plan the API calls
//! - Execute the plan, feeding outputs of earlier calls into later ones
//!
//! ## Architecture
//!
//! Values that are not known when the graph is built are held as
//! [`models::Deferred`] and resolved by the stage that owns them:
//!
//! 1. **Build stage**: the package filename and generated policy documents
//! 2. **Deploy stage**: ARNs of roles created during execution, referenced
//!    from the plan through a [`planner::Variable`]
//!
//! ## Modules
//!
//! - [`config`]: Configuration parsing, scoping and validation
//! - [`models`]: Resource model and deferred values
//! - [`graph`]: Resource graph construction and dependency ordering
//! - [`build`]: Build steps run before planning
//! - [`planner`]: Plan stage, plan types and executor
//! - [`deployer`]: Stage orchestration and deploy results
//! - [`aws`]: Remote API capability consumed by the engine
//!
//! ## Example
//!
//! ```yaml
//! app_name: my-app
//! functions:
//!   - name: index
//!   - name: worker
//!     handler: app.worker
//! environment_variables:
//!   LOG_LEVEL: info
//! stages:
//!   prod:
//!     lambda_memory_size: 512
//!     lambda_functions:
//!       worker:
//!         autogen_policy: false
//!         iam_policy_file: worker-policy.json
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod aws;
pub mod build;
pub mod config;
pub mod deployer;
pub mod error;
pub mod graph;
pub mod models;
pub mod osutils;
pub mod planner;

// ============================================================================
// Re-exports
// ============================================================================

pub use aws::ApiClient;
pub use build::{AppPolicyGenerator, BuildStage, DeployStep, Packager};
pub use config::{ConfigParser, ConfigValidator, DeployConfig};
pub use deployer::{DeployResult, Deployer};
pub use error::{DeployError, Result};
pub use graph::{ApplicationGraphBuilder, DependencyBuilder};
pub use models::{Application, Resource};
pub use osutils::{FileReader, OsFileReader};
pub use planner::{Executor, Plan, PlanStage};
