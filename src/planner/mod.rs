//! Planning module for deployment operations.
//!
//! This module compares the built resources against live remote state,
//! produces an ordered plan of API calls, and executes that plan.

mod executor;
mod plan;
mod stage;

pub use executor::{Executor, ResourceOutputs};
pub use plan::{short_digest, ApiCall, ApiMethod, ParamValue, Params, Plan, Variable};
pub use stage::PlanStage;
