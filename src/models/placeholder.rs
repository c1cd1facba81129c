//! Deferred values.
//!
//! Fields whose concrete value is not known when the resource graph is
//! built hold a [`Deferred`] tagged with the [`Placeholder`] stage that is
//! responsible for resolving them.

use serde::{Deserialize, Serialize};

/// The stage that must resolve a deferred value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placeholder {
    /// Resolved by the build stage, before planning begins.
    BuildStage,
    /// Resolved while the plan executes.
    DeployStage,
}

/// A field value that is either concrete or still waiting on a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deferred<T> {
    /// The concrete value.
    Resolved(T),
    /// Not known yet.
    Pending(Placeholder),
}

impl<T> Deferred<T> {
    /// A value the build stage will fill in.
    #[must_use]
    pub const fn build_stage() -> Self {
        Self::Pending(Placeholder::BuildStage)
    }

    /// A value only known once the plan executes.
    #[must_use]
    pub const fn deploy_stage() -> Self {
        Self::Pending(Placeholder::DeployStage)
    }

    /// Returns true if the value is still pending.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

impl<T> From<T> for Deferred<T> {
    fn from(value: T) -> Self {
        Self::Resolved(value)
    }
}

impl std::fmt::Display for Placeholder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::BuildStage => "build_stage",
            Self::DeployStage => "deploy_stage",
        };
        write!(f, "{s}")
    }
}
