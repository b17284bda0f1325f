//! Placement binding for multibody models.
//!
//! A model is a tree of subsystems. Some subsystems are *features* (stations,
//! directions, frames, ...) and each feature may be given a *placement*: a
//! typed expression that can read the placements of other features. The
//! [`Model`] validates placements against the feature's kind, stores each one
//! in a slot owned by the right ancestor, and keeps the dependency graph
//! acyclic.

pub mod domain;
pub use domain::{
    Config, CycleCheck, Feature, FeatureId, FeatureKind, FeaturePath, Model, ModelError,
    Placement, PlacementError, PlacementType, SubsystemId,
};

/// Loading models from TOML model files.
pub mod storage;
pub use storage::{BuildReport, ModelFile};
