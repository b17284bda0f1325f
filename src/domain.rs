//! Domain model for multibody placement binding.
//!
//! This module contains the subsystem tree, feature kinds, placement values
//! and the [`Model`] that binds them together.

mod config;
pub use config::{Config, CycleCheck};

mod id;
pub use id::{FeatureId, SubsystemId};

/// Subsystem names and slash-separated feature paths.
pub mod path;
pub use path::{FeaturePath, Name};

mod placement_type;
pub use placement_type::{PlacementIndex, PlacementType, UnknownPlacementType};

/// Typed placement expressions.
pub mod expr;
pub use expr::{BinaryOp, ExprError, PlacementRep, UnaryOp};

/// Placement values and the slots that store them.
pub mod placement;
pub use placement::{Placement, PlacementSlot, SlotRef};

pub mod kind;
pub use kind::FeatureKind;

pub mod kinds;

pub mod model;
pub use model::{CopyMap, Feature, Model, ModelError, PlacementError};
