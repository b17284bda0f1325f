//! Reading models from disk.

mod model_file;

pub use model_file::{
    BuildReport, FeatureSpec, ModelFile, ModelFileError, PlacementSpec, Rejected, SubsystemSpec,
    ValueSpec,
};
