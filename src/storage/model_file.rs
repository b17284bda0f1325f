//! TOML description of a model.
//!
//! ```toml
//! [config]
//! _version = "1"
//!
//! [[subsystem]]
//! path = "pendulum"
//!
//! [[feature]]
//! path = "pendulum/pivot"
//! kind = "frame"
//!
//! [[feature]]
//! path = "pendulum/tip"
//! kind = "station"
//!
//! [[placement]]
//! feature = "pendulum/pivot"
//! value = { frame = { orientation = [[1, 0, 0], [0, 1, 0], [0, 0, 1]], origin = [0, 0, 1] } }
//!
//! [[placement]]
//! feature = "pendulum/tip"
//! on = "pendulum/pivot"
//! ```
//!
//! Subsystems are created first, then features, then placements, each in file
//! order. A parent must be declared before its children.

use std::{io, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::domain::{
    BinaryOp, Config, ExprError, FeatureId, FeaturePath, Model, ModelError, Placement,
    PlacementError, PlacementIndex, PlacementRep, PlacementType, SubsystemId, UnaryOp,
    expr::{Mat33, Vec3},
    kinds,
    path::PathError,
};

/// Errors raised while reading or building a model file.
#[derive(Debug, thiserror::Error)]
pub enum ModelFileError {
    /// The file could not be read.
    #[error("failed to read model file: {0}")]
    Io(#[from] io::Error),

    /// The file is not valid TOML, or does not have the expected shape.
    #[error("failed to parse model file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A path in the file is malformed.
    #[error(transparent)]
    Path(#[from] PathError),

    /// A subsystem or feature could not be added.
    #[error("cannot add '{path}': {source}")]
    Model {
        /// The subsystem being added.
        path: FeaturePath,
        /// Why it was refused.
        source: ModelError,
    },

    /// A placement expression is ill-typed.
    #[error(transparent)]
    Expr(#[from] ExprError),

    /// No built-in kind has this name.
    #[error("unknown feature kind '{0}'")]
    UnknownKind(String),

    /// Nothing exists at this path.
    #[error("nothing named '{0}' in the model")]
    UnknownPath(FeaturePath),

    /// The path names a plain subsystem where a feature is needed.
    #[error("'{0}' is not a feature")]
    NotAFeature(FeaturePath),

    /// A placement entry needs exactly one of `value` and `on`.
    #[error("placement of '{0}' must have exactly one of 'value' or 'on'")]
    AmbiguousPlacement(String),
}

/// A placement value, as written in a model file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSpec {
    /// A real literal.
    Real(f64),
    /// A vector literal.
    Vec3(Vec3),
    /// A station literal.
    Station(Vec3),
    /// A direction literal, normalized on load.
    Direction(Vec3),
    /// An orientation literal, row-major.
    Orientation(Mat33),
    /// A frame literal.
    Frame {
        /// Rotation, row-major.
        orientation: Mat33,
        /// Origin station.
        origin: Vec3,
    },
    /// A reference to another feature's placement.
    Feature {
        /// The referenced feature.
        path: String,
        /// Element of a composite placement, if only one element is read.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        element: Option<usize>,
    },
    /// Another feature, adapted to a placement category.
    As {
        /// The adapted feature.
        feature: String,
        /// The category it is used as.
        category: PlacementType,
    },
    /// A unary operator.
    Unary {
        /// The operator.
        op: UnaryOp,
        /// Its argument.
        arg: Box<ValueSpec>,
    },
    /// A binary operator.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Left argument.
        lhs: Box<ValueSpec>,
        /// Right argument.
        rhs: Box<ValueSpec>,
    },
}

/// A `[[subsystem]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubsystemSpec {
    /// Full path of the subsystem.
    pub path: String,
}

/// A `[[feature]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    /// Full path of the feature.
    pub path: String,
    /// Built-in kind, by category (`"frame"`) or kind name (`"Frame"`).
    pub kind: String,
}

/// A `[[placement]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementSpec {
    /// The feature being placed.
    pub feature: String,
    /// An explicit value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ValueSpec>,
    /// Place the feature on another feature instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<String>,
}

/// The contents of a model file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelFile {
    /// Model-building configuration.
    #[serde(default)]
    pub config: Config,

    /// Plain subsystems.
    #[serde(default, rename = "subsystem")]
    pub subsystems: Vec<SubsystemSpec>,

    /// Features.
    #[serde(default, rename = "feature")]
    pub features: Vec<FeatureSpec>,

    /// Placements, applied in order.
    #[serde(default, rename = "placement")]
    pub placements: Vec<PlacementSpec>,
}

/// A placement the model refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    /// The feature that was being placed.
    pub feature: FeaturePath,
    /// Why the placement was refused.
    pub error: PlacementError,
}

/// The outcome of building a model file.
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// The built model.
    pub model: Model,
    /// Placements the model refused, in file order.
    pub rejected: Vec<Rejected>,
}

impl ModelFile {
    /// Reads a model file from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ModelFileError> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }

    /// Builds the model described by this file.
    ///
    /// Placements the model refuses (incompatible types, cycles, features
    /// already placed by a derived placement) are collected in the report
    /// rather than aborting the build.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is malformed: bad paths, unknown kinds,
    /// duplicate names, references to missing features, or ill-typed
    /// expressions.
    #[instrument(level = "debug", skip(self))]
    pub fn build(&self) -> Result<BuildReport, ModelFileError> {
        let mut model = Model::with_config(self.config.clone());

        for subsystem in &self.subsystems {
            let path: FeaturePath = subsystem.path.parse()?;
            let parent = parent_of(&model, &path)?;
            model
                .add_subsystem(parent, path.name())
                .map_err(|source| ModelFileError::Model { path, source })?;
        }

        for feature in &self.features {
            let path: FeaturePath = feature.path.parse()?;
            let kind = kinds::builtin(&feature.kind)
                .ok_or_else(|| ModelFileError::UnknownKind(feature.kind.clone()))?;
            let parent = parent_of(&model, &path)?;
            model
                .add_feature_of_kind(parent, path.name(), kind)
                .map_err(|source| ModelFileError::Model { path, source })?;
        }

        let mut rejected = Vec::new();
        for entry in &self.placements {
            let path: FeaturePath = entry.feature.parse()?;
            let feature = resolve_feature(&model, &path)?;

            let result = match (&entry.value, &entry.on) {
                (Some(value), None) => {
                    let placement = value.resolve(&model)?;
                    model.place(feature, placement)
                }
                (None, Some(on)) => {
                    let source = resolve_feature(&model, &on.parse::<FeaturePath>()?)?;
                    model.place_on_feature(feature, source)
                }
                _ => return Err(ModelFileError::AmbiguousPlacement(entry.feature.clone())),
            };

            if let Err(error) = result {
                tracing::debug!("placement of {path} rejected: {error}");
                rejected.push(Rejected {
                    feature: path,
                    error,
                });
            }
        }

        Ok(BuildReport { model, rejected })
    }
}

impl FromStr for ModelFile {
    type Err = ModelFileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}

impl ValueSpec {
    /// Resolves this value against `model`.
    ///
    /// An adaptation the feature's kind does not offer resolves to the empty
    /// placement, as does any operator applied to it.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid literals, unknown feature paths, and
    /// ill-typed operators or element selections.
    pub fn resolve(&self, model: &Model) -> Result<Placement, ModelFileError> {
        let placement = match self {
            Self::Real(x) => Placement::real(*x)?,
            Self::Vec3(v) => Placement::vec3(*v)?,
            Self::Station(v) => Placement::station(*v)?,
            Self::Direction(v) => Placement::direction(*v)?,
            Self::Orientation(m) => Placement::orientation(*m)?,
            Self::Frame {
                orientation,
                origin,
            } => Placement::frame(*orientation, *origin)?,
            Self::Feature { path, element } => {
                let path: FeaturePath = path.parse()?;
                let feature = resolve_feature(model, &path)?;
                let handle = model
                    .feature(feature)
                    .map_err(|_| ModelFileError::NotAFeature(path))?;
                let index = PlacementIndex::from(*element);
                let ty = handle.required_placement_type();
                let rep = handle.reference(index).ok_or(ExprError::Index {
                    ty,
                    index: element.unwrap_or_default(),
                })?;
                Placement::new(rep)
            }
            Self::As { feature, category } => {
                let feature = resolve_feature(model, &feature.parse::<FeaturePath>()?)?;
                model.feature_as_placement(feature, *category)
            }
            Self::Unary { op, arg } => match arg.resolve(model)?.into_rep() {
                Some(arg) => PlacementRep::unary(*op, arg)?.into(),
                None => Placement::empty(),
            },
            Self::Binary { op, lhs, rhs } => {
                match (lhs.resolve(model)?.into_rep(), rhs.resolve(model)?.into_rep()) {
                    (Some(lhs), Some(rhs)) => PlacementRep::binary(*op, lhs, rhs)?.into(),
                    _ => Placement::empty(),
                }
            }
        };
        Ok(placement)
    }
}

fn parent_of(model: &Model, path: &FeaturePath) -> Result<Option<SubsystemId>, ModelFileError> {
    path.parent()
        .map(|parent| {
            model
                .find(&parent)
                .ok_or(ModelFileError::UnknownPath(parent))
        })
        .transpose()
}

fn resolve_feature(model: &Model, path: &FeaturePath) -> Result<FeatureId, ModelFileError> {
    let id = model
        .find(path)
        .ok_or_else(|| ModelFileError::UnknownPath(path.clone()))?;
    model
        .feature_id(id)
        .ok_or_else(|| ModelFileError::NotAFeature(path.clone()))
}
