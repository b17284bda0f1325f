//! Typed placement expressions.
//!
//! A [`PlacementRep`] is an immutable expression tree whose type is checked
//! when it is built. Leaves are constants or references to the placement of
//! another feature; inner nodes are typed operators. Nothing here evaluates
//! an expression numerically; the tree only records *what* a placement is
//! defined in terms of.

use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};

use crate::domain::{FeatureId, PlacementIndex, PlacementType};

/// Three real components.
pub type Vec3 = [f64; 3];

/// A 3x3 matrix, stored row-major.
pub type Mat33 = [[f64; 3]; 3];

/// The identity rotation.
pub const IDENTITY: Mat33 = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// A literal placement value.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// A real scalar.
    Real(f64),
    /// A free vector.
    Vec3(Vec3),
    /// A point, measured from the ground origin.
    Station(Vec3),
    /// A direction. Normalized when a representation is built from it.
    Direction(Vec3),
    /// A rotation matrix.
    Orientation(Mat33),
    /// A rotation together with an origin point.
    Frame {
        /// Rotation of the frame.
        orientation: Mat33,
        /// Origin of the frame.
        origin: Vec3,
    },
}

impl Constant {
    /// The category of this literal.
    #[must_use]
    pub const fn placement_type(&self) -> PlacementType {
        match self {
            Self::Real(_) => PlacementType::Real,
            Self::Vec3(_) => PlacementType::Vec3,
            Self::Station(_) => PlacementType::Station,
            Self::Direction(_) => PlacementType::Direction,
            Self::Orientation(_) => PlacementType::Orientation,
            Self::Frame { .. } => PlacementType::Frame,
        }
    }

    fn is_finite(&self) -> bool {
        let finite = |v: &Vec3| v.iter().all(|x| x.is_finite());
        match self {
            Self::Real(x) => x.is_finite(),
            Self::Vec3(v) | Self::Station(v) | Self::Direction(v) => finite(v),
            Self::Orientation(m) => m.iter().all(finite),
            Self::Frame {
                orientation,
                origin,
            } => orientation.iter().all(finite) && finite(origin),
        }
    }
}

/// A reference to the placement of a feature, or to one of its elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeatureReference {
    feature: FeatureId,
    whole: PlacementType,
    index: PlacementIndex,
}

impl FeatureReference {
    /// The referenced feature.
    #[must_use]
    pub const fn feature(&self) -> FeatureId {
        self.feature
    }

    /// The type of the referenced feature's whole placement.
    #[must_use]
    pub const fn whole_type(&self) -> PlacementType {
        self.whole
    }

    /// Which part of the placement is referenced.
    #[must_use]
    pub const fn index(&self) -> PlacementIndex {
        self.index
    }
}

/// Operators taking one argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    /// Real → Real, Vec3 → Vec3, Direction → Direction.
    Negate,
    /// Vec3 → Real.
    Length,
    /// Vec3 → Direction.
    Normalize,
    /// Station → Vec3 (position vector), Direction → Vec3 (unit vector).
    AsVector,
    /// Vec3 → Station.
    AsStation,
    /// Frame → Station.
    Origin,
    /// Frame → Orientation.
    Rotation,
    /// Orientation → Frame located at the ground origin.
    FrameFromOrientation,
    /// Station → Frame with the identity rotation.
    FrameFromStation,
}

impl UnaryOp {
    /// The result type of applying this operator to an argument of type `arg`.
    #[must_use]
    pub const fn result_type(self, arg: PlacementType) -> Option<PlacementType> {
        use PlacementType as T;

        match (self, arg) {
            (Self::Negate, T::Real | T::Vec3 | T::Direction) => Some(arg),
            (Self::Length, T::Vec3) => Some(T::Real),
            (Self::Normalize, T::Vec3) => Some(T::Direction),
            (Self::AsVector, T::Station | T::Direction) => Some(T::Vec3),
            (Self::AsStation, T::Vec3) => Some(T::Station),
            (Self::Origin, T::Frame) => Some(T::Station),
            (Self::Rotation, T::Frame) => Some(T::Orientation),
            (Self::FrameFromOrientation, T::Orientation) | (Self::FrameFromStation, T::Station) => {
                Some(T::Frame)
            }
            _ => None,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Negate => "negate",
            Self::Length => "length",
            Self::Normalize => "normalize",
            Self::AsVector => "as_vector",
            Self::AsStation => "as_station",
            Self::Origin => "origin",
            Self::Rotation => "rotation",
            Self::FrameFromOrientation => "frame_from_orientation",
            Self::FrameFromStation => "frame_from_station",
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operators taking two arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    /// Real+Real, Vec3+Vec3, Station+Vec3.
    Add,
    /// Real-Real, Vec3-Vec3, Station-Station (→ Vec3), Station-Vec3.
    Sub,
    /// Real×Real, Real×Vec3.
    Scale,
    /// Dot product of vectors or directions.
    Dot,
    /// Cross product of vectors or directions.
    Cross,
    /// Distance between two stations.
    Distance,
    /// A frame from an orientation and an origin station.
    FrameOf,
}

impl BinaryOp {
    /// The result type of applying this operator, if defined for these
    /// argument types.
    #[must_use]
    pub const fn result_type(self, lhs: PlacementType, rhs: PlacementType) -> Option<PlacementType> {
        use PlacementType as T;

        match (self, lhs, rhs) {
            (Self::Add | Self::Sub | Self::Scale, T::Real, T::Real) => Some(T::Real),
            (Self::Add | Self::Sub, T::Vec3, T::Vec3) | (Self::Sub, T::Station, T::Station) => {
                Some(T::Vec3)
            }
            (Self::Add | Self::Sub, T::Station, T::Vec3) => Some(T::Station),
            (Self::Scale, T::Real, T::Vec3) => Some(T::Vec3),
            (Self::Dot, T::Vec3 | T::Direction, T::Vec3 | T::Direction)
            | (Self::Distance, T::Station, T::Station) => Some(T::Real),
            (Self::Cross, T::Vec3 | T::Direction, T::Vec3 | T::Direction) => Some(T::Vec3),
            (Self::FrameOf, T::Orientation, T::Station) => Some(T::Frame),
            _ => None,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Scale => "scale",
            Self::Dot => "dot",
            Self::Cross => "cross",
            Self::Distance => "distance",
            Self::FrameOf => "frame_of",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The shape of a [`PlacementRep`] node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal.
    Constant(Constant),
    /// The placement (or one element of the placement) of a feature.
    FeatureRef(FeatureReference),
    /// One element of a composite sub-expression.
    Element {
        /// The composite expression.
        source: Box<PlacementRep>,
        /// Which element.
        index: usize,
    },
    /// A unary operator application.
    Unary {
        /// The operator.
        op: UnaryOp,
        /// Its argument.
        arg: Box<PlacementRep>,
    },
    /// A binary operator application.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Left argument.
        lhs: Box<PlacementRep>,
        /// Right argument.
        rhs: Box<PlacementRep>,
    },
}

/// Errors raised when building an ill-typed expression.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExprError {
    /// The unary operator is not defined for the argument type.
    #[error("{op} is not defined for {arg}")]
    Unary {
        /// The operator.
        op: UnaryOp,
        /// Type of the argument.
        arg: PlacementType,
    },

    /// The binary operator is not defined for the argument types.
    #[error("{op} is not defined for ({lhs}, {rhs})")]
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Type of the left argument.
        lhs: PlacementType,
        /// Type of the right argument.
        rhs: PlacementType,
    },

    /// The element index is out of range for the placement type.
    #[error("{ty} has no element {index}")]
    Index {
        /// The composite type.
        ty: PlacementType,
        /// The requested element.
        index: usize,
    },

    /// A direction literal has zero length.
    #[error("a direction cannot have zero length")]
    ZeroDirection,

    /// A literal contains NaN or infinity.
    #[error("placement constants must be finite")]
    NonFinite,
}

/// A type-checked placement expression.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementRep {
    ty: PlacementType,
    expr: Expr,
}

impl PlacementRep {
    /// A literal placement.
    ///
    /// Direction literals are normalized.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::NonFinite`] for non-finite literals and
    /// [`ExprError::ZeroDirection`] for a zero-length direction.
    pub fn constant(constant: Constant) -> Result<Self, ExprError> {
        if !constant.is_finite() {
            return Err(ExprError::NonFinite);
        }
        let constant = match constant {
            Constant::Direction(v) => {
                let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
                if norm == 0.0 {
                    return Err(ExprError::ZeroDirection);
                }
                Constant::Direction(v.map(|x| x / norm))
            }
            other => other,
        };
        Ok(Self {
            ty: constant.placement_type(),
            expr: Expr::Constant(constant),
        })
    }

    /// A reference to the placement of `feature`, whose whole placement has
    /// type `whole`.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::Index`] if `index` selects an element `whole` does
    /// not have.
    pub fn feature_reference(
        feature: FeatureId,
        whole: PlacementType,
        index: PlacementIndex,
    ) -> Result<Self, ExprError> {
        let ty = match index {
            PlacementIndex::Whole => whole,
            PlacementIndex::Element(i) => whole
                .element_type(i)
                .ok_or(ExprError::Index { ty: whole, index: i })?,
        };
        Ok(Self {
            ty,
            expr: Expr::FeatureRef(FeatureReference {
                feature,
                whole,
                index,
            }),
        })
    }

    /// Element `index` of this composite expression.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::Index`] if this expression's type has no such
    /// element.
    pub fn element(self, index: usize) -> Result<Self, ExprError> {
        let ty = self.ty.element_type(index).ok_or(ExprError::Index {
            ty: self.ty,
            index,
        })?;
        Ok(Self {
            ty,
            expr: Expr::Element {
                source: Box::new(self),
                index,
            },
        })
    }

    /// Applies a unary operator.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::Unary`] if the operator is not defined for this
    /// expression's type.
    pub fn unary(op: UnaryOp, arg: Self) -> Result<Self, ExprError> {
        let ty = op
            .result_type(arg.ty)
            .ok_or(ExprError::Unary { op, arg: arg.ty })?;
        Ok(Self {
            ty,
            expr: Expr::Unary {
                op,
                arg: Box::new(arg),
            },
        })
    }

    /// Applies a binary operator.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::Binary`] if the operator is not defined for these
    /// argument types.
    pub fn binary(op: BinaryOp, lhs: Self, rhs: Self) -> Result<Self, ExprError> {
        let ty = op.result_type(lhs.ty, rhs.ty).ok_or(ExprError::Binary {
            op,
            lhs: lhs.ty,
            rhs: rhs.ty,
        })?;
        Ok(Self {
            ty,
            expr: Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        })
    }

    /// The category of the value this expression denotes.
    #[must_use]
    pub const fn placement_type(&self) -> PlacementType {
        self.ty
    }

    /// The shape of this expression.
    #[must_use]
    pub const fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Whether `feature` is read anywhere in this expression, including
    /// nested sub-expressions.
    #[must_use]
    pub fn depends_on(&self, feature: FeatureId) -> bool {
        match &self.expr {
            Expr::Constant(_) => false,
            Expr::FeatureRef(reference) => reference.feature == feature,
            Expr::Element { source, .. } => source.depends_on(feature),
            Expr::Unary { arg, .. } => arg.depends_on(feature),
            Expr::Binary { lhs, rhs, .. } => lhs.depends_on(feature) || rhs.depends_on(feature),
        }
    }

    /// Every feature this expression reads.
    #[must_use]
    pub fn dependencies(&self) -> BTreeSet<FeatureId> {
        let mut features = BTreeSet::new();
        self.collect_dependencies(&mut features);
        features
    }

    fn collect_dependencies(&self, features: &mut BTreeSet<FeatureId>) {
        match &self.expr {
            Expr::Constant(_) => {}
            Expr::FeatureRef(reference) => {
                features.insert(reference.feature);
            }
            Expr::Element { source, .. } => source.collect_dependencies(features),
            Expr::Unary { arg, .. } => arg.collect_dependencies(features),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_dependencies(features);
                rhs.collect_dependencies(features);
            }
        }
    }

    /// Returns a copy of this expression with every feature reference passed
    /// through `map`.
    ///
    /// Types are preserved, so the result is well-typed whenever `map` sends
    /// features to features with the same placement type.
    #[must_use]
    pub fn remap_features(&self, map: &impl Fn(FeatureId) -> FeatureId) -> Self {
        let expr = match &self.expr {
            Expr::Constant(constant) => Expr::Constant(constant.clone()),
            Expr::FeatureRef(reference) => Expr::FeatureRef(FeatureReference {
                feature: map(reference.feature),
                ..*reference
            }),
            Expr::Element { source, index } => Expr::Element {
                source: Box::new(source.remap_features(map)),
                index: *index,
            },
            Expr::Unary { op, arg } => Expr::Unary {
                op: *op,
                arg: Box::new(arg.remap_features(map)),
            },
            Expr::Binary { op, lhs, rhs } => Expr::Binary {
                op: *op,
                lhs: Box::new(lhs.remap_features(map)),
                rhs: Box::new(rhs.remap_features(map)),
            },
        };
        Self { ty: self.ty, expr }
    }
}

impl PlacementRep {
    /// Renders this expression with feature references written by `name`.
    pub fn display_with<'a, F>(&'a self, name: F) -> impl fmt::Display + 'a
    where
        F: Fn(FeatureId) -> String + 'a,
    {
        Rendered { rep: self, name }
    }

    fn render(&self, f: &mut fmt::Formatter<'_>, name: &dyn Fn(FeatureId) -> String) -> fmt::Result {
        match &self.expr {
            Expr::Constant(constant) => match constant {
                Constant::Real(x) => write!(f, "{x}"),
                Constant::Vec3(v) => write!(f, "vec3{v:?}"),
                Constant::Station(v) => write!(f, "station{v:?}"),
                Constant::Direction(v) => write!(f, "direction{v:?}"),
                Constant::Orientation(m) => write!(f, "orientation{m:?}"),
                Constant::Frame {
                    orientation,
                    origin,
                } => write!(f, "frame({orientation:?}, {origin:?})"),
            },
            Expr::FeatureRef(reference) => {
                write!(f, "@{}", name(reference.feature))?;
                if let PlacementIndex::Element(i) = reference.index {
                    write!(f, "[{i}]")?;
                }
                Ok(())
            }
            Expr::Element { source, index } => {
                source.render(f, name)?;
                write!(f, "[{index}]")
            }
            Expr::Unary { op, arg } => {
                write!(f, "{op}(")?;
                arg.render(f, name)?;
                f.write_str(")")
            }
            Expr::Binary { op, lhs, rhs } => {
                write!(f, "{op}(")?;
                lhs.render(f, name)?;
                f.write_str(", ")?;
                rhs.render(f, name)?;
                f.write_str(")")
            }
        }
    }
}

struct Rendered<'a, F> {
    rep: &'a PlacementRep,
    name: F,
}

impl<F: Fn(FeatureId) -> String> fmt::Display for Rendered<'_, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.rep.render(f, &self.name)
    }
}

impl fmt::Display for PlacementRep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, &|feature| feature.to_string())
    }
}
