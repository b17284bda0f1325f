use std::collections::BTreeSet;

use crate::domain::{
    FeatureId, PlacementType, SubsystemId,
    expr::{BinaryOp, Constant, ExprError, Mat33, PlacementRep, UnaryOp, Vec3},
};

/// A placement value: a handle on at most one [`PlacementRep`].
///
/// An *empty* placement has no representation. Conversion and adaptation
/// operations return it to mean "not applicable here"; it is an expected
/// outcome of speculative type negotiation, not an error.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Placement {
    rep: Option<PlacementRep>,
}

impl Placement {
    /// The empty placement.
    #[must_use]
    pub const fn empty() -> Self {
        Self { rep: None }
    }

    /// A placement wrapping `rep`.
    #[must_use]
    pub const fn new(rep: PlacementRep) -> Self {
        Self { rep: Some(rep) }
    }

    /// A real scalar literal.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is not finite.
    pub fn real(value: f64) -> Result<Self, ExprError> {
        PlacementRep::constant(Constant::Real(value)).map(Self::new)
    }

    /// A vector literal.
    ///
    /// # Errors
    ///
    /// Returns an error if any component is not finite.
    pub fn vec3(value: Vec3) -> Result<Self, ExprError> {
        PlacementRep::constant(Constant::Vec3(value)).map(Self::new)
    }

    /// A station literal, measured from the ground origin.
    ///
    /// # Errors
    ///
    /// Returns an error if any component is not finite.
    pub fn station(value: Vec3) -> Result<Self, ExprError> {
        PlacementRep::constant(Constant::Station(value)).map(Self::new)
    }

    /// A direction literal. The vector is normalized.
    ///
    /// # Errors
    ///
    /// Returns an error if the vector is zero or not finite.
    pub fn direction(value: Vec3) -> Result<Self, ExprError> {
        PlacementRep::constant(Constant::Direction(value)).map(Self::new)
    }

    /// An orientation literal.
    ///
    /// # Errors
    ///
    /// Returns an error if any entry is not finite.
    pub fn orientation(value: Mat33) -> Result<Self, ExprError> {
        PlacementRep::constant(Constant::Orientation(value)).map(Self::new)
    }

    /// A frame literal.
    ///
    /// # Errors
    ///
    /// Returns an error if any entry is not finite.
    pub fn frame(orientation: Mat33, origin: Vec3) -> Result<Self, ExprError> {
        PlacementRep::constant(Constant::Frame {
            orientation,
            origin,
        })
        .map(Self::new)
    }

    /// Whether this is the empty placement.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rep.is_none()
    }

    /// The representation, if any.
    #[must_use]
    pub const fn rep(&self) -> Option<&PlacementRep> {
        self.rep.as_ref()
    }

    /// Consumes the placement, returning the representation if any.
    #[must_use]
    pub fn into_rep(self) -> Option<PlacementRep> {
        self.rep
    }

    /// The type tag, or `None` for the empty placement.
    #[must_use]
    pub fn placement_type(&self) -> Option<PlacementType> {
        self.rep.as_ref().map(PlacementRep::placement_type)
    }

    /// Whether the value depends on `feature`. The empty placement depends on
    /// nothing.
    #[must_use]
    pub fn depends_on(&self, feature: FeatureId) -> bool {
        self.rep.as_ref().is_some_and(|rep| rep.depends_on(feature))
    }

    /// The features this value reads.
    #[must_use]
    pub fn dependencies(&self) -> BTreeSet<FeatureId> {
        self.rep
            .as_ref()
            .map(PlacementRep::dependencies)
            .unwrap_or_default()
    }

    /// Applies `op`, yielding the empty placement if this one is empty or the
    /// operator does not apply to its type.
    #[must_use]
    pub fn apply(self, op: UnaryOp) -> Self {
        self.rep
            .and_then(|rep| PlacementRep::unary(op, rep).ok())
            .into()
    }

    /// Combines this placement with `rhs` using `op`, yielding the empty
    /// placement if either side is empty or the operator does not apply.
    #[must_use]
    pub fn combine(self, op: BinaryOp, rhs: Self) -> Self {
        match (self.rep, rhs.rep) {
            (Some(lhs), Some(rhs)) => PlacementRep::binary(op, lhs, rhs).ok().into(),
            _ => Self::empty(),
        }
    }

    /// Element `index` of this placement, or the empty placement if there is
    /// no such element.
    #[must_use]
    pub fn element(self, index: usize) -> Self {
        self.rep.and_then(|rep| rep.element(index).ok()).into()
    }
}

impl From<PlacementRep> for Placement {
    fn from(rep: PlacementRep) -> Self {
        Self::new(rep)
    }
}

impl From<Option<PlacementRep>> for Placement {
    fn from(rep: Option<PlacementRep>) -> Self {
        Self { rep }
    }
}

/// A non-owning reference from a feature to the slot holding its placement.
///
/// The slot lives in the slot storage of `owner`, keyed by the using feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotRef {
    /// The subsystem owning the slot: the using feature or one of its
    /// ancestors.
    pub owner: SubsystemId,
}

/// Storage binding one placement to one feature.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementSlot {
    user: FeatureId,
    placement: Placement,
}

impl PlacementSlot {
    pub(crate) const fn new(user: FeatureId, placement: Placement) -> Self {
        Self { user, placement }
    }

    /// The feature placed by this slot.
    #[must_use]
    pub const fn user(&self) -> FeatureId {
        self.user
    }

    /// The committed placement. Never empty.
    #[must_use]
    pub const fn placement(&self) -> &Placement {
        &self.placement
    }

    pub(crate) fn replace(&mut self, placement: Placement) -> Placement {
        std::mem::replace(&mut self.placement, placement)
    }

    pub(crate) fn into_placement(self) -> Placement {
        self.placement
    }
}
