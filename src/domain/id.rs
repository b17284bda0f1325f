use std::fmt;

use uuid::Uuid;

/// Globally unique, stable identifier of a subsystem in a [`Model`].
///
/// [`Model`]: crate::Model
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubsystemId(Uuid);

impl SubsystemId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn uuid(self) -> Uuid {
        self.0
    }
}

impl fmt::Display for SubsystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Identifier of a subsystem that is known to be a feature.
///
/// A `FeatureId` can only be obtained when a feature is created, or through
/// the checked downcast [`Model::feature_id`], so holding one is evidence that
/// the subsystem carried a feature kind at that point.
///
/// [`Model::feature_id`]: crate::Model::feature_id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeatureId(SubsystemId);

impl FeatureId {
    pub(crate) const fn from_subsystem(id: SubsystemId) -> Self {
        Self(id)
    }

    /// The subsystem this feature is.
    #[must_use]
    pub const fn subsystem(self) -> SubsystemId {
        self.0
    }
}

impl From<FeatureId> for SubsystemId {
    fn from(id: FeatureId) -> Self {
        id.0
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
