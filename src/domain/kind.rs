//! The per-kind capability set every placeable feature implements.

use std::{any::Any, fmt, sync::Arc};

use crate::domain::{
    FeatureId, Placement, PlacementIndex, PlacementType, expr::PlacementRep, model::Feature,
};

/// Object-safe access to [`Any`] for kind trait objects.
pub trait AsAny {
    /// Returns `self` as [`Any`], for checked downcasts.
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Behaviour of one kind of feature with respect to its placement.
///
/// A kind fixes the placement type its features require and supplies its own
/// conversion policy and adaptation rules. The generic placement operations
/// of [`Model`](crate::Model) are written once in terms of this trait.
pub trait FeatureKind: AsAny + fmt::Debug + Send + Sync {
    /// The placement type features of this kind require.
    fn required_placement_type(&self) -> PlacementType;

    /// Human-readable kind name, for diagnostics.
    fn type_name(&self) -> &'static str;

    /// Whether `placement` has exactly the required type.
    fn is_required_placement_type(&self, placement: &Placement) -> bool {
        placement.placement_type() == Some(self.required_placement_type())
    }

    /// Whether `placement` can be converted to the required type.
    fn can_convert_to_required_placement_type(&self, placement: &Placement) -> bool {
        !self.convert_to_required_placement_type(placement).is_empty()
    }

    /// Converts `placement` to the required type.
    ///
    /// Returns a placement of exactly the required type, or the empty
    /// placement if no conversion applies.
    fn convert_to_required_placement_type(&self, placement: &Placement) -> Placement;

    /// Creates a reference to the placement of `feature` (a feature of this
    /// kind), or to one of its elements.
    ///
    /// Returns `None` if `index` selects an element the required type does
    /// not have.
    fn create_feature_reference(
        &self,
        feature: FeatureId,
        index: PlacementIndex,
    ) -> Option<PlacementRep> {
        PlacementRep::feature_reference(feature, self.required_placement_type(), index).ok()
    }

    /// Uses `feature` (a feature of this kind) as a placement of type
    /// `category`.
    ///
    /// The result is unowned: callers wrap it in a [`Placement`] themselves.
    /// Denies every category by default.
    fn use_feature_as(&self, feature: &Feature<'_>, category: PlacementType) -> Option<PlacementRep> {
        let _ = (feature, category);
        None
    }

    /// Sub-features created together with every feature of this kind.
    fn sub_features(&self) -> Vec<(&'static str, Arc<dyn FeatureKind>)> {
        Vec::new()
    }

    /// Offered control after `feature` has been placed or re-placed.
    ///
    /// Returns follow-up placements for other features (typically
    /// sub-features); the model applies those that are still unplaced.
    fn post_process_new_placement(&self, feature: &Feature<'_>) -> Vec<(FeatureId, Placement)> {
        let _ = feature;
        Vec::new()
    }

    /// Whether `source` could serve as the placement of a feature of this
    /// kind, either by adaptation or by conversion of a whole reference.
    fn can_place_on_feature_like(&self, source: &Feature<'_>) -> bool {
        let required = self.required_placement_type();
        if source.kind().use_feature_as(source, required).is_some() {
            return true;
        }
        source.reference(PlacementIndex::Whole).is_some_and(|rep| {
            let placement = Placement::new(rep);
            self.is_required_placement_type(&placement)
                || self.can_convert_to_required_placement_type(&placement)
        })
    }
}
