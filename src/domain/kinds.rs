//! Built-in feature kinds, one per placement category.

use std::sync::Arc;

use crate::domain::{
    FeatureId, FeatureKind, Placement, PlacementIndex, PlacementType,
    expr::{PlacementRep, UnaryOp},
    model::Feature,
};

/// Name of the origin sub-feature of a [`Frame`].
pub const ORIGIN: &str = "origin";

/// Name of the orientation sub-feature of a [`Frame`].
pub const ORIENTATION: &str = "orientation";

/// Converts `placement` to `required` using the first matching entry of
/// `table`, which maps source types to the operator performing the
/// conversion.
fn convert_with(
    placement: &Placement,
    required: PlacementType,
    table: &[(PlacementType, UnaryOp)],
) -> Placement {
    let Some(ty) = placement.placement_type() else {
        return Placement::empty();
    };
    if ty == required {
        return placement.clone();
    }
    table
        .iter()
        .find(|(from, _)| *from == ty)
        .map_or_else(Placement::empty, |(_, op)| placement.clone().apply(*op))
}

/// A reference to the whole of `feature` if `category` is its own type.
fn own_category(feature: &Feature<'_>, category: PlacementType) -> Option<PlacementRep> {
    (category == feature.required_placement_type())
        .then(|| feature.reference(PlacementIndex::Whole))
        .flatten()
}

/// A real-valued parameter.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealParameter;

impl FeatureKind for RealParameter {
    fn required_placement_type(&self) -> PlacementType {
        PlacementType::Real
    }

    fn type_name(&self) -> &'static str {
        "RealParameter"
    }

    fn convert_to_required_placement_type(&self, placement: &Placement) -> Placement {
        convert_with(placement, PlacementType::Real, &[])
    }

    fn use_feature_as(&self, feature: &Feature<'_>, category: PlacementType) -> Option<PlacementRep> {
        own_category(feature, category)
    }
}

/// A free 3-vector parameter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Vec3Parameter;

impl FeatureKind for Vec3Parameter {
    fn required_placement_type(&self) -> PlacementType {
        PlacementType::Vec3
    }

    fn type_name(&self) -> &'static str {
        "Vec3Parameter"
    }

    fn convert_to_required_placement_type(&self, placement: &Placement) -> Placement {
        convert_with(
            placement,
            PlacementType::Vec3,
            &[
                (PlacementType::Station, UnaryOp::AsVector),
                (PlacementType::Direction, UnaryOp::AsVector),
            ],
        )
    }

    fn use_feature_as(&self, feature: &Feature<'_>, category: PlacementType) -> Option<PlacementRep> {
        own_category(feature, category)
    }
}

/// A point fixed in some frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct Station;

impl FeatureKind for Station {
    fn required_placement_type(&self) -> PlacementType {
        PlacementType::Station
    }

    fn type_name(&self) -> &'static str {
        "Station"
    }

    fn convert_to_required_placement_type(&self, placement: &Placement) -> Placement {
        convert_with(
            placement,
            PlacementType::Station,
            &[
                (PlacementType::Vec3, UnaryOp::AsStation),
                (PlacementType::Frame, UnaryOp::Origin),
            ],
        )
    }

    fn use_feature_as(&self, feature: &Feature<'_>, category: PlacementType) -> Option<PlacementRep> {
        own_category(feature, category)
    }
}

/// A unit vector.
#[derive(Debug, Clone, Copy, Default)]
pub struct Direction;

impl FeatureKind for Direction {
    fn required_placement_type(&self) -> PlacementType {
        PlacementType::Direction
    }

    fn type_name(&self) -> &'static str {
        "Direction"
    }

    fn convert_to_required_placement_type(&self, placement: &Placement) -> Placement {
        convert_with(
            placement,
            PlacementType::Direction,
            &[(PlacementType::Vec3, UnaryOp::Normalize)],
        )
    }

    fn use_feature_as(&self, feature: &Feature<'_>, category: PlacementType) -> Option<PlacementRep> {
        match category {
            PlacementType::Vec3 => feature
                .reference(PlacementIndex::Whole)
                .and_then(|rep| PlacementRep::unary(UnaryOp::AsVector, rep).ok()),
            _ => own_category(feature, category),
        }
    }
}

/// A rotation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Orientation;

impl FeatureKind for Orientation {
    fn required_placement_type(&self) -> PlacementType {
        PlacementType::Orientation
    }

    fn type_name(&self) -> &'static str {
        "Orientation"
    }

    fn convert_to_required_placement_type(&self, placement: &Placement) -> Placement {
        convert_with(
            placement,
            PlacementType::Orientation,
            &[(PlacementType::Frame, UnaryOp::Rotation)],
        )
    }

    fn use_feature_as(&self, feature: &Feature<'_>, category: PlacementType) -> Option<PlacementRep> {
        own_category(feature, category)
    }
}

/// A coordinate frame, with [`ORIENTATION`] and [`ORIGIN`] sub-features.
///
/// Used where a station is expected, a frame stands for its origin; used
/// where an orientation is expected, it stands for its orientation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Frame;

impl FeatureKind for Frame {
    fn required_placement_type(&self) -> PlacementType {
        PlacementType::Frame
    }

    fn type_name(&self) -> &'static str {
        "Frame"
    }

    fn convert_to_required_placement_type(&self, placement: &Placement) -> Placement {
        convert_with(
            placement,
            PlacementType::Frame,
            &[
                (PlacementType::Orientation, UnaryOp::FrameFromOrientation),
                (PlacementType::Station, UnaryOp::FrameFromStation),
            ],
        )
    }

    fn use_feature_as(&self, feature: &Feature<'_>, category: PlacementType) -> Option<PlacementRep> {
        let sub_feature = match category {
            PlacementType::Frame => return own_category(feature, category),
            PlacementType::Station => ORIGIN,
            PlacementType::Orientation => ORIENTATION,
            _ => return None,
        };
        feature
            .child(sub_feature)?
            .reference(PlacementIndex::Whole)
    }

    fn sub_features(&self) -> Vec<(&'static str, Arc<dyn FeatureKind>)> {
        vec![
            (ORIENTATION, Arc::new(Orientation)),
            (ORIGIN, Arc::new(Station)),
        ]
    }

    /// Derives placements for the orientation and origin sub-features from the
    /// frame itself, unless the frame's placement is defined in terms of them.
    fn post_process_new_placement(&self, feature: &Feature<'_>) -> Vec<(FeatureId, Placement)> {
        let Some(whole) = feature.reference(PlacementIndex::Whole) else {
            return Vec::new();
        };
        let Ok(placement) = feature.placement() else {
            return Vec::new();
        };

        [(ORIENTATION, UnaryOp::Rotation), (ORIGIN, UnaryOp::Origin)]
            .into_iter()
            .filter_map(|(name, op)| {
                let child = feature.child(name)?;
                if placement.depends_on(child.id()) {
                    return None;
                }
                Some((child.id(), Placement::new(whole.clone()).apply(op)))
            })
            .collect()
    }
}

/// Looks up a built-in kind by its placement category name (`"frame"`) or
/// its kind name (`"Frame"`), ignoring case.
#[must_use]
pub fn builtin(name: &str) -> Option<Arc<dyn FeatureKind>> {
    let kinds: [Arc<dyn FeatureKind>; 6] = [
        Arc::new(RealParameter),
        Arc::new(Vec3Parameter),
        Arc::new(Station),
        Arc::new(Direction),
        Arc::new(Orientation),
        Arc::new(Frame),
    ];
    kinds.into_iter().find(|kind| {
        kind.type_name().eq_ignore_ascii_case(name)
            || kind.required_placement_type().as_str().eq_ignore_ascii_case(name)
    })
}
