use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// The six placement categories a feature can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementType {
    /// A real scalar.
    Real,
    /// A free 3-vector.
    Vec3,
    /// A point (station) in space.
    Station,
    /// A unit vector.
    Direction,
    /// A rotation.
    Orientation,
    /// An orientation together with an origin station.
    Frame,
}

impl PlacementType {
    /// All categories, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Real,
        Self::Vec3,
        Self::Station,
        Self::Direction,
        Self::Orientation,
        Self::Frame,
    ];

    /// Lower-case name of the category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Real => "real",
            Self::Vec3 => "vec3",
            Self::Station => "station",
            Self::Direction => "direction",
            Self::Orientation => "orientation",
            Self::Frame => "frame",
        }
    }

    /// The number of addressable elements of a composite placement of this
    /// type. Scalars have none.
    #[must_use]
    pub const fn element_count(self) -> usize {
        match self {
            Self::Real => 0,
            Self::Vec3 | Self::Station | Self::Direction | Self::Orientation => 3,
            Self::Frame => 2,
        }
    }

    /// The type of element `i` of a placement of this type.
    ///
    /// - vectors, stations and directions have three real components
    /// - orientations have three direction axes
    /// - frames have an orientation (0) and an origin station (1)
    #[must_use]
    pub const fn element_type(self, i: usize) -> Option<Self> {
        if i >= self.element_count() {
            return None;
        }
        match self {
            Self::Real => None,
            Self::Vec3 | Self::Station | Self::Direction => Some(Self::Real),
            Self::Orientation => Some(Self::Direction),
            Self::Frame => {
                if i == 0 {
                    Some(Self::Orientation)
                } else {
                    Some(Self::Station)
                }
            }
        }
    }
}

impl fmt::Display for PlacementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a placement category.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown placement type '{0}'")]
pub struct UnknownPlacementType(String);

impl FromStr for PlacementType {
    type Err = UnknownPlacementType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownPlacementType(s.to_string()))
    }
}

/// Selects either a whole placement or one element of a composite placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlacementIndex {
    /// The entire placement.
    #[default]
    Whole,
    /// A single element (see [`PlacementType::element_type`]).
    Element(usize),
}

impl PlacementIndex {
    /// The type selected by this index within a placement of type `ty`.
    #[must_use]
    pub const fn select(self, ty: PlacementType) -> Option<PlacementType> {
        match self {
            Self::Whole => Some(ty),
            Self::Element(i) => ty.element_type(i),
        }
    }
}

impl From<Option<usize>> for PlacementIndex {
    fn from(index: Option<usize>) -> Self {
        index.map_or(Self::Whole, Self::Element)
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(PlacementType::Vec3, 2, Some(PlacementType::Real); "vec3 component")]
    #[test_case(PlacementType::Station, 0, Some(PlacementType::Real); "station coordinate")]
    #[test_case(PlacementType::Orientation, 1, Some(PlacementType::Direction); "orientation axis")]
    #[test_case(PlacementType::Frame, 0, Some(PlacementType::Orientation); "frame rotation")]
    #[test_case(PlacementType::Frame, 1, Some(PlacementType::Station); "frame origin")]
    #[test_case(PlacementType::Frame, 2, None; "frame out of range")]
    #[test_case(PlacementType::Vec3, 3, None; "vec3 out of range")]
    #[test_case(PlacementType::Real, 0, None; "real has no elements")]
    fn element_types(ty: PlacementType, i: usize, expected: Option<PlacementType>) {
        assert_eq!(ty.element_type(i), expected);
    }

    #[test]
    fn whole_index_selects_the_type_itself() {
        for ty in PlacementType::ALL {
            assert_eq!(PlacementIndex::Whole.select(ty), Some(ty));
        }
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Frame".parse(), Ok(PlacementType::Frame));
        assert_eq!("DIRECTION".parse(), Ok(PlacementType::Direction));
        assert!("quaternion".parse::<PlacementType>().is_err());
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for ty in PlacementType::ALL {
            assert_eq!(ty.to_string().parse(), Ok(ty));
        }
    }
}
