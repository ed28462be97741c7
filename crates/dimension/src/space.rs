//! Dimension space points: coordinate tuples over the declared axes.

use std::collections::BTreeMap;
use std::collections::btree_set::{self, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::dimension::{ContentDimensionId, ContentDimensionValue};

/// An immutable coordinate tuple, axis id → coordinate value.
///
/// Two points are equal iff their coordinates are; the zero-dimensional
/// point (no axes declared) is the empty tuple.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DimensionSpacePoint {
    coordinates: BTreeMap<ContentDimensionId, ContentDimensionValue>,
}

impl DimensionSpacePoint {
    pub fn from_coordinates(
        coordinates: impl IntoIterator<Item = (ContentDimensionId, ContentDimensionValue)>,
    ) -> Self {
        Self {
            coordinates: coordinates.into_iter().collect(),
        }
    }

    pub fn coordinate(&self, dimension: &ContentDimensionId) -> Option<&ContentDimensionValue> {
        self.coordinates.get(dimension)
    }

    pub fn coordinates(
        &self,
    ) -> impl Iterator<Item = (&ContentDimensionId, &ContentDimensionValue)> {
        self.coordinates.iter()
    }

    pub fn dimension_count(&self) -> usize {
        self.coordinates.len()
    }
}

impl core::fmt::Display for DimensionSpacePoint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{{")?;
        for (i, (id, value)) in self.coordinates.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{id}: {value}")?;
        }
        write!(f, "}}")
    }
}

/// The single point at which a node variant was authored.
///
/// Distinct from [`DimensionSpacePoint`] in the type system so that APIs can
/// state whether they mean "where it was written" or "where it is visible".
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct OriginDimensionSpacePoint(DimensionSpacePoint);

impl OriginDimensionSpacePoint {
    pub fn from_point(point: DimensionSpacePoint) -> Self {
        Self(point)
    }

    pub fn as_point(&self) -> &DimensionSpacePoint {
        &self.0
    }

    pub fn into_point(self) -> DimensionSpacePoint {
        self.0
    }
}

impl From<DimensionSpacePoint> for OriginDimensionSpacePoint {
    fn from(point: DimensionSpacePoint) -> Self {
        Self(point)
    }
}

impl core::fmt::Display for OriginDimensionSpacePoint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// An ordered set of dimension space points.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DimensionSpacePointSet {
    points: BTreeSet<DimensionSpacePoint>,
}

impl DimensionSpacePointSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, point: &DimensionSpacePoint) -> bool {
        self.points.contains(point)
    }

    pub fn insert(&mut self, point: DimensionSpacePoint) {
        self.points.insert(point);
    }

    pub fn remove(&mut self, point: &DimensionSpacePoint) {
        self.points.remove(point);
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, DimensionSpacePoint> {
        self.points.iter()
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            points: self.points.union(&other.points).cloned().collect(),
        }
    }

    pub fn intersection(&self, other: &Self) -> Self {
        Self {
            points: self.points.intersection(&other.points).cloned().collect(),
        }
    }
}

impl FromIterator<DimensionSpacePoint> for DimensionSpacePointSet {
    fn from_iter<I: IntoIterator<Item = DimensionSpacePoint>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for DimensionSpacePointSet {
    type Item = DimensionSpacePoint;
    type IntoIter = btree_set::IntoIter<DimensionSpacePoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.into_iter()
    }
}

impl<'a> IntoIterator for &'a DimensionSpacePointSet {
    type Item = &'a DimensionSpacePoint;
    type IntoIter = btree_set::Iter<'a, DimensionSpacePoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}
