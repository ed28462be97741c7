//! The interdimensional variation graph.
//!
//! Computed purely from the axis declarations; no mutable state. Axes are
//! totally ordered by declaration priority, and generalization chains are
//! obtained by substituting coordinates with their declared fallbacks, one
//! axis at a time in priority order.

use serde::{Deserialize, Serialize};

use stratum_core::{DomainError, DomainResult};

use crate::dimension::{ContentDimension, ContentDimensionValue};
use crate::space::{DimensionSpacePoint, DimensionSpacePointSet};

/// How a target point relates to a source point when creating a node variant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantType {
    /// The target is more specific than the source.
    Specialization,
    /// The target is more general than the source.
    Generalization,
    /// Neither generalizes the other (sibling branches).
    Peer,
}

/// Relationships between dimension space points, derived from declared axes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterDimensionalVariationGraph {
    dimensions: Vec<ContentDimension>,
}

impl InterDimensionalVariationGraph {
    /// Build the graph from axes in priority order (first = highest priority).
    pub fn try_create(dimensions: Vec<ContentDimension>) -> DomainResult<Self> {
        for (i, dimension) in dimensions.iter().enumerate() {
            if dimensions[..i].iter().any(|d| d.id() == dimension.id()) {
                return Err(DomainError::validation(format!(
                    "dimension '{}' is declared more than once",
                    dimension.id()
                )));
            }
        }
        Ok(Self { dimensions })
    }

    pub fn dimensions(&self) -> &[ContentDimension] {
        &self.dimensions
    }

    /// Whether `point` lies inside the declared space: exactly the declared
    /// axes, each coordinate a declared value.
    pub fn contains(&self, point: &DimensionSpacePoint) -> bool {
        if point.dimension_count() != self.dimensions.len() {
            return false;
        }
        self.dimensions.iter().all(|dimension| {
            point
                .coordinate(dimension.id())
                .is_some_and(|value| dimension.contains(value))
        })
    }

    fn ensure_contains(&self, point: &DimensionSpacePoint) -> DomainResult<()> {
        if self.contains(point) {
            Ok(())
        } else {
            Err(DomainError::validation(format!(
                "dimension space point {point} is outside the declared space"
            )))
        }
    }

    /// The most general point of the space (every axis at its root value).
    pub fn root_point(&self) -> DimensionSpacePoint {
        DimensionSpacePoint::from_coordinates(
            self.dimensions
                .iter()
                .map(|d| (d.id().clone(), d.root().clone())),
        )
    }

    /// The deterministic fallback chain of `point`: the point itself first,
    /// then progressively more general points, terminating at the root point.
    ///
    /// The enumeration is mixed-radix over the per-axis fallback chains with
    /// the highest-priority axis as the fastest-varying digit.
    pub fn variations_of(
        &self,
        point: &DimensionSpacePoint,
    ) -> DomainResult<Vec<DimensionSpacePoint>> {
        self.ensure_contains(point)?;

        let chains: Vec<Vec<ContentDimensionValue>> = self
            .dimensions
            .iter()
            .map(|dimension| {
                let value = point
                    .coordinate(dimension.id())
                    .expect("contains() guarantees a coordinate per axis");
                dimension.fallback_chain(value)
            })
            .collect();

        Ok(enumerate_combinations(&self.dimensions, &chains))
    }

    /// Whether `a` is strictly more general than `b`.
    ///
    /// Holds iff `a != b` and on every axis `b`'s coordinate reaches `a`'s
    /// through its fallback chain.
    pub fn is_generalization_of(
        &self,
        a: &DimensionSpacePoint,
        b: &DimensionSpacePoint,
    ) -> bool {
        if !self.contains(a) || !self.contains(b) || a == b {
            return false;
        }
        self.dimensions.iter().all(|dimension| {
            let value_a = a.coordinate(dimension.id()).expect("contained point");
            let value_b = b.coordinate(dimension.id()).expect("contained point");
            dimension.fallback_chain(value_b).contains(value_a)
        })
    }

    pub fn is_specialization_of(
        &self,
        a: &DimensionSpacePoint,
        b: &DimensionSpacePoint,
    ) -> bool {
        self.is_generalization_of(b, a)
    }

    /// Classify the `source → target` variation edge.
    pub fn variant_type(
        &self,
        source: &DimensionSpacePoint,
        target: &DimensionSpacePoint,
    ) -> DomainResult<VariantType> {
        self.ensure_contains(source)?;
        self.ensure_contains(target)?;
        if source == target {
            return Err(DomainError::validation(format!(
                "source and target dimension space point are identical ({source})"
            )));
        }
        if self.is_generalization_of(source, target) {
            Ok(VariantType::Specialization)
        } else if self.is_specialization_of(source, target) {
            Ok(VariantType::Generalization)
        } else {
            Ok(VariantType::Peer)
        }
    }

    /// Every point of the space: the cartesian product of declared values.
    pub fn all_points(&self) -> DimensionSpacePointSet {
        let chains: Vec<Vec<ContentDimensionValue>> = self
            .dimensions
            .iter()
            .map(|d| d.values().to_vec())
            .collect();
        enumerate_combinations(&self.dimensions, &chains)
            .into_iter()
            .collect()
    }

    /// All points a write at `origin` affects: the origin plus every point
    /// it is a generalization of.
    pub fn specialization_set(
        &self,
        origin: &DimensionSpacePoint,
    ) -> DomainResult<DimensionSpacePointSet> {
        self.ensure_contains(origin)?;
        Ok(self
            .all_points()
            .into_iter()
            .filter(|p| p == origin || self.is_generalization_of(origin, p))
            .collect())
    }
}

/// Enumerate coordinate combinations with the first (highest-priority) axis
/// as the fastest-varying digit.
fn enumerate_combinations(
    dimensions: &[ContentDimension],
    per_axis: &[Vec<ContentDimensionValue>],
) -> Vec<DimensionSpacePoint> {
    let total: usize = per_axis.iter().map(Vec::len).product();
    let mut points = Vec::with_capacity(total);
    for n in 0..total {
        let mut remainder = n;
        let coordinates = dimensions.iter().zip(per_axis).map(|(dimension, values)| {
            let index = remainder % values.len();
            remainder /= values.len();
            (dimension.id().clone(), values[index].clone())
        });
        points.push(DimensionSpacePoint::from_coordinates(coordinates));
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::ContentDimensionId;

    fn value(s: &str) -> ContentDimensionValue {
        ContentDimensionValue::try_new(s).unwrap()
    }

    fn axis(id: &str, values: Vec<(&str, Option<&str>)>) -> ContentDimension {
        ContentDimension::try_create(
            ContentDimensionId::try_new(id).unwrap(),
            values
                .into_iter()
                .map(|(v, f)| (value(v), f.map(value)))
                .collect(),
        )
        .unwrap()
    }

    /// language: en(default) ← de ← de-ch; audience: general(default) ← editor
    fn language_audience_space() -> InterDimensionalVariationGraph {
        InterDimensionalVariationGraph::try_create(vec![
            axis(
                "language",
                vec![("en", None), ("de", Some("en")), ("de-ch", Some("de"))],
            ),
            axis("audience", vec![("general", None), ("editor", Some("general"))]),
        ])
        .unwrap()
    }

    fn point(pairs: &[(&str, &str)]) -> DimensionSpacePoint {
        DimensionSpacePoint::from_coordinates(
            pairs
                .iter()
                .map(|(id, v)| (ContentDimensionId::try_new(*id).unwrap(), value(v))),
        )
    }

    #[test]
    fn variations_follow_axis_priority_order() {
        let graph = language_audience_space();
        let variations = graph
            .variations_of(&point(&[("language", "de-ch"), ("audience", "editor")]))
            .unwrap();

        assert_eq!(
            variations,
            vec![
                point(&[("language", "de-ch"), ("audience", "editor")]),
                point(&[("language", "de"), ("audience", "editor")]),
                point(&[("language", "en"), ("audience", "editor")]),
                point(&[("language", "de-ch"), ("audience", "general")]),
                point(&[("language", "de"), ("audience", "general")]),
                point(&[("language", "en"), ("audience", "general")]),
            ]
        );
    }

    #[test]
    fn variations_of_the_root_point_is_the_root_point() {
        let graph = language_audience_space();
        let root = graph.root_point();
        assert_eq!(graph.variations_of(&root).unwrap(), vec![root]);
    }

    #[test]
    fn contains_rejects_unknown_values_and_missing_axes() {
        let graph = language_audience_space();
        assert!(graph.contains(&point(&[("language", "de"), ("audience", "editor")])));
        assert!(!graph.contains(&point(&[("language", "fr"), ("audience", "editor")])));
        assert!(!graph.contains(&point(&[("language", "de")])));
        assert!(!graph.contains(&DimensionSpacePoint::default()));
    }

    #[test]
    fn generalization_is_strict_and_directional() {
        let graph = language_audience_space();
        let general = point(&[("language", "en"), ("audience", "general")]);
        let specific = point(&[("language", "de-ch"), ("audience", "editor")]);

        assert!(graph.is_generalization_of(&general, &specific));
        assert!(!graph.is_generalization_of(&specific, &general));
        assert!(!graph.is_generalization_of(&general, &general));
        assert!(graph.is_specialization_of(&specific, &general));
    }

    #[test]
    fn variant_type_classifies_the_trichotomy() {
        let graph = InterDimensionalVariationGraph::try_create(vec![axis(
            "language",
            vec![("en", None), ("de", Some("en")), ("fr", Some("en"))],
        )])
        .unwrap();

        let en = point(&[("language", "en")]);
        let de = point(&[("language", "de")]);
        let fr = point(&[("language", "fr")]);

        assert_eq!(graph.variant_type(&en, &de).unwrap(), VariantType::Specialization);
        assert_eq!(graph.variant_type(&de, &en).unwrap(), VariantType::Generalization);
        assert_eq!(graph.variant_type(&de, &fr).unwrap(), VariantType::Peer);
        assert!(graph.variant_type(&de, &de).is_err());
    }

    #[test]
    fn all_points_is_the_cartesian_product() {
        let graph = language_audience_space();
        assert_eq!(graph.all_points().len(), 6);
    }

    #[test]
    fn specialization_set_of_a_mid_chain_point() {
        let graph = language_audience_space();
        let origin = point(&[("language", "de"), ("audience", "general")]);
        let affected = graph.specialization_set(&origin).unwrap();

        assert!(affected.contains(&origin));
        assert!(affected.contains(&point(&[("language", "de-ch"), ("audience", "general")])));
        assert!(affected.contains(&point(&[("language", "de"), ("audience", "editor")])));
        assert!(affected.contains(&point(&[("language", "de-ch"), ("audience", "editor")])));
        assert!(!affected.contains(&point(&[("language", "en"), ("audience", "general")])));
        assert_eq!(affected.len(), 4);
    }

    #[test]
    fn zero_dimensional_space_has_a_single_empty_point() {
        let graph = InterDimensionalVariationGraph::try_create(vec![]).unwrap();
        let root = graph.root_point();
        assert_eq!(root.dimension_count(), 0);
        assert!(graph.contains(&root));
        assert_eq!(graph.variations_of(&root).unwrap(), vec![root]);
        assert_eq!(graph.all_points().len(), 1);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_point() -> impl Strategy<Value = DimensionSpacePoint> {
            (
                prop_oneof![Just("en"), Just("de"), Just("de-ch")],
                prop_oneof![Just("general"), Just("editor")],
            )
                .prop_map(|(language, audience)| {
                    point(&[("language", language), ("audience", audience)])
                })
        }

        proptest! {
            #[test]
            fn variations_start_at_the_point_and_end_at_the_root(p in arb_point()) {
                let graph = language_audience_space();
                let variations = graph.variations_of(&p).unwrap();
                prop_assert_eq!(variations.first().unwrap(), &p);
                prop_assert_eq!(variations.last().unwrap(), &graph.root_point());
            }

            #[test]
            fn every_later_variation_is_a_generalization(p in arb_point()) {
                let graph = language_audience_space();
                let variations = graph.variations_of(&p).unwrap();
                for general in variations.iter().skip(1) {
                    prop_assert!(graph.is_generalization_of(general, &p));
                }
            }

            #[test]
            fn generalization_is_antisymmetric(a in arb_point(), b in arb_point()) {
                let graph = language_audience_space();
                prop_assert!(
                    !(graph.is_generalization_of(&a, &b) && graph.is_generalization_of(&b, &a))
                );
            }
        }
    }
}
