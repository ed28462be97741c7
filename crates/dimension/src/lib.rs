//! `stratum-dimension` — the multi-axis variation space.
//!
//! Content can vary along declared dimension axes (language, audience, ...).
//! A [`DimensionSpacePoint`] is one coordinate tuple over those axes; the
//! [`InterDimensionalVariationGraph`] answers which points generalize,
//! specialize or sit beside each other, computed purely from the axis
//! declarations.

pub mod dimension;
pub mod space;
pub mod variation;

pub use dimension::{ContentDimension, ContentDimensionId, ContentDimensionValue};
pub use space::{DimensionSpacePoint, DimensionSpacePointSet, OriginDimensionSpacePoint};
pub use variation::{InterDimensionalVariationGraph, VariantType};
