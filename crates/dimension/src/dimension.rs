//! Dimension axis declarations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use stratum_core::{DomainError, DomainResult};

/// Identifier of a dimension axis (e.g. `language`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentDimensionId(String);

impl ContentDimensionId {
    pub fn try_new(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(DomainError::invalid_id("ContentDimensionId must not be empty"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ContentDimensionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One coordinate value on a dimension axis (e.g. `de-ch`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentDimensionValue(String);

impl ContentDimensionValue {
    pub fn try_new(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(DomainError::invalid_id(
                "ContentDimensionValue must not be empty",
            ));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ContentDimensionValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A declared dimension axis: its allowed values and their fallback edges.
///
/// Exactly one value has no fallback; it is the axis root (its default).
/// Every other value declares the more general value it falls back to,
/// forming chains that terminate at the root. Axis priority is the
/// declaration order inside the variation graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDimension {
    id: ContentDimensionId,
    values: Vec<ContentDimensionValue>,
    fallbacks: BTreeMap<ContentDimensionValue, ContentDimensionValue>,
    root: ContentDimensionValue,
}

impl ContentDimension {
    /// Declare an axis from `(value, fallback)` pairs.
    ///
    /// The declaration order of `values` is preserved and used for
    /// deterministic enumeration.
    pub fn try_create(
        id: ContentDimensionId,
        values: Vec<(ContentDimensionValue, Option<ContentDimensionValue>)>,
    ) -> DomainResult<Self> {
        if values.is_empty() {
            return Err(DomainError::validation(format!(
                "dimension '{id}' must declare at least one value"
            )));
        }

        let declared: Vec<ContentDimensionValue> =
            values.iter().map(|(v, _)| v.clone()).collect();
        let mut fallbacks = BTreeMap::new();
        let mut roots = Vec::new();

        for (value, fallback) in &values {
            if declared.iter().filter(|v| *v == value).count() > 1 {
                return Err(DomainError::validation(format!(
                    "dimension '{id}' declares value '{value}' more than once"
                )));
            }
            match fallback {
                None => roots.push(value.clone()),
                Some(target) => {
                    if !declared.contains(target) {
                        return Err(DomainError::validation(format!(
                            "dimension '{id}': fallback target '{target}' of '{value}' is not declared"
                        )));
                    }
                    if target == value {
                        return Err(DomainError::validation(format!(
                            "dimension '{id}': value '{value}' cannot fall back to itself"
                        )));
                    }
                    fallbacks.insert(value.clone(), target.clone());
                }
            }
        }

        let root = match roots.as_slice() {
            [single] => single.clone(),
            [] => {
                return Err(DomainError::validation(format!(
                    "dimension '{id}' has no root value (every value declares a fallback)"
                )));
            }
            _ => {
                return Err(DomainError::validation(format!(
                    "dimension '{id}' declares more than one root value"
                )));
            }
        };

        let dimension = Self {
            id,
            values: declared,
            fallbacks,
            root,
        };

        // Chains must terminate at the root; a cycle would loop past the
        // declared value count.
        for value in &dimension.values {
            if dimension.fallback_chain(value).len() > dimension.values.len() {
                return Err(DomainError::validation(format!(
                    "dimension '{}': fallback chain starting at '{value}' is cyclic",
                    dimension.id
                )));
            }
        }

        Ok(dimension)
    }

    pub fn id(&self) -> &ContentDimensionId {
        &self.id
    }

    /// Declared values in declaration order.
    pub fn values(&self) -> &[ContentDimensionValue] {
        &self.values
    }

    /// The axis root (default) value.
    pub fn root(&self) -> &ContentDimensionValue {
        &self.root
    }

    pub fn contains(&self, value: &ContentDimensionValue) -> bool {
        self.values.contains(value)
    }

    pub fn fallback_of(&self, value: &ContentDimensionValue) -> Option<&ContentDimensionValue> {
        self.fallbacks.get(value)
    }

    /// The fallback chain from `value` (inclusive) to the axis root.
    pub fn fallback_chain(&self, value: &ContentDimensionValue) -> Vec<ContentDimensionValue> {
        let mut chain = vec![value.clone()];
        let mut current = value;
        // Bounded by the value count; cycles are rejected at construction.
        while let Some(next) = self.fallbacks.get(current) {
            chain.push(next.clone());
            current = next;
            if chain.len() > self.values.len() + 1 {
                break;
            }
        }
        chain
    }
}
