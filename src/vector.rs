//! Flattening of `FeatureRecord`s into fixed-layout numeric vectors.
//!
//! Layout: label, then the fixed properties in `FeatureProperty::ALL` order
//! (minus any skipped ones), then for every active attribute id in insertion
//! order the loss values followed by the finding values. The vector length is
//! therefore a function of the active attributes and the skip set only.

use indexmap::IndexMap;
use std::collections::HashSet;

use crate::data::{AttributeKind, AttributeMetadata, FeatureProperty, FeatureRecord};
use crate::errors::MatchError;
use crate::types::AttributeId;

/// Ordered attribute ids (with declared kind) that make up a vector layout.
pub type ActiveAttributes = IndexMap<AttributeId, AttributeKind>;

/// Build an `ActiveAttributes` layout from corpus metadata, keeping first occurrences.
pub fn active_attributes_from_metadata<'a, I>(metadata: I) -> ActiveAttributes
where
    I: IntoIterator<Item = &'a AttributeMetadata>,
{
    let mut active = ActiveAttributes::new();
    for entry in metadata {
        if let Some(id) = &entry.id {
            active.entry(id.clone()).or_insert(entry.kind);
        }
    }
    active
}

/// Assembles vectors for one training run (fixed active attributes and skip set).
#[derive(Clone, Debug, Default)]
pub struct VectorAssembler {
    active: ActiveAttributes,
    skip: HashSet<FeatureProperty>,
}

impl VectorAssembler {
    /// Assembler emitting every fixed property plus `active` attributes.
    pub fn new(active: ActiveAttributes) -> Self {
        Self {
            active,
            skip: HashSet::new(),
        }
    }

    /// Omit the given fixed properties from every assembled vector.
    pub fn with_skip<I>(mut self, skip: I) -> Self
    where
        I: IntoIterator<Item = FeatureProperty>,
    {
        self.skip.extend(skip);
        self
    }

    /// Attribute columns, in emission order.
    pub fn active_attributes(&self) -> &ActiveAttributes {
        &self.active
    }

    /// Fixed properties left out of every vector.
    pub fn skipped(&self) -> &HashSet<FeatureProperty> {
        &self.skip
    }

    fn emitted_properties(&self) -> impl Iterator<Item = FeatureProperty> + '_ {
        FeatureProperty::ALL
            .into_iter()
            .filter(|property| !self.skip.contains(property))
    }

    /// Length of every vector this assembler produces.
    pub fn vector_len(&self) -> usize {
        let fixed: usize = self.emitted_properties().map(FeatureProperty::width).sum();
        let attributes: usize = self.active.values().map(|kind| kind.arity() * 2).sum();
        1 + fixed + attributes
    }

    /// Column names aligned with `to_vector` output.
    pub fn column_names(&self) -> Vec<String> {
        let mut columns = Vec::with_capacity(self.vector_len());
        columns.push("PercentMatch".to_string());
        for property in self.emitted_properties() {
            match property {
                FeatureProperty::LossColors | FeatureProperty::FindingColors => {
                    let side = if property == FeatureProperty::LossColors {
                        "Loss"
                    } else {
                        "Finding"
                    };
                    for channel in ["L", "A", "B"] {
                        columns.push(format!("{side}Color{channel}"));
                    }
                }
                _ => columns.push(property.name().to_string()),
            }
        }
        for (id, kind) in &self.active {
            for side in ["loss", "finding"] {
                if kind.arity() == 1 {
                    columns.push(format!("{side}{id}"));
                } else {
                    for channel in 0..kind.arity() {
                        columns.push(format!("{side}{id}_{channel}"));
                    }
                }
            }
        }
        columns
    }

    /// Flatten `record` into the assembler's layout.
    ///
    /// Fails with `MalformedVector` when a present attribute vector does not
    /// match its declared arity; that is an upstream mapping bug and the
    /// resulting vector would be misaligned.
    pub fn to_vector(&self, record: &FeatureRecord) -> Result<Vec<f64>, MatchError> {
        let mut vector = Vec::with_capacity(self.vector_len());
        vector.push(record.percent_match);
        for property in self.emitted_properties() {
            vector.extend_from_slice(property.values(record));
        }
        for (id, kind) in &self.active {
            push_attribute(&mut vector, id, *kind, record.loss_attributes.get(id))?;
            push_attribute(&mut vector, id, *kind, record.finding_attributes.get(id))?;
        }
        Ok(vector)
    }

    /// Assemble every record, verifying all vectors share one length.
    pub fn assemble_all<'a, I>(&self, records: I) -> Result<Vec<Vec<f64>>, MatchError>
    where
        I: IntoIterator<Item = &'a FeatureRecord>,
    {
        let expected = self.vector_len();
        records
            .into_iter()
            .enumerate()
            .map(|(index, record)| {
                let vector = self.to_vector(record)?;
                if vector.len() != expected {
                    return Err(MatchError::InconsistentVectorLength {
                        index,
                        expected,
                        actual: vector.len(),
                    });
                }
                Ok(vector)
            })
            .collect()
    }
}

fn push_attribute(
    vector: &mut Vec<f64>,
    id: &AttributeId,
    kind: AttributeKind,
    values: Option<&Vec<f64>>,
) -> Result<(), MatchError> {
    let arity = kind.arity();
    match values {
        None => vector.extend(std::iter::repeat_n(0.0, arity)),
        Some(values) if values.len() == arity => vector.extend_from_slice(values),
        Some(values) => {
            return Err(MatchError::MalformedVector {
                attribute_id: id.clone(),
                kind,
                expected: arity,
                actual: values.len(),
            });
        }
    }
    Ok(())
}

impl FeatureRecord {
    /// Convenience wrapper around `VectorAssembler::to_vector` for one-off use.
    pub fn to_vector(
        &self,
        active: &ActiveAttributes,
        skip: &[FeatureProperty],
    ) -> Result<Vec<f64>, MatchError> {
        VectorAssembler::new(active.clone())
            .with_skip(skip.iter().copied())
            .to_vector(self)
    }
}
