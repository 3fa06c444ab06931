use chrono::{DateTime, Datelike, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::dates::EPOCH_YEAR;
use crate::constants::generator::{MATCH_LABEL, NON_MATCH_LABEL};
pub use crate::types::{AttributeId, CategoryId, CurrencyCode, RecordId, SubCategoryId};

/// Whether a report describes something lost or something found.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemType {
    /// Reported missing by its owner.
    Loss,
    /// Handed in at a lost-and-found office.
    Finding,
}

/// Monetary value carried by a money attribute.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Money {
    /// ISO 4217 code; not used for scaling.
    pub currency: CurrencyCode,
    /// Amount in `currency`.
    pub amount: f64,
}

/// Typed attribute payload. Every variant may be unset (`None`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum AttributeValue {
    /// Yes/no flag.
    Boolean(Option<bool>),
    /// Whole number.
    Integer(Option<i64>),
    /// Floating point number.
    Double(Option<f64>),
    /// Amount with currency.
    Money(Option<Money>),
    /// Hex color string such as `#1a2b3c`.
    Color(Option<String>),
    /// Catalog value reference; no numeric encoding exists.
    Enum(Option<String>),
    /// Free text; no numeric encoding exists.
    String(Option<String>),
}

impl AttributeValue {
    /// Declared kind matching this variant.
    pub fn kind(&self) -> AttributeKind {
        match self {
            AttributeValue::Boolean(_) => AttributeKind::Boolean,
            AttributeValue::Integer(_) => AttributeKind::Integer,
            AttributeValue::Double(_) => AttributeKind::Double,
            AttributeValue::Money(_) => AttributeKind::Money,
            AttributeValue::Color(_) => AttributeKind::Color,
            AttributeValue::Enum(_) => AttributeKind::Enum,
            AttributeValue::String(_) => AttributeKind::String,
        }
    }
}

/// Declared type of an attribute, independent of any value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeKind {
    /// See [`AttributeValue::Boolean`].
    Boolean,
    /// See [`AttributeValue::Integer`].
    Integer,
    /// See [`AttributeValue::Double`].
    Double,
    /// See [`AttributeValue::Money`].
    Money,
    /// See [`AttributeValue::Color`].
    Color,
    /// See [`AttributeValue::Enum`].
    Enum,
    /// See [`AttributeValue::String`].
    String,
}

impl AttributeKind {
    /// Number of vector slots one attribute of this kind occupies per side.
    pub fn arity(self) -> usize {
        match self {
            AttributeKind::Color => 3,
            _ => 1,
        }
    }
}

/// One attribute value on an item, keyed by its corpus-wide attribute id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute id shared with [`AttributeMetadata::id`].
    pub id: AttributeId,
    /// Typed payload.
    pub value: AttributeValue,
}

impl Attribute {
    /// Attribute with an arbitrary (possibly unset) value.
    pub fn new(id: impl Into<AttributeId>, value: AttributeValue) -> Self {
        Self {
            id: id.into(),
            value,
        }
    }

    /// Set boolean attribute.
    pub fn boolean(id: impl Into<AttributeId>, value: bool) -> Self {
        Self::new(id, AttributeValue::Boolean(Some(value)))
    }

    /// Set integer attribute.
    pub fn integer(id: impl Into<AttributeId>, value: i64) -> Self {
        Self::new(id, AttributeValue::Integer(Some(value)))
    }

    /// Set double attribute.
    pub fn double(id: impl Into<AttributeId>, value: f64) -> Self {
        Self::new(id, AttributeValue::Double(Some(value)))
    }

    /// Set money attribute.
    pub fn money(id: impl Into<AttributeId>, currency: impl Into<CurrencyCode>, amount: f64) -> Self {
        Self::new(
            id,
            AttributeValue::Money(Some(Money {
                currency: currency.into(),
                amount,
            })),
        )
    }

    /// Color attribute holding a hex string. The string is not validated here.
    pub fn color(id: impl Into<AttributeId>, hex: impl Into<String>) -> Self {
        Self::new(id, AttributeValue::Color(Some(hex.into())))
    }

    /// Kind of the carried value.
    pub fn kind(&self) -> AttributeKind {
        self.value.kind()
    }
}

/// A loss or finding report as read from the corpus.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedItem {
    /// Stable record identifier.
    pub id: RecordId,
    /// Loss or finding.
    pub item_type: ItemType,
    /// Incident date; years before 2000 mean "unset".
    pub date_of_incident: DateTime<Utc>,
    /// Top-level category.
    pub category_id: CategoryId,
    /// Subcategory within `category_id`.
    pub sub_category_id: SubCategoryId,
    /// Finding believed to be the same physical item (losses only).
    #[serde(default)]
    pub matched_record_id: Option<RecordId>,
    /// Free-form description, used only in log messages.
    #[serde(default)]
    pub description: Option<String>,
    /// Record migrated from the previous system.
    #[serde(default)]
    pub legacy: bool,
    /// Attribute values in report order; ids may repeat.
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl IndexedItem {
    /// `true` for [`ItemType::Loss`].
    pub fn is_loss(&self) -> bool {
        self.item_type == ItemType::Loss
    }

    /// `true` for [`ItemType::Finding`].
    pub fn is_finding(&self) -> bool {
        self.item_type == ItemType::Finding
    }

    /// Returns `false` for the "no date" sentinel.
    pub fn has_incident_date(&self) -> bool {
        self.date_of_incident.year() >= EPOCH_YEAR
    }
}

/// Corpus-level description of an attribute.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttributeMetadata {
    /// Some exported attributes carry no id; those never enter a vector.
    pub id: Option<AttributeId>,
    /// Declared kind; decides the attribute's vector width.
    pub kind: AttributeKind,
    /// Display name, informational only.
    #[serde(default)]
    pub name: Option<String>,
}

/// Label class derived from a record's match percentage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PairLabel {
    /// `percent_match > 0`.
    Positive,
    /// `percent_match < 0`.
    Negative,
    /// `percent_match == 0`.
    Unlabeled,
}

/// Normalized numeric representation of a (loss, finding) candidate pair.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureRecord {
    /// Match label, conventionally -1, 0 or +1.
    pub percent_match: f64,
    /// Loss incident date scaled over the corpus date span; 0 when unset.
    pub loss_date_of_incident: f64,
    /// Finding incident date, scaled like `loss_date_of_incident`.
    pub finding_date_of_incident: f64,
    /// Position of the loss's (category, subcategory) in the hierarchy layout.
    pub loss_category: f64,
    /// Position of the finding's (category, subcategory) in the hierarchy layout.
    pub finding_category: f64,
    /// First non-zero loss amount, scaled over the observed money range.
    pub loss_money: f64,
    /// First non-zero finding amount, scaled over the observed money range.
    pub finding_money: f64,
    /// Scaled Lab channels of the loss's first meaningful color.
    pub loss_colors: [f64; 3],
    /// Scaled Lab channels of the finding's first meaningful color.
    pub finding_colors: [f64; 3],
    /// Only ids observed on the loss item.
    pub loss_attributes: IndexMap<AttributeId, Vec<f64>>,
    /// Only ids observed on the finding item.
    pub finding_attributes: IndexMap<AttributeId, Vec<f64>>,
}

impl FeatureRecord {
    /// Label class of `percent_match`.
    pub fn label(&self) -> PairLabel {
        if self.percent_match > 0.0 {
            PairLabel::Positive
        } else if self.percent_match < 0.0 {
            PairLabel::Negative
        } else {
            PairLabel::Unlabeled
        }
    }

    /// Set the positive label.
    pub fn mark_match(mut self) -> Self {
        self.percent_match = MATCH_LABEL;
        self
    }

    /// Set the negative label.
    pub fn mark_non_match(mut self) -> Self {
        self.percent_match = NON_MATCH_LABEL;
        self
    }

    /// Attribute ids present on either side.
    pub fn attribute_ids(&self) -> impl Iterator<Item = &AttributeId> {
        self.loss_attributes
            .keys()
            .chain(self.finding_attributes.keys())
    }
}

/// Fixed-position features that may be omitted from an assembled vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureProperty {
    /// [`FeatureRecord::loss_date_of_incident`].
    LossDateOfIncident,
    /// [`FeatureRecord::finding_date_of_incident`].
    FindingDateOfIncident,
    /// [`FeatureRecord::loss_category`].
    LossCategory,
    /// [`FeatureRecord::finding_category`].
    FindingCategory,
    /// [`FeatureRecord::loss_money`].
    LossMoney,
    /// [`FeatureRecord::finding_money`].
    FindingMoney,
    /// [`FeatureRecord::loss_colors`], three slots.
    LossColors,
    /// [`FeatureRecord::finding_colors`], three slots.
    FindingColors,
}

impl FeatureProperty {
    /// Emission order within an assembled vector.
    pub const ALL: [FeatureProperty; 8] = [
        FeatureProperty::LossDateOfIncident,
        FeatureProperty::FindingDateOfIncident,
        FeatureProperty::LossCategory,
        FeatureProperty::FindingCategory,
        FeatureProperty::LossMoney,
        FeatureProperty::FindingMoney,
        FeatureProperty::LossColors,
        FeatureProperty::FindingColors,
    ];

    /// Column name, also accepted (case-insensitively) by `FromStr`.
    pub fn name(self) -> &'static str {
        match self {
            FeatureProperty::LossDateOfIncident => "LossDateOfIncident",
            FeatureProperty::FindingDateOfIncident => "FindingDateOfIncident",
            FeatureProperty::LossCategory => "LossCategory",
            FeatureProperty::FindingCategory => "FindingCategory",
            FeatureProperty::LossMoney => "LossMoney",
            FeatureProperty::FindingMoney => "FindingMoney",
            FeatureProperty::LossColors => "LossColors",
            FeatureProperty::FindingColors => "FindingColors",
        }
    }

    /// Number of vector slots this property occupies.
    pub fn width(self) -> usize {
        match self {
            FeatureProperty::LossColors | FeatureProperty::FindingColors => 3,
            _ => 1,
        }
    }

    /// Values this property contributes for `record`, in emission order.
    pub fn values(self, record: &FeatureRecord) -> &[f64] {
        match self {
            FeatureProperty::LossDateOfIncident => std::slice::from_ref(&record.loss_date_of_incident),
            FeatureProperty::FindingDateOfIncident => {
                std::slice::from_ref(&record.finding_date_of_incident)
            }
            FeatureProperty::LossCategory => std::slice::from_ref(&record.loss_category),
            FeatureProperty::FindingCategory => std::slice::from_ref(&record.finding_category),
            FeatureProperty::LossMoney => std::slice::from_ref(&record.loss_money),
            FeatureProperty::FindingMoney => std::slice::from_ref(&record.finding_money),
            FeatureProperty::LossColors => &record.loss_colors,
            FeatureProperty::FindingColors => &record.finding_colors,
        }
    }
}

impl fmt::Display for FeatureProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FeatureProperty {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        FeatureProperty::ALL
            .into_iter()
            .find(|property| property.name().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| format!("unknown feature property '{value}'"))
    }
}
