use chrono::{DateTime, Datelike, Utc};
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::error;

use crate::color::{is_sentinel_color, to_lab};
use crate::constants::colors::LAB_CHANNEL_DIVISOR;
use crate::constants::dates::EPOCH_YEAR;
use crate::data::{Attribute, AttributeValue, FeatureRecord, IndexedItem};
use crate::errors::MatchError;
use crate::stats::{AttributeStats, MapperSettings};
use crate::types::AttributeId;

const NO_COLOR: [f64; 3] = [0.0, 0.0, 0.0];

/// Linearly rescale `value` from `[min, max]` to `[-1, 1]`.
///
/// A value of exactly `0.0` is returned unchanged, even when `0.0` lies inside
/// the range and would otherwise rescale to a non-zero value. Degenerate
/// ranges (`max <= min`, or bounds never observed) also yield `0.0`.
pub fn scale_number(value: f64, min: f64, max: f64) -> f64 {
    if value == 0.0 {
        return value;
    }
    let range = max - min;
    if !range.is_finite() || range <= 0.0 {
        return 0.0;
    }
    (value - min) / range * 2.0 - 1.0
}

/// Maps (loss, finding) item pairs into normalized `FeatureRecord`s.
///
/// Cloning is cheap: the settings snapshot is shared.
#[derive(Clone, Debug)]
pub struct FeatureMapper {
    settings: Arc<MapperSettings>,
}

impl From<MapperSettings> for FeatureMapper {
    fn from(settings: MapperSettings) -> Self {
        Self::new(Arc::new(settings))
    }
}

impl FeatureMapper {
    /// Mapper over a shared settings snapshot.
    pub fn new(settings: Arc<MapperSettings>) -> Self {
        Self { settings }
    }

    /// Statistics this mapper scales against.
    pub fn settings(&self) -> &MapperSettings {
        &self.settings
    }

    /// Map a pair labelled as a match (`+1`).
    pub fn map_match(&self, loss: &IndexedItem, finding: &IndexedItem) -> FeatureRecord {
        self.map(loss, finding).mark_match()
    }

    /// Map a pair labelled as a non-match (`-1`).
    pub fn map_non_match(&self, loss: &IndexedItem, finding: &IndexedItem) -> FeatureRecord {
        self.map(loss, finding).mark_non_match()
    }

    /// Map an unlabelled pair (label `0`).
    pub fn map(&self, loss: &IndexedItem, finding: &IndexedItem) -> FeatureRecord {
        FeatureRecord {
            percent_match: 0.0,
            loss_date_of_incident: self.map_date(loss.date_of_incident),
            finding_date_of_incident: self.map_date(finding.date_of_incident),
            loss_category: self.map_category(&loss.category_id, &loss.sub_category_id),
            finding_category: self.map_category(&finding.category_id, &finding.sub_category_id),
            loss_money: self.map_money(&loss.attributes),
            finding_money: self.map_money(&finding.attributes),
            loss_colors: self.map_colors(&loss.attributes),
            finding_colors: self.map_colors(&finding.attributes),
            loss_attributes: self.map_attributes(&loss.attributes),
            finding_attributes: self.map_attributes(&finding.attributes),
        }
    }

    /// Scale the incident date across the corpus date span to `[-1, 1]`.
    ///
    /// Sentinel dates (before 2000) and corpora without a date span map to `0`.
    pub fn map_date(&self, date: DateTime<Utc>) -> f64 {
        if date.year() < EPOCH_YEAR {
            return 0.0;
        }
        let Some(oldest) = self.settings.oldest_date() else {
            return 0.0;
        };
        let range = self.settings.date_range().num_milliseconds();
        if range == 0 {
            return 0.0;
        }
        let offset = (date - oldest).num_milliseconds();
        (offset as f64 / range as f64) * 2.0 - 1.0
    }

    /// Place a (category, subcategory) pair in the category space, scaled to `[-1, 1]`.
    ///
    /// Subcategories of one category land close together.
    pub fn map_category(&self, category: &str, sub_category: &str) -> f64 {
        let Some(category_index) = self.settings.category_index(category) else {
            error!(category, "category is not in the category index");
            return 0.0;
        };
        let Some(sub_index) = self.settings.sub_category_index(category, sub_category) else {
            error!(category, sub_category, "subcategory is not in the subcategory index");
            return 0.0;
        };
        let count = self.settings.category_count();
        if count == 0 {
            return 0.0;
        }
        let value = (category_index + sub_index) as f64 / count as f64;
        value * 2.0 - 1.0
    }

    /// Scale the first non-zero money amount; only one monetary attribute is modeled.
    pub fn map_money(&self, attributes: &[Attribute]) -> f64 {
        let selected = attributes.iter().find_map(|attribute| match &attribute.value {
            AttributeValue::Money(Some(money)) if money.amount != 0.0 => {
                Some((&attribute.id, money.amount))
            }
            _ => None,
        });
        match selected {
            Some((id, amount)) => self.scale_attribute(id, amount),
            None => 0.0,
        }
    }

    /// Scaled Lab channels of the first meaningful color, or zeros.
    pub fn map_colors(&self, attributes: &[Attribute]) -> [f64; 3] {
        let selected = attributes.iter().find_map(|attribute| match &attribute.value {
            AttributeValue::Color(Some(hex)) if !is_sentinel_color(hex) => {
                Some((&attribute.id, hex.as_str()))
            }
            _ => None,
        });
        let Some((id, hex)) = selected else {
            return NO_COLOR;
        };
        let Some(lab) = to_lab(hex) else {
            return NO_COLOR;
        };
        let Some(stats) = self.settings.color_attribute(id) else {
            error!(attribute_id = %id, "color attribute has no statistics");
            return NO_COLOR;
        };
        [
            scale_with(lab.l / LAB_CHANNEL_DIVISOR, &stats.luminance),
            scale_with(lab.a / LAB_CHANNEL_DIVISOR, &stats.a),
            scale_with(lab.b / LAB_CHANNEL_DIVISOR, &stats.b),
        ]
    }

    /// Keyed per-attribute features for booleans, integers and doubles.
    ///
    /// Money and color are carried by dedicated fields; enum and free-text
    /// attributes have no encoding and are left out.
    pub fn map_attributes(&self, attributes: &[Attribute]) -> IndexMap<AttributeId, Vec<f64>> {
        let mut mapped = IndexMap::new();
        for attribute in attributes {
            let value = match &attribute.value {
                AttributeValue::Boolean(flag) => match flag {
                    Some(true) => 1.0,
                    Some(false) => -1.0,
                    None => 0.0,
                },
                AttributeValue::Integer(number) => {
                    self.scale_attribute(&attribute.id, number.unwrap_or(0) as f64)
                }
                AttributeValue::Double(number) => {
                    self.scale_attribute(&attribute.id, number.unwrap_or(0.0))
                }
                AttributeValue::Money(_) | AttributeValue::Color(_) => continue,
                AttributeValue::Enum(_) | AttributeValue::String(_) => continue,
            };
            mapped.insert(attribute.id.clone(), vec![value]);
        }
        mapped
    }

    /// Catalog-backed enum values need the full catalog to be encoded.
    pub fn map_enum(&self, attribute: &Attribute) -> Result<Vec<f64>, MatchError> {
        Err(MatchError::Unsupported(format!(
            "enum attribute '{}'",
            attribute.id
        )))
    }

    /// Free-text descriptions have no numeric encoding yet.
    pub fn map_text(&self, _text: &str) -> Result<f64, MatchError> {
        Err(MatchError::Unsupported("free text".to_string()))
    }

    /// Alphanumeric identifiers (bag tags, reference numbers) have no numeric encoding yet.
    pub fn map_identifier(&self, _identifier: &str) -> Result<f64, MatchError> {
        Err(MatchError::Unsupported("alphanumeric identifier".to_string()))
    }

    fn scale_attribute(&self, id: &str, value: f64) -> f64 {
        match self.settings.attribute(id) {
            Some(stats) => scale_with(value, stats),
            None => {
                error!(attribute_id = id, "attribute has no statistics");
                0.0
            }
        }
    }
}

fn scale_with(value: f64, stats: &AttributeStats) -> f64 {
    scale_number(value, stats.min, stats.max)
}
