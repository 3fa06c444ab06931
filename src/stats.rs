//! Corpus-wide normalization statistics.
//!
//! `AttributeStatsBuilder` performs a single sequential pass over a corpus and
//! produces an immutable `MapperSettings` snapshot. The category index layout
//! depends on the order of the supplied `CategoryHierarchy`, so hierarchies are
//! ordered lists rather than maps.

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::color::to_lab;
use crate::constants::categories::CATEGORY_PADDING;
use crate::data::{AttributeValue, IndexedItem};
use crate::types::{AttributeId, CategoryId, SubCategoryId};

/// Running min/max/count for one numeric attribute (or one Lab channel).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AttributeStats {
    /// Smallest observed value; `f64::MAX` until the first observation.
    pub min: f64,
    /// Largest observed value; `f64::MIN` until the first observation.
    pub max: f64,
    /// Number of observations, including values without a numeric bound.
    pub count: u64,
}

impl Default for AttributeStats {
    fn default() -> Self {
        Self {
            min: f64::MAX,
            max: f64::MIN,
            count: 0,
        }
    }
}

impl AttributeStats {
    /// Widen the bounds to include `value`. Does not touch `count`.
    pub fn observe(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    /// `true` once at least one real value replaced the sentinel bounds.
    pub fn has_bounds(&self) -> bool {
        self.min <= self.max
    }
}

/// Independent statistics for the three Lab channels of a color attribute.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ColorStats {
    /// L channel.
    pub luminance: AttributeStats,
    /// a channel.
    pub a: AttributeStats,
    /// b channel.
    pub b: AttributeStats,
}

/// One category and its ordered subcategories.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryEntry {
    /// Category id.
    pub category: CategoryId,
    /// Subcategory ids; the index of each is its offset after the category slot.
    #[serde(default)]
    pub subcategories: Vec<SubCategoryId>,
}

/// Ordered category hierarchy. Order determines index layout.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryHierarchy {
    entries: Vec<CategoryEntry>,
}

impl CategoryHierarchy {
    /// Hierarchy with `entries` in layout order.
    pub fn new(entries: Vec<CategoryEntry>) -> Self {
        Self { entries }
    }

    /// Append a category with its subcategories, preserving call order.
    pub fn push<C, S, I>(&mut self, category: C, subcategories: I)
    where
        C: Into<CategoryId>,
        I: IntoIterator<Item = S>,
        S: Into<SubCategoryId>,
    {
        self.entries.push(CategoryEntry {
            category: category.into(),
            subcategories: subcategories.into_iter().map(Into::into).collect(),
        });
    }

    /// Entries in layout order.
    pub fn entries(&self) -> &[CategoryEntry] {
        &self.entries
    }

    /// `true` when no category was added.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<C, S, V> FromIterator<(C, V)> for CategoryHierarchy
where
    C: Into<CategoryId>,
    V: IntoIterator<Item = S>,
    S: Into<SubCategoryId>,
{
    fn from_iter<T: IntoIterator<Item = (C, V)>>(iter: T) -> Self {
        let mut hierarchy = CategoryHierarchy::default();
        for (category, subcategories) in iter {
            hierarchy.push(category, subcategories);
        }
        hierarchy
    }
}

/// Immutable normalization snapshot built once per training corpus.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MapperSettings {
    category_index: IndexMap<CategoryId, usize>,
    sub_category_index: HashMap<CategoryId, HashMap<SubCategoryId, usize>>,
    category_count: usize,
    oldest_date: Option<DateTime<Utc>>,
    newest_date: Option<DateTime<Utc>>,
    attributes: IndexMap<AttributeId, AttributeStats>,
    color_attributes: IndexMap<AttributeId, ColorStats>,
}

impl MapperSettings {
    /// Scan `items` once and derive all normalization statistics.
    pub fn build<'a, I>(items: I, hierarchy: &CategoryHierarchy) -> Self
    where
        I: IntoIterator<Item = &'a IndexedItem>,
    {
        let mut builder = AttributeStatsBuilder::new(hierarchy);
        for item in items {
            builder.observe(item);
        }
        builder.finish()
    }

    /// Base slot of `category` within the category space.
    pub fn category_index(&self, category: &str) -> Option<usize> {
        self.category_index.get(category).copied()
    }

    /// Position of `sub_category` within `category`'s subcategory list.
    pub fn sub_category_index(&self, category: &str, sub_category: &str) -> Option<usize> {
        self.sub_category_index
            .get(category)?
            .get(sub_category)
            .copied()
    }

    /// Category-space size used as normalization denominator.
    pub fn category_count(&self) -> usize {
        self.category_count
    }

    /// Category base slots in hierarchy order.
    pub fn categories(&self) -> &IndexMap<CategoryId, usize> {
        &self.category_index
    }

    /// Oldest real incident date seen by the scan.
    pub fn oldest_date(&self) -> Option<DateTime<Utc>> {
        self.oldest_date
    }

    /// Newest real incident date seen by the scan.
    pub fn newest_date(&self) -> Option<DateTime<Utc>> {
        self.newest_date
    }

    /// Span between oldest and newest incident date; zero when no dates were seen.
    pub fn date_range(&self) -> Duration {
        match (self.oldest_date, self.newest_date) {
            (Some(oldest), Some(newest)) => newest - oldest,
            _ => Duration::zero(),
        }
    }

    /// Statistics of a scalar attribute.
    pub fn attribute(&self, id: &str) -> Option<&AttributeStats> {
        self.attributes.get(id)
    }

    /// Per-channel statistics of a color attribute.
    pub fn color_attribute(&self, id: &str) -> Option<&ColorStats> {
        self.color_attributes.get(id)
    }

    /// All scalar attribute statistics, in first-seen order.
    pub fn attributes(&self) -> &IndexMap<AttributeId, AttributeStats> {
        &self.attributes
    }

    /// All color attribute statistics, in first-seen order.
    pub fn color_attributes(&self) -> &IndexMap<AttributeId, ColorStats> {
        &self.color_attributes
    }
}

/// Incremental single-pass statistics scan.
///
/// The builder is the only place `MapperSettings` is mutated; `finish` hands
/// out the read-only snapshot.
pub struct AttributeStatsBuilder {
    settings: MapperSettings,
    observed_items: usize,
}

impl AttributeStatsBuilder {
    /// Start a scan; the category layout is fixed from `hierarchy` up front.
    pub fn new(hierarchy: &CategoryHierarchy) -> Self {
        let mut settings = MapperSettings::default();
        index_categories(&mut settings, hierarchy);
        Self {
            settings,
            observed_items: 0,
        }
    }

    /// Fold one item into the running statistics. Malformed values are skipped.
    pub fn observe(&mut self, item: &IndexedItem) {
        self.observed_items += 1;
        if item.has_incident_date() {
            let date = item.date_of_incident;
            let settings = &mut self.settings;
            if settings.oldest_date.is_none_or(|oldest| date < oldest) {
                settings.oldest_date = Some(date);
            }
            if settings.newest_date.is_none_or(|newest| date > newest) {
                settings.newest_date = Some(date);
            }
        }

        for attribute in &item.attributes {
            let numeric = match &attribute.value {
                AttributeValue::Color(value) => {
                    self.observe_color(&attribute.id, value.as_deref());
                    continue;
                }
                AttributeValue::Enum(_) | AttributeValue::String(_) => continue,
                AttributeValue::Boolean(value) => value.map(|flag| if flag { 1.0 } else { 0.0 }),
                AttributeValue::Integer(value) => value.map(|number| number as f64),
                AttributeValue::Double(value) => *value,
                AttributeValue::Money(value) => value.as_ref().map(|money| money.amount),
            };
            let stats = self
                .settings
                .attributes
                .entry(attribute.id.clone())
                .or_default();
            stats.count += 1;
            if let Some(numeric) = numeric {
                stats.observe(numeric);
            }
        }
    }

    fn observe_color(&mut self, id: &AttributeId, value: Option<&str>) {
        let Some(value) = value else {
            return;
        };
        // Black and white widen the bounds here; only the mapper treats them as "no color".
        let Some(lab) = to_lab(value) else {
            debug!(attribute_id = %id, value, "skipping unparseable color");
            return;
        };
        let stats = self
            .settings
            .color_attributes
            .entry(id.clone())
            .or_default();
        stats.luminance.count += 1;
        stats.luminance.observe(lab.l);
        stats.a.count += 1;
        stats.a.observe(lab.a);
        stats.b.count += 1;
        stats.b.observe(lab.b);
    }

    /// End the scan and hand out the snapshot.
    pub fn finish(self) -> MapperSettings {
        let settings = self.settings;
        if settings.date_range().is_zero() {
            warn!(
                items = self.observed_items,
                "corpus spans no incident date range; dates will map to 0"
            );
        }
        debug!(
            items = self.observed_items,
            attributes = settings.attributes.len(),
            color_attributes = settings.color_attributes.len(),
            category_count = settings.category_count,
            "mapper settings built"
        );
        settings
    }
}

fn index_categories(settings: &mut MapperSettings, hierarchy: &CategoryHierarchy) {
    let mut next_index = 0usize;
    let mut subcategory_total = 0usize;
    for entry in hierarchy.entries() {
        if settings.category_index.contains_key(&entry.category) {
            warn!(category = %entry.category, "duplicate category in hierarchy ignored");
            continue;
        }
        let mut positions = HashMap::with_capacity(entry.subcategories.len());
        for (position, sub_category) in entry.subcategories.iter().enumerate() {
            positions.entry(sub_category.clone()).or_insert(position);
        }
        settings
            .category_index
            .insert(entry.category.clone(), next_index);
        settings
            .sub_category_index
            .insert(entry.category.clone(), positions);
        next_index += entry.subcategories.len() + CATEGORY_PADDING;
        subcategory_total += entry.subcategories.len();
    }
    settings.category_count = settings.category_index.len() * CATEGORY_PADDING + subcategory_total;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Attribute, ItemType};
    use chrono::TimeZone;

    fn item(id: &str, year: i32, attributes: Vec<Attribute>) -> IndexedItem {
        IndexedItem {
            id: id.to_string(),
            item_type: ItemType::Finding,
            date_of_incident: Utc.with_ymd_and_hms(year, 6, 1, 0, 0, 0).unwrap(),
            category_id: "A".into(),
            sub_category_id: "a1".into(),
            matched_record_id: None,
            description: None,
            legacy: false,
            attributes,
        }
    }

    fn sample_hierarchy() -> CategoryHierarchy {
        [("A", vec!["a1", "a2"]), ("B", vec!["b1"])]
            .into_iter()
            .collect()
    }

    #[test]
    fn category_layout_reserves_padding_per_category() {
        let settings = MapperSettings::build(std::iter::empty(), &sample_hierarchy());
        assert_eq!(settings.category_index("A"), Some(0));
        assert_eq!(settings.category_index("B"), Some(12));
        assert_eq!(settings.sub_category_index("A", "a1"), Some(0));
        assert_eq!(settings.sub_category_index("A", "a2"), Some(1));
        assert_eq!(settings.sub_category_index("B", "b1"), Some(0));
        assert_eq!(settings.sub_category_index("B", "a1"), None);
        assert_eq!(settings.category_count(), 23);
    }

    #[test]
    fn duplicate_categories_keep_first_position() {
        let hierarchy: CategoryHierarchy = [("A", vec!["a1"]), ("A", vec!["x", "y"])]
            .into_iter()
            .collect();
        let settings = MapperSettings::build(std::iter::empty(), &hierarchy);
        assert_eq!(settings.category_index("A"), Some(0));
        assert_eq!(settings.sub_category_index("A", "x"), None);
        assert_eq!(settings.category_count(), 11);
    }

    #[test]
    fn numeric_bounds_cover_every_observation() {
        let items = vec![
            item("1", 2015, vec![Attribute::double("weight", 2.5)]),
            item("2", 2016, vec![Attribute::double("weight", -1.0)]),
            item("3", 2017, vec![Attribute::double("weight", 7.25)]),
        ];
        let settings = MapperSettings::build(&items, &sample_hierarchy());
        let stats = settings.attribute("weight").unwrap();
        assert_eq!(stats.min, -1.0);
        assert_eq!(stats.max, 7.25);
        assert_eq!(stats.count, 3);
    }

    #[test]
    fn count_tracks_presence_not_numeric_validity() {
        let items = vec![
            item(
                "1",
                2015,
                vec![Attribute::new("weight", AttributeValue::Double(None))],
            ),
            item("2", 2015, vec![Attribute::double("weight", 4.0)]),
        ];
        let settings = MapperSettings::build(&items, &sample_hierarchy());
        let stats = settings.attribute("weight").unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!((stats.min, stats.max), (4.0, 4.0));
    }

    #[test]
    fn strings_and_enums_are_skipped() {
        let items = vec![item(
            "1",
            2015,
            vec![
                Attribute::new("brand", AttributeValue::String(Some("acme".into()))),
                Attribute::new("material", AttributeValue::Enum(Some("leather".into()))),
            ],
        )];
        let settings = MapperSettings::build(&items, &sample_hierarchy());
        assert!(settings.attributes().is_empty());
    }

    #[test]
    fn money_and_booleans_update_numeric_stats() {
        let items = vec![
            item(
                "1",
                2015,
                vec![
                    Attribute::money("price", "CHF", 120.0),
                    Attribute::boolean("charger", true),
                ],
            ),
            item(
                "2",
                2015,
                vec![
                    Attribute::money("price", "CHF", 15.5),
                    Attribute::boolean("charger", false),
                ],
            ),
        ];
        let settings = MapperSettings::build(&items, &sample_hierarchy());
        let price = settings.attribute("price").unwrap();
        assert_eq!((price.min, price.max), (15.5, 120.0));
        let charger = settings.attribute("charger").unwrap();
        assert_eq!((charger.min, charger.max), (0.0, 1.0));
    }

    #[test]
    fn colors_track_three_channels_and_skip_malformed_values() {
        let items = vec![
            item("1", 2015, vec![Attribute::color("color", "#ff0000")]),
            item("2", 2015, vec![Attribute::color("color", "#0000ff")]),
            item("3", 2015, vec![Attribute::color("color", "not-a-color")]),
            item("4", 2015, vec![Attribute::color("color", "#ffffff")]),
            item("5", 2015, vec![Attribute::new("color", AttributeValue::Color(None))]),
        ];
        let settings = MapperSettings::build(&items, &sample_hierarchy());
        assert!(settings.attribute("color").is_none());
        let color = settings.color_attribute("color").unwrap();
        assert_eq!(color.luminance.count, 3);
        assert!(color.luminance.min < 33.0);
        assert!(color.luminance.max > 99.0, "white must widen L");
        assert!(color.b.min < -100.0 && color.b.max > 60.0);
    }

    #[test]
    fn black_and_white_bound_luminance() {
        let items = vec![
            item("1", 2015, vec![Attribute::color("shade", "#FFFFFF")]),
            item("2", 2015, vec![Attribute::color("shade", "#ff0000")]),
            item("3", 2015, vec![Attribute::color("shade", " #000000 ")]),
            item("4", 2015, vec![Attribute::color("shade", "")]),
        ];
        let settings = MapperSettings::build(&items, &sample_hierarchy());
        let shade = settings.color_attribute("shade").unwrap();
        assert_eq!(shade.luminance.count, 3);
        assert!(shade.luminance.min.abs() < 0.05);
        assert!((shade.luminance.max - 100.0).abs() < 0.05);
        assert!(shade.luminance.min < shade.luminance.max);
    }

    #[test]
    fn date_range_ignores_sentinel_dates() {
        let items = vec![
            item("1", 1999, Vec::new()),
            item("2", 2010, Vec::new()),
            item("3", 2014, Vec::new()),
        ];
        let settings = MapperSettings::build(&items, &sample_hierarchy());
        assert_eq!(
            settings.oldest_date(),
            Some(Utc.with_ymd_and_hms(2010, 6, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            settings.newest_date(),
            Some(Utc.with_ymd_and_hms(2014, 6, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            settings.date_range(),
            settings.newest_date().unwrap() - settings.oldest_date().unwrap()
        );
    }

    #[test]
    fn building_twice_is_deterministic() {
        let items = vec![
            item(
                "1",
                2012,
                vec![Attribute::integer("pages", 3), Attribute::color("c", "#336699")],
            ),
            item("2", 2018, vec![Attribute::integer("pages", 9)]),
        ];
        let first = MapperSettings::build(&items, &sample_hierarchy());
        let second = MapperSettings::build(&items, &sample_hierarchy());
        assert_eq!(first, second);
    }
}
