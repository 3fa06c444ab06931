//! JSON corpus of loss/finding reports with their attribute metadata.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::data::{AttributeMetadata, IndexedItem};
use crate::dataset::read_json;
use crate::errors::MatchError;
use crate::stats::{AttributeStatsBuilder, CategoryHierarchy, MapperSettings};

/// Everything needed to generate pairs for one training run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Corpus {
    /// Declared attributes, in the order vector columns are laid out.
    #[serde(default)]
    pub metadata: Vec<AttributeMetadata>,
    /// Loss and finding reports.
    #[serde(default)]
    pub items: Vec<IndexedItem>,
    /// Category order used by the category feature.
    #[serde(default)]
    pub category_hierarchy: CategoryHierarchy,
}

impl Corpus {
    /// Read a corpus document, dropping legacy items unless `use_legacy_data` is set.
    pub fn read_json(path: &Path, use_legacy_data: bool) -> Result<Self, MatchError> {
        let corpus: Corpus = read_json(path)?;
        info!(
            path = %path.display(),
            items = corpus.items.len(),
            metadata = corpus.metadata.len(),
            categories = corpus.category_hierarchy.entries().len(),
            "loaded corpus"
        );
        Ok(if use_legacy_data {
            corpus
        } else {
            corpus.without_legacy()
        })
    }

    /// Drop items migrated from the previous system.
    pub fn without_legacy(mut self) -> Self {
        let before = self.items.len();
        self.items.retain(|item| !item.legacy);
        debug!(
            dropped = before - self.items.len(),
            kept = self.items.len(),
            "filtered legacy items"
        );
        self
    }

    /// Items reported as lost.
    pub fn losses(&self) -> impl Iterator<Item = &IndexedItem> {
        self.items.iter().filter(|item| item.is_loss())
    }

    /// Items reported as found.
    pub fn findings(&self) -> impl Iterator<Item = &IndexedItem> {
        self.items.iter().filter(|item| item.is_finding())
    }

    /// Run the statistics scan over every item of this corpus.
    pub fn mapper_settings(&self) -> MapperSettings {
        let mut builder = AttributeStatsBuilder::new(&self.category_hierarchy);
        for item in &self.items {
            builder.observe(item);
        }
        builder.finish()
    }
}
