#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Command-line pipeline runner used by the `neuralmatch` binary.
pub mod cli;
/// Hex color parsing and Lab conversion.
pub mod color;
/// Pipeline and fan-out configuration types.
pub mod config;
/// Centralized constants used across statistics, mapping, and generation.
pub mod constants;
/// JSON corpus reader.
pub mod corpus;
/// Items, attributes, and feature record types.
pub mod data;
/// Train/test split and pair persistence.
pub mod dataset;
/// CSV export of feature vectors.
pub mod export;
/// Labeled pair generators.
pub mod generator;
mod hash;
/// Item pair to feature record mapping.
pub mod mapper;
/// Aggregate metrics helpers.
pub mod metrics;
/// Corpus-wide normalization statistics.
pub mod stats;
/// Shared type aliases.
pub mod types;
/// Fixed-layout vector assembly.
pub mod vector;

mod errors;

pub use color::{Lab, Rgb};
pub use config::{FanOutConfig, MatchConfig};
pub use corpus::Corpus;
pub use data::{
    Attribute, AttributeKind, AttributeMetadata, AttributeValue, FeatureProperty, FeatureRecord,
    IndexedItem, ItemType, Money, PairLabel,
};
pub use dataset::LearningDataset;
pub use errors::MatchError;
pub use export::CsvExporter;
pub use generator::{
    CancellationToken, NegativePairGenerator, PairGenerator, PositivePairGenerator,
};
pub use mapper::FeatureMapper;
pub use stats::{AttributeStatsBuilder, CategoryHierarchy, MapperSettings};
pub use types::{AttributeId, CategoryId, CurrencyCode, RecordId, SubCategoryId};
pub use vector::{ActiveAttributes, VectorAssembler};
