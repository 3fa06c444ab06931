use std::fs;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::tempdir;

use neuralmatch::cli::run_neuralmatch;
use neuralmatch::metrics::label_balance;
use neuralmatch::{
    Attribute, AttributeKind, AttributeMetadata, AttributeValue, CancellationToken,
    CategoryHierarchy, Corpus, CsvExporter, FanOutConfig, FeatureMapper, FeatureProperty,
    IndexedItem, ItemType, LearningDataset, MatchConfig, NegativePairGenerator, PairGenerator,
    PositivePairGenerator,
};

fn base_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2017, 1, 1, 8, 0, 0).unwrap()
}

fn report(
    id: &str,
    item_type: ItemType,
    date: DateTime<Utc>,
    (category, sub_category): (&str, &str),
    matched: Option<&str>,
    attributes: Vec<Attribute>,
) -> IndexedItem {
    IndexedItem {
        id: id.to_string(),
        item_type,
        date_of_incident: date,
        category_id: category.to_string(),
        sub_category_id: sub_category.to_string(),
        matched_record_id: matched.map(str::to_string),
        description: Some(format!("report {id}")),
        legacy: false,
        attributes,
    }
}

fn meta(id: Option<&str>, kind: AttributeKind) -> AttributeMetadata {
    AttributeMetadata {
        id: id.map(str::to_string),
        kind,
        name: None,
    }
}

/// 10 findings, 5 matched losses (one pointing at a missing finding), 10 stale
/// unmatched losses and 1 recent unmatched loss.
fn build_corpus() -> Corpus {
    let categories = [("bags", "backpack"), ("bags", "purse"), ("electronics", "phone")];
    let colors = ["#ff0000", "#FFFFFF", "#00ff00", "", "#0000ff"];
    let mut items = Vec::new();
    for idx in 0..10 {
        items.push(report(
            &format!("F{idx}"),
            ItemType::Finding,
            base_date() + Duration::days(idx * 3),
            categories[idx as usize % categories.len()],
            None,
            vec![
                Attribute::double("weight", 0.5 + idx as f64),
                Attribute::color("shade", colors[idx as usize % colors.len()]),
                Attribute::money("price", "CHF", 10.0 * idx as f64),
                Attribute::boolean("charger", idx % 2 == 0),
                Attribute::new("brand", AttributeValue::Enum(Some("acme".into()))),
            ],
        ));
    }
    for idx in 0..4 {
        items.push(report(
            &format!("LM{idx}"),
            ItemType::Loss,
            base_date() + Duration::days(idx * 3 + 1),
            categories[idx as usize % categories.len()],
            Some(&format!("F{idx}")),
            vec![Attribute::double("weight", 1.0 + idx as f64)],
        ));
    }
    items.push(report(
        "LM-dangling",
        ItemType::Loss,
        base_date(),
        categories[0],
        Some("F-missing"),
        Vec::new(),
    ));
    for idx in 0..10 {
        items.push(report(
            &format!("LU{idx}"),
            ItemType::Loss,
            base_date() + Duration::days(idx * 2),
            categories[(idx as usize + 1) % categories.len()],
            None,
            vec![Attribute::integer("size", idx)],
        ));
    }
    items.push(report(
        "LU-recent",
        ItemType::Loss,
        Utc::now() - Duration::days(2),
        categories[2],
        None,
        Vec::new(),
    ));

    Corpus {
        metadata: vec![
            meta(Some("brand"), AttributeKind::Enum),
            meta(Some("weight"), AttributeKind::Double),
            meta(None, AttributeKind::Money),
            meta(Some("size"), AttributeKind::Integer),
            meta(Some("charger"), AttributeKind::Boolean),
            meta(Some("never-used"), AttributeKind::Double),
        ],
        items,
        category_hierarchy: [
            ("bags", vec!["backpack", "purse"]),
            ("electronics", vec!["phone"]),
        ]
        .into_iter()
        .collect::<CategoryHierarchy>(),
    }
}

fn config() -> MatchConfig {
    MatchConfig {
        fan_out: FanOutConfig {
            workers: 3,
            batch_size: 2,
        },
        ..MatchConfig::default()
    }
}

#[test]
fn every_vector_in_a_run_has_the_same_length() {
    let corpus = build_corpus();
    let dataset = LearningDataset::generate(&corpus, &config(), &CancellationToken::new()).unwrap();
    let assembler = dataset
        .vector_assembler()
        .with_skip([FeatureProperty::LossMoney]);
    let vectors = assembler
        .assemble_all(dataset.training.iter().chain(dataset.test.iter()))
        .unwrap();
    assert_eq!(vectors.len(), dataset.training.len() + dataset.test.len());
    assert!(vectors.iter().all(|v| v.len() == assembler.vector_len()));
    assert_eq!(assembler.column_names().len(), assembler.vector_len());
}

#[test]
fn active_metadata_follows_corpus_order_and_usage() {
    let corpus = build_corpus();
    let dataset = LearningDataset::generate(&corpus, &config(), &CancellationToken::new()).unwrap();
    let ids: Vec<&str> = dataset
        .active_metadata
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(ids, vec!["weight", "size", "charger"]);
}

#[test]
fn positive_pairs_come_only_from_resolvable_matches() {
    let corpus = build_corpus();
    let mapper = FeatureMapper::from(corpus.mapper_settings());
    let pairs = PositivePairGenerator::new(mapper)
        .with_fan_out(config().fan_out)
        .generate(&corpus.items)
        .unwrap();
    assert_eq!(pairs.len(), 4);
    assert!(pairs.iter().all(|pair| pair.percent_match == 1.0));
}

#[test]
fn negative_pairs_skip_matched_and_recent_losses() {
    let corpus = build_corpus();
    let mapper = FeatureMapper::from(corpus.mapper_settings());
    let pairs = NegativePairGenerator::new(mapper)
        .with_fan_out(config().fan_out)
        .generate(&corpus.items)
        .unwrap();
    assert_eq!(pairs.len(), 10);
    assert!(pairs.iter().all(|pair| pair.percent_match == -1.0));
    // Unmatched losses only carry the "size" attribute.
    assert!(
        pairs
            .iter()
            .all(|pair| pair.loss_attributes.keys().all(|id| id == "size"))
    );
}

#[test]
fn statistics_scan_is_deterministic() {
    let corpus = build_corpus();
    assert_eq!(corpus.mapper_settings(), corpus.mapper_settings());
}

#[test]
fn scalar_features_stay_in_unit_range() {
    let corpus = build_corpus();
    let dataset = LearningDataset::generate(&corpus, &config(), &CancellationToken::new()).unwrap();
    for record in dataset.training.iter().chain(dataset.test.iter()) {
        for value in [
            record.loss_date_of_incident,
            record.finding_date_of_incident,
            record.loss_category,
            record.finding_category,
            record.loss_money,
            record.finding_money,
        ] {
            assert!((-1.0..=1.0).contains(&value), "out of range: {value}");
        }
        for values in record
            .loss_attributes
            .values()
            .chain(record.finding_attributes.values())
        {
            assert!(values.iter().all(|v| (-1.0..=1.0).contains(v)));
        }
    }
}

#[test]
fn split_is_balanced_and_disjoint_in_size() {
    let corpus = build_corpus();
    let dataset = LearningDataset::generate(&corpus, &config(), &CancellationToken::new()).unwrap();
    let training = label_balance(&dataset.training).unwrap();
    let test = label_balance(&dataset.test).unwrap();
    assert_eq!((training.positives, training.negatives), (2, 2));
    assert_eq!((test.positives, test.negatives), (2, 2));
}

#[test]
fn csv_export_matches_assembler_layout() {
    let dir = tempdir().unwrap();
    let corpus = build_corpus();
    let dataset = LearningDataset::generate(&corpus, &config(), &CancellationToken::new()).unwrap();
    let exporter = CsvExporter::new(dataset.vector_assembler());
    let path = dir.path().join("training.csv");
    let written = exporter.write_csv(&path, &dataset.training).unwrap();
    assert_eq!(written, dataset.training.len());

    let text = fs::read_to_string(&path).unwrap();
    let mut lines = text.lines();
    let header = lines.next().unwrap();
    assert!(header.starts_with("PercentMatch,LossDateOfIncident,FindingDateOfIncident"));
    assert!(header.ends_with("losscharger,findingcharger"));
    let width = header.split(',').count();
    assert_eq!(width, exporter.assembler().vector_len());
    assert!(lines.all(|line| line.split(',').count() == width));
}

#[test]
fn cli_writes_csv_and_json_outputs() {
    let dir = tempdir().unwrap();
    let corpus_path = dir.path().join("corpus.json");
    fs::write(&corpus_path, serde_json::to_string(&build_corpus()).unwrap()).unwrap();
    let out = dir.path().join("out");

    run_neuralmatch(
        [
            corpus_path.to_string_lossy().into_owned(),
            "--output-dir".to_string(),
            out.to_string_lossy().into_owned(),
            "--workers".to_string(),
            "2".to_string(),
            "--export-json".to_string(),
            "--skip".to_string(),
            "LossColors".to_string(),
        ]
        .into_iter(),
    )
    .unwrap();

    for name in ["training.csv", "test.csv", "training.json", "test.json"] {
        assert!(out.join(name).exists(), "missing {name}");
    }
    let header = fs::read_to_string(out.join("training.csv")).unwrap();
    assert!(!header.lines().next().unwrap().contains("LossColorL"));

    // Reusing persisted pairs yields the same CSV.
    let reused = dir.path().join("reused");
    run_neuralmatch(
        [
            corpus_path.to_string_lossy().into_owned(),
            "--training".to_string(),
            out.join("training.json").to_string_lossy().into_owned(),
            "--test".to_string(),
            out.join("test.json").to_string_lossy().into_owned(),
            "--output-dir".to_string(),
            reused.to_string_lossy().into_owned(),
            "--skip".to_string(),
            "LossColors".to_string(),
        ]
        .into_iter(),
    )
    .unwrap();
    assert_eq!(
        fs::read_to_string(out.join("test.csv")).unwrap(),
        fs::read_to_string(reused.join("test.csv")).unwrap()
    );
}
