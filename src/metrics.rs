use crate::data::{FeatureRecord, PairLabel};

/// Label distribution of a set of feature records.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelBalance {
    /// Number of records.
    pub total: usize,
    /// Records labelled as matches.
    pub positives: usize,
    /// Records labelled as non-matches.
    pub negatives: usize,
    /// Records with a zero label.
    pub unlabeled: usize,
    /// Share of positives among labeled records (0 when nothing is labeled).
    pub positive_share: f64,
    /// `positives / negatives`; infinite when there are no negatives.
    pub ratio: f64,
}

/// Compute label counts for `records`. Returns `None` for an empty set.
pub fn label_balance<'a, I>(records: I) -> Option<LabelBalance>
where
    I: IntoIterator<Item = &'a FeatureRecord>,
{
    let mut total = 0;
    let mut positives = 0;
    let mut negatives = 0;
    let mut unlabeled = 0;
    for record in records {
        total += 1;
        match record.label() {
            PairLabel::Positive => positives += 1,
            PairLabel::Negative => negatives += 1,
            PairLabel::Unlabeled => unlabeled += 1,
        }
    }
    if total == 0 {
        return None;
    }
    let labeled = positives + negatives;
    let positive_share = if labeled == 0 {
        0.0
    } else {
        positives as f64 / labeled as f64
    };
    let ratio = if negatives == 0 {
        f64::INFINITY
    } else {
        positives as f64 / negatives as f64
    };
    Some(LabelBalance {
        total,
        positives,
        negatives,
        unlabeled,
        positive_share,
        ratio,
    })
}
