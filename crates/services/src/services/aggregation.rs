use std::collections::BTreeMap;

use db::models::review::{Feeling, Review};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Consensus view of every review on a proposal, recomputed on each read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReviewAggregate {
    /// Mean of the non-null notes; `None` when nobody scored.
    pub average_note: Option<f64>,
    /// Only feelings that occur at least once are present.
    pub feeling_counts: BTreeMap<Feeling, i64>,
    pub reviewer_count: i64,
}

impl ReviewAggregate {
    pub fn empty() -> Self {
        Self {
            average_note: None,
            feeling_counts: BTreeMap::new(),
            reviewer_count: 0,
        }
    }

    pub fn from_reviews(reviews: &[Review]) -> Self {
        let mut feeling_counts = BTreeMap::new();
        let mut note_sum = 0i64;
        let mut note_count = 0i64;

        for review in reviews {
            *feeling_counts.entry(review.feeling).or_insert(0) += 1;
            if let Some(note) = review.note {
                note_sum += note;
                note_count += 1;
            }
        }

        let average_note = (note_count > 0).then(|| note_sum as f64 / note_count as f64);

        Self {
            average_note,
            feeling_counts,
            reviewer_count: reviews.len() as i64,
        }
    }

    pub fn count_for(&self, feeling: Feeling) -> i64 {
        self.feeling_counts.get(&feeling).copied().unwrap_or(0)
    }
}
