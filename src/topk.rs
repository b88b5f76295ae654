use crate::labels::LabelVocabulary;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// One ranked prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub label: String,
    pub confidence: f32,
}

/// A class index with its score, ordered so that "greater" means ranked
/// higher: larger confidence first, then lower index.
#[derive(Debug, Clone, Copy)]
struct Ranked {
    index: usize,
    confidence: f32,
}

impl Ranked {
    // NaN sorts below every real score.
    fn key(&self) -> f32 {
        if self.confidence.is_nan() {
            f32::NEG_INFINITY
        } else {
            self.confidence
        }
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key()
            .total_cmp(&other.key())
            .then_with(|| other.index.cmp(&self.index))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

/// Returns the `k` highest-scoring classes in descending order of confidence.
///
/// Ties go to the lower class index. `k` is clamped to the number of scores,
/// and indices beyond the vocabulary are labelled [`crate::UNKNOWN_LABEL`].
pub fn top_k(
    probabilities: &[f32],
    vocabulary: &LabelVocabulary,
    k: usize,
) -> Vec<RecognitionResult> {
    let k = k.min(probabilities.len());
    if k == 0 {
        return Vec::new();
    }

    // Min-heap holding the best k seen so far; its root is the weakest.
    let mut heap: BinaryHeap<Reverse<Ranked>> = BinaryHeap::with_capacity(k);
    for (index, &confidence) in probabilities.iter().enumerate() {
        let candidate = Ranked { index, confidence };
        if heap.len() < k {
            heap.push(Reverse(candidate));
        } else if let Some(mut weakest) = heap.peek_mut() {
            if candidate > weakest.0 {
                *weakest = Reverse(candidate);
            }
        }
    }

    heap.into_sorted_vec()
        .into_iter()
        .map(|Reverse(ranked)| RecognitionResult {
            label: vocabulary.label_or_unknown(ranked.index).to_string(),
            confidence: ranked.confidence,
        })
        .collect()
}
