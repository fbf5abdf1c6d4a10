//! Answer similarity for offline reports

use super::{Probe, ProviderError, SemanticScorer};
use std::collections::HashMap;

/// Cosine similarity over lowercase word counts, scaled to 0-100
pub struct BagOfWordsSimilarity;

fn word_counts(text: &str) -> HashMap<String, f64> {
    let mut counts = HashMap::new();
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        *counts.entry(word.to_lowercase()).or_insert(0.0) += 1.0;
    }
    counts
}

impl Probe for BagOfWordsSimilarity {
    fn name(&self) -> &'static str {
        "bag_of_words"
    }
}

impl SemanticScorer for BagOfWordsSimilarity {
    fn similarity(&self, answer: &str, ideal_answer: &str) -> Result<f64, ProviderError> {
        let a = word_counts(answer);
        let b = word_counts(ideal_answer);
        if a.is_empty() || b.is_empty() {
            return Ok(0.0);
        }

        let dot: f64 = a
            .iter()
            .filter_map(|(word, count)| b.get(word).map(|other| count * other))
            .sum();
        let norm = |counts: &HashMap<String, f64>| counts.values().map(|c| c * c).sum::<f64>().sqrt();

        Ok((dot / (norm(&a) * norm(&b)) * 100.0).clamp(0.0, 100.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_text_scores_full() {
        let score = BagOfWordsSimilarity
            .similarity("Threads share memory", "threads SHARE memory.")
            .unwrap();
        assert!((score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_disjoint_text_scores_zero() {
        let score = BagOfWordsSimilarity.similarity("apples", "transformers").unwrap();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_partial_overlap() {
        // one shared word out of two on each side: cos = 1/2
        let score = BagOfWordsSimilarity.similarity("hash map", "hash table").unwrap();
        assert!((score - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_answer_scores_zero() {
        assert_eq!(BagOfWordsSimilarity.similarity("", "anything").unwrap(), 0.0);
    }
}
