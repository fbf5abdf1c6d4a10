//! End-of-interview composite score
//!
//! Channel values:
//! - non-verbal: mean of measured frame confidences
//! - vocal: mean of measured chunk confidences
//! - keyword: score of the most recent keyword result (each result already
//!   covers the whole transcript so far)
//!
//! An empty channel contributes 0.0. The total is the configured weighted sum
//! of the unrounded channel values; every reported figure is then rounded to
//! one decimal.

use icoach_common::config::ScoringWeights;
use icoach_common::models::{round1, FinalScore, KeywordResult};

/// Per-channel readings accumulated by one session, append-only
#[derive(Debug, Clone, Default)]
pub struct ChannelBuffers {
    pub non_verbal: Vec<f64>,
    pub vocal: Vec<f64>,
    pub keyword: Vec<KeywordResult>,
}

impl ChannelBuffers {
    pub fn record_non_verbal(&mut self, confidence: f64) {
        self.non_verbal.push(confidence);
    }

    pub fn record_vocal(&mut self, confidence: f64) {
        self.vocal.push(confidence);
    }

    pub fn record_keywords(&mut self, result: KeywordResult) {
        self.keyword.push(result);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScoreAggregator {
    weights: ScoringWeights,
}

impl ScoreAggregator {
    /// Weights are expected to be validated at config load
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> ScoringWeights {
        self.weights
    }

    pub fn aggregate(&self, channels: &ChannelBuffers) -> FinalScore {
        let non_verbal = mean(&channels.non_verbal);
        let vocal = mean(&channels.vocal);
        let keyword = channels.keyword.last().map(|r| r.score).unwrap_or(0.0);

        let total = non_verbal * self.weights.non_verbal
            + vocal * self.weights.vocal
            + keyword * self.weights.keyword;

        FinalScore {
            non_verbal_score: round1(non_verbal),
            vocal_score: round1(vocal),
            keyword_score: round1(keyword),
            final_score: round1(total),
        }
    }
}

impl Default for ScoreAggregator {
    fn default() -> Self {
        Self::new(ScoringWeights::default())
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
