use crate::dataset::DatasetItem;
use crate::metrics::ScoreResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Response from the language model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    /// The generated text response
    pub content: String,
    /// Metadata about the response (tokens used, etc.)
    pub metadata: HashMap<String, serde_json::Value>,
}

/// The pipeline's sole return value to the evaluation layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Final rating, trimmed of surrounding whitespace
    pub output: String,
}

/// Outcome of running one dataset item through the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    /// Pipeline completed and every configured metric produced a score
    Scored {
        output: String,
        scores: Vec<ScoreResult>,
    },
    /// Pipeline failed; no partial scores are kept
    Failed { error: String },
}

/// One row of the evaluation report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRow {
    /// The dataset item that was processed
    pub item: DatasetItem,
    /// What happened to it
    pub outcome: ItemOutcome,
}

impl ItemRow {
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, ItemOutcome::Failed { .. })
    }
}

/// Statistics calculated across scored rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statistics {
    /// Mean score for each metric
    pub mean: HashMap<String, f64>,
    /// Median score for each metric
    pub median: HashMap<String, f64>,
    /// Mode score for each metric (most frequent score)
    pub mode: HashMap<String, f64>,
}

impl Statistics {
    /// Calculate statistics for each metric over the scored rows
    pub fn calculate(rows: &[ItemRow], metric_names: &[String]) -> Self {
        let mut mean = HashMap::new();
        let mut median = HashMap::new();
        let mut mode = HashMap::new();

        for name in metric_names {
            let scores = Self::collect_metric_scores(rows, name);

            if scores.is_empty() {
                mean.insert(name.clone(), 0.0);
                median.insert(name.clone(), 0.0);
                mode.insert(name.clone(), 0.0);
                continue;
            }

            mean.insert(name.clone(), Self::calculate_mean(&scores));
            median.insert(name.clone(), Self::calculate_median(&scores));
            mode.insert(name.clone(), Self::calculate_mode(&scores));
        }

        Statistics { mean, median, mode }
    }

    /// Collect scores for a specific metric from scored rows
    fn collect_metric_scores(rows: &[ItemRow], metric_name: &str) -> Vec<f64> {
        rows.iter()
            .filter_map(|row| match &row.outcome {
                ItemOutcome::Scored { scores, .. } => scores
                    .iter()
                    .find(|score| score.name == metric_name)
                    .map(|score| score.value),
                ItemOutcome::Failed { .. } => None,
            })
            .collect()
    }

    fn calculate_mean(scores: &[f64]) -> f64 {
        let sum: f64 = scores.iter().sum();
        sum / scores.len() as f64
    }

    fn calculate_median(scores: &[f64]) -> f64 {
        let mut sorted_scores = scores.to_vec();
        sorted_scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let mid = sorted_scores.len() / 2;
        if sorted_scores.len() % 2 == 0 {
            (sorted_scores[mid - 1] + sorted_scores[mid]) / 2.0
        } else {
            sorted_scores[mid]
        }
    }

    /// Most frequent value, rounded to 1 decimal place
    fn calculate_mode(scores: &[f64]) -> f64 {
        let mut frequency = HashMap::new();

        for &score in scores {
            let rounded = ((score * 10.0).round() as i32) as f64 / 10.0;
            *frequency.entry(rounded.to_bits()).or_insert(0) += 1;
        }

        match frequency.iter().max_by_key(|&(_, count)| count) {
            Some((&bits, _)) => f64::from_bits(bits),
            None => 0.0,
        }
    }
}

/// Final report for one evaluation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Experiment name from the run file
    pub experiment_name: String,
    /// Experiment description from the run file
    pub description: String,
    /// Aggregated per-metric statistics
    pub statistics: Statistics,
    /// Individual item rows
    pub rows: Vec<ItemRow>,
}

impl EvaluationReport {
    pub fn scored_count(&self) -> usize {
        self.rows.len() - self.failed_count()
    }

    pub fn failed_count(&self) -> usize {
        self.rows.iter().filter(|row| row.is_failed()).count()
    }
}
