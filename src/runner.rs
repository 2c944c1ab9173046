use crate::dataset::Dataset;
use crate::metrics::ScoringMetric;
use crate::models::{EvaluationReport, ItemOutcome, ItemRow, Statistics};
use crate::pipeline::RatingPipeline;

/// Runs the rating pipeline over a dataset and scores every item
pub struct EvaluationRunner {
    pipeline: RatingPipeline,
    metrics: Vec<Box<dyn ScoringMetric>>,
    experiment_name: String,
    description: String,
}

impl EvaluationRunner {
    pub fn new(
        pipeline: RatingPipeline,
        metrics: Vec<Box<dyn ScoringMetric>>,
        experiment_name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            pipeline,
            metrics,
            experiment_name: experiment_name.into(),
            description: description.into(),
        }
    }

    /// Run the evaluation over every dataset item, sequentially.
    ///
    /// A failure inside one item's pipeline run is recorded as a failed row
    /// and the run proceeds; it never aborts the whole evaluation. Every
    /// successful item gets exactly one score per configured metric.
    pub async fn run(&self, dataset: &Dataset) -> EvaluationReport {
        let total = dataset.len();
        let mut rows = Vec::with_capacity(total);

        for (index, item) in dataset.items().iter().enumerate() {
            log::info!(
                "Processing item {}/{} of dataset '{}'",
                index + 1,
                total,
                dataset.name
            );

            let outcome = match self.pipeline.classify(item).await {
                Ok(result) => {
                    let scores = self
                        .metrics
                        .iter()
                        .map(|metric| metric.score(&result.output, &item.expected_output))
                        .collect();
                    ItemOutcome::Scored {
                        output: result.output,
                        scores,
                    }
                }
                Err(err) => {
                    log::warn!("Item {}/{} failed: {err}", index + 1, total);
                    ItemOutcome::Failed {
                        error: err.to_string(),
                    }
                }
            };

            rows.push(ItemRow {
                item: item.clone(),
                outcome,
            });
        }

        let metric_names: Vec<String> = self
            .metrics
            .iter()
            .map(|metric| metric.name().to_string())
            .collect();
        let statistics = Statistics::calculate(&rows, &metric_names);

        EvaluationReport {
            experiment_name: self.experiment_name.clone(),
            description: self.description.clone(),
            statistics,
            rows,
        }
    }
}
