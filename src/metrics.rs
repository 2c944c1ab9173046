use crate::error::EvalError;
use serde::{Deserialize, Serialize};

/// Score produced by one metric for one pipeline output. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Metric name
    pub name: String,
    /// Score value between 0.0 and 1.0
    pub value: f64,
    /// Human-readable explanation of the comparison
    pub reason: String,
}

/// Compares a pipeline output against the expected reference value.
///
/// Scoring is pure: no side effects and no failure modes.
pub trait ScoringMetric: Send + Sync {
    fn name(&self) -> &str;
    fn score(&self, output: &str, reference: &str) -> ScoreResult;
}

/// Case- and whitespace-insensitive rating comparison
#[derive(Debug, Default)]
pub struct RatingMatch;

impl ScoringMetric for RatingMatch {
    fn name(&self) -> &str {
        "rating_match"
    }

    fn score(&self, output: &str, reference: &str) -> ScoreResult {
        let matched = output.trim().to_uppercase() == reference.trim().to_uppercase();

        ScoreResult {
            name: self.name().to_string(),
            value: if matched { 1.0 } else { 0.0 },
            reason: format!(
                "Output '{}' {} expected '{}'",
                output,
                if matched { "matches" } else { "does not match" },
                reference
            ),
        }
    }
}

/// Exact string equality, no normalization
#[derive(Debug, Default)]
pub struct Equals;

impl ScoringMetric for Equals {
    fn name(&self) -> &str {
        "equals"
    }

    fn score(&self, output: &str, reference: &str) -> ScoreResult {
        let matched = output == reference;

        ScoreResult {
            name: self.name().to_string(),
            value: if matched { 1.0 } else { 0.0 },
            reason: format!(
                "Output '{}' {} expected '{}'",
                output,
                if matched { "equals" } else { "does not equal" },
                reference
            ),
        }
    }
}

/// Resolve run-file metric names to metric instances
pub fn metrics_from_names(names: &[String]) -> Result<Vec<Box<dyn ScoringMetric>>, EvalError> {
    names
        .iter()
        .map(|name| -> Result<Box<dyn ScoringMetric>, EvalError> {
            match name.as_str() {
                "rating_match" => Ok(Box::new(RatingMatch)),
                "equals" => Ok(Box::new(Equals)),
                other => Err(EvalError::InvalidRequest(format!(
                    "Unknown metric '{other}'"
                ))),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_match_exact() {
        let result = RatingMatch.score("G", "G");
        assert_eq!(result.value, 1.0);
        assert_eq!(result.name, "rating_match");
        assert!(result.reason.contains("matches"));
    }

    #[test]
    fn test_rating_match_ignores_case_and_whitespace() {
        assert_eq!(RatingMatch.score("pg ", "PG").value, 1.0);
        assert_eq!(RatingMatch.score(" PG", "pg").value, 1.0);
    }

    #[test]
    fn test_rating_match_strict_otherwise() {
        let result = RatingMatch.score("PG-13", "PG");
        assert_eq!(result.value, 0.0);
        assert!(result.reason.contains("does not match"));
    }

    #[test]
    fn test_equals_is_case_sensitive() {
        assert_eq!(Equals.score("G", "G").value, 1.0);
        assert_eq!(Equals.score("g", "G").value, 0.0);
        assert_eq!(Equals.score("G ", "G").value, 0.0);
    }

    #[test]
    fn test_metrics_from_names_resolves_known_metrics() {
        let metrics =
            metrics_from_names(&["rating_match".to_string(), "equals".to_string()]).unwrap();
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].name(), "rating_match");
        assert_eq!(metrics[1].name(), "equals");
    }

    #[test]
    fn test_metrics_from_names_unknown_metric() {
        let result = metrics_from_names(&["bleu".to_string()]);
        match result {
            Err(EvalError::InvalidRequest(message)) => assert!(message.contains("bleu")),
            other => panic!("Expected InvalidRequest, got {:?}", other.map(|m| m.len())),
        }
    }
}
