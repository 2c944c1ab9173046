use crate::dataset::{DatasetItem, InsertMode};
use crate::template::PromptTemplate;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which model transport the run uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Backend {
    /// Official OpenAI client
    #[serde(rename = "openai")]
    OpenAi,
    /// Any OpenAI-compatible chat completions endpoint over plain HTTP
    #[serde(rename = "compatible")]
    Compatible,
}

/// Configuration for a single evaluation run
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Experiment name attached to the report
    pub experiment_name: String,
    /// Free-form description of the experiment
    #[serde(default)]
    pub description: String,
    /// Model transport selection
    #[serde(default = "default_backend")]
    pub backend: Backend,
    /// API endpoint base, e.g. "https://api.openai.com/v1"
    pub api_endpoint: String,
    /// Environment variable name containing the API key
    pub env_var_api_key: String,
    /// Model used for both chain steps
    pub model: String,
    /// Temperature for response generation (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Maximum tokens for response generation
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Rate limit for API requests per second
    #[serde(default = "default_rate_limit")]
    pub rate_limit_rps: f64,
    /// Name of the dataset in the dataset store
    #[serde(default = "default_dataset_name")]
    pub dataset_name: String,
    /// Behavior when inserting dataset items on repeated runs
    #[serde(default)]
    pub insert_mode: InsertMode,
    /// Metrics applied to every pipeline output
    #[serde(default = "default_metrics")]
    pub metrics: Vec<String>,
    /// Optional local path to store the report as JSON
    #[serde(default)]
    pub storage_path: Option<String>,
    /// Dataset items evaluated by the run
    pub items: Vec<DatasetItem>,
    /// Template overrides, merged over the built-ins
    #[serde(default)]
    pub templates: Vec<PromptTemplate>,
}

fn default_backend() -> Backend {
    Backend::OpenAi
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_rate_limit() -> f64 {
    10.0
}

fn default_dataset_name() -> String {
    "movies".to_string()
}

fn default_metrics() -> Vec<String> {
    vec!["rating_match".to_string()]
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_parsing() {
        let toml_content = r#"
experiment_name = "movie eval"
description = "Evaluating movie rating chain"
backend = "compatible"
api_endpoint = "https://api.openai.com/v1"
env_var_api_key = "OPENAI_API_KEY"
model = "gpt-3.5-turbo"
temperature = 0.5
max_tokens = 200
rate_limit_rps = 5.0
dataset_name = "movies"
insert_mode = "skip_existing"
metrics = ["rating_match", "equals"]
storage_path = "/tmp/report.json"

[[items]]
movie_description = "A clownfish searches for his missing son"
decade = "2000s"
expected_output = "G"

[[items]]
movie_description = "People trapped in deadly puzzle games"
decade = "2000s"
expected_output = "R"

[[templates]]
name = "rating classifier"
version = 2
text = "Rate \"{{movie_title}}\" as G, PG or R."
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", toml_content).unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();
        assert_eq!(config.experiment_name, "movie eval");
        assert_eq!(config.backend, Backend::Compatible);
        assert_eq!(config.model, "gpt-3.5-turbo");
        assert_eq!(config.temperature, 0.5);
        assert_eq!(config.max_tokens, 200);
        assert_eq!(config.rate_limit_rps, 5.0);
        assert_eq!(config.insert_mode, InsertMode::SkipExisting);
        assert_eq!(config.metrics, vec!["rating_match", "equals"]);
        assert_eq!(config.items.len(), 2);
        assert_eq!(config.items[0].expected_output, "G");
        assert_eq!(config.templates.len(), 1);
        assert_eq!(config.templates[0].version, 2);
    }

    #[test]
    fn test_config_defaults() {
        let toml_content = r#"
experiment_name = "movie eval"
api_endpoint = "https://api.openai.com/v1"
env_var_api_key = "OPENAI_API_KEY"
model = "gpt-3.5-turbo"

[[items]]
movie_description = "A boy wizard attends a magical school"
decade = "2000s"
expected_output = "PG"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", toml_content).unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();
        assert_eq!(config.backend, Backend::OpenAi);
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.max_tokens, 1000);
        assert_eq!(config.rate_limit_rps, 10.0);
        assert_eq!(config.dataset_name, "movies");
        assert_eq!(config.insert_mode, InsertMode::Append);
        assert_eq!(config.metrics, vec!["rating_match"]);
        assert!(config.storage_path.is_none());
        assert!(config.templates.is_empty());
    }

    #[test]
    fn test_config_missing_experiment_name() {
        let toml_content = r#"
api_endpoint = "https://api.openai.com/v1"
env_var_api_key = "OPENAI_API_KEY"
model = "gpt-3.5-turbo"
items = []
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", toml_content).unwrap();

        assert!(Config::from_file(temp_file.path()).is_err());
    }
}
