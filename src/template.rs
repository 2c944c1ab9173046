use crate::error::EvalError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Matches `{{placeholder}}` tokens, tolerating inner whitespace
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").unwrap());

/// A named, versioned prompt template with `{{placeholder}}` substitution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    /// Template name used for lookup
    pub name: String,
    /// Version number, highest wins on registration
    #[serde(default = "default_version")]
    pub version: u32,
    /// Template text with `{{placeholder}}` tokens
    pub text: String,
    /// Arbitrary metadata, e.g. a structured-output descriptor
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

fn default_version() -> u32 {
    1
}

impl PromptTemplate {
    /// Render the template against the supplied values.
    ///
    /// Every placeholder referenced by the template must be present in
    /// `values`; extra entries are ignored. Rendering has no side effects.
    pub fn format(&self, values: &HashMap<String, String>) -> Result<String, EvalError> {
        for placeholder in self.placeholders() {
            if !values.contains_key(&placeholder) {
                return Err(EvalError::MissingPlaceholder {
                    template: self.name.clone(),
                    placeholder,
                });
            }
        }

        let rendered = PLACEHOLDER.replace_all(&self.text, |caps: &regex::Captures| {
            values[&caps[1]].clone()
        });
        Ok(rendered.into_owned())
    }

    /// Placeholder names referenced by the template text
    pub fn placeholders(&self) -> Vec<String> {
        PLACEHOLDER
            .captures_iter(&self.text)
            .map(|caps| caps[1].to_string())
            .collect()
    }
}

/// In-memory template store, keyed by name
#[derive(Debug, Default)]
pub struct TemplateStore {
    templates: HashMap<String, PromptTemplate>,
}

impl TemplateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store preloaded with the movie rating chain templates
    pub fn builtin() -> Self {
        let mut store = Self::new();
        store.register(PromptTemplate {
            name: "movie identifier".to_string(),
            version: 1,
            text: "Identify the movie from the {{decade}} that best matches this \
                   description: {{movie_description}}. Respond with a JSON object \
                   containing the keys \"movie_info\" (a one sentence summary) and \
                   \"movie_title\" (the exact title)."
                .to_string(),
            metadata: HashMap::from([(
                "response_format".to_string(),
                json!({"type": "json_object"}),
            )]),
        });
        store.register(PromptTemplate {
            name: "rating classifier".to_string(),
            version: 1,
            text: "Classify the age rating of the movie \"{{movie_title}}\". \
                   Respond with exactly one of: G, PG, or R."
                .to_string(),
            metadata: HashMap::new(),
        });
        store
    }

    /// Register a template, keeping the highest version for each name
    pub fn register(&mut self, template: PromptTemplate) {
        match self.templates.get(&template.name) {
            Some(existing) if existing.version > template.version => {}
            _ => {
                self.templates.insert(template.name.clone(), template);
            }
        }
    }

    /// Look up a template by name
    pub fn get_prompt(&self, name: &str) -> Result<&PromptTemplate, EvalError> {
        self.templates
            .get(name)
            .ok_or_else(|| EvalError::TemplateNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_format_substitutes_all_placeholders() {
        let store = TemplateStore::builtin();
        let template = store.get_prompt("movie identifier").unwrap();

        let rendered = template
            .format(&values(&[
                ("movie_description", "A clownfish searches for his missing son"),
                ("decade", "2000s"),
            ]))
            .unwrap();

        assert!(rendered.contains("A clownfish searches for his missing son"));
        assert!(rendered.contains("2000s"));
        assert!(!rendered.contains("{{"));
    }

    #[test]
    fn test_format_missing_placeholder_fails() {
        let store = TemplateStore::builtin();
        let template = store.get_prompt("movie identifier").unwrap();

        let result = template.format(&values(&[("decade", "2000s")]));
        match result {
            Err(EvalError::MissingPlaceholder {
                template,
                placeholder,
            }) => {
                assert_eq!(template, "movie identifier");
                assert_eq!(placeholder, "movie_description");
            }
            other => panic!("Expected MissingPlaceholder, got {:?}", other),
        }
    }

    #[test]
    fn test_format_ignores_extra_values() {
        let store = TemplateStore::builtin();
        let template = store.get_prompt("rating classifier").unwrap();

        let rendered = template
            .format(&values(&[
                ("movie_title", "Finding Nemo"),
                ("unused", "ignored"),
            ]))
            .unwrap();
        assert!(rendered.contains("Finding Nemo"));
    }

    #[test]
    fn test_format_repeated_placeholder() {
        let template = PromptTemplate {
            name: "echo".to_string(),
            version: 1,
            text: "{{word}} and {{word}} again".to_string(),
            metadata: HashMap::new(),
        };
        let rendered = template.format(&values(&[("word", "hello")])).unwrap();
        assert_eq!(rendered, "hello and hello again");
    }

    #[test]
    fn test_get_prompt_unknown_name() {
        let store = TemplateStore::builtin();
        let result = store.get_prompt("nonexistent");
        assert!(matches!(result, Err(EvalError::TemplateNotFound(_))));
    }

    #[test]
    fn test_register_keeps_highest_version() {
        let mut store = TemplateStore::new();
        store.register(PromptTemplate {
            name: "greeting".to_string(),
            version: 2,
            text: "Hello {{name}}".to_string(),
            metadata: HashMap::new(),
        });
        store.register(PromptTemplate {
            name: "greeting".to_string(),
            version: 1,
            text: "Hi {{name}}".to_string(),
            metadata: HashMap::new(),
        });

        let template = store.get_prompt("greeting").unwrap();
        assert_eq!(template.version, 2);
        assert!(template.text.starts_with("Hello"));
    }

    #[test]
    fn test_register_replaces_with_newer_version() {
        let mut store = TemplateStore::builtin();
        store.register(PromptTemplate {
            name: "rating classifier".to_string(),
            version: 2,
            text: "Rate \"{{movie_title}}\" as G, PG or R.".to_string(),
            metadata: HashMap::new(),
        });

        let template = store.get_prompt("rating classifier").unwrap();
        assert_eq!(template.version, 2);
    }

    #[test]
    fn test_builtin_identifier_carries_response_format() {
        let store = TemplateStore::builtin();
        let template = store.get_prompt("movie identifier").unwrap();
        assert_eq!(
            template.metadata.get("response_format"),
            Some(&json!({"type": "json_object"}))
        );
    }
}
