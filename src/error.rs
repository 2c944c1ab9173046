use thiserror::Error;

/// Errors produced by the rating pipeline and the services it calls.
#[derive(Debug, Error)]
pub enum EvalError {
    /// No template registered under the requested name
    #[error("Template '{0}' not found")]
    TemplateNotFound(String),
    /// A placeholder referenced by a template was not supplied
    #[error("Template '{template}' references placeholder '{placeholder}' which was not supplied")]
    MissingPlaceholder {
        template: String,
        placeholder: String,
    },
    /// The model did not honor the structured-output contract
    #[error("Malformed model response: {message}. Raw response: {raw_response}")]
    MalformedResponse {
        message: String,
        raw_response: String,
    },
    /// Network or API failure while invoking the model
    #[error("Transport error: {0}")]
    Transport(String),
    /// Invalid request parameters or configuration
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for EvalError {
    fn from(err: reqwest::Error) -> Self {
        EvalError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for EvalError {
    fn from(err: serde_json::Error) -> Self {
        EvalError::MalformedResponse {
            message: format!("{} at line {} column {}", err, err.line(), err.column()),
            raw_response: String::new(),
        }
    }
}
