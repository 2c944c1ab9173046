use crate::config::Config;
use crate::error::EvalError;
use crate::models::ModelResponse;
use crate::trace::{TraceContext, Tracer};
use async_openai::{Client, config::OpenAIConfig, types::CreateChatCompletionRequestArgs};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

/// A language model transport.
///
/// `structured = true` asks the model for a JSON object body; plain calls
/// return an opaque string. Every call emits one span to the trace sink,
/// correlated by `ctx` when the caller supplies one. There is no retry
/// policy: transport failures surface raw.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn invoke(
        &self,
        prompt: &str,
        structured: bool,
        ctx: Option<&TraceContext>,
    ) -> Result<ModelResponse, EvalError>;
}

/// Enforces a minimum interval between requests
#[derive(Debug)]
pub struct RateLimiter {
    rps: f64,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(rps: f64) -> Self {
        Self {
            rps,
            last_request: Mutex::new(None),
        }
    }

    /// Sleep until the next request is allowed
    pub async fn acquire(&self) {
        if self.rps <= 0.0 {
            return;
        }

        let min_interval = Duration::from_secs_f64(1.0 / self.rps);
        let mut last_request = self.last_request.lock().await;

        if let Some(last_time) = *last_request {
            let elapsed = last_time.elapsed();
            if elapsed < min_interval {
                sleep(min_interval - elapsed).await;
            }
        }

        *last_request = Some(Instant::now());
    }
}

/// Read the API key from the configured environment variable
fn api_key_from_env(env_var: &str) -> Result<String, EvalError> {
    std::env::var(env_var)
        .map_err(|_| EvalError::InvalidRequest(format!("Environment variable {env_var} not found")))
}

fn span_input(model: &str, structured: bool, prompt: &str) -> Value {
    json!({
        "model": model,
        "structured": structured,
        "prompt": prompt,
    })
}

/// Invoker backed by the official OpenAI client
pub struct OpenAiInvoker {
    model: String,
    api_endpoint: String,
    env_var_api_key: String,
    temperature: f64,
    max_tokens: u32,
    limiter: RateLimiter,
    tracer: Tracer,
}

impl OpenAiInvoker {
    pub fn from_config(config: &Config, tracer: Tracer) -> Self {
        Self {
            model: config.model.clone(),
            api_endpoint: config.api_endpoint.clone(),
            env_var_api_key: config.env_var_api_key.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            limiter: RateLimiter::new(config.rate_limit_rps),
            tracer,
        }
    }

    fn create_client(&self) -> Result<Client<OpenAIConfig>, EvalError> {
        let api_key = api_key_from_env(&self.env_var_api_key)?;

        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(&self.api_endpoint);

        Ok(Client::with_config(openai_config))
    }

    fn build_request(
        &self,
        prompt: &str,
        structured: bool,
    ) -> Result<async_openai::types::CreateChatCompletionRequest, EvalError> {
        let user_message = async_openai::types::ChatCompletionRequestUserMessageArgs::default()
            .content(prompt.to_string())
            .build()
            .map_err(|e| EvalError::InvalidRequest(format!("Failed to build user message: {e}")))?
            .into();

        let mut request = CreateChatCompletionRequestArgs::default();
        request
            .model(&self.model)
            .messages([user_message])
            .temperature(self.temperature as f32)
            .max_tokens(self.max_tokens);
        if structured {
            request.response_format(async_openai::types::ResponseFormat::JsonObject);
        }

        request
            .build()
            .map_err(|e| EvalError::InvalidRequest(format!("Failed to build request: {e}")))
    }

    async fn call(&self, prompt: &str, structured: bool) -> Result<ModelResponse, EvalError> {
        let client = self.create_client()?;
        let request = self.build_request(prompt, structured)?;

        let response = client
            .chat()
            .create(request)
            .await
            .map_err(|e| EvalError::Transport(e.to_string()))?;

        let content = match response.choices.first() {
            Some(choice) => match &choice.message.content {
                Some(content) => content.clone(),
                None => {
                    return Err(EvalError::MalformedResponse {
                        message: "Response message had no content".to_string(),
                        raw_response: serde_json::to_string(&response).unwrap_or_default(),
                    });
                }
            },
            None => {
                return Err(EvalError::MalformedResponse {
                    message: "Response contained no choices".to_string(),
                    raw_response: serde_json::to_string(&response).unwrap_or_default(),
                });
            }
        };

        let mut metadata = HashMap::new();
        if let Some(usage) = response.usage {
            metadata.insert("prompt_tokens".to_string(), json!(usage.prompt_tokens));
            metadata.insert(
                "completion_tokens".to_string(),
                json!(usage.completion_tokens),
            );
            metadata.insert("total_tokens".to_string(), json!(usage.total_tokens));
        }

        Ok(ModelResponse { content, metadata })
    }
}

#[async_trait]
impl ModelInvoker for OpenAiInvoker {
    async fn invoke(
        &self,
        prompt: &str,
        structured: bool,
        ctx: Option<&TraceContext>,
    ) -> Result<ModelResponse, EvalError> {
        self.limiter.acquire().await;

        let ctx = ctx.copied().unwrap_or_else(|| self.tracer.start_trace());
        let span = self
            .tracer
            .span(&ctx, "model_invoke", span_input(&self.model, structured, prompt));

        let result = self.call(prompt, structured).await;
        match &result {
            Ok(response) => span.finish(json!({"content": response.content})),
            Err(err) => span.fail(err),
        }
        result
    }
}

/// Invoker for any OpenAI-compatible chat completions endpoint
pub struct CompatInvoker {
    model: String,
    api_endpoint: String,
    env_var_api_key: String,
    temperature: f64,
    max_tokens: u32,
    limiter: RateLimiter,
    tracer: Tracer,
    client: reqwest::Client,
}

/// Subset of the chat completions wire format the invoker reads back
#[derive(Debug, Deserialize)]
struct ChatCompletionBody {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl CompatInvoker {
    pub fn from_config(config: &Config, tracer: Tracer) -> Self {
        Self {
            model: config.model.clone(),
            api_endpoint: config.api_endpoint.clone(),
            env_var_api_key: config.env_var_api_key.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            limiter: RateLimiter::new(config.rate_limit_rps),
            tracer,
            client: reqwest::Client::new(),
        }
    }

    fn build_body(&self, prompt: &str, structured: bool) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });
        if structured {
            body["response_format"] = json!({"type": "json_object"});
        }
        body
    }

    async fn call(&self, prompt: &str, structured: bool) -> Result<ModelResponse, EvalError> {
        let api_key = api_key_from_env(&self.env_var_api_key)?;
        let url = format!("{}/chat/completions", self.api_endpoint.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&self.build_body(prompt, structured))
            .send()
            .await?;

        let status = response.status();
        let raw_body = response.text().await?;
        if !status.is_success() {
            return Err(EvalError::Transport(format!("HTTP {status}: {raw_body}")));
        }

        let body: ChatCompletionBody =
            serde_json::from_str(&raw_body).map_err(|e| EvalError::MalformedResponse {
                message: format!("Failed to parse chat completion body: {e}"),
                raw_response: raw_body.clone(),
            })?;

        let content = body
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| EvalError::MalformedResponse {
                message: "Response contained no message content".to_string(),
                raw_response: raw_body.clone(),
            })?;

        let mut metadata = HashMap::new();
        if let Some(usage) = body.usage {
            metadata.insert("prompt_tokens".to_string(), json!(usage.prompt_tokens));
            metadata.insert(
                "completion_tokens".to_string(),
                json!(usage.completion_tokens),
            );
            metadata.insert("total_tokens".to_string(), json!(usage.total_tokens));
        }

        Ok(ModelResponse { content, metadata })
    }
}

#[async_trait]
impl ModelInvoker for CompatInvoker {
    async fn invoke(
        &self,
        prompt: &str,
        structured: bool,
        ctx: Option<&TraceContext>,
    ) -> Result<ModelResponse, EvalError> {
        self.limiter.acquire().await;

        let ctx = ctx.copied().unwrap_or_else(|| self.tracer.start_trace());
        let span = self
            .tracer
            .span(&ctx, "model_invoke", span_input(&self.model, structured, prompt));

        let result = self.call(prompt, structured).await;
        match &result {
            Ok(response) => span.finish(json!({"content": response.content})),
            Err(err) => span.fail(err),
        }
        result
    }
}

/// Build the invoker selected by the run-file backend setting
pub fn build_invoker(config: &Config, tracer: Tracer) -> Arc<dyn ModelInvoker> {
    match config.backend {
        crate::config::Backend::OpenAi => Arc::new(OpenAiInvoker::from_config(config, tracer)),
        crate::config::Backend::Compatible => Arc::new(CompatInvoker::from_config(config, tracer)),
    }
}
