use crate::dataset::DatasetItem;
use crate::error::EvalError;
use crate::invoker::ModelInvoker;
use crate::models::PipelineResult;
use crate::template::{PromptTemplate, TemplateStore};
use crate::trace::{TraceContext, Tracer};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// Structured payload expected from the movie identifier step
#[derive(Debug, Deserialize)]
struct MovieInfo {
    movie_title: String,
}

/// Two-step rating chain: identify the movie, then classify its age rating.
///
/// Stateless across invocations; each `classify` call is independent.
pub struct RatingPipeline {
    identifier_template: PromptTemplate,
    classifier_template: PromptTemplate,
    invoker: Arc<dyn ModelInvoker>,
    tracer: Tracer,
}

impl RatingPipeline {
    /// Resolve both chain templates up front. A missing template aborts the
    /// whole run here, before any item is processed.
    pub fn new(
        templates: &TemplateStore,
        invoker: Arc<dyn ModelInvoker>,
        tracer: Tracer,
    ) -> Result<Self, EvalError> {
        Ok(Self {
            identifier_template: templates.get_prompt("movie identifier")?.clone(),
            classifier_template: templates.get_prompt("rating classifier")?.clone(),
            invoker,
            tracer,
        })
    }

    /// Classify one dataset item, returning the final age rating.
    ///
    /// The whole invocation is wrapped in a chain-level span that is closed
    /// on every exit path; both model calls share the same trace context.
    pub async fn classify(&self, item: &DatasetItem) -> Result<PipelineResult, EvalError> {
        let ctx = self.tracer.start_trace();
        let span = self.tracer.span(
            &ctx,
            "movie_rating_chain",
            json!({
                "movie_description": item.movie_description,
                "decade": item.decade,
            }),
        );

        let result = self.run_chain(&ctx, item).await;
        match &result {
            Ok(result) => span.finish(json!({"output": result.output})),
            Err(err) => span.fail(err),
        }
        result
    }

    async fn run_chain(
        &self,
        ctx: &TraceContext,
        item: &DatasetItem,
    ) -> Result<PipelineResult, EvalError> {
        let identifier_prompt = self.identifier_template.format(&HashMap::from([
            (
                "movie_description".to_string(),
                item.movie_description.clone(),
            ),
            ("decade".to_string(), item.decade.clone()),
        ]))?;

        let identifier_response = self
            .invoker
            .invoke(&identifier_prompt, true, Some(ctx))
            .await?;
        let movie_info = parse_movie_info(&identifier_response.content)?;

        let classifier_prompt = self
            .classifier_template
            .format(&HashMap::from([(
                "movie_title".to_string(),
                movie_info.movie_title,
            )]))?;

        let classifier_response = self
            .invoker
            .invoke(&classifier_prompt, false, Some(ctx))
            .await?;

        Ok(PipelineResult {
            output: classifier_response.content.trim().to_string(),
        })
    }
}

/// Parse the identifier step's JSON body into the expected schema
fn parse_movie_info(content: &str) -> Result<MovieInfo, EvalError> {
    serde_json::from_str(content).map_err(|e| EvalError::MalformedResponse {
        message: format!("Movie identifier response did not match the expected schema: {e}"),
        raw_response: content.to_string(),
    })
}
