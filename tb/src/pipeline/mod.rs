//! Two-stage breakdown pipeline
//!
//! Stage one turns a task request into a formatted breakdown, with the
//! session's earlier turns as context. Stage two asks a second, stateless call
//! to restate that breakdown as JSON, which the parser decodes into an ordered
//! task list.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

mod budget;
mod error;
mod extractor;
mod generator;
mod parser;

pub use budget::{Minutes, TimeBudget, parse_minutes, total_minutes};
pub use error::{CoreError, DecodeError, PipelineWarning, Stage};
pub use extractor::StructuredExtractor;
pub use generator::BreakdownGenerator;
pub use parser::{ExtractedTask, NOT_AVAILABLE, parse, strip_fences};

use crate::config::{Config, PipelineConfig};
use crate::llm::{CompletionRequest, LlmClient, LlmError, StopReason, create_client};
use crate::memory::{SessionStore, Turn};
use crate::prompts::{PromptLoader, PromptRenderer};

/// Run one generation call under `deadline` and return its text
///
/// A reply with no content comes back as an empty string; whether that is a
/// failure depends on the stage.
pub(crate) async fn generate_text(
    llm: &dyn LlmClient,
    request: CompletionRequest,
    deadline: Duration,
    stage: Stage,
) -> Result<String, CoreError> {
    debug!(%stage, model = %llm.model(), ?deadline, "generate_text: called");
    let response = match tokio::time::timeout(deadline, llm.complete(request)).await {
        Ok(Ok(response)) => response,
        Ok(Err(source)) => {
            warn!(%stage, error = %source, "Generation call failed");
            return Err(CoreError::Generation { stage, source });
        }
        Err(_) => {
            warn!(%stage, ?deadline, "Generation call timed out");
            return Err(CoreError::Generation {
                stage,
                source: LlmError::Timeout(deadline),
            });
        }
    };

    debug!(
        %stage,
        input_tokens = response.usage.input_tokens,
        output_tokens = response.usage.output_tokens,
        stop_reason = ?response.stop_reason,
        "generate_text: usage"
    );
    if response.stop_reason == StopReason::MaxTokens {
        warn!(%stage, "Generation hit the token limit, output may be truncated");
    }
    Ok(response.content.unwrap_or_default())
}

/// Result of a successful pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct BreakdownOutcome {
    pub session_id: String,
    /// Formatted stage-one text, shown when no tasks were extracted
    pub breakdown: String,
    /// Stage-two text as generated (after any correction)
    pub extraction_raw: String,
    pub tasks: Vec<ExtractedTask>,
    pub warnings: Vec<PipelineWarning>,
    /// Correction calls made before the output decoded
    pub corrections: u32,
}

impl BreakdownOutcome {
    /// True when callers should fall back to showing the raw breakdown
    pub fn is_degraded(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn total_time(&self) -> Option<Minutes> {
        total_minutes(&self.tasks)
    }
}

/// The pipeline entry point: breakdown, extraction and session administration
pub struct Pipeline {
    store: Arc<SessionStore>,
    generator: BreakdownGenerator,
    extractor: StructuredExtractor,
    correction_retries: u32,
}

impl Pipeline {
    pub fn new(
        breakdown_llm: Arc<dyn LlmClient>,
        extraction_llm: Arc<dyn LlmClient>,
        renderer: Arc<PromptRenderer>,
        store: Arc<SessionStore>,
        config: &PipelineConfig,
    ) -> Self {
        debug!(?config, "Pipeline::new: called");
        let deadline = Duration::from_millis(config.generation_timeout_ms);
        let generator = BreakdownGenerator::new(
            breakdown_llm,
            renderer.clone(),
            store.clone(),
            deadline,
            config.breakdown_max_tokens,
        );
        let extractor = StructuredExtractor::new(extraction_llm, renderer, deadline, config.extraction_max_tokens);
        Self {
            store,
            generator,
            extractor,
            correction_retries: config.correction_retries,
        }
    }

    /// Build every component from configuration
    ///
    /// Template, model and provider problems all surface here as
    /// [`CoreError::Config`] or [`CoreError::Prompt`], before any request runs.
    pub fn from_config(config: &Config) -> Result<Self, CoreError> {
        debug!("Pipeline::from_config: called");
        let loader = PromptLoader::new(config.prompts.expanded_dir());
        let renderer = Arc::new(PromptRenderer::from_loader(&loader)?);

        let breakdown_llm = create_client(&config.llm).map_err(|e| CoreError::Config(e.to_string()))?;
        let extraction_llm = match &config.pipeline.extraction_model {
            Some(model) if model != &config.llm.model => {
                create_client(&config.extraction_llm()).map_err(|e| CoreError::Config(e.to_string()))?
            }
            _ => breakdown_llm.clone(),
        };

        let store = Arc::new(SessionStore::new(config.memory.max_turns));
        info!(
            provider = %config.llm.provider,
            breakdown_model = %breakdown_llm.model(),
            extraction_model = %extraction_llm.model(),
            max_turns = config.memory.max_turns,
            "Pipeline ready"
        );
        Ok(Self::new(breakdown_llm, extraction_llm, renderer, store, &config.pipeline))
    }

    /// Break a task request down and extract the ordered task/time list
    pub async fn breakdown_and_extract(&self, session_id: &str, user_input: &str) -> Result<BreakdownOutcome, CoreError> {
        debug!(%session_id, "breakdown_and_extract: called");
        let breakdown = self.generator.generate(session_id, user_input).await?;

        let mut raw = match self.extractor.extract(&breakdown).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(%session_id, error = %e, "Extraction call failed, breakdown is kept");
                return Err(e.with_breakdown(breakdown));
            }
        };
        let mut corrections = 0;
        let tasks = loop {
            match parse(&raw) {
                Ok(tasks) => break tasks,
                Err(source) if corrections < self.correction_retries => {
                    corrections += 1;
                    warn!(%session_id, attempt = corrections, error = %source, "Extraction output did not decode, asking for a correction");
                    match self.extractor.correct(&breakdown, &raw, &source).await {
                        Ok(corrected) => raw = corrected,
                        Err(e) => {
                            warn!(%session_id, error = %e, "Correction call failed");
                            return Err(CoreError::Decode { breakdown, raw, source });
                        }
                    }
                }
                Err(source) => {
                    warn!(%session_id, error = %source, "Extraction output could not be decoded");
                    return Err(CoreError::Decode { breakdown, raw, source });
                }
            }
        };

        let mut warnings = Vec::new();
        if tasks.is_empty() {
            warn!(%session_id, "No tasks extracted, breakdown will be shown as-is");
            warnings.push(PipelineWarning::EmptyResult);
        } else if let (Some(budget), Some(total)) = (TimeBudget::from_input(user_input), total_minutes(&tasks))
            && budget.is_exceeded_by(total)
        {
            warn!(%session_id, %budget, %total, "Extracted times exceed the stated budget");
            warnings.push(PipelineWarning::OverBudget { budget, total });
        }

        info!(%session_id, tasks = tasks.len(), corrections, "Breakdown extracted");
        Ok(BreakdownOutcome {
            session_id: session_id.to_string(),
            breakdown,
            extraction_raw: raw,
            tasks,
            warnings,
            corrections,
        })
    }

    /// Forget a session's transcript; returns whether it existed
    pub async fn clear_session(&self, session_id: &str) -> bool {
        debug!(%session_id, "clear_session: called");
        self.store.clear(session_id).await
    }

    pub async fn clear_all_sessions(&self) {
        debug!("clear_all_sessions: called");
        self.store.clear_all().await;
    }

    /// Snapshot of a session's turns, oldest first
    pub async fn history(&self, session_id: &str) -> Vec<Turn> {
        self.store.history(session_id).await
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::mock::MockLlmClient;
    use crate::llm::{CompletionResponse, Role};

    const MATH_BREAKDOWN: &str = "📋 Breaking down: Study for Math Exam\n\n\
        **Step 1: 📖 Review Chapter Notes**\n• Time: 20 minutes\n\n\
        **Step 2: ✏️ Practice Problems**\n• Time: 25 minutes\n\n\
        **Step 3: 🧠 Self-Quiz**\n• Time: 15 minutes";

    const MATH_EXTRACTION: &str = "```json\n{\n\
        \"Task 1\": \"Review Chapter Notes\", \"Time required T1\": \"20 minutes\",\n\
        \"Task 2\": \"Practice Problems\", \"Time required T2\": \"25 minutes\",\n\
        \"Task 3\": \"Self-Quiz\", \"Time required T3\": \"15 minutes\"\n}\n```";

    fn pipeline(breakdown: Arc<MockLlmClient>, extraction: Arc<MockLlmClient>, retries: u32) -> Pipeline {
        let renderer = Arc::new(PromptRenderer::from_loader(&PromptLoader::embedded_only()).unwrap());
        let config = PipelineConfig {
            correction_retries: retries,
            ..Default::default()
        };
        Pipeline::new(breakdown, extraction, renderer, Arc::new(SessionStore::new(20)), &config)
    }

    #[tokio::test]
    async fn test_math_exam_end_to_end() {
        let b = Arc::new(MockLlmClient::texts(&[MATH_BREAKDOWN]));
        let e = Arc::new(MockLlmClient::texts(&[MATH_EXTRACTION]));
        let p = pipeline(b.clone(), e.clone(), 1);

        let outcome = p
            .breakdown_and_extract("s1", "Study for Math Exam, 1 hour, give me time estimates")
            .await
            .unwrap();

        assert_eq!(b.call_count(), 1);
        assert_eq!(e.call_count(), 1);
        assert!((3..=5).contains(&outcome.tasks.len()));
        assert!(outcome.total_time().unwrap().max <= 60);
        assert!(outcome.warnings.is_empty());
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.tasks[0].task, "Review Chapter Notes");
        assert!(e.prompt(0).contains(MATH_BREAKDOWN));
    }

    #[tokio::test]
    async fn test_correction_recovers_malformed_extraction() {
        let b = Arc::new(MockLlmClient::texts(&[MATH_BREAKDOWN]));
        let e = Arc::new(MockLlmClient::texts(&["Here are your tasks: Task 1 is notes", MATH_EXTRACTION]));
        let p = pipeline(b, e.clone(), 1);

        let outcome = p.breakdown_and_extract("s1", "Study, 1 hour").await.unwrap();
        assert_eq!(outcome.corrections, 1);
        assert_eq!(outcome.tasks.len(), 3);
        assert_eq!(e.call_count(), 2);
        assert!(e.prompt(1).contains("Here are your tasks"));
    }

    #[tokio::test]
    async fn test_decode_error_after_retries_exhausted() {
        let b = Arc::new(MockLlmClient::texts(&[MATH_BREAKDOWN]));
        let e = Arc::new(MockLlmClient::texts(&["nope", "still nope"]));
        let p = pipeline(b, e.clone(), 1);

        let err = p.breakdown_and_extract("s1", "Study, 1 hour").await.unwrap_err();
        match err {
            CoreError::Decode { breakdown, raw, .. } => {
                assert_eq!(breakdown, MATH_BREAKDOWN);
                assert_eq!(raw, "still nope");
            }
            other => panic!("expected Decode, got {other:?}"),
        }
        assert_eq!(e.call_count(), 2);
    }

    #[tokio::test]
    async fn test_no_correction_when_disabled() {
        let b = Arc::new(MockLlmClient::texts(&[MATH_BREAKDOWN]));
        let e = Arc::new(MockLlmClient::texts(&["nope"]));
        let p = pipeline(b, e.clone(), 0);

        assert!(matches!(
            p.breakdown_and_extract("s1", "x").await,
            Err(CoreError::Decode { .. })
        ));
        assert_eq!(e.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_result_is_warning() {
        let b = Arc::new(MockLlmClient::texts(&["How much time do you have for this?"]));
        let e = Arc::new(MockLlmClient::texts(&["{}"]));
        let p = pipeline(b, e, 1);

        let outcome = p.breakdown_and_extract("s1", "Write essay").await.unwrap();
        assert!(outcome.is_degraded());
        assert_eq!(outcome.warnings, vec![PipelineWarning::EmptyResult]);
        assert_eq!(outcome.breakdown, "How much time do you have for this?");
    }

    #[tokio::test]
    async fn test_over_budget_warning() {
        let b = Arc::new(MockLlmClient::texts(&[MATH_BREAKDOWN]));
        let e = Arc::new(MockLlmClient::texts(&[
            r#"{"Task 1": "Read", "Time required T1": "50 minutes", "Task 2": "Quiz", "Time required T2": "40 minutes"}"#,
        ]));
        let p = pipeline(b, e, 1);

        let outcome = p.breakdown_and_extract("s1", "Study, 1 hour").await.unwrap();
        assert_eq!(
            outcome.warnings,
            vec![PipelineWarning::OverBudget {
                budget: TimeBudget(Minutes::exact(60)),
                total: Minutes::exact(90),
            }]
        );
    }

    #[tokio::test]
    async fn test_extraction_failure_keeps_breakdown_turns() {
        let b = Arc::new(MockLlmClient::texts(&[MATH_BREAKDOWN]));
        let e = Arc::new(MockLlmClient::scripted(vec![Err(LlmError::Timeout(Duration::from_secs(1)))]));
        let p = pipeline(b, e, 1);

        let err = p.breakdown_and_extract("s1", "Study, 1 hour").await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Extraction {
                source: LlmError::Timeout(_),
                ..
            }
        ));
        assert_eq!(err.breakdown(), Some(MATH_BREAKDOWN));
        assert!(err.is_retryable());
        assert_eq!(p.history("s1").await.len(), 2);
    }

    #[tokio::test]
    async fn test_refused_extraction_still_returns_breakdown() {
        let b = Arc::new(MockLlmClient::texts(&[MATH_BREAKDOWN]));
        let e = Arc::new(MockLlmClient::scripted(vec![Err(LlmError::Refused("SAFETY".to_string()))]));
        let p = pipeline(b, e.clone(), 1);

        let err = p.breakdown_and_extract("s1", "Study for Math Exam, 1 hour").await.unwrap_err();
        assert_eq!(err.breakdown(), Some(MATH_BREAKDOWN));
        assert!(err.to_string().contains("SAFETY"));
        assert_eq!(e.call_count(), 1);

        let history = p.history("s1").await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].text, MATH_BREAKDOWN);
    }

    #[tokio::test]
    async fn test_empty_extraction_goes_through_decoding() {
        let b = Arc::new(MockLlmClient::texts(&[MATH_BREAKDOWN]));
        let e = Arc::new(MockLlmClient::texts(&["", "   "]));
        let p = pipeline(b, e.clone(), 1);

        let err = p.breakdown_and_extract("s1", "Study, 1 hour").await.unwrap_err();
        match err {
            CoreError::Decode { breakdown, raw, .. } => {
                assert_eq!(breakdown, MATH_BREAKDOWN);
                assert_eq!(raw, "   ");
            }
            other => panic!("expected Decode, got {other:?}"),
        }
        assert_eq!(e.call_count(), 2);
    }

    #[tokio::test]
    async fn test_over_budget_uses_stated_budget_not_other_mentions() {
        let b = Arc::new(MockLlmClient::texts(&[MATH_BREAKDOWN]));
        let e = Arc::new(MockLlmClient::texts(&[
            r#"{"Task 1": "Read", "Time required T1": "40 minutes", "Task 2": "Quiz", "Time required T2": "25 minutes"}"#,
        ]));
        let p = pipeline(b, e, 1);

        let outcome = p
            .breakdown_and_extract("s1", "Study for Math Exam, 1 hour, with 10 minute breaks")
            .await
            .unwrap();
        assert_eq!(
            outcome.warnings,
            vec![PipelineWarning::OverBudget {
                budget: TimeBudget(Minutes::exact(60)),
                total: Minutes::exact(65),
            }]
        );
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let b = Arc::new(MockLlmClient::new(vec![
            CompletionResponse::text("secret plan for A"),
            CompletionResponse::text("plan for B"),
        ]));
        let e = Arc::new(MockLlmClient::texts(&["{}", "{}"]));
        let p = pipeline(b.clone(), e, 1);

        p.breakdown_and_extract("a", "Alpha task, 1 hour").await.unwrap();
        p.breakdown_and_extract("b", "Beta task, 1 hour").await.unwrap();

        let prompt_b = b.prompt(1);
        assert!(!prompt_b.contains("Alpha task"));
        assert!(!prompt_b.contains("secret plan for A"));
    }

    #[tokio::test]
    async fn test_clear_session() {
        let b = Arc::new(MockLlmClient::texts(&["first", "second"]));
        let e = Arc::new(MockLlmClient::texts(&["{}", "{}"]));
        let p = pipeline(b.clone(), e, 1);

        p.breakdown_and_extract("s1", "one").await.unwrap();
        assert!(p.clear_session("s1").await);
        assert!(p.history("s1").await.is_empty());

        p.breakdown_and_extract("s1", "two").await.unwrap();
        assert!(!b.prompt(1).contains("User: one"));
        let roles: Vec<Role> = p.history("s1").await.iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn test_history_window_caps_turns() {
        let renderer = Arc::new(PromptRenderer::from_loader(&PromptLoader::embedded_only()).unwrap());
        let b = Arc::new(MockLlmClient::texts(&["r1", "r2", "r3"]));
        let e = Arc::new(MockLlmClient::texts(&["{}", "{}", "{}"]));
        let p = Pipeline::new(b, e, renderer, Arc::new(SessionStore::new(4)), &PipelineConfig::default());

        for input in ["one", "two", "three"] {
            p.breakdown_and_extract("s1", input).await.unwrap();
        }
        let history = p.history("s1").await;
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].text, "two");
        assert_eq!(history[3].text, "r3");
    }
}
