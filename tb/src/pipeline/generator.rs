//! BreakdownGenerator - stage one of the pipeline
//!
//! Renders the breakdown prompt from the session transcript, calls the model,
//! and records the exchange in the session only when the call succeeds.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::error::{CoreError, Stage};
use super::generate_text;
use crate::llm::{CompletionRequest, LlmClient, LlmError};
use crate::memory::{SessionStore, Turn};
use crate::prompts::PromptRenderer;

pub struct BreakdownGenerator {
    llm: Arc<dyn LlmClient>,
    renderer: Arc<PromptRenderer>,
    store: Arc<SessionStore>,
    deadline: Duration,
    max_tokens: u32,
}

impl BreakdownGenerator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        renderer: Arc<PromptRenderer>,
        store: Arc<SessionStore>,
        deadline: Duration,
        max_tokens: u32,
    ) -> Self {
        debug!(model = %llm.model(), ?deadline, max_tokens, "BreakdownGenerator::new: called");
        Self {
            llm,
            renderer,
            store,
            deadline,
            max_tokens,
        }
    }

    /// Produce the formatted breakdown for `user_input` in the context of `session_id`
    ///
    /// The session lock is held from reading the history until the exchange is
    /// appended, so concurrent calls for one session run one after another.
    pub async fn generate(&self, session_id: &str, user_input: &str) -> Result<String, CoreError> {
        debug!(%session_id, input_len = user_input.len(), "generate: called");
        let handle = self.store.get_or_create(session_id).await;
        let mut session = handle.lock().await;

        let prompt = self.renderer.render_breakdown(session.turns(), user_input)?;
        let request = CompletionRequest::prompt(prompt, self.max_tokens);
        let breakdown = generate_text(self.llm.as_ref(), request, self.deadline, Stage::Breakdown).await?;
        if breakdown.trim().is_empty() {
            warn!(%session_id, "Breakdown call returned no text");
            return Err(CoreError::Generation {
                stage: Stage::Breakdown,
                source: LlmError::InvalidResponse("model returned no text".to_string()),
            });
        }

        let max_turns = self.store.max_turns();
        session.push(Turn::user(user_input), max_turns);
        session.push(Turn::assistant(breakdown.clone()), max_turns);
        info!(
            %session_id,
            turns = session.turns().len(),
            breakdown_len = breakdown.len(),
            "Recorded breakdown exchange"
        );

        Ok(breakdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::mock::MockLlmClient;
    use crate::llm::Role;
    use crate::prompts::PromptLoader;

    fn generator(llm: Arc<MockLlmClient>, store: Arc<SessionStore>, deadline: Duration) -> BreakdownGenerator {
        let renderer = Arc::new(PromptRenderer::from_loader(&PromptLoader::embedded_only()).unwrap());
        BreakdownGenerator::new(llm, renderer, store, deadline, 1024)
    }

    #[tokio::test]
    async fn test_generate_appends_user_then_assistant() {
        let llm = Arc::new(MockLlmClient::texts(&["📋 Breaking down: Laundry"]));
        let store = Arc::new(SessionStore::new(0));
        let g = generator(llm.clone(), store.clone(), Duration::from_secs(5));

        let text = g.generate("s1", "Do laundry, 1 hour").await.unwrap();
        assert_eq!(text, "📋 Breaking down: Laundry");

        let history = store.history("s1").await;
        assert_eq!(history.len(), 2);
        assert_eq!((history[0].role, history[0].text.as_str()), (Role::User, "Do laundry, 1 hour"));
        assert_eq!(
            (history[1].role, history[1].text.as_str()),
            (Role::Assistant, "📋 Breaking down: Laundry")
        );
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_second_call_sees_first_exchange() {
        let llm = Arc::new(MockLlmClient::texts(&["How much time do you have?", "📋 Breaking down: Essay"]));
        let store = Arc::new(SessionStore::new(0));
        let g = generator(llm.clone(), store, Duration::from_secs(5));

        g.generate("s1", "Write my essay").await.unwrap();
        g.generate("s1", "2 hours").await.unwrap();

        let second = llm.prompt(1);
        assert!(second.contains("User: Write my essay\nAssistant: How much time do you have?"));
        assert!(second.contains("2 hours"));
    }

    #[tokio::test]
    async fn test_failure_leaves_transcript_untouched() {
        let llm = Arc::new(MockLlmClient::scripted(vec![Err(LlmError::ApiError {
            status: 403,
            message: "quota".to_string(),
        })]));
        let store = Arc::new(SessionStore::new(0));
        let g = generator(llm, store.clone(), Duration::from_secs(5));

        let err = g.generate("s1", "Plan trip, 3 hours").await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Generation {
                stage: Stage::Breakdown,
                ..
            }
        ));
        assert!(store.history("s1").await.is_empty());
    }

    #[tokio::test]
    async fn test_deadline_surfaces_as_timeout() {
        let llm = Arc::new(MockLlmClient::texts(&["late"]).with_delay(Duration::from_millis(200)));
        let store = Arc::new(SessionStore::new(0));
        let g = generator(llm, store.clone(), Duration::from_millis(20));

        let err = g.generate("s1", "Anything, 1 hour").await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Generation {
                source: LlmError::Timeout(_),
                ..
            }
        ));
        assert!(store.history("s1").await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_response_is_generation_failure() {
        let llm = Arc::new(MockLlmClient::texts(&["   "]));
        let store = Arc::new(SessionStore::new(0));
        let g = generator(llm, store.clone(), Duration::from_secs(5));

        assert!(g.generate("s1", "x").await.is_err());
        assert!(store.history("s1").await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_calls_keep_pairs_together() {
        let llm = Arc::new(MockLlmClient::texts(&["reply", "reply"]).with_delay(Duration::from_millis(20)));
        let store = Arc::new(SessionStore::new(0));
        let g = Arc::new(generator(llm, store.clone(), Duration::from_secs(5)));

        let a = tokio::spawn({
            let g = g.clone();
            async move { g.generate("shared", "first").await }
        });
        let b = tokio::spawn({
            let g = g.clone();
            async move { g.generate("shared", "second").await }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let roles: Vec<Role> = store.history("shared").await.iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Assistant]);
    }
}
