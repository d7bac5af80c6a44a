//! Response generation.
//!
//! Assembles the final prompt (system instruction with retrieved
//! context, then recent history, then the query) and delegates to the
//! chat backend with fixed sampling parameters. Failures are typed;
//! only `render_user_reply` turns them into user-facing text.

mod chat_api;
mod provider;

use std::sync::Arc;

use crate::core::config::LlmSettings;
use crate::core::errors::RagError;

pub use chat_api::ChatCompletionsProvider;
pub use provider::{ChatMessage, ChatRequest, LlmProvider};

pub struct ResponseGenerator {
    provider: Arc<dyn LlmProvider>,
    settings: LlmSettings,
}

impl ResponseGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>, settings: LlmSettings) -> Self {
        Self { provider, settings }
    }

    /// Generate an answer for `query` grounded in `context`, with the
    /// capped `history` preceding it.
    pub async fn generate(
        &self,
        query: &str,
        context: &[String],
        history: Vec<ChatMessage>,
    ) -> Result<String, RagError> {
        let mut messages = vec![ChatMessage::system(build_system_prompt(context))];
        messages.extend(history);
        messages.push(ChatMessage::user(query));

        let mut request = ChatRequest::new(messages);
        request.temperature = Some(self.settings.temperature);
        request.max_tokens = Some(self.settings.max_tokens);

        self.provider.chat(request, &self.settings.model).await
    }
}

/// System instruction embedding the retrieved context.
pub fn build_system_prompt(context: &[String]) -> String {
    let context_text = context.join("\n\n");

    format!(
        "You are a helpful AI assistant. Answer the user's question based on the following context.\n\n\
         Context:\n{context_text}\n\n\
         If the answer cannot be found in the context, say so politely and provide general knowledge if appropriate."
    )
}

/// Boundary policy: render a generation result as user-visible text.
///
/// Everything upstream of this function sees typed errors; the apology
/// wording exists only here, where the reply is handed to the user.
pub fn render_user_reply(result: Result<String, RagError>) -> String {
    match result {
        Ok(text) => text,
        Err(err) => format!("Sorry, I encountered an error: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every request and answers with a canned string.
    struct RecordingProvider {
        requests: Mutex<Vec<(ChatRequest, String)>>,
        reply: Result<String, String>,
    }

    impl RecordingProvider {
        fn answering(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                requests: Mutex::new(Vec::new()),
                reply: Ok(reply.to_string()),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                requests: Mutex::new(Vec::new()),
                reply: Err(message.to_string()),
            })
        }

        fn last_request(&self) -> ChatRequest {
            self.requests.lock().unwrap().last().unwrap().0.clone()
        }
    }

    #[async_trait]
    impl LlmProvider for RecordingProvider {
        fn name(&self) -> &str {
            "recording"
        }

        async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, RagError> {
            self.requests
                .lock()
                .unwrap()
                .push((request, model_id.to_string()));
            self.reply.clone().map_err(RagError::Generation)
        }
    }

    fn generator(provider: Arc<RecordingProvider>) -> ResponseGenerator {
        ResponseGenerator::new(provider, LlmSettings::default())
    }

    #[tokio::test]
    async fn prompt_is_system_then_history_then_query() {
        let provider = RecordingProvider::answering("fine");
        let gen = generator(provider.clone());

        let history = vec![
            ChatMessage::user("earlier question"),
            ChatMessage::assistant("earlier answer"),
        ];
        let context = vec!["first chunk".to_string(), "second chunk".to_string()];

        let reply = gen.generate("what now?", &context, history).await.unwrap();
        assert_eq!(reply, "fine");

        let request = provider.last_request();
        assert_eq!(request.messages.len(), 4);
        assert_eq!(request.messages[0].role, "system");
        assert!(request.messages[0].content.contains("first chunk\n\nsecond chunk"));
        assert_eq!(request.messages[1].content, "earlier question");
        assert_eq!(request.messages[2].content, "earlier answer");
        assert_eq!(request.messages[3].role, "user");
        assert_eq!(request.messages[3].content, "what now?");
    }

    #[tokio::test]
    async fn sampling_parameters_are_fixed() {
        let provider = RecordingProvider::answering("ok");
        let gen = generator(provider.clone());

        gen.generate("q", &["ctx".to_string()], Vec::new())
            .await
            .unwrap();

        let request = provider.last_request();
        assert_eq!(request.temperature, Some(0.7));
        assert_eq!(request.max_tokens, Some(1024));
    }

    #[tokio::test]
    async fn backend_failure_is_a_typed_error() {
        let provider = RecordingProvider::failing("connection refused");
        let gen = generator(provider);

        let err = gen
            .generate("q", &["ctx".to_string()], Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Generation(_)));
    }

    #[test]
    fn render_user_reply_wraps_failures_only() {
        assert_eq!(render_user_reply(Ok("hello".to_string())), "hello");

        let rendered = render_user_reply(Err(RagError::Generation("backend down".to_string())));
        assert!(rendered.starts_with("Sorry, I encountered an error:"));
        assert!(rendered.contains("backend down"));
    }
}
