//! Deterministic mock LLM client for tests and offline demos.

use std::collections::VecDeque;
use std::sync::Arc;

use async_stream::try_stream;
use tokio::sync::Mutex;
use tokio::time::{Duration, sleep};

use crate::error::AiError;

use super::{FragmentStream, LlmClient};

/// Deterministic step for scripted mock replies.
#[derive(Debug, Clone)]
pub enum MockStepKind {
    /// Emit one text fragment.
    Fragment(String),
    /// Fail the stream.
    Error(String),
}

/// Scripted step with optional delay before it takes effect.
#[derive(Debug, Clone)]
pub struct MockStep {
    pub delay_ms: u64,
    pub kind: MockStepKind,
}

impl MockStep {
    pub fn fragment(content: impl Into<String>) -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Fragment(content.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Error(message.into()),
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

/// One scripted reply, consumed by a single `chat_stream` call.
#[derive(Debug, Clone, Default)]
pub struct MockReply {
    pub steps: Vec<MockStep>,
}

impl MockReply {
    pub fn new(steps: Vec<MockStep>) -> Self {
        Self { steps }
    }

    /// A reply that emits each fragment and completes.
    pub fn fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            steps: fragments.into_iter().map(MockStep::fragment).collect(),
        }
    }

    /// Append a failure after the steps so far.
    pub fn then_fail(mut self, message: impl Into<String>) -> Self {
        self.steps.push(MockStep::error(message));
        self
    }
}

/// A deterministic mock LLM client driven by scripted replies.
///
/// Once the script is exhausted the client echoes the prompt back word by
/// word.
#[derive(Debug, Clone, Default)]
pub struct MockLlmClient {
    model: String,
    echo_delay_ms: u64,
    script: Arc<Mutex<VecDeque<MockReply>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockLlmClient {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    pub fn from_replies(model: impl Into<String>, replies: Vec<MockReply>) -> Self {
        Self {
            model: model.into(),
            script: Arc::new(Mutex::new(VecDeque::from(replies))),
            ..Self::default()
        }
    }

    /// Pause between echoed words, so offline demos look like streaming.
    pub fn with_echo_delay(mut self, delay_ms: u64) -> Self {
        self.echo_delay_ms = delay_ms;
        self
    }

    pub async fn push_reply(&self, reply: MockReply) {
        self.script.lock().await.push_back(reply);
    }

    /// Prompts received so far, in order.
    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }

    async fn next_reply(&self, prompt: &str) -> MockReply {
        self.prompts.lock().await.push(prompt.to_string());
        match self.script.lock().await.pop_front() {
            Some(reply) => reply,
            None => self.echo_reply(prompt),
        }
    }

    fn echo_reply(&self, prompt: &str) -> MockReply {
        MockReply::new(
            prompt
                .split_inclusive(' ')
                .map(|word| MockStep::fragment(word).with_delay(self.echo_delay_ms))
                .collect(),
        )
    }
}

impl LlmClient for MockLlmClient {
    fn provider(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn chat_stream(&self, prompt: String) -> FragmentStream {
        let client = self.clone();
        Box::pin(try_stream! {
            let reply = client.next_reply(&prompt).await;

            for step in reply.steps {
                if step.delay_ms > 0 {
                    sleep(Duration::from_millis(step.delay_ms)).await;
                }

                match step.kind {
                    MockStepKind::Fragment(content) => {
                        yield content;
                    }
                    MockStepKind::Error(message) => {
                        Err::<(), _>(AiError::Llm(message))?;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use futures::{StreamExt, TryStreamExt};

    use super::*;

    #[tokio::test]
    async fn mock_client_returns_scripted_fragments() {
        let client = MockLlmClient::from_replies(
            "mock-model",
            vec![MockReply::fragments(["Hel", "lo ", "world"])],
        );

        let fragments: Vec<String> = client
            .chat_stream("ping".to_string())
            .try_collect()
            .await
            .expect("mock stream should succeed");

        assert_eq!(fragments, vec!["Hel", "lo ", "world"]);
        assert_eq!(client.prompts().await, vec!["ping"]);
    }

    #[tokio::test]
    async fn mock_client_fails_after_partial_output() {
        let client = MockLlmClient::from_replies(
            "mock-model",
            vec![MockReply::fragments(["a"]).then_fail("boom")],
        );

        let items: Vec<_> = client.chat_stream("x".to_string()).collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_deref().ok(), Some("a"));
        assert!(matches!(&items[1], Err(AiError::Llm(message)) if message == "boom"));
    }

    #[tokio::test]
    async fn mock_client_echoes_when_script_is_empty() {
        let client = MockLlmClient::new("mock-model");

        let fragments: Vec<String> = client
            .chat_stream("say it back".to_string())
            .try_collect()
            .await
            .expect("echo should succeed");
        assert_eq!(fragments, vec!["say ", "it ", "back"]);

        let empty: Vec<String> = client
            .chat_stream(String::new())
            .try_collect()
            .await
            .expect("echo should succeed");
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn mock_client_is_lazy_until_polled() {
        let client = MockLlmClient::from_replies("mock-model", vec![MockReply::fragments(["x"])]);

        let stream = client.chat_stream("unused".to_string());
        drop(stream);

        assert!(client.prompts().await.is_empty());
        client.push_reply(MockReply::fragments(["y"])).await;
        let fragments: Vec<String> = client
            .chat_stream("used".to_string())
            .try_collect()
            .await
            .expect("stream should succeed");
        assert_eq!(fragments, vec!["x"]);
    }
}
