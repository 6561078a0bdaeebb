//! Fragment-to-envelope relay.

use std::pin::Pin;

use async_stream::try_stream;
use chatrelay_ai::{AiError, FragmentStream, SharedLlmClient};
use futures::{Stream, StreamExt};

use crate::envelope::Envelope;

/// Envelopes for one turn. Ends after `done`, or after the generation error
/// that aborted the turn.
pub type EnvelopeStream = Pin<Box<dyn Stream<Item = Result<Envelope, AiError>> + Send>>;

/// Map each fragment to a `chunk` and append `done` once the fragments end
/// normally.
///
/// A failed fragment stream is passed through as an error and never gets a
/// `done`. Nothing is buffered: each envelope is ready as soon as its
/// fragment is, and dropping the returned stream drops `fragments`.
pub fn relay_fragments(mut fragments: FragmentStream) -> EnvelopeStream {
    Box::pin(try_stream! {
        while let Some(fragment) = fragments.next().await {
            yield Envelope::chunk(fragment?);
        }
        yield Envelope::done();
    })
}

/// Per-connection relay bound to one generation backend.
#[derive(Clone)]
pub struct Relay {
    client: SharedLlmClient,
}

impl Relay {
    pub fn new(client: SharedLlmClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &SharedLlmClient {
        &self.client
    }

    /// Start one turn. The prompt goes to the backend untouched.
    pub fn handle_message(&self, prompt: String) -> EnvelopeStream {
        relay_fragments(self.client.chat_stream(prompt))
    }
}
