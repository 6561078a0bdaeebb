//! WebSocket chat endpoint.
//!
//! Each connection gets its own [`ChatSession`]: a greeting on open, then one
//! relay turn per inbound text frame, served strictly one at a time.

use std::collections::VecDeque;
use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use futures::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::SessionError;
use crate::relay::Relay;
use crate::state::AppState;

const GENERATION_FAILED_REASON: &str = "generation failed";

/// Prompts buffered while a turn streams. Once full, the socket is not read
/// until the turn ends, so TCP flow control pushes back on the client.
const MAX_PENDING_PROMPTS: usize = 8;

pub async fn chat_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let session = ChatSession::new(Relay::new(state.client.clone()), state.greeting.clone());
        session.run(socket).await;
    })
}

/// What an inbound frame means to the session
#[derive(Debug, PartialEq)]
enum Inbound {
    Prompt(String),
    Ignore,
    Closed,
}

fn classify(frame: Option<Result<Message, axum::Error>>) -> Inbound {
    match frame {
        Some(Ok(Message::Text(text))) => Inbound::Prompt(text.to_string()),
        Some(Ok(Message::Binary(bytes))) => {
            debug!(len = bytes.len(), "Ignoring binary frame");
            Inbound::Ignore
        }
        Some(Ok(Message::Ping(_) | Message::Pong(_))) => Inbound::Ignore,
        Some(Ok(Message::Close(_))) | None => Inbound::Closed,
        Some(Err(err)) => {
            debug!(error = %err, "WebSocket receive failed");
            Inbound::Closed
        }
    }
}

#[derive(Debug, PartialEq)]
enum TurnOutcome {
    Completed,
    Disconnected,
}

/// Per-connection state: the relay handle and the prompts waiting their turn.
pub struct ChatSession {
    id: Uuid,
    relay: Relay,
    greeting: Arc<str>,
    pending: VecDeque<String>,
}

impl ChatSession {
    pub fn new(relay: Relay, greeting: Arc<str>) -> Self {
        Self {
            id: Uuid::new_v4(),
            relay,
            greeting,
            pending: VecDeque::new(),
        }
    }

    pub async fn run(mut self, socket: WebSocket) {
        let (mut sender, mut receiver) = socket.split();
        info!(
            connection_id = %self.id,
            provider = self.relay.client().provider(),
            model = self.relay.client().model(),
            "Chat connection opened"
        );

        if let Err(err) = sender.send(Message::Text(self.greeting.as_ref().into())).await {
            debug!(connection_id = %self.id, error = %err, "Failed to send greeting");
            return;
        }

        let mut turn: u64 = 0;
        loop {
            let prompt = match self.pending.pop_front() {
                Some(prompt) => prompt,
                None => match self.next_prompt(&mut receiver).await {
                    Some(prompt) => prompt,
                    None => break,
                },
            };

            turn += 1;
            match self.run_turn(turn, prompt, &mut sender, &mut receiver).await {
                Ok(TurnOutcome::Completed) => {}
                Ok(TurnOutcome::Disconnected) => {
                    info!(connection_id = %self.id, turn, "Client left mid-turn, generation cancelled");
                    break;
                }
                Err(err) if err.is_generation() => {
                    warn!(connection_id = %self.id, turn, error = %err, "Turn aborted");
                    let close = Message::Close(Some(CloseFrame {
                        code: close_code::ERROR,
                        reason: GENERATION_FAILED_REASON.into(),
                    }));
                    if let Err(err) = sender.send(close).await {
                        debug!(connection_id = %self.id, error = %err, "Failed to send close frame");
                    }
                    break;
                }
                Err(err) => {
                    debug!(connection_id = %self.id, turn, error = %err, "Turn aborted");
                    break;
                }
            }
        }

        info!(connection_id = %self.id, turns = turn, "Chat connection closed");
    }

    fn accepts_prompts(&self) -> bool {
        self.pending.len() < MAX_PENDING_PROMPTS
    }

    async fn next_prompt(&self, receiver: &mut SplitStream<WebSocket>) -> Option<String> {
        loop {
            match classify(receiver.next().await) {
                Inbound::Prompt(prompt) => return Some(prompt),
                Inbound::Ignore => continue,
                Inbound::Closed => return None,
            }
        }
    }

    /// Stream one reply to the client.
    ///
    /// The inbound half is watched while streaming so a disconnect drops the
    /// envelope stream, and with it the upstream generation, right away.
    /// Prompts that arrive meanwhile are queued for the following turns, up
    /// to `MAX_PENDING_PROMPTS`. While the queue is full a disconnect only
    /// shows up as a failed send.
    async fn run_turn(
        &mut self,
        turn: u64,
        prompt: String,
        sender: &mut SplitSink<WebSocket, Message>,
        receiver: &mut SplitStream<WebSocket>,
    ) -> Result<TurnOutcome, SessionError> {
        debug!(connection_id = %self.id, turn, prompt_len = prompt.len(), "Turn started");
        let mut envelopes = self.relay.handle_message(prompt);
        let mut chunks: usize = 0;

        loop {
            tokio::select! {
                biased;

                inbound = receiver.next(), if self.accepts_prompts() => match classify(inbound) {
                    Inbound::Prompt(next) => self.pending.push_back(next),
                    Inbound::Ignore => {}
                    Inbound::Closed => return Ok(TurnOutcome::Disconnected),
                },

                envelope = envelopes.next() => {
                    let Some(envelope) = envelope else {
                        return Ok(TurnOutcome::Completed);
                    };
                    let envelope = envelope?;
                    let done = envelope.is_done();
                    sender.send(Message::Text(envelope.to_json()?.into())).await?;

                    if done {
                        debug!(connection_id = %self.id, turn, chunks, "Turn completed");
                        return Ok(TurnOutcome::Completed);
                    }
                    chunks += 1;
                }
            }
        }
    }
}
