//! ChatRelay server: relays chat prompts to an LLM and streams the reply back
//! over a WebSocket as `chunk` envelopes followed by one `done`.

pub mod config;
pub mod envelope;
pub mod error;
pub mod relay;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

pub use config::ServerConfig;
pub use envelope::{Envelope, EnvelopeKind};
pub use error::SessionError;
pub use relay::{EnvelopeStream, Relay, relay_fragments};
pub use server::HttpServer;
pub use state::AppState;
