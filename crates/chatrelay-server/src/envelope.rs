//! Server-to-client envelopes for one chat turn.
//!
//! Every reply is a run of `chunk` envelopes closed by exactly one `done`.
//! On the wire an envelope is a JSON object: `{"type":"chunk","content":"..."}`
//! or `{"type":"done"}`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeKind {
    Chunk,
    Done,
}

/// One unit of relay output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Envelope {
    /// Wrap a generated fragment. The content is carried as-is, empty
    /// strings included.
    pub fn chunk(content: impl Into<String>) -> Self {
        Self {
            kind: EnvelopeKind::Chunk,
            content: Some(content.into()),
        }
    }

    /// Terminal marker for a completed reply.
    pub fn done() -> Self {
        Self {
            kind: EnvelopeKind::Done,
            content: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.kind == EnvelopeKind::Done
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
