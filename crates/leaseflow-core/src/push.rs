//! Push messages sent by the authority over the realtime channel.
//!
//! The channel carries newline-delimited JSON, one state transition per
//! line, in causal order per deployment:
//!
//! ```text
//! {"id":"7b1f..","update":{"LeaseCreated":{"provider_url":"https://..","tx_hash":".."}}}
//! ```

use serde::{Deserialize, Serialize};

use crate::deployment::{DeploymentId, DeploymentState};
use crate::error::{Error, Result};

/// One pushed state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMessage {
    pub id: DeploymentId,
    pub update: DeploymentState,
}

/// Parse a single NDJSON line. Unknown fields are ignored.
pub fn parse_line(line: &str) -> Result<PushMessage> {
    serde_json::from_str(line.trim()).map_err(|e| Error::PushParse(format!("{e}: {line}")))
}

/// Reassembles lines from arbitrarily split byte chunks.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buf: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every complete, non-blank line it finished.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line);
            let text = text.trim();
            if !text.is_empty() {
                lines.push(text.to_string());
            }
        }
        lines
    }

    /// Bytes received after the last newline.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}
