//! NDJSON-over-HTTP push transport.
//!
//! The authority's gateway streams one JSON push message per line on a
//! long-lived `GET`. Malformed lines are logged and skipped.

use leaseflow_core::push::{LineSplitter, parse_line};
use tracing::{debug, warn};

use super::transport::{ConnectionHandle, PushSink, PushTransport, TransportEvent};
use crate::http::build_client;
use crate::identity::CallerIdentity;

#[derive(Debug, Clone)]
pub struct NdjsonPushTransport {
    url: String,
}

impl NdjsonPushTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl PushTransport for NdjsonPushTransport {
    fn connect(&self, identity: &CallerIdentity, sink: PushSink) -> ConnectionHandle {
        let http = match build_client(identity.access_token(), None) {
            Ok(http) => http,
            Err(e) => {
                sink.send(TransportEvent::Error(e.to_string()));
                return ConnectionHandle::detached();
            }
        };
        let url = self.url.clone();
        ConnectionHandle::from_task(tokio::spawn(stream_events(http, url, sink)))
    }
}

async fn stream_events(http: reqwest::Client, url: String, sink: PushSink) {
    let generation = sink.generation();
    let mut resp = match http.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => resp,
        Ok(resp) => {
            sink.send(TransportEvent::Error(format!(
                "push endpoint returned {}",
                resp.status()
            )));
            return;
        }
        Err(e) => {
            sink.send(TransportEvent::Error(e.to_string()));
            return;
        }
    };

    debug!(%url, generation, "push stream open");
    if !sink.send(TransportEvent::Open) {
        return;
    }

    let mut splitter = LineSplitter::new();
    loop {
        match resp.chunk().await {
            Ok(Some(bytes)) => {
                for line in splitter.push(&bytes) {
                    match parse_line(&line) {
                        Ok(msg) => {
                            if !sink.send(TransportEvent::Message(msg)) {
                                return;
                            }
                        }
                        Err(e) => warn!(generation, error = %e, "skipping malformed push line"),
                    }
                }
            }
            Ok(None) => {
                if splitter.pending() > 0 {
                    warn!(generation, bytes = splitter.pending(), "push stream ended mid-line");
                }
                sink.send(TransportEvent::Closed);
                return;
            }
            Err(e) => {
                sink.send(TransportEvent::Error(e.to_string()));
                return;
            }
        }
    }
}
