//! Ordered first-match request dispatch
//!
//! Receivers register in priority order: the first whose `claims` predicate
//! recognizes a request handles it and nothing else is tried, so
//! identity-sensitive receivers go in front of general-purpose ones and a
//! forged request can never fall through to a less-privileged match.
//!
//! Mode gating is part of each receiver's `claims` contract — every
//! receiver is independently responsible for refusing privileged operation
//! shapes outside root mode. There is no central authorization step.

use std::sync::Arc;

use async_trait::async_trait;
use enclave_core::{ExecutionMode, Result};
use serde_json::Value;
use tracing::{debug, warn};

use crate::message::{Request, Response};

/// One request receiver in the dispatch chain
#[async_trait]
pub trait Receiver: Send + Sync {
    /// Whether this receiver recognizes the request in the given mode
    fn claims(&self, mode: ExecutionMode, request: &Request) -> bool;

    /// Handle a claimed request
    async fn handle(&self, mode: ExecutionMode, request: &Request) -> Result<Value>;
}

/// Ordered list of receivers bound to one execution mode
pub struct Dispatcher {
    mode: ExecutionMode,
    receivers: Vec<Arc<dyn Receiver>>,
}

impl Dispatcher {
    /// Create an empty dispatcher for the given mode
    pub fn new(mode: ExecutionMode) -> Self {
        Self {
            mode,
            receivers: Vec::new(),
        }
    }

    /// Append a receiver; registration order encodes priority
    pub fn add_receiver(&mut self, receiver: Arc<dyn Receiver>) {
        self.receivers.push(receiver);
    }

    /// The mode this dispatcher runs in
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Route a request to the first receiver that claims it
    ///
    /// Returns `None` when nothing claims the request — an unrecognized
    /// request is reported, not raised.
    pub async fn dispatch(&self, request: Request) -> Option<Response> {
        for receiver in &self.receivers {
            if !receiver.claims(self.mode, &request) {
                continue;
            }
            debug!(origin = %request.origin, "Dispatching request");
            return Some(match receiver.handle(self.mode, &request).await {
                Ok(result) => Response::result(request.callback.clone(), result),
                Err(e) => {
                    warn!(origin = %request.origin, "Request failed: {}", e);
                    Response::error(request.callback.clone(), &e)
                }
            });
        }

        warn!(origin = %request.origin, "Unrecognized request; no receiver claimed it");
        None
    }
}
