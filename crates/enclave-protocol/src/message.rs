//! Request and response messages
//!
//! A request carries exactly one top-level operation key recognized by
//! exactly one receiver, plus the caller's origin and an opaque correlation
//! token. The response echoes the token with either a `result` or an
//! `error` field, never both.

use enclave_core::{Result, VaultError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque caller-supplied token correlating a response to its request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationToken(String);

impl CorrelationToken {
    /// Wrap a token string
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The token string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CorrelationToken {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

/// One inbound request from a client context
#[derive(Debug, Clone)]
pub struct Request {
    /// Origin of the calling context; handlers derive per-app keys from it
    pub origin: String,
    /// Correlation token to echo in the response
    pub callback: Option<CorrelationToken>,
    /// The opaque request object
    pub body: Value,
}

impl Request {
    /// Build a request with no correlation token
    pub fn new(origin: impl Into<String>, body: Value) -> Self {
        Self {
            origin: origin.into(),
            callback: None,
            body,
        }
    }

    /// Parse a raw message object, lifting out its `callback` field
    pub fn parse(origin: impl Into<String>, body: Value) -> Self {
        let callback = body
            .get("callback")
            .and_then(Value::as_str)
            .map(CorrelationToken::from);
        Self {
            origin: origin.into(),
            callback,
            body,
        }
    }

    /// Attach a correlation token
    pub fn with_callback(mut self, token: impl Into<String>) -> Self {
        self.callback = Some(CorrelationToken::new(token));
        self
    }

    /// Whether the request carries this operation key
    pub fn has(&self, op: &str) -> bool {
        self.body.get(op).is_some()
    }

    /// The raw value under an operation key
    pub fn op(&self, op: &str) -> Option<&Value> {
        self.body.get(op)
    }

    /// Deserialize the parameters under an operation key
    pub fn params<T: serde::de::DeserializeOwned>(&self, op: &str) -> Result<T> {
        let value = self
            .op(op)
            .cloned()
            .ok_or_else(|| VaultError::invalid(format!("Request has no {:?} operation", op)))?;
        serde_json::from_value(value)
            .map_err(|e| VaultError::invalid(format!("Bad {:?} parameters: {}", op, e)))
    }
}

/// Outcome of a dispatched request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Echo of the request's correlation token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback: Option<CorrelationToken>,
    /// Present on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Present on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    /// Successful response
    pub fn result(callback: Option<CorrelationToken>, result: Value) -> Self {
        Self {
            callback,
            result: Some(result),
            error: None,
        }
    }

    /// Failed response
    pub fn error(callback: Option<CorrelationToken>, error: &VaultError) -> Self {
        Self {
            callback,
            result: None,
            error: Some(error.to_string()),
        }
    }

    /// Whether this is a success response
    pub fn is_ok(&self) -> bool {
        self.result.is_some()
    }
}
