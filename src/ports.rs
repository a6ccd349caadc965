//! Capability interfaces the core is driven through.
//!
//! These are held as shared, never-owning references (typically
//! `Arc<dyn Storage>` etc.) so a single backend can serve many [`Client`](crate::client::Client)
//! instances, matching the teacher's pattern of injecting capability traits
//! at construction rather than reaching for ambient globals.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

pub use crate::error::{NetworkingError, StorageError};

/// Key (client identifier) → opaque credential blob.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, client_identifier: &str) -> Result<Option<Vec<u8>>, StorageError>;
    async fn put(&self, client_identifier: &str, blob: Vec<u8>) -> Result<(), StorageError>;
    async fn delete(&self, client_identifier: &str) -> Result<(), StorageError>;
}

/// A single outbound token-endpoint HTTP request.
#[derive(Debug, Clone)]
pub struct TokenRequest {
    pub url: url::Url,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// A JSON object keyed by string, the shape every token-endpoint response is
/// reduced to before the core ever sees it.
pub type ResponseMap = BTreeMap<String, Value>;

/// Performs one token-endpoint exchange.
///
/// Status codes 200 and 400 MUST both be decoded into a [`ResponseMap`] (OAuth
/// error bodies are conventionally served with 400); any other status, a
/// non-JSON body, or a transport failure MUST surface as
/// `Err(NetworkingError)`.
#[async_trait]
pub trait Networking: Send + Sync {
    async fn perform_token_request(&self, request: TokenRequest) -> Result<ResponseMap, NetworkingError>;
}

/// Wall-clock access, abstracted so tests can run a flow's back-off and
/// eager-refresh timing without sleeping in real time.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Seconds from now until `instant`; negative if `instant` is in the
    /// past. May be scaled by a test double to accelerate timers — callers
    /// must only use it for scheduling, never for comparison.
    fn interval_from_now_to(&self, instant: DateTime<Utc>) -> f64 {
        (instant - self.now()).num_milliseconds() as f64 / 1000.0
    }

    /// Suspends the calling task for `seconds`, or forever if `seconds` is
    /// infinite (used by the refresh scheduler to park when no timer is
    /// armed). Cancellation is via dropping/aborting the enclosing task.
    async fn sleep(&self, seconds: f64);
}
