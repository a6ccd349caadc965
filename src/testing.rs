//! In-memory `Storage`/`Networking`/`Clock` doubles for tests and examples.
//!
//! Not part of the production API; shipped so integration tests (here and
//! downstream) can drive a [`Client`](crate::client::Client) end-to-end
//! without a real HTTP stack or wall-clock waits.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{NetworkingError, StorageError};
use crate::ports::{Clock, Networking, ResponseMap, Storage, TokenRequest};

#[derive(Default)]
pub struct MemoryStorage {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, client_identifier: &str, blob: Vec<u8>) {
        self.blobs
            .lock()
            .expect("storage mutex poisoned")
            .insert(client_identifier.to_string(), blob);
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, client_identifier: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self
            .blobs
            .lock()
            .expect("storage mutex poisoned")
            .get(client_identifier)
            .cloned())
    }

    async fn put(&self, client_identifier: &str, blob: Vec<u8>) -> Result<(), StorageError> {
        self.blobs
            .lock()
            .expect("storage mutex poisoned")
            .insert(client_identifier.to_string(), blob);
        Ok(())
    }

    async fn delete(&self, client_identifier: &str) -> Result<(), StorageError> {
        self.blobs.lock().expect("storage mutex poisoned").remove(client_identifier);
        Ok(())
    }
}

/// Outcome queued up for one `perform_token_request` call.
pub enum ScriptedResponse {
    Ok(ResponseMap),
    Err(String),
}

/// A networking double driven by a queue of pre-scripted responses, one per
/// expected request, consumed in order.
#[derive(Default)]
pub struct ScriptedNetworking {
    queue: Mutex<VecDeque<ScriptedResponse>>,
    requests: Mutex<Vec<TokenRequest>>,
}

impl ScriptedNetworking {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: ScriptedResponse) {
        self.queue.lock().expect("queue mutex poisoned").push_back(response);
    }

    pub fn requests(&self) -> Vec<TokenRequest> {
        self.requests.lock().expect("requests mutex poisoned").clone()
    }
}

#[async_trait]
impl Networking for ScriptedNetworking {
    async fn perform_token_request(&self, request: TokenRequest) -> Result<ResponseMap, NetworkingError> {
        self.requests.lock().expect("requests mutex poisoned").push(request);
        match self.queue.lock().expect("queue mutex poisoned").pop_front() {
            Some(ScriptedResponse::Ok(map)) => Ok(map),
            Some(ScriptedResponse::Err(message)) => Err(NetworkingError(message)),
            None => Err(NetworkingError("no scripted response queued".to_string())),
        }
    }
}

/// A clock whose `now()` is manually advanceable and whose `sleep` resolves
/// immediately, so back-off and eager-refresh timers don't slow tests down.
pub struct FakeClock {
    now: Mutex<DateTime<Utc>>,
}

impl FakeClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn advance(&self, seconds: i64) {
        let mut now = self.now.lock().expect("clock mutex poisoned");
        *now += chrono::Duration::seconds(seconds);
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex poisoned")
    }

    async fn sleep(&self, _seconds: f64) {
        tokio::task::yield_now().await;
    }
}
