//! The flow state machine and refresh scheduler: the two tightly coupled
//! subsystems that make up the bulk of this crate.
//!
//! All public operations assert they run on the "designated scheduling
//! context" (§5): the first task to call any of them is recorded, and every
//! later call is checked against it in debug builds. Internal continuations
//! (timer fires, token-endpoint completions) are not public methods and are
//! instead serialized by a plain `std::sync::Mutex` around [`Inner`], which
//! gives the same total ordering of state transitions without requiring
//! those continuations to run on the recorded task.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, OnceLock};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Duration;
use rand::RngCore;
use subtle::ConstantTimeEq;
use tokio::task::JoinHandle;
use url::Url;

use crate::backoff;
use crate::config::{AuthorizationOptions, Config, Mode};
use crate::credentials::Credentials;
use crate::error::{AuthorizationError, Error, RefreshError, TokenExchangeError};
use crate::ports::{Clock, Networking, Storage};
use crate::response_type::ResponseType;
use crate::state::{FlowState, State};
use crate::subscription::{ChangeNotifier, Subscription};
use crate::token_exchange::{self, Source};
use crate::url_helpers;

const EAGER_REFRESH_SECONDS: i64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RequestCookie(u64);

impl RequestCookie {
    fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshPhase {
    None,
    Waiting,
    InFlight,
}

enum TimerAction {
    Refresh,
    ExpireToFailed,
}

struct Inner {
    config: Option<Config>,
    flow: Option<FlowState>,
    state: State,
    cookie: RequestCookie,
    refresh_timer: Option<JoinHandle<()>>,
    refresh_phase: RefreshPhase,
    last_backoff_secs: f64,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            config: None,
            flow: None,
            state: State::Idle,
            cookie: RequestCookie(0),
            refresh_timer: None,
            refresh_phase: RefreshPhase::None,
            last_backoff_secs: 0.0,
        }
    }
}

/// The public entry point: one flow + its lifelong refresh schedule.
///
/// Always used behind an `Arc` — internal timer and token-endpoint
/// continuations need to resurrect a strong reference to spawn further
/// work, the same self-referential-`Arc` pattern the teacher uses for its
/// background flow-cleanup task.
pub struct Client {
    storage: Arc<dyn Storage>,
    networking: Arc<dyn Networking>,
    clock: Arc<dyn Clock>,
    notifier: Arc<ChangeNotifier>,
    inner: Mutex<Inner>,
    designated_context: OnceLock<tokio::task::Id>,
}

impl Client {
    pub fn new(storage: Arc<dyn Storage>, networking: Arc<dyn Networking>, clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            storage,
            networking,
            clock,
            notifier: Arc::new(ChangeNotifier::new()),
            inner: Mutex::new(Inner::default()),
            designated_context: OnceLock::new(),
        })
    }

    pub fn state(&self) -> State {
        self.assert_designated_context();
        self.inner.lock().expect("client mutex poisoned").state.clone()
    }

    pub fn subscribe(self: &Arc<Self>, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.assert_designated_context();
        self.notifier.subscribe(listener)
    }

    /// Starts (or restarts) a flow. Preconditions (§4.1): `response_type` is
    /// non-empty and the current state is `Idle`, `Failed`, or `Cancelled`.
    pub async fn start(
        self: &Arc<Self>,
        config: Config,
        mode: Mode,
        response_type: std::collections::BTreeSet<ResponseType>,
        scope: std::collections::BTreeSet<String>,
        options: AuthorizationOptions,
    ) {
        self.assert_designated_context();
        debug_assert!(!response_type.is_empty(), "response_type must be non-empty");
        debug_assert!(
            self.inner.lock().expect("client mutex poisoned").state.permits_restart(),
            "start() called while a flow is already in progress"
        );

        self.cancel_timer_and_bump_cookie();

        let client_identifier = config.client_id.clone();
        let stored = self.storage.get(&client_identifier).await;
        let reusable = self.reusable_credentials_from_storage(stored, &config, &response_type, &scope);

        {
            let mut inner = self.inner.lock().expect("client mutex poisoned");
            inner.config = Some(config.clone());
            inner.flow = None;
        }

        if let Some(credentials) = reusable {
            self.enter_authorized(credentials).await;
            return;
        }

        if mode == Mode::Silent {
            self.transition(State::Cancelled);
            return;
        }

        if let Err(err) = config.validate(&response_type) {
            self.transition(State::Failed(Arc::new(Error::Config(err))));
            return;
        }

        let state_string = generate_token();
        let nonce_string = generate_token();
        let url = build_authorization_url(&config, &response_type, &scope, &state_string, &nonce_string, &options);

        {
            let mut inner = self.inner.lock().expect("client mutex poisoned");
            inner.flow = Some(FlowState {
                requested_scope: scope,
                requested_response_type: response_type,
                state_string,
                nonce_string,
            });
        }

        self.transition(State::Authorizing { url, redirect_url: config.redirect_url });
    }

    fn reusable_credentials_from_storage(
        &self,
        stored: Result<Option<Vec<u8>>, crate::error::StorageError>,
        config: &Config,
        response_type: &std::collections::BTreeSet<ResponseType>,
        scope: &std::collections::BTreeSet<String>,
    ) -> Option<Credentials> {
        let blob = match stored {
            Ok(Some(blob)) => blob,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(error = %err, "storage read failed, treating as no stored credentials");
                return None;
            }
        };

        let credentials = match Credentials::from_blob(&blob) {
            Ok(credentials) => credentials,
            Err(err) => {
                tracing::warn!(error = %err, "failed to decode stored credentials, treating as absent");
                return None;
            }
        };

        if &credentials.response_type != response_type {
            return None;
        }

        if !scope.is_subset(&credentials.scope) {
            tracing::warn!(
                requested = ?scope,
                stored = ?credentials.scope,
                "stored credentials' scope is not a superset of the requested scope"
            );
        }

        let now = self.clock.now();
        let reusable = match credentials.earliest_expiration_date() {
            None => true,
            Some(expiry) if expiry > now => true,
            Some(_) => credentials.can_be_refreshed(config.token_endpoint.is_some()),
        };

        reusable.then_some(credentials)
    }

    /// Valid only while `Authorizing`; otherwise silently ignored (§4.1).
    pub async fn handle_authorization_redirect(self: &Arc<Self>, url: Url) {
        self.assert_designated_context();

        let in_authorizing = matches!(
            self.inner.lock().expect("client mutex poisoned").state,
            State::Authorizing { .. }
        );
        if !in_authorizing {
            return;
        }

        let Some(flow) = self.inner.lock().expect("client mutex poisoned").flow.clone() else {
            return;
        };

        let code_only = flow.requested_response_type == std::collections::BTreeSet::from([ResponseType::Code]);
        let params = if code_only {
            url_helpers::parse_query_map(&url)
        } else {
            url_helpers::parse_fragment_as_query(&url)
        };

        let received_state = params.get("state").map(String::as_str).unwrap_or("");
        if !constant_time_eq(received_state.as_bytes(), flow.state_string.as_bytes()) {
            self.transition(State::Failed(Arc::new(Error::Authorization(AuthorizationError::StateMismatch))));
            return;
        }

        if let Some(error) = params.get("error") {
            let description = params.get("error_description").cloned();
            self.transition(State::Failed(Arc::new(Error::Authorization(AuthorizationError::ServerError {
                error: error.clone(),
                description,
            }))));
            return;
        }

        if flow.requested_response_type.contains(&ResponseType::Code) {
            self.exchange_code(flow, params).await;
        } else {
            self.finish_implicit_flow(flow, params).await;
        }
    }

    async fn exchange_code(self: &Arc<Self>, flow: FlowState, params: BTreeMap<String, String>) {
        let code = match params.get("code") {
            Some(code) if !code.is_empty() => code.clone(),
            _ => {
                self.transition(State::Failed(Arc::new(Error::Authorization(AuthorizationError::MissingCode))));
                return;
            }
        };

        let cookie = self.cancel_timer_and_bump_cookie();
        self.transition(State::FetchingToken);

        let config = {
            self.inner
                .lock()
                .expect("client mutex poisoned")
                .config
                .clone()
                .expect("config is set by start() before Authorizing is ever entered")
        };
        let request = token_exchange::build_code_exchange_request(&config, &code);
        let result = self.networking.perform_token_request(request).await;

        if !self.cookie_is_current(cookie) {
            return;
        }

        let map = match result {
            Err(err) => {
                self.transition(State::Failed(Arc::new(Error::TokenExchange(TokenExchangeError::Transport(
                    err.to_string(),
                )))));
                return;
            }
            Ok(map) => map,
        };

        if let Some((error, description)) = token_exchange::server_declared_error(&map) {
            self.transition(State::Failed(Arc::new(Error::TokenExchange(TokenExchangeError::ServerError {
                error,
                description,
            }))));
            return;
        }

        let now = self.clock.now();
        match token_exchange::extract_credentials(
            &map,
            Source::TokenEndpoint,
            &flow.requested_scope,
            &flow.requested_response_type,
            None,
            now,
        ) {
            Ok(credentials) => {
                self.inner.lock().expect("client mutex poisoned").flow = None;
                self.enter_authorized(credentials).await;
            }
            Err(err) => {
                self.transition(State::Failed(Arc::new(Error::TokenExchange(err))));
            }
        }
    }

    async fn finish_implicit_flow(self: &Arc<Self>, flow: FlowState, params: BTreeMap<String, String>) {
        let map = token_exchange::string_map_to_response_map(&params);
        let now = self.clock.now();
        let extracted = token_exchange::extract_credentials(
            &map,
            Source::AuthorizationEndpoint,
            &flow.requested_scope,
            &flow.requested_response_type,
            Some(flow.nonce_string.as_str()),
            now,
        );

        self.inner.lock().expect("client mutex poisoned").flow = None;

        match extracted {
            Ok(credentials) => {
                self.enter_authorized(credentials).await;
            }
            Err(err) => {
                self.transition(State::Failed(Arc::new(Error::TokenExchange(err))));
            }
        }
    }

    /// Valid only while `Authorizing`.
    pub fn handle_authorization_failure(&self, message: impl Into<String>) {
        self.assert_designated_context();
        let in_authorizing = matches!(
            self.inner.lock().expect("client mutex poisoned").state,
            State::Authorizing { .. }
        );
        if !in_authorizing {
            return;
        }
        self.transition(State::Failed(Arc::new(Error::Authorization(AuthorizationError::ExternalFailure(
            message.into(),
        )))));
    }

    /// Valid in any state except `Authorized` (a no-op there — use `end`).
    pub fn cancel(&self) {
        self.assert_designated_context();
        if matches!(self.inner.lock().expect("client mutex poisoned").state, State::Authorized { .. }) {
            return;
        }
        self.cancel_timer_and_bump_cookie();
        self.inner.lock().expect("client mutex poisoned").flow = None;
        self.transition(State::Cancelled);
    }

    /// Deletes stored credentials and logs out when `Authorized`; otherwise
    /// behaves as [`Client::cancel`].
    pub async fn end(&self) {
        self.assert_designated_context();
        let client_identifier = {
            let inner = self.inner.lock().expect("client mutex poisoned");
            match &inner.state {
                State::Authorized { .. } => inner.config.as_ref().map(|c| c.client_id.clone()),
                _ => None,
            }
        };

        let Some(client_identifier) = client_identifier else {
            self.cancel();
            return;
        };

        if let Err(err) = self.storage.delete(&client_identifier).await {
            tracing::warn!(error = %err, "failed to delete credentials in end()");
        }
        self.cancel_timer_and_bump_cookie();
        self.inner.lock().expect("client mutex poisoned").flow = None;
        self.transition(State::Cancelled);
    }

    /// Only meaningful while `Authorized(_, refreshing=true)` (§4.3).
    pub fn nudge_to_refresh(self: &Arc<Self>) {
        self.assert_designated_context();

        let (refreshing, phase) = {
            let inner = self.inner.lock().expect("client mutex poisoned");
            (matches!(inner.state, State::Authorized { refreshing: true, .. }), inner.refresh_phase)
        };
        if !refreshing {
            return;
        }

        match phase {
            RefreshPhase::Waiting => {
                self.inner.lock().expect("client mutex poisoned").last_backoff_secs = 0.0;
                let cookie = self.cancel_timer_and_bump_cookie();
                self.schedule_timer(0.0, TimerAction::Refresh, cookie);
            }
            RefreshPhase::InFlight => {
                self.inner.lock().expect("client mutex poisoned").last_backoff_secs = 0.0;
            }
            RefreshPhase::None => {}
        }
    }

    /// Persists `credentials`, classifies their expiration, and transitions
    /// into `Authorized` with whatever timer (if any) that classification
    /// calls for (§4.3).
    async fn enter_authorized(self: &Arc<Self>, credentials: Credentials) {
        let config = {
            self.inner
                .lock()
                .expect("client mutex poisoned")
                .config
                .clone()
                .expect("enter_authorized is only reached after start() has set config")
        };

        if let Err(err) = self.storage.put(&config.client_id, credentials.to_blob()).await {
            tracing::warn!(error = %err, "failed to persist credentials");
        }

        let cookie = self.cancel_timer_and_bump_cookie();

        let now = self.clock.now();
        let can_refresh = credentials.can_be_refreshed(config.token_endpoint.is_some());

        match credentials.earliest_expiration_date() {
            None => {
                self.transition(State::Authorized { credentials, refreshing: false });
            }
            Some(expiry) if expiry <= now && !can_refresh => {
                self.transition(State::Failed(Arc::new(Error::Refresh(RefreshError::Permanent(
                    "access token expired and no refresh path is available".to_string(),
                )))));
            }
            Some(expiry) if expiry <= now => {
                self.transition(State::Authorized { credentials, refreshing: true });
                self.schedule_timer(0.0, TimerAction::Refresh, cookie);
            }
            Some(expiry) if can_refresh => {
                let delay = self
                    .clock
                    .interval_from_now_to(expiry - Duration::seconds(EAGER_REFRESH_SECONDS))
                    .max(0.0);
                self.transition(State::Authorized { credentials, refreshing: false });
                self.schedule_timer(delay, TimerAction::Refresh, cookie);
            }
            Some(expiry) => {
                let delay = self.clock.interval_from_now_to(expiry).max(0.0);
                self.transition(State::Authorized { credentials, refreshing: false });
                self.schedule_timer(delay, TimerAction::ExpireToFailed, cookie);
            }
        }
    }

    fn schedule_timer(self: &Arc<Self>, delay_secs: f64, action: TimerAction, cookie: RequestCookie) {
        {
            let mut inner = self.inner.lock().expect("client mutex poisoned");
            inner.refresh_phase = match action {
                TimerAction::Refresh => RefreshPhase::Waiting,
                TimerAction::ExpireToFailed => RefreshPhase::None,
            };
        }

        let client = Arc::clone(self);
        let handle = tokio::spawn(async move {
            client.clock.sleep(delay_secs).await;
            if !client.cookie_is_current(cookie) {
                return;
            }
            match action {
                TimerAction::Refresh => client.fire_refresh(cookie).await,
                TimerAction::ExpireToFailed => client.expire_due_to_no_refresh_path(cookie),
            }
        });
        self.inner.lock().expect("client mutex poisoned").refresh_timer = Some(handle);
    }

    fn expire_due_to_no_refresh_path(&self, cookie: RequestCookie) {
        if !self.cookie_is_current(cookie) {
            return;
        }
        self.transition(State::Failed(Arc::new(Error::Refresh(RefreshError::Permanent(
            "access token expired and no refresh path is available".to_string(),
        )))));
    }

    async fn fire_refresh(self: &Arc<Self>, cookie: RequestCookie) {
        let (config, credentials) = {
            let inner = self.inner.lock().expect("client mutex poisoned");
            let config = match inner.config.clone() {
                Some(config) => config,
                None => return,
            };
            let credentials = match &inner.state {
                State::Authorized { credentials, .. } => credentials.clone(),
                _ => return,
            };
            (config, credentials)
        };

        let Some(refresh_token) = credentials.refresh_token.clone() else {
            return;
        };

        self.inner.lock().expect("client mutex poisoned").refresh_phase = RefreshPhase::InFlight;

        let request = token_exchange::build_refresh_request(&config, &refresh_token);
        let result = self.networking.perform_token_request(request).await;

        if !self.cookie_is_current(cookie) {
            return;
        }

        match result {
            Err(err) => {
                self.retry_after_transient_failure(credentials, err.to_string());
            }
            Ok(map) => self.handle_refresh_response(config, credentials, map).await,
        }
    }

    fn retry_after_transient_failure(self: &Arc<Self>, credentials: Credentials, message: String) {
        let next = {
            let mut inner = self.inner.lock().expect("client mutex poisoned");
            let next = backoff::next_timeout(inner.last_backoff_secs);
            inner.last_backoff_secs = next;
            next
        };
        tracing::warn!(error = %message, next_retry_secs = next, "token refresh failed, retrying with back-off");
        self.transition(State::Authorized { credentials, refreshing: true });
        let cookie = self.inner.lock().expect("client mutex poisoned").cookie;
        self.schedule_timer(next, TimerAction::Refresh, cookie);
    }

    async fn handle_refresh_response(
        self: &Arc<Self>,
        config: Config,
        previous: Credentials,
        map: crate::ports::ResponseMap,
    ) {
        if let Some((error, description)) = token_exchange::server_declared_error(&map) {
            if let Err(err) = self.storage.delete(&config.client_id).await {
                tracing::warn!(error = %err, "failed to delete credentials after a permanent refresh failure");
            }
            self.transition(State::Failed(Arc::new(Error::Refresh(RefreshError::Permanent(format!(
                "{error}{}",
                description.map(|d| format!(": {d}")).unwrap_or_default()
            ))))));
            return;
        }

        let now = self.clock.now();
        match token_exchange::extract_credentials(
            &map,
            Source::TokenEndpoint,
            &previous.scope,
            &previous.response_type,
            None,
            now,
        ) {
            Err(err) => {
                // Preserved source quirk: a malformed refresh response does
                // not delete stored credentials, unlike a declared OAuth error.
                self.transition(State::Failed(Arc::new(Error::TokenExchange(err))));
            }
            Ok(mut credentials) => {
                if credentials.refresh_token.is_none() {
                    credentials.refresh_token = previous.refresh_token.clone();
                }
                self.inner.lock().expect("client mutex poisoned").last_backoff_secs = 0.0;
                self.enter_authorized(credentials).await;
            }
        }
    }

    fn cancel_timer_and_bump_cookie(&self) -> RequestCookie {
        let mut inner = self.inner.lock().expect("client mutex poisoned");
        inner.cookie = inner.cookie.next();
        inner.refresh_phase = RefreshPhase::None;
        if let Some(handle) = inner.refresh_timer.take() {
            handle.abort();
        }
        inner.cookie
    }

    fn cookie_is_current(&self, cookie: RequestCookie) -> bool {
        self.inner.lock().expect("client mutex poisoned").cookie == cookie
    }

    fn transition(&self, new_state: State) {
        self.inner.lock().expect("client mutex poisoned").state = new_state;
        self.notifier.notify();
    }

    fn assert_designated_context(&self) {
        let current = tokio::task::id();
        match self.designated_context.get() {
            Some(expected) => debug_assert_eq!(
                *expected, current,
                "Client must only be driven from the task that first called one of its public methods"
            ),
            None => {
                let _ = self.designated_context.set(current);
            }
        }
    }
}

fn build_authorization_url(
    config: &Config,
    response_type: &std::collections::BTreeSet<ResponseType>,
    scope: &std::collections::BTreeSet<String>,
    state_string: &str,
    nonce_string: &str,
    options: &AuthorizationOptions,
) -> Url {
    let mut response_type_values: Vec<&str> = response_type.iter().map(|rt| rt.as_str()).collect();
    response_type_values.sort_unstable();
    let response_type_param = response_type_values.join(" ");

    let scope_param = scope.iter().cloned().collect::<Vec<_>>().join(" ");
    let redirect_uri = config.redirect_url.to_string();

    let mut params: Vec<(&str, &str)> = vec![
        ("response_type", response_type_param.as_str()),
        ("client_id", config.client_id.as_str()),
        ("redirect_uri", redirect_uri.as_str()),
    ];
    if !scope.is_empty() {
        params.push(("scope", scope_param.as_str()));
    }
    params.push(("state", state_string));
    if response_type.contains(&ResponseType::IdToken) {
        params.push(("nonce", nonce_string));
    }
    if let Some(display) = options.display {
        params.push(("display", display.as_str()));
    }
    let prompt_param = options.prompt.iter().map(|p| p.as_str()).collect::<Vec<_>>().join(" ");
    if !options.prompt.is_empty() {
        params.push(("prompt", prompt_param.as_str()));
    }

    let mut url = config.authorization_endpoint.clone();
    url_helpers::append_to_query(&mut url, &params);
    url
}

fn generate_token() -> String {
    let mut bytes = [0u8; 21];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config as FlowConfig;
    use crate::testing::{FakeClock, MemoryStorage, ScriptedNetworking, ScriptedResponse};
    use std::collections::BTreeSet;

    fn config() -> FlowConfig {
        FlowConfig {
            authorization_endpoint: Url::parse("http://example.com/auth?paramToPreserve=true&anotherOneEmpty=").unwrap(),
            token_endpoint: Some(Url::parse("http://example.com/token").unwrap()),
            client_id: "client-1".to_string(),
            client_secret: None,
            redirect_url: Url::parse("https://example.com/redirect").unwrap(),
        }
    }

    fn client() -> (Arc<Client>, Arc<MemoryStorage>, Arc<ScriptedNetworking>) {
        let storage = Arc::new(MemoryStorage::new());
        let networking = Arc::new(ScriptedNetworking::new());
        let clock = Arc::new(FakeClock::new(chrono::Utc::now()));
        let client = Client::new(storage.clone(), networking.clone(), clock);
        (client, storage, networking)
    }

    #[tokio::test]
    async fn happy_authorization_code_flow_preserves_query_and_reaches_authorized() {
        let (client, _storage, networking) = client();

        client
            .start(
                config(),
                Mode::Interactive,
                BTreeSet::from([ResponseType::Code]),
                BTreeSet::new(),
                AuthorizationOptions::default(),
            )
            .await;

        let (url, redirect_url) = match client.state() {
            State::Authorizing { url, redirect_url } => (url, redirect_url),
            other => panic!("expected Authorizing, got {other:?}"),
        };
        assert_eq!(redirect_url.as_str(), "https://example.com/redirect");
        assert!(url.as_str().contains("paramToPreserve=true"));
        assert!(url.as_str().contains("anotherOneEmpty="));
        assert!(url.as_str().contains("response_type=code"));

        let captured_state = url_helpers::parse_query_map(&url).get("state").cloned().unwrap();
        let redirect = Url::parse(&format!(
            "https://example.com/redirect?state={captured_state}&code=code:12345"
        ))
        .unwrap();

        networking.push(ScriptedResponse::Ok(
            [
                ("access_token".to_string(), serde_json::Value::String("token:12345".to_string())),
                ("token_type".to_string(), serde_json::Value::String("bearer".to_string())),
                ("expires_in".to_string(), serde_json::Value::Number(30.into())),
            ]
            .into_iter()
            .collect(),
        ));

        client.handle_authorization_redirect(redirect).await;

        match client.state() {
            State::Authorized { credentials, refreshing } => {
                assert!(!refreshing);
                assert_eq!(credentials.access_token.as_deref(), Some("token:12345"));
            }
            other => panic!("expected Authorized, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn mismatched_state_fails_even_with_a_valid_code() {
        let (client, _storage, _networking) = client();
        client
            .start(
                config(),
                Mode::Interactive,
                BTreeSet::from([ResponseType::Code]),
                BTreeSet::new(),
                AuthorizationOptions::default(),
            )
            .await;

        let redirect = Url::parse("https://example.com/redirect?state=not-the-right-one&code=code:12345").unwrap();
        client.handle_authorization_redirect(redirect).await;

        assert!(client.state().is_failed());
    }

    #[tokio::test]
    async fn error_wins_over_success() {
        let (client, _storage, _networking) = client();
        client
            .start(
                config(),
                Mode::Interactive,
                BTreeSet::from([ResponseType::Code]),
                BTreeSet::new(),
                AuthorizationOptions::default(),
            )
            .await;

        let url = match client.state() {
            State::Authorizing { url, .. } => url,
            other => panic!("expected Authorizing, got {other:?}"),
        };
        let captured_state = url_helpers::parse_query_map(&url).get("state").cloned().unwrap();

        let redirect = Url::parse(&format!(
            "https://example.com/redirect?state={captured_state}&code=code:12345&error=invalid_something"
        ))
        .unwrap();
        client.handle_authorization_redirect(redirect).await;

        assert!(client.state().is_failed());
    }

    #[tokio::test]
    async fn silent_start_without_stored_credentials_cancels() {
        let (client, _storage, _networking) = client();
        client
            .start(
                config(),
                Mode::Silent,
                BTreeSet::from([ResponseType::Code]),
                BTreeSet::new(),
                AuthorizationOptions::default(),
            )
            .await;
        assert!(client.state().is_cancelled());
    }

    #[tokio::test]
    async fn cancel_is_a_no_op_while_authorized() {
        let (client, storage, _networking) = client();
        storage.seed(
            "client-1",
            Credentials {
                scope: BTreeSet::new(),
                response_type: BTreeSet::from([ResponseType::Code]),
                access_token: Some("token:cached".to_string()),
                access_token_expires_at: None,
                refresh_token: None,
                id_token: None,
            }
            .to_blob(),
        );
        client
            .start(
                config(),
                Mode::Silent,
                BTreeSet::from([ResponseType::Code]),
                BTreeSet::new(),
                AuthorizationOptions::default(),
            )
            .await;
        assert!(client.state().is_authorized());
        client.cancel();
        assert!(client.state().is_authorized());
    }
}
