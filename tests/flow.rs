//! Black-box scenarios driven entirely through the public `Client` API,
//! using the in-memory storage/networking/clock test doubles.

use std::collections::BTreeSet;
use std::sync::Arc;

use authflow_core::config::{AuthorizationOptions, Mode};
use authflow_core::response_type::ResponseType;
use authflow_core::testing::{FakeClock, MemoryStorage, ScriptedNetworking, ScriptedResponse};
use authflow_core::{Client, Config, Credentials, State};
use pretty_assertions::assert_eq;
use serde_json::Value;
use url::Url;

fn config() -> Config {
    Config {
        authorization_endpoint: Url::parse("http://example.com/auth?paramToPreserve=true&anotherOneEmpty=").unwrap(),
        token_endpoint: Some(Url::parse("http://example.com/token").unwrap()),
        client_id: "client-1".to_string(),
        client_secret: None,
        redirect_url: Url::parse("https://example.com/redirect").unwrap(),
    }
}

fn harness() -> (Arc<Client>, Arc<MemoryStorage>, Arc<ScriptedNetworking>) {
    let storage = Arc::new(MemoryStorage::new());
    let networking = Arc::new(ScriptedNetworking::new());
    let clock = Arc::new(FakeClock::new(chrono::Utc::now()));
    (Client::new(storage.clone(), networking.clone(), clock), storage, networking)
}

fn response(pairs: &[(&str, Value)]) -> std::collections::BTreeMap<String, Value> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

#[tokio::test]
async fn silent_restart_reuses_stored_credentials() {
    let (client, storage, _networking) = harness();
    storage.seed(
        "client-1",
        Credentials {
            scope: BTreeSet::new(),
            response_type: BTreeSet::from([ResponseType::Code]),
            access_token: Some("token:12345".to_string()),
            access_token_expires_at: None,
            refresh_token: None,
            id_token: None,
        }
        .to_blob(),
    );

    client
        .start(config(), Mode::Silent, BTreeSet::from([ResponseType::Code]), BTreeSet::new(), AuthorizationOptions::default())
        .await;

    match client.state() {
        State::Authorized { credentials, refreshing } => {
            assert!(!refreshing);
            assert_eq!(credentials.access_token.as_deref(), Some("token:12345"));
        }
        other => panic!("expected Authorized, got {other:?}"),
    }
}

#[tokio::test]
async fn implicit_token_flow_parses_fragment_scope_and_drops_refresh_token() {
    let (client, _storage, _networking) = harness();
    client
        .start(config(), Mode::Interactive, BTreeSet::from([ResponseType::Token]), BTreeSet::new(), AuthorizationOptions::default())
        .await;

    let url = match client.state() {
        State::Authorizing { url, .. } => url,
        other => panic!("expected Authorizing, got {other:?}"),
    };
    let captured_state = authflow_core::url_helpers::parse_query_map(&url).get("state").cloned().unwrap();

    let redirect = Url::parse(&format!(
        "https://example.com/redirect#state={captured_state}&token_type=bearer&access_token=token:12345&refresh_token=%5Bignored%5D&scope=something%20else%20from%20asked"
    ))
    .unwrap();
    client.handle_authorization_redirect(redirect).await;

    match client.state() {
        State::Authorized { credentials, .. } => {
            assert_eq!(
                credentials.scope,
                BTreeSet::from([
                    "something".to_string(),
                    "else".to_string(),
                    "from".to_string(),
                    "asked".to_string(),
                ])
            );
            assert_eq!(credentials.refresh_token, None);
        }
        other => panic!("expected Authorized, got {other:?}"),
    }
}

#[tokio::test]
async fn implicit_id_token_flow_matches_the_fixture() {
    const FIXTURE: &str = "eyJhbGciOiJSUzI1NiIsImtpZCI6IjA4MWJjODhmOWVmNjNhNGUyMjU2ZmJkNWQyMzYzZmRmIn0.eyJpc3MiOiJodHRwczovL2FwcG9ic3Rvay5vdnBvYnMudHYvYXBpL2lkZW50aXR5Iiwic3ViIjoiODc1ODIzMzEtY2E3Yy00OWVmLTkwZjctNWJmMzQ4YTFkYTQ4IiwiYXVkIjoiMjczMTk3IiwiZXhwIjoxNTkzMTA5MTk2LCJpYXQiOjE1OTMxMDg1OTYsImF1dGhfdGltZSI6MTU5MzEwODU5NSwiYXRfaGFzaCI6IjR4NDE3VlVvV1kta2s5bzA0bHZpZ3cifQ";

    let (client, _storage, _networking) = harness();
    client
        .start(config(), Mode::Interactive, BTreeSet::from([ResponseType::IdToken]), BTreeSet::new(), AuthorizationOptions::default())
        .await;

    let url = match client.state() {
        State::Authorizing { url, .. } => url,
        other => panic!("expected Authorizing, got {other:?}"),
    };
    let captured_state = authflow_core::url_helpers::parse_query_map(&url).get("state").cloned().unwrap();

    let redirect = Url::parse(&format!("https://example.com/redirect#state={captured_state}&id_token={FIXTURE}")).unwrap();
    client.handle_authorization_redirect(redirect).await;

    match client.state() {
        State::Authorized { credentials, .. } => {
            let id_token = credentials.id_token.expect("id_token must be present");
            assert_eq!(id_token.raw(), FIXTURE);
            assert_eq!(id_token.issuer(), "https://appobstok.ovpobs.tv/api/identity");
            assert_eq!(id_token.subject(), "87582331-ca7c-49ef-90f7-5bf348a1da48");
        }
        other => panic!("expected Authorized, got {other:?}"),
    }
}

#[tokio::test]
async fn stale_completion_after_rejection_is_ignored() {
    let (client, _storage, networking) = harness();
    client
        .start(config(), Mode::Interactive, BTreeSet::from([ResponseType::Code]), BTreeSet::new(), AuthorizationOptions::default())
        .await;
    let url = match client.state() {
        State::Authorizing { url, .. } => url,
        other => panic!("expected Authorizing, got {other:?}"),
    };
    let captured_state = authflow_core::url_helpers::parse_query_map(&url).get("state").cloned().unwrap();

    networking.push(ScriptedResponse::Ok(response(&[(
        "error",
        Value::String("invalid_something".to_string()),
    )])));
    let redirect = Url::parse(&format!("https://example.com/redirect?state={captured_state}&code=code:12345")).unwrap();
    client.handle_authorization_redirect(redirect.clone()).await;
    assert!(client.state().is_failed());

    // A second redirect with the same (now stale) flow state must not be
    // acted on: handle_authorization_redirect silently ignores it because
    // the client is no longer in `Authorizing`.
    client.handle_authorization_redirect(redirect).await;
    assert!(client.state().is_failed());
}

#[tokio::test]
async fn empty_token_response_is_rejected() {
    let (client, _storage, networking) = harness();
    client
        .start(config(), Mode::Interactive, BTreeSet::from([ResponseType::Code]), BTreeSet::new(), AuthorizationOptions::default())
        .await;
    let url = match client.state() {
        State::Authorizing { url, .. } => url,
        other => panic!("expected Authorizing, got {other:?}"),
    };
    let captured_state = authflow_core::url_helpers::parse_query_map(&url).get("state").cloned().unwrap();

    networking.push(ScriptedResponse::Ok(response(&[])));
    let redirect = Url::parse(&format!("https://example.com/redirect?state={captured_state}&code=code:12345")).unwrap();
    client.handle_authorization_redirect(redirect).await;

    assert!(client.state().is_failed());
}

#[tokio::test]
async fn negative_expires_in_is_rejected() {
    let (client, _storage, networking) = harness();
    client
        .start(config(), Mode::Interactive, BTreeSet::from([ResponseType::Code]), BTreeSet::new(), AuthorizationOptions::default())
        .await;
    let url = match client.state() {
        State::Authorizing { url, .. } => url,
        other => panic!("expected Authorizing, got {other:?}"),
    };
    let captured_state = authflow_core::url_helpers::parse_query_map(&url).get("state").cloned().unwrap();

    networking.push(ScriptedResponse::Ok(response(&[
        ("access_token", Value::String("t".to_string())),
        ("token_type", Value::String("bearer".to_string())),
        ("expires_in", Value::Number((-10).into())),
    ])));
    let redirect = Url::parse(&format!("https://example.com/redirect?state={captured_state}&code=code:12345")).unwrap();
    client.handle_authorization_redirect(redirect).await;

    assert!(client.state().is_failed());
}

#[tokio::test]
async fn openid_scope_without_id_token_is_rejected() {
    let (client, _storage, networking) = harness();
    client
        .start(
            config(),
            Mode::Interactive,
            BTreeSet::from([ResponseType::Code]),
            BTreeSet::from(["openid".to_string()]),
            AuthorizationOptions::default(),
        )
        .await;
    let url = match client.state() {
        State::Authorizing { url, .. } => url,
        other => panic!("expected Authorizing, got {other:?}"),
    };
    let captured_state = authflow_core::url_helpers::parse_query_map(&url).get("state").cloned().unwrap();

    networking.push(ScriptedResponse::Ok(response(&[
        ("access_token", Value::String("t".to_string())),
        ("token_type", Value::String("bearer".to_string())),
    ])));
    let redirect = Url::parse(&format!("https://example.com/redirect?state={captured_state}&code=code:12345")).unwrap();
    client.handle_authorization_redirect(redirect).await;

    assert!(client.state().is_failed());
}

#[tokio::test]
async fn state_and_nonce_are_regenerated_on_every_start_with_sufficient_entropy() {
    let (client, _storage, _networking) = harness();

    client
        .start(config(), Mode::Interactive, BTreeSet::from([ResponseType::IdToken]), BTreeSet::new(), AuthorizationOptions::default())
        .await;
    let first_url = match client.state() {
        State::Authorizing { url, .. } => url,
        other => panic!("expected Authorizing, got {other:?}"),
    };
    let first_state = authflow_core::url_helpers::parse_query_map(&first_url).get("state").cloned().unwrap();
    let first_nonce = authflow_core::url_helpers::parse_query_map(&first_url).get("nonce").cloned().unwrap();
    client.cancel();

    client
        .start(config(), Mode::Interactive, BTreeSet::from([ResponseType::IdToken]), BTreeSet::new(), AuthorizationOptions::default())
        .await;
    let second_url = match client.state() {
        State::Authorizing { url, .. } => url,
        other => panic!("expected Authorizing, got {other:?}"),
    };
    let second_state = authflow_core::url_helpers::parse_query_map(&second_url).get("state").cloned().unwrap();
    let second_nonce = authflow_core::url_helpers::parse_query_map(&second_url).get("nonce").cloned().unwrap();

    assert_ne!(first_state, second_state);
    assert_ne!(first_nonce, second_nonce);
    // 21 random bytes, base64url-no-pad encoded, is always 28 characters and
    // carries 168 bits of entropy, comfortably over the required 128.
    assert_eq!(first_state.len(), 28);
    assert_eq!(first_nonce.len(), 28);
}
