//! Request construction and response-to-credentials extraction for the
//! token endpoint (initial code exchange and refresh).

use std::collections::BTreeSet;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::config::Config;
use crate::credentials::Credentials;
use crate::error::TokenExchangeError;
use crate::id_token::IdToken;
use crate::ports::{ResponseMap, TokenRequest};
use crate::response_type::ResponseType;

/// Where a response map being extracted from originated, since extraction
/// rules differ between the authorization endpoint (implicit flows) and the
/// token endpoint (code exchange, refresh).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    AuthorizationEndpoint,
    TokenEndpoint,
}

pub fn build_code_exchange_request(config: &Config, code: &str) -> TokenRequest {
    let token_endpoint = config
        .token_endpoint
        .clone()
        .expect("caller has already validated token_endpoint is present");

    let body = form_encode(&[
        ("grant_type", "authorization_code"),
        ("code", code),
        ("client_id", &config.client_id),
        ("redirect_uri", config.redirect_url.as_str()),
    ]);

    TokenRequest {
        url: token_endpoint,
        headers: request_headers(config),
        body: body.into_bytes(),
    }
}

pub fn build_refresh_request(config: &Config, refresh_token: &str) -> TokenRequest {
    let token_endpoint = config
        .token_endpoint
        .clone()
        .expect("refresh is only scheduled when a token endpoint is configured");

    let body = form_encode(&[
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
    ]);

    TokenRequest {
        url: token_endpoint,
        headers: request_headers(config),
        body: body.into_bytes(),
    }
}

fn request_headers(config: &Config) -> Vec<(String, String)> {
    let mut headers = vec![(
        "Content-Type".to_string(),
        "application/x-www-form-urlencoded".to_string(),
    )];
    if let Some(secret) = &config.client_secret {
        let credentials = format!("{}:{}", config.client_id, secret);
        let encoded = BASE64_STANDARD.encode(credentials);
        headers.push(("Authorization".to_string(), format!("Basic {encoded}")));
    }
    headers
}

fn form_encode(pairs: &[(&str, &str)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

/// Lifts a flat string map (parsed from a redirect's query or fragment)
/// into the same `ResponseMap` shape a token-endpoint JSON body decodes to,
/// so implicit-flow extraction can share [`extract_credentials`] with the
/// code/refresh paths.
pub fn string_map_to_response_map(map: &std::collections::BTreeMap<String, String>) -> ResponseMap {
    map.iter().map(|(k, v)| (k.clone(), Value::String(v.clone()))).collect()
}

/// Server-declared OAuth error fields, if the response map carries them.
/// "Error wins over success": callers must check this before attempting
/// extraction.
pub fn server_declared_error(map: &ResponseMap) -> Option<(String, Option<String>)> {
    let error = map.get("error")?.as_str()?.to_string();
    let description = map
        .get("error_description")
        .and_then(Value::as_str)
        .map(str::to_string);
    Some((error, description))
}

/// Extracts `Credentials` from a token-endpoint or authorization-endpoint
/// response map, applying the rules of §4.2.
pub fn extract_credentials(
    map: &ResponseMap,
    source: Source,
    requested_scope: &BTreeSet<String>,
    response_type: &BTreeSet<ResponseType>,
    nonce: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Credentials, TokenExchangeError> {
    let scope = extract_scope(map, requested_scope)?;

    let wants_access_token = source == Source::TokenEndpoint
        || (source == Source::AuthorizationEndpoint && response_type.contains(&ResponseType::Token));
    let (access_token, access_token_expires_at) = if wants_access_token {
        extract_access_token(map, now)?
    } else {
        (None, None)
    };

    let refresh_token = if source == Source::TokenEndpoint {
        extract_refresh_token(map)?
    } else {
        None
    };

    let wants_id_token = (source == Source::AuthorizationEndpoint && response_type.contains(&ResponseType::IdToken))
        || (source == Source::TokenEndpoint && requested_scope.contains("openid"));
    let id_token = if wants_id_token {
        Some(extract_id_token(map, source, nonce)?)
    } else {
        None
    };

    Ok(Credentials {
        scope,
        response_type: response_type.clone(),
        access_token,
        access_token_expires_at,
        refresh_token,
        id_token,
    })
}

fn extract_scope(
    map: &ResponseMap,
    requested_scope: &BTreeSet<String>,
) -> Result<BTreeSet<String>, TokenExchangeError> {
    match map.get("scope") {
        None => Ok(requested_scope.clone()),
        Some(Value::String(s)) if !s.is_empty() => {
            Ok(s.split_whitespace().map(str::to_string).collect())
        }
        Some(_) => Err(TokenExchangeError::InvalidField("scope")),
    }
}

fn extract_access_token(
    map: &ResponseMap,
    now: DateTime<Utc>,
) -> Result<(Option<String>, Option<DateTime<Utc>>), TokenExchangeError> {
    let access_token = match map.get("access_token") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => return Err(TokenExchangeError::MissingField("access_token")),
    };

    let token_type = match map.get("token_type") {
        Some(Value::String(s)) => s.clone(),
        _ => return Err(TokenExchangeError::MissingField("token_type")),
    };
    if token_type.to_lowercase() != "bearer" {
        return Err(TokenExchangeError::UnsupportedTokenType(token_type));
    }

    let expires_at = match map.get("expires_in") {
        None => None,
        Some(value) => {
            let seconds = numeric_field(value).ok_or(TokenExchangeError::InvalidField("expires_in"))?;
            if seconds <= 0 {
                return Err(TokenExchangeError::InvalidField("expires_in"));
            }
            Some(now + chrono::Duration::seconds(seconds))
        }
    };

    Ok((Some(access_token), expires_at))
}

fn extract_refresh_token(map: &ResponseMap) -> Result<Option<String>, TokenExchangeError> {
    match map.get("refresh_token") {
        None => Ok(None),
        Some(Value::String(s)) if !s.is_empty() => Ok(Some(s.clone())),
        Some(_) => Err(TokenExchangeError::InvalidField("refresh_token")),
    }
}

fn extract_id_token(
    map: &ResponseMap,
    source: Source,
    nonce: Option<&str>,
) -> Result<IdToken, TokenExchangeError> {
    let raw = match map.get("id_token") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => return Err(TokenExchangeError::MissingField("id_token")),
    };
    let id_token = IdToken::parse(raw)?;

    if source == Source::AuthorizationEndpoint {
        if let Some(claimed) = id_token.nonce() {
            if Some(claimed) != nonce {
                return Err(TokenExchangeError::NonceMismatch);
            }
        }
    }

    Ok(id_token)
}

/// Accepts either a JSON number or a numeric string, per §4.2's tie-break.
fn numeric_field(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
