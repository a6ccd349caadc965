//! A minimal, non-verifying JWT decoder for OpenID Connect ID Tokens.
//!
//! Only the claims this crate's flow logic needs are required to be present
//! and well-typed; everything else is read lazily from the decoded payload
//! map. There is no signature check — verifying a JWT's signature requires
//! the issuer's keys, which is out of scope here and left to a resource
//! server or a higher-level library.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::IdTokenError;

type Claims = BTreeMap<String, Value>;

/// A parsed ID Token.
///
/// Equality is defined purely on the raw JWT string (§3), so two `IdToken`s
/// that happen to decode to the same claims but came from differently
/// formatted input (e.g. different base64 padding upstream) are not equal.
#[derive(Debug, Clone)]
pub struct IdToken {
    raw: String,
    #[allow(dead_code)]
    header: Claims,
    payload: Claims,
    issuer: String,
    subject: String,
    audience: Vec<String>,
    expires_at: DateTime<Utc>,
    issued_at: DateTime<Utc>,
}

impl PartialEq for IdToken {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for IdToken {}

impl IdToken {
    /// Parses a three-(or more-)part JWT-shaped string.
    ///
    /// Only the first two dot-separated segments (header, payload) are
    /// inspected; a trailing signature segment, if present, is carried in
    /// the raw string but never decoded.
    pub fn parse(raw: impl Into<String>) -> Result<Self, IdTokenError> {
        let raw = raw.into();
        let mut parts = raw.split('.');
        let header_segment = parts.next().ok_or(IdTokenError::Malformed)?;
        let payload_segment = parts.next().ok_or(IdTokenError::Malformed)?;

        let header = decode_segment(header_segment, "header")?;
        let payload = decode_segment(payload_segment, "payload")?;

        let issuer = required_string(&payload, "iss")?;
        let subject = required_string(&payload, "sub")?;
        let audience = required_audience(&payload)?;
        let expires_at = required_instant(&payload, "exp")?;
        let issued_at = required_instant(&payload, "iat")?;

        Ok(Self {
            raw,
            header,
            payload,
            issuer,
            subject,
            audience,
            expires_at,
            issued_at,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn audience(&self) -> &[String] {
        &self.audience
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Returns `None` if the claim is absent or not a string.
    pub fn nonce(&self) -> Option<&str> {
        self.claim_str("nonce")
    }

    pub fn name(&self) -> Option<&str> {
        self.claim_str("name")
    }

    pub fn email(&self) -> Option<&str> {
        self.claim_str("email")
    }

    pub fn picture(&self) -> Option<&str> {
        self.claim_str("picture")
    }

    pub fn given_name(&self) -> Option<&str> {
        self.claim_str("given_name")
    }

    pub fn family_name(&self) -> Option<&str> {
        self.claim_str("family_name")
    }

    fn claim_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}

fn decode_segment(segment: &str, name: &'static str) -> Result<Claims, IdTokenError> {
    let padded = to_standard_base64(segment);
    let bytes = STANDARD
        .decode(padded.as_bytes())
        .map_err(|_| IdTokenError::InvalidBase64(name))?;
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map.into_iter().collect()),
        _ => Err(IdTokenError::InvalidJson(name)),
    }
}

fn to_standard_base64(segment: &str) -> String {
    let mut s: String = segment.chars().map(|c| match c {
        '-' => '+',
        '_' => '/',
        other => other,
    }).collect();
    while s.len() % 4 != 0 {
        s.push('=');
    }
    s
}

fn required_string(payload: &Claims, key: &'static str) -> Result<String, IdTokenError> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .ok_or(IdTokenError::MissingClaim(key))
}

fn required_audience(payload: &Claims) -> Result<Vec<String>, IdTokenError> {
    match payload.get("aud") {
        Some(Value::String(s)) if !s.is_empty() => Ok(vec![s.clone()]),
        Some(Value::Array(items)) => {
            let strings: Option<Vec<String>> = items
                .iter()
                .map(|v| v.as_str().map(str::to_owned))
                .collect();
            strings.ok_or(IdTokenError::MissingClaim("aud"))
        }
        _ => Err(IdTokenError::MissingClaim("aud")),
    }
}

fn required_instant(payload: &Claims, key: &'static str) -> Result<DateTime<Utc>, IdTokenError> {
    let seconds = match payload.get(key) {
        Some(Value::Number(n)) => n.as_i64().ok_or(IdTokenError::MissingClaim(key))?,
        _ => return Err(IdTokenError::MissingClaim(key)),
    };
    DateTime::from_timestamp(seconds, 0).ok_or(IdTokenError::MissingClaim(key))
}
