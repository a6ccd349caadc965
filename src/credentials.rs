//! The immutable-by-value credentials snapshot and its storage blob format.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id_token::IdToken;
use crate::response_type::ResponseType;

/// A snapshot of everything obtained from an authorization flow or refresh.
///
/// Two `Credentials` are equal iff every field compares equal, including the
/// `IdToken`'s raw string (see [`IdToken`]'s `PartialEq`).
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub scope: BTreeSet<String>,
    pub response_type: BTreeSet<ResponseType>,
    pub access_token: Option<String>,
    pub access_token_expires_at: Option<DateTime<Utc>>,
    pub refresh_token: Option<String>,
    pub id_token: Option<IdToken>,
}

impl Credentials {
    /// The earlier of the access-token and ID-token expiries, or whichever
    /// one is present, or `None` if neither carries an expiry.
    pub fn earliest_expiration_date(&self) -> Option<DateTime<Utc>> {
        match (
            self.access_token_expires_at,
            self.id_token.as_ref().map(IdToken::expires_at),
        ) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        }
    }

    pub fn can_be_refreshed(&self, token_endpoint_configured: bool) -> bool {
        self.refresh_token.is_some() && token_endpoint_configured
    }

    /// Serializes to the JSON storage blob described in the external
    /// interfaces section: `scope`, `responseType`, `accessToken`,
    /// `expiresAt`, `refreshToken`, `idToken`.
    pub fn to_blob(&self) -> Vec<u8> {
        let blob = StoredCredentials {
            scope: self.scope.iter().cloned().collect(),
            response_type: self
                .response_type
                .iter()
                .map(|rt| rt.as_str().to_string())
                .collect(),
            access_token: self.access_token.clone(),
            expires_at: self.access_token_expires_at.map(|dt| dt.timestamp()),
            refresh_token: self.refresh_token.clone(),
            id_token: self.id_token.as_ref().map(|t| t.raw().to_string()),
        };
        serde_json::to_vec(&blob).expect("StoredCredentials is always serializable")
    }

    pub fn from_blob(bytes: &[u8]) -> Result<Self, DecodeError> {
        let blob: StoredCredentials = serde_json::from_slice(bytes)?;

        let response_type = blob
            .response_type
            .iter()
            .map(|s| s.parse::<ResponseType>().map_err(|_| DecodeError::UnknownResponseType(s.clone())))
            .collect::<Result<BTreeSet<_>, _>>()?;

        let access_token_expires_at = match blob.expires_at {
            Some(secs) => Some(
                DateTime::from_timestamp(secs, 0).ok_or(DecodeError::InvalidExpiry)?,
            ),
            None => None,
        };

        let id_token = match blob.id_token {
            Some(raw) => Some(IdToken::parse(raw)?),
            None => None,
        };

        Ok(Self {
            scope: blob.scope.into_iter().collect(),
            response_type,
            access_token: blob.access_token,
            access_token_expires_at,
            refresh_token: blob.refresh_token,
            id_token,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredCredentials {
    scope: Vec<String>,
    #[serde(rename = "responseType")]
    response_type: Vec<String>,
    #[serde(rename = "accessToken")]
    access_token: Option<String>,
    #[serde(rename = "expiresAt")]
    expires_at: Option<i64>,
    #[serde(rename = "refreshToken")]
    refresh_token: Option<String>,
    #[serde(rename = "idToken")]
    id_token: Option<String>,
}

/// Why a stored blob could not be turned back into [`Credentials`].
///
/// Every variant is treated the same way by the flow machine: log and treat
/// as absent (§4.1 step 2). The variants exist purely for diagnostics.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DecodeError {
    #[error("stored blob is not valid JSON: {0}")]
    Json(String),

    #[error("stored blob names an unknown response type `{0}`")]
    UnknownResponseType(String),

    #[error("stored blob has an expiry that is not a valid instant")]
    InvalidExpiry,

    #[error("stored id_token did not parse: {0}")]
    IdToken(#[from] crate::error::IdTokenError),
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}
