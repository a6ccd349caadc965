//! The closed set of OAuth/OIDC response types this crate understands.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A single entry of a requested `response_type` set.
///
/// Serializes to the wire form used in both the authorization URL and the
/// storage blob (`"code"`, `"token"`, `"id_token"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Code,
    Token,
    IdToken,
}

impl ResponseType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Token => "token",
            Self::IdToken => "id_token",
        }
    }
}

impl FromStr for ResponseType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code" => Ok(Self::Code),
            "token" => Ok(Self::Token),
            "id_token" => Ok(Self::IdToken),
            _ => Err(()),
        }
    }
}
