//! Caller-provided flow configuration.

use std::collections::BTreeSet;

use url::Url;

use crate::error::ConfigError;
use crate::response_type::ResponseType;

/// Per-flow configuration supplied by the caller.
///
/// Invariant: if a started flow's response-type set contains
/// [`ResponseType::Code`](crate::response_type::ResponseType::Code), `token_endpoint`
/// must be present, checked by [`Config::validate`] against the response-type
/// set a particular flow is started with (the same `Config` can be reused
/// across flows requesting different response types).
#[derive(Debug, Clone)]
pub struct Config {
    pub authorization_endpoint: Url,
    pub token_endpoint: Option<Url>,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_url: Url,
}

impl Config {
    /// Enforces the §3 invariant for a flow about to be started with
    /// `response_type`.
    pub fn validate(&self, response_type: &BTreeSet<ResponseType>) -> Result<(), ConfigError> {
        if response_type.contains(&ResponseType::Code) && self.token_endpoint.is_none() {
            return Err(ConfigError::MissingTokenEndpoint);
        }
        Ok(())
    }
}

/// Whether the flow may open a browser/web view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// No browser interaction permitted; only stored credentials may satisfy the flow.
    Silent,
    Interactive,
}

/// OpenID Connect `display` parameter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    Page,
    Popup,
    Touch,
}

impl Display {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Popup => "popup",
            Self::Touch => "touch",
        }
    }
}

/// OpenID Connect `prompt` parameter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Prompt {
    None,
    Login,
    Consent,
    SelectAccount,
}

impl Prompt {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Login => "login",
            Self::Consent => "consent",
            Self::SelectAccount => "select_account",
        }
    }
}

/// Optional OpenID settings attached to the authorization URL.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationOptions {
    pub display: Option<Display>,
    pub prompt: BTreeSet<Prompt>,
}
