//! Error types for the flow core.
//!
//! Every error eventually bubbles up into `State::Failed`, which carries the
//! originating [`Error`] for diagnostics. Tests and callers are expected to
//! inspect `state.is_failed()` rather than match on error variants — see the
//! spec's testable-properties section — but the variants exist for logging
//! and debugging.

/// Top-level error aggregating every subsystem's failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error(transparent)]
    TokenExchange(#[from] TokenExchangeError),

    #[error(transparent)]
    Refresh(#[from] RefreshError),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("response type `code` requires a configured token endpoint")]
    MissingTokenEndpoint,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthorizationError {
    #[error("state parameter mismatch or missing")]
    StateMismatch,

    #[error("redirect did not carry an authorization code")]
    MissingCode,

    #[error("authorization server returned error `{error}` (description: {description:?})")]
    ServerError {
        error: String,
        description: Option<String>,
    },

    #[error("browser agent reported a failure: {0}")]
    ExternalFailure(String),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TokenExchangeError {
    #[error("token endpoint request failed: {0}")]
    Transport(String),

    #[error("authorization server returned error `{error}` (description: {description:?})")]
    ServerError {
        error: String,
        description: Option<String>,
    },

    #[error("missing required field `{0}` in token response")]
    MissingField(&'static str),

    #[error("field `{0}` had an invalid value")]
    InvalidField(&'static str),

    #[error("unsupported token_type `{0}`, expected `bearer`")]
    UnsupportedTokenType(String),

    #[error("id_token nonce did not match the flow's nonce")]
    NonceMismatch,

    #[error(transparent)]
    IdToken(#[from] IdTokenError),
}

/// Result of a refresh attempt. `transient` refreshes keep the scheduler
/// retrying with back-off; `permanent` ones terminate the flow.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RefreshError {
    #[error("transient refresh failure: {0}")]
    Transient(String),

    #[error("permanent refresh failure: {0}")]
    Permanent(String),
}

impl RefreshError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Non-fatal: logged and the flow continues with "no cached credentials".
#[derive(Debug, Clone, thiserror::Error)]
#[error("storage error: {0}")]
pub struct StorageError(pub String);

#[derive(Debug, Clone, thiserror::Error)]
#[error("networking error: {0}")]
pub struct NetworkingError(pub String);

#[derive(Debug, Clone, thiserror::Error)]
pub enum IdTokenError {
    #[error("a JWT-shaped string needs at least a header and payload segment")]
    Malformed,

    #[error("segment `{0}` is not valid base64url")]
    InvalidBase64(&'static str),

    #[error("segment `{0}` is not a JSON object")]
    InvalidJson(&'static str),

    #[error("required claim `{0}` is missing or has the wrong type")]
    MissingClaim(&'static str),
}

