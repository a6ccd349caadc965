//! The internal in-progress flow record and the public observable `State`.

use std::collections::BTreeSet;
use std::sync::Arc;

use url::Url;

use crate::credentials::Credentials;
use crate::error::Error;
use crate::response_type::ResponseType;

/// Present only while a flow is in progress (`Authorizing` or
/// `FetchingToken`). Holds everything needed to validate a redirect and
/// extract credentials once it arrives.
#[derive(Debug, Clone)]
pub struct FlowState {
    pub requested_scope: BTreeSet<String>,
    pub requested_response_type: BTreeSet<ResponseType>,
    pub state_string: String,
    pub nonce_string: String,
}

/// The publicly observable state of a [`Client`](crate::client::Client).
#[derive(Debug, Clone)]
pub enum State {
    Idle,
    Authorizing { url: Url, redirect_url: Url },
    FetchingToken,
    Failed(Arc<Error>),
    Cancelled,
    Authorized { credentials: Credentials, refreshing: bool },
}

impl State {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_authorizing(&self) -> bool {
        matches!(self, Self::Authorizing { .. })
    }

    pub fn is_fetching_token(&self) -> bool {
        matches!(self, Self::FetchingToken)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized { .. })
    }

    /// Whether `start` may be called while in this state (§3: "only idle,
    /// failed, and cancelled permit a restart").
    pub fn permits_restart(&self) -> bool {
        self.is_idle() || self.is_failed() || self.is_cancelled()
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        match self {
            Self::Authorized { credentials, .. } => Some(credentials),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&Arc<Error>> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }
}
