//! Core of an OAuth 2.0 / OpenID Connect client for public (no client
//! secret required) applications: a flow state machine, an eager token
//! refresh scheduler, and a non-verifying ID Token parser.
//!
//! The browser UI, the OpenID Discovery document fetcher, and the concrete
//! storage/transport backends are external collaborators — see [`ports`]
//! for the capability interfaces they implement.

mod backoff;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod id_token;
pub mod ports;
pub mod response_type;
mod state;
pub mod subscription;
mod token_exchange;
pub mod url_helpers;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use client::Client;
pub use config::{AuthorizationOptions, Config, Display, Mode, Prompt};
pub use credentials::Credentials;
pub use error::Error;
pub use id_token::IdToken;
pub use response_type::ResponseType;
pub use state::State;
pub use subscription::Subscription;
