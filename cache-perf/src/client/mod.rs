//! Minimal confidential token client
//!
//! Stands in for the authenticating client the harness measures. It never
//! talks to an authority: tokens enter through `auth_result_from_token` and
//! leave through `acquire_token_silent`, and every cache touch goes through
//! the injected [`CacheAccessor`](crate::cache::CacheAccessor).

use thiserror::Error;

pub mod confidential;
pub mod token_cache;

pub use confidential::*;
pub use token_cache::*;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid authority '{authority}': {reason}")]
    InvalidAuthority { authority: String, reason: String },

    #[error("Client id must not be empty")]
    InvalidClientId,

    #[error("Invalid token response: {0}")]
    InvalidTokenResponse(String),

    #[error("No cached token for scopes {scopes:?}")]
    NoCachedToken { scopes: Vec<String> },

    #[error("Only the application token cache is supported")]
    UnsupportedCachePolicy,

    #[error("Confidential client requires a credential")]
    MissingCredential,
}
