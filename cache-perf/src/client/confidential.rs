use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::ClientError;
use super::token_cache::{AccessToken, RefreshToken, SerializationFormat, TokenCache};
use crate::cache::CacheAccessor;
use crate::logging::sanitize_log_message;

/// Tenant-scoped authority, parsed from `https://{host}/{tenant}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authority {
    pub host: String,
    pub tenant: String,
}

impl Authority {
    pub fn parse(url: &str) -> Result<Self, ClientError> {
        let invalid = |reason: &str| ClientError::InvalidAuthority {
            authority: url.to_string(),
            reason: reason.to_string(),
        };

        let rest = url
            .strip_prefix("https://")
            .ok_or_else(|| invalid("authority must use https"))?;
        let mut segments = rest.trim_end_matches('/').split('/');

        let host = segments.next().filter(|h| !h.is_empty()).ok_or_else(|| invalid("missing host"))?;
        let tenant = segments.next().filter(|t| !t.is_empty()).ok_or_else(|| invalid("missing tenant"))?;
        if segments.next().is_some() {
            return Err(invalid("unexpected path after tenant"));
        }

        Ok(Self {
            host: host.to_string(),
            tenant: tenant.to_string(),
        })
    }

    pub fn url(&self) -> String {
        format!("https://{}/{}", self.host, self.tenant)
    }
}

/// Parameters for caching an externally obtained token
#[derive(Debug, Clone, Default)]
pub struct AuthParams {
    pub scopes: Vec<String>,
}

/// Token endpoint response as the client sees it
#[derive(Clone)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_on: DateTime<Utc>,
    pub granted_scopes: Vec<String>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_on", &self.expires_on)
            .field("granted_scopes", &self.granted_scopes)
            .finish()
    }
}

/// Client secret; never printed
#[derive(Clone)]
pub struct Credential {
    secret: String,
}

impl Credential {
    pub fn from_secret(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.secret.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

/// Parameters for a silent (cache-only) token request
#[derive(Debug, Clone)]
pub struct SilentParams {
    pub scopes: Vec<String>,
    pub credential: Credential,
    /// Application (non-user) cache policy; the only policy supported
    pub is_app_cache: bool,
}

/// Token handed back to callers
#[derive(Debug, Clone, PartialEq)]
pub struct AuthResult {
    pub access_token: String,
    pub expires_on: DateTime<Utc>,
    pub granted_scopes: Vec<String>,
    pub from_cache: bool,
}

impl From<AccessToken> for AuthResult {
    fn from(token: AccessToken) -> Self {
        Self {
            access_token: token.secret,
            expires_on: token.expires_on,
            granted_scopes: token.scopes,
            from_cache: true,
        }
    }
}

/// Confidential client scoped to one tenant
///
/// The cache accessor is injected at construction; the client calls
/// `replace` before reading its cache and `export` after writing it. Accessor
/// failures are logged and the client carries on with its in-memory state.
pub struct ConfidentialClient {
    client_id: String,
    authority: Authority,
    accessor: Arc<dyn CacheAccessor>,
    cache: Mutex<TokenCache>,
}

impl ConfidentialClient {
    pub fn new(client_id: &str, authority: &str, accessor: Arc<dyn CacheAccessor>) -> Result<Self, ClientError> {
        if client_id.trim().is_empty() {
            return Err(ClientError::InvalidClientId);
        }

        Ok(Self {
            client_id: client_id.to_string(),
            authority: Authority::parse(authority)?,
            accessor,
            cache: Mutex::new(TokenCache::default()),
        })
    }

    /// Use `format` when serializing this client's partition
    pub fn with_serialization(self, format: SerializationFormat) -> Self {
        Self {
            cache: Mutex::new(TokenCache::new(format)),
            ..self
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Partition holding this client's application tokens for its tenant
    pub fn partition_key(&self) -> String {
        format!("{}_{}_AppTokenCache", self.client_id, self.authority.tenant)
    }

    /// Turn a token response into an [`AuthResult`], caching it when `cache_write` is set
    pub async fn auth_result_from_token(
        &self,
        params: &AuthParams,
        response: TokenResponse,
        cache_write: bool,
    ) -> Result<AuthResult, ClientError> {
        if response.access_token.is_empty() {
            return Err(ClientError::InvalidTokenResponse("empty access token".to_string()));
        }
        let granted_scopes = if response.granted_scopes.is_empty() {
            params.scopes.clone()
        } else {
            response.granted_scopes.clone()
        };
        if granted_scopes.is_empty() {
            return Err(ClientError::InvalidTokenResponse("no granted scopes".to_string()));
        }

        if cache_write {
            let key = self.partition_key();
            let mut cache = self.cache.lock().await;

            if let Err(e) = self.accessor.replace(&mut *cache, &key).await {
                warn!(
                    partition = %key,
                    error = %sanitize_log_message(&e.to_string()),
                    "Cache replace failed, writing over in-memory state"
                );
            }

            cache.add_access_token(AccessToken {
                home_account_id: String::new(),
                environment: self.authority.host.clone(),
                realm: self.authority.tenant.clone(),
                client_id: self.client_id.clone(),
                scopes: granted_scopes.clone(),
                secret: response.access_token.clone(),
                cached_at: Utc::now(),
                expires_on: response.expires_on,
            });
            if let Some(refresh) = &response.refresh_token {
                cache.add_refresh_token(RefreshToken {
                    home_account_id: String::new(),
                    environment: self.authority.host.clone(),
                    client_id: self.client_id.clone(),
                    secret: refresh.clone(),
                });
            }

            if let Err(e) = self.accessor.export(&*cache, &key).await {
                warn!(
                    partition = %key,
                    error = %sanitize_log_message(&e.to_string()),
                    "Cache export failed, token not persisted"
                );
            }
        }

        Ok(AuthResult {
            access_token: response.access_token,
            expires_on: response.expires_on,
            granted_scopes,
            from_cache: false,
        })
    }

    /// Return a cached token for `params.scopes` without contacting an authority
    pub async fn acquire_token_silent(&self, params: &SilentParams) -> Result<AuthResult, ClientError> {
        if !params.is_app_cache {
            return Err(ClientError::UnsupportedCachePolicy);
        }
        if params.credential.is_empty() {
            return Err(ClientError::MissingCredential);
        }

        let key = self.partition_key();
        let mut cache = self.cache.lock().await;

        if let Err(e) = self.accessor.replace(&mut *cache, &key).await {
            warn!(
                partition = %key,
                error = %sanitize_log_message(&e.to_string()),
                "Cache replace failed, reading in-memory state"
            );
        }

        match cache.read(&self.client_id, &self.authority.tenant, &params.scopes, Utc::now()) {
            Some(stored) => {
                debug!(partition = %key, scopes = ?params.scopes, "Silent token served from cache");
                Ok(stored.access_token.into())
            }
            None => Err(ClientError::NoCachedToken {
                scopes: params.scopes.clone(),
            }),
        }
    }
}
