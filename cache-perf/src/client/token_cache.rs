//! In-memory token cache for one partition
//!
//! The cache is what a client hands to the accessor: it implements
//! [`Marshaler`] and [`Unmarshaler`] over its whole contents. Unmarshal is
//! atomic; contents are decoded into a fresh value and swapped in only on
//! success, so a failed restore leaves the previous state intact.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::{CacheError, Marshaler, Unmarshaler};

/// Wire format for serialized partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializationFormat {
    #[default]
    Json,
    Bincode,
}

/// A cached access token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessToken {
    /// Empty for application (client credential) tokens
    pub home_account_id: String,
    pub environment: String,
    pub realm: String,
    pub client_id: String,
    pub scopes: Vec<String>,
    pub secret: String,
    pub cached_at: DateTime<Utc>,
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    /// Cache key: `home-environment-accesstoken-client-realm-scopes`, lowercased
    pub fn key(&self) -> String {
        format!(
            "{}-{}-accesstoken-{}-{}-{}",
            self.home_account_id,
            self.environment,
            self.client_id,
            self.realm,
            self.scopes.join(" ")
        )
        .to_lowercase()
    }

    /// Whether this token was granted every requested scope (case-insensitive)
    pub fn covers(&self, requested: &[String]) -> bool {
        requested
            .iter()
            .all(|want| self.scopes.iter().any(|have| have.eq_ignore_ascii_case(want)))
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_on
    }
}

/// A cached refresh token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshToken {
    pub home_account_id: String,
    pub environment: String,
    pub client_id: String,
    pub secret: String,
}

impl RefreshToken {
    pub fn key(&self) -> String {
        format!(
            "{}-{}-refreshtoken-{}",
            self.home_account_id, self.environment, self.client_id
        )
        .to_lowercase()
    }
}

/// Token material read back from the cache for one request
#[derive(Debug, Clone, PartialEq)]
pub struct StorageTokenResponse {
    pub access_token: AccessToken,
    pub refresh_token: Option<RefreshToken>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct CacheContents {
    #[serde(default)]
    access_tokens: BTreeMap<String, AccessToken>,
    #[serde(default)]
    refresh_tokens: BTreeMap<String, RefreshToken>,
}

/// Token cache for a single partition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenCache {
    format: SerializationFormat,
    contents: CacheContents,
}

impl TokenCache {
    pub fn new(format: SerializationFormat) -> Self {
        Self {
            format,
            contents: CacheContents::default(),
        }
    }

    pub fn format(&self) -> SerializationFormat {
        self.format
    }

    /// Insert or replace an access token under its cache key
    pub fn add_access_token(&mut self, token: AccessToken) {
        self.contents.access_tokens.insert(token.key(), token);
    }

    pub fn add_refresh_token(&mut self, token: RefreshToken) {
        self.contents.refresh_tokens.insert(token.key(), token);
    }

    pub fn access_token_count(&self) -> usize {
        self.contents.access_tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.access_tokens.is_empty() && self.contents.refresh_tokens.is_empty()
    }

    /// Find a live access token for this client and tenant covering `scopes`
    pub fn read(
        &self,
        client_id: &str,
        realm: &str,
        scopes: &[String],
        now: DateTime<Utc>,
    ) -> Option<StorageTokenResponse> {
        let access_token = self.contents.access_tokens.values().find(|token| {
            token.client_id.eq_ignore_ascii_case(client_id)
                && token.realm.eq_ignore_ascii_case(realm)
                && !token.is_expired_at(now)
                && token.covers(scopes)
        })?;

        let refresh_token = self
            .contents
            .refresh_tokens
            .values()
            .find(|rt| {
                rt.home_account_id == access_token.home_account_id
                    && rt.client_id.eq_ignore_ascii_case(client_id)
            })
            .cloned();

        Some(StorageTokenResponse {
            access_token: access_token.clone(),
            refresh_token,
        })
    }
}

impl Marshaler for TokenCache {
    fn marshal(&self) -> Result<Vec<u8>, CacheError> {
        match self.format {
            SerializationFormat::Json => serde_json::to_vec(&self.contents)
                .map_err(|e| CacheError::Marshal(format!("JSON serialization failed: {}", e))),
            SerializationFormat::Bincode => bincode::serialize(&self.contents)
                .map_err(|e| CacheError::Marshal(format!("Bincode serialization failed: {}", e))),
        }
    }
}

impl Unmarshaler for TokenCache {
    fn unmarshal(&mut self, data: &[u8]) -> Result<(), CacheError> {
        let contents: CacheContents = match self.format {
            SerializationFormat::Json => serde_json::from_slice(data)
                .map_err(|e| CacheError::Unmarshal(format!("JSON deserialization failed: {}", e)))?,
            SerializationFormat::Bincode => bincode::deserialize(data)
                .map_err(|e| CacheError::Unmarshal(format!("Bincode deserialization failed: {}", e)))?,
        };

        self.contents = contents;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn app_token(scope: &str, expires_in: Duration) -> AccessToken {
        let now = Utc::now();
        AccessToken {
            home_account_id: String::new(),
            environment: "login.example.com".to_string(),
            realm: "tenant-1".to_string(),
            client_id: "client".to_string(),
            scopes: vec![scope.to_string()],
            secret: "access-token".to_string(),
            cached_at: now,
            expires_on: now + expires_in,
        }
    }

    fn populated(format: SerializationFormat) -> TokenCache {
        let mut cache = TokenCache::new(format);
        cache.add_access_token(app_token("0", Duration::hours(1)));
        cache.add_access_token(app_token("100", Duration::hours(1)));
        cache.add_refresh_token(RefreshToken {
            home_account_id: String::new(),
            environment: "login.example.com".to_string(),
            client_id: "client".to_string(),
            secret: "refresh".to_string(),
        });
        cache
    }

    #[test]
    fn test_access_token_key_format() {
        let token = app_token("Read.All", Duration::hours(1));
        assert_eq!(token.key(), "-login.example.com-accesstoken-client-tenant-1-read.all");
    }

    #[test]
    fn test_distinct_scopes_are_distinct_entries() {
        let cache = populated(SerializationFormat::Json);
        assert_eq!(cache.access_token_count(), 2);
    }

    #[test]
    fn test_json_marshal_roundtrip() {
        let source = populated(SerializationFormat::Json);
        let blob = source.marshal().unwrap();

        let mut restored = TokenCache::new(SerializationFormat::Json);
        restored.unmarshal(&blob).unwrap();

        assert_eq!(restored, source);
    }

    #[test]
    fn test_bincode_marshal_roundtrip() {
        let source = populated(SerializationFormat::Bincode);
        let blob = source.marshal().unwrap();

        let mut restored = TokenCache::new(SerializationFormat::Bincode);
        restored.unmarshal(&blob).unwrap();

        assert_eq!(restored, source);
    }

    #[test]
    fn test_empty_cache_roundtrip() {
        let source = TokenCache::default();
        let mut restored = populated(SerializationFormat::Json);

        restored.unmarshal(&source.marshal().unwrap()).unwrap();
        assert!(restored.is_empty());
    }

    #[test]
    fn test_failed_unmarshal_keeps_previous_state() {
        let mut cache = populated(SerializationFormat::Json);
        let before = cache.clone();

        let err = cache.unmarshal(b"{not json").unwrap_err();

        assert!(err.to_string().contains("JSON deserialization failed"));
        assert_eq!(cache, before);
    }

    #[test]
    fn test_read_matches_scope_and_tenant() {
        let cache = populated(SerializationFormat::Json);
        let now = Utc::now();

        let hit = cache.read("client", "tenant-1", &["100".to_string()], now).unwrap();
        assert_eq!(hit.access_token.scopes, vec!["100".to_string()]);
        assert!(hit.refresh_token.is_some());

        assert!(cache.read("client", "tenant-2", &["100".to_string()], now).is_none());
        assert!(cache.read("client", "tenant-1", &["7".to_string()], now).is_none());
        assert!(cache.read("other", "tenant-1", &["100".to_string()], now).is_none());
    }

    #[test]
    fn test_read_skips_expired_tokens() {
        let mut cache = TokenCache::default();
        cache.add_access_token(app_token("old", Duration::seconds(-1)));

        assert!(cache.read("client", "tenant-1", &["old".to_string()], Utc::now()).is_none());
    }

    #[test]
    fn test_serialization_format_config_names() {
        let format: SerializationFormat = serde_json::from_str("\"bincode\"").unwrap();
        assert_eq!(format, SerializationFormat::Bincode);
        assert_eq!(SerializationFormat::default(), SerializationFormat::Json);
    }
}
