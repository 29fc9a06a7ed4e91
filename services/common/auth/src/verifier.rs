use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use tracing::debug;

use crate::claims::Claims;
use crate::error::{AuthError, AuthResult};
use crate::jwks::JwksFetcher;

/// Key id used for tokens whose header carries no `kid`.
pub const DEFAULT_KID: &str = "default";

/// Validation settings applied to every token.
#[derive(Debug, Clone, Default)]
pub struct JwtConfig {
    /// Expected `iss`; unchecked when `None`.
    pub issuer: Option<String>,
    /// Expected `aud`; unchecked when `None`.
    pub audience: Option<String>,
    /// Allowable clock skew in seconds when validating exp/nbf.
    pub leeway_seconds: u32,
}

impl JwtConfig {
    pub fn new(issuer: Option<String>, audience: Option<String>) -> Self {
        Self {
            issuer,
            audience,
            leeway_seconds: 30,
        }
    }

    pub fn with_leeway(mut self, seconds: u32) -> Self {
        self.leeway_seconds = seconds;
        self
    }
}

/// A decoding key pinned to the single algorithm it may verify.
#[derive(Clone)]
pub struct VerifierKey {
    pub key: DecodingKey,
    pub algorithm: Algorithm,
}

impl VerifierKey {
    pub fn rsa_pem(kid: &str, pem: &[u8]) -> AuthResult<Self> {
        let key = DecodingKey::from_rsa_pem(pem)
            .map_err(|err| AuthError::KeyParse(kid.to_string(), err.to_string()))?;
        Ok(Self {
            key,
            algorithm: Algorithm::RS256,
        })
    }

    pub fn hmac_secret(secret: &[u8]) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
            algorithm: Algorithm::HS256,
        }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryKeyStore {
    inner: Arc<RwLock<HashMap<String, VerifierKey>>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, kid: impl Into<String>, key: VerifierKey) {
        let mut guard = self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.insert(kid.into(), key);
    }

    pub fn get(&self, kid: &str) -> Option<VerifierKey> {
        let guard = self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.get(kid).cloned()
    }

    pub fn len(&self) -> usize {
        let guard = self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Merge freshly fetched keys; statically configured keys stay in place.
    pub fn merge<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (String, VerifierKey)>,
    {
        let mut guard = self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        for (kid, key) in entries {
            guard.insert(kid, key);
        }
    }
}

#[derive(Clone)]
pub struct JwtVerifier {
    config: JwtConfig,
    store: InMemoryKeyStore,
    jwks: Option<JwksFetcher>,
}

impl JwtVerifier {
    pub fn new(config: JwtConfig) -> Self {
        Self {
            config,
            store: InMemoryKeyStore::new(),
            jwks: None,
        }
    }

    pub fn builder(config: JwtConfig) -> JwtVerifierBuilder {
        JwtVerifierBuilder::new(config)
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    pub fn store(&self) -> &InMemoryKeyStore {
        &self.store
    }

    pub fn jwks_fetcher(&self) -> Option<&JwksFetcher> {
        self.jwks.as_ref()
    }

    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        let header =
            decode_header(token).map_err(|err| AuthError::InvalidHeader(err.to_string()))?;
        let kid = header.kid.unwrap_or_else(|| DEFAULT_KID.to_string());
        let entry = self
            .store
            .get(&kid)
            .ok_or_else(|| AuthError::UnknownKeyId(kid.clone()))?;

        let mut validation = Validation::new(entry.algorithm);
        if let Some(issuer) = &self.config.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &self.config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        validation.leeway = self.config.leeway_seconds.into();

        let token_data = decode::<Value>(token, &entry.key, &validation)?;
        let claims = Claims::try_from(token_data.claims)?;
        debug!(kid, subject = %claims.subject, "verified JWT successfully");
        Ok(claims)
    }

    pub async fn refresh_jwks(&self) -> AuthResult<usize> {
        let Some(fetcher) = &self.jwks else {
            return Ok(0);
        };

        let keys = fetcher.fetch().await?;
        let count = keys.len();
        self.store.merge(keys);
        Ok(count)
    }
}

pub struct JwtVerifierBuilder {
    config: JwtConfig,
    store: InMemoryKeyStore,
    jwks: Option<JwksFetcher>,
}

impl JwtVerifierBuilder {
    fn new(config: JwtConfig) -> Self {
        Self {
            config,
            store: InMemoryKeyStore::new(),
            jwks: None,
        }
    }

    pub fn with_key(self, kid: impl Into<String>, key: VerifierKey) -> Self {
        self.store.insert(kid, key);
        self
    }

    pub fn with_rsa_pem(self, kid: impl Into<String>, pem: &[u8]) -> AuthResult<Self> {
        let kid = kid.into();
        let key = VerifierKey::rsa_pem(&kid, pem)?;
        Ok(self.with_key(kid, key))
    }

    /// Shared-secret (HS256) tokens are looked up under [`DEFAULT_KID`].
    pub fn with_hmac_secret(self, secret: &[u8]) -> Self {
        self.with_key(DEFAULT_KID, VerifierKey::hmac_secret(secret))
    }

    pub fn with_jwks_url(mut self, url: impl Into<String>) -> Self {
        self.jwks = Some(JwksFetcher::new(url));
        self
    }

    pub fn with_jwks_fetcher(mut self, fetcher: JwksFetcher) -> Self {
        self.jwks = Some(fetcher);
        self
    }

    pub async fn build(self) -> AuthResult<JwtVerifier> {
        let verifier = JwtVerifier {
            config: self.config,
            store: self.store,
            jwks: self.jwks,
        };

        if verifier.jwks.is_some() {
            verifier.refresh_jwks().await?;
        }

        Ok(verifier)
    }
}
