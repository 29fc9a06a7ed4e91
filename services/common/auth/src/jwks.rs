use jsonwebtoken::Algorithm;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{AuthError, AuthResult};
use crate::verifier::VerifierKey;

#[derive(Clone)]
pub struct JwksFetcher {
    client: Client,
    url: String,
}

impl JwksFetcher {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), url)
    }

    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn fetch(&self) -> AuthResult<Vec<(String, VerifierKey)>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|err| AuthError::JwksFetch(err.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::JwksFetch(format!(
                "HTTP {} from {}",
                response.status(),
                self.url
            )));
        }

        let body: JwksResponse = response
            .json()
            .await
            .map_err(|err| AuthError::JwksDecode(err.to_string()))?;

        body.keys.into_iter().map(JwkEntry::into_key).collect()
    }
}

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<JwkEntry>,
}

#[derive(Debug, Deserialize)]
struct JwkEntry {
    kid: Option<String>,
    kty: Option<String>,
    alg: Option<String>,
    n: Option<String>,
    e: Option<String>,
}

impl JwkEntry {
    fn into_key(self) -> AuthResult<(String, VerifierKey)> {
        let kid = self.kid.ok_or(AuthError::JwksMissingKid)?;
        let kty = self.kty.unwrap_or_else(|| "RSA".to_string());
        if kty != "RSA" {
            return Err(AuthError::JwksUnsupportedKey { kid, kty });
        }

        let algorithm = match self.alg.as_deref() {
            None | Some("RS256") => Algorithm::RS256,
            Some("RS384") => Algorithm::RS384,
            Some("RS512") => Algorithm::RS512,
            Some(other) => {
                return Err(AuthError::JwksUnsupportedKey {
                    kid,
                    kty: format!("{kty}/{other}"),
                })
            }
        };

        let (Some(modulus), Some(exponent)) = (self.n, self.e) else {
            return Err(AuthError::JwksMissingComponents(kid));
        };
        let key = jsonwebtoken::DecodingKey::from_rsa_components(&modulus, &exponent)
            .map_err(|err| AuthError::KeyParse(kid.clone(), err.to_string()))?;

        Ok((kid, VerifierKey { key, algorithm }))
    }
}
