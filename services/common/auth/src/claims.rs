use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};
use crate::roles::ROLE_USER;

/// Caller identity and role extracted from a verified bearer token.
#[derive(Debug, Clone, Serialize)]
pub struct Claims {
    pub subject: String,
    pub role: String,
    pub email: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub issued_at: Option<DateTime<Utc>>,
    pub issuer: Option<String>,
    pub audience: Vec<String>,
    pub raw: serde_json::Value,
}

impl Claims {
    pub fn has_role(&self, role: &str) -> bool {
        self.role.eq_ignore_ascii_case(role)
    }
}

#[derive(Debug, Deserialize)]
struct ClaimsRepr {
    sub: String,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    app_metadata: Option<MetadataRepr>,
    #[serde(default)]
    user_metadata: Option<MetadataRepr>,
    exp: i64,
    #[serde(default)]
    iat: Option<i64>,
    #[serde(default)]
    iss: Option<String>,
    #[serde(default)]
    aud: Option<AudienceRepr>,
}

#[derive(Debug, Default, Deserialize)]
struct MetadataRepr {
    #[serde(default)]
    role: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AudienceRepr {
    Single(String),
    Many(Vec<String>),
}

impl TryFrom<ClaimsRepr> for Claims {
    type Error = AuthError;

    fn try_from(value: ClaimsRepr) -> AuthResult<Self> {
        let subject = value.sub.trim().to_string();
        if subject.is_empty() {
            return Err(AuthError::InvalidClaim("sub", value.sub));
        }

        let expires_at = Utc
            .timestamp_opt(value.exp, 0)
            .single()
            .ok_or_else(|| AuthError::InvalidClaim("exp", value.exp.to_string()))?;

        let issued_at = match value.iat {
            Some(iat) => Some(
                Utc.timestamp_opt(iat, 0)
                    .single()
                    .ok_or_else(|| AuthError::InvalidClaim("iat", iat.to_string()))?,
            ),
            None => None,
        };

        // Application roles live in metadata; the top-level claim is often the
        // identity provider's generic "authenticated".
        let role = value
            .app_metadata
            .and_then(|meta| meta.role)
            .or_else(|| value.user_metadata.and_then(|meta| meta.role))
            .or(value.role)
            .map(|role| role.trim().to_ascii_lowercase())
            .filter(|role| !role.is_empty())
            .unwrap_or_else(|| ROLE_USER.to_string());

        let audience = match value.aud {
            Some(AudienceRepr::Single(item)) => vec![item],
            Some(AudienceRepr::Many(items)) => items,
            None => Vec::new(),
        };

        Ok(Self {
            subject,
            role,
            email: value.email,
            expires_at,
            issued_at,
            issuer: value.iss,
            audience,
            raw: serde_json::Value::Null,
        })
    }
}

impl TryFrom<serde_json::Value> for Claims {
    type Error = AuthError;

    fn try_from(value: serde_json::Value) -> AuthResult<Self> {
        let repr: ClaimsRepr = serde_json::from_value(value.clone())
            .map_err(|err| AuthError::InvalidJson(err.to_string()))?;
        let mut claims = Claims::try_from(repr)?;
        claims.raw = value;
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn app_metadata_role_wins_over_top_level_role() {
        let claims = Claims::try_from(json!({
            "sub": "user-1",
            "role": "authenticated",
            "app_metadata": { "role": "Officer" },
            "exp": 4_102_444_800i64,
        }))
        .expect("claims");
        assert_eq!(claims.role, "officer");
        assert!(claims.has_role("officer"));
        assert!(!claims.has_role("admin"));
    }

    #[test]
    fn missing_role_falls_back_to_user() {
        let claims = Claims::try_from(json!({ "sub": "user-2", "exp": 4_102_444_800i64 }))
            .expect("claims");
        assert_eq!(claims.role, ROLE_USER);
        assert!(claims.audience.is_empty());
    }

    #[test]
    fn blank_subject_is_rejected() {
        let err = Claims::try_from(json!({ "sub": "  ", "exp": 4_102_444_800i64 }))
            .expect_err("blank subject");
        assert!(matches!(err, AuthError::InvalidClaim("sub", _)));
    }

    #[test]
    fn audience_accepts_single_and_many() {
        let single = Claims::try_from(json!({ "sub": "a", "exp": 1, "aud": "authenticated" }))
            .expect("single");
        assert_eq!(single.audience, vec!["authenticated".to_string()]);
        let many = Claims::try_from(json!({ "sub": "a", "exp": 1, "aud": ["x", "y"] }))
            .expect("many");
        assert_eq!(many.audience.len(), 2);
    }
}
