#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use bin_service::app::{build_router, AppState};
use bin_service::store::MemoryStore;
use chrono::Utc;
use common_auth::{JwtConfig, JwtVerifier};
use common_observability::BinMetrics;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding};
use rsa::rand_core::OsRng;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};
use tower::ServiceExt;

pub const ISSUER: &str = "https://auth.test";
pub const AUDIENCE: &str = "authenticated";
const KID: &str = "local-dev";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub metrics: Arc<BinMetrics>,
    encoding: EncodingKey,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub error_code: Option<String>,
    pub body: Value,
}

impl TestApp {
    pub async fn new() -> Self {
        let private_key = RsaPrivateKey::new(&mut OsRng, 2048).expect("generate rsa key");
        let private_pem = private_key
            .to_pkcs1_pem(LineEnding::LF)
            .expect("private pem");
        let public_pem = private_key
            .to_public_key()
            .to_pkcs1_pem(LineEnding::LF)
            .expect("public pem");

        let verifier = JwtVerifier::builder(JwtConfig::new(
            Some(ISSUER.to_string()),
            Some(AUDIENCE.to_string()),
        ))
        .with_rsa_pem(KID, public_pem.as_bytes())
        .expect("public key")
        .build()
        .await
        .expect("verifier");

        let store = Arc::new(MemoryStore::new());
        let metrics = Arc::new(BinMetrics::new().expect("metrics"));
        let state = AppState::new(store.clone(), store.clone(), Arc::new(verifier), metrics.clone());
        let router = build_router(state, &["http://localhost:5173".to_string()]);

        Self {
            router,
            store,
            metrics,
            encoding: EncodingKey::from_rsa_pem(private_pem.as_bytes()).expect("encoding key"),
        }
    }

    pub fn token(&self, subject: &str, role: &str) -> String {
        let now = Utc::now().timestamp();
        let claims = json!({
            "sub": subject,
            "app_metadata": { "role": role },
            "iss": ISSUER,
            "aud": AUDIENCE,
            "iat": now,
            "exp": now + 600,
        });
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(KID.into());
        encode(&header, &claims, &self.encoding).expect("sign token")
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let error_code = response
            .headers()
            .get("x-error-code")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        TestResponse {
            status,
            error_code,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Method::GET, uri, None, None).await
    }

    pub async fn report(&self, bin_id: &str, fill_level: f64) -> TestResponse {
        self.send(
            Method::POST,
            "/sensor/update",
            None,
            Some(json!({ "binId": bin_id, "fillLevel": fill_level })),
        )
        .await
    }
}
