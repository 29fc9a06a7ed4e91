use anyhow::{anyhow, Context, Result};
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8090;
pub const DEFAULT_JWKS_REFRESH_SECS: u64 = 300;
const MIN_JWKS_REFRESH_SECS: u64 = 60;
const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:5173",
    "http://localhost:8080",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct JwtSettings {
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub leeway_secs: u32,
    pub dev_public_key_pem: Option<String>,
    pub hs256_secret: Option<String>,
    pub jwks_url: Option<String>,
    pub jwks_refresh: Duration,
}

impl JwtSettings {
    pub fn has_key_source(&self) -> bool {
        self.dev_public_key_pem.is_some() || self.hs256_secret.is_some() || self.jwks_url.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub store: StoreBackend,
    pub database_url: Option<String>,
    pub run_migrations: bool,
    pub bind_addr: SocketAddr,
    pub jwt: JwtSettings,
    pub cors_origins: Vec<String>,
}

pub fn load_config() -> Result<ServiceConfig> {
    let store = env::var("BIN_STORE")
        .ok()
        .map(|value| parse_store_backend(&value))
        .transpose()
        .context("Failed to parse BIN_STORE")?
        .unwrap_or(StoreBackend::Postgres);

    let database_url = env::var("DATABASE_URL")
        .ok()
        .and_then(|value| normalize_optional(&value));
    if store == StoreBackend::Postgres && database_url.is_none() {
        return Err(anyhow!(
            "DATABASE_URL must be set when BIN_STORE=postgres (use BIN_STORE=memory for local runs)"
        ));
    }
    let run_migrations = bool_from_env("RUN_MIGRATIONS").unwrap_or(false);

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let ip: IpAddr = host
        .trim()
        .parse()
        .with_context(|| format!("Invalid HOST '{host}'"))?;
    let port = match env::var("PORT") {
        Ok(value) => value
            .trim()
            .parse::<u16>()
            .with_context(|| format!("Invalid PORT '{value}'"))?,
        Err(_) => DEFAULT_PORT,
    };

    let jwt = load_jwt_settings()?;

    let cors_origins = env::var("CORS_ALLOWED_ORIGINS")
        .ok()
        .map(|value| parse_list(&value))
        .filter(|origins| !origins.is_empty())
        .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect());

    Ok(ServiceConfig {
        store,
        database_url,
        run_migrations,
        bind_addr: SocketAddr::from((ip, port)),
        jwt,
        cors_origins,
    })
}

fn load_jwt_settings() -> Result<JwtSettings> {
    let leeway_secs = match env::var("JWT_LEEWAY_SECS") {
        Ok(value) => value
            .trim()
            .parse::<u32>()
            .with_context(|| format!("Invalid JWT_LEEWAY_SECS '{value}'"))?,
        Err(_) => 30,
    };

    let dev_public_key_pem = match env::var("JWT_DEV_PUBLIC_KEY_PEM")
        .ok()
        .and_then(|value| normalize_optional(&value))
    {
        Some(pem) => Some(pem),
        None => match env::var("JWT_DEV_PUBLIC_KEY_PATH")
            .ok()
            .and_then(|value| normalize_optional(&value))
        {
            Some(path) => Some(
                std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read JWT_DEV_PUBLIC_KEY_PATH '{path}'"))?,
            ),
            None => None,
        },
    };

    let jwks_refresh_secs = env::var("JWKS_REFRESH_SECS")
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_JWKS_REFRESH_SECS)
        .max(MIN_JWKS_REFRESH_SECS);

    Ok(JwtSettings {
        issuer: env::var("JWT_ISSUER").ok().and_then(|v| normalize_optional(&v)),
        audience: env::var("JWT_AUDIENCE").ok().and_then(|v| normalize_optional(&v)),
        leeway_secs,
        dev_public_key_pem,
        hs256_secret: env::var("JWT_HS256_SECRET").ok().and_then(|v| normalize_optional(&v)),
        jwks_url: env::var("JWT_JWKS_URL").ok().and_then(|v| normalize_optional(&v)),
        jwks_refresh: Duration::from_secs(jwks_refresh_secs),
    })
}

fn parse_store_backend(value: &str) -> Result<StoreBackend> {
    match value.trim().to_ascii_lowercase().as_str() {
        "postgres" | "pg" => Ok(StoreBackend::Postgres),
        "memory" | "mem" => Ok(StoreBackend::Memory),
        other => Err(anyhow!(
            "Unsupported store backend '{other}'. Use postgres or memory."
        )),
    }
}

fn bool_from_env(key: &str) -> Option<bool> {
    env::var(key).ok().map(|value| {
        matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .filter_map(normalize_optional)
        .collect()
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
