use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sha2::{Digest, Sha256};

const DEFAULT_MAX_UPLOAD_SIZE: u64 = 5 * 1024 * 1024 * 1024; // 5GB
const DEFAULT_CHUNK_SIZE: u64 = 2 * 1024 * 1024; // 2MB
const DEFAULT_MOCK_PASSWORD: &str = "123456";
const DEFAULT_MOCK_TOKEN: &str = "mock_token_123456";

/// application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// deployment environment (development, production, ...)
    pub app_env: String,
    /// http listen address
    pub http_host: String,
    /// http listen port
    pub http_port: u16,
    /// number of tokio worker threads
    pub worker_threads: usize,
    /// where assembled uploads land; chunk scratch space lives under `.chunks/`
    pub upload_dir: PathBuf,
    /// static frontend assets served under /static
    pub frontend_dir: PathBuf,
    /// largest file an upload session may declare, in bytes
    pub max_upload_size: u64,
    /// default and maximum chunk size, in bytes
    pub chunk_size: u64,
    /// sessions older than this are swept; zero disables sweeping
    pub upload_session_ttl: Duration,
    /// how often the sweeper runs
    pub upload_sweep_interval: Duration,
    /// cors allowed origins (comma-separated)
    pub cors_origins: Vec<String>,
    /// rate limit: sustained requests per second per client
    pub rate_limit_per_second: u64,
    /// rate limit: burst size per client
    pub rate_limit_burst: u32,
    /// account and bearer token of the mock auth layer
    pub mock_auth: MockCredentials,
}

impl Config {
    /// load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        // parse cors origins
        let cors_origins = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173,http://127.0.0.1:5173".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            app_env: env_or("APP_ENV", "development"),
            http_host: env_or("HTTP_HOST", "127.0.0.1"),
            http_port: env_parse("HTTP_PORT", 8080),
            worker_threads: env_parse("WORKER_THREADS", 8),
            upload_dir: env_or("UPLOAD_DIR", "uploads").into(),
            frontend_dir: env_or("FRONTEND_DIR", "frontend/static").into(),
            max_upload_size: env_parse("MAX_UPLOAD_SIZE_BYTES", DEFAULT_MAX_UPLOAD_SIZE),
            chunk_size: env_parse("CHUNK_SIZE_BYTES", DEFAULT_CHUNK_SIZE),
            upload_session_ttl: env_duration("UPLOAD_SESSION_TTL", Duration::from_secs(24 * 60 * 60)),
            upload_sweep_interval: env_duration("UPLOAD_SWEEP_INTERVAL", Duration::from_secs(10 * 60)),
            cors_origins,
            rate_limit_per_second: env_parse("RATE_LIMIT_PER_SECOND", 50),
            rate_limit_burst: env_parse("RATE_LIMIT_BURST", 100),
            mock_auth: MockCredentials {
                password: env_or("MOCK_AUTH_PASSWORD", DEFAULT_MOCK_PASSWORD),
                token: env_or("MOCK_AUTH_TOKEN", DEFAULT_MOCK_TOKEN),
                ..MockCredentials::default()
            },
        }
    }

    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }

    // hash a bearer token using sha256
    pub fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// the single account known to the mock login
#[derive(Debug, Clone)]
pub struct MockCredentials {
    pub username: String,
    pub password: String,
    /// handed out on login and accepted as `Authorization: Bearer <token>`
    pub token: String,
}

impl Default for MockCredentials {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: DEFAULT_MOCK_PASSWORD.to_string(),
            token: DEFAULT_MOCK_TOKEN.to_string(),
        }
    }
}

/// upload limits handed to the session manager
#[derive(Debug, Clone)]
pub struct UploadLimits {
    pub max_upload_size: u64,
    pub max_chunk_size: u64,
}

impl From<&Config> for UploadLimits {
    fn from(config: &Config) -> Self {
        Self {
            max_upload_size: config.max_upload_size,
            max_chunk_size: config.chunk_size.max(1),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => v,
        _ => default.to_string(),
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => v.parse().unwrap_or_else(|_| {
            tracing::warn!("invalid value for {}={:?}, using default {}", key, v, default);
            default
        }),
        _ => default,
    }
}

fn env_duration(key: &str, default: Duration) -> Duration {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => parse_duration(&v).unwrap_or_else(|| {
            tracing::warn!("invalid duration for {}={:?}, using default {:?}", key, v, default);
            default
        }),
        _ => default,
    }
}

/// parse `90`, `90s`, `15m`, `24h` or `7d` into a duration
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let split = raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let value: u64 = digits.parse().ok()?;
    let secs = match unit {
        "" | "s" => value,
        "m" => value.checked_mul(60)?,
        "h" => value.checked_mul(60 * 60)?,
        "d" => value.checked_mul(24 * 60 * 60)?,
        _ => return None,
    };
    Some(Duration::from_secs(secs))
}
