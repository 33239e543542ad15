use tradejournal::config::{parse_duration, Config, MockCredentials, UploadLimits};
use std::env;
use std::time::Duration;

// helper to clear env vars
fn clear_env() {
    for key in [
        "APP_ENV",
        "HTTP_HOST",
        "HTTP_PORT",
        "WORKER_THREADS",
        "UPLOAD_DIR",
        "FRONTEND_DIR",
        "MAX_UPLOAD_SIZE_BYTES",
        "CHUNK_SIZE_BYTES",
        "UPLOAD_SESSION_TTL",
        "UPLOAD_SWEEP_INTERVAL",
        "CORS_ORIGINS",
        "RATE_LIMIT_PER_SECOND",
        "RATE_LIMIT_BURST",
        "MOCK_AUTH_TOKEN",
        "MOCK_AUTH_PASSWORD",
    ] {
        env::remove_var(key);
    }
}

#[test]
fn test_hash_token() {
    let token = "secret";
    let hash = Config::hash_token(token);
    // sha256 hex string is 64 chars
    assert_eq!(hash.len(), 64);

    // deterministic
    assert_eq!(hash, Config::hash_token(token));

    // different tokens produce different hashes
    assert_ne!(hash, Config::hash_token("other"));
}

#[test]
fn test_parse_duration() {
    assert_eq!(parse_duration("90"), Some(Duration::from_secs(90)));
    assert_eq!(parse_duration("90s"), Some(Duration::from_secs(90)));
    assert_eq!(parse_duration("15m"), Some(Duration::from_secs(15 * 60)));
    assert_eq!(parse_duration("24h"), Some(Duration::from_secs(24 * 3600)));
    assert_eq!(parse_duration("7d"), Some(Duration::from_secs(7 * 86400)));
    assert_eq!(parse_duration(" 0 "), Some(Duration::ZERO));
    assert_eq!(parse_duration("h"), None);
    assert_eq!(parse_duration("10w"), None);
    assert_eq!(parse_duration("-5s"), None);
}

#[test]
fn test_config_behavior() {
    // Run these sequentially to avoid race conditions with environment variables

    // 1. Test Defaults
    clear_env();

    let config = Config::from_env();

    assert_eq!(config.app_env, "development");
    assert!(!config.is_production());
    assert_eq!(config.http_host, "127.0.0.1");
    assert_eq!(config.http_port, 8080);
    assert_eq!(config.worker_threads, 8);
    assert_eq!(config.upload_dir.to_str().unwrap(), "uploads");
    assert_eq!(config.max_upload_size, 5 * 1024 * 1024 * 1024);
    assert_eq!(config.chunk_size, 2 * 1024 * 1024);
    assert_eq!(config.upload_session_ttl, Duration::from_secs(24 * 3600));
    assert_eq!(config.upload_sweep_interval, Duration::from_secs(600));
    assert_eq!(config.cors_origins.len(), 2);
    assert_eq!(config.mock_auth.username, "admin");
    assert_eq!(config.mock_auth.password, "123456");
    assert_eq!(config.mock_auth.token, MockCredentials::default().token);

    let limits = UploadLimits::from(&config);
    assert_eq!(limits.max_upload_size, config.max_upload_size);
    assert_eq!(limits.max_chunk_size, config.chunk_size);

    // 2. Test From Env
    clear_env();

    env::set_var("APP_ENV", "production");
    env::set_var("UPLOAD_DIR", "/tmp/test_uploads");
    env::set_var("HTTP_PORT", "9090");
    env::set_var("CHUNK_SIZE_BYTES", "1048576");
    env::set_var("UPLOAD_SESSION_TTL", "2h");
    env::set_var("CORS_ORIGINS", "https://journal.example, ,");
    env::set_var("MOCK_AUTH_TOKEN", "supersecret");
    env::set_var("MOCK_AUTH_PASSWORD", "hunter2");

    let config = Config::from_env();

    assert!(config.is_production());
    assert_eq!(config.upload_dir.to_str().unwrap(), "/tmp/test_uploads");
    assert_eq!(config.http_port, 9090);
    assert_eq!(config.chunk_size, 1024 * 1024);
    assert_eq!(config.upload_session_ttl, Duration::from_secs(7200));
    assert_eq!(config.cors_origins, vec!["https://journal.example".to_string()]);
    assert_eq!(config.mock_auth.token, "supersecret");
    assert_eq!(config.mock_auth.password, "hunter2");
    assert_eq!(config.mock_auth.username, "admin");

    // 3. Invalid values fall back to defaults
    clear_env();

    env::set_var("HTTP_PORT", "not-a-port");
    env::set_var("UPLOAD_SESSION_TTL", "soon");

    let config = Config::from_env();
    assert_eq!(config.http_port, 8080);
    assert_eq!(config.upload_session_ttl, Duration::from_secs(24 * 3600));

    // Cleanup
    clear_env();
}
