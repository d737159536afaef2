use anyhow::{anyhow, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub taskq: TaskQueueConfig,
    #[serde(default)]
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
    /// Public base URL used in outgoing links (activation mails). Falls back to the request host.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8080, worker_threads: Some(4), base_url: None }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_secs: u64,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
    #[serde(default)]
    pub sqlx_logging: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            max_lifetime_secs: default_max_lifetime(),
            acquire_timeout_secs: default_acquire_timeout(),
            sqlx_logging: false,
        }
    }
}

fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 30 }
fn default_idle_timeout() -> u64 { 600 }
fn default_max_lifetime() -> u64 { 3600 }
fn default_acquire_timeout() -> u64 { 30 }

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC signing key. No default: `JWT_SECRET` or `auth.jwt_secret` must provide it.
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default = "default_access_minutes")]
    pub access_token_expire_minutes: i64,
    #[serde(default = "default_refresh_days")]
    pub refresh_token_expire_days: i64,
    /// Paths served without a bearer token. Compared with trailing slashes stripped.
    #[serde(default = "default_exclude_paths")]
    pub exclude_paths: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            access_token_expire_minutes: default_access_minutes(),
            refresh_token_expire_days: default_refresh_days(),
            exclude_paths: default_exclude_paths(),
        }
    }
}

/// Placeholder secrets copied from sample files are as good as none.
const PLACEHOLDER_SECRETS: &[&str] = &["dev-secret-change-me", "change-me", "changeme", "secret"];
fn default_access_minutes() -> i64 { 30 }
fn default_refresh_days() -> i64 { 7 }

pub fn default_exclude_paths() -> Vec<String> {
    [
        "/",
        "/the-index",
        "/health",
        "/health/check",
        "/api/v1/users/registration",
        "/api/v1/users/login",
        "/api/v1/users/token/refresh",
        "/api-docs/openapi.json",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "wildcard")]
    pub allow_origins: Vec<String>,
    #[serde(default = "wildcard")]
    pub allow_methods: Vec<String>,
    #[serde(default = "wildcard")]
    pub allow_headers: Vec<String>,
    #[serde(default)]
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self { allow_origins: wildcard(), allow_methods: wildcard(), allow_headers: wildcard(), allow_credentials: false }
    }
}

fn wildcard() -> Vec<String> { vec!["*".into()] }

impl CorsConfig {
    pub fn allows_any_origin(&self) -> bool {
        self.allow_origins.iter().any(|o| o == "*")
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BrokerKind {
    #[default]
    Memory,
    Redis,
}

impl std::str::FromStr for BrokerKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "inmemory" => Ok(BrokerKind::Memory),
            "redis" | "redis-list" => Ok(BrokerKind::Redis),
            other => Err(anyhow!("unsupported taskq broker: {other}")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskQueueConfig {
    #[serde(default)]
    pub broker: BrokerKind,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    #[serde(default = "default_schedule_prefix")]
    pub schedule_prefix: String,
    /// Run the worker and scheduler loops inside the `serve` process.
    #[serde(default = "default_true")]
    pub embedded: bool,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_tick")]
    pub scheduler_tick_ms: u64,
    #[serde(default = "default_result_ttl")]
    pub result_ttl_secs: u64,
}

impl Default for TaskQueueConfig {
    fn default() -> Self {
        Self {
            broker: BrokerKind::Memory,
            redis_url: default_redis_url(),
            key_prefix: default_key_prefix(),
            schedule_prefix: default_schedule_prefix(),
            embedded: true,
            poll_interval_ms: default_poll_interval(),
            scheduler_tick_ms: default_tick(),
            result_ttl_secs: default_result_ttl(),
        }
    }
}

fn default_redis_url() -> String { "redis://localhost:6379/0".into() }
fn default_key_prefix() -> String { "taskq".into() }
fn default_schedule_prefix() -> String { "taskq:schedules".into() }
fn default_true() -> bool { true }
fn default_poll_interval() -> u64 { 500 }
fn default_tick() -> u64 { 1000 }
fn default_result_ttl() -> u64 { 3600 }

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    #[serde(default = "default_mail_from")]
    pub from_address: String,
    #[serde(default = "default_mail_name")]
    pub from_name: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self { from_address: default_mail_from(), from_name: default_mail_name() }
    }
}

fn default_mail_from() -> String { "no-reply@example.com".into() }
fn default_mail_name() -> String { "User Backend".into() }

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let cfg: AppConfig = toml::from_str(&content)?;
    Ok(cfg)
}

fn parse_var<T>(get: impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get(key).map(|v| v.trim().parse::<T>().map_err(|e| anyhow!("invalid {key}={v:?}: {e}"))).transpose()
}

/// Build a database URL from the `DB_*` parts, defaulting each one.
pub fn compose_database_url(lookup: impl Fn(&str) -> Option<String>) -> String {
    let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
    format!(
        "{}://{}:{}@{}:{}/{}",
        get("DB_CONNECTION", "postgresql"),
        get("DB_USER", "postgres"),
        get("DB_PASSWORD", ""),
        get("DB_HOST", "localhost"),
        get("DB_PORT", "5432"),
        get("DB_NAME", "postgres"),
    )
}

impl AppConfig {
    /// `.env` + optional TOML file + environment overrides, then validated.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let mut cfg = match load_default() {
            Ok(cfg) => cfg,
            Err(e) => match e.downcast_ref::<std::io::Error>() {
                Some(io) if io.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
                _ => return Err(e),
            },
        };
        cfg.apply_env(|k| std::env::var(k).ok())?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    /// Overlay values from an environment-like lookup. Unparsable values are errors naming the variable.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let non_empty = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("SERVER_HOST") { self.server.host = v; }
        if let Some(p) = parse_var(&non_empty, "SERVER_PORT")? { self.server.port = p; }
        if let Some(w) = parse_var(&non_empty, "TOKIO_WORKER_THREADS")? { self.server.worker_threads = Some(w); }
        if let Some(v) = non_empty("BASE_URL") { self.server.base_url = Some(v); }

        if let Some(url) = non_empty("DATABASE_URL") {
            self.database.url = url;
        } else if self.database.url.trim().is_empty() && non_empty("DB_HOST").is_some() {
            self.database.url = compose_database_url(&non_empty);
        }

        if let Some(v) = non_empty("JWT_SECRET") { self.auth.jwt_secret = v; }
        if let Some(m) = parse_var(&non_empty, "JWT_ACCESS_TOKEN_EXPIRE_MINUTES")? { self.auth.access_token_expire_minutes = m; }
        if let Some(d) = parse_var(&non_empty, "JWT_REFRESH_TOKEN_EXPIRE_DAYS")? { self.auth.refresh_token_expire_days = d; }

        if let Some(v) = non_empty("CORS_ALLOW_ORIGINS") {
            self.cors.allow_origins = v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }

        if let Some(b) = parse_var(&non_empty, "TASKQ_BROKER")? { self.taskq.broker = b; }
        if let Some(v) = non_empty("REDIS_URL") { self.taskq.redis_url = v; }
        if let Some(v) = non_empty("TASKQ_KEY_PREFIX") { self.taskq.key_prefix = v; }
        if let Some(v) = non_empty("TASKQ_SCHEDULE_PREFIX") { self.taskq.schedule_prefix = v; }
        if let Some(v) = non_empty("TASKQ_EMBEDDED") {
            self.taskq.embedded = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }

        if let Some(v) = non_empty("MAIL_FROM") { self.mail.from_address = v; }
        Ok(())
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        self.database.normalize_from_env();
        self.database.validate()?;
        self.auth.validate()?;
        self.taskq.validate()?;
        Ok(())
    }
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be within 1..=65535"));
        }
        match self.worker_threads {
            Some(0) | None => self.worker_threads = Some(4),
            Some(_) => {}
        }
        if let Some(base) = &self.base_url {
            self.base_url = Some(base.trim_end_matches('/').to_string());
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl DatabaseConfig {
    pub fn normalize_from_env(&mut self) {
        if self.url.trim().is_empty() {
            if let Ok(url) = std::env::var("DATABASE_URL") {
                self.url = url;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(anyhow!("database.url is empty; set it in config.toml, DATABASE_URL or DB_* variables"));
        }
        let lower = self.url.to_lowercase();
        if !(lower.starts_with("postgresql://") || lower.starts_with("postgres://")) {
            return Err(anyhow!("database.url must start with postgresql:// or postgres://"));
        }
        if self.min_connections == 0 {
            return Err(anyhow!("database.min_connections must be >= 1"));
        }
        if self.max_connections < self.min_connections {
            return Err(anyhow!("database.max_connections must be >= min_connections"));
        }
        if self.connect_timeout_secs == 0 || self.acquire_timeout_secs == 0 {
            return Err(anyhow!("database timeouts must be positive seconds"));
        }
        Ok(())
    }
}

impl AuthConfig {
    pub fn validate(&self) -> Result<()> {
        let secret = self.jwt_secret.trim();
        if secret.is_empty() {
            return Err(anyhow!("auth.jwt_secret must be set (JWT_SECRET)"));
        }
        if PLACEHOLDER_SECRETS.iter().any(|p| secret.eq_ignore_ascii_case(p)) {
            return Err(anyhow!("auth.jwt_secret is a placeholder; set a real JWT_SECRET"));
        }
        if self.access_token_expire_minutes <= 0 || self.refresh_token_expire_days <= 0 {
            return Err(anyhow!("token lifetimes must be positive"));
        }
        Ok(())
    }
}

impl TaskQueueConfig {
    pub fn validate(&self) -> Result<()> {
        if self.broker == BrokerKind::Redis && self.redis_url.trim().is_empty() {
            return Err(anyhow!("taskq.redis_url is required for the redis broker"));
        }
        if self.key_prefix.trim().is_empty() || self.schedule_prefix.trim().is_empty() {
            return Err(anyhow!("taskq key prefixes must not be empty"));
        }
        if self.poll_interval_ms == 0 || self.scheduler_tick_ms == 0 {
            return Err(anyhow!("taskq intervals must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [server]
            host = "0.0.0.0"
            port = 9000

            [database]
            url = "postgres://u:p@db:5432/app"

            [taskq]
            broker = "redis"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.database.max_connections, 10);
        assert_eq!(cfg.taskq.broker, BrokerKind::Redis);
        assert_eq!(cfg.taskq.schedule_prefix, "taskq:schedules");
        assert_eq!(cfg.auth.access_token_expire_minutes, 30);
        assert!(cfg.auth.exclude_paths.iter().any(|p| p == "/api/v1/users/login"));
    }

    #[test]
    fn composes_database_url_from_parts() {
        let url = compose_database_url(lookup_from(&[("DB_HOST", "db"), ("DB_USER", "app"), ("DB_PASSWORD", "pw"), ("DB_NAME", "users")]));
        assert_eq!(url, "postgresql://app:pw@db:5432/users");
    }

    #[test]
    fn env_overrides_take_precedence() {
        let mut cfg = AppConfig::default();
        cfg.apply_env(lookup_from(&[
            ("SERVER_PORT", "7000"),
            ("DATABASE_URL", "postgres://x:y@h/db"),
            ("JWT_SECRET", "s3cret"),
            ("CORS_ALLOW_ORIGINS", "http://a.test, http://b.test"),
            ("TASKQ_BROKER", "redis"),
            ("TASKQ_EMBEDDED", "false"),
        ]))
        .unwrap();
        assert_eq!(cfg.server.port, 7000);
        assert_eq!(cfg.database.url, "postgres://x:y@h/db");
        assert_eq!(cfg.auth.jwt_secret, "s3cret");
        assert_eq!(cfg.cors.allow_origins, vec!["http://a.test", "http://b.test"]);
        assert!(!cfg.cors.allows_any_origin());
        assert_eq!(cfg.taskq.broker, BrokerKind::Redis);
        assert!(!cfg.taskq.embedded);
    }

    #[test]
    fn db_parts_used_only_without_database_url() {
        let mut cfg = AppConfig::default();
        cfg.apply_env(lookup_from(&[("DB_HOST", "pg"), ("DB_NAME", "app")])).unwrap();
        assert_eq!(cfg.database.url, "postgresql://postgres:@pg:5432/app");
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut db = DatabaseConfig { url: "mysql://x".into(), ..Default::default() };
        assert!(db.validate().is_err());
        db.url = "postgres://u@h/d".into();
        assert!(db.validate().is_ok());
        db.min_connections = 5;
        db.max_connections = 2;
        assert!(db.validate().is_err());

        let auth = AuthConfig { jwt_secret: " ".into(), ..Default::default() };
        assert!(auth.validate().is_err());

        let mut server = ServerConfig { port: 0, ..Default::default() };
        assert!(server.normalize().is_err());
    }

    #[test]
    fn unparsable_env_values_are_rejected() {
        let mut cfg = AppConfig::default();
        let err = cfg.apply_env(lookup_from(&[("TASKQ_BROKER", "kafka")])).unwrap_err();
        assert!(err.to_string().contains("TASKQ_BROKER"), "{err}");
        assert_eq!(cfg.taskq.broker, BrokerKind::Memory);

        for (key, value) in [
            ("SERVER_PORT", "eighty"),
            ("TOKIO_WORKER_THREADS", "-1"),
            ("JWT_ACCESS_TOKEN_EXPIRE_MINUTES", "30m"),
            ("JWT_REFRESH_TOKEN_EXPIRE_DAYS", "week"),
        ] {
            let err = AppConfig::default().apply_env(lookup_from(&[(key, value)])).unwrap_err();
            assert!(err.to_string().contains(key), "{err}");
        }
    }

    #[test]
    fn jwt_secret_has_no_usable_default() {
        assert!(AppConfig::default().auth.jwt_secret.is_empty());
        assert!(AuthConfig::default().validate().is_err());

        let placeholder = AuthConfig { jwt_secret: "dev-secret-change-me".into(), ..Default::default() };
        assert!(placeholder.validate().is_err());

        let real = AuthConfig { jwt_secret: "b7f1c2e0-real-signing-key".into(), ..Default::default() };
        assert!(real.validate().is_ok());

        let mut cfg = AppConfig::default();
        cfg.database.url = "postgres://u@h/d".into();
        assert!(cfg.normalize_and_validate().is_err());
        cfg.apply_env(lookup_from(&[("JWT_SECRET", "b7f1c2e0-real-signing-key")])).unwrap();
        assert!(cfg.normalize_and_validate().is_ok());
    }

    #[test]
    fn broker_kind_parses_known_values() {
        assert_eq!("Redis".parse::<BrokerKind>().unwrap(), BrokerKind::Redis);
        assert_eq!("memory".parse::<BrokerKind>().unwrap(), BrokerKind::Memory);
        assert!("kafka".parse::<BrokerKind>().is_err());
    }
}
