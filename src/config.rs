use std::env;

/// Per-IP rate limits for the public endpoints, in requests per minute.
#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    /// Order creation - makes an external gateway call per request.
    pub strict_rpm: u32,
    /// Verify and download resolution - crypto and DB work only.
    pub standard_rpm: u32,
}

/// Object storage connection settings for signed delivery URLs.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Full endpoint URL, e.g. "https://s3.ap-south-1.amazonaws.com"
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub dev_mode: bool,

    /// Gateway key id, returned to clients so they can open the payment UI.
    pub gateway_key_id: String,
    /// Gateway key secret: authenticates API calls and signs checkout
    /// confirmations ("{order_id}|{payment_id}").
    pub gateway_key_secret: String,
    /// Separate secret for webhook body signatures.
    pub webhook_secret: String,
    /// Bearer secret protecting the catalog lifecycle and sweep endpoints.
    pub operator_secret: String,

    pub storage: StorageConfig,
    /// Validity window of a signed download URL, in seconds.
    pub download_ttl_secs: u64,
    /// How long after payment a coming_soon purchase is expected to take
    /// before its asset is ready, in seconds.
    pub preparation_window_secs: i64,
    /// Days a trashed product is retained before the sweep may purge it.
    pub trash_retention_days: i64,

    pub rate_limits: RateLimits,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("STUDYSHELF_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env_parse("PORT", 3000);

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "studyshelf.db".to_string()),
            dev_mode,
            gateway_key_id: env::var("RAZORPAY_KEY_ID").unwrap_or_default(),
            gateway_key_secret: env::var("RAZORPAY_KEY_SECRET").unwrap_or_default(),
            webhook_secret: env::var("RAZORPAY_WEBHOOK_SECRET").unwrap_or_default(),
            operator_secret: env::var("OPERATOR_SECRET").unwrap_or_default(),
            storage: StorageConfig {
                endpoint: env::var("S3_ENDPOINT")
                    .unwrap_or_else(|_| "https://s3.ap-south-1.amazonaws.com".to_string()),
                region: env::var("S3_REGION").unwrap_or_else(|_| "ap-south-1".to_string()),
                bucket: env::var("S3_BUCKET").unwrap_or_else(|_| "studyshelf-assets".to_string()),
                access_key: env::var("S3_ACCESS_KEY").unwrap_or_default(),
                secret_key: env::var("S3_SECRET_KEY").unwrap_or_default(),
            },
            download_ttl_secs: env_parse("DOWNLOAD_TTL_SECS", 60),
            preparation_window_secs: env_parse("PREPARATION_WINDOW_HOURS", 48i64) * 3600,
            trash_retention_days: env_parse("TRASH_RETENTION_DAYS", 30),
            rate_limits: RateLimits {
                strict_rpm: env_parse("RATE_LIMIT_STRICT_RPM", 10),
                standard_rpm: env_parse("RATE_LIMIT_STANDARD_RPM", 30),
            },
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
