use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub service_callback: ServiceCallbackConfig,
    #[serde(default)]
    pub otel: OtelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `postgres` or `memory`. Memory is for tests and single-node dev only.
    #[serde(default = "default_store_backend")]
    pub backend: String,
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// `redis` or `memory`.
    #[serde(default = "default_queue_backend")]
    pub backend: String,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_redis_prefix")]
    pub redis_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Number of independent worker loops pulling from the task queue.
    #[serde(default = "default_worker_count")]
    pub count: usize,
    /// Attempts per task before it is declared a fatal failure.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed delay between retries of a failed task, in seconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: u64,
    /// Idle-poll interval when the queue is empty, in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub spryng: SpryngConfig,
    #[serde(default)]
    pub messagebox: MessageboxConfig,
    #[serde(default)]
    pub dvla: DvlaConfig,
    #[serde(default)]
    pub mailer: MailerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpryngConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_spryng_url")]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    /// Originator shown to the recipient.
    #[serde(default = "default_originator")]
    pub originator: String,
    #[serde(default = "default_provider_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageboxConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_messagebox_url")]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_short_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DvlaConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_dvla_url")]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    /// Where the print API posts delivery callbacks.
    #[serde(default)]
    pub callback_url: String,
    #[serde(default = "default_short_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_mailer_url")]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_mail_from")]
    pub sender: String,
    #[serde(default = "default_short_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceCallbackConfig {
    /// Delivery receipts are posted here when set; unset disables the hook.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub bearer_token: Option<String>,
    #[serde(default = "default_callback_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    6011
}

fn default_store_backend() -> String {
    "postgres".to_string()
}

fn default_database_url() -> String {
    "postgresql://localhost/notification_api".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_connect_timeout() -> u32 {
    5
}

fn default_queue_backend() -> String {
    "memory".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_prefix() -> String {
    "notify:tasks".to_string()
}

fn default_worker_count() -> usize {
    4
}

fn default_max_attempts() -> u32 {
    5
}

fn default_retry_delay() -> u64 {
    300
}

fn default_poll_interval() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

fn default_spryng_url() -> String {
    "https://rest.spryngsms.com/v1/messages".to_string()
}

fn default_originator() -> String {
    "NOTIFY".to_string()
}

fn default_provider_timeout() -> u64 {
    60
}

fn default_short_timeout() -> u64 {
    30
}

fn default_messagebox_url() -> String {
    "http://localhost:7071/berichten".to_string()
}

fn default_dvla_url() -> String {
    "https://print-api.example.com/print-request/v1/print/jobs".to_string()
}

fn default_mailer_url() -> String {
    "http://localhost:7072/messages".to_string()
}

fn default_mail_from() -> String {
    "no-reply@notifications.example.com".to_string()
}

fn default_callback_timeout() -> u64 {
    15
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "notify-delivery".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // SERVER_HOST, DATABASE_URL, QUEUE_BACKEND, PROVIDERS_SPRYNG_API_KEY, etc.
            .add_source(
                Environment::default()
                    .separator("_")
                    .try_parsing(true)
                    .list_separator(","),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            url: default_database_url(),
            pool_size: default_pool_size(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: default_queue_backend(),
            redis_url: default_redis_url(),
            redis_prefix: default_redis_prefix(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
            max_attempts: default_max_attempts(),
            retry_delay_seconds: default_retry_delay(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl Default for SpryngConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_spryng_url(),
            api_key: String::new(),
            originator: default_originator(),
            timeout_seconds: default_provider_timeout(),
        }
    }
}

impl Default for MessageboxConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_messagebox_url(),
            api_key: String::new(),
            timeout_seconds: default_short_timeout(),
        }
    }
}

impl Default for DvlaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_dvla_url(),
            api_key: String::new(),
            callback_url: String::new(),
            timeout_seconds: default_short_timeout(),
        }
    }
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_mailer_url(),
            api_key: String::new(),
            sender: default_mail_from(),
            timeout_seconds: default_short_timeout(),
        }
    }
}

impl Default for ServiceCallbackConfig {
    fn default() -> Self {
        Self {
            url: None,
            bearer_token: None,
            timeout_seconds: default_callback_timeout(),
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 6011);
    }

    #[test]
    fn test_worker_retry_defaults() {
        let worker = WorkerConfig::default();
        assert_eq!(worker.max_attempts, 5);
        assert_eq!(worker.retry_delay_seconds, 300);
    }

    #[test]
    fn test_provider_defaults() {
        let providers = ProvidersConfig::default();
        assert!(providers.spryng.enabled);
        assert_eq!(providers.spryng.timeout_seconds, 60);
        assert_eq!(providers.spryng.url, "https://rest.spryngsms.com/v1/messages");
    }
}
