//! Environment-driven configuration, read once at boot.

use std::time::Duration;

/// Database and external-gateway configuration loaded from environment
/// variables. Every field has a sane default except the ones that must
/// name a real external endpoint.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub mail: MailConfig,
    pub llm: LlmConfig,
    pub browser: BrowserConfig,
    pub admin_bearer_token: String,
    pub job_runtime: JobRuntimeConfig,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub max_concurrent_requests: usize,
    pub max_requests_per_minute: u32,
}

#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub base_url: String,
    pub bearer_token: String,
}

#[derive(Debug, Clone)]
pub struct JobRuntimeConfig {
    pub poll_interval: Duration,
    pub idle_poll_interval: Duration,
    pub probe_interval: Duration,
    pub usage_reset_interval: Duration,
}

impl Default for JobRuntimeConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            idle_poll_interval: Duration::from_secs(10),
            probe_interval: Duration::from_secs(15 * 60),
            usage_reset_interval: Duration::from_secs(60 * 60),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/apply_orchestrator".into());

        let mail = MailConfig {
            base_url: env_or("MAIL_PROVIDER_BASE_URL", "https://www.googleapis.com/gmail/v1"),
            client_id: env_or("MAIL_OAUTH_CLIENT_ID", ""),
            client_secret: env_or("MAIL_OAUTH_CLIENT_SECRET", ""),
        };

        let llm = LlmConfig {
            base_url: env_or("LLM_BASE_URL", "https://api.openai.com/v1"),
            api_key: env_or("LLM_API_KEY", ""),
            model: env_or("LLM_MODEL", "gpt-4o-mini"),
            max_concurrent_requests: env_parse("LLM_MAX_CONCURRENT_REQUESTS", 4),
            max_requests_per_minute: env_parse("LLM_MAX_REQUESTS_PER_MINUTE", 60),
        };

        let browser = BrowserConfig {
            base_url: env_or("BROWSER_WORKER_BASE_URL", "http://localhost:9400"),
            bearer_token: env_or("BROWSER_WORKER_BEARER_TOKEN", ""),
        };

        let admin_bearer_token = env_or("ADMIN_BEARER_TOKEN", "dev-admin-token");

        let job_runtime = JobRuntimeConfig {
            poll_interval: Duration::from_secs(env_parse("JOB_POLL_INTERVAL_SECS", 5)),
            idle_poll_interval: Duration::from_secs(env_parse("JOB_IDLE_POLL_INTERVAL_SECS", 10)),
            probe_interval: Duration::from_secs(env_parse("PROBE_INTERVAL_SECS", 15 * 60)),
            usage_reset_interval: Duration::from_secs(env_parse(
                "USAGE_RESET_INTERVAL_SECS",
                60 * 60,
            )),
        };

        Self {
            database_url,
            mail,
            llm,
            browser,
            admin_bearer_token,
            job_runtime,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
