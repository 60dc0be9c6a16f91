use std::time::Duration;

use serde::Deserialize;

use crate::services::fetcher::FetcherConfig;
use crate::services::worker::WorkerPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Unused by the drain worker.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// HS256 secret for admin bearer tokens
    #[serde(default)]
    pub jwt_secret: String,

    /// Catalog site root, used to resolve brand slugs and the default sitemap
    #[serde(default = "default_site_base_url")]
    pub site_base_url: String,

    /// Chrome/Chromium binary; autodetected when unset
    pub chrome_executable: Option<String>,

    #[serde(default = "default_true")]
    pub browser_headless: bool,

    /// Wait before every network fetch
    #[serde(default = "default_pre_fetch_delay")]
    pub pre_fetch_delay_secs: u64,

    /// Pause between processed queue items
    #[serde(default = "default_inter_request_delay")]
    pub inter_request_delay_secs: u64,

    #[serde(default = "default_short_cooldown")]
    pub short_cooldown_secs: u64,

    #[serde(default = "default_long_cooldown")]
    pub long_cooldown_secs: u64,

    /// Consecutive rate limits that trigger the long cooldown
    #[serde(default = "default_rate_limit_threshold")]
    pub rate_limit_threshold: u32,

    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_render_timeout")]
    pub render_timeout_secs: u64,

    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout_secs: u64,

    #[serde(default = "default_recent_error_capacity")]
    pub recent_error_capacity: usize,

    /// Admin API throughput, requests per minute
    #[serde(default = "default_admin_requests_per_minute")]
    pub admin_requests_per_minute: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_site_base_url() -> String {
    "https://www.fragrantica.com".to_string()
}

fn default_true() -> bool {
    true
}

fn default_pre_fetch_delay() -> u64 {
    3
}

fn default_inter_request_delay() -> u64 {
    15
}

fn default_short_cooldown() -> u64 {
    120
}

fn default_long_cooldown() -> u64 {
    300
}

fn default_rate_limit_threshold() -> u32 {
    3
}

fn default_cache_ttl() -> u64 {
    86_400
}

fn default_render_timeout() -> u64 {
    30
}

fn default_navigation_timeout() -> u64 {
    60
}

fn default_recent_error_capacity() -> usize {
    20
}

fn default_admin_requests_per_minute() -> u64 {
    30
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn worker_policy(&self) -> WorkerPolicy {
        WorkerPolicy {
            inter_request_delay: Duration::from_secs(self.inter_request_delay_secs),
            short_cooldown: Duration::from_secs(self.short_cooldown_secs),
            long_cooldown: Duration::from_secs(self.long_cooldown_secs),
            rate_limit_threshold: self.rate_limit_threshold.max(1),
            recent_error_capacity: self.recent_error_capacity,
        }
    }

    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            headless: self.browser_headless,
            chrome_executable: self.chrome_executable.clone(),
            render_timeout: Duration::from_secs(self.render_timeout_secs),
            navigation_timeout: Duration::from_secs(self.navigation_timeout_secs),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn pre_fetch_delay(&self) -> Duration {
        Duration::from_secs(self.pre_fetch_delay_secs)
    }

    /// Brand listing page for a slug such as `Dior`.
    pub fn brand_url(&self, brand: &str) -> String {
        format!(
            "{}/designers/{}.html",
            self.site_base_url.trim_end_matches('/'),
            brand.trim()
        )
    }

    pub fn default_sitemap_url(&self) -> String {
        format!("{}/sitemap.xml", self.site_base_url.trim_end_matches('/'))
    }
}
