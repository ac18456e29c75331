use std::env;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://api.coingecko.com/api/v3";

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,

    // ── Provider ───────────────────────────────────────────────────
    pub api_base_url: String,
    pub vs_currency: String,
    pub page_size: u32,
    pub request_timeout: Duration,

    // ── Refresh cadence ────────────────────────────────────────────
    pub refresh_interval: Duration,

    // ── Dashboard ──────────────────────────────────────────────────
    /// Instrument charted before the user picks one.
    pub default_selection: String,
    /// Prometheus exporter port. 0 ⇒ exporter disabled.
    pub metrics_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            vs_currency: "usd".to_string(),
            page_size: 20,
            request_timeout: Duration::from_secs(10),
            refresh_interval: Duration::from_secs(60),
            default_selection: "bitcoin".to_string(),
            metrics_port: 9000,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // dotenvy loads .env, but doesn't override already-set env vars
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let refresh_interval = nonzero_secs(
            "DASHBOARD_REFRESH_SECS",
            env_u64("DASHBOARD_REFRESH_SECS", defaults.refresh_interval.as_secs()),
        )?;
        let request_timeout = nonzero_secs(
            "DASHBOARD_REQUEST_TIMEOUT_SECS",
            env_u64("DASHBOARD_REQUEST_TIMEOUT_SECS", defaults.request_timeout.as_secs()),
        )?;

        Ok(Self {
            log_level: env_str("RUST_LOG", &defaults.log_level),
            api_base_url: env_str("DASHBOARD_API_BASE_URL", &defaults.api_base_url)
                .trim_end_matches('/')
                .to_string(),
            vs_currency: env_str("DASHBOARD_VS_CURRENCY", &defaults.vs_currency).to_lowercase(),
            page_size: env_u64("DASHBOARD_PAGE_SIZE", u64::from(defaults.page_size))
                .clamp(1, 250) as u32,
            request_timeout,
            refresh_interval,
            default_selection: env_str("DASHBOARD_DEFAULT_SELECTION", &defaults.default_selection),
            metrics_port: env_u16("DASHBOARD_METRICS_PORT", defaults.metrics_port),
        })
    }
}

fn nonzero_secs(name: &str, secs: u64) -> anyhow::Result<Duration> {
    if secs == 0 {
        anyhow::bail!("{name} must be greater than zero");
    }
    Ok(Duration::from_secs(secs))
}

fn env_str(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_u16(name: &str, default: u16) -> u16 {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
