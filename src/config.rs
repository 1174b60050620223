use std::env;

/// Runtime configuration for the HiBob API client.
/// Values are sourced from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    pub api_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub cache_ttl_secs: u64,
}

impl Config {
    /// Load configuration from environment.
    ///
    /// Env vars:
    /// - BOB_API_TOKEN [required]
    /// - BOB_API_URL (default: https://api.hibob.com/v1)
    /// - BOB_HTTP_TIMEOUT_SECS (default: 30)
    /// - BOB_USER_AGENT (default: hibob-mcp/<version>)
    /// - BOB_CACHE_TTL_SECS (default: 86400)
    pub fn from_env() -> Result<Self, String> {
        let token =
            env::var("BOB_API_TOKEN").map_err(|_| "Missing BOB_API_TOKEN".to_string())?;

        let api_url =
            env::var("BOB_API_URL").unwrap_or_else(|_| "https://api.hibob.com/v1".to_string());
        let timeout_secs = env::var("BOB_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);
        let cache_ttl_secs = env::var("BOB_CACHE_TTL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(86_400);
        let default_ua = format!("hibob-mcp/{}", env!("CARGO_PKG_VERSION"));
        let user_agent = env::var("BOB_USER_AGENT").unwrap_or(default_ua);

        Ok(Self {
            token,
            api_url,
            user_agent,
            timeout_secs,
            cache_ttl_secs,
        })
    }
}
