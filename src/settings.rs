//! Service settings loaded from environment variables

/// Runtime settings for the verification worker
#[derive(Debug, Clone)]
pub struct Settings {
    /// Address the HTTP server binds to
    pub bind_addr: String,
    /// Default wall-clock limit for one sandbox run, in seconds
    pub default_timeout_secs: u64,
    /// Default memory ceiling for one sandbox run, in MB
    pub default_memory_limit_mb: u64,
    /// Default attempt budget for the verification loop
    pub max_retries: u32,
    /// Ceiling on concurrently running verifications
    pub max_concurrent: usize,
    /// Base URL of the code-regeneration collaborator, if configured
    pub regeneration_url: Option<String>,
    /// Base URL of the test-generation collaborator, if configured
    pub test_generation_url: Option<String>,
    /// Timeout for a single collaborator call, in seconds
    pub collaborator_timeout_secs: u64,
    /// Webhook URL for fire-and-forget result notifications, if configured
    pub webhook_url: Option<String>,
    /// Redis URL for the optional result cache
    pub redis_url: Option<String>,
    /// TTL for cached verification results, in seconds
    pub cache_ttl_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".into(),
            default_timeout_secs: 10,
            default_memory_limit_mb: 512,
            max_retries: 3,
            max_concurrent: 8,
            regeneration_url: None,
            test_generation_url: None,
            collaborator_timeout_secs: 30,
            webhook_url: None,
            redis_url: None,
            cache_ttl_secs: 3600,
        }
    }
}

impl Settings {
    /// Load settings from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Settings::default();

        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            default_timeout_secs: env_u64("SANDBOX_TIMEOUT_SECS", defaults.default_timeout_secs),
            default_memory_limit_mb: env_u64(
                "SANDBOX_MEMORY_LIMIT_MB",
                defaults.default_memory_limit_mb,
            ),
            max_retries: env_u64("MAX_RETRIES", defaults.max_retries as u64).max(1) as u32,
            max_concurrent: env_u64("MAX_CONCURRENT", defaults.max_concurrent as u64).max(1)
                as usize,
            regeneration_url: env_opt("REGENERATION_URL"),
            test_generation_url: env_opt("TEST_GENERATION_URL"),
            collaborator_timeout_secs: env_u64(
                "COLLABORATOR_TIMEOUT_SECS",
                defaults.collaborator_timeout_secs,
            ),
            webhook_url: env_opt("WEBHOOK_URL"),
            redis_url: env_opt("REDIS_URL"),
            cache_ttl_secs: env_u64("CACHE_TTL_SECS", defaults.cache_ttl_secs),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.max_retries, 3);
        assert!(settings.regeneration_url.is_none());
        assert!(settings.max_concurrent >= 1);
    }
}
