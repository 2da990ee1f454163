//! Runtime configuration.
//!
//! Values come from CLI flags with environment fallbacks (a `.env` file is
//! loaded by the binary before parsing). [`ConfigArgs`] is the raw clap view;
//! [`RelayConfig`] is the validated result the core runs on.

use std::time::Duration;

use crate::consts::{
    AGENT_CARD_SUFFIX, DEFAULT_DISCOVERY_TTL, DEFAULT_POLL_INTERVAL, DEFAULT_PORT,
    DEFAULT_REAP_INTERVAL, DEFAULT_RUN_RETENTION,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing AGENT_API_KEY")]
    MissingApiKey,

    #[error(
        "cannot resolve the agent-card URL: set AGENT_DOMAIN to the agent-card URL, \
         or set AGENT_DOMAIN to the org base URL and AGENT_ID to the agent id"
    )]
    UnresolvedCardUrl,

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

/// Raw configuration as parsed from flags and environment.
#[derive(Debug, Clone, clap::Args)]
pub struct ConfigArgs {
    /// Agent-card URL, or the organisation base URL when --agent-id is set
    #[arg(long, env = "AGENT_DOMAIN")]
    pub agent_domain: Option<String>,

    /// Agent id, used to build the card URL from an organisation base URL
    #[arg(long, env = "AGENT_ID")]
    pub agent_id: Option<String>,

    /// Shared secret sent as X-Api-Key on every call to the agent
    #[arg(long, env = "AGENT_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Path prefix between the agent endpoint and its operations (e.g. /v1)
    #[arg(long, env = "AGENT_API_PREFIX", default_value = "")]
    pub api_prefix: String,

    /// HTTP port to listen on
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Milliseconds between polls of a live run
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL.as_millis() as u64)]
    pub poll_interval_ms: u64,

    /// Seconds a resolved agent endpoint is reused before re-reading the card
    #[arg(long, default_value_t = DEFAULT_DISCOVERY_TTL.as_secs())]
    pub discovery_ttl_secs: u64,

    /// Seconds a finished run stays queryable
    #[arg(long, default_value_t = DEFAULT_RUN_RETENTION.as_secs())]
    pub retention_secs: u64,

    /// Seconds between sweeps for expired runs
    #[arg(long, default_value_t = DEFAULT_REAP_INTERVAL.as_secs())]
    pub reap_interval_secs: u64,
}

impl ConfigArgs {
    /// The agent-card URL these arguments point at, if any.
    pub fn card_url(&self) -> Option<String> {
        resolve_card_url(self.agent_domain.as_deref()?, self.agent_id.as_deref())
    }

    pub fn into_config(self) -> Result<RelayConfig, ConfigError> {
        let card_url = self.card_url().ok_or(ConfigError::UnresolvedCardUrl)?;
        let api_key = self
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let config = RelayConfig {
            card_url,
            api_key,
            api_prefix: self.api_prefix,
            port: self.port,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            discovery_ttl: Duration::from_secs(self.discovery_ttl_secs),
            run_retention: Duration::from_secs(self.retention_secs),
            reap_interval: Duration::from_secs(self.reap_interval_secs),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub card_url: String,
    pub api_key: String,
    pub api_prefix: String,
    pub port: u16,
    pub poll_interval: Duration,
    pub discovery_ttl: Duration,
    pub run_retention: Duration,
    pub reap_interval: Duration,
}

impl RelayConfig {
    /// Defaults for everything but the agent coordinates.
    pub fn new(card_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            card_url: card_url.into(),
            api_key: api_key.into(),
            api_prefix: String::new(),
            port: DEFAULT_PORT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            discovery_ttl: DEFAULT_DISCOVERY_TTL,
            run_retention: DEFAULT_RUN_RETENTION,
            reap_interval: DEFAULT_REAP_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_discovery_ttl(mut self, ttl: Duration) -> Self {
        self.discovery_ttl = ttl;
        self
    }

    pub fn with_run_retention(mut self, retention: Duration) -> Self {
        self.run_retention = retention;
        self
    }

    pub fn with_reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // Timers built from these panic on zero.
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("poll interval"));
        }
        if self.reap_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("reap interval"));
        }
        Ok(())
    }
}

/// Work out the agent-card URL.
///
/// `domain` may already be the full card URL. Otherwise it is treated as the
/// organisation base and the card lives at
/// `{domain}/api/agents/a2a/{agent_id}/.well-known/agent-card.json`, which
/// needs an agent id.
pub fn resolve_card_url(domain: &str, agent_id: Option<&str>) -> Option<String> {
    let domain = domain.trim();
    if domain.is_empty() {
        return None;
    }
    if domain.contains(AGENT_CARD_SUFFIX) {
        return Some(domain.to_string());
    }
    let agent_id = agent_id.map(str::trim).filter(|id| !id.is_empty())?;
    let base = domain.trim_end_matches('/');
    Some(format!(
        "{base}/api/agents/a2a/{agent_id}{AGENT_CARD_SUFFIX}"
    ))
}
