//! Project-wide constants.

use std::time::Duration;

pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");
pub const HOMEPAGE: &str = env!("CARGO_PKG_HOMEPAGE");
pub const REPO: &str = env!("CARGO_PKG_REPOSITORY");

/// How often a live run is polled.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// How long a resolved endpoint is trusted before the agent card is fetched again.
pub const DEFAULT_DISCOVERY_TTL: Duration = Duration::from_secs(5 * 60);

/// How long a finished run stays queryable.
pub const DEFAULT_RUN_RETENTION: Duration = Duration::from_secs(60 * 60);

/// How often the reaper sweeps finished runs.
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(60);

pub const DEFAULT_PORT: u16 = 4000;

/// `list` page size when the caller gives none.
pub const DEFAULT_LIST_LIMIT: usize = 10;

/// Upper bound for a single `list` page.
pub const MAX_LIST_LIMIT: usize = 50;

/// Largest JSON body the HTTP surface accepts.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Transport tag of the interface we talk to in the agent card.
pub const HTTP_JSON_TRANSPORT: &str = "HTTP+JSON";

/// Header carrying the shared secret. Casing matters for some agent hosts.
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// Path suffix that identifies a full agent-card URL.
pub const AGENT_CARD_SUFFIX: &str = "/.well-known/agent-card.json";

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Mask a secret for display: keeps the first 10 and last 6 characters.
pub fn mask_key(key: &str) -> String {
    if key.is_empty() {
        return "(empty)".to_string();
    }
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 12 {
        return key.to_string();
    }
    let head: String = chars[..10].iter().collect();
    let tail: String = chars[chars.len() - 6..].iter().collect();
    format!("{head}…{tail}")
}
