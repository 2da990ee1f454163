//! Startup banner.

use std::time::Duration;

use crate::config::RelayConfig;
use crate::consts::{AUTHOR, HOMEPAGE, REPO, mask_key};

/// How the process was started, for the banner's last line.
pub enum Mode<'a> {
    Serve { addr: &'a str },
    SingleRun,
}

fn secs(d: Duration) -> String {
    if d.as_millis() % 1000 == 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{}ms", d.as_millis())
    }
}

/// Render the banner. Never includes the full API key.
pub fn render_banner(config: &RelayConfig, mode: &Mode) -> String {
    let mode = match mode {
        Mode::Serve { addr } => format!("serving on http://{addr}"),
        Mode::SingleRun => "single run".to_string(),
    };
    let prefix = if config.api_prefix.is_empty() {
        "(none)"
    } else {
        &config.api_prefix
    };

    format!(
        r#"
   ╔═══════════════════════════════════════╗
   ║              R E L A Y                ║
   ║    send it off, watch it come back    ║
   ╚═══════════════════════════════════════╝

   version   {}
   by        {}
   home      {}
   repo      {}
   card      {}
   api key   {}
   prefix    {}
   poll      every {}
   card ttl  {}
   retain    {} (swept every {})
   mode      {}
"#,
        env!("CARGO_PKG_VERSION"),
        AUTHOR,
        HOMEPAGE,
        REPO,
        config.card_url,
        mask_key(&config.api_key),
        prefix,
        secs(config.poll_interval),
        secs(config.discovery_ttl),
        secs(config.run_retention),
        secs(config.reap_interval),
        mode,
    )
}

pub fn print_banner(config: &RelayConfig, mode: &Mode) {
    println!("{}", render_banner(config, mode));
}
