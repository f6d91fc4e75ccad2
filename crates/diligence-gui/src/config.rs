use anyhow::{Context, Result, bail};
use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub listen_addr: String,
    /// How long the stream driver waits for a relay message before
    /// re-checking whether the run has finished.
    pub poll_interval: Duration,
}

impl AppConfig {
    const DEFAULT_LISTEN_ADDR: &'static str = "0.0.0.0:8080";
    const DEFAULT_POLL_INTERVAL_MS: u64 = 200;

    pub fn from_env() -> Result<Self> {
        let listen_addr = env::var("GUI_LISTEN_ADDR")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| Self::DEFAULT_LISTEN_ADDR.to_string());

        let poll_interval_ms = env::var("GUI_POLL_INTERVAL_MS")
            .ok()
            .map(|value| {
                value
                    .trim()
                    .parse::<u64>()
                    .with_context(|| "GUI_POLL_INTERVAL_MS must be an integer")
            })
            .transpose()?
            .unwrap_or(Self::DEFAULT_POLL_INTERVAL_MS);
        if poll_interval_ms == 0 {
            bail!("GUI_POLL_INTERVAL_MS must be greater than zero");
        }

        Ok(Self {
            listen_addr,
            poll_interval: Duration::from_millis(poll_interval_ms),
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: Self::DEFAULT_LISTEN_ADDR.to_string(),
            poll_interval: Duration::from_millis(Self::DEFAULT_POLL_INTERVAL_MS),
        }
    }
}
