use std::time::Duration;

use clap::Parser;

use crate::networking::backoff::ReconnectPolicy;

pub const DEFAULT_SOCKET_PORT: u16 = 8001;
pub const DEFAULT_ASSET_PORT: u16 = 8000;

#[derive(Parser, Debug, Clone)]
#[command(name = "simview")]
#[command(version)]
#[command(about = "Live viewer for simulation scene servers")]
pub struct CliArgs {
    #[arg(long, default_value = "127.0.0.1", env = "SIMVIEW_HOST")]
    pub host: String,

    /// Port of the scene socket.
    #[arg(long, default_value_t = DEFAULT_SOCKET_PORT, env = "SIMVIEW_PORT")]
    pub port: u16,

    /// Prefix the asset hashes are appended to. Defaults to the asset server next to the scene
    /// server.
    #[arg(long, env = "SIMVIEW_ASSET_URL")]
    pub asset_url: Option<String>,

    #[arg(long, default_value_t = 4, env = "SIMVIEW_FETCH_WORKERS")]
    pub fetch_workers: usize,

    #[arg(long, default_value_t = 30, env = "SIMVIEW_FETCH_TIMEOUT_SECS")]
    pub fetch_timeout_secs: u64,

    #[arg(long, default_value_t = 5000, env = "SIMVIEW_RECONNECT_MAX_DELAY_MS")]
    pub reconnect_max_delay_ms: u64,

    /// Reconnect without any delay, no matter how often the server refuses.
    #[arg(long)]
    pub immediate_reconnect: bool,
}

impl CliArgs {
    pub fn socket_url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }

    pub fn asset_base_url(&self) -> String {
        match &self.asset_url {
            Some(url) if url.ends_with('/') => url.clone(),
            Some(url) => format!("{}/", url),
            None => format!("http://{}:{}/asset/", self.host, DEFAULT_ASSET_PORT),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        if self.immediate_reconnect {
            ReconnectPolicy::immediate()
        } else {
            ReconnectPolicy::exponential(Duration::from_millis(self.reconnect_max_delay_ms))
        }
    }
}
