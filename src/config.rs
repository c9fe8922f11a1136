use std::time::Duration;

use serde::Deserialize;

/// Service configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port (HTTP and WebSocket share the listener)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Inactive rooms older than this are removed by the cleanup sweep
    #[serde(default = "default_room_retention_hours")]
    pub room_retention_hours: i64,

    /// Seconds between cleanup sweeps
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    /// Maximum members a single room admits
    #[serde(default = "default_max_room_members")]
    pub max_room_members: usize,

    /// Maximum rooms tracked at once, active or pending cleanup
    #[serde(default = "default_max_rooms")]
    pub max_rooms: usize,

    /// Buffered match events per subscriber before it starts lagging
    #[serde(default = "default_match_channel_capacity")]
    pub match_channel_capacity: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4000
}

fn default_room_retention_hours() -> i64 {
    24
}

fn default_cleanup_interval_secs() -> u64 {
    900
}

fn default_max_room_members() -> usize {
    50
}

fn default_max_rooms() -> usize {
    10_000
}

fn default_match_channel_capacity() -> usize {
    1024
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            room_retention_hours: default_room_retention_hours(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            max_room_members: default_max_room_members(),
            max_rooms: default_max_rooms(),
            match_channel_capacity: default_match_channel_capacity(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    /// Socket address string for the listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_environment() {
        let config: Config = envy::from_iter(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.room_retention_hours, 24);
        assert_eq!(config.max_room_members, 50);
        assert_eq!(config.bind_addr(), "127.0.0.1:4000");
    }

    #[test]
    fn test_overrides() {
        let config: Config = envy::from_iter(vec![
            ("PORT".to_string(), "8080".to_string()),
            ("ROOM_RETENTION_HOURS".to_string(), "2".to_string()),
            ("CLEANUP_INTERVAL_SECS".to_string(), "0".to_string()),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.room_retention_hours, 2);
        // A zero interval would spin the cleanup loop
        assert_eq!(config.cleanup_interval(), Duration::from_secs(1));
    }
}
