//! Environment configuration

/// Default TCP listen port.
pub const DEFAULT_PORT: u16 = 8000;

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP listen port (`PORT`).
    pub port: u16,
    /// Optional external pub/sub broker (`PUBSUB_URL`).
    pub pubsub_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let port = get("PORT")
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let pubsub_url = get("PUBSUB_URL").filter(|url| !url.trim().is_empty());
        Self { port, pubsub_url }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.pubsub_url.is_none());
    }

    #[test]
    fn test_reads_port_and_broker() {
        let config = Config::from_lookup(|key| match key {
            "PORT" => Some("9001".into()),
            "PUBSUB_URL" => Some("redis://localhost/".into()),
            _ => None,
        });
        assert_eq!(config.port, 9001);
        assert_eq!(config.pubsub_url.as_deref(), Some("redis://localhost/"));
    }

    #[test]
    fn test_bad_port_falls_back() {
        let config = Config::from_lookup(|key| match key {
            "PORT" => Some("not-a-port".into()),
            _ => None,
        });
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_blank_broker_url_disables_forwarding() {
        let config = Config::from_lookup(|key| match key {
            "PUBSUB_URL" => Some("  ".into()),
            _ => None,
        });
        assert!(config.pubsub_url.is_none());
    }
}
