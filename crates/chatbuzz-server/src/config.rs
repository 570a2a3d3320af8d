use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};

use chatbuzz_gateway::dispatcher::DEFAULT_TOPIC_CAPACITY;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub topic_capacity: usize,
}

impl Config {
    /// Read configuration from the environment (after `.env` is loaded).
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = lookup("CHATBUZZ_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("CHATBUZZ_JWT_SECRET is unset or still a placeholder");
        }

        let port: u16 = match lookup("CHATBUZZ_PORT") {
            Some(raw) => raw.parse().context("CHATBUZZ_PORT must be a port number")?,
            None => 3000,
        };
        let topic_capacity: usize = match lookup("CHATBUZZ_TOPIC_CAPACITY") {
            Some(raw) => raw
                .parse()
                .context("CHATBUZZ_TOPIC_CAPACITY must be a positive integer")?,
            None => DEFAULT_TOPIC_CAPACITY,
        };

        Ok(Self {
            host: lookup("CHATBUZZ_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: lookup("CHATBUZZ_DB_PATH")
                .unwrap_or_else(|| "chatbuzz.db".into())
                .into(),
            jwt_secret,
            topic_capacity,
        })
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = load(&[("CHATBUZZ_JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.db_path, PathBuf::from("chatbuzz.db"));
        assert_eq!(config.topic_capacity, DEFAULT_TOPIC_CAPACITY);
        assert_eq!(config.addr().unwrap().to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn placeholder_secret_rejected() {
        assert!(load(&[]).is_err());
        assert!(load(&[("CHATBUZZ_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn bad_port_rejected() {
        assert!(load(&[("CHATBUZZ_JWT_SECRET", "s3cret"), ("CHATBUZZ_PORT", "http")]).is_err());
    }
}
