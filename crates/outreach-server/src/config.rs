use std::path::PathBuf;

use anyhow::{Context, bail};

use outreach_api::CampaignEngine;
use outreach_api::sender::SimulatedSender;

/// Placeholder JWT secrets that MUST NOT be used.
pub const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

#[derive(Debug, Clone, PartialEq)]
pub enum SenderConfig {
    Simulated { success_rate: f64 },
    Http { url: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub jwt_expires_secs: i64,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    /// Seeded at startup when both are set.
    pub admin: Option<(String, String)>,
    pub sender: SenderConfig,
    pub send_concurrency: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads every `OUTREACH_*` variable through `lookup`. Empty values count
    /// as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = var("OUTREACH_JWT_SECRET").unwrap_or_default();
        let jwt_expires_secs: i64 = match var("OUTREACH_JWT_EXPIRES_SECS") {
            Some(v) => v.parse().context("OUTREACH_JWT_EXPIRES_SECS must be a number of seconds")?,
            None => 3600,
        };
        if jwt_expires_secs <= 0 {
            bail!("OUTREACH_JWT_EXPIRES_SECS must be positive");
        }

        let port: u16 = var("OUTREACH_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("OUTREACH_PORT must be a port number")?;

        let admin = match (var("OUTREACH_ADMIN_EMAIL"), var("OUTREACH_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some((email, password)),
            _ => None,
        };

        let sender = match var("OUTREACH_SENDER").as_deref().unwrap_or("simulated") {
            "simulated" => SenderConfig::Simulated {
                success_rate: match var("OUTREACH_SEND_SUCCESS_RATE") {
                    Some(v) => success_rate(&v)?,
                    None => SimulatedSender::DEFAULT_SUCCESS_RATE,
                },
            },
            "http" => SenderConfig::Http {
                url: var("OUTREACH_SENDER_URL")
                    .context("OUTREACH_SENDER_URL is required when OUTREACH_SENDER=http")?,
            },
            other => bail!("Unknown OUTREACH_SENDER '{}' (expected simulated or http)", other),
        };

        let send_concurrency = match var("OUTREACH_SEND_CONCURRENCY") {
            Some(v) => v.parse().context("OUTREACH_SEND_CONCURRENCY must be a positive integer")?,
            None => CampaignEngine::DEFAULT_SEND_CONCURRENCY,
        };

        Ok(Self {
            jwt_secret,
            jwt_expires_secs,
            db_path: var("OUTREACH_DB_PATH").unwrap_or_else(|| "outreach.db".into()).into(),
            host: var("OUTREACH_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            admin,
            sender,
            send_concurrency,
        })
    }

    pub fn has_placeholder_secret(&self) -> bool {
        self.jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&self.jwt_secret.as_str())
    }
}

fn success_rate(raw: &str) -> anyhow::Result<f64> {
    const MSG: &str = "OUTREACH_SEND_SUCCESS_RATE must be a number between 0 and 1";
    let rate: f64 = raw.parse().context(MSG)?;
    if !(0.0..=1.0).contains(&rate) {
        bail!("{} (got {})", MSG, raw);
    }
    Ok(rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[("OUTREACH_JWT_SECRET", "s3cr3t-value")]).unwrap();
        assert_eq!(cfg.jwt_expires_secs, 3600);
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.db_path, PathBuf::from("outreach.db"));
        assert_eq!(cfg.send_concurrency, 8);
        assert_eq!(cfg.sender, SenderConfig::Simulated { success_rate: 0.9 });
        assert!(cfg.admin.is_none());
        assert!(!cfg.has_placeholder_secret());
    }

    #[test]
    fn placeholder_and_missing_secrets_are_flagged() {
        assert!(config(&[]).unwrap().has_placeholder_secret());
        assert!(
            config(&[("OUTREACH_JWT_SECRET", "dev-secret-change-me")])
                .unwrap()
                .has_placeholder_secret()
        );
    }

    #[test]
    fn http_sender_needs_a_url() {
        assert!(config(&[("OUTREACH_SENDER", "http")]).is_err());
        let cfg = config(&[
            ("OUTREACH_SENDER", "http"),
            ("OUTREACH_SENDER_URL", "http://gateway.local/send"),
        ])
        .unwrap();
        assert_eq!(
            cfg.sender,
            SenderConfig::Http {
                url: "http://gateway.local/send".into()
            }
        );
        assert!(config(&[("OUTREACH_SENDER", "carrier-pigeon")]).is_err());
    }

    #[test]
    fn admin_seed_needs_both_values() {
        assert!(config(&[("OUTREACH_ADMIN_EMAIL", "root@example.com")]).unwrap().admin.is_none());
        let cfg = config(&[
            ("OUTREACH_ADMIN_EMAIL", "root@example.com"),
            ("OUTREACH_ADMIN_PASSWORD", "hunter22"),
        ])
        .unwrap();
        assert_eq!(cfg.admin, Some(("root@example.com".into(), "hunter22".into())));
    }

    #[test]
    fn bad_numbers_are_errors() {
        assert!(config(&[("OUTREACH_PORT", "eighty")]).is_err());
        assert!(config(&[("OUTREACH_JWT_EXPIRES_SECS", "0")]).is_err());
        assert!(config(&[("OUTREACH_SEND_SUCCESS_RATE", "most")]).is_err());
        assert!(config(&[("OUTREACH_SEND_SUCCESS_RATE", "NaN")]).is_err());
        assert!(config(&[("OUTREACH_SEND_SUCCESS_RATE", "inf")]).is_err());
        assert!(config(&[("OUTREACH_SEND_SUCCESS_RATE", "4")]).is_err());
        assert!(config(&[("OUTREACH_SEND_SUCCESS_RATE", "-0.5")]).is_err());
        assert_eq!(
            config(&[("OUTREACH_SEND_SUCCESS_RATE", "1")]).unwrap().sender,
            SenderConfig::Simulated { success_rate: 1.0 }
        );
    }
}
