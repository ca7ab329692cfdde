use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Placeholder in `bind_dn` replaced by the (escaped) username.
pub const USER_SLOT: &str = "%s";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Passive token rotation interval
    #[serde(default = "default_token_timeout")]
    pub token_timeout_secs: u64,
    pub ldap_uri: String,
    pub bind_dn: String,
    pub web_prefix: String,
    #[serde(default = "default_ldap_timeout")]
    pub ldap_timeout_secs: u64,
    /// Where the QR code of the current token URI is written; disabled when absent
    #[serde(default)]
    pub qr_path: Option<PathBuf>,
}

fn default_token_timeout() -> u64 {
    60
}

fn default_ldap_timeout() -> u64 {
    5
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let raw = fs::read_to_string(path).context("reading config file")?;
        let mut cfg: Config = serde_json::from_str(&raw).context("parsing JSON")?;

        if let Some(secs) = std::env::var("DOORLOCK_TOKEN_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            cfg.token_timeout_secs = secs;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.token_timeout_secs == 0 {
            bail!("token_timeout_secs must be greater than zero");
        }
        let slots = self.bind_dn.matches(USER_SLOT).count();
        if slots != 1 {
            bail!(
                "bind_dn must contain exactly one {} slot, found {}",
                USER_SLOT,
                slots
            );
        }
        if !(self.ldap_uri.starts_with("ldap://")
            || self.ldap_uri.starts_with("ldaps://")
            || self.ldap_uri.starts_with("ldapi://"))
        {
            bail!("ldap_uri must use ldap://, ldaps:// or ldapi://");
        }
        Ok(())
    }

    pub fn token_timeout(&self) -> Duration {
        Duration::from_secs(self.token_timeout_secs)
    }

    pub fn ldap_timeout(&self) -> Duration {
        Duration::from_secs(self.ldap_timeout_secs)
    }
}
