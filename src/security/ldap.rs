use std::time::Duration;

use async_trait::async_trait;
use ldap3::{dn_escape, LdapConnAsync, LdapConnSettings};
use tracing::{debug, error, info, warn};

use crate::agent::config::{Config, USER_SLOT};

/// Result of a single credential check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Success,
    InvalidCredentials,
    /// The directory could not be reached or the session could not be set up.
    TransportError,
}

#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, user: &str, password: &str) -> VerifyOutcome;
}

/// Simple-bind authenticator. Every call opens and releases its own connection.
#[derive(Debug, Clone)]
pub struct LdapAuthenticator {
    uri: String,
    bind_dn: String,
    timeout: Duration,
}

impl LdapAuthenticator {
    pub fn new(uri: impl Into<String>, bind_dn: impl Into<String>, timeout: Duration) -> Self {
        Self {
            uri: uri.into(),
            bind_dn: bind_dn.into(),
            timeout,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.ldap_uri.clone(), cfg.bind_dn.clone(), cfg.ldap_timeout())
    }

    pub fn bind_dn_for(&self, user: &str) -> String {
        self.bind_dn.replacen(USER_SLOT, &dn_escape(user), 1)
    }
}

#[async_trait]
impl CredentialVerifier for LdapAuthenticator {
    async fn verify(&self, user: &str, password: &str) -> VerifyOutcome {
        // An empty password turns a simple bind into an unauthenticated one.
        if password.is_empty() {
            warn!(user, "refusing to bind with an empty password");
            return VerifyOutcome::InvalidCredentials;
        }

        info!(user, "trying to authenticate");
        let dn = self.bind_dn_for(user);

        let settings = LdapConnSettings::new().set_conn_timeout(self.timeout);
        let (conn, mut ldap) = match LdapConnAsync::with_settings(settings, &self.uri).await {
            Ok(pair) => pair,
            Err(e) => {
                error!(uri = %self.uri, error = %e, "LDAP initialize error");
                return VerifyOutcome::TransportError;
            }
        };
        let driver = tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection closed with error");
            }
        });

        // Bounds the wait for a BindResponse; expiry surfaces as an error below.
        let outcome = match ldap.with_timeout(self.timeout).simple_bind(&dn, password).await {
            Ok(result) => match result.success() {
                Ok(_) => {
                    info!(user, "user successfully authenticated");
                    VerifyOutcome::Success
                }
                Err(e) => {
                    error!(user, error = %e, "credential check failed");
                    VerifyOutcome::InvalidCredentials
                }
            },
            Err(e) => {
                error!(user, error = %e, "LDAP bind request failed");
                VerifyOutcome::TransportError
            }
        };

        if let Err(e) = ldap.with_timeout(self.timeout).unbind().await {
            debug!(error = %e, "LDAP unbind failed");
        }
        drop(ldap);
        if tokio::time::timeout(self.timeout, driver).await.is_err() {
            warn!("LDAP connection did not shut down in time");
        }

        outcome
    }
}
