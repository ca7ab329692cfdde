use tracing::{error, info, warn};

#[derive(Debug, Clone, Default)]
pub struct AuditLogger;

impl AuditLogger {
    pub fn new() -> Self {
        Self
    }

    pub fn request_received(&self, user: &str, ip: &str, action: &str) {
        info!(target: "audit", event = "request_received", user, ip, action);
    }

    pub fn malformed_request(&self, reason: &str) {
        warn!(target: "audit", event = "malformed_request", reason);
    }

    pub fn token_rejected(&self, user: &str, ip: &str, token: &str) {
        warn!(target: "audit", event = "token_rejected", user, ip, token);
    }

    pub fn auth_failure(&self, user: &str, ip: &str) {
        warn!(target: "audit", event = "auth_failure", user, ip);
    }

    pub fn directory_unavailable(&self, user: &str) {
        error!(target: "audit", event = "directory_unavailable", user);
    }

    pub fn unknown_action(&self, user: &str, action: &str) {
        warn!(target: "audit", event = "unknown_action", user, action);
    }

    pub fn door_command(&self, user: &str, ip: &str, action: &str, outcome: &str) {
        info!(target: "audit", event = "door_command", user, ip, action, outcome);
    }

    pub fn token_rotated(&self, grace: bool) {
        info!(target: "audit", event = "token_rotated", grace);
    }
}
