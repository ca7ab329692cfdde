//! Request authorization pipeline.
//!
//! A request is decoded, its token checked, the caller authenticated against
//! the directory and finally the door action carried out. The first failing
//! stage decides the [`Response`]. The whole pipeline runs under one lock that
//! also serialises timed token rotation.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};

use crate::door::{DoorController, DoorState};
use crate::security::audit_log::AuditLogger;
use crate::security::ldap::{CredentialVerifier, VerifyOutcome};
use crate::security::token::{Token, TokenStore};

/// Outcome of a single request. Exactly one is produced per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Response {
    Success,
    /// Never the result of a well-formed call.
    #[default]
    Fail,
    NotJson,
    JsonError,
    InvalidToken,
    #[serde(rename = "LDAPInit")]
    LdapInit,
    InvalidCredentials,
    UnknownAction,
    AlreadyLocked,
    AlreadyUnlocked,
}

impl Response {
    pub fn as_str(&self) -> &'static str {
        match self {
            Response::Success => "Success",
            Response::Fail => "Fail",
            Response::NotJson => "NotJson",
            Response::JsonError => "JsonError",
            Response::InvalidToken => "InvalidToken",
            Response::LdapInit => "LDAPInit",
            Response::InvalidCredentials => "InvalidCredentials",
            Response::UnknownAction => "UnknownAction",
            Response::AlreadyLocked => "AlreadyLocked",
            Response::AlreadyUnlocked => "AlreadyUnlocked",
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Deserialize)]
pub struct Request {
    pub action: String,
    pub ip: String,
    pub user: String,
    pub password: String,
    pub token: String,
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("action", &self.action)
            .field("ip", &self.ip)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("token", &self.token)
            .finish()
    }
}

impl Request {
    /// Decode a wire payload. Invalid JSON is `NotJson`; a missing or
    /// non-string field is `JsonError`.
    pub fn parse(payload: &str) -> Result<Self, Response> {
        let root: serde_json::Value =
            serde_json::from_str(payload).map_err(|_| Response::NotJson)?;
        serde_json::from_value(root).map_err(|_| Response::JsonError)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Lock,
    Unlock,
}

impl Action {
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "lock" => Some(Action::Lock),
            "unlock" => Some(Action::Unlock),
            _ => None,
        }
    }
}

struct LogicState {
    tokens: TokenStore,
    door: DoorController,
}

/// The authorization engine. Cheap to clone; clones share the same lock.
#[derive(Clone)]
pub struct Logic {
    state: Arc<Mutex<LogicState>>,
    verifier: Arc<dyn CredentialVerifier>,
    audit: AuditLogger,
}

impl Logic {
    pub fn new(
        tokens: TokenStore,
        door: DoorController,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(LogicState { tokens, door })),
            verifier,
            audit: AuditLogger::new(),
        }
    }

    pub async fn handle(&self, payload: &str) -> Response {
        let mut state = self.state.lock().await;
        info!("incoming request");

        let response = self
            .process(&mut state, payload)
            .await
            .unwrap_or_else(|rejected| rejected);

        info!(response = %response, "request finished");
        response
    }

    async fn process(&self, state: &mut LogicState, payload: &str) -> Result<Response, Response> {
        let request = Request::parse(payload).map_err(|response| {
            warn!(response = %response, "request could not be decoded");
            self.audit.malformed_request(response.as_str());
            response
        })?;

        info!(
            action = %request.action,
            user = %request.user,
            ip = %request.ip,
            token = %request.token,
            "request decoded"
        );
        self.audit
            .request_received(&request.user, &request.ip, &request.action);

        self.check_token(&state.tokens, &request)?;
        self.authenticate(&request).await?;

        match Action::parse(&request.action) {
            Some(Action::Lock) => Ok(self.lock(state, &request)),
            Some(Action::Unlock) => Ok(self.unlock(state, &request)),
            None => {
                error!(action = %request.action, "unknown action");
                self.audit.unknown_action(&request.user, &request.action);
                Err(Response::UnknownAction)
            }
        }
    }

    fn check_token(&self, tokens: &TokenStore, request: &Request) -> Result<(), Response> {
        let valid = match Token::readings(&request.token) {
            Ok(readings) => readings.into_iter().any(|candidate| tokens.check(candidate)),
            Err(e) => {
                warn!(error = %e, "token could not be parsed");
                false
            }
        };

        if valid {
            info!("token check successful");
            Ok(())
        } else {
            error!(token = %request.token, "user provided invalid token");
            self.audit
                .token_rejected(&request.user, &request.ip, &request.token);
            Err(Response::InvalidToken)
        }
    }

    async fn authenticate(&self, request: &Request) -> Result<(), Response> {
        match self.verifier.verify(&request.user, &request.password).await {
            VerifyOutcome::Success => Ok(()),
            VerifyOutcome::InvalidCredentials => {
                self.audit.auth_failure(&request.user, &request.ip);
                Err(Response::InvalidCredentials)
            }
            VerifyOutcome::TransportError => {
                self.audit.directory_unavailable(&request.user);
                Err(Response::LdapInit)
            }
        }
    }

    fn lock(&self, state: &mut LogicState, request: &Request) -> Response {
        let response = if state.door.state() == DoorState::Locked {
            warn!("unable to lock: already locked");
            Response::AlreadyLocked
        } else {
            state.door.lock();
            state.tokens.rotate(false);
            self.audit.token_rotated(false);
            Response::Success
        };
        self.audit
            .door_command(&request.user, &request.ip, "lock", response.as_str());
        response
    }

    // Unlock always reaches the hardware, even if the door is already open.
    fn unlock(&self, state: &mut LogicState, request: &Request) -> Response {
        let before = state.door.state();
        state.door.unlock();
        state.tokens.rotate(false);
        self.audit.token_rotated(false);

        let response = if before == DoorState::Unlocked {
            warn!("unable to unlock: already unlocked");
            Response::AlreadyUnlocked
        } else {
            Response::Success
        };
        self.audit
            .door_command(&request.user, &request.ip, "unlock", response.as_str());
        response
    }

    /// Timed rotation; the retired token keeps its grace until the next rotation.
    ///
    /// `stop` is read after the lock is taken, so a shutdown signalled while a
    /// request held the lock suppresses the rotation. Returns whether it rotated.
    pub async fn rotate_passive(&self, stop: &watch::Receiver<bool>) -> bool {
        let mut state = self.state.lock().await;
        if *stop.borrow() {
            return false;
        }
        state.tokens.rotate(true);
        self.audit.token_rotated(true);
        true
    }

    pub async fn current_token(&self) -> Token {
        self.state.lock().await.tokens.current()
    }

    pub async fn token_uri(&self) -> String {
        self.state.lock().await.tokens.uri()
    }

    pub async fn door_state(&self) -> DoorState {
        self.state.lock().await.door.state()
    }
}
