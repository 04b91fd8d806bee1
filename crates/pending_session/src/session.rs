//! The pending-session state machine.
//!
//! A [`PendingSession`] owns one outbound connection attempt from first
//! `Hello` to the join request, reacting to control messages the transport
//! delivers and to periodic ticking by the owner. It terminates either
//! welcomed (ready for [`PendingSession::send_join`]) or with a classified
//! [`SessionError`] the owner reads back through
//! [`PendingSession::connection_error_text`].

use crate::error::{SessionError, GENERIC_FAILURE_TEXT};
use crate::identity::IdentityProvider;
use crate::protocol::{ControlMessage, LOCAL_NETWORK_VERSION};
use crate::transport::{ControlTransport, TransportFactory, TransportState};
use crate::url::ServerUrl;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fixed challenge response sent at login. Servers validate the player
/// through the attached identity, not this field.
const CLIENT_RESPONSE: &str = "0";

/// Default bandwidth declaration, in bytes per second.
pub const DEFAULT_NET_SPEED: u32 = 10000;

/// Tunables for a connection attempt.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Rate sent in the `Netspeed` message once welcomed.
    pub net_speed: u32,
    /// Network version advertised in `Hello`.
    pub network_version: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            net_speed: DEFAULT_NET_SPEED,
            network_version: LOCAL_NETWORK_VERSION,
        }
    }
}

/// Where a connection attempt currently stands.
///
/// `ChallengeReceived` is observable only when the login reply could not be
/// sent in the same step; `GuidAssigned` is vocabulary for owners that track
/// explicit guid-registration phases on top of the welcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    VersionSent,
    ChallengeReceived,
    LoginSent,
    Welcomed,
    GuidAssigned,
    Failed,
    Closed,
}

impl SessionState {
    /// Whether the attempt can still make progress.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Failed | SessionState::Closed)
    }

    /// Whether the server has accepted the connection.
    pub fn is_welcomed(self) -> bool {
        matches!(self, SessionState::Welcomed | SessionState::GuidAssigned)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Created => "created",
            SessionState::VersionSent => "version-sent",
            SessionState::ChallengeReceived => "challenge-received",
            SessionState::LoginSent => "login-sent",
            SessionState::Welcomed => "welcomed",
            SessionState::GuidAssigned => "guid-assigned",
            SessionState::Failed => "failed",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// A single outbound connection attempt.
pub struct PendingSession {
    url: ServerUrl,
    transport: Box<dyn ControlTransport>,
    identity: Arc<dyn IdentityProvider>,
    config: SessionConfig,
    state: SessionState,
    error: Option<SessionError>,
    challenge: Option<String>,
    success: bool,
    has_sent_join: bool,
}

impl PendingSession {
    /// Starts a connection attempt toward `url`.
    ///
    /// Acquires a transport from `factory` and sends the initial `Hello`.
    /// Both steps are fatal with no retry: a factory error or a failed
    /// initial send comes back as [`SessionError::TransportCreate`] and no
    /// attempt is constructed.
    pub fn initiate(
        url: ServerUrl,
        factory: &dyn TransportFactory,
        identity: Arc<dyn IdentityProvider>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let mut transport = factory.create_connection(&url).map_err(|e| {
            warn!("error initializing the network layer: {e}");
            SessionError::TransportCreate(e.to_string())
        })?;

        let hello = ControlMessage::Hello {
            is_little_endian: cfg!(target_endian = "little"),
            network_version: config.network_version,
        };
        transport
            .send(&hello)
            .and_then(|_| transport.flush())
            .map_err(|e| {
                warn!("initial send failed: {e}");
                SessionError::TransportCreate(e.to_string())
            })?;

        info!(
            "connecting to {}:{} (version {})",
            url.host, url.port, config.network_version
        );

        Ok(Self {
            url,
            transport,
            identity,
            config,
            state: SessionState::VersionSent,
            error: None,
            challenge: None,
            success: false,
            has_sent_join: false,
        })
    }

    /// Advances the attempt by one frame.
    ///
    /// Detects a transport that died without explanation, then drains
    /// pending inbound messages (each through [`Self::on_control_message`])
    /// and flushes outgoing buffers, in that fixed order. A no-op once the
    /// attempt is failed or closed.
    pub fn tick(&mut self, _delta_seconds: f32) {
        if self.state.is_terminal() {
            return;
        }

        if self.check_lost_transport() {
            return;
        }

        while let Some(message) = self.transport.try_receive() {
            self.on_control_message(message);
            if self.state.is_terminal() {
                return;
            }
        }

        if let Err(e) = self.transport.flush() {
            debug!("flush failed: {e}");
        }

        // Polling above may be what discovered the peer is gone.
        self.check_lost_transport();
    }

    fn check_lost_transport(&mut self) -> bool {
        if self.transport.state() == TransportState::Closed && self.error.is_none() {
            warn!("transport closed while {}", self.state);
            self.fail(SessionError::ConnectionLost);
            return true;
        }
        false
    }

    /// Handles one inbound control message.
    ///
    /// Messages are applied strictly in delivery order; the handler is
    /// synchronous and never re-enters itself. Ignored once the attempt is
    /// failed or closed.
    pub fn on_control_message(&mut self, message: ControlMessage) {
        if self.state.is_terminal() {
            debug!("dropping {} message, attempt is {}", message.kind_name(), self.state);
            return;
        }

        debug!("pending session received: {}", message.kind_name());

        match message {
            ControlMessage::Upgrade { remote_version } => {
                // The owning layer decides whether to close the transport.
                self.fail(SessionError::VersionMismatch {
                    local: self.config.network_version,
                    remote: remote_version,
                });
            }

            ControlMessage::Failure { message } => {
                let text = if message.is_empty() {
                    GENERIC_FAILURE_TEXT.to_string()
                } else {
                    message
                };
                warn!("connection closed by server: {text}");
                self.fail(SessionError::ServerRejected(text));
                self.transport.close();
            }

            ControlMessage::Challenge { token } => self.handle_challenge(token),

            ControlMessage::Welcome {
                map_name,
                game_name,
                redirect_url,
            } => self.handle_welcome(map_name, game_name, redirect_url),

            ControlMessage::GuidAssign { guid, path } => {
                self.transport
                    .package_map()
                    .resolve_path_and_assign_guid(guid, &path);
            }

            other => {
                let violation = SessionError::ProtocolViolation {
                    state: self.state,
                    kind: other.kind_name(),
                };
                warn!("{violation}");
            }
        }
    }

    /// Requests a player slot. Valid once, from the welcomed state; later
    /// calls are no-ops guarded by [`Self::has_sent_join`].
    pub fn send_join(&mut self) {
        if self.has_sent_join {
            debug!("join request already sent");
            return;
        }
        if !self.state.is_welcomed() {
            debug!("cannot send join while {}", self.state);
            return;
        }

        self.has_sent_join = true;
        if self.send_message(ControlMessage::Join) {
            let _ = self.transport.flush();
            info!("join request sent for {}", self.url.map);
        }
    }

    /// Abandons the attempt and closes the transport. Keeps a recorded
    /// failure intact; otherwise the attempt ends in the closed state.
    pub fn close(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.transport.close();
        self.state = SessionState::Closed;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Classified failure, if the attempt has one.
    pub fn error(&self) -> Option<&SessionError> {
        self.error.as_ref()
    }

    /// User-facing failure text; empty until the attempt fails.
    pub fn connection_error_text(&self) -> String {
        self.error
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_default()
    }

    /// Whether the server accepted the connection.
    pub fn success(&self) -> bool {
        self.success
    }

    pub fn has_sent_join(&self) -> bool {
        self.has_sent_join
    }

    /// Challenge token stored from the server, if one arrived.
    pub fn challenge(&self) -> Option<&str> {
        self.challenge.as_deref()
    }

    /// Current travel URL, including everything merged in by the handshake.
    pub fn url(&self) -> &ServerUrl {
        &self.url
    }

    fn handle_challenge(&mut self, token: String) {
        self.challenge = Some(token);
        self.state = SessionState::ChallengeReceived;

        // Stale game mode options would fight the one the welcome appends.
        self.url.remove_options_with_prefix("game=");

        let mut partial = self.url.clone();
        partial.clear_host();

        if let Some(nickname) = self.identity.nickname() {
            if !nickname.is_empty() {
                partial.add_option(format!("Name={nickname}"));
            }
        }
        if let Some(options) = self.identity.game_login_options() {
            if !options.is_empty() {
                partial.add_option(options);
            }
        }

        let login = ControlMessage::Login {
            response: CLIENT_RESPONSE.to_string(),
            url: partial.to_string(),
            identity: self.identity.preferred_identity(),
        };
        if self.send_message(login) {
            let _ = self.transport.flush();
            self.state = SessionState::LoginSent;
        }
    }

    fn handle_welcome(&mut self, map_name: String, game_name: String, redirect_url: String) {
        info!("welcomed by server (level: {map_name}, game: {game_name})");

        self.url.merge_partial(&map_name);
        self.url.redirect_url = redirect_url;
        if !game_name.is_empty() {
            self.url.add_option(format!("game={game_name}"));
        }

        self.send_message(ControlMessage::Netspeed {
            rate: self.config.net_speed,
        });

        self.success = true;
        self.state = SessionState::Welcomed;
    }

    fn fail(&mut self, error: SessionError) {
        if self.error.is_none() {
            warn!("connection attempt failed: {error}");
            self.error = Some(error);
        }
        self.state = SessionState::Failed;
    }

    fn send_message(&mut self, message: ControlMessage) -> bool {
        match self.transport.send(&message) {
            Ok(()) => true,
            Err(e) => {
                // A dead transport is classified as a lost connection on the
                // next tick; nothing to do here but note it.
                debug!("send of {} failed: {e}", message.kind_name());
                false
            }
        }
    }
}
