//! Local player identity collaborator.
//!
//! The handshake asks an [`IdentityProvider`] for the player's nickname,
//! game-specific login options, and preferred network identity when it builds
//! the login message. Providers are injected at construction so the session
//! never reaches into process-wide player registries.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique network identity for a local player.
///
/// Wrapper around a UUID so player identities cannot be confused with other
/// IDs in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerIdentity(pub Uuid);

impl PlayerIdentity {
    /// Creates a new random identity using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl std::str::FromStr for PlayerIdentity {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl std::fmt::Display for PlayerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of local player information consulted while logging in.
///
/// Every accessor is optional; a provider that returns `None` across the
/// board produces an anonymous login.
pub trait IdentityProvider: Send + Sync {
    /// Player nickname to advertise to the server, if any.
    fn nickname(&self) -> Option<String>;

    /// Extra game-specific URL options to append at login, if any.
    fn game_login_options(&self) -> Option<String>;

    /// Preferred network identity to log in with, if any.
    fn preferred_identity(&self) -> Option<PlayerIdentity>;
}

/// Identity provider with values fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    pub nickname: Option<String>,
    pub login_options: Option<String>,
    pub identity: Option<PlayerIdentity>,
}

impl StaticIdentity {
    pub fn named(nickname: impl Into<String>) -> Self {
        Self {
            nickname: Some(nickname.into()),
            login_options: None,
            identity: Some(PlayerIdentity::new()),
        }
    }
}

impl IdentityProvider for StaticIdentity {
    fn nickname(&self) -> Option<String> {
        self.nickname.clone()
    }

    fn game_login_options(&self) -> Option<String> {
        self.login_options.clone()
    }

    fn preferred_identity(&self) -> Option<PlayerIdentity> {
        self.identity
    }
}

/// Provider for guests: no nickname, no options, no identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousIdentity;

impl IdentityProvider for AnonymousIdentity {
    fn nickname(&self) -> Option<String> {
        None
    }

    fn game_login_options(&self) -> Option<String> {
        None
    }

    fn preferred_identity(&self) -> Option<PlayerIdentity> {
        None
    }
}
