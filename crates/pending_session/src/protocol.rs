//! Control message definitions for the join handshake.
//!
//! Control messages are the small typed payloads exchanged while a connection
//! is being established, distinct from in-game replication traffic. Each kind
//! is produced by one side and consumed by the other; a message is immutable
//! once constructed.
//!
//! The logical shape (tag + payload) is defined here; how a transport frames
//! these on the wire is the transport's concern. The provided WebSocket
//! transport serializes them as tagged JSON objects.

use crate::identity::PlayerIdentity;
use serde::{Deserialize, Serialize};

/// Network protocol version advertised in the initial `Hello`.
///
/// Bumped whenever the control-message vocabulary or the replication layer
/// changes incompatibly. Servers reject mismatched clients with `Upgrade`.
pub const LOCAL_NETWORK_VERSION: u32 = 3;

/// Network object identifier assigned by the server.
///
/// The server hands these out during and after the welcome phase so the
/// client can bind replicated objects to loadable content paths before any
/// game traffic flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetGuid(pub u32);

impl std::fmt::Display for NetGuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A control message exchanged during connection setup.
///
/// The handshake consumes inbound variants in the order the transport
/// delivers them and produces outbound variants synchronously in response.
///
/// # Direction
///
/// * Client → server: `Hello`, `Login`, `Netspeed`, `Join`
/// * Server → client: `Upgrade`, `Challenge`, `Welcome`, `Failure`,
///   `GuidAssign`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Initial client greeting: platform endianness and network version.
    Hello {
        is_little_endian: bool,
        network_version: u32,
    },

    /// Server telling the client its network version is incompatible.
    Upgrade { remote_version: u32 },

    /// Server challenge issued before login.
    Challenge { token: String },

    /// Client login: challenge response, travel URL, and optional identity.
    Login {
        response: String,
        url: String,
        identity: Option<PlayerIdentity>,
    },

    /// Server accepting the connection: destination map, game mode, and an
    /// optional redirect to download content from.
    Welcome {
        map_name: String,
        game_name: String,
        redirect_url: String,
    },

    /// Client bandwidth declaration, sent once welcomed.
    Netspeed { rate: u32 },

    /// Client request to actually enter the match.
    Join,

    /// Server closing the attempt, with a reason to show the user.
    Failure { message: String },

    /// Server binding a network object identifier to a content path.
    GuidAssign { guid: NetGuid, path: String },
}

impl ControlMessage {
    /// Human-readable name of the message kind, for logging.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ControlMessage::Hello { .. } => "Hello",
            ControlMessage::Upgrade { .. } => "Upgrade",
            ControlMessage::Challenge { .. } => "Challenge",
            ControlMessage::Login { .. } => "Login",
            ControlMessage::Welcome { .. } => "Welcome",
            ControlMessage::Netspeed { .. } => "Netspeed",
            ControlMessage::Join => "Join",
            ControlMessage::Failure { .. } => "Failure",
            ControlMessage::GuidAssign { .. } => "GuidAssign",
        }
    }

    /// Whether this kind is one the server sends to the client.
    ///
    /// Inbound messages that fail this check are dropped by the session as
    /// protocol violations rather than treated as fatal.
    pub fn is_client_bound(&self) -> bool {
        matches!(
            self,
            ControlMessage::Upgrade { .. }
                | ControlMessage::Challenge { .. }
                | ControlMessage::Welcome { .. }
                | ControlMessage::Failure { .. }
                | ControlMessage::GuidAssign { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_tags_are_stable_snake_case() {
        let json = serde_json::to_value(ControlMessage::GuidAssign {
            guid: NetGuid(7),
            path: "/Game/Maps/Highlands".to_string(),
        })
        .unwrap();

        assert_eq!(json["type"], "guid_assign");
        assert_eq!(json["guid"], 7);
        assert_eq!(json["path"], "/Game/Maps/Highlands");
    }

    #[test]
    fn direction_split_covers_all_kinds() {
        let inbound = [
            ControlMessage::Upgrade { remote_version: 1 },
            ControlMessage::Challenge {
                token: "t".to_string(),
            },
            ControlMessage::Welcome {
                map_name: String::new(),
                game_name: String::new(),
                redirect_url: String::new(),
            },
            ControlMessage::Failure {
                message: String::new(),
            },
            ControlMessage::GuidAssign {
                guid: NetGuid(0),
                path: String::new(),
            },
        ];
        let outbound = [
            ControlMessage::Hello {
                is_little_endian: true,
                network_version: LOCAL_NETWORK_VERSION,
            },
            ControlMessage::Login {
                response: "0".to_string(),
                url: String::new(),
                identity: None,
            },
            ControlMessage::Netspeed { rate: 10000 },
            ControlMessage::Join,
        ];

        assert!(inbound.iter().all(ControlMessage::is_client_bound));
        assert!(!outbound.iter().any(ControlMessage::is_client_bound));
    }
}
