//! # Pending Session - Client Connection Establishment
//!
//! This crate implements the client side of the Waypoint join sequence: the
//! multi-step handshake a client walks through between "I have an address"
//! and "the server is ready for me to join the match".
//!
//! ## Handshake Overview
//!
//! A [`PendingSession`] owns a single outbound connection attempt. The owning
//! application creates it with [`PendingSession::initiate`], which acquires a
//! transport connection and sends the initial version/identity message, then
//! drives it once per frame with [`PendingSession::tick`]:
//!
//! 1. Client sends `Hello` (endianness + network version)
//! 2. Server answers `Challenge`; client replies `Login` with its travel URL
//!    and player identity
//! 3. Server answers `Welcome` (map, game mode, optional redirect); client
//!    acknowledges with `Netspeed`
//! 4. The owner calls [`PendingSession::send_join`] to request a player slot
//!
//! Incompatible versions (`Upgrade`), server rejections (`Failure`), and
//! silently dropped transports all terminate the attempt with a classified
//! [`SessionError`] that the owner surfaces to the user.
//!
//! ## Design Notes
//!
//! * **No hidden globals** - the transport factory and identity provider are
//!   injected at construction
//! * **Non-blocking** - `tick` polls the transport; it never waits on I/O
//! * **Single owner** - the session has no internal concurrency; one logical
//!   thread drives it, and messages are applied strictly in delivery order

pub mod error;
pub mod identity;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod url;

pub use error::SessionError;
pub use identity::{AnonymousIdentity, IdentityProvider, PlayerIdentity, StaticIdentity};
pub use protocol::{ControlMessage, NetGuid, LOCAL_NETWORK_VERSION};
pub use session::{PendingSession, SessionConfig, SessionState};
pub use transport::{
    ControlTransport, PackageMap, PreparedTransportFactory, SharedPackageMap, TransportError,
    TransportFactory, TransportState,
};
pub use url::ServerUrl;
