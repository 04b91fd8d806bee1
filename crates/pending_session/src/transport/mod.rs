//! Transport abstractions for control traffic.
//!
//! The session owns exactly one [`ControlTransport`] for its lifetime and
//! drives it from `tick`: drain [`ControlTransport::try_receive`], handle
//! each message, then [`ControlTransport::flush`]. Every method is
//! non-blocking; transports that sit on real sockets pump them from
//! background tasks and expose the results through these polls.
//!
//! Transports are produced by a [`TransportFactory`] injected into the
//! session at construction, so connection acquisition is testable and free
//! of process-wide registries.

pub mod channel;
pub mod ws;

use crate::protocol::{ControlMessage, NetGuid};
use crate::url::ServerUrl;
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::debug;

/// Observable state of a transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Open,
    Closed,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to create connection to {0}")]
    CreateFailed(String),

    #[error("connection is closed")]
    Closed,

    #[error("send failed: {0}")]
    Send(String),
}

/// A bidirectional control-message channel to one server.
pub trait ControlTransport: Send {
    /// Queues a message for delivery. Nothing reaches the wire until
    /// [`ControlTransport::flush`].
    fn send(&mut self, message: &ControlMessage) -> Result<(), TransportError>;

    /// Pushes all queued outgoing messages to the peer.
    fn flush(&mut self) -> Result<(), TransportError>;

    /// Next pending inbound message, if one has arrived. Never blocks.
    fn try_receive(&mut self) -> Option<ControlMessage>;

    /// Current connection state.
    fn state(&self) -> TransportState;

    /// Closes the connection. Further sends fail with
    /// [`TransportError::Closed`].
    fn close(&mut self);

    /// Resolver binding network object identifiers to content paths.
    fn package_map(&self) -> &dyn PackageMap;
}

/// Produces transport connections for the session.
pub trait TransportFactory: Send + Sync {
    fn create_connection(&self, url: &ServerUrl) -> Result<Box<dyn ControlTransport>, TransportError>;
}

/// Binds network object identifiers to loadable content paths.
pub trait PackageMap: Send + Sync {
    fn resolve_path_and_assign_guid(&self, guid: NetGuid, path: &str);
}

/// Shared guid → path registry, safe to read from other threads while the
/// session keeps assigning.
#[derive(Debug, Clone, Default)]
pub struct SharedPackageMap {
    entries: Arc<DashMap<NetGuid, String>>,
}

impl SharedPackageMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path previously bound to `guid`, if any.
    pub fn path_for(&self, guid: NetGuid) -> Option<String> {
        self.entries.get(&guid).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PackageMap for SharedPackageMap {
    fn resolve_path_and_assign_guid(&self, guid: NetGuid, path: &str) {
        debug!("assigning net guid {guid} to path {path}");
        self.entries.insert(guid, path.to_string());
    }
}

/// Factory over a connection established ahead of time.
///
/// Useful when the connection requires async setup (the WebSocket transport)
/// or comes from a test harness: establish it, park it here, and hand the
/// factory to [`crate::PendingSession::initiate`]. An empty factory reports
/// [`TransportError::CreateFailed`].
#[derive(Default)]
pub struct PreparedTransportFactory {
    slot: Mutex<Option<Box<dyn ControlTransport>>>,
}

impl PreparedTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(transport: Box<dyn ControlTransport>) -> Self {
        Self {
            slot: Mutex::new(Some(transport)),
        }
    }

    /// Parks a connection for the next `create_connection` call.
    pub fn prepare(&self, transport: Box<dyn ControlTransport>) {
        *self.slot.lock().expect("transport slot poisoned") = Some(transport);
    }
}

impl TransportFactory for PreparedTransportFactory {
    fn create_connection(&self, url: &ServerUrl) -> Result<Box<dyn ControlTransport>, TransportError> {
        self.slot
            .lock()
            .expect("transport slot poisoned")
            .take()
            .ok_or_else(|| TransportError::CreateFailed(url.to_string()))
    }
}
