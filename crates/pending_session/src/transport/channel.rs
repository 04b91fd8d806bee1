//! In-process transport over unbounded channels.
//!
//! [`channel_pair`] wires a [`ChannelTransport`] (the client end, handed to
//! the session) to a [`ServerEndpoint`] the far side scripts by hand. Tests
//! and the loopback demo use this to play the server role without a socket.

use super::{ControlTransport, PackageMap, SharedPackageMap, TransportError, TransportState};
use crate::protocol::ControlMessage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;

/// Client end of an in-process transport pair.
pub struct ChannelTransport {
    outgoing: Vec<ControlMessage>,
    to_server: Sender<ControlMessage>,
    from_server: Receiver<ControlMessage>,
    closed: Arc<AtomicBool>,
    package_map: SharedPackageMap,
}

/// Far end of an in-process transport pair.
///
/// Dropping the endpoint disconnects the pair; the client end observes
/// [`TransportState::Closed`] on its next poll or flush.
pub struct ServerEndpoint {
    from_client: Receiver<ControlMessage>,
    to_client: Sender<ControlMessage>,
}

/// Read-only view of a transport's open/closed flag, usable after the
/// transport itself has been handed off.
#[derive(Debug, Clone)]
pub struct StateProbe(Arc<AtomicBool>);

impl StateProbe {
    pub fn is_closed(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Creates a connected transport/endpoint pair.
pub fn channel_pair() -> (ChannelTransport, ServerEndpoint) {
    let (to_server, from_client) = channel();
    let (to_client, from_server) = channel();
    (
        ChannelTransport {
            outgoing: Vec::new(),
            to_server,
            from_server,
            closed: Arc::new(AtomicBool::new(false)),
            package_map: SharedPackageMap::new(),
        },
        ServerEndpoint {
            from_client,
            to_client,
        },
    )
}

impl ChannelTransport {
    /// The guid → path registry this transport resolves into.
    pub fn shared_package_map(&self) -> SharedPackageMap {
        self.package_map.clone()
    }

    /// Probe observing this transport's state from outside.
    pub fn state_probe(&self) -> StateProbe {
        StateProbe(self.closed.clone())
    }
}

impl ControlTransport for ChannelTransport {
    fn send(&mut self, message: &ControlMessage) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.outgoing.push(message.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        for message in self.outgoing.drain(..) {
            if self.to_server.send(message).is_err() {
                self.closed.store(true, Ordering::SeqCst);
                return Err(TransportError::Closed);
            }
        }
        Ok(())
    }

    fn try_receive(&mut self) -> Option<ControlMessage> {
        if self.closed.load(Ordering::SeqCst) {
            return None;
        }
        match self.from_server.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.closed.store(true, Ordering::SeqCst);
                None
            }
        }
    }

    fn state(&self) -> TransportState {
        if self.closed.load(Ordering::SeqCst) {
            TransportState::Closed
        } else {
            TransportState::Open
        }
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn package_map(&self) -> &dyn PackageMap {
        &self.package_map
    }
}

impl ServerEndpoint {
    /// Delivers a message to the client end. Returns `false` if the client
    /// is gone.
    pub fn send(&self, message: ControlMessage) -> bool {
        self.to_client.send(message).is_ok()
    }

    /// Next message the client has flushed, if any.
    pub fn try_receive(&self) -> Option<ControlMessage> {
        self.from_client.try_recv().ok()
    }

    /// Drains everything the client has flushed so far.
    pub fn drain(&self) -> Vec<ControlMessage> {
        std::iter::from_fn(|| self.try_receive()).collect()
    }
}
