//! WebSocket transport adapter.
//!
//! Control messages travel as tagged-JSON text frames over a WebSocket. A
//! reader task decodes inbound frames into a queue the session polls with
//! `try_receive`; `flush` hands buffered sends to a writer task. The session
//! side never blocks.

use super::{ControlTransport, PackageMap, SharedPackageMap, TransportError, TransportState};
use crate::protocol::ControlMessage;
use crate::url::ServerUrl;
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

enum WriterCommand {
    Frame(String),
    Close,
}

/// Transport over a WebSocket connection.
pub struct WsTransport {
    outgoing: Vec<ControlMessage>,
    inbound: std_mpsc::Receiver<ControlMessage>,
    writer: mpsc::UnboundedSender<WriterCommand>,
    closed: Arc<AtomicBool>,
    package_map: SharedPackageMap,
}

impl WsTransport {
    /// Establishes a WebSocket connection to `ws://host:port` and spawns the
    /// frame pump tasks. Must run inside a tokio runtime.
    pub async fn connect(url: &ServerUrl) -> Result<Self, TransportError> {
        let endpoint = format!("ws://{}:{}", url.host, url.port);
        let (stream, _) = connect_async(endpoint.as_str())
            .await
            .map_err(|e| TransportError::CreateFailed(format!("{endpoint}: {e}")))?;
        debug!("websocket connected to {endpoint}");

        let (mut write, mut read) = stream.split();
        let closed = Arc::new(AtomicBool::new(false));

        let (inbound_tx, inbound_rx) = std_mpsc::channel();
        let reader_closed = closed.clone();
        tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str(text.as_str()) {
                        Ok(message) => {
                            if inbound_tx.send(message).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("dropping undecodable control frame: {e}"),
                    },
                    Ok(Message::Close(_)) => {
                        debug!("server closed websocket");
                        break;
                    }
                    Err(e) => {
                        warn!("websocket read error: {e}");
                        break;
                    }
                    _ => {}
                }
            }
            reader_closed.store(true, Ordering::SeqCst);
        });

        let (writer_tx, mut writer_rx) = mpsc::unbounded_channel();
        let writer_closed = closed.clone();
        tokio::spawn(async move {
            while let Some(command) = writer_rx.recv().await {
                match command {
                    WriterCommand::Frame(json) => {
                        if let Err(e) = write.send(Message::Text(json.into())).await {
                            warn!("websocket write error: {e}");
                            break;
                        }
                    }
                    WriterCommand::Close => {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            writer_closed.store(true, Ordering::SeqCst);
        });

        Ok(Self {
            outgoing: Vec::new(),
            inbound: inbound_rx,
            writer: writer_tx,
            closed,
            package_map: SharedPackageMap::new(),
        })
    }

    /// The guid → path registry this transport resolves into.
    pub fn shared_package_map(&self) -> SharedPackageMap {
        self.package_map.clone()
    }
}

impl ControlTransport for WsTransport {
    fn send(&mut self, message: &ControlMessage) -> Result<(), TransportError> {
        if self.state() == TransportState::Closed {
            return Err(TransportError::Closed);
        }
        self.outgoing.push(message.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        for message in self.outgoing.drain(..) {
            let json = serde_json::to_string(&message)
                .map_err(|e| TransportError::Send(e.to_string()))?;
            if self.writer.send(WriterCommand::Frame(json)).is_err() {
                self.closed.store(true, Ordering::SeqCst);
                return Err(TransportError::Closed);
            }
        }
        Ok(())
    }

    fn try_receive(&mut self) -> Option<ControlMessage> {
        match self.inbound.try_recv() {
            Ok(message) => Some(message),
            Err(std_mpsc::TryRecvError::Empty) => None,
            Err(std_mpsc::TryRecvError::Disconnected) => {
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
        let _ = self.writer.send(WriterCommand::Close);
    }

    fn package_map(&self) -> &dyn PackageMap {
        &self.package_map
    }
}
