//! A client's link to one node.

use crate::config::ConnectionSettings;
use crate::error::{ConnectionError, Phase};
use futures_util::{SinkExt, StreamExt};
use quorum_core::{
    Capability, CapabilityKind, ConnectionState, Message, MessageReply, MessageType, NodeInfo,
    Payload,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as Frame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Link = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why a request is being sent. Both intents share one exchange; the
/// difference only shows up in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Intent {
    Single,
    Quorum,
}

/// A ready connection to one node.
///
/// A connection only exists once the node has announced its identity. Any
/// transport, timeout or decode failure closes it for good; after that every
/// send fails with [`ConnectionError::Closed`] without touching the network.
/// Methods that talk to the node take `&mut self`, so there is never more than
/// one outstanding request.
pub struct NodeConnection {
    info: NodeInfo,
    address: SocketAddr,
    settings: ConnectionSettings,
    link: Option<Link>,
}

impl NodeConnection {
    /// Dial `address` and wait for the node's identity announcement.
    pub async fn connect(
        address: SocketAddr,
        settings: &ConnectionSettings,
    ) -> Result<Self, ConnectionError> {
        let target = address.to_string();
        let url = format!("ws://{address}");
        tracing::debug!("Dialing {}", url);

        let (mut link, _) = timeout(
            settings.connect_timeout(),
            tokio_tungstenite::connect_async(url.as_str()),
        )
        .await
        .map_err(|_| ConnectionError::Timeout {
            target: target.clone(),
            phase: Phase::Connect,
        })?
        .map_err(|source| ConnectionError::Connect {
            address,
            source: Box::new(source),
        })?;

        let frame = read_frame(
            &mut link,
            settings.handshake_timeout(),
            &target,
            Phase::Handshake,
        )
        .await?;
        let info: NodeInfo = settings
            .codec()
            .decode(&frame)
            .map_err(|source| ConnectionError::Decode { target, source })?;

        tracing::info!(
            "Connected to node {} at {} ({} capabilities)",
            info.name(),
            address,
            info.capabilities().len()
        );

        Ok(Self {
            info,
            address,
            settings: *settings,
            link: Some(link),
        })
    }

    pub fn name(&self) -> &str {
        self.info.name()
    }

    pub fn info(&self) -> &NodeInfo {
        &self.info
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn capabilities(&self) -> &[Capability] {
        self.info.capabilities()
    }

    pub fn declares(&self, kind: CapabilityKind) -> bool {
        self.info.declares(kind)
    }

    pub fn state(&self) -> ConnectionState {
        if self.link.is_some() {
            ConnectionState::Ready
        } else {
            ConnectionState::Closed
        }
    }

    pub fn is_closed(&self) -> bool {
        self.link.is_none()
    }

    /// Send one request and wait for its reply.
    pub async fn send(
        &mut self,
        op: impl Into<MessageType>,
        payload: Payload,
    ) -> Result<MessageReply, ConnectionError> {
        self.exchange(Intent::Single, Message::new(op, payload)).await
    }

    /// Send one request that is part of a quorum operation.
    ///
    /// The wire exchange is the same as [`send`](Self::send). Whether enough
    /// nodes are addressed is checked before dispatch, by whoever built the
    /// operation's options.
    pub async fn send_threshold(
        &mut self,
        op: impl Into<MessageType>,
        payload: Payload,
    ) -> Result<MessageReply, ConnectionError> {
        self.exchange(Intent::Quorum, Message::new(op, payload)).await
    }

    pub(crate) async fn dispatch(
        &mut self,
        intent: Intent,
        op: MessageType,
        payload: Payload,
    ) -> Result<MessageReply, ConnectionError> {
        self.exchange(intent, Message::new(op, payload)).await
    }

    /// Close the link. Further sends fail with [`ConnectionError::Closed`].
    pub async fn shutdown(&mut self) {
        if let Some(mut link) = self.link.take() {
            match timeout(self.settings.request_timeout(), link.close(None)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::debug!("Error closing link to {}: {}", self.info.name(), e)
                }
                Err(_) => tracing::debug!("Timed out closing link to {}", self.info.name()),
            }
            tracing::info!("Disconnected from node {}", self.info.name());
        }
    }

    async fn exchange(
        &mut self,
        intent: Intent,
        message: Message,
    ) -> Result<MessageReply, ConnectionError> {
        let node = self.info.name().to_string();
        let Some(link) = self.link.as_mut() else {
            return Err(ConnectionError::Closed { node });
        };

        let codec = self.settings.codec();
        let frame = codec
            .encode(&message)
            .map_err(|source| ConnectionError::Encode {
                node: node.clone(),
                source,
            })?;

        tracing::debug!(
            "Sending {} to {} ({:?}, {} bytes)",
            message.message_type(),
            node,
            intent,
            frame.len()
        );

        let outcome = round_trip(link, frame, &self.settings, &node).await;
        if let Err(e) = &outcome {
            tracing::warn!("Closing connection to {}: {}", node, e);
            self.link = None;
        }
        outcome
    }
}

impl std::fmt::Debug for NodeConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeConnection")
            .field("name", &self.info.name())
            .field("address", &self.address)
            .field("state", &self.state())
            .finish()
    }
}

async fn round_trip(
    link: &mut Link,
    frame: Vec<u8>,
    settings: &ConnectionSettings,
    node: &str,
) -> Result<MessageReply, ConnectionError> {
    timeout(settings.request_timeout(), link.send(Frame::Binary(frame.into())))
        .await
        .map_err(|_| ConnectionError::Timeout {
            target: node.to_string(),
            phase: Phase::Send,
        })?
        .map_err(|source| ConnectionError::Transport {
            target: node.to_string(),
            source: Box::new(source),
        })?;

    let reply = read_frame(link, settings.request_timeout(), node, Phase::Receive).await?;
    settings
        .codec()
        .decode(&reply)
        .map_err(|source| ConnectionError::Decode {
            target: node.to_string(),
            source,
        })
}

/// Wait for the next binary frame, skipping control frames.
async fn read_frame(
    link: &mut Link,
    limit: Duration,
    target: &str,
    phase: Phase,
) -> Result<Vec<u8>, ConnectionError> {
    let read = async {
        loop {
            match link.next().await {
                Some(Ok(Frame::Binary(bytes))) => return Ok(bytes.to_vec()),
                Some(Ok(Frame::Ping(_) | Frame::Pong(_))) => continue,
                Some(Ok(Frame::Close(_))) | None => {
                    return Err(ConnectionError::Disconnected {
                        target: target.to_string(),
                    });
                }
                Some(Ok(_)) => {
                    return Err(ConnectionError::UnexpectedFrame {
                        target: target.to_string(),
                    });
                }
                Some(Err(source)) => {
                    return Err(ConnectionError::Transport {
                        target: target.to_string(),
                        source: Box::new(source),
                    });
                }
            }
        }
    };

    timeout(limit, read)
        .await
        .map_err(|_| ConnectionError::Timeout {
            target: target.to_string(),
            phase,
        })?
}
