//! Accept loop and request routing.

use futures_util::{SinkExt, StreamExt};
use quorum_core::{Codec, Message, MessageReply, NodeInfo, Service};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as Frame;

/// A named node hosting a set of services.
pub struct Node {
    info: NodeInfo,
    services: Vec<Arc<dyn Service>>,
    codec: Codec,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            info: NodeInfo::new(name, []),
            services: Vec::new(),
            codec: Codec::default(),
        }
    }

    /// Host `service`. Services added earlier win when several accept the
    /// same operation.
    pub fn with_service(mut self, service: impl Service + 'static) -> Self {
        self.services.push(Arc::new(service));
        self.info = NodeInfo::new(
            self.info.name(),
            self.services.iter().map(|s| s.capability()),
        );
        self
    }

    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    pub fn name(&self) -> &str {
        self.info.name()
    }

    /// What the node announces to connecting clients.
    pub fn info(&self) -> &NodeInfo {
        &self.info
    }

    /// Route `message` to the first service accepting its operation.
    pub fn dispatch(&self, message: &Message) -> MessageReply {
        let op = message.message_type();
        match self.services.iter().find(|s| s.accepts(op)) {
            Some(service) => {
                tracing::debug!("{} handling {}", self.name(), op);
                service.handle(message)
            }
            None => {
                tracing::warn!("{} has no service for {}", self.name(), op);
                MessageReply::error(format!("no service for {op}"))
            }
        }
    }

    /// Serve clients from `listener` until an accept fails.
    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        let (_keep_running, shutdown) = watch::channel(());
        Arc::new(self).run(listener, shutdown).await
    }

    /// Bind `addr` and serve in the background. Port 0 picks a free port;
    /// [`NodeHandle::address`] reports the one chosen.
    pub async fn spawn(self, addr: impl ToSocketAddrs) -> anyhow::Result<NodeHandle> {
        let listener = TcpListener::bind(addr).await?;
        let address = listener.local_addr()?;
        let name = self.name().to_string();
        let (stop, shutdown) = watch::channel(());
        let task = tokio::spawn(Arc::new(self).run(listener, shutdown));
        Ok(NodeHandle {
            name,
            address,
            stop,
            task,
        })
    }

    async fn run(
        self: Arc<Self>,
        listener: TcpListener,
        mut shutdown: watch::Receiver<()>,
    ) -> anyhow::Result<()> {
        tracing::info!(
            "Node {} listening on ws://{}",
            self.name(),
            listener.local_addr()?
        );

        loop {
            let (stream, peer) = tokio::select! {
                accepted = listener.accept() => accepted?,
                _ = shutdown.changed() => break,
            };
            let node = self.clone();
            let shutdown = shutdown.clone();

            tokio::spawn(async move {
                if let Err(e) = node.handle_connection(stream, peer, shutdown).await {
                    tracing::warn!("Connection error from {}: {}", peer, e);
                }
            });
        }

        tracing::info!("Node {} stopped", self.name());
        Ok(())
    }

    async fn handle_connection(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        mut shutdown: watch::Receiver<()>,
    ) -> anyhow::Result<()> {
        let ws = tokio_tungstenite::accept_async(stream).await?;
        let (mut sink, mut stream) = ws.split();

        tracing::debug!("New connection from {}", peer);

        // Identity goes out before anything is read.
        sink.send(Frame::Binary(self.codec.encode(&self.info)?.into()))
            .await?;

        loop {
            let frame = tokio::select! {
                frame = stream.next() => frame,
                _ = shutdown.changed() => break,
            };

            match frame {
                Some(Ok(Frame::Binary(bytes))) => {
                    let reply = match self.codec.decode::<Message>(&bytes) {
                        Ok(message) => self.dispatch(&message),
                        Err(e) => {
                            tracing::warn!("Malformed request from {}: {}", peer, e);
                            MessageReply::error(format!("malformed request: {e}"))
                        }
                    };
                    sink.send(Frame::Binary(self.codec.encode(&reply)?.into()))
                        .await?;
                }
                Some(Ok(Frame::Text(_))) => {
                    tracing::warn!("Text frame from {}", peer);
                    let reply = MessageReply::error("unexpected non-binary frame");
                    sink.send(Frame::Binary(self.codec.encode(&reply)?.into()))
                        .await?;
                }
                Some(Ok(Frame::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            }
        }

        tracing::debug!("Connection from {} closed", peer);
        Ok(())
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("info", &self.info)
            .field("services", &self.services.len())
            .finish()
    }
}

/// A node serving in the background.
///
/// Dropping the handle stops the node and closes its open connections.
#[derive(Debug)]
pub struct NodeHandle {
    name: String,
    address: SocketAddr,
    stop: watch::Sender<()>,
    task: JoinHandle<anyhow::Result<()>>,
}

impl NodeHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Stop accepting, close open connections and wait for the accept loop.
    pub async fn shutdown(self) {
        if self.stop.send(()).is_err() {
            // no receivers: the accept loop has already exited
            tracing::debug!("Node {} already stopped", self.name);
        }
        match self.task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Node {} failed: {}", self.name, e),
            Err(e) => tracing::warn!("Node {} task panicked: {}", self.name, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_core::{Capability, CapabilityKind, ClientOp, CommandOp, MessageType, Payload};

    struct Echo(CapabilityKind, MessageType);

    impl Service for Echo {
        fn capability(&self) -> Capability {
            Capability::new(self.0)
        }

        fn accepts(&self, op: MessageType) -> bool {
            op == self.1
        }

        fn handle(&self, message: &Message) -> MessageReply {
            MessageReply::ok(message.payload().clone())
        }
    }

    #[test]
    fn info_lists_hosted_capabilities() {
        let node = Node::new("mix-a")
            .with_service(Echo(CapabilityKind::Upload, ClientOp::UploadToBoard.into()))
            .with_service(Echo(
                CapabilityKind::BoardManagement,
                CommandOp::SuspendBoard.into(),
            ));
        assert_eq!(node.name(), "mix-a");
        assert!(node.info().declares(CapabilityKind::Upload));
        assert!(node.info().declares(CapabilityKind::BoardManagement));
        assert!(!node.info().declares(CapabilityKind::Signing));
    }

    #[test]
    fn dispatch_routes_by_operation() {
        let node =
            Node::new("mix-a").with_service(Echo(CapabilityKind::Upload, ClientOp::UploadToBoard.into()));

        let reply = node.dispatch(&Message::new(
            ClientOp::UploadToBoard,
            Payload::new(vec![7]),
        ));
        assert!(reply.is_ok());
        assert_eq!(reply.payload().as_bytes(), &[7]);

        let reply = node.dispatch(&Message::new(CommandOp::ActivateBoard, Payload::empty()));
        let err = reply.into_result().unwrap_err();
        assert_eq!(err.reason, "no service for command:activate_board");
    }

    #[tokio::test]
    async fn text_frame_gets_an_error_reply() {
        use futures_util::{SinkExt, StreamExt};
        use std::time::Duration;

        let handle = Node::new("mix-a")
            .with_service(Echo(CapabilityKind::Upload, ClientOp::UploadToBoard.into()))
            .spawn("127.0.0.1:0")
            .await
            .unwrap();
        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}", handle.address()))
            .await
            .unwrap();

        let next_binary = |frame: Option<Result<Frame, tokio_tungstenite::tungstenite::Error>>| match frame {
            Some(Ok(Frame::Binary(bytes))) => bytes,
            other => panic!("expected binary frame, got {other:?}"),
        };
        let hello: NodeInfo = Codec::default()
            .decode(&next_binary(ws.next().await))
            .unwrap();
        assert_eq!(hello.name(), "mix-a");

        ws.send(Frame::Text("hi".into())).await.unwrap();
        let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .unwrap();
        let reply: MessageReply = Codec::default().decode(&next_binary(frame)).unwrap();
        assert_eq!(
            reply.into_result().unwrap_err().reason,
            "unexpected non-binary frame"
        );

        // the connection stays usable
        let request = Message::new(ClientOp::UploadToBoard, Payload::new(vec![1]));
        ws.send(Frame::Binary(Codec::default().encode(&request).unwrap().into()))
            .await
            .unwrap();
        let reply: MessageReply = Codec::default().decode(&next_binary(ws.next().await)).unwrap();
        assert!(reply.is_ok());

        handle.shutdown().await;
    }

    #[test]
    fn first_accepting_service_wins() {
        struct Refuse;
        impl Service for Refuse {
            fn capability(&self) -> Capability {
                Capability::new(CapabilityKind::Upload)
            }
            fn accepts(&self, _op: MessageType) -> bool {
                true
            }
            fn handle(&self, _message: &Message) -> MessageReply {
                MessageReply::error("refused")
            }
        }

        let node = Node::new("mix-a")
            .with_service(Refuse)
            .with_service(Echo(CapabilityKind::Upload, ClientOp::UploadToBoard.into()));
        let reply = node.dispatch(&Message::new(ClientOp::UploadToBoard, Payload::empty()));
        assert!(!reply.is_ok());
        assert_eq!(node.info().capabilities().len(), 1);
    }
}
