//! tokio-tungstenite backed [`SocketFactory`].

use crate::error::TransportError;
use crate::socket::{SocketConnection, SocketEvent, SocketFactory, SocketSink};

use futures_util::{SinkExt, StreamExt};
use log::{debug, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

/// Opens a real websocket per `create` call.
///
/// Must be used from inside a tokio runtime: each link runs on its own task.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketFactory;

enum Outbound {
    Frame(String),
    Close,
}

struct ChannelSink {
    tx: UnboundedSender<Outbound>,
}

impl SocketSink for ChannelSink {
    fn send(&self, frame: String) -> Result<(), TransportError> {
        self.tx
            .send(Outbound::Frame(frame))
            .map_err(|_| TransportError::closed())
    }

    fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }
}

impl SocketFactory for WebSocketFactory {
    fn create(&self, url: &Url) -> SocketConnection {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_link(url.clone(), outbound_rx, event_tx));

        SocketConnection {
            sink: Box::new(ChannelSink { tx: outbound_tx }),
            events: event_rx,
        }
    }
}

async fn run_link(
    url: Url,
    mut outbound: UnboundedReceiver<Outbound>,
    events: UnboundedSender<SocketEvent>,
) {
    let stream = match connect_async(url.as_str()).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            warn!("Failed to open socket to {}: {}", url, e);
            let _ = events.send(SocketEvent::Close);
            return;
        }
    };

    debug!("Socket to {} open", url);
    let _ = events.send(SocketEvent::Open);

    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            next = outbound.recv() => match next {
                Some(Outbound::Frame(text)) => {
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        warn!("Socket write to {} failed: {}", url, e);
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
            },
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(SocketEvent::Message(text.as_str().as_bytes().to_vec()));
                }
                Some(Ok(Message::Binary(data))) => {
                    let _ = events.send(SocketEvent::Message(data.to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Socket read from {} failed: {}", url, e);
                    break;
                }
            },
        }
    }

    debug!("Socket to {} closed", url);
    let _ = events.send(SocketEvent::Close);
}
