//! WebSocket server for handling client connections
//!
//! Accepts WebSocket connections, forwards every text frame to the relay hub
//! and writes whatever the hub queues for the connection back to the socket.
//! Also serves the relay information document over plain HTTP.

use crate::config::RelayConfig;
use crate::connection::{ConnectionId, Outbound};
use crate::error::{RelayError, Result};
use crate::hub::RelayHandle;
use crate::message::RelayMessage;
use crate::metrics::RelayMetrics;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use warp::Filter as WarpFilter;

/// Relay server
pub struct RelayServer {
    config: RelayConfig,
    relay: RelayHandle,
}

impl RelayServer {
    /// Create a server that feeds the given hub
    pub fn new(config: RelayConfig, relay: RelayHandle) -> Self {
        Self { config, relay }
    }

    /// Bind the configured address and serve connections forever
    pub async fn start(&self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        info!("Relay listening on {}", listener.local_addr()?);

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    debug!("New connection from {}", addr);
                    let relay = self.relay.clone();
                    let max_message_size = self.config.max_message_size;
                    let idle_timeout = self.config.idle_timeout;
                    tokio::spawn(async move {
                        if let Err(e) =
                            handle_connection(stream, addr, relay, max_message_size, idle_timeout)
                                .await
                        {
                            error!("Error handling connection from {}: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }

    /// Serve the relay information document on `GET /`
    pub async fn start_info_server(&self, http_addr: SocketAddr) -> Result<()> {
        let relay_info = self.config.relay_info.clone();

        let info_route = warp::get()
            .and(warp::path::end())
            .map(move || {
                debug!("GET /");
                warp::reply::with_header(
                    warp::reply::json(&relay_info),
                    "Content-Type",
                    "application/nostr+json",
                )
            })
            .with(warp::reply::with::header(
                "Access-Control-Allow-Origin",
                "*",
            ))
            .with(warp::reply::with::header(
                "Access-Control-Allow-Headers",
                "*",
            ))
            .with(warp::reply::with::header(
                "Access-Control-Allow-Methods",
                "GET, OPTIONS",
            ));

        info!("Relay info server listening on http://{}", http_addr);
        warp::serve(info_route).run(http_addr).await;
        Ok(())
    }
}

/// Handle a single WebSocket connection
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    relay: RelayHandle,
    max_message_size: usize,
    idle_timeout: Duration,
) -> Result<()> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| RelayError::WebSocket(e.to_string()))?;

    let (mut write, mut read) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let id = relay.open(tx)?;
    let metrics = relay.metrics();
    info!("WebSocket connection established: {} ({})", id, addr);

    let idle = sleep(idle_timeout);
    tokio::pin!(idle);

    let result = loop {
        tokio::select! {
            msg = read.next() => {
                idle.as_mut().reset(Instant::now() + idle_timeout);
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        metrics.bytes_in(text.len() as u64);
                        if text.len() > max_message_size {
                            warn!(
                                "Message from {} exceeds size limit: {} > {}",
                                id,
                                text.len(),
                                max_message_size
                            );
                            let notice = format!(
                                "Message too large: {} bytes (max: {})",
                                text.len(),
                                max_message_size
                            );
                            send_notice(&mut write, &metrics, &notice).await;
                            continue;
                        }
                        if let Err(e) = relay.frame(id, text.to_string()) {
                            break Err(e);
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        send_notice(&mut write, &metrics, "Binary frames are not supported").await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break Ok(());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("WebSocket error from {}: {}", id, e);
                        break Ok(());
                    }
                }
            }

            outbound = rx.recv() => {
                match outbound {
                    Some(Outbound::Text(text)) => {
                        metrics.bytes_out(text.len() as u64);
                        if let Err(e) = write.send(Message::Text(text.into())).await {
                            error!("Failed to send to {}: {}", id, e);
                            break Ok(());
                        }
                    }
                    Some(Outbound::Close) | None => break Ok(()),
                }
            }

            _ = &mut idle => {
                info!("Closing idle connection {}", id);
                break Ok(());
            }
        }
    };

    close_connection(&relay, id);
    let _ = write.send(Message::Close(None)).await;
    info!("Connection closed: {} ({})", id, addr);
    result
}

fn close_connection(relay: &RelayHandle, id: ConnectionId) {
    if relay.close(id).is_err() {
        debug!("Hub already stopped while closing {}", id);
    }
}

/// Write a NOTICE straight to the socket, bypassing the hub.
async fn send_notice<S>(write: &mut S, metrics: &RelayMetrics, message: &str)
where
    S: futures::Sink<Message> + Unpin,
{
    let text = RelayMessage::Notice { message }.to_json();
    metrics.bytes_out(text.len() as u64);
    metrics.notice_sent();
    let _ = write.send(Message::Text(text.into())).await;
}
