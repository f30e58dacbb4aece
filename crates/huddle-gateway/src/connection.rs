use std::time::Duration;

use anyhow::{Result, anyhow};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use url::Url;

use huddle_types::events::{ClientCommand, ServerEvent};

use crate::status::ConnectionStatus;

/// Ping cadence; two consecutive missed pongs (~30s) tear the connection
/// down into reconnect.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

const RECONNECT_BASE_DELAY: Duration = Duration::from_secs(1);
const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(5);
const RECONNECT_MAX_ATTEMPTS: u32 = 10;

/// Everything the gateway reports upward, in arrival order.
#[derive(Debug)]
pub enum GatewayNotice {
    /// Transport status changed.
    Status(ConnectionStatus),
    /// A connection was established. `resumed` distinguishes a reconnect
    /// (the coordinator must rejoin and resync) from the first connect.
    Connected { resumed: bool },
    /// A decoded server event.
    Event(ServerEvent),
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway connection task is gone")]
    Closed,
}

/// Cheap clonable handle for sending commands and reading the live status.
#[derive(Debug, Clone)]
pub struct GatewayHandle {
    commands: mpsc::Sender<ClientCommand>,
    status: watch::Receiver<ConnectionStatus>,
}

impl GatewayHandle {
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    pub async fn send(&self, cmd: ClientCommand) -> Result<(), GatewayError> {
        self.commands.send(cmd).await.map_err(|_| GatewayError::Closed)
    }

    /// A handle wired to plain channels instead of a live socket, for
    /// front-ends and tests that drive the coordinator without a server.
    /// Returns the command drain and the status knob.
    pub fn piped(
        initial: ConnectionStatus,
    ) -> (
        Self,
        mpsc::Receiver<ClientCommand>,
        watch::Sender<ConnectionStatus>,
    ) {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (status_tx, status_rx) = watch::channel(initial);
        (
            Self {
                commands: cmd_tx,
                status: status_rx,
            },
            cmd_rx,
            status_tx,
        )
    }
}

/// The realtime channel client. Owns the background connection task.
pub struct Gateway {
    handle: GatewayHandle,
    task: tokio::task::JoinHandle<()>,
}

impl Gateway {
    /// Spawn the connection task against `url`, authenticating with the
    /// session cookie when given. Notices arrive on the returned receiver
    /// until the retry budget is exhausted or the gateway is dropped.
    pub fn connect(
        url: Url,
        session_cookie: Option<String>,
    ) -> (Self, mpsc::Receiver<GatewayNotice>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (notice_tx, notice_rx) = mpsc::channel(256);
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);

        let task = tokio::spawn(run(url, session_cookie, cmd_rx, notice_tx, status_tx));

        (
            Self {
                handle: GatewayHandle {
                    commands: cmd_tx,
                    status: status_rx,
                },
                task,
            },
            notice_rx,
        )
    }

    pub fn handle(&self) -> GatewayHandle {
        self.handle.clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.handle.status()
    }

    pub fn is_connected(&self) -> bool {
        self.handle.is_connected()
    }

    pub async fn send(&self, cmd: ClientCommand) -> Result<(), GatewayError> {
        self.handle.send(cmd).await
    }

    pub fn shutdown(self) {
        self.task.abort();
    }
}

/// Map the HTTP API origin to the realtime endpoint.
pub fn gateway_url(server_url: &str) -> Result<Url> {
    let mut url = Url::parse(server_url)?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow!("cannot derive gateway scheme from {}", server_url))?;
    url.set_path("/ws");
    url.set_query(None);
    Ok(url)
}

enum SessionEnd {
    /// The socket dropped or the server closed; reconnect.
    Transport,
    /// The coordinator went away; shut down for good.
    CommandsClosed,
    NoticesClosed,
}

async fn run(
    url: Url,
    session_cookie: Option<String>,
    mut cmd_rx: mpsc::Receiver<ClientCommand>,
    notices: mpsc::Sender<GatewayNotice>,
    status_tx: watch::Sender<ConnectionStatus>,
) {
    let mut attempt: u32 = 0;
    let mut ever_connected = false;

    loop {
        let status = if attempt == 0 && !ever_connected {
            ConnectionStatus::Connecting
        } else {
            ConnectionStatus::Reconnecting { attempt: attempt.max(1) }
        };
        if !publish_status(&status_tx, &notices, status).await {
            return;
        }

        match open_socket(&url, session_cookie.as_deref()).await {
            Ok(ws) => {
                attempt = 0;
                if !publish_status(&status_tx, &notices, ConnectionStatus::Connected).await {
                    return;
                }
                if notices
                    .send(GatewayNotice::Connected { resumed: ever_connected })
                    .await
                    .is_err()
                {
                    return;
                }
                ever_connected = true;
                info!("gateway connected to {}", url);

                match run_session(ws, &mut cmd_rx, &notices).await {
                    SessionEnd::Transport => {}
                    SessionEnd::CommandsClosed | SessionEnd::NoticesClosed => {
                        debug!("gateway shutting down");
                        return;
                    }
                }
            }
            Err(e) => warn!("gateway connect failed: {}", e),
        }

        attempt += 1;
        if attempt > RECONNECT_MAX_ATTEMPTS {
            warn!(
                "gateway retry budget exhausted after {} attempts",
                RECONNECT_MAX_ATTEMPTS
            );
            publish_status(&status_tx, &notices, ConnectionStatus::Disconnected).await;
            return;
        }

        let delay = reconnect_delay(attempt);
        debug!("gateway retrying in {:?} (attempt {})", delay, attempt);
        tokio::time::sleep(delay).await;
    }
}

async fn publish_status(
    status_tx: &watch::Sender<ConnectionStatus>,
    notices: &mpsc::Sender<GatewayNotice>,
    status: ConnectionStatus,
) -> bool {
    status_tx.send_replace(status);
    notices.send(GatewayNotice::Status(status)).await.is_ok()
}

/// 1s doubling to a 5s cap.
fn reconnect_delay(attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1).min(8));
    (RECONNECT_BASE_DELAY * factor).min(RECONNECT_MAX_DELAY)
}

async fn open_socket(
    url: &Url,
    session_cookie: Option<&str>,
) -> Result<WebSocketStream<MaybeTlsStream<TcpStream>>> {
    let mut request = url.as_str().into_client_request()?;
    if let Some(cookie) = session_cookie {
        request
            .headers_mut()
            .insert(tokio_tungstenite::tungstenite::http::header::COOKIE, cookie.parse()?);
    }
    let (ws, _) = connect_async(request).await?;
    Ok(ws)
}

async fn run_session(
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    cmd_rx: &mut mpsc::Receiver<ClientCommand>,
    notices: &mpsc::Sender<GatewayNotice>,
) -> SessionEnd {
    let (mut sink, mut stream) = ws.split();

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;
    let mut pong_received = true;
    let mut missed_heartbeats: u8 = 0;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { return SessionEnd::CommandsClosed };
                let text = match serde_json::to_string(&cmd) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("unencodable command dropped: {}", e);
                        continue;
                    }
                };
                if sink.send(WsMessage::Text(text)).await.is_err() {
                    return SessionEnd::Transport;
                }
            }

            frame = stream.next() => {
                let Some(Ok(frame)) = frame else {
                    warn!("gateway transport dropped");
                    return SessionEnd::Transport;
                };
                match frame {
                    WsMessage::Text(text) => match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => {
                            if notices.send(GatewayNotice::Event(event)).await.is_err() {
                                return SessionEnd::NoticesClosed;
                            }
                        }
                        Err(e) => {
                            let preview: String = text.chars().take(200).collect();
                            warn!("bad server frame: {} -- raw: {}", e, preview);
                        }
                    },
                    WsMessage::Ping(payload) => {
                        if sink.send(WsMessage::Pong(payload)).await.is_err() {
                            return SessionEnd::Transport;
                        }
                    }
                    WsMessage::Pong(_) => {
                        pong_received = true;
                    }
                    WsMessage::Close(_) => {
                        info!("gateway closed by server");
                        return SessionEnd::Transport;
                    }
                    _ => {}
                }
            }

            _ = heartbeat.tick() => {
                if pong_received {
                    missed_heartbeats = 0;
                } else {
                    missed_heartbeats += 1;
                    if missed_heartbeats >= 2 {
                        warn!("heartbeat timeout (missed {} pongs)", missed_heartbeats);
                        return SessionEnd::Transport;
                    }
                }
                pong_received = false;
                if sink.send(WsMessage::Ping(Vec::new())).await.is_err() {
                    return SessionEnd::Transport;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_to_the_cap() {
        assert_eq!(reconnect_delay(1), Duration::from_secs(1));
        assert_eq!(reconnect_delay(2), Duration::from_secs(2));
        assert_eq!(reconnect_delay(3), Duration::from_secs(4));
        assert_eq!(reconnect_delay(4), Duration::from_secs(5));
        assert_eq!(reconnect_delay(10), Duration::from_secs(5));
    }

    #[test]
    fn gateway_url_maps_schemes() {
        assert_eq!(
            gateway_url("http://chat.corp.local:8080").unwrap().as_str(),
            "ws://chat.corp.local:8080/ws"
        );
        assert_eq!(
            gateway_url("https://chat.corp.local/api").unwrap().as_str(),
            "wss://chat.corp.local/ws"
        );
    }

    #[tokio::test]
    async fn piped_handle_reports_status_and_drains_commands() {
        let (handle, mut cmd_rx, status_tx) = GatewayHandle::piped(ConnectionStatus::Connected);
        assert!(handle.is_connected());

        handle
            .send(ClientCommand::JoinRoom { room_id: 5 })
            .await
            .unwrap();
        match cmd_rx.recv().await {
            Some(ClientCommand::JoinRoom { room_id }) => assert_eq!(room_id, 5),
            other => panic!("unexpected command: {:?}", other),
        }

        status_tx.send_replace(ConnectionStatus::Reconnecting { attempt: 2 });
        assert!(!handle.is_connected());
    }
}
