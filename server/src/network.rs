//! Server network layer: WebSocket sessions, static assets, and the hub that
//! owns the shared game

use crate::assets;
use crate::client_manager::ClientManager;
use crate::error::ServerError;
use crate::game::GameState;
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::Uri;
use axum::response::{IntoResponse, Response};
use axum::Router;
use chrono::{SecondsFormat, Utc};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{ClientEvent, Mark, ServerEvent, ANONYMOUS_USER, WELCOME_MESSAGE};
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::timeout;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Messages sent from connection tasks to the hub
#[derive(Debug)]
pub enum HubCommand {
    Connected {
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<String>,
        reply: oneshot::Sender<u32>,
    },
    Inbound {
        client_id: u32,
        text: String,
    },
    Disconnected {
        client_id: u32,
    },
}

/// Cloneable handle connection tasks use to reach the hub.
#[derive(Debug, Clone)]
pub struct HubHandle {
    hub_tx: mpsc::UnboundedSender<HubCommand>,
}

impl HubHandle {
    /// Registers a connection and waits for its id. The hub sends `init`
    /// on `sender` before replying.
    pub async fn connect(
        &self,
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<String>,
    ) -> Result<u32, ServerError> {
        let (reply, reply_rx) = oneshot::channel();
        self.hub_tx
            .send(HubCommand::Connected {
                addr,
                sender,
                reply,
            })
            .map_err(|_| ServerError::HubClosed)?;
        reply_rx.await.map_err(|_| ServerError::HubClosed)
    }

    pub fn inbound(&self, client_id: u32, text: String) -> Result<(), ServerError> {
        self.hub_tx
            .send(HubCommand::Inbound { client_id, text })
            .map_err(|_| ServerError::HubClosed)
    }

    pub fn disconnect(&self, client_id: u32) -> Result<(), ServerError> {
        self.hub_tx
            .send(HubCommand::Disconnected { client_id })
            .map_err(|_| ServerError::HubClosed)
    }
}

/// Single owner of the board, the turn flag and the connection registry.
///
/// Every mutation arrives as a `HubCommand` on one queue and is handled to
/// completion before the next, so no locks guard the game.
pub struct Hub {
    clients: ClientManager,
    game_state: GameState,
    hub_rx: mpsc::UnboundedReceiver<HubCommand>,
}

impl Hub {
    pub fn new() -> (Self, HubHandle) {
        let (hub_tx, hub_rx) = mpsc::unbounded_channel();
        let hub = Hub {
            clients: ClientManager::new(),
            game_state: GameState::new(),
            hub_rx,
        };
        (hub, HubHandle { hub_tx })
    }

    pub fn clients(&self) -> &ClientManager {
        &self.clients
    }

    pub fn game_state(&self) -> &GameState {
        &self.game_state
    }

    /// Runs until every handle has been dropped.
    pub async fn run(mut self) {
        while let Some(command) = self.hub_rx.recv().await {
            self.handle_command(command);
        }
        info!("Hub shutting down");
    }

    pub fn handle_command(&mut self, command: HubCommand) {
        match command {
            HubCommand::Connected {
                addr,
                sender,
                reply,
            } => {
                let client_id = self.register(addr, sender);
                if reply.send(client_id).is_err() {
                    // The connection task went away while we were registering it.
                    self.clients.remove_client(&client_id);
                }
            }
            HubCommand::Inbound { client_id, text } => {
                if let Err(e) = self.handle_inbound(client_id, &text) {
                    warn!("Ignoring payload from client {}: {}", client_id, e);
                }
            }
            HubCommand::Disconnected { client_id } => {
                self.clients.remove_client(&client_id);
            }
        }
    }

    fn register(&mut self, addr: SocketAddr, sender: mpsc::UnboundedSender<String>) -> u32 {
        let client_id = self.clients.add_client(addr, sender);
        let init = ServerEvent::init(WELCOME_MESSAGE, &self.game_state.snapshot());

        match init.to_json() {
            Ok(text) => {
                self.clients.send_to(client_id, text);
            }
            Err(e) => error!("Failed to encode init for client {}: {}", client_id, e),
        }

        client_id
    }

    fn handle_inbound(&mut self, client_id: u32, text: &str) -> Result<(), ServerError> {
        let event = ClientEvent::from_json(text)?;

        match event {
            ClientEvent::Message { user, content } => {
                let user = user
                    .filter(|user| !user.is_empty())
                    .unwrap_or_else(|| ANONYMOUS_USER.to_string());
                let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
                self.broadcast(&ServerEvent::Message {
                    user,
                    content,
                    timestamp,
                })?;
            }
            ClientEvent::Move { index, player } => self.handle_move(client_id, index, player)?,
            ClientEvent::Restart => {
                info!("Client {} restarted the game", client_id);
                self.game_state.reset();
                self.broadcast(&ServerEvent::update_game(&self.game_state.snapshot()))?;
            }
            ClientEvent::Unknown => {
                debug!("Ignoring unknown event type from client {}", client_id);
            }
        }

        Ok(())
    }

    fn handle_move(&mut self, client_id: u32, index: i64, player: Mark) -> Result<(), ServerError> {
        match self.game_state.apply_move(index, player) {
            Ok(_) => self.broadcast(&ServerEvent::update_game(&self.game_state.snapshot())),
            Err(rejection) => {
                debug!("Dropping move from client {}: {}", client_id, rejection);
                Ok(())
            }
        }
    }

    /// Serializes once and queues the frame on every open connection.
    fn broadcast(&self, event: &ServerEvent) -> Result<(), ServerError> {
        let text = event.to_json()?;
        let delivered = self.clients.broadcast(&text);
        debug!("Broadcast to {} of {} clients", delivered, self.clients.len());
        Ok(())
    }
}

/// Listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `host:port` to bind, host may be a name
    pub addr: String,
    /// Directory served to plain HTTP requests
    pub asset_root: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
            asset_root: PathBuf::from(assets::DEFAULT_ASSET_ROOT),
        }
    }
}

#[derive(Clone)]
struct AppState {
    hub: HubHandle,
    asset_root: Arc<PathBuf>,
    shutdown: watch::Receiver<bool>,
}

/// Accepts connections and forwards them to the hub.
pub struct Server {
    listener: TcpListener,
    hub: Hub,
    handle: HubHandle,
    asset_root: PathBuf,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.addr.as_str()).await?;
        info!("Listening on {}", listener.local_addr()?);

        let (hub, handle) = Hub::new();

        Ok(Server {
            listener,
            hub,
            handle,
            asset_root: config.asset_root,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(std::future::pending()).await
    }

    /// Serves until `shutdown` resolves, then closes every open session
    /// with a going-away frame.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let hub_task = tokio::spawn(self.hub.run());
        let (stop_tx, stop_rx) = watch::channel(false);

        let state = AppState {
            hub: self.handle,
            asset_root: Arc::new(self.asset_root),
            shutdown: stop_rx,
        };
        let app = Router::new().fallback(entry).with_state(state);

        let result = axum::serve(
            self.listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Closing open sessions");
            stop_tx.send_replace(true);
        })
        .await;

        hub_task.abort();
        info!("Server stopped");
        Ok(result?)
    }
}

/// Upgrade requests become sessions, everything else is a static asset.
async fn entry(
    ws: Option<WebSocketUpgrade>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
    uri: Uri,
) -> Response {
    match ws {
        Some(ws) => {
            let hub = state.hub.clone();
            let shutdown = state.shutdown.clone();
            ws.on_upgrade(move |socket| handle_socket(socket, addr, hub, shutdown))
        }
        None => assets::load(&state.asset_root, uri.path())
            .await
            .into_response(),
    }
}

/// Resolves once the server starts shutting down or is gone.
async fn stopping(mut shutdown: watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

async fn handle_socket(
    socket: WebSocket,
    addr: SocketAddr,
    hub: HubHandle,
    shutdown: watch::Receiver<bool>,
) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let (close_tx, mut close_rx) = oneshot::channel::<Option<CloseFrame<'static>>>();

    let client_id = match hub.connect(addr, tx).await {
        Ok(client_id) => client_id,
        Err(e) => {
            error!("Failed to register {}: {}", addr, e);
            return;
        }
    };

    // Writer: drains the queue until the reader hands over a closing frame
    // or the hub drops the sender, then completes the close handshake.
    let mut writer = tokio::spawn(async move {
        let farewell = loop {
            tokio::select! {
                queued = rx.recv() => match queued {
                    Some(text) => {
                        if let Err(e) = sink.send(Message::Text(text)).await {
                            debug!("Send to client {} failed: {}", client_id, e);
                            return;
                        }
                    }
                    None => break (&mut close_rx).await.ok().flatten(),
                },
                farewell = &mut close_rx => break farewell.ok().flatten(),
            }
        };

        if let Some(frame) = farewell {
            if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                debug!("Close to client {} failed: {}", client_id, e);
                return;
            }
        }
        // Also flushes the reply to a close the peer started.
        if let Err(e) = sink.close().await {
            debug!("Closing client {} failed: {}", client_id, e);
        }
    });

    let stop = stopping(shutdown);
    tokio::pin!(stop);

    let farewell = loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if hub.inbound(client_id, text).is_err() {
                        break Some(going_away());
                    }
                }
                Some(Ok(Message::Close(_))) | None => break None,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket error on client {}: {}", client_id, e);
                    break None;
                }
            },
            _ = &mut stop => break Some(going_away()),
        }
    };

    let _ = close_tx.send(farewell);
    if let Err(e) = hub.disconnect(client_id) {
        debug!("Could not report disconnect of client {}: {}", client_id, e);
    }

    if timeout(CLOSE_TIMEOUT, &mut writer).await.is_err() {
        debug!("Client {} did not finish closing in time", client_id);
        writer.abort();
    }
}

fn going_away() -> CloseFrame<'static> {
    CloseFrame {
        code: close_code::AWAY,
        reason: "Server shutting down".into(),
    }
}
