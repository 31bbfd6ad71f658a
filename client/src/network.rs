//! Client session: one logical WebSocket connection with automatic reconnection

use crate::error::ClientError;
use crate::game::BoardView;
use crate::input::{Command, InputManager, HELP_TEXT};
use crate::rendering::Renderer;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use shared::{ClientEvent, ServerEvent};
use std::io::Write;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connecting -> Open -> Closed -> Connecting -> ...
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

enum SessionEnd {
    Closed,
    Quit,
}

pub struct Client<W: Write> {
    server_url: String,
    state: ConnectionState,
    reconnect_delay: Duration,

    board: BoardView,
    input: InputManager,
    renderer: Renderer<W>,
}

impl<W: Write> Client<W> {
    pub fn new(server_url: impl Into<String>, username: impl Into<String>, out: W) -> Self {
        Client {
            server_url: server_url.into(),
            state: ConnectionState::Closed,
            reconnect_delay: RECONNECT_DELAY,
            board: BoardView::new(),
            input: InputManager::new(username),
            renderer: Renderer::new(out),
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn board(&self) -> &BoardView {
        &self.board
    }

    pub fn renderer(&self) -> &Renderer<W> {
        &self.renderer
    }

    fn on_open(&mut self) -> Result<(), ClientError> {
        info!("Connected to {}", self.server_url);
        self.state = ConnectionState::Open;
        self.renderer.set_connected(true);
        self.renderer.system_notice("Connected to server")?;
        Ok(())
    }

    fn on_close(&mut self) -> Result<(), ClientError> {
        info!("Disconnected from {}", self.server_url);
        self.state = ConnectionState::Closed;
        self.renderer.set_connected(false);
        self.renderer.system_notice(&format!(
            "Disconnected. Retrying in {}...",
            delay_label(self.reconnect_delay)
        ))?;
        Ok(())
    }

    /// Parses and dispatches one inbound frame. Malformed frames are dropped.
    pub fn handle_text(&mut self, text: &str) -> Result<(), ClientError> {
        match ServerEvent::from_json(text) {
            Ok(event) => self.handle_server_event(event),
            Err(e) => {
                warn!("Ignoring malformed frame: {}", e);
                Ok(())
            }
        }
    }

    pub fn handle_server_event(&mut self, event: ServerEvent) -> Result<(), ClientError> {
        match &event {
            ServerEvent::System { content } => self.renderer.system_notice(content)?,
            ServerEvent::Init { content, .. } => {
                self.renderer.system_notice(content)?;
                self.show_snapshot(&event)?;
            }
            ServerEvent::Message { user, content, .. } => {
                // Display heuristic only: anyone typing the same name looks like us.
                let own = user == self.input.username();
                self.renderer.chat_message(user, content, own)?;
            }
            ServerEvent::UpdateGame { .. } => self.show_snapshot(&event)?,
        }
        Ok(())
    }

    fn show_snapshot(&mut self, event: &ServerEvent) -> Result<(), ClientError> {
        if let Some(snapshot) = event.snapshot() {
            self.board.apply_snapshot(&snapshot);
            self.renderer.draw_board(&self.board, self.input.badge())?;
        }
        Ok(())
    }

    /// Applies a command locally and returns the event it should send, if any.
    pub fn handle_command(&mut self, command: Command) -> Result<Option<ClientEvent>, ClientError> {
        let event = match command {
            Command::Chat(content) => self.input.chat_event(&content),
            Command::Move(index) => self.input.move_event(&self.board, index),
            Command::Restart => Some(self.input.restart_event()),
            Command::SetName(name) => {
                self.input.set_username(name);
                self.renderer
                    .system_notice(&format!("You are now {}", self.input.badge()))?;
                None
            }
            Command::ShowBoard => {
                self.renderer.draw_board(&self.board, self.input.badge())?;
                None
            }
            Command::Help => {
                self.renderer.system_notice(HELP_TEXT)?;
                None
            }
            Command::Invalid(reason) => {
                self.renderer.system_notice(&reason)?;
                None
            }
            Command::Quit => None,
        };
        Ok(event)
    }

    /// While not connected, local commands still work and sends are dropped.
    fn handle_offline(&mut self, command: Command) -> Result<(), ClientError> {
        if let Some(event) = self.handle_command(command)? {
            debug!("Not connected, dropping {:?}", event);
        }
        Ok(())
    }

    /// Keeps one connection alive until `/quit` or the command channel closes.
    ///
    /// Fails only on local I/O errors or a server URL that cannot be dialled.
    pub async fn run(
        &mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) -> Result<(), ClientError> {
        loop {
            self.state = ConnectionState::Connecting;
            debug!("Connecting to {}", self.server_url);

            let connecting = connect_async(self.server_url.clone());
            tokio::pin!(connecting);
            let connected = loop {
                tokio::select! {
                    result = &mut connecting => break result,
                    command = commands.recv() => match command {
                        None | Some(Command::Quit) => return Ok(()),
                        Some(command) => self.handle_offline(command)?,
                    },
                }
            };

            match connected {
                Ok((socket, _)) => {
                    self.on_open()?;
                    if let SessionEnd::Quit = self.drive(socket, &mut commands).await? {
                        return Ok(());
                    }
                }
                // A bad address will never connect, so give up on it.
                Err(e @ (WsError::Url(_) | WsError::HttpFormat(_))) => return Err(e.into()),
                Err(e) => debug!("Connection to {} failed: {}", self.server_url, e),
            }

            self.on_close()?;

            let delay = tokio::time::sleep(self.reconnect_delay);
            tokio::pin!(delay);
            loop {
                tokio::select! {
                    _ = &mut delay => break,
                    command = commands.recv() => match command {
                        None | Some(Command::Quit) => return Ok(()),
                        Some(command) => self.handle_offline(command)?,
                    },
                }
            }
        }
    }

    async fn drive(
        &mut self,
        socket: Socket,
        commands: &mut mpsc::UnboundedReceiver<Command>,
    ) -> Result<SessionEnd, ClientError> {
        let (mut sink, mut stream) = socket.split();

        loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.handle_text(&text)?,
                    Some(Ok(Message::Close(_))) | None => return Ok(SessionEnd::Closed),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Connection error: {}", e);
                        return Ok(SessionEnd::Closed);
                    }
                },
                command = commands.recv() => match command {
                    None | Some(Command::Quit) => {
                        if let Err(e) = sink.close().await {
                            debug!("Error closing connection: {}", e);
                        }
                        return Ok(SessionEnd::Quit);
                    }
                    Some(command) => {
                        if let Some(event) = self.handle_command(command)? {
                            let text = event.to_json()?;
                            if let Err(e) = sink.send(Message::Text(text)).await {
                                warn!("Failed to send: {}", e);
                                return Ok(SessionEnd::Closed);
                            }
                        }
                    }
                },
            }
        }
    }
}

fn delay_label(delay: Duration) -> String {
    if delay.subsec_millis() == 0 {
        format!("{}s", delay.as_secs())
    } else {
        format!("{}ms", delay.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{GameSnapshot, Mark, BOARD_SIZE, WELCOME_MESSAGE};

    fn test_client(username: &str) -> Client<Vec<u8>> {
        Client::new("ws://127.0.0.1:1", username, Vec::new())
    }

    fn output(client: &Client<Vec<u8>>) -> String {
        String::from_utf8(client.renderer().writer().clone()).unwrap()
    }

    fn snapshot_with_center_x() -> GameSnapshot {
        let mut board = [None; BOARD_SIZE];
        board[4] = Some(Mark::X);
        GameSnapshot::new(board, Mark::O)
    }

    #[test]
    fn test_new_client_starts_closed() {
        let client = test_client("ada");
        assert_eq!(client.state(), ConnectionState::Closed);
        assert!(!client.renderer().is_connected());
    }

    #[test]
    fn test_init_shows_notice_and_board() {
        let mut client = test_client("ada");
        let init = ServerEvent::init(WELCOME_MESSAGE, &snapshot_with_center_x());

        client.handle_text(&init.to_json().unwrap()).unwrap();

        assert_eq!(client.board().cells()[4].mark, Some(Mark::X));
        assert_eq!(client.board().turn_text(), "Player O's Turn");
        let text = output(&client);
        assert!(text.contains("* Connected to Nebula Server"));
        assert!(text.contains(" 3 | X | 5 "));
    }

    #[test]
    fn test_update_game_replaces_board() {
        let mut client = test_client("ada");
        client
            .handle_server_event(ServerEvent::update_game(&snapshot_with_center_x()))
            .unwrap();
        client
            .handle_server_event(ServerEvent::update_game(&GameSnapshot::default()))
            .unwrap();

        assert_eq!(client.board(), &BoardView::new());
    }

    #[test]
    fn test_message_from_self_and_others() {
        let mut client = test_client("ada");
        for user in ["ada", "bob"] {
            client
                .handle_server_event(ServerEvent::Message {
                    user: user.to_string(),
                    content: "hi".to_string(),
                    timestamp: "2024-01-01T00:00:00.000Z".to_string(),
                })
                .unwrap();
        }

        let text = output(&client);
        assert!(text.contains("ada (you) | hi"));
        assert!(text.contains("bob | hi"));
        assert!(!text.contains("bob (you)"));
    }

    #[test]
    fn test_system_event_is_a_notice() {
        let mut client = test_client("ada");
        client
            .handle_text(r#"{"type":"system","content":"maintenance at noon"}"#)
            .unwrap();
        assert_eq!(output(&client), "* maintenance at noon\n");
    }

    #[test]
    fn test_malformed_frames_are_ignored() {
        let mut client = test_client("ada");
        client.handle_text("not json").unwrap();
        client.handle_text(r#"{"type":"fireworks"}"#).unwrap();
        assert!(output(&client).is_empty());
    }

    #[test]
    fn test_commands_produce_events() {
        let mut client = test_client("");
        client
            .handle_server_event(ServerEvent::update_game(&snapshot_with_center_x()))
            .unwrap();

        assert_eq!(
            client.handle_command(Command::Move(0)).unwrap(),
            Some(ClientEvent::Move {
                index: 0,
                player: Mark::O
            })
        );
        assert_eq!(client.handle_command(Command::Move(4)).unwrap(), None);
        assert_eq!(
            client.handle_command(Command::Restart).unwrap(),
            Some(ClientEvent::Restart)
        );
        assert_eq!(
            client
                .handle_command(Command::Chat("hello".to_string()))
                .unwrap(),
            Some(ClientEvent::Message {
                user: Some("Anonymous".to_string()),
                content: "hello".to_string()
            })
        );
    }

    #[test]
    fn test_local_commands_send_nothing() {
        let mut client = test_client("");
        assert_eq!(
            client
                .handle_command(Command::SetName("ada".to_string()))
                .unwrap(),
            None
        );
        assert_eq!(client.handle_command(Command::ShowBoard).unwrap(), None);
        assert_eq!(client.handle_command(Command::Help).unwrap(), None);

        let text = output(&client);
        assert!(text.contains("* You are now ada"));
        assert!(text.contains("[offline] ada"));
    }

    #[test]
    fn test_offline_chat_updates_badge() {
        let mut client = test_client("");
        tokio_test::assert_ok!(client.handle_offline(Command::Chat("anyone?".to_string())));
        tokio_test::assert_ok!(client.handle_command(Command::ShowBoard));

        assert!(output(&client).contains("[offline] Anonymous"));
    }

    #[tokio::test]
    async fn test_unusable_url_is_an_error() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let mut client = Client::new("ftp://127.0.0.1/", "ada", Vec::new());

        let result = tokio::time::timeout(Duration::from_secs(1), client.run(rx))
            .await
            .unwrap();
        assert!(matches!(
            result,
            Err(ClientError::WebSocket(WsError::Url(_)))
        ));
    }

    #[test]
    fn test_delay_label() {
        assert_eq!(delay_label(RECONNECT_DELAY), "3s");
        assert_eq!(delay_label(Duration::from_millis(50)), "50ms");
    }

    #[test]
    fn test_open_and_close_transitions() {
        let mut client = test_client("ada");
        tokio_test::assert_ok!(client.on_open());
        assert_eq!(client.state(), ConnectionState::Open);
        assert!(client.renderer().is_connected());

        tokio_test::assert_ok!(client.on_close());
        assert_eq!(client.state(), ConnectionState::Closed);
        assert!(!client.renderer().is_connected());

        let text = output(&client);
        assert!(text.contains("* Connected to server"));
        assert!(text.contains("* Disconnected. Retrying in 3s..."));
    }
}
