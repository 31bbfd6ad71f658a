use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;

pub const BOARD_SIZE: usize = 9;
pub const WELCOME_MESSAGE: &str = "Connected to Nebula Server";
pub const ANONYMOUS_USER: &str = "Anonymous";

/// A player's mark on the board. Also names whose turn it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mark {
    X,
    O,
}

impl Mark {
    pub fn opponent(self) -> Mark {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mark::X => "X",
            Mark::O => "O",
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row-major 3x3 grid, `None` is an empty cell.
pub type Board = [Option<Mark>; BOARD_SIZE];

/// Full game state as carried by `init` and `update_game`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameSnapshot {
    pub board: Board,
    pub next: Mark,
}

impl GameSnapshot {
    pub fn new(board: Board, next: Mark) -> Self {
        Self { board, next }
    }

    pub fn x_is_next(&self) -> bool {
        self.next == Mark::X
    }

    pub fn filled_cells(&self) -> usize {
        self.board.iter().filter(|cell| cell.is_some()).count()
    }
}

impl Default for GameSnapshot {
    fn default() -> Self {
        Self::new([None; BOARD_SIZE], Mark::X)
    }
}

fn next_from_flag(x_is_next: bool) -> Mark {
    if x_is_next {
        Mark::X
    } else {
        Mark::O
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Events sent from the server to every client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    System {
        content: String,
    },
    Init {
        content: String,
        #[serde(rename = "gameState")]
        game_state: Board,
        #[serde(rename = "xIsNext")]
        x_is_next: bool,
    },
    Message {
        user: String,
        content: String,
        timestamp: String,
    },
    UpdateGame {
        #[serde(rename = "gameState")]
        game_state: Board,
        #[serde(rename = "xIsNext")]
        x_is_next: bool,
    },
}

impl ServerEvent {
    pub fn init(content: impl Into<String>, snapshot: &GameSnapshot) -> Self {
        ServerEvent::Init {
            content: content.into(),
            game_state: snapshot.board,
            x_is_next: snapshot.x_is_next(),
        }
    }

    pub fn update_game(snapshot: &GameSnapshot) -> Self {
        ServerEvent::UpdateGame {
            game_state: snapshot.board,
            x_is_next: snapshot.x_is_next(),
        }
    }

    /// Game state carried by this event, if any.
    pub fn snapshot(&self) -> Option<GameSnapshot> {
        match self {
            ServerEvent::Init {
                game_state,
                x_is_next,
                ..
            }
            | ServerEvent::UpdateGame {
                game_state,
                x_is_next,
            } => Some(GameSnapshot::new(*game_state, next_from_flag(*x_is_next))),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Events sent from a client to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    Message {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user: Option<String>,
        #[serde(default)]
        content: String,
    },
    Move {
        #[serde(deserialize_with = "lenient_index")]
        index: i64,
        player: Mark,
    },
    Restart,
    /// Any `type` this protocol does not define.
    #[serde(other)]
    Unknown,
}

impl ClientEvent {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Browser clients send the cell index as a string read from a DOM attribute,
/// so both `4` and `"4"` are accepted. Text that is not an integer can never
/// name a cell and maps to -1.
fn lenient_index<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawIndex {
        Number(i64),
        Text(String),
    }

    Ok(match RawIndex::deserialize(deserializer)? {
        RawIndex::Number(index) => index,
        RawIndex::Text(text) => text.trim().parse().unwrap_or(-1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_mark_opponent() {
        assert_eq!(Mark::X.opponent(), Mark::O);
        assert_eq!(Mark::O.opponent(), Mark::X);
        assert_eq!(Mark::X.to_string(), "X");
    }

    #[test]
    fn test_default_snapshot_is_empty_with_x_to_move() {
        let snapshot = GameSnapshot::default();
        assert_eq!(snapshot.filled_cells(), 0);
        assert!(snapshot.x_is_next());
    }

    #[test]
    fn test_init_event_wire_shape() {
        let mut board = [None; BOARD_SIZE];
        board[0] = Some(Mark::X);
        board[4] = Some(Mark::O);
        let event = ServerEvent::init(WELCOME_MESSAGE, &GameSnapshot::new(board, Mark::X));

        let value: Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "init",
                "content": "Connected to Nebula Server",
                "gameState": ["X", null, null, null, "O", null, null, null, null],
                "xIsNext": true
            })
        );
    }

    #[test]
    fn test_update_game_wire_shape() {
        let mut board = [None; BOARD_SIZE];
        board[8] = Some(Mark::X);
        let event = ServerEvent::update_game(&GameSnapshot::new(board, Mark::O));

        let value: Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "update_game");
        assert_eq!(value["gameState"][8], "X");
        assert_eq!(value["xIsNext"], false);
    }

    #[test]
    fn test_server_event_snapshot_extraction() {
        let text = r#"{"type":"update_game","gameState":[null,"O",null,null,null,null,null,null,null],"xIsNext":true}"#;
        let event = ServerEvent::from_json(text).unwrap();
        let snapshot = event.snapshot().expect("update_game carries a snapshot");
        assert_eq!(snapshot.board[1], Some(Mark::O));
        assert_eq!(snapshot.next, Mark::X);

        let chat = ServerEvent::System {
            content: "hello".to_string(),
        };
        assert!(chat.snapshot().is_none());
    }

    #[test]
    fn test_parse_move_with_numeric_index() {
        let event = ClientEvent::from_json(r#"{"type":"move","index":4,"player":"X"}"#).unwrap();
        assert_eq!(
            event,
            ClientEvent::Move {
                index: 4,
                player: Mark::X
            }
        );
    }

    #[test]
    fn test_parse_move_with_string_index() {
        let event = ClientEvent::from_json(r#"{"type":"move","index":"7","player":"O"}"#).unwrap();
        match event {
            ClientEvent::Move { index, player } => {
                assert_eq!(index, 7);
                assert_eq!(player, Mark::O);
            }
            _ => panic!("Wrong event type after parsing"),
        }
    }

    #[test]
    fn test_parse_move_with_garbage_index_is_not_a_cell() {
        let event =
            ClientEvent::from_json(r#"{"type":"move","index":"middle","player":"X"}"#).unwrap();
        match event {
            ClientEvent::Move { index, .. } => assert_eq!(index, -1),
            _ => panic!("Wrong event type after parsing"),
        }
    }

    #[test]
    fn test_parse_message_without_user() {
        let event = ClientEvent::from_json(r#"{"type":"message","content":"hi"}"#).unwrap();
        assert_eq!(
            event,
            ClientEvent::Message {
                user: None,
                content: "hi".to_string()
            }
        );
    }

    #[test]
    fn test_parse_restart_and_unknown() {
        assert_eq!(
            ClientEvent::from_json(r#"{"type":"restart"}"#).unwrap(),
            ClientEvent::Restart
        );
        assert_eq!(
            ClientEvent::from_json(r#"{"type":"dance","moves":3}"#).unwrap(),
            ClientEvent::Unknown
        );
    }

    #[test]
    fn test_parse_rejects_malformed_payloads() {
        assert!(ClientEvent::from_json("not json").is_err());
        assert!(ClientEvent::from_json(r#"{"content":"no type"}"#).is_err());
        assert!(ClientEvent::from_json(r#"{"type":"move","index":1,"player":"Z"}"#).is_err());
    }

    #[test]
    fn test_client_message_serialization_includes_user() {
        let event = ClientEvent::Message {
            user: Some("ada".to_string()),
            content: "gg".to_string(),
        };
        let value: Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "message", "user": "ada", "content": "gg"}));
    }
}
