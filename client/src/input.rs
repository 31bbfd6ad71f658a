//! Terminal input parsing and translation into outbound events

use crate::game::BoardView;
use shared::{ClientEvent, ANONYMOUS_USER};

const GUEST_BADGE: &str = "Guest";

/// One line typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Chat(String),
    Move(usize),
    Restart,
    SetName(String),
    ShowBoard,
    Help,
    Quit,
    Invalid(String),
}

pub const HELP_TEXT: &str = "Commands: /move <0-8>, /restart, /name <user>, /board, /quit. \
Anything else is sent to the chat.";

/// Parses a line of input. Blank lines yield None.
pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let Some(rest) = line.strip_prefix('/') else {
        return Some(Command::Chat(line.to_string()));
    };

    let (name, argument) = match rest.split_once(char::is_whitespace) {
        Some((name, argument)) => (name, argument.trim()),
        None => (rest, ""),
    };

    let command = match name {
        "move" | "m" => match argument.parse::<usize>() {
            Ok(index) => Command::Move(index),
            Err(_) => Command::Invalid(format!("Usage: /move <0-8>, got '{}'", argument)),
        },
        "restart" => Command::Restart,
        "name" => Command::SetName(argument.to_string()),
        "board" => Command::ShowBoard,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => Command::Invalid(format!("Unknown command '/{}'", other)),
    };

    Some(command)
}

/// Holds the local username and builds the events user actions produce.
#[derive(Debug, Clone)]
pub struct InputManager {
    username: String,
    badge: String,
}

impl InputManager {
    pub fn new(username: impl Into<String>) -> Self {
        let username = username.into();
        let badge = badge_for(&username);
        Self { username, badge }
    }

    /// Raw username as typed; compared against chat senders to spot our own lines.
    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn set_username(&mut self, username: impl Into<String>) {
        self.username = username.into();
        self.badge = badge_for(&self.username);
    }

    pub fn badge(&self) -> &str {
        &self.badge
    }

    /// Chat event for `content`, or None if there is nothing to say.
    ///
    /// Submitting always moves the badge to the name the message goes out
    /// under, even when nothing is sent.
    pub fn chat_event(&mut self, content: &str) -> Option<ClientEvent> {
        let user = match self.username.trim() {
            "" => ANONYMOUS_USER,
            user => user,
        }
        .to_string();
        self.badge = user.clone();

        let content = content.trim();
        if content.is_empty() {
            return None;
        }

        Some(ClientEvent::Message {
            user: Some(user),
            content: content.to_string(),
        })
    }

    /// Move event for an empty cell, claiming the mark the board currently
    /// shows as next. The server decides whether it stands.
    pub fn move_event(&self, board: &BoardView, index: usize) -> Option<ClientEvent> {
        if !board.is_cell_empty(index) {
            return None;
        }

        Some(ClientEvent::Move {
            index: index as i64,
            player: board.inferred_player(),
        })
    }

    pub fn restart_event(&self) -> ClientEvent {
        ClientEvent::Restart
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new("")
    }
}

fn badge_for(username: &str) -> String {
    if username.is_empty() {
        GUEST_BADGE.to_string()
    } else {
        username.to_string()
    }
}
