//! # Nebula Client Library
//!
//! Terminal client for the shared chat room and tic-tac-toe board. The client
//! is deliberately thin: the server owns the game, and everything here either
//! renders what the server says or turns a typed command into an event.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! The session adapter. Keeps exactly one WebSocket connection alive,
//! reconnecting after a fixed delay whenever it closes, and dispatches each
//! inbound event by its `type`. Sends are dropped, not queued, while the
//! connection is down.
//!
//! ### Game Module (`game`)
//! The board as last reported by the server. Each snapshot replaces it
//! wholesale, so applying the same snapshot twice changes nothing. The mark
//! a move claims is inferred from the displayed turn text; the server
//! re-validates every move regardless.
//!
//! ### Input Module (`input`)
//! Parses typed lines into commands and builds the outbound events.
//!
//! ### Rendering Module (`rendering`)
//! Plain-text output: chat lines (own messages marked by username match),
//! system notices, the connection indicator and the board grid.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::input::parse_command;
//! use client::network::Client;
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (tx, rx) = mpsc::unbounded_channel();
//!     if let Some(command) = parse_command("/move 4") {
//!         tx.send(command)?;
//!     }
//!
//!     let mut client = Client::new("ws://127.0.0.1:8080", "ada", std::io::stdout());
//!     client.run(rx).await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
