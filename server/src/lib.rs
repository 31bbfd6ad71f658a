//! # Nebula Server Library
//!
//! Authoritative server for a shared chat room and a shared tic-tac-toe
//! board. Every viewer connects over a WebSocket; the server holds the only
//! real copy of the board, validates each move against it, and fans state
//! changes out to everyone.
//!
//! ## Architecture
//!
//! ### Single-Owner Hub
//! The board, the turn flag and the connection registry live in one hub
//! task ([`network::Hub`]). Connection tasks never touch that state; they
//! forward frames as [`network::HubCommand`]s over a single queue, so
//! register / move / restart / unregister are handled one at a time in
//! arrival order.
//!
//! ### Per-Connection Writers
//! Each connection owns an outbound queue drained by its own writer task.
//! Fan-out only enqueues, so a slow or dead peer never stalls the hub.
//! Queues whose writer has exited are skipped silently.
//!
//! ### One Listener
//! Requests carrying a WebSocket upgrade become sessions; every other
//! request is answered from the static asset directory.
//!
//! ## Module Organization
//!
//! - `game`: board, turn flag and move validation
//! - `client_manager`: connection registry and broadcast fan-out
//! - `network`: hub command loop, WebSocket sessions, listener
//! - `assets`: static file responder
//! - `error`: server error type
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig {
//!         addr: "127.0.0.1:8080".to_string(),
//!         ..ServerConfig::default()
//!     })
//!     .await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod assets;
pub mod client_manager;
pub mod error;
pub mod game;
pub mod network;
