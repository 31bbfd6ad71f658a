//! Registry of open connections and the broadcast fan-out.
//!
//! Each connection is represented by the sending half of its outbound queue.
//! A per-connection writer task drains that queue into the socket; once the
//! socket fails the writer exits, the queue closes, and fan-out skips it.

use log::{debug, info};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc;

/// A connected client. The server knows nothing about who is behind it.
#[derive(Debug)]
pub struct Client {
    /// Server-assigned handle, never reused within a process
    pub id: u32,
    /// Peer address, for logs only
    pub addr: SocketAddr,
    pub connected_at: Instant,
    sender: mpsc::UnboundedSender<String>,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr, sender: mpsc::UnboundedSender<String>) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            sender,
        }
    }

    /// True while the writer task for this connection is still draining.
    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Queues a frame. Returns false if the connection is already gone.
    pub fn send(&self, text: String) -> bool {
        self.sender.send(text).is_ok()
    }
}

/// Set of currently open connections.
pub struct ClientManager {
    clients: HashMap<u32, Client>,
    next_client_id: u32,
}

impl ClientManager {
    /// Client IDs start from 1.
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
        }
    }

    pub fn add_client(&mut self, addr: SocketAddr, sender: mpsc::UnboundedSender<String>) -> u32 {
        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients
            .insert(client_id, Client::new(client_id, addr, sender));

        client_id
    }

    /// Returns true if the client was found and removed.
    pub fn remove_client(&mut self, client_id: &u32) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!(
                "Client {} disconnected after {:.1}s",
                client.id,
                client.connected_at.elapsed().as_secs_f32()
            );
            true
        } else {
            false
        }
    }

    pub fn send_to(&self, client_id: u32, text: String) -> bool {
        match self.clients.get(&client_id) {
            Some(client) if client.is_open() => client.send(text),
            _ => false,
        }
    }

    /// Delivers one frame to every open connection, fire-and-forget.
    ///
    /// Connections that are closing are skipped without error. Returns how
    /// many connections the frame was queued on.
    pub fn broadcast(&self, text: &str) -> usize {
        let mut delivered = 0;

        for client in self.clients.values() {
            if !client.is_open() {
                debug!("Skipping closed client {}", client.id);
                continue;
            }

            if client.send(text.to_owned()) {
                delivered += 1;
            }
        }

        delivered
    }

    pub fn client_ids(&self) -> Vec<u32> {
        self.clients.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl Default for ClientManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    #[test]
    fn test_client_ids_are_sequential() {
        let mut manager = ClientManager::new();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        assert_eq!(manager.add_client(test_addr(), tx1), 1);
        assert_eq!(manager.add_client(test_addr2(), tx2), 2);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_ids_are_not_reused_after_removal() {
        let mut manager = ClientManager::new();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        let first = manager.add_client(test_addr(), tx1);
        assert!(manager.remove_client(&first));
        let second = manager.add_client(test_addr(), tx2);

        assert_ne!(first, second);
        assert_eq!(manager.client_ids(), vec![second]);
    }

    #[test]
    fn test_remove_unknown_client() {
        let mut manager = ClientManager::new();
        assert!(!manager.remove_client(&42));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_broadcast_reaches_every_open_client() {
        let mut manager = ClientManager::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        manager.add_client(test_addr(), tx1);
        manager.add_client(test_addr2(), tx2);

        assert_eq!(manager.broadcast("hello"), 2);
        assert_eq!(rx1.try_recv().unwrap(), "hello");
        assert_eq!(rx2.try_recv().unwrap(), "hello");
    }

    #[test]
    fn test_broadcast_skips_closed_clients() {
        let mut manager = ClientManager::new();
        let (tx1, rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        manager.add_client(test_addr(), tx1);
        manager.add_client(test_addr2(), tx2);

        drop(rx1);

        assert_eq!(manager.broadcast("still here"), 1);
        assert_eq!(rx2.try_recv().unwrap(), "still here");
        // Closed clients stay registered until their connection task reports the close.
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_send_to_single_client() {
        let mut manager = ClientManager::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let first = manager.add_client(test_addr(), tx1);
        manager.add_client(test_addr2(), tx2);

        assert!(manager.send_to(first, "just you".to_string()));
        assert_eq!(rx1.try_recv().unwrap(), "just you");
        assert!(rx2.try_recv().is_err());
        assert!(!manager.send_to(99, "nobody".to_string()));
    }
}
