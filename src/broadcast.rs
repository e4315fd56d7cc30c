//! Fan-out of server messages to connections and room groups.

use crate::messages::ServerMessage;
use dashmap::DashMap;
use std::collections::HashSet;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, instrument};

/// Stable identifier for one WebSocket connection (32-hex).
pub type ConnectionId = String;

/// Routes messages to individual connections and to room groups.
///
/// Group membership is maintained by the request handlers; delivery order
/// per connection is the order messages were sent, courtesy of the single
/// unbounded queue each socket drains.
#[derive(Debug, Default)]
pub struct Broadcaster {
    connections: DashMap<ConnectionId, UnboundedSender<ServerMessage>>,
    groups: DashMap<String, HashSet<ConnectionId>>,
}

impl Broadcaster {
    /// Creates an empty broadcaster.
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            groups: DashMap::new(),
        }
    }

    /// Registers a connection's outbound queue.
    #[instrument(skip(self, sender))]
    pub fn register(&self, connection_id: &str, sender: UnboundedSender<ServerMessage>) {
        self.connections.insert(connection_id.to_string(), sender);
    }

    /// Forgets a connection and scrubs it from every group.
    #[instrument(skip(self))]
    pub fn unregister(&self, connection_id: &str) {
        self.connections.remove(connection_id);
        self.groups.retain(|_, members| {
            members.remove(connection_id);
            !members.is_empty()
        });
    }

    /// Whether `connection_id` is currently registered.
    pub fn is_connected(&self, connection_id: &str) -> bool {
        self.connections.contains_key(connection_id)
    }

    /// Subscribes a connection to a room's broadcasts.
    #[instrument(skip(self))]
    pub fn add_to_group(&self, connection_id: &str, code: &str) {
        self.groups
            .entry(code.to_string())
            .or_default()
            .insert(connection_id.to_string());
    }

    /// Drops a whole group, usually because its room was removed.
    pub fn remove_group(&self, code: &str) {
        self.groups.remove(code);
    }

    /// Sends one message to one connection. Dead connections are skipped
    /// with a log line; delivery is best-effort by design.
    pub fn send_to(&self, connection_id: &str, message: ServerMessage) {
        match self.connections.get(connection_id) {
            Some(sender) => {
                if sender.send(message).is_err() {
                    debug!(connection_id, "dropping message for closed connection");
                }
            }
            None => debug!(connection_id, "dropping message for unknown connection"),
        }
    }

    /// Sends one message to every member of a room group.
    pub fn send_to_group(&self, code: &str, message: ServerMessage) {
        for member in self.group_members(code) {
            self.send_to(&member, message.clone());
        }
    }

    /// Sends to every group member except `skip_connection`.
    pub fn send_to_group_except(
        &self,
        code: &str,
        skip_connection: &str,
        message: ServerMessage,
    ) {
        for member in self.group_members(code) {
            if member != skip_connection {
                self.send_to(&member, message.clone());
            }
        }
    }

    fn group_members(&self, code: &str) -> Vec<ConnectionId> {
        self.groups
            .get(code)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }
}
