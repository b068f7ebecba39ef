use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc;

use super::protocol::{ConnectionId, Participant, RoomId, ServerEvent};

/// Outbound queue of one connection, drained by its WebSocket writer task
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Fan-out of server events to explicit per-room connection groups.
///
/// Sends are fire-and-forget: a closed channel only means the peer is
/// already going away and its disconnect will clean up after it.
#[derive(Default)]
pub struct BroadcastRelay {
    connections: HashMap<ConnectionId, EventSender>,
    groups: HashMap<RoomId, HashSet<ConnectionId>>,
}

impl BroadcastRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, connection_id: ConnectionId, sender: EventSender) {
        self.connections.insert(connection_id, sender);
    }

    /// Forgets the connection and removes it from every group.
    pub fn unregister(&mut self, connection_id: &str) {
        self.connections.remove(connection_id);
        for members in self.groups.values_mut() {
            members.remove(connection_id);
        }
        self.groups.retain(|_, members| !members.is_empty());
    }

    pub fn join_group(&mut self, room_id: &str, connection_id: &str) {
        self.groups
            .entry(room_id.to_string())
            .or_default()
            .insert(connection_id.to_string());
    }

    pub fn leave_group(&mut self, room_id: &str, connection_id: &str) {
        if let Some(members) = self.groups.get_mut(room_id) {
            members.remove(connection_id);
            if members.is_empty() {
                self.groups.remove(room_id);
            }
        }
    }

    pub fn members(&self, room_id: &str) -> Vec<ConnectionId> {
        self.groups
            .get(room_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn in_group(&self, room_id: &str, connection_id: &str) -> bool {
        self.groups
            .get(room_id)
            .is_some_and(|members| members.contains(connection_id))
    }

    pub fn is_registered(&self, connection_id: &str) -> bool {
        self.connections.contains_key(connection_id)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn send_to(&self, connection_id: &str, event: ServerEvent) {
        match self.connections.get(connection_id) {
            Some(sender) => {
                if sender.send(event).is_err() {
                    tracing::debug!(connection_id = %connection_id, "Dropping event for closed connection");
                }
            }
            None => {
                tracing::debug!(connection_id = %connection_id, "Dropping event for unknown connection");
            }
        }
    }

    /// Every live connection, i.e. everyone watching the classroom list
    pub fn broadcast_all(&self, event: ServerEvent) {
        for sender in self.connections.values() {
            let _ = sender.send(event.clone());
        }
    }

    fn broadcast_room(&self, room_id: &str, event: ServerEvent, except: Option<&str>) {
        let Some(members) = self.groups.get(room_id) else {
            return;
        };
        for member in members {
            if except == Some(member.as_str()) {
                continue;
            }
            if let Some(sender) = self.connections.get(member) {
                let _ = sender.send(event.clone());
            }
        }
    }

    pub fn broadcast_roster(&self, room_id: &str, roster: Vec<Participant>) {
        self.broadcast_room(room_id, ServerEvent::UsersUpdate(roster), None);
    }

    pub fn relay_code_change(&self, room_id: &str, sender_id: &str, code: String) {
        self.broadcast_room(room_id, ServerEvent::CodeUpdate(code), Some(sender_id));
    }

    pub fn relay_language_change(&self, room_id: &str, sender_id: &str, language: String) {
        self.broadcast_room(room_id, ServerEvent::LanguageUpdate(language), Some(sender_id));
    }

    pub fn relay_collab_mode_change(&self, room_id: &str, sender_id: &str, enabled: bool) {
        self.broadcast_room(room_id, ServerEvent::CollabModeUpdate(enabled), Some(sender_id));
    }

    /// One-shot teardown: notifies every member, then dissolves the group so
    /// nothing else for this room can reach them.
    pub fn notify_room_deleted(&mut self, room_id: &str) -> usize {
        let Some(members) = self.groups.remove(room_id) else {
            return 0;
        };
        for member in &members {
            self.send_to(member, ServerEvent::ClassroomDeletedNotification);
        }
        members.len()
    }

    pub fn notify_kicked(&self, connection_id: &str) {
        self.send_to(connection_id, ServerEvent::KickedNotification);
    }

    pub fn reset_code(&self, room_id: &str, template: String) {
        self.broadcast_room(room_id, ServerEvent::CodeReset(template), None);
    }
}
