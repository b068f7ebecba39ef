use std::collections::HashMap;

use super::protocol::{Participant, RoomId};

/// Live roster per room.
///
/// Joins are deduplicated by display name while disconnects match on
/// connection id, so two connections sharing a name share one entry.
#[derive(Default)]
pub struct PresenceTracker {
    rosters: HashMap<RoomId, Vec<Participant>>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init_room(&mut self, room_id: &str) {
        self.rosters.entry(room_id.to_string()).or_default();
    }

    /// Drops the whole roster, returning the evicted participants
    pub fn drop_room(&mut self, room_id: &str) -> Vec<Participant> {
        self.rosters.remove(room_id).unwrap_or_default()
    }

    /// Returns the existing entry unchanged if `name` is already on the roster.
    pub fn add_participant(
        &mut self,
        room_id: &str,
        connection_id: &str,
        name: &str,
        is_owner: bool,
    ) -> Participant {
        let roster = self.rosters.entry(room_id.to_string()).or_default();

        if let Some(existing) = roster.iter().find(|p| p.name == name) {
            tracing::debug!(
                room_id = %room_id,
                connection_id = %connection_id,
                existing_id = %existing.id,
                name = %name,
                "Display name already on roster, reusing entry"
            );
            return existing.clone();
        }

        let participant = Participant {
            id: connection_id.to_string(),
            name: name.to_string(),
            is_owner,
            has_permission: is_owner,
        };
        roster.push(participant.clone());
        participant
    }

    /// Removes every entry held by the connection. One connection may hold
    /// several entries when it joined under more than one name.
    pub fn remove_participant(&mut self, room_id: &str, connection_id: &str) -> Vec<Participant> {
        let Some(roster) = self.rosters.get_mut(room_id) else {
            return Vec::new();
        };
        let (removed, kept) = roster.drain(..).partition(|p| p.id == connection_id);
        *roster = kept;
        removed
    }

    pub fn remove_participant_by_name(&mut self, room_id: &str, name: &str) -> Option<Participant> {
        let roster = self.rosters.get_mut(room_id)?;
        let index = roster.iter().position(|p| p.name == name)?;
        Some(roster.remove(index))
    }

    /// Returns false when the participant is gone (e.g. disconnected mid-handshake).
    pub fn set_permission(&mut self, room_id: &str, connection_id: &str, granted: bool) -> bool {
        let participant = self
            .rosters
            .get_mut(room_id)
            .and_then(|roster| roster.iter_mut().find(|p| p.id == connection_id));

        match participant {
            Some(p) => {
                p.has_permission = granted;
                true
            }
            None => false,
        }
    }

    pub fn roster(&self, room_id: &str) -> Vec<Participant> {
        self.rosters.get(room_id).cloned().unwrap_or_default()
    }

    pub fn participant(&self, room_id: &str, connection_id: &str) -> Option<&Participant> {
        self.rosters
            .get(room_id)?
            .iter()
            .find(|p| p.id == connection_id)
    }

    pub fn participant_by_name(&self, room_id: &str, name: &str) -> Option<&Participant> {
        self.rosters.get(room_id)?.iter().find(|p| p.name == name)
    }

    /// Rooms in which this connection holds a roster entry
    pub fn rooms_of(&self, connection_id: &str) -> Vec<RoomId> {
        self.rosters
            .iter()
            .filter(|(_, roster)| roster.iter().any(|p| p.id == connection_id))
            .map(|(room_id, _)| room_id.clone())
            .collect()
    }

    pub fn participant_count(&self) -> usize {
        self.rosters.values().map(Vec::len).sum()
    }
}
