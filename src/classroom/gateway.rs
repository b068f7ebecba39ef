use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::ownership::{Ownership, OwnershipGate};
use super::presence::PresenceTracker;
use super::protocol::{
    ClientEvent, CodeChange, CollabModeChange, Connected, ConnectionId, JoinRoom,
    KickAndClearUser, LanguageChange, LeaveRoom, PermissionRequest, PermissionResponse,
    PermissionResponseFromOwner, Room, ServerEvent,
};
use super::registry::{welcome_template, RoomRegistry};
use super::relay::{BroadcastRelay, EventSender};
use crate::error::{ClassroomError, Result};

const CONNECTION_ID_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStats {
    pub rooms: usize,
    pub connections: usize,
    pub participants: usize,
}

/// Process-wide classroom context, constructed once and shared by every
/// connection handler.
///
/// Every event runs to completion under one lock, so handlers observe the
/// registry, rosters, owner bindings and connection groups as a single
/// consistent state.
pub struct ClassroomGateway {
    state: Mutex<ClassroomState>,
}

impl Default for ClassroomGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassroomGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ClassroomState::default()),
        }
    }

    /// Registers a new connection and tells it its id.
    pub async fn connect(&self, sender: EventSender) -> ConnectionId {
        let mut state = self.state.lock().await;

        let mut connection_id = generate_connection_id();
        while state.relay.is_registered(&connection_id) {
            connection_id = generate_connection_id();
        }

        state.relay.register(connection_id.clone(), sender);
        state.relay.send_to(
            &connection_id,
            ServerEvent::Connected(Connected {
                connection_id: connection_id.clone(),
            }),
        );

        tracing::info!(connection_id = %connection_id, "Client connected");
        connection_id
    }

    pub async fn handle_event(&self, connection_id: &str, event: ClientEvent) {
        let event_name = event.name();
        tracing::debug!(connection_id = %connection_id, event = event_name, "Dispatching classroom event");

        let mut state = self.state.lock().await;
        if let Err(e) = state.dispatch(connection_id, event) {
            if e.is_not_found() {
                tracing::debug!(connection_id = %connection_id, event = event_name, error = %e, "Event for unknown classroom ignored");
            } else {
                tracing::warn!(connection_id = %connection_id, event = event_name, error = %e, "Classroom event rejected");
            }
        }
    }

    pub async fn disconnect(&self, connection_id: &str) {
        let mut state = self.state.lock().await;
        state.disconnect(connection_id);
        tracing::info!(connection_id = %connection_id, "Client disconnected");
    }

    pub async fn stats(&self) -> ServerStats {
        let state = self.state.lock().await;
        ServerStats {
            rooms: state.registry.len(),
            connections: state.relay.connection_count(),
            participants: state.presence.participant_count(),
        }
    }
}

fn generate_connection_id() -> ConnectionId {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CONNECTION_ID_LEN)
        .map(char::from)
        .collect()
}

#[derive(Default)]
struct ClassroomState {
    registry: RoomRegistry,
    presence: PresenceTracker,
    ownership: OwnershipGate,
    relay: BroadcastRelay,
}

impl ClassroomState {
    fn dispatch(&mut self, connection_id: &str, event: ClientEvent) -> Result<()> {
        match event {
            ClientEvent::GetClassrooms => {
                self.relay
                    .send_to(connection_id, ServerEvent::ClassroomsUpdate(self.registry.list_rooms()));
                Ok(())
            }
            ClientEvent::CreateClassroom(room) => self.create_classroom(room),
            ClientEvent::DeleteClassroom(room_id) => self.delete_classroom(connection_id, &room_id),
            ClientEvent::GetClassroom(room_id) => self.get_classroom(connection_id, &room_id),
            ClientEvent::JoinRoom(join) => self.join_room(connection_id, join),
            ClientEvent::LeaveRoom(leave) => self.leave_room(connection_id, leave),
            ClientEvent::RemoveUser(remove) => {
                self.ownership.authorize(&remove.room_id, connection_id)?;
                self.evict(&remove.room_id, &remove.user_id)?;
                self.relay.notify_kicked(&remove.user_id);
                Ok(())
            }
            ClientEvent::KickAndClearUser(kick) => self.kick_and_clear_user(connection_id, kick),
            ClientEvent::CodeChange(change) => self.code_change(connection_id, change),
            ClientEvent::LanguageChange(change) => self.language_change(connection_id, change),
            ClientEvent::CollabModeChange(change) => self.collab_mode_change(connection_id, change),
            ClientEvent::PermissionRequest(request) => self.permission_request(request),
            ClientEvent::PermissionResponse(response) => {
                self.permission_response(connection_id, response)
            }
        }
    }

    fn create_classroom(&mut self, room: Room) -> Result<()> {
        let room_id = self.registry.create_room(room)?;
        self.presence.init_room(&room_id);
        self.broadcast_room_list();
        Ok(())
    }

    fn delete_classroom(&mut self, connection_id: &str, room_id: &str) -> Result<()> {
        if !self.registry.contains(room_id) {
            return Ok(());
        }

        if let Ownership::OwnerBound(owner) = self.ownership.state(room_id) {
            if owner != connection_id {
                return Err(ClassroomError::Unauthorized(connection_id.to_string()));
            }
        }

        self.teardown(room_id);
        Ok(())
    }

    fn get_classroom(&mut self, connection_id: &str, room_id: &str) -> Result<()> {
        let snapshot = self.registry.snapshot(room_id);
        let found = snapshot.is_some();
        self.relay.send_to(connection_id, ServerEvent::ClassroomData(snapshot));

        if !found {
            return Err(ClassroomError::RoomNotFound(room_id.to_string()));
        }
        self.broadcast_roster(room_id);
        Ok(())
    }

    fn join_room(&mut self, connection_id: &str, join: JoinRoom) -> Result<()> {
        let Some(snapshot) = self.registry.snapshot(&join.room_id) else {
            self.relay.send_to(connection_id, ServerEvent::ClassroomData(None));
            return Err(ClassroomError::RoomNotFound(join.room_id));
        };

        let claims_owner = join.is_owner && self.ownership.state(&join.room_id) == Ownership::NoOwner;
        if join.is_owner && !claims_owner {
            tracing::warn!(
                room_id = %join.room_id,
                connection_id = %connection_id,
                "Classroom already has an owner, joining as participant"
            );
        }

        let participant =
            self.presence
                .add_participant(&join.room_id, connection_id, &join.user_name, claims_owner);
        if participant.is_owner && participant.id == connection_id {
            self.ownership.bind_owner(&join.room_id, connection_id);
        }

        self.relay.join_group(&join.room_id, connection_id);
        tracing::info!(
            room_id = %join.room_id,
            connection_id = %connection_id,
            user_name = %join.user_name,
            is_owner = participant.is_owner,
            "Joined classroom"
        );

        self.relay
            .send_to(connection_id, ServerEvent::ClassroomData(Some(snapshot)));
        self.broadcast_roster(&join.room_id);
        Ok(())
    }

    fn leave_room(&mut self, connection_id: &str, leave: LeaveRoom) -> Result<()> {
        self.relay.leave_group(&leave.room_id, connection_id);

        if self.ownership.is_owner(&leave.room_id, connection_id) {
            tracing::info!(room_id = %leave.room_id, "Owner left, closing classroom");
            self.teardown(&leave.room_id);
            return Ok(());
        }

        if !self.registry.contains(&leave.room_id) {
            return Err(ClassroomError::RoomNotFound(leave.room_id));
        }

        // Only the owner connection may take the owner's entry off the roster.
        if self
            .presence
            .participant_by_name(&leave.room_id, &leave.user_name)
            .is_some_and(|p| p.is_owner)
        {
            self.broadcast_roster(&leave.room_id);
            return Err(ClassroomError::Unauthorized(connection_id.to_string()));
        }

        self.presence
            .remove_participant_by_name(&leave.room_id, &leave.user_name);
        tracing::info!(
            room_id = %leave.room_id,
            connection_id = %connection_id,
            user_name = %leave.user_name,
            "Left classroom"
        );
        self.broadcast_roster(&leave.room_id);
        Ok(())
    }

    fn kick_and_clear_user(&mut self, connection_id: &str, kick: KickAndClearUser) -> Result<()> {
        self.ownership.authorize(&kick.room_id, connection_id)?;
        self.evict(&kick.room_id, &kick.user_id)?;

        let template = welcome_template(&kick.classroom_name);
        self.registry.set_code(&kick.room_id, template.clone())?;
        self.relay.reset_code(&kick.room_id, template);
        self.relay.notify_kicked(&kick.user_id);
        Ok(())
    }

    /// Takes a participant off the roster and out of the room's group.
    /// Connections that are in neither are refused, so an owner cannot
    /// reach members of other rooms.
    fn evict(&mut self, room_id: &str, user_id: &str) -> Result<()> {
        if self.ownership.is_owner(room_id, user_id) {
            return Err(ClassroomError::CannotRemoveOwner(user_id.to_string()));
        }

        let in_group = self.relay.in_group(room_id, user_id);
        if !in_group && self.presence.participant(room_id, user_id).is_none() {
            return Err(ClassroomError::ParticipantNotFound(user_id.to_string()));
        }

        let removed = self.presence.remove_participant(room_id, user_id);
        self.relay.leave_group(room_id, user_id);
        tracing::info!(
            room_id = %room_id,
            user_id = %user_id,
            entries = removed.len(),
            in_group,
            "Participant removed by owner"
        );
        self.broadcast_roster(room_id);
        Ok(())
    }

    fn code_change(&mut self, connection_id: &str, change: CodeChange) -> Result<()> {
        self.ensure_can_edit(&change.room_id, connection_id)?;
        self.relay
            .relay_code_change(&change.room_id, connection_id, change.code);
        Ok(())
    }

    fn language_change(&mut self, connection_id: &str, change: LanguageChange) -> Result<()> {
        self.ensure_can_edit(&change.room_id, connection_id)?;
        self.registry
            .set_language(&change.room_id, change.language.clone())?;
        self.relay
            .relay_language_change(&change.room_id, connection_id, change.language);
        Ok(())
    }

    fn collab_mode_change(&mut self, connection_id: &str, change: CollabModeChange) -> Result<()> {
        self.ensure_can_edit(&change.room_id, connection_id)?;
        self.registry
            .set_collab_mode(&change.room_id, change.collab_mode)?;
        self.relay
            .relay_collab_mode_change(&change.room_id, connection_id, change.collab_mode);
        Ok(())
    }

    fn permission_request(&mut self, request: PermissionRequest) -> Result<()> {
        if !self.registry.contains(&request.room_id) {
            return Err(ClassroomError::RoomNotFound(request.room_id));
        }

        match self.ownership.route_permission_request(&request) {
            Some((owner, payload)) => {
                tracing::info!(
                    room_id = %request.room_id,
                    student_id = %request.student_id,
                    owner_id = %owner,
                    "Forwarding permission request to owner"
                );
                self.relay
                    .send_to(&owner, ServerEvent::PermissionRequestToOwner(payload));
            }
            None => {
                tracing::debug!(
                    room_id = %request.room_id,
                    student_id = %request.student_id,
                    "No owner bound, dropping permission request"
                );
            }
        }
        Ok(())
    }

    fn permission_response(&mut self, connection_id: &str, response: PermissionResponse) -> Result<()> {
        self.ownership.authorize(&response.room_id, connection_id)?;

        if !self
            .presence
            .set_permission(&response.room_id, &response.student_id, response.approved)
        {
            return Err(ClassroomError::ParticipantNotFound(response.student_id));
        }
        tracing::info!(
            room_id = %response.room_id,
            student_id = %response.student_id,
            approved = response.approved,
            "Permission decision"
        );

        self.broadcast_roster(&response.room_id);
        self.relay.send_to(
            &response.student_id,
            ServerEvent::PermissionResponseFromOwner(PermissionResponseFromOwner {
                permission_granted: response.approved,
            }),
        );
        Ok(())
    }

    fn disconnect(&mut self, connection_id: &str) {
        self.relay.unregister(connection_id);

        for room_id in self.ownership.owned_by(connection_id) {
            tracing::info!(room_id = %room_id, connection_id = %connection_id, "Owner disconnected, closing classroom");
            self.teardown(&room_id);
        }

        for room_id in self.presence.rooms_of(connection_id) {
            self.presence.remove_participant(&room_id, connection_id);
            self.broadcast_roster(&room_id);
        }
    }

    /// Destroys a room: members are told first, then evicted, then the
    /// room disappears from the listing.
    fn teardown(&mut self, room_id: &str) {
        self.ownership.release(room_id);
        let notified = self.relay.notify_room_deleted(room_id);
        let evicted = self.presence.drop_room(room_id);
        self.registry.delete_room(room_id);

        tracing::info!(
            room_id = %room_id,
            notified,
            evicted = evicted.len(),
            "Classroom torn down"
        );
        self.broadcast_room_list();
    }

    fn ensure_can_edit(&self, room_id: &str, connection_id: &str) -> Result<()> {
        if !self.registry.contains(room_id) {
            return Err(ClassroomError::RoomNotFound(room_id.to_string()));
        }
        match self.presence.participant(room_id, connection_id) {
            Some(p) if p.has_permission => Ok(()),
            Some(_) => Err(ClassroomError::PermissionDenied(connection_id.to_string())),
            None => Err(ClassroomError::ParticipantNotFound(connection_id.to_string())),
        }
    }

    fn broadcast_roster(&self, room_id: &str) {
        self.relay
            .broadcast_roster(room_id, self.presence.roster(room_id));
    }

    fn broadcast_room_list(&self) {
        self.relay
            .broadcast_all(ServerEvent::ClassroomsUpdate(self.registry.list_rooms()));
    }
}
