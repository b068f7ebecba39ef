use std::collections::HashMap;

use super::protocol::{ConnectionId, PermissionRequest, PermissionRequestToOwner, RoomId};
use crate::error::{ClassroomError, Result};

/// Per-room owner state. Leaving `OwnerBound` always destroys the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ownership {
    NoOwner,
    OwnerBound(ConnectionId),
}

/// Tracks the single owner connection of each room and routes the
/// permission-request handshake to it.
#[derive(Default)]
pub struct OwnershipGate {
    owners: HashMap<RoomId, ConnectionId>,
}

impl OwnershipGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, room_id: &str) -> Ownership {
        match self.owners.get(room_id) {
            Some(connection_id) => Ownership::OwnerBound(connection_id.clone()),
            None => Ownership::NoOwner,
        }
    }

    /// `NoOwner -> OwnerBound`. Refused when another connection already owns the room.
    pub fn bind_owner(&mut self, room_id: &str, connection_id: &str) -> bool {
        match self.owners.get(room_id) {
            Some(current) => current == connection_id,
            None => {
                self.owners.insert(room_id.to_string(), connection_id.to_string());
                tracing::info!(room_id = %room_id, connection_id = %connection_id, "Owner bound to classroom");
                true
            }
        }
    }

    pub fn release(&mut self, room_id: &str) -> Option<ConnectionId> {
        self.owners.remove(room_id)
    }

    pub fn owner(&self, room_id: &str) -> Option<&ConnectionId> {
        self.owners.get(room_id)
    }

    pub fn is_owner(&self, room_id: &str, connection_id: &str) -> bool {
        self.owners.get(room_id).is_some_and(|owner| owner == connection_id)
    }

    /// Rooms whose lifetime is bound to this connection
    pub fn owned_by(&self, connection_id: &str) -> Vec<RoomId> {
        self.owners
            .iter()
            .filter(|(_, owner)| owner.as_str() == connection_id)
            .map(|(room_id, _)| room_id.clone())
            .collect()
    }

    /// Owner-only actions may run when the sender is the bound owner.
    pub fn authorize(&self, room_id: &str, connection_id: &str) -> Result<()> {
        if self.is_owner(room_id, connection_id) {
            Ok(())
        } else {
            Err(ClassroomError::Unauthorized(connection_id.to_string()))
        }
    }

    /// Resolves where a permission request goes. `None` means no owner is
    /// bound and the request is dropped.
    pub fn route_permission_request(
        &self,
        request: &PermissionRequest,
    ) -> Option<(ConnectionId, PermissionRequestToOwner)> {
        let owner = self.owners.get(&request.room_id)?;
        Some((
            owner.clone(),
            PermissionRequestToOwner {
                student_id: request.student_id.clone(),
                student_name: request.student_name.clone(),
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(room_id: &str) -> PermissionRequest {
        PermissionRequest {
            room_id: room_id.to_string(),
            student_id: "c2".to_string(),
            student_name: "Bob".to_string(),
        }
    }

    #[test]
    fn test_bind_transitions_to_owner_bound() {
        let mut gate = OwnershipGate::new();
        assert_eq!(gate.state("r1"), Ownership::NoOwner);

        assert!(gate.bind_owner("r1", "c1"));
        assert_eq!(gate.state("r1"), Ownership::OwnerBound("c1".into()));
        assert!(gate.is_owner("r1", "c1"));
        assert!(!gate.is_owner("r1", "c2"));
    }

    #[test]
    fn test_second_owner_is_refused() {
        let mut gate = OwnershipGate::new();
        gate.bind_owner("r1", "c1");

        assert!(!gate.bind_owner("r1", "c2"));
        assert_eq!(gate.owner("r1"), Some(&"c1".to_string()));
        // Rebinding the same connection is harmless.
        assert!(gate.bind_owner("r1", "c1"));
    }

    #[test]
    fn test_release_returns_to_no_owner() {
        let mut gate = OwnershipGate::new();
        gate.bind_owner("r1", "c1");
        gate.bind_owner("r2", "c1");

        let mut owned = gate.owned_by("c1");
        owned.sort();
        assert_eq!(owned, vec!["r1", "r2"]);

        assert_eq!(gate.release("r1"), Some("c1".to_string()));
        assert_eq!(gate.state("r1"), Ownership::NoOwner);
        assert_eq!(gate.owned_by("c1"), vec!["r2"]);
    }

    #[test]
    fn test_authorize_only_owner() {
        let mut gate = OwnershipGate::new();
        gate.bind_owner("r1", "c1");

        assert!(gate.authorize("r1", "c1").is_ok());
        assert!(gate.authorize("r1", "c2").is_err());
        assert!(gate.authorize("r2", "c1").is_err());
    }

    #[test]
    fn test_permission_request_routes_to_owner() {
        let mut gate = OwnershipGate::new();
        gate.bind_owner("r1", "c1");

        let (target, payload) = gate.route_permission_request(&request("r1")).unwrap();
        assert_eq!(target, "c1");
        assert_eq!(payload.student_id, "c2");
        assert_eq!(payload.student_name, "Bob");
    }

    #[test]
    fn test_permission_request_without_owner_is_dropped() {
        let gate = OwnershipGate::new();
        assert!(gate.route_permission_request(&request("r1")).is_none());
    }
}
