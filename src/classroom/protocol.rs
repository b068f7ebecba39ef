use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Transport-assigned identifier of one client connection
pub type ConnectionId = String;

/// Client-generated classroom identifier
pub type RoomId = String;

/// Classroom metadata as listed to every browsing client.
///
/// `pass` travels in plaintext and is compared client-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub owner: String,
    pub pass: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: ConnectionId,
    pub name: String,
    pub is_owner: bool,
    pub has_permission: bool,
}

/// Last known editor settings for a classroom, handed to late joiners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorState {
    pub code: String,
    pub language: String,
    pub collab_mode: bool,
}

/// Payload of `classroom-data`: room metadata plus the remembered editor state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassroomSnapshot {
    #[serde(flatten)]
    pub room: Room,
    #[serde(flatten)]
    pub editor: EditorState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoom {
    pub room_id: RoomId,
    pub user_name: String,
    pub is_owner: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRoom {
    pub room_id: RoomId,
    pub user_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveUser {
    pub room_id: RoomId,
    pub user_id: ConnectionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KickAndClearUser {
    pub room_id: RoomId,
    pub user_id: ConnectionId,
    pub classroom_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeChange {
    pub room_id: RoomId,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageChange {
    pub room_id: RoomId,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollabModeChange {
    pub room_id: RoomId,
    pub collab_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRequest {
    pub room_id: RoomId,
    pub student_id: ConnectionId,
    pub student_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionResponse {
    pub room_id: RoomId,
    pub student_id: ConnectionId,
    pub approved: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRequestToOwner {
    pub student_id: ConnectionId,
    pub student_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionResponseFromOwner {
    pub permission_granted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connected {
    pub connection_id: ConnectionId,
}

/// Events a client may send.
///
/// Wire form is `{"event": "<kebab-name>", "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    GetClassrooms,
    CreateClassroom(Room),
    DeleteClassroom(RoomId),
    GetClassroom(RoomId),
    JoinRoom(JoinRoom),
    LeaveRoom(LeaveRoom),
    RemoveUser(RemoveUser),
    KickAndClearUser(KickAndClearUser),
    CodeChange(CodeChange),
    LanguageChange(LanguageChange),
    CollabModeChange(CollabModeChange),
    PermissionRequest(PermissionRequest),
    PermissionResponse(PermissionResponse),
}

/// Events the server pushes to one or more connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    Connected(Connected),
    ClassroomsUpdate(Vec<Room>),
    ClassroomData(Option<ClassroomSnapshot>),
    UsersUpdate(Vec<Participant>),
    KickedNotification,
    ClassroomDeletedNotification,
    CodeUpdate(String),
    CodeReset(String),
    LanguageUpdate(String),
    CollabModeUpdate(bool),
    PermissionRequestToOwner(PermissionRequestToOwner),
    PermissionResponseFromOwner(PermissionResponseFromOwner),
}

impl ClientEvent {
    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Event name as it appears on the wire, for logging
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::GetClassrooms => "get-classrooms",
            ClientEvent::CreateClassroom(_) => "create-classroom",
            ClientEvent::DeleteClassroom(_) => "delete-classroom",
            ClientEvent::GetClassroom(_) => "get-classroom",
            ClientEvent::JoinRoom(_) => "join-room",
            ClientEvent::LeaveRoom(_) => "leave-room",
            ClientEvent::RemoveUser(_) => "remove-user",
            ClientEvent::KickAndClearUser(_) => "kick-and-clear-user",
            ClientEvent::CodeChange(_) => "code-change",
            ClientEvent::LanguageChange(_) => "language-change",
            ClientEvent::CollabModeChange(_) => "collab-mode-change",
            ClientEvent::PermissionRequest(_) => "permission-request",
            ClientEvent::PermissionResponse(_) => "permission-response",
        }
    }
}

impl ServerEvent {
    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_unit_event_without_data() {
        let event = ClientEvent::decode(r#"{"event":"get-classrooms"}"#).unwrap();
        assert_eq!(event, ClientEvent::GetClassrooms);
    }

    #[test]
    fn test_decode_join_room_uses_camel_case_fields() {
        let event = ClientEvent::decode(
            r#"{"event":"join-room","data":{"roomId":"r1","userName":"Alice","isOwner":true}}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            ClientEvent::JoinRoom(JoinRoom {
                room_id: "r1".into(),
                user_name: "Alice".into(),
                is_owner: true,
            })
        );
        assert_eq!(event.name(), "join-room");
    }

    #[test]
    fn test_decode_bare_room_id_payload() {
        let event = ClientEvent::decode(r#"{"event":"delete-classroom","data":"r1"}"#).unwrap();
        assert_eq!(event, ClientEvent::DeleteClassroom("r1".into()));
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        assert!(ClientEvent::decode(r#"{"event":"drop-tables","data":null}"#).is_err());
        assert!(ClientEvent::decode("not json").is_err());
    }

    #[test]
    fn test_users_update_wire_shape() {
        let event = ServerEvent::UsersUpdate(vec![Participant {
            id: "c1".into(),
            name: "Alice".into(),
            is_owner: true,
            has_permission: true,
        }]);
        let value: serde_json::Value = serde_json::from_str(&event.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "users-update",
                "data": [{"id": "c1", "name": "Alice", "isOwner": true, "hasPermission": true}]
            })
        );
    }

    #[test]
    fn test_classroom_data_flattens_editor_state() {
        let snapshot = ClassroomSnapshot {
            room: Room {
                id: "r1".into(),
                name: "Algo".into(),
                owner: "Alice".into(),
                pass: "1234".into(),
            },
            editor: EditorState {
                code: "// Welcome to Algo!".into(),
                language: "javascript".into(),
                collab_mode: false,
            },
        };
        let value: serde_json::Value =
            serde_json::from_str(&ServerEvent::ClassroomData(Some(snapshot)).encode().unwrap()).unwrap();
        assert_eq!(value["event"], "classroom-data");
        assert_eq!(value["data"]["name"], "Algo");
        assert_eq!(value["data"]["collabMode"], false);

        let missing: serde_json::Value =
            serde_json::from_str(&ServerEvent::ClassroomData(None).encode().unwrap()).unwrap();
        assert!(missing["data"].is_null());
    }

    #[test]
    fn test_permission_response_from_owner_shape() {
        let event = ServerEvent::PermissionResponseFromOwner(PermissionResponseFromOwner {
            permission_granted: true,
        });
        assert_eq!(
            event.encode().unwrap(),
            r#"{"event":"permission-response-from-owner","data":{"permissionGranted":true}}"#
        );
    }
}
