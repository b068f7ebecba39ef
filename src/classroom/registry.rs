use super::protocol::{ClassroomSnapshot, EditorState, Room, RoomId};
use crate::error::{ClassroomError, Result};

pub const DEFAULT_LANGUAGE: &str = "javascript";

/// Code template written into a fresh or cleared editor.
pub fn welcome_template(classroom_name: &str) -> String {
    format!("// Welcome to {}!", classroom_name)
}

struct RoomEntry {
    room: Room,
    editor: EditorState,
}

/// Owns every Room record; insertion order is kept for listings.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: Vec<RoomEntry>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_room(&mut self, room: Room) -> Result<RoomId> {
        if self.position(&room.id).is_some() {
            return Err(ClassroomError::RoomAlreadyExists(room.id));
        }

        let room_id = room.id.clone();
        let editor = EditorState {
            code: welcome_template(&room.name),
            language: DEFAULT_LANGUAGE.to_string(),
            collab_mode: false,
        };
        self.rooms.push(RoomEntry { room, editor });

        tracing::info!(room_id = %room_id, "Classroom created");
        Ok(room_id)
    }

    /// Removes the room. Unknown ids are a no-op.
    pub fn delete_room(&mut self, room_id: &str) -> Option<Room> {
        let index = self.position(room_id)?;
        let entry = self.rooms.remove(index);
        tracing::info!(room_id = %room_id, "Classroom deleted");
        Some(entry.room)
    }

    pub fn get_room(&self, room_id: &str) -> Option<&Room> {
        self.entry(room_id).map(|e| &e.room)
    }

    pub fn contains(&self, room_id: &str) -> bool {
        self.position(room_id).is_some()
    }

    pub fn list_rooms(&self) -> Vec<Room> {
        self.rooms.iter().map(|e| e.room.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Room metadata plus editor state, as returned to `get-classroom` and joins
    pub fn snapshot(&self, room_id: &str) -> Option<ClassroomSnapshot> {
        self.entry(room_id).map(|e| ClassroomSnapshot {
            room: e.room.clone(),
            editor: e.editor.clone(),
        })
    }

    pub fn set_code(&mut self, room_id: &str, code: String) -> Result<()> {
        self.editor_mut(room_id)?.code = code;
        Ok(())
    }

    pub fn set_language(&mut self, room_id: &str, language: String) -> Result<()> {
        self.editor_mut(room_id)?.language = language;
        Ok(())
    }

    pub fn set_collab_mode(&mut self, room_id: &str, enabled: bool) -> Result<()> {
        self.editor_mut(room_id)?.collab_mode = enabled;
        Ok(())
    }

    fn editor_mut(&mut self, room_id: &str) -> Result<&mut EditorState> {
        self.rooms
            .iter_mut()
            .find(|e| e.room.id == room_id)
            .map(|e| &mut e.editor)
            .ok_or_else(|| ClassroomError::RoomNotFound(room_id.to_string()))
    }

    fn entry(&self, room_id: &str) -> Option<&RoomEntry> {
        self.rooms.iter().find(|e| e.room.id == room_id)
    }

    fn position(&self, room_id: &str) -> Option<usize> {
        self.rooms.iter().position(|e| e.room.id == room_id)
    }
}
