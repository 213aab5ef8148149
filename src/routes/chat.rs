//! Routes for chat rooms.
//!
//! Clients poll for new messages with `after`, passing the last message ID
//! they have seen.

use rocket::{delete, get, post, State};

use rocket_contrib::json::Json;

use serde::Deserialize;

use crate::config::Config;
use crate::identity::Visitor;
use crate::models::*;
use crate::routes::admin::AdminSession;
use crate::routes::{check_length, nickname_field, required};
use crate::views::{ok, ApiResult};
use crate::{Error, Result};

pub const MAX_ROOM_TITLE_LENGTH: usize = 100;
pub const MAX_MESSAGE_LENGTH: usize = 500;

/// List the open chat rooms.
#[get("/api/chat/rooms")]
pub fn list_rooms(db: State<Database>) -> ApiResult<Vec<ChatRoom>> {
    ok(db.get()?.active_chat_rooms()?)
}

/// New chat room request data.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRoomData {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub max_participants: Option<i32>,
}

impl NewRoomData {
    pub fn validate(self) -> Result<NewChatRoom> {
        let title = required("title", self.title)?;
        check_length("title", &title, MAX_ROOM_TITLE_LENGTH)?;

        let max_participants = self.max_participants.unwrap_or(100);

        if max_participants < 1 {
            return Err(Error::InvalidField {
                field: "maxParticipants",
                reason: "must be at least 1".into(),
            });
        }

        Ok(NewChatRoom {
            title,
            description: self.description.unwrap_or_default(),
            category: self.category.unwrap_or_else(|| "general".into()),
            max_participants,
        })
    }
}

/// Open a new chat room.
#[post("/api/admin/chat/rooms", data = "<room_data>")]
pub fn new_room(
    room_data: Json<NewRoomData>,
    _admin: AdminSession,
    db: State<Database>,
) -> ApiResult<ChatRoom> {
    let new_room = room_data.into_inner().validate()?;

    ok(db.get()?.insert_chat_room(new_room)?)
}

/// Get messages in a room, oldest first.
#[get("/api/chat/rooms/<room_id>/messages?<after>&<limit>")]
pub fn list_messages(
    room_id: ChatRoomId,
    after: Option<ChatMessageId>,
    limit: Option<u32>,
    config: State<Config>,
    db: State<Database>,
) -> ApiResult<Vec<ChatMessage>> {
    let limit = Page::from_params(None, limit, &config).width;

    let conn = db.get()?;
    conn.chat_room(room_id)?;

    ok(conn.chat_messages(room_id, after, limit)?)
}

/// New chat message request data.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessageData {
    pub message: Option<String>,
    pub message_type: Option<String>,
    #[serde(alias = "userNickname")]
    pub nickname: Option<String>,
}

impl NewMessageData {
    /// Check the request and turn it into a message by the given visitor.
    ///
    /// System messages are only allowed when `is_admin` is set.
    pub fn validate(self, room_id: ChatRoomId, user_ip_hash: String, is_admin: bool) -> Result<NewChatMessage> {
        let message = required("message", self.message)?;
        check_length("message", &message, MAX_MESSAGE_LENGTH)?;

        let message_type = match self.message_type {
            Some(message_type) => message_type.parse::<MessageType>()?,
            None => MessageType::Text,
        };

        if message_type == MessageType::System && !is_admin {
            return Err(Error::InvalidField {
                field: "messageType",
                reason: "only admins can send system messages".into(),
            });
        }

        let user_nickname = nickname_field("nickname", self.nickname)?;

        Ok(NewChatMessage {
            room_id,
            user_ip_hash,
            user_nickname,
            message,
            message_type: message_type.to_string(),
        })
    }
}

/// Send a message to a room.
#[post("/api/chat/rooms/<room_id>/messages", data = "<message_data>")]
pub fn new_message(
    room_id: ChatRoomId,
    message_data: Json<NewMessageData>,
    visitor: Visitor,
    admin: Option<AdminSession>,
    db: State<Database>,
) -> ApiResult<ChatMessage> {
    let new_message = message_data
        .into_inner()
        .validate(room_id, visitor.ip_hash, admin.is_some())?;

    let conn = db.get()?;
    let room = conn.chat_room(room_id)?;

    if !room.is_active {
        return Err(Error::ChatRoomClosed { room_id });
    }

    ok(conn.insert_chat_message(new_message)?)
}

/// Remove a chat message.
#[delete("/api/admin/chat/messages/<message_id>")]
pub fn delete_message(
    message_id: ChatMessageId,
    _admin: AdminSession,
    db: State<Database>,
) -> ApiResult<()> {
    db.get()?.soft_delete_chat_message(message_id)?;

    ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(message_type: Option<&str>) -> NewMessageData {
        NewMessageData {
            message: Some("안녕하세요".into()),
            message_type: message_type.map(String::from),
            nickname: None,
        }
    }

    #[test]
    fn message_type_defaults_to_text() -> Result<()> {
        let new_message = message(None).validate(1, "hash".into(), false)?;

        assert_eq!(new_message.message_type, "text");
        assert_eq!(new_message.room_id, 1);

        Ok(())
    }

    #[test]
    fn system_messages_need_an_admin() -> Result<()> {
        assert!(message(Some("system")).validate(1, "hash".into(), false).is_err());

        let new_message = message(Some("system")).validate(1, "hash".into(), true)?;
        assert_eq!(new_message.message_type, "system");

        Ok(())
    }

    #[test]
    fn unknown_message_type_is_rejected() {
        assert!(matches!(
            message(Some("image")).validate(1, "hash".into(), false),
            Err(Error::InvalidField { field: "messageType", .. })
        ));
    }

    #[test]
    fn long_message_is_rejected() {
        let data = NewMessageData {
            message: Some("ㅋ".repeat(501)),
            ..message(None)
        };

        assert!(matches!(
            data.validate(1, "hash".into(), false),
            Err(Error::FieldTooLong { field: "message", max: 500 })
        ));
    }

    #[test]
    fn room_needs_a_participant() {
        let data = NewRoomData {
            title: Some("개인회생 상담방".into()),
            max_participants: Some(0),
            ..NewRoomData::default()
        };
        assert!(data.validate().is_err());

        let data = NewRoomData {
            title: Some("가".repeat(101)),
            ..NewRoomData::default()
        };
        assert!(data.validate().is_err());
    }
}
