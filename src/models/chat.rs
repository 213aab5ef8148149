//! Types related to chat rooms and their messages.

use std::str::FromStr;

use chrono::offset::Utc;
use chrono::DateTime;

use derive_more::Display;

use diesel::{insert_into, prelude::*, update};

use serde::{Deserialize, Serialize};

use crate::models::{Connection, InnerConnection};
use crate::schema::{chat_message, chat_room};
use crate::{Error, Result};

/// A chat room ID.
pub type ChatRoomId = i32;

/// A chat message ID.
pub type ChatMessageId = i32;

/// A chat room.
#[derive(Debug, Clone, Queryable, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoom {
    pub id: ChatRoomId,
    pub title: String,
    pub description: String,
    /// A free-form topic, like "personal rehabilitation".
    pub category: String,
    /// Shown to visitors. Not enforced.
    pub max_participants: i32,
    /// Closed rooms don't take new messages.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A new chat room to be inserted in the database.
#[derive(Debug, Insertable)]
#[table_name = "chat_room"]
pub struct NewChatRoom {
    pub title: String,
    pub description: String,
    pub category: String,
    pub max_participants: i32,
}

/// What kind of message a chat message is.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[display(fmt = "text")]
    Text,
    #[display(fmt = "emoji")]
    Emoji,
    /// Announcements. Only admins may send these.
    #[display(fmt = "system")]
    System,
}

impl FromStr for MessageType {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "text" => Ok(MessageType::Text),
            "emoji" => Ok(MessageType::Emoji),
            "system" => Ok(MessageType::System),
            _ => Err(Error::InvalidField {
                field: "messageType",
                reason: format!("unknown message type '{}'", s),
            }),
        }
    }
}

/// A message in a chat room.
#[derive(Debug, Clone, Queryable, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: ChatMessageId,
    pub room_id: ChatRoomId,
    #[serde(skip_serializing, default)]
    pub user_ip_hash: String,
    pub user_nickname: String,
    pub message: String,
    pub message_type: String,
    #[serde(skip_serializing, default)]
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

/// A new chat message to be inserted in the database.
#[derive(Debug, Insertable)]
#[table_name = "chat_message"]
pub struct NewChatMessage {
    pub room_id: ChatRoomId,
    pub user_ip_hash: String,
    pub user_nickname: String,
    pub message: String,
    pub message_type: String,
}

impl<C: InnerConnection> Connection<C> {
    /// Get all rooms that are open, oldest first.
    pub fn active_chat_rooms(&self) -> Result<Vec<ChatRoom>> {
        use crate::schema::chat_room::columns::{id, is_active};
        use crate::schema::chat_room::dsl::chat_room;

        Ok(chat_room
            .filter(is_active.eq(true))
            .order_by(id.asc())
            .load(&self.inner)?)
    }

    /// Get a chat room, open or not.
    pub fn chat_room(&self, room_id: ChatRoomId) -> Result<ChatRoom> {
        use crate::schema::chat_room::columns::id;
        use crate::schema::chat_room::dsl::chat_room;

        chat_room
            .filter(id.eq(room_id))
            .limit(1)
            .first(&self.inner)
            .map_err(|e| match e {
                diesel::result::Error::NotFound => Error::ChatRoomNotFound { room_id },
                _ => Error::from(e),
            })
    }

    /// Insert a new chat room.
    pub fn insert_chat_room(&self, new_room: NewChatRoom) -> Result<ChatRoom> {
        use crate::schema::chat_room::dsl::chat_room;

        Ok(insert_into(chat_room)
            .values(&new_room)
            .get_result(&self.inner)?)
    }

    /// Get live messages in a room in the order they were sent.
    ///
    /// With `after`, returns up to `limit` messages sent after that one.
    /// Without it, returns the latest `limit` messages.
    pub fn chat_messages(
        &self,
        room_id: ChatRoomId,
        after: Option<ChatMessageId>,
        limit: u32,
    ) -> Result<Vec<ChatMessage>> {
        use crate::schema::chat_message::columns::{id, is_deleted, room_id as column_room_id};
        use crate::schema::chat_message::dsl::chat_message;

        let query = chat_message
            .filter(column_room_id.eq(room_id))
            .filter(is_deleted.eq(false))
            .limit(limit as i64);

        match after {
            Some(after) => Ok(query
                .filter(id.gt(after))
                .order_by(id.asc())
                .load(&self.inner)?),
            None => {
                let mut messages: Vec<ChatMessage> =
                    query.order_by(id.desc()).load(&self.inner)?;
                messages.reverse();
                Ok(messages)
            }
        }
    }

    /// Insert a new chat message.
    pub fn insert_chat_message(&self, new_message: NewChatMessage) -> Result<ChatMessage> {
        use crate::schema::chat_message::dsl::chat_message;

        Ok(insert_into(chat_message)
            .values(&new_message)
            .get_result(&self.inner)?)
    }

    /// Hide a chat message.
    pub fn soft_delete_chat_message(&self, message_id: ChatMessageId) -> Result<()> {
        use crate::schema::chat_message::columns::{id, is_deleted};
        use crate::schema::chat_message::dsl::chat_message;

        let count = update(chat_message.filter(id.eq(message_id)).filter(is_deleted.eq(false)))
            .set(is_deleted.eq(true))
            .execute(&self.inner)?;

        if count == 0 {
            return Err(Error::ChatMessageNotFound { message_id });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_types_parse() -> Result<()> {
        assert_eq!("text".parse::<MessageType>()?, MessageType::Text);
        assert_eq!("emoji".parse::<MessageType>()?, MessageType::Emoji);
        assert_eq!("system".parse::<MessageType>()?, MessageType::System);
        assert!("image".parse::<MessageType>().is_err());

        Ok(())
    }

    #[test]
    fn message_types_display_as_stored() {
        assert_eq!(MessageType::Emoji.to_string(), "emoji");
        assert_eq!(MessageType::System.to_string(), "system");
    }
}
