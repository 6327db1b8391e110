// Telegram Bot API types - only the fields the bot reads.
//
// Conversion into core ChatEvents lives here too, so nothing outside the
// Telegram layer sees these types.

use crate::core::moderation::{ChatEvent, MemberEvent, NewMember, TextMessage};
use serde::Deserialize;

/// Envelope every Bot API method responds with.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
    pub new_chat_members: Option<Vec<User>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl User {
    /// `@username` when there is one, otherwise the full name.
    pub fn display_name(&self) -> String {
        match (&self.username, &self.last_name) {
            (Some(username), _) if !username.is_empty() => format!("@{}", username),
            (_, Some(last)) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}

impl Message {
    /// Join messages first, then text; everything else is ignored.
    pub fn into_chat_event(self) -> ChatEvent {
        match (self.new_chat_members, self.text) {
            (Some(members), _) if !members.is_empty() => ChatEvent::MembersJoined(MemberEvent {
                chat_id: self.chat.id,
                message_id: self.message_id,
                new_members: members
                    .iter()
                    .map(|u| NewMember {
                        user_id: u.id,
                        display_name: u.display_name(),
                    })
                    .collect(),
            }),
            (_, Some(text)) => ChatEvent::Text(TextMessage {
                chat_id: self.chat.id,
                message_id: self.message_id,
                text,
            }),
            _ => ChatEvent::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse_update(value: serde_json::Value) -> Update {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_join_update_becomes_member_event() {
        let update = parse_update(json!({
            "update_id": 10,
            "message": {
                "message_id": 55,
                "date": 1700000000,
                "chat": {"id": -100123, "type": "supergroup", "title": "Rustaceans"},
                "from": {"id": 1, "is_bot": false, "first_name": "Alice"},
                "new_chat_members": [
                    {"id": 1, "is_bot": false, "first_name": "Alice", "username": "alice"},
                    {"id": 2, "is_bot": false, "first_name": "Bob", "last_name": "Builder"}
                ]
            }
        }));

        match update.message.unwrap().into_chat_event() {
            ChatEvent::MembersJoined(event) => {
                assert_eq!(event.chat_id, -100123);
                assert_eq!(event.message_id, 55);
                assert_eq!(
                    event.new_members,
                    vec![
                        NewMember {
                            user_id: 1,
                            display_name: "@alice".to_string()
                        },
                        NewMember {
                            user_id: 2,
                            display_name: "Bob Builder".to_string()
                        },
                    ]
                );
            }
            other => panic!("Expected MembersJoined, got {:?}", other),
        }
    }

    #[test]
    fn test_text_update_becomes_text_event() {
        let update = parse_update(json!({
            "update_id": 11,
            "message": {
                "message_id": 56,
                "chat": {"id": 42, "type": "private"},
                "text": "/start"
            }
        }));

        match update.message.unwrap().into_chat_event() {
            ChatEvent::Text(msg) => {
                assert_eq!(msg.chat_id, 42);
                assert_eq!(msg.message_id, 56);
                assert_eq!(msg.text, "/start");
            }
            other => panic!("Expected Text, got {:?}", other),
        }
    }

    #[test]
    fn test_other_updates_are_ignored() {
        let sticker = parse_update(json!({
            "update_id": 12,
            "message": {"message_id": 57, "chat": {"id": 42}, "sticker": {"file_id": "x"}}
        }));
        assert!(matches!(
            sticker.message.unwrap().into_chat_event(),
            ChatEvent::Other
        ));

        let empty_join = parse_update(json!({
            "update_id": 13,
            "message": {"message_id": 58, "chat": {"id": 42}, "new_chat_members": []}
        }));
        assert!(matches!(
            empty_join.message.unwrap().into_chat_event(),
            ChatEvent::Other
        ));

        let edited = parse_update(json!({"update_id": 14, "edited_message": {}}));
        assert!(edited.message.is_none());
    }
}
