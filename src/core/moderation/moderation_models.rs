// Moderation domain models - chat events and reply templates.
//
// These are pure domain types with no Telegram dependencies.
// The Telegram layer converts its updates into these.

use crate::core::spamlist::UserId;

pub type ChatId = i64;
pub type MessageId = i64;

/// A user who just joined a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMember {
    pub user_id: UserId,
    pub display_name: String,
}

/// One or more users joined a chat.
#[derive(Debug, Clone)]
pub struct MemberEvent {
    pub chat_id: ChatId,
    /// The service message announcing the join; replies are threaded to it
    pub message_id: MessageId,
    pub new_members: Vec<NewMember>,
}

/// A plain text message (candidate for a command).
#[derive(Debug, Clone)]
pub struct TextMessage {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub text: String,
}

/// Everything the moderation engine can receive.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    MembersJoined(MemberEvent),
    Text(TextMessage),
    /// Anything else - ignored
    Other,
}

/// Which moderation call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationAction {
    Restrict,
    Remove,
}

impl std::fmt::Display for ModerationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModerationAction::Restrict => write!(f, "Restrict"),
            ModerationAction::Remove => write!(f, "Remove"),
        }
    }
}

/// Placeholder for the member's name in the blocked template.
pub const NAME_PLACEHOLDER: &str = "{name}";

/// Command literals and reply templates. All templates are Markdown.
#[derive(Debug, Clone)]
pub struct ModerationMessages {
    pub start_command: String,
    pub help_command: String,
    pub hello: String,
    pub help: String,
    /// Sent when a spammer is removed; `{name}` is replaced with their display name
    pub blocked: String,
    /// Sent when a spammer could not be removed
    pub unknown_error: String,
}

impl ModerationMessages {
    /// Render the blocked template for one member.
    pub fn blocked_for(&self, display_name: &str) -> String {
        self.blocked
            .replace(NAME_PLACEHOLDER, &escape_markdown(display_name))
    }

    /// Pick the reply for a command message, if the text is one.
    ///
    /// Commands are matched as a literal prefix of the text.
    pub fn reply_for_command(&self, text: &str) -> Option<&str> {
        if text.starts_with(&self.start_command) {
            Some(&self.hello)
        } else if text.starts_with(&self.help_command) {
            Some(&self.help)
        } else {
            None
        }
    }
}

/// Escape the characters that legacy Telegram Markdown treats as markup,
/// so user-controlled names can't break the message formatting.
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages() -> ModerationMessages {
        ModerationMessages {
            start_command: "/start".to_string(),
            help_command: "/help".to_string(),
            hello: "Hi!".to_string(),
            help: "I remove spammers.".to_string(),
            blocked: "{name} is a known spammer and was removed.".to_string(),
            unknown_error: "Something went wrong.".to_string(),
        }
    }

    #[test]
    fn test_blocked_template_escapes_name() {
        assert_eq!(
            messages().blocked_for("@spam_bot"),
            "@spam\\_bot is a known spammer and was removed."
        );
    }

    #[test]
    fn test_escape_markdown_leaves_plain_text() {
        assert_eq!(escape_markdown("Alice Smith"), "Alice Smith");
        assert_eq!(escape_markdown("*[x]`"), "\\*\\[x]\\`");
    }

    #[test]
    fn test_command_matching_is_prefix_based() {
        let messages = messages();
        assert_eq!(messages.reply_for_command("/start"), Some("Hi!"));
        assert_eq!(messages.reply_for_command("/start@my_bot"), Some("Hi!"));
        assert_eq!(
            messages.reply_for_command("/help me"),
            Some("I remove spammers.")
        );
        assert_eq!(messages.reply_for_command("hello /start"), None);
        assert_eq!(messages.reply_for_command(""), None);
    }
}
