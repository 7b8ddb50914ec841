//! Conversation input types and preparation helpers.

use crate::error::MemoryError;
use serde::{Deserialize, Serialize};

/// Speaker role of a chat message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    #[default]
    User,
    Assistant,
}

/// Message as supplied by the chat pipeline.
///
/// The role is never stored; only the author name and content are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    #[serde(default)]
    pub role: Role,
    #[serde(default, rename = "name", alias = "author")]
    pub author: Option<String>,
    pub content: String,
}

impl ConversationMessage {
    pub fn new(role: Role, author: Option<String>, content: impl Into<String>) -> Self {
        Self {
            role,
            author,
            content: content.into(),
        }
    }

    pub fn user(author: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(Role::User, Some(author.into()), content)
    }

    pub fn assistant(author: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, Some(author.into()), content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, None, content)
    }

    /// Author name, if one is set.
    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    /// Render as a transcript line.
    pub fn line(&self) -> String {
        format!("{}: {}", self.author().unwrap_or_default(), self.content)
    }
}

/// Reject system messages and messages without an author.
pub fn validate_conversation(conversation: &[ConversationMessage]) -> Result<(), MemoryError> {
    for (idx, message) in conversation.iter().enumerate() {
        if message.role == Role::System {
            return Err(MemoryError::InvalidInput(format!(
                "system messages are not allowed in the conversation (index={idx})"
            )));
        }
        if message.author().is_none_or(|author| author.trim().is_empty()) {
            return Err(MemoryError::InvalidInput(format!(
                "all messages must have an author (index={idx})"
            )));
        }
    }
    Ok(())
}

/// Drop system messages and fill in authors.
///
/// User messages without an author get `default_name`; assistant messages are
/// always attributed to `"You"`.
pub fn clean_conversation(
    conversation: Vec<ConversationMessage>,
    default_name: &str,
) -> Vec<ConversationMessage> {
    conversation
        .into_iter()
        .filter(|message| message.role != Role::System)
        .map(|mut message| {
            match message.role {
                Role::Assistant => message.author = Some("You".to_string()),
                Role::User if message.author.is_none() => {
                    message.author = Some(default_name.to_string());
                }
                _ => {}
            }
            message
        })
        .collect()
}

/// Newest messages fitting in `max_characters`.
///
/// The message that crosses the limit is kept too, so a non-empty input
/// always yields at least one message.
pub fn crop_conversation(
    conversation: &[ConversationMessage],
    max_characters: usize,
) -> &[ConversationMessage] {
    let mut remaining = max_characters;
    let mut keep = 0;
    for message in conversation.iter().rev() {
        keep += 1;
        let len = message.content.chars().count();
        if len > remaining {
            break;
        }
        remaining -= len;
    }
    &conversation[conversation.len() - keep..]
}

/// Render messages as `author: content` lines.
pub fn render_messages(conversation: &[ConversationMessage]) -> String {
    conversation
        .iter()
        .map(ConversationMessage::line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Session key for a character, shared across a world or private to a player.
pub fn session_key(world_id: &str, player_id: &str, character_id: &str, shared: bool) -> String {
    let owner = if shared { world_id } else { player_id };
    format!("{owner}_{character_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rejects_system_and_anonymous_messages() {
        let err = validate_conversation(&[ConversationMessage::system("rules")]).unwrap_err();
        assert!(matches!(err, MemoryError::InvalidInput(_)));

        let anonymous = ConversationMessage::new(Role::User, None, "hi");
        assert!(validate_conversation(&[anonymous]).is_err());

        let blank = ConversationMessage::user("  ", "hi");
        assert!(validate_conversation(&[blank]).is_err());

        assert!(validate_conversation(&[ConversationMessage::user("Ana", "hi")]).is_ok());
    }

    #[test]
    fn clean_strips_system_and_names_speakers() {
        let cleaned = clean_conversation(
            vec![
                ConversationMessage::system("rules"),
                ConversationMessage::new(Role::User, None, "hi"),
                ConversationMessage::user("Bo", "yo"),
                ConversationMessage::new(Role::Assistant, None, "hello"),
            ],
            "Ana",
        );
        let authors: Vec<_> = cleaned.iter().map(|m| m.author().unwrap_or("")).collect();
        assert_eq!(authors, vec!["Ana", "Bo", "You"]);
        assert!(validate_conversation(&cleaned).is_ok());
    }

    #[test]
    fn crop_keeps_newest_messages_plus_crossing_one() {
        let conversation = vec![
            ConversationMessage::user("Ana", "aaaa"),
            ConversationMessage::user("Ana", "bbbb"),
            ConversationMessage::user("Ana", "cc"),
        ];
        assert_eq!(crop_conversation(&conversation, 100).len(), 3);
        assert_eq!(crop_conversation(&conversation, 6).len(), 3);
        assert_eq!(crop_conversation(&conversation, 5), &conversation[1..]);
        assert_eq!(crop_conversation(&conversation, 0), &conversation[2..]);
        assert!(crop_conversation(&[], 10).is_empty());
    }

    #[test]
    fn session_key_respects_sharing() {
        assert_eq!(session_key("w", "p", "c", true), "w_c");
        assert_eq!(session_key("w", "p", "c", false), "p_c");
    }

    #[test]
    fn messages_deserialize_from_chat_json() {
        let messages: Vec<ConversationMessage> = serde_json::from_str(
            r#"[{"role":"user","name":"Ana","content":"hi"},{"content":"anon"},{"role":"assistant","author":"You","content":"yo"}]"#,
        )
        .expect("parse");
        assert_eq!(messages[0], ConversationMessage::user("Ana", "hi"));
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].author, None);
        assert_eq!(messages[2], ConversationMessage::assistant("You", "yo"));
        assert_eq!(render_messages(&messages[..1]), "Ana: hi");
    }
}
