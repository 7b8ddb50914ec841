//! Replay reconciliation of resubmitted conversations.

use crate::conversation::ConversationMessage;
use crate::model::MemoryEntry;
use std::collections::HashSet;

/// Messages of `conversation` that are not stored yet.
///
/// Scans from the newest message backwards and stops at the first one whose
/// `(author, content)` equals any stored level 0 entry; everything after it is
/// new. Without a match the whole conversation is new.
///
/// Two distinct turns with identical author and content are indistinguishable
/// here, so a repeated line can make the match land earlier than the true
/// resumption point.
pub fn unseen_suffix<'a>(
    conversation: &'a [ConversationMessage],
    stored: &[MemoryEntry],
) -> &'a [ConversationMessage] {
    let known: HashSet<(&str, &str)> = stored
        .iter()
        .filter(|entry| entry.level == 0)
        .map(|entry| (entry.author.as_str(), entry.content.as_str()))
        .collect();
    if known.is_empty() {
        return conversation;
    }
    let matched = conversation.iter().rev().position(|message| {
        message
            .author()
            .is_some_and(|author| known.contains(&(author, message.content.as_str())))
    });
    match matched {
        Some(newer) => &conversation[conversation.len() - newer..],
        None => conversation,
    }
}
