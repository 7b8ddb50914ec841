use chronicle_memory::ConversationMessage;

pub fn user(author: &str, content: &str) -> ConversationMessage {
    ConversationMessage::user(author, content)
}

pub fn assistant(content: &str) -> ConversationMessage {
    ConversationMessage::assistant("You", content)
}

pub fn system(content: &str) -> ConversationMessage {
    ConversationMessage::system(content)
}
