use chronicle_memory::Turn;

/// System prompt asking for a single-line summary of at most `sentences` sentences.
pub fn compression_prompt(sentences: usize) -> String {
    format!(
        "You compress conversation memories.\n\
         You receive a conversation between you and one or more humans, possibly \
         preceded by memories from earlier. Condense the key facts into at most \
         {sentences} sentences.\n\
         Keep every piece of information but stay brief. Reply with the summary \
         only, on one single line, without any introduction or closing remark.\n\
         \n\
         Example input:\n\
         Mira: Did you finish repairing the mill wheel?\n\
         You: Almost, I still need two iron nails.\n\
         Mira: The smith owes me a favour, I will ask him.\n\
         You: Thank you!\n\
         \n\
         Example output:\n\
         Mira offers to get the two iron nails needed for the mill wheel repair from the smith."
    )
}

/// `author: content` lines, oldest first.
pub fn render_turns(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|turn| format!("{}: {}", turn.author, turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Trim whitespace and wrapping quotes from a model reply.
pub fn clean_summary(raw: &str) -> String {
    raw.trim().trim_matches('"').trim().to_string()
}
