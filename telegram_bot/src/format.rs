use teloxide::utils::html;

use crate::models::Model;

/// Telegram rejects messages above 4096 characters.
pub const MESSAGE_CHUNK: usize = 4000;

/// Renders a model reply as HTML messages: a header with the model title and
/// the text in `<code>` blocks, split so that every part fits one message.
pub fn format_reply(model: &Model, reply: &str) -> Vec<String> {
    let cleaned = reply.replace("```", "'''");

    split_text(&cleaned, MESSAGE_CHUNK)
        .iter()
        .enumerate()
        .map(|(i, part)| {
            if i == 0 {
                format!("📝 {}:\n{}", html::escape(model.title), html::code_inline(part))
            } else {
                html::code_inline(part)
            }
        })
        .collect()
}

/// Splits `text` into parts of at most `limit` characters, cutting after the
/// last newline of a part when there is one.
pub fn split_text(text: &str, limit: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut rest = text;

    while rest.chars().count() > limit {
        let hard = rest
            .char_indices()
            .nth(limit)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let cut = rest[..hard]
            .rfind('\n')
            .filter(|&i| i > 0)
            .map(|i| i + 1)
            .unwrap_or(hard);

        parts.push(rest[..cut].to_string());
        rest = &rest[cut..];
    }

    if !rest.is_empty() || parts.is_empty() {
        parts.push(rest.to_string());
    }
    parts
}
