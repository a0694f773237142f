//! Outgoing-text helpers: message splitting and MarkdownV2 escaping.
//!
//! Telegram caps message length, so replies are split into chunks before
//! sending. Splitting counts Unicode scalar values (Rust `char`), and it
//! must never separate an escaping backslash from the character it
//! escapes -- otherwise a chunk would end in a dangling `\` and Telegram
//! would reject or misrender it.

use atom_gateway_types::ChannelError;

/// The closed set of characters Telegram MarkdownV2 treats as markup.
const MARKDOWN_V2_METACHARS: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!', '\\',
];

/// Escape every MarkdownV2 metacharacter by prefixing `\`.
///
/// No other transformation is applied; empty input yields empty output.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if MARKDOWN_V2_METACHARS.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Split `text` into ordered chunks of at most `chunk_size` characters
/// whose concatenation equals the input.
///
/// Greedy slicing, with one adjustment: when a cut would leave a chunk
/// ending in `\` (and that backslash is not the final character of the
/// whole text), the cut moves one position left so the backslash stays
/// with the character it escapes. If moving left would empty the chunk,
/// the cut moves right past the pair instead, so progress is guaranteed.
pub fn split_message(text: &str, chunk_size: usize) -> Result<Vec<String>, ChannelError> {
    if chunk_size == 0 {
        return Err(ChannelError::InvalidChunkSize(0));
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= chunk_size {
        return Ok(vec![text.to_string()]);
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let mut end = usize::min(start + chunk_size, chars.len());
        if end < chars.len() && chars[end - 1] == '\\' {
            if end - 1 > start {
                end -= 1;
            } else {
                // A one-character chunk would be a lone backslash; take
                // the escaped pair instead.
                end = start + 2;
            }
        }
        chunks.push(chars[start..end].iter().collect());
        start = end;
    }
    Ok(chunks)
}
