//! Channel plugins for the atom message gateway.
//!
//! Two channel types ship with the gateway:
//!
//! - [`telegram`] -- webhook-driven Telegram bot with allow-list
//!   filtering, command handling, MarkdownV2 escaping, and chunked reply
//!   delivery
//! - [`http`] -- generic JSON webhook producer with optional bearer auth
//!   and no reply delivery
//!
//! Shared pieces live in [`text`] (message splitting and MarkdownV2
//! escaping) and [`summary`] (mapping terminal task snapshots to a
//! user-visible string). Each channel builds on the plugin server runtime
//! from `atom-gateway-plugin` and reaches the task runtime through
//! `atom-gateway-client`.

pub mod control;
pub mod http;
pub mod summary;
pub mod telegram;
pub mod text;

/// Frame one inbound message as runtime task input.
///
/// The bracket header lets the agent see which channel and conversation
/// the text arrived from.
pub fn frame_task_input(
    channel_id: &str,
    conversation_id: &str,
    sender_id: &str,
    text: &str,
) -> String {
    format!("[channel={channel_id} conversation={conversation_id} sender={sender_id}]\n{text}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_includes_header_and_text() {
        let input = frame_task_input("tg-main", "c1", "u1", "do x");
        assert_eq!(input, "[channel=tg-main conversation=c1 sender=u1]\ndo x");
    }
}
