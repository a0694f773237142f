//! Telegram channel plugin.
//!
//! Webhook-driven: the plugin registers a webhook with the Telegram Bot
//! API on startup, receives updates on an extension route of its plugin
//! server, and answers through `sendMessage`. Replies run through the
//! MarkdownV2 escaper and the message splitter before delivery.

mod api;
mod channel;
mod inbound;
mod settings;

pub use api::TelegramApi;
pub use channel::{TelegramChannel, run};
pub use inbound::{ACK_POOL, SECRET_TOKEN_HEADER, parse_inbound};
pub use settings::{ParseMode, TelegramSettings};
