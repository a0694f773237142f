//! Generic HTTP webhook channel plugin.
//!
//! Accepts JSON posts from arbitrary producers, optionally behind a
//! bearer token, and submits each one as a runtime task. There is no
//! reply path: the task id in the 202 response is all the caller gets.

mod channel;
mod settings;

pub use channel::{HttpChannel, run};
pub use settings::HttpSettings;
