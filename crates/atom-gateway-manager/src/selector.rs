//! Operator-facing channel selection.
//!
//! The `--message-gateway` flag takes either `all` or a CSV of tokens.
//! Positive tokens enumerate the inclusion set (none given means "start
//! from all enabled channels"); `!id` tokens remove from the set. With no
//! selector at all, nothing starts -- channels run only when explicitly
//! requested.

use tracing::warn;

use atom_gateway_types::ChannelDescriptor;

use crate::error::ManagerError;

/// A parsed channel selector expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelSelector {
    /// Every enabled channel.
    All,
    /// Explicit include / exclude sets.
    Ids {
        /// Channels to start; empty means "all enabled".
        include: Vec<String>,
        /// Channels to remove from the set.
        exclude: Vec<String>,
    },
}

impl ChannelSelector {
    /// Parse a selector expression.
    ///
    /// `all` selects every enabled channel and cannot be combined with
    /// other tokens. An expression that is empty after trimming is
    /// invalid.
    pub fn parse(raw: &str) -> Result<Self, ManagerError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ManagerError::InvalidSelector(
                "selector must not be empty".into(),
            ));
        }

        let tokens: Vec<&str> = trimmed
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.is_empty() {
            return Err(ManagerError::InvalidSelector(
                "selector must not be empty".into(),
            ));
        }

        if tokens.iter().any(|t| *t == "all") {
            if tokens.len() > 1 {
                return Err(ManagerError::InvalidSelector(
                    "\"all\" cannot be combined with other tokens".into(),
                ));
            }
            return Ok(ChannelSelector::All);
        }

        let mut include = Vec::new();
        let mut exclude = Vec::new();
        for token in tokens {
            if let Some(id) = token.strip_prefix('!') {
                if id.is_empty() {
                    return Err(ManagerError::InvalidSelector(
                        "\"!\" must be followed by a channel id".into(),
                    ));
                }
                exclude.push(id.to_string());
            } else {
                include.push(token.to_string());
            }
        }

        Ok(ChannelSelector::Ids { include, exclude })
    }

    /// Apply this selector to the configured channels, in config order.
    ///
    /// Disabled channels are never selected. Tokens naming unknown
    /// channels are logged and ignored.
    pub fn select<'a>(&self, channels: &'a [ChannelDescriptor]) -> Vec<&'a ChannelDescriptor> {
        match self {
            ChannelSelector::All => channels.iter().filter(|c| c.enabled).collect(),
            ChannelSelector::Ids { include, exclude } => {
                for id in include.iter().chain(exclude.iter()) {
                    if !channels.iter().any(|c| &c.id == id) {
                        warn!(channel_id = %id, "selector names an unknown channel, ignoring");
                    }
                }

                channels
                    .iter()
                    .filter(|c| c.enabled)
                    .filter(|c| include.is_empty() || include.contains(&c.id))
                    .filter(|c| !exclude.contains(&c.id))
                    .collect()
            }
        }
    }
}
