//! Secret resolution for config values.
//!
//! Wherever the gateway accepts a credential, the config document may
//! carry an environment-variable reference next to the literal field;
//! resolution prefers the environment. A resolved [`Secret`] remembers
//! which candidate won, so logs can say where a credential came from
//! without ever printing it.

use std::fmt;

use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;

/// Where a resolved secret's value was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    /// Read from the named environment variable.
    Env(String),
    /// Taken from the literal value in the config document.
    Config,
    /// Handed down pre-resolved in the spawn environment.
    Spawn,
}

impl fmt::Display for SecretSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretSource::Env(name) => write!(f, "env:{name}"),
            SecretSource::Config => f.write_str("config"),
            SecretSource::Spawn => f.write_str("spawn"),
        }
    }
}

/// A resolved secret: the trimmed value plus its provenance.
///
/// The value stays out of logs and serialized output. `Debug` prints
/// the provenance only, and neither `Display` nor `Serialize` exist, so
/// a secret cannot end up on the wire by accident. The raw value is
/// reachable solely through [`reveal`](Secret::reveal), for
/// Authorization headers, Bot API URLs, and child-process environments.
#[derive(Clone)]
pub struct Secret {
    value: String,
    source: SecretSource,
}

impl Secret {
    /// Wrap an already-resolved value.
    pub fn new(value: impl Into<String>, source: SecretSource) -> Self {
        Self {
            value: value.into(),
            source,
        }
    }

    /// The raw secret value.
    pub fn reveal(&self) -> &str {
        &self.value
    }

    /// Where the value came from.
    pub fn source(&self) -> &SecretSource {
        &self.source
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({})", self.source)
    }
}

impl<'de> Deserialize<'de> for Secret {
    /// Plugin processes receive secrets pre-resolved by the manager, so
    /// a deserialized secret is always [`SecretSource::Spawn`].
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Secret {
            value,
            source: SecretSource::Spawn,
        })
    }
}

/// A secret as written in the config document: an environment-variable
/// reference, a literal value, or both.
#[derive(Debug, Clone, Default)]
pub struct SecretRef {
    /// Name of an environment variable holding the value.
    pub env_name: Option<String>,
    /// Literal value written directly in the config.
    pub inline_value: Option<String>,
}

impl SecretRef {
    /// Resolve to the first candidate that yields a non-empty trimmed
    /// value, environment before literal. `None` when neither does.
    pub fn resolve_optional(&self) -> Option<Secret> {
        if let Some(name) = self.env_name.as_deref() {
            let name = name.trim();
            if !name.is_empty()
                && let Ok(value) = std::env::var(name)
            {
                let value = value.trim();
                if !value.is_empty() {
                    return Some(Secret::new(value, SecretSource::Env(name.to_string())));
                }
            }
        }

        self.inline_value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Secret::new(v, SecretSource::Config))
    }

    /// Like [`resolve_optional`](SecretRef::resolve_optional), but a
    /// secret must resolve. `field` names the config location in the
    /// error when nothing does.
    pub fn resolve(&self, field: &str) -> Result<Secret, ConfigError> {
        self.resolve_optional().ok_or_else(|| {
            ConfigError::MissingSecret(format!(
                "{field}: no value resolved from environment or literal"
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_environment_over_literal() {
        // SAFETY: test-local variable name, no concurrent reader cares.
        unsafe { std::env::set_var("ATOM_TEST_SECRET_A", "  from-env  ") };
        let secret = SecretRef {
            env_name: Some("ATOM_TEST_SECRET_A".into()),
            inline_value: Some("from-literal".into()),
        }
        .resolve("test")
        .unwrap();
        assert_eq!(secret.reveal(), "from-env");
        assert_eq!(
            secret.source(),
            &SecretSource::Env("ATOM_TEST_SECRET_A".into())
        );
        unsafe { std::env::remove_var("ATOM_TEST_SECRET_A") };
    }

    #[test]
    fn unset_env_falls_back_to_literal() {
        let secret = SecretRef {
            env_name: Some("ATOM_TEST_SECRET_UNSET_XYZ".into()),
            inline_value: Some(" literal ".into()),
        }
        .resolve("test")
        .unwrap();
        assert_eq!(secret.reveal(), "literal");
        assert_eq!(secret.source(), &SecretSource::Config);
    }

    #[test]
    fn blank_env_value_falls_back_to_literal() {
        unsafe { std::env::set_var("ATOM_TEST_SECRET_B", "   ") };
        let secret = SecretRef {
            env_name: Some("ATOM_TEST_SECRET_B".into()),
            inline_value: Some("fallback".into()),
        }
        .resolve("test")
        .unwrap();
        assert_eq!(secret.reveal(), "fallback");
        unsafe { std::env::remove_var("ATOM_TEST_SECRET_B") };
    }

    #[test]
    fn required_missing_names_the_field() {
        let err = SecretRef {
            env_name: None,
            inline_value: Some("   ".into()),
        }
        .resolve("gateway.auth.bearerToken")
        .unwrap_err();
        assert!(err.to_string().contains("gateway.auth.bearerToken"));
    }

    #[test]
    fn absent_optional_resolves_to_none() {
        assert!(SecretRef::default().resolve_optional().is_none());
    }

    #[test]
    fn debug_hides_the_value() {
        let secret = Secret::new("hunter2", SecretSource::Env("BOT_TOKEN".into()));
        let debugged = format!("{secret:?}");
        assert_eq!(debugged, "Secret(env:BOT_TOKEN)");
        assert!(!debugged.contains("hunter2"));

        let secret = Secret::new("hunter2", SecretSource::Config);
        assert_eq!(format!("{secret:?}"), "Secret(config)");
    }

    #[test]
    fn deserialized_secrets_are_marked_spawn() {
        let secret: Secret = serde_json::from_str("\"tok-123\"").unwrap();
        assert_eq!(secret.reveal(), "tok-123");
        assert_eq!(secret.source(), &SecretSource::Spawn);
    }
}
