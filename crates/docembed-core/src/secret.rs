//! Credentials for fetching models from authenticated hubs.
//!
//! A [`Secret`] is a resolution recipe, not a value: environment-variable
//! secrets are looked up lazily, in order, each time they are resolved. Only
//! the recipe is ever serialized. Literal tokens are allowed for programmatic
//! use but refuse to serialize and never appear in debug output.

use serde::de::Deserializer;
use serde::ser::{Error as _, SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hasher;
use twox_hash::XxHash64;

use crate::error::{Error, Result};

/// A string that redacts itself in `Debug` and `Display` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Redacted(String);

impl Redacted {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Redacted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Redacted(\"***\")")
    }
}

impl fmt::Display for Redacted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Secret {
    /// A literal token. Cannot be serialized.
    Token(Redacted),
    /// Environment variables tried in order; the first one set wins.
    EnvVar { env_vars: Vec<String>, strict: bool },
}

impl Secret {
    pub fn from_token(token: impl Into<String>) -> Self {
        Self::Token(Redacted::new(token))
    }

    pub fn from_env_vars<I, S>(env_vars: I, strict: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::EnvVar { env_vars: env_vars.into_iter().map(Into::into).collect(), strict }
    }

    /// Resolve the secret to its current value.
    ///
    /// A non-strict env secret with none of its variables set resolves to
    /// `None`; a strict one is an error.
    pub fn resolve_value(&self) -> Result<Option<String>> {
        match self {
            Secret::Token(token) => Ok(Some(token.expose().to_string())),
            Secret::EnvVar { env_vars, strict } => {
                for name in env_vars {
                    // Non-unicode values are treated as unset
                    if let Ok(value) = std::env::var(name) {
                        return Ok(Some(value));
                    }
                }
                if *strict {
                    return Err(Error::Secret(format!(
                        "none of the following environment variables are set: {}",
                        env_vars.join(", ")
                    )));
                }
                Ok(None)
            }
        }
    }

    /// Identity used for cache keys; never contains the token itself.
    pub fn identity(&self) -> String {
        match self {
            Secret::Token(token) => {
                let mut hasher = XxHash64::with_seed(0);
                hasher.write(token.expose().as_bytes());
                format!("token:{:016x}", hasher.finish())
            }
            Secret::EnvVar { env_vars, strict } => {
                format!("env:{}:{}", env_vars.join(","), if *strict { "strict" } else { "lenient" })
            }
        }
    }
}

impl Default for Secret {
    /// The Hugging Face token lookup used by the embedders.
    fn default() -> Self {
        Self::from_env_vars(["HF_API_TOKEN", "HF_TOKEN"], false)
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Secret::Token(_) => Err(S::Error::custom(
                "cannot serialize token-based secret; use an environment variable secret instead",
            )),
            Secret::EnvVar { env_vars, strict } => {
                let mut state = serializer.serialize_struct("Secret", 3)?;
                state.serialize_field("type", "env_var")?;
                state.serialize_field("env_vars", env_vars)?;
                state.serialize_field("strict", strict)?;
                state.end()
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SecretRepr {
    EnvVar {
        env_vars: Vec<String>,
        #[serde(default = "default_strict")]
        strict: bool,
    },
}

fn default_strict() -> bool {
    true
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let SecretRepr::EnvVar { env_vars, strict } = SecretRepr::deserialize(deserializer)?;
        if env_vars.is_empty() {
            return Err(serde::de::Error::custom("env_var secret needs at least one variable"));
        }
        Ok(Secret::EnvVar { env_vars, strict })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn env_secret_takes_first_set_variable() {
        std::env::set_var("DOCEMBED_TEST_SECRET_B", "second");
        let secret = Secret::from_env_vars(["DOCEMBED_TEST_SECRET_A_UNSET", "DOCEMBED_TEST_SECRET_B"], true);
        assert_eq!(secret.resolve_value().unwrap().as_deref(), Some("second"));
        std::env::remove_var("DOCEMBED_TEST_SECRET_B");
    }

    #[test]
    fn strict_env_secret_fails_when_unset() {
        let secret = Secret::from_env_vars(["DOCEMBED_TEST_NEVER_SET_1"], true);
        assert!(matches!(secret.resolve_value(), Err(Error::Secret(_))));

        let lenient = Secret::from_env_vars(["DOCEMBED_TEST_NEVER_SET_1"], false);
        assert_eq!(lenient.resolve_value().unwrap(), None);
    }

    #[test]
    fn env_secret_serializes_as_recipe() {
        let secret = Secret::default();
        let value = serde_json::to_value(&secret).unwrap();
        assert_eq!(
            value,
            json!({"type": "env_var", "env_vars": ["HF_API_TOKEN", "HF_TOKEN"], "strict": false})
        );
        let back: Secret = serde_json::from_value(value).unwrap();
        assert_eq!(back, secret);
    }

    #[test]
    fn token_secret_refuses_to_serialize() {
        let secret = Secret::from_token("hf_supersecret");
        assert!(serde_json::to_value(&secret).is_err());
        let debug = format!("{secret:?}");
        assert!(!debug.contains("supersecret"));
    }

    #[test]
    fn token_type_is_not_deserializable() {
        let res: std::result::Result<Secret, _> =
            serde_json::from_value(json!({"type": "token", "token": "abc"}));
        assert!(res.is_err());
    }

    #[test]
    fn identity_hides_token() {
        let id = Secret::from_token("hf_supersecret").identity();
        assert!(id.starts_with("token:"));
        assert!(!id.contains("supersecret"));
        assert_eq!(Secret::default().identity(), "env:HF_API_TOKEN,HF_TOKEN:lenient");
    }
}
